//! Reflection engine - generates tasks from insights and execution results.

use crate::{Analyzer, Insight, InsightKind};
use optiloop_core::{ExecutionResult, Metric, Priority, Task, TaskAction, TaskId};
use optiloop_progress::Prediction;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Follow-ups of results above this value are scheduled at high priority.
pub const FOLLOW_UP_HIGH_VALUE: f64 = 5000.0;

/// Configuration for the reflection engine.
#[derive(Debug, Clone)]
pub struct ReflectionConfig {
    /// Whether to generate tasks from the predictor's view of the metrics
    pub auto_generate_tasks: bool,
    /// Gaps at or below this ratio produce no insight
    pub min_gap: f64,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            auto_generate_tasks: true,
            min_gap: 0.01,
        }
    }
}

/// Turns insights into tasks and closes the loop from results to new work.
pub struct ReflectionEngine {
    analyzer: Analyzer,
    config: ReflectionConfig,
}

impl ReflectionEngine {
    /// Create a new reflection engine.
    pub fn new() -> Self {
        Self::with_config(ReflectionConfig::default())
    }

    /// Create an engine with the given configuration.
    pub fn with_config(config: ReflectionConfig) -> Self {
        Self {
            analyzer: Analyzer::new(config.min_gap),
            config,
        }
    }

    /// Tasks seeded by the predictor's insights for this tick.
    pub fn insight_tasks<R: Rng + ?Sized>(
        &self,
        prediction: &Prediction,
        metrics: &BTreeMap<String, Metric>,
        iteration: u64,
        rng: &mut R,
    ) -> Vec<Task> {
        if !self.config.auto_generate_tasks {
            return Vec::new();
        }
        let insights = self.analyzer.analyze(prediction, metrics);
        let tasks: Vec<Task> = insights
            .iter()
            .map(|insight| task_for_insight(insight, iteration, rng))
            .collect();
        debug!(insights = insights.len(), tasks = tasks.len(), "insight tasks generated");
        tasks
    }

    /// One optimize task per successful result that produced insights.
    ///
    /// `executed` supplies the original tasks so follow-ups inherit the metric
    /// they were about.
    pub fn follow_ups<R: Rng + ?Sized>(
        &self,
        results: &[ExecutionResult],
        executed: &[Task],
        iteration: u64,
        rng: &mut R,
    ) -> Vec<Task> {
        let by_id: HashMap<&TaskId, &Task> = executed.iter().map(|t| (&t.id, t)).collect();

        results
            .iter()
            .filter(|r| r.success && !r.insights.is_empty())
            .map(|result| {
                let parent = by_id.get(&result.task_id);
                let priority = if result.value_generated > FOLLOW_UP_HIGH_VALUE {
                    Priority::High
                } else {
                    Priority::Medium
                };
                let complexity = parent.map(|p| p.complexity * 0.9).unwrap_or(0.5);
                let mut task = Task::new(
                    TaskId::generate(iteration, rng),
                    "optimization",
                    TaskAction::Optimize,
                    priority,
                    complexity,
                    result.value_generated * 0.8,
                );
                task.metric = parent.and_then(|p| p.metric.clone());
                debug!(parent = %result.task_id, task = %task.id, ?priority, "follow-up task");
                task
            })
            .collect()
    }
}

impl Default for ReflectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn task_for_insight<R: Rng + ?Sized>(insight: &Insight, iteration: u64, rng: &mut R) -> Task {
    match &insight.kind {
        InsightKind::LaggingMetric { metric, gap, settled } => {
            let priority = match *gap {
                g if g > 0.5 => Priority::Critical,
                g if g > 0.25 => Priority::High,
                g if g > 0.1 => Priority::Medium,
                _ => Priority::Low,
            };
            // A metric stuck short of target needs more thought than one still moving.
            let complexity = 0.3 + 0.5 * gap + if *settled { 0.1 } else { 0.0 };
            Task::new(
                TaskId::generate(iteration, rng),
                "analysis",
                TaskAction::Analyze,
                priority,
                complexity,
                1000.0 + 9000.0 * gap,
            )
            .for_metric(metric.clone())
        }
        InsightKind::Plateau => Task::new(
            TaskId::generate(iteration, rng),
            "research",
            TaskAction::Research,
            Priority::High,
            0.6,
            3000.0,
        ),
    }
}
