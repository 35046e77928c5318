//! Scenario files - everything needed to start a run.

use anyhow::{Context, Result};
use optiloop_core::{CycleConfig, MetricSpec, Priority, Task, TaskAction, TaskId, WorkerSpec};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// A run description loaded from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Cycle configuration; every field is optional
    #[serde(default)]
    pub config: CycleConfig,
    /// Metrics to optimize, by name
    pub metrics: BTreeMap<String, MetricSpec>,
    /// Worker pool
    #[serde(default)]
    pub workers: Vec<WorkerSpec>,
    /// Tasks queued before the first tick
    #[serde(default)]
    pub seed_tasks: Vec<SeedTask>,
}

/// A task as written in a scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedTask {
    /// Task id; numbered from its position when absent
    #[serde(default)]
    pub id: Option<String>,
    /// Kind of work
    pub task_type: String,
    #[serde(default)]
    pub action: TaskAction,
    #[serde(default)]
    pub metric: Option<String>,
    pub priority: Priority,
    #[serde(default = "default_complexity")]
    pub complexity: f64,
    pub estimated_value: f64,
    /// Defaults to the priority's deadline
    #[serde(default)]
    pub deadline_iterations: Option<u32>,
}

fn default_complexity() -> f64 {
    0.5
}

impl Scenario {
    /// Parse a scenario from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid scenario")
    }

    /// Read a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read scenario {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("in {}", path.display()))
    }

    /// Seed tasks converted into scheduler tasks.
    pub fn tasks(&self) -> Vec<Task> {
        self.seed_tasks
            .iter()
            .enumerate()
            .map(|(index, seed)| {
                let id = seed
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("seed-{}", index + 1));
                let mut task = Task::new(
                    TaskId::new(id),
                    seed.task_type.clone(),
                    seed.action,
                    seed.priority,
                    seed.complexity,
                    seed.estimated_value,
                );
                task.metric = seed.metric.clone();
                if let Some(deadline) = seed.deadline_iterations {
                    task.deadline_iterations = deadline;
                }
                task
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optiloop_core::{BacklogPolicy, Direction};

    const SCENARIO: &str = r#"{
        "config": { "max_iterations": 12, "seed": 7, "backlog": { "kind": "carry", "boost_after": 2 } },
        "metrics": {
            "eff": { "target": 0.95, "min": 0.5, "max": 1.0, "initial": 0.5 },
            "latency": { "target": 100, "min": 50, "max": 500, "direction": "minimize", "learning_rate": 0.2 }
        },
        "workers": [
            { "id": "w1", "specialization": "analysis", "skill_level": 0.9 },
            { "id": "w2", "specialization": "research", "skill_level": 0.6, "availability": 0.8, "experience": 4 }
        ],
        "seed_tasks": [
            { "task_type": "analysis", "priority": "critical", "estimated_value": 2000, "metric": "eff" },
            { "id": "explore", "task_type": "research", "action": "research", "priority": "low",
              "complexity": 0.7, "estimated_value": 500, "deadline_iterations": 3 }
        ]
    }"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        assert_eq!(scenario.config.max_iterations, 12);
        assert_eq!(scenario.config.seed, Some(7));
        assert_eq!(scenario.config.convergence_threshold, 0.95);
        assert_eq!(scenario.config.backlog, BacklogPolicy::Carry { boost_after: 2 });
        assert_eq!(scenario.metrics["latency"].direction, Direction::Minimize);
        assert_eq!(scenario.metrics["eff"].learning_rate, 0.1);
        assert_eq!(scenario.workers[1].availability, Some(0.8));
        assert_eq!(scenario.workers[1].experience, 4);
    }

    #[test]
    fn test_seed_tasks_fill_defaults() {
        let tasks = Scenario::from_json(SCENARIO).unwrap().tasks();
        assert_eq!(tasks[0].id.as_str(), "seed-1");
        assert_eq!(tasks[0].action, TaskAction::Analyze);
        assert_eq!(tasks[0].deadline_iterations, Priority::Critical.default_deadline());
        assert_eq!(tasks[0].metric.as_deref(), Some("eff"));
        assert_eq!(tasks[1].id.as_str(), "explore");
        assert_eq!(tasks[1].action, TaskAction::Research);
        assert_eq!(tasks[1].deadline_iterations, 3);
    }

    #[test]
    fn test_metrics_are_required() {
        assert!(Scenario::from_json(r#"{ "workers": [] }"#).is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = Scenario::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("missing.json"));
    }
}
