//! Cycle state - everything threaded from one tick to the next.

use crate::{AvailabilityPolicy, CycleError, History, Metric, Result, Task, Worker, WorkerId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Lifecycle of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    /// Still ticking
    #[default]
    Running,
    /// Composite score reached the threshold
    Converged,
    /// Iteration ceiling reached
    Exhausted,
    /// Stopped on the predictor's early-stop recommendation
    Stagnated,
    /// Stopped by an external cancellation signal
    Cancelled,
    /// Too many consecutive failed ticks
    Aborted,
}

impl CycleStatus {
    /// Whether no further tick will run.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CycleStatus::Running)
    }
}

/// The full thread-through state of a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleState {
    /// Completed (or attempted) ticks
    pub iteration: u64,
    /// Lifecycle status
    pub status: CycleStatus,
    /// Tracked metrics by name
    pub metrics: BTreeMap<String, Metric>,
    /// Composite score per tick
    pub score_history: History,
    /// Worker pool in stable order
    pub worker_pool: Vec<Worker>,
    /// Performance scores per worker
    pub worker_performance: BTreeMap<WorkerId, History>,
    /// Value produced by all executions so far
    pub total_value_generated: f64,
    /// Tasks handed to the next tick
    pub pending_tasks: Vec<Task>,
    /// Ticks that failed and were rolled back
    pub failed_ticks: u64,
    /// Failed ticks since the last successful one
    pub consecutive_failures: usize,
}

impl CycleState {
    /// Fresh state at iteration 0.
    pub fn new(metrics: BTreeMap<String, Metric>, worker_pool: Vec<Worker>, history_capacity: usize) -> Self {
        let worker_performance = worker_pool
            .iter()
            .map(|w| (w.id.clone(), History::new(history_capacity)))
            .collect();
        Self {
            iteration: 0,
            status: CycleStatus::Running,
            metrics,
            score_history: History::new(history_capacity),
            worker_pool,
            worker_performance,
            total_value_generated: 0.0,
            pending_tasks: Vec::new(),
            failed_ticks: 0,
            consecutive_failures: 0,
        }
    }

    /// Check a state that did not come from `new`, such as a loaded snapshot.
    pub fn validate(&self) -> Result<()> {
        for (name, metric) in &self.metrics {
            if *name != metric.name {
                return Err(CycleError::constraint(
                    name,
                    format!("stored under a different name ({})", metric.name),
                ));
            }
            metric.validate()?;
        }

        let mut seen = BTreeSet::new();
        for worker in &self.worker_pool {
            worker.validate()?;
            if !seen.insert(&worker.id) {
                return Err(CycleError::InvalidConfig(format!("duplicate worker id {}", worker.id)));
            }
        }

        if !self.score_history.is_bounded() {
            return Err(CycleError::InvalidConfig(
                "score history holds more entries than its capacity".into(),
            ));
        }
        if let Some((id, _)) = self.worker_performance.iter().find(|(_, h)| !h.is_bounded()) {
            return Err(CycleError::InvalidConfig(format!(
                "performance history of worker {} holds more entries than its capacity",
                id
            )));
        }
        Ok(())
    }

    /// Latest composite score, 0 before the first tick.
    pub fn composite_score(&self) -> f64 {
        self.score_history.last().unwrap_or(0.0)
    }

    /// Current value of every metric.
    pub fn metric_values(&self) -> BTreeMap<String, f64> {
        self.metrics
            .iter()
            .map(|(name, m)| (name.clone(), m.current_value))
            .collect()
    }

    /// Apply the between-tick availability policy to the pool.
    pub fn restore_availability(&mut self, policy: AvailabilityPolicy) {
        match policy {
            AvailabilityPolicy::Persist => {}
            AvailabilityPolicy::ResetEachTick => {
                for worker in &mut self.worker_pool {
                    worker.availability = 1.0;
                }
            }
            AvailabilityPolicy::Recover { rate } => {
                for worker in &mut self.worker_pool {
                    worker.availability = (worker.availability + rate).min(1.0);
                }
            }
        }
    }
}
