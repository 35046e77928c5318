//! Cycle configuration.

use crate::{CycleError, Result};
use serde::{Deserialize, Serialize};

/// How worker availability evolves between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AvailabilityPolicy {
    /// Decay persists for the whole run
    #[default]
    Persist,
    /// Every worker is fully available again at the start of each tick
    ResetEachTick,
    /// Each worker regains `rate` availability per tick, capped at 1.0
    Recover {
        /// Availability regained per tick
        rate: f64,
    },
}

/// What happens to tasks no worker could take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BacklogPolicy {
    /// Unassigned tasks are dropped at the end of the tick
    #[default]
    Drop,
    /// Unassigned tasks wait for the next tick until their deadline passes
    Carry {
        /// Promote a waiting task one priority level every this many ticks
        boost_after: u32,
    },
}

/// Configuration for a cycle run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Iteration ceiling
    pub max_iterations: u64,
    /// Composite score at which the cycle has converged
    pub convergence_threshold: f64,
    /// Trailing window used for rate and per-metric convergence
    pub score_window: usize,
    /// Trailing window used for stagnation
    pub stagnation_window: usize,
    /// Spread below which a metric counts as converging
    pub convergence_spread: f64,
    /// Capacity of every history buffer
    pub history_capacity: usize,
    /// Seed for the injected random source (entropy when absent)
    pub seed: Option<u64>,
    /// Stop once the predictor recommends it
    pub stop_on_stagnation: bool,
    /// Consecutive failed ticks that end the run
    pub max_consecutive_failures: Option<usize>,
    /// Worker availability between ticks
    pub availability: AvailabilityPolicy,
    /// Handling of unassigned tasks
    pub backlog: BacklogPolicy,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            convergence_threshold: 0.95,
            score_window: 5,
            stagnation_window: 5,
            convergence_spread: 0.01,
            history_capacity: 100,
            seed: None,
            stop_on_stagnation: false,
            max_consecutive_failures: None,
            availability: AvailabilityPolicy::default(),
            backlog: BacklogPolicy::default(),
        }
    }
}

impl CycleConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration ceiling.
    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    /// Seed the random source.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the availability policy.
    pub fn with_availability(mut self, policy: AvailabilityPolicy) -> Self {
        self.availability = policy;
        self
    }

    /// Set the backlog policy.
    pub fn with_backlog(mut self, policy: BacklogPolicy) -> Self {
        self.backlog = policy;
        self
    }

    /// End the run after this many consecutive failed ticks.
    pub fn with_failure_limit(mut self, limit: usize) -> Self {
        self.max_consecutive_failures = Some(limit);
        self
    }

    /// Stop when the predictor recommends an early stop.
    pub fn with_stop_on_stagnation(mut self, stop: bool) -> Self {
        self.stop_on_stagnation = stop;
        self
    }

    /// Check the configuration can drive a cycle.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(CycleError::InvalidConfig("max_iterations must be at least 1".into()));
        }
        if !(self.convergence_threshold.is_finite() && self.convergence_threshold > 0.0) {
            return Err(CycleError::InvalidConfig(format!(
                "convergence_threshold {} must be positive",
                self.convergence_threshold
            )));
        }
        if self.score_window == 0 || self.stagnation_window == 0 {
            return Err(CycleError::InvalidConfig("windows must be at least 1".into()));
        }
        if self.history_capacity < self.score_window.max(self.stagnation_window) {
            return Err(CycleError::InvalidConfig(format!(
                "history_capacity {} is smaller than the trailing windows",
                self.history_capacity
            )));
        }
        if !(self.convergence_spread.is_finite() && self.convergence_spread >= 0.0) {
            return Err(CycleError::InvalidConfig("convergence_spread must be non-negative".into()));
        }
        if let AvailabilityPolicy::Recover { rate } = self.availability {
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(CycleError::InvalidConfig(format!("recovery rate {} must be non-negative", rate)));
            }
        }
        if let BacklogPolicy::Carry { boost_after: 0 } = self.backlog {
            return Err(CycleError::InvalidConfig("backlog boost_after must be at least 1".into()));
        }
        if self.max_consecutive_failures == Some(0) {
            return Err(CycleError::InvalidConfig("max_consecutive_failures must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CycleConfig::default();
        assert_eq!(config.max_iterations, 30);
        assert_eq!(config.convergence_threshold, 0.95);
        assert_eq!(config.score_window, 5);
        assert_eq!(config.stagnation_window, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = CycleConfig {
            score_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(CycleConfig::new().with_max_iterations(0).validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CycleConfig = serde_json::from_str(
            r#"{"max_iterations": 50, "backlog": {"kind": "carry", "boost_after": 2}}"#,
        )
        .unwrap();
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.backlog, BacklogPolicy::Carry { boost_after: 2 });
        assert_eq!(config.availability, AvailabilityPolicy::Persist);
        assert_eq!(config.score_window, 5);
    }
}
