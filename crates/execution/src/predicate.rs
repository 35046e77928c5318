//! Stopping rules for a cycle.

use optiloop_core::{CycleConfig, CycleState, CycleStatus};
use optiloop_progress::Prediction;

/// Decides after each tick whether the cycle should stop.
pub trait ConvergencePredicate: Send + Sync {
    /// Status the cycle should have after the tick that produced `state`.
    ///
    /// `prediction` is `None` when the tick failed before predicting.
    fn evaluate(&self, state: &CycleState, prediction: Option<&Prediction>, config: &CycleConfig) -> CycleStatus;
}

/// Score threshold, then early stop, then the iteration ceiling.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdPredicate;

impl ConvergencePredicate for ThresholdPredicate {
    fn evaluate(&self, state: &CycleState, prediction: Option<&Prediction>, config: &CycleConfig) -> CycleStatus {
        if !state.score_history.is_empty() && state.composite_score() >= config.convergence_threshold {
            return CycleStatus::Converged;
        }
        if config.stop_on_stagnation && prediction.is_some_and(|p| p.early_stop_recommended) {
            return CycleStatus::Stagnated;
        }
        if state.iteration >= config.max_iterations {
            return CycleStatus::Exhausted;
        }
        CycleStatus::Running
    }
}
