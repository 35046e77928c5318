//! Convergence prediction from the score stream.

use optiloop_core::{CycleConfig, History, Metric};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Estimate used when there is too little history or no forward progress.
pub const DEFAULT_REMAINING: u64 = 50;

/// Longest estimate the predictor gives.
const MAX_REMAINING: u64 = 100;

/// Minimum score points before a rate is extrapolated.
const MIN_POINTS: usize = 3;

/// Minimum score points before stagnation can be flagged.
const STAGNATION_MIN_POINTS: usize = 10;

/// Spread below which the score stream has stagnated.
const STAGNATION_SPREAD: f64 = 0.001;

/// Predictor tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Score considered converged
    pub target: f64,
    /// Trailing window for rate and per-metric convergence
    pub window: usize,
    /// Trailing window for stagnation
    pub stagnation_window: usize,
    /// Spread below which a metric is converging
    pub convergence_spread: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            target: 0.95,
            window: 5,
            stagnation_window: 5,
            convergence_spread: 0.01,
        }
    }
}

impl From<&CycleConfig> for PredictorConfig {
    fn from(config: &CycleConfig) -> Self {
        Self {
            target: config.convergence_threshold,
            window: config.score_window,
            stagnation_window: config.stagnation_window,
            convergence_spread: config.convergence_spread,
        }
    }
}

/// What the predictor expects from the rest of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Estimated ticks until the score reaches target
    pub iterations_remaining: u64,
    /// Confidence in the estimate, in [0, 0.99]
    pub confidence: f64,
    /// Score change per tick over the window
    pub velocity: f64,
    /// Whether the score has plateaued
    pub stagnating: bool,
    /// Whether the loop should stop early
    pub early_stop_recommended: bool,
    /// Whether each metric has settled
    pub per_metric_converging: BTreeMap<String, bool>,
}

impl Prediction {
    /// Names of metrics that have not settled yet.
    pub fn unsettled(&self) -> impl Iterator<Item = &str> {
        self.per_metric_converging
            .iter()
            .filter(|(_, converging)| !**converging)
            .map(|(name, _)| name.as_str())
    }
}

/// Extrapolates recent progress to estimate convergence.
pub struct ConvergencePredictor {
    config: PredictorConfig,
}

impl ConvergencePredictor {
    /// Create a predictor.
    pub fn new(config: PredictorConfig) -> Self {
        Self { config }
    }

    /// The predictor's configuration.
    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Predict convergence from the score history and the metrics' own histories.
    ///
    /// Pure: identical inputs give identical predictions.
    pub fn predict(&self, score_history: &History, metrics: &BTreeMap<String, Metric>) -> Prediction {
        let current = score_history.last().unwrap_or(0.0);
        let velocity = self.velocity(score_history);
        let iterations_remaining = self.remaining(score_history.len(), current, velocity);

        let window = self.config.window.max(1);
        let per_metric_converging: BTreeMap<String, bool> = metrics
            .iter()
            .map(|(name, m)| {
                let converging = m.history.len() >= window
                    && m.history
                        .spread(window)
                        .is_some_and(|spread| spread < self.config.convergence_spread);
                (name.clone(), converging)
            })
            .collect();

        let stagnating = score_history.len() >= STAGNATION_MIN_POINTS
            && score_history
                .spread(self.config.stagnation_window.max(1))
                .is_some_and(|spread| spread < STAGNATION_SPREAD);

        let confidence = confidence(current, velocity, &per_metric_converging);

        debug!(
            current,
            velocity,
            iterations_remaining,
            confidence,
            stagnating,
            "convergence predicted"
        );

        Prediction {
            iterations_remaining,
            confidence,
            velocity,
            stagnating,
            early_stop_recommended: stagnating,
            per_metric_converging,
        }
    }

    /// Mean score change per point over the trailing window.
    fn velocity(&self, history: &History) -> f64 {
        if history.len() < MIN_POINTS {
            return 0.0;
        }
        let tail = history.tail(self.config.window.max(1));
        match (tail.first(), tail.last()) {
            (Some(first), Some(last)) => (last - first) / tail.len() as f64,
            _ => 0.0,
        }
    }

    fn remaining(&self, points: usize, current: f64, rate: f64) -> u64 {
        if points < MIN_POINTS {
            return DEFAULT_REMAINING;
        }
        if current >= self.config.target {
            return 0;
        }
        if rate <= 0.0 {
            return DEFAULT_REMAINING;
        }
        let estimate = ((self.config.target - current) / rate).ceil();
        (estimate as u64).clamp(1, MAX_REMAINING)
    }
}

impl Default for ConvergencePredictor {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

fn confidence(score: f64, velocity: f64, converging: &BTreeMap<String, bool>) -> f64 {
    let ratio = if converging.is_empty() {
        0.0
    } else {
        converging.values().filter(|c| **c).count() as f64 / converging.len() as f64
    };
    let velocity_factor = if velocity > 0.0 {
        (velocity.abs() * 10.0).min(1.0)
    } else {
        0.5
    };
    (score.min(0.95) * ratio * velocity_factor).min(0.99)
}
