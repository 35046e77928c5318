//! Convergence tracking.
//!
//! Predicts how many ticks remain until the composite score converges,
//! how confident that estimate is, and whether the loop has stagnated.

#![warn(missing_docs)]

pub mod predictor;

pub use predictor::{ConvergencePredictor, Prediction, PredictorConfig, DEFAULT_REMAINING};
