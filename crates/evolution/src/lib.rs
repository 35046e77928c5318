//! Evolution layer - adaptive metric optimization.
//!
//! Nudges each tracked metric toward its target under its constraint,
//! tunes the per-metric step size from recent progress, and scores how
//! close the whole set is to its targets.

#![warn(missing_docs, unused_crate_dependencies)]

mod optimizer;
mod metrics;

pub use optimizer::{build_metrics, seed_initial_value, MetricOptimizer, Optimization};
pub use metrics::{composite_score, metric_score, ScoreBreakdown};
