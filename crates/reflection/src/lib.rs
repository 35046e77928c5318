//! Reflection layer - turns observations into new work.
//!
//! The analyzer reads a prediction and the metric set and reports what is
//! lagging; the engine turns those insights, and the insights of
//! successful executions, into tasks for the scheduler.

#![warn(missing_docs)]

mod analyzer;
mod engine;

pub use analyzer::{Analyzer, Insight, InsightKind};
pub use engine::{ReflectionConfig, ReflectionEngine, FOLLOW_UP_HIGH_VALUE};
