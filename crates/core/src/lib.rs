//! optiloop core data models.
//!
//! This crate defines the data structures threaded through the
//! optimization loop: metrics and their constraints, the worker pool,
//! tasks and their outcomes, and the cycle state that owns them.

#![warn(missing_docs)]

// Core identities
mod id;

// Bounded histories
mod history;

// Metrics
mod metric;

// Work distribution
mod worker;
mod task;

// Cycle
mod config;
mod state;
mod error;

// Re-exports
pub use id::*;
pub use history::History;
pub use metric::{
    Constraint, Direction, Metric, MetricSpec, OptimizationAction,
    DEFAULT_LEARNING_RATE, MAX_LEARNING_RATE, MIN_LEARNING_RATE,
};
pub use worker::{Worker, WorkerSpec, AVAILABILITY_DECAY};
pub use task::{Assignment, ExecutionResult, Priority, Task, TaskAction};
pub use config::{AvailabilityPolicy, BacklogPolicy, CycleConfig};
pub use state::{CycleState, CycleStatus};
pub use error::{Component, CycleError, Result};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
