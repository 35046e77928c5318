//! Execution layer - worker selection, scheduling, and the cycle driver.
//!
//! The scheduler orders tasks, binds them to the best available workers
//! and runs them concurrently. The driver threads a [`optiloop_core::CycleState`]
//! through optimizer, predictor and scheduler one tick at a time until a
//! stopping rule fires.

#![warn(missing_docs)]

pub mod selector;
pub mod executor;
pub mod scheduler;
pub mod predicate;
pub mod engine;

pub use selector::{experience_factor, PerformanceSelector, SelectorStrategy, WorkerSelector};
pub use executor::{success_probability, ExecutionRequest, SimulatedExecutor, TaskExecutor};
pub use scheduler::{order_tasks, CoordinationMetrics, Plan, ScheduleOutcome, TaskScheduler};
pub use predicate::{ConvergencePredicate, ThresholdPredicate};
pub use engine::{apply_backlog, CycleDriver, RunSummary, TickOutcome, TickSummary};
