//! Error types shared across the optimization loop.

/// Result alias for cycle operations.
pub type Result<T> = std::result::Result<T, CycleError>;

/// Errors that can occur while building or advancing a cycle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CycleError {
    /// A metric's constraint cannot hold (min > max, unreachable target, ...)
    #[error("invalid constraint on metric '{metric}': {reason}")]
    InvalidConstraint {
        /// Metric the constraint belongs to
        metric: String,
        /// What is wrong with it
        reason: String,
    },

    /// Configuration or input that cannot start a cycle
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A component invocation failed during a tick
    #[error("{component} failed: {reason}")]
    ComponentFailure {
        /// Which component raised
        component: Component,
        /// Failure description
        reason: String,
    },

    /// A single task execution failed
    #[error("execution of task {task} failed: {reason}")]
    Execution {
        /// Task that failed
        task: String,
        /// Failure description
        reason: String,
    },
}

impl CycleError {
    /// Shorthand for a component failure.
    pub fn component(component: Component, reason: impl Into<String>) -> Self {
        Self::ComponentFailure {
            component,
            reason: reason.into(),
        }
    }

    /// Shorthand for an invalid constraint.
    pub fn constraint(metric: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConstraint {
            metric: metric.into(),
            reason: reason.into(),
        }
    }
}

/// The components a tick drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Component {
    /// Metric optimizer
    Optimizer,
    /// Convergence predictor
    Predictor,
    /// Task scheduler
    Scheduler,
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Component::Optimizer => "optimizer",
            Component::Predictor => "predictor",
            Component::Scheduler => "scheduler",
        };
        f.write_str(name)
    }
}
