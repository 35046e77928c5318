//! Metric model - the numeric quantities the optimizer steers.

use crate::{CycleError, History, Result};
use serde::{Deserialize, Serialize};

/// Lower bound for a metric's learning rate.
pub const MIN_LEARNING_RATE: f64 = 0.05;

/// Upper bound for a metric's learning rate.
pub const MAX_LEARNING_RATE: f64 = 0.5;

/// Learning rate used when a spec does not give one.
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;

/// Which way a metric should move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Higher is better (efficiency, revenue, ...)
    #[default]
    Maximize,
    /// Lower is better (cost, latency, ...)
    Minimize,
}

impl Direction {
    /// Whether lower values are better.
    pub fn is_minimize(self) -> bool {
        matches!(self, Direction::Minimize)
    }
}

/// Bounds and direction for a metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Smallest admissible value
    pub min: f64,
    /// Largest admissible value
    pub max: f64,
    /// Optimization direction
    pub direction: Direction,
}

impl Constraint {
    /// Clamp a value into `[min, max]`.
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Whether `value` lies inside the bounds.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Caller-supplied description of a metric to track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Value the optimizer steers toward
    pub target: f64,
    /// Smallest admissible value
    pub min: f64,
    /// Largest admissible value
    pub max: f64,
    /// Optimization direction
    #[serde(default)]
    pub direction: Direction,
    /// Starting value; seeded from the target when absent
    #[serde(default)]
    pub initial: Option<f64>,
    /// Starting step size
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

fn default_learning_rate() -> f64 {
    DEFAULT_LEARNING_RATE
}

impl MetricSpec {
    /// A maximize metric with default learning rate.
    pub fn maximize(target: f64, min: f64, max: f64) -> Self {
        Self {
            target,
            min,
            max,
            direction: Direction::Maximize,
            initial: None,
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }

    /// A minimize metric with default learning rate.
    pub fn minimize(target: f64, min: f64, max: f64) -> Self {
        Self {
            direction: Direction::Minimize,
            ..Self::maximize(target, min, max)
        }
    }

    /// Set the starting value.
    pub fn with_initial(mut self, initial: f64) -> Self {
        self.initial = Some(initial);
        self
    }

    /// Set the starting learning rate.
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// The constraint this spec describes.
    pub fn constraint(&self) -> Constraint {
        Constraint {
            min: self.min,
            max: self.max,
            direction: self.direction,
        }
    }

    /// Reject bounds that cannot hold and targets the direction can never reach.
    pub fn validate(&self, name: &str) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite() && self.target.is_finite()) {
            return Err(CycleError::constraint(name, "bounds and target must be finite"));
        }
        if self.min > self.max {
            return Err(CycleError::constraint(
                name,
                format!("min {} is greater than max {}", self.min, self.max),
            ));
        }
        match self.direction {
            Direction::Maximize if self.target > self.max => Err(CycleError::constraint(
                name,
                format!("target {} lies above max {}", self.target, self.max),
            )),
            Direction::Minimize if self.target < self.min => Err(CycleError::constraint(
                name,
                format!("target {} lies below min {}", self.target, self.min),
            )),
            _ => Ok(()),
        }
    }
}

/// A tracked metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Metric name
    pub name: String,
    /// Current value, always inside the constraint
    pub current_value: f64,
    /// Target value
    pub target_value: f64,
    /// Bounds and direction
    pub constraint: Constraint,
    /// Step size, always inside `[MIN_LEARNING_RATE, MAX_LEARNING_RATE]`
    pub learning_rate: f64,
    /// Recent values, initial value first
    pub history: History,
}

impl Metric {
    /// Build a metric from a validated spec and a starting value.
    ///
    /// The starting value is clamped into the bounds and the learning rate into
    /// its admissible range.
    pub fn new(name: impl Into<String>, spec: &MetricSpec, initial: f64, history_capacity: usize) -> Result<Self> {
        let name = name.into();
        spec.validate(&name)?;
        if !initial.is_finite() {
            return Err(CycleError::constraint(&name, "initial value must be finite"));
        }

        let constraint = spec.constraint();
        let current_value = constraint.clamp(initial);
        let mut history = History::new(history_capacity);
        history.push(current_value);

        Ok(Self {
            name,
            current_value,
            target_value: spec.target,
            constraint,
            learning_rate: spec.learning_rate.clamp(MIN_LEARNING_RATE, MAX_LEARNING_RATE),
            history,
        })
    }

    /// Recheck what `new` guarantees, for metrics that did not come from it.
    pub fn validate(&self) -> Result<()> {
        let spec = MetricSpec {
            target: self.target_value,
            min: self.constraint.min,
            max: self.constraint.max,
            direction: self.constraint.direction,
            initial: None,
            learning_rate: self.learning_rate,
        };
        spec.validate(&self.name)?;
        if !(self.current_value.is_finite() && self.constraint.contains(self.current_value)) {
            return Err(CycleError::constraint(
                &self.name,
                format!(
                    "current value {} outside [{}, {}]",
                    self.current_value, self.constraint.min, self.constraint.max
                ),
            ));
        }
        if !(MIN_LEARNING_RATE..=MAX_LEARNING_RATE).contains(&self.learning_rate) {
            return Err(CycleError::constraint(
                &self.name,
                format!(
                    "learning rate {} outside [{}, {}]",
                    self.learning_rate, MIN_LEARNING_RATE, MAX_LEARNING_RATE
                ),
            ));
        }
        if !self.history.is_bounded() {
            return Err(CycleError::constraint(&self.name, "history holds more entries than its capacity"));
        }
        Ok(())
    }

    /// Distance to target relative to the target magnitude, 0 when reached.
    pub fn gap_ratio(&self) -> f64 {
        let gap = match self.constraint.direction {
            Direction::Maximize => self.target_value - self.current_value,
            Direction::Minimize => self.current_value - self.target_value,
        };
        if gap <= 0.0 {
            return 0.0;
        }
        if self.target_value == 0.0 {
            return gap.min(1.0);
        }
        (gap / self.target_value.abs()).min(1.0)
    }
}

/// One metric's change during one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationAction {
    /// Metric that changed
    pub metric_name: String,
    /// Value before the update
    pub previous: f64,
    /// Value after the update
    pub new: f64,
    /// Target value
    pub target: f64,
    /// Relative change, positive when moving toward target
    pub improvement_ratio: f64,
    /// Optimization direction
    pub direction: Direction,
}
