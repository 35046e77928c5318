//! Worker model - members of the heterogeneous pool tasks are assigned to.

use crate::{CycleError, Result, WorkerId};
use serde::{Deserialize, Serialize};

/// Availability multiplier applied on each assignment.
pub const AVAILABILITY_DECAY: f64 = 0.7;

/// Caller-supplied description of a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSpec {
    /// Worker id
    pub id: WorkerId,
    /// Specialization tag matched against task types
    pub specialization: String,
    /// Skill level in [0, 1]
    pub skill_level: f64,
    /// Starting availability, 1.0 when absent
    #[serde(default)]
    pub availability: Option<f64>,
    /// Starting experience
    #[serde(default)]
    pub experience: u32,
}

impl WorkerSpec {
    /// A fresh, fully available worker.
    pub fn new(id: impl Into<String>, specialization: impl Into<String>, skill_level: f64) -> Self {
        Self {
            id: WorkerId::new(id),
            specialization: specialization.into(),
            skill_level,
            availability: None,
            experience: 0,
        }
    }
}

/// A worker in the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    /// Worker id
    pub id: WorkerId,
    /// Specialization tag
    pub specialization: String,
    /// Skill level in [0, 1]
    pub skill_level: f64,
    /// Remaining capacity in [0, 1]
    pub availability: f64,
    /// Number of assignments taken so far
    pub experience: u32,
}

impl Worker {
    /// Build a worker from its spec.
    pub fn from_spec(spec: WorkerSpec) -> Result<Self> {
        if !(0.0..=1.0).contains(&spec.skill_level) {
            return Err(CycleError::InvalidConfig(format!(
                "worker {} has skill level {} outside [0, 1]",
                spec.id, spec.skill_level
            )));
        }
        let availability = spec.availability.unwrap_or(1.0);
        if !(0.0..=1.0).contains(&availability) {
            return Err(CycleError::InvalidConfig(format!(
                "worker {} has availability {} outside [0, 1]",
                spec.id, availability
            )));
        }
        Ok(Self {
            id: spec.id,
            specialization: spec.specialization,
            skill_level: spec.skill_level,
            availability,
            experience: spec.experience,
        })
    }

    /// Recheck the ranges `from_spec` enforces.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.skill_level) {
            return Err(CycleError::InvalidConfig(format!(
                "worker {} has skill level {} outside [0, 1]",
                self.id, self.skill_level
            )));
        }
        if !(0.0..=1.0).contains(&self.availability) {
            return Err(CycleError::InvalidConfig(format!(
                "worker {} has availability {} outside [0, 1]",
                self.id, self.availability
            )));
        }
        Ok(())
    }

    /// Whether the worker can take another task this tick.
    pub fn is_available(&self) -> bool {
        self.availability > 0.5
    }

    /// Record an assignment: capacity decays, experience grows.
    pub fn assign(&mut self) {
        self.availability *= AVAILABILITY_DECAY;
        self.experience = self.experience.saturating_add(1);
    }

    /// Case-insensitive textual match between a task type and the specialization.
    pub fn specializes_in(&self, task_type: &str) -> bool {
        let spec = self.specialization.to_lowercase();
        let kind = task_type.to_lowercase();
        if spec.is_empty() || kind.is_empty() {
            return false;
        }
        spec == kind || spec.contains(&kind) || kind.contains(&spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_decays_availability() {
        let mut worker = Worker::from_spec(WorkerSpec::new("w1", "analysis", 0.8)).unwrap();
        assert!(worker.is_available());
        worker.assign();
        assert!((worker.availability - 0.7).abs() < 1e-12);
        assert!(worker.is_available());
        worker.assign();
        assert!((worker.availability - 0.49).abs() < 1e-12);
        assert!(!worker.is_available());
        assert_eq!(worker.experience, 2);
    }

    #[test]
    fn test_specializes_in() {
        let worker = Worker::from_spec(WorkerSpec::new("w1", "Optimization", 0.8)).unwrap();
        assert!(worker.specializes_in("optimization"));
        assert!(worker.specializes_in("optim"));
        assert!(worker.specializes_in("cost-optimization-review"));
        assert!(!worker.specializes_in("analysis"));
        assert!(!worker.specializes_in(""));
    }

    #[test]
    fn test_from_spec_rejects_bad_skill() {
        let err = Worker::from_spec(WorkerSpec::new("w1", "analysis", 1.5)).unwrap_err();
        assert!(matches!(err, CycleError::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rechecks_ranges() {
        let mut worker = Worker::from_spec(WorkerSpec::new("w1", "analysis", 0.8)).unwrap();
        assert!(worker.validate().is_ok());
        worker.availability = f64::NAN;
        assert!(matches!(worker.validate(), Err(CycleError::InvalidConfig(_))));
        worker.availability = 0.4;
        worker.skill_level = -0.1;
        assert!(worker.validate().is_err());
    }
}
