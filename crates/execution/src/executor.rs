//! Task execution.

use async_trait::async_trait;
use optiloop_core::{ExecutionResult, Result, Task, TaskAction, Worker};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Highest success probability an execution can have.
const MAX_SUCCESS_PROBABILITY: f64 = 0.95;

/// Everything an executor needs for one assignment.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Task to execute
    pub task: Task,
    /// The worker as it was when the task was assigned
    pub worker: Worker,
    /// Tick the execution belongs to
    pub iteration: u64,
    /// Seed for any randomness the execution uses
    pub seed: u64,
}

/// Executes an assigned task.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run the task and report its outcome.
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult>;
}

/// `skill * (1 - complexity * 0.3) + min(0.2, 0.01 * experience)`, capped at 0.95.
pub fn success_probability(skill_level: f64, complexity: f64, experience: u32) -> f64 {
    let base = skill_level * (1.0 - complexity * 0.3);
    let bonus = (0.01 * experience as f64).min(0.2);
    (base + bonus).min(MAX_SUCCESS_PROBABILITY)
}

/// Draws outcomes from the worker's success probability.
///
/// Successful executions score in `[0.7, 1.0]` and return 80–120% of the
/// task's estimated value; failures score in `[0.2, 0.5]` and return 10–30%.
pub struct SimulatedExecutor;

impl SimulatedExecutor {
    /// Create a new simulated executor.
    pub fn new() -> Self {
        Self
    }

    fn insights(task: &Task, worker: &Worker, performance: f64) -> Vec<String> {
        let subject = task.metric.as_deref().unwrap_or("overall score");
        match task.action {
            TaskAction::Analyze => vec![format!("{} identified a lever on {}", worker.id, subject)],
            TaskAction::Research => vec![format!("{} found a new approach for {}", worker.id, subject)],
            // Only strong optimizations suggest further work.
            TaskAction::Optimize if performance >= 0.85 => {
                vec![format!("{} sees more headroom on {}", worker.id, subject)]
            }
            TaskAction::Optimize => Vec::new(),
        }
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskExecutor for SimulatedExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult> {
        let ExecutionRequest { task, worker, seed, .. } = request;
        let mut rng = StdRng::seed_from_u64(seed);

        let probability = success_probability(worker.skill_level, task.complexity, worker.experience);
        let success = rng.gen_bool(probability.clamp(0.0, 1.0));

        let (performance_score, value_generated) = if success {
            (rng.gen_range(0.7..=1.0), task.estimated_value * rng.gen_range(0.8..=1.2))
        } else {
            (rng.gen_range(0.2..=0.5), task.estimated_value * rng.gen_range(0.1..=0.3))
        };

        let insights = if success {
            Self::insights(&task, &worker, performance_score)
        } else {
            Vec::new()
        };

        Ok(ExecutionResult {
            task_id: task.id,
            worker_id: worker.id,
            success,
            performance_score,
            value_generated,
            insights,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optiloop_core::{Priority, TaskId, WorkerSpec};

    fn request(skill: f64, complexity: f64, seed: u64) -> ExecutionRequest {
        ExecutionRequest {
            task: Task::new(TaskId::new("t1"), "analysis", TaskAction::Analyze, Priority::High, complexity, 1000.0),
            worker: Worker::from_spec(WorkerSpec::new("w1", "analysis", skill)).unwrap(),
            iteration: 1,
            seed,
        }
    }

    #[test]
    fn test_success_probability_before_experience_bonus() {
        let p = success_probability(0.9, 0.1, 0);
        assert!((p - 0.873).abs() < 1e-12);
        assert!((0.85..=0.88).contains(&p));
    }

    #[test]
    fn test_success_probability_bonus_and_cap() {
        assert!((success_probability(0.5, 0.0, 10) - 0.6).abs() < 1e-12);
        assert!((success_probability(0.5, 0.0, 100) - 0.7).abs() < 1e-12);
        assert_eq!(success_probability(1.0, 0.0, 50), MAX_SUCCESS_PROBABILITY);
    }

    #[tokio::test]
    async fn test_outcome_bands() {
        let executor = SimulatedExecutor::new();
        for seed in 0..200 {
            let result = executor.execute(request(0.6, 0.5, seed)).await.unwrap();
            if result.success {
                assert!((0.7..=1.0).contains(&result.performance_score));
                assert!((800.0..=1200.0).contains(&result.value_generated));
                assert!(!result.insights.is_empty());
            } else {
                assert!((0.2..=0.5).contains(&result.performance_score));
                assert!((100.0..=300.0).contains(&result.value_generated));
                assert!(result.insights.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_outcome() {
        let executor = SimulatedExecutor::new();
        let a = executor.execute(request(0.7, 0.4, 99)).await.unwrap();
        let b = executor.execute(request(0.7, 0.4, 99)).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_zero_skill_always_fails() {
        let executor = SimulatedExecutor::new();
        for seed in 0..20 {
            assert!(!executor.execute(request(0.0, 0.5, seed)).await.unwrap().success);
        }
    }
}
