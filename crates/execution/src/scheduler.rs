//! Task scheduling across the worker pool.

use crate::{ExecutionRequest, PerformanceSelector, SimulatedExecutor, TaskExecutor, WorkerSelector};
use optiloop_core::{
    Assignment, Component, CycleError, ExecutionResult, History, Result, Task, Worker, WorkerId,
};
use optiloop_reflection::ReflectionEngine;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// How well one scheduler invocation coordinated the pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinationMetrics {
    /// Successful results over all results
    pub success_rate: f64,
    /// Distinct workers that received a task
    pub agent_utilization: usize,
    /// Results over assignments, 1.0 without execution errors
    pub coordination_efficiency: f64,
}

impl CoordinationMetrics {
    fn measure(assignments: &[Assignment], results: &[ExecutionResult]) -> Self {
        let successes = results.iter().filter(|r| r.success).count();
        let success_rate = if results.is_empty() {
            0.0
        } else {
            successes as f64 / results.len() as f64
        };
        let agent_utilization = assignments
            .iter()
            .map(|a| &a.worker_id)
            .collect::<HashSet<_>>()
            .len();
        let coordination_efficiency = if assignments.is_empty() {
            1.0
        } else {
            results.len() as f64 / assignments.len() as f64
        };
        Self {
            success_rate,
            agent_utilization,
            coordination_efficiency,
        }
    }
}

/// Everything one scheduler invocation produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    /// Tasks bound to workers, in scheduling order
    pub assignments: Vec<Assignment>,
    /// Execution outcomes, in assignment order
    pub results: Vec<ExecutionResult>,
    /// Follow-up tasks for the next tick
    pub new_tasks: Vec<Task>,
    /// Tasks no available worker could take
    pub unassigned: Vec<Task>,
    /// Executions that returned an error
    pub failed_executions: usize,
    /// Value produced by all results
    pub value_generated: f64,
    /// Coordination metrics
    pub coordination: CoordinationMetrics,
}

/// The serial half of scheduling: tasks bound to workers, nothing executed yet.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Tasks bound to workers, in scheduling order
    pub assignments: Vec<Assignment>,
    /// Execution input per assignment, same order
    pub requests: Vec<(Task, Worker)>,
    /// Tasks no available worker could take
    pub unassigned: Vec<Task>,
}

/// Sort by priority rank, then estimated value, both descending.
///
/// The sort is stable, so fully tied tasks keep their input order.
pub fn order_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        b.priority
            .rank()
            .cmp(&a.priority.rank())
            .then_with(|| b.estimated_value.total_cmp(&a.estimated_value))
    });
}

/// Matches tasks to workers and runs them.
pub struct TaskScheduler {
    selector: Box<dyn WorkerSelector>,
    executor: Arc<dyn TaskExecutor>,
    reflection: ReflectionEngine,
    history_capacity: usize,
}

impl TaskScheduler {
    /// Create a scheduler with the default selector and the simulated executor.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            selector: Box::new(PerformanceSelector::default()),
            executor: Arc::new(SimulatedExecutor::new()),
            reflection: ReflectionEngine::default(),
            history_capacity,
        }
    }

    /// Set the worker selection strategy.
    pub fn with_selector(mut self, selector: Box<dyn WorkerSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Set the task executor.
    pub fn with_executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Set the reflection engine used for follow-up tasks.
    pub fn with_reflection(mut self, reflection: ReflectionEngine) -> Self {
        self.reflection = reflection;
        self
    }

    /// The reflection engine.
    pub fn reflection(&self) -> &ReflectionEngine {
        &self.reflection
    }

    /// Bind each task, in order, to the best available worker.
    ///
    /// Assigned workers lose availability and gain experience immediately, so
    /// later tasks in the same call see the updated pool. No randomness is
    /// involved; identical inputs give identical plans.
    pub fn plan(
        &self,
        mut tasks: Vec<Task>,
        workers: &mut [Worker],
        performance: &BTreeMap<WorkerId, History>,
    ) -> Plan {
        order_tasks(&mut tasks);

        let mut assignments = Vec::new();
        let mut requests = Vec::new();
        let mut unassigned = Vec::new();

        for task in tasks {
            let Some((index, match_score)) = self.selector.select(&task, workers, performance) else {
                debug!(task = %task.id, priority = ?task.priority, "no available worker");
                unassigned.push(task);
                continue;
            };

            let worker = &mut workers[index];
            let snapshot = worker.clone();
            worker.assign();

            debug!(task = %task.id, worker = %worker.id, match_score, "task assigned");
            assignments.push(Assignment {
                task_id: task.id.clone(),
                worker_id: worker.id.clone(),
                match_score,
            });
            requests.push((task, snapshot));
        }

        Plan {
            assignments,
            requests,
            unassigned,
        }
    }

    /// Assign, execute concurrently, and feed results back.
    ///
    /// Seeds for every execution are drawn from `rng` in assignment order and
    /// results are put back in that order, so the outcome depends only on the
    /// inputs and the generator state.
    pub async fn schedule<R: Rng + ?Sized>(
        &self,
        tasks: Vec<Task>,
        workers: &mut [Worker],
        performance: &mut BTreeMap<WorkerId, History>,
        iteration: u64,
        rng: &mut R,
    ) -> Result<ScheduleOutcome> {
        let Plan {
            assignments,
            requests,
            unassigned,
        } = self.plan(tasks, workers, performance);

        let executed: Vec<Task> = requests.iter().map(|(task, _)| task.clone()).collect();
        let seeds: Vec<u64> = requests.iter().map(|_| rng.gen()).collect();

        let mut set = JoinSet::new();
        for (index, ((task, worker), seed)) in requests.into_iter().zip(seeds).enumerate() {
            let executor = Arc::clone(&self.executor);
            let request = ExecutionRequest {
                task,
                worker,
                iteration,
                seed,
            };
            set.spawn(async move { (index, executor.execute(request).await) });
        }

        let mut outcomes = Vec::with_capacity(assignments.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    return Err(CycleError::component(
                        Component::Scheduler,
                        format!("execution task did not complete: {}", e),
                    ));
                }
            }
        }
        outcomes.sort_by_key(|(index, _)| *index);

        let mut results = Vec::with_capacity(outcomes.len());
        let mut failed_executions = 0;
        for (_, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    performance
                        .entry(result.worker_id.clone())
                        .or_insert_with(|| History::new(self.history_capacity))
                        .push(result.performance_score);
                    results.push(result);
                }
                Err(e) => {
                    warn!(error = %e, "execution failed, result dropped");
                    failed_executions += 1;
                }
            }
        }

        let value_generated = results.iter().map(|r| r.value_generated).sum();
        let new_tasks = self.reflection.follow_ups(&results, &executed, iteration, rng);
        let coordination = CoordinationMetrics::measure(&assignments, &results);

        info!(
            assigned = assignments.len(),
            unassigned = unassigned.len(),
            success_rate = coordination.success_rate,
            value_generated,
            follow_ups = new_tasks.len(),
            "tasks scheduled"
        );

        Ok(ScheduleOutcome {
            assignments,
            results,
            new_tasks,
            unassigned,
            failed_executions,
            value_generated,
            coordination,
        })
    }
}
