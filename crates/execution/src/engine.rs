//! The cycle driver - runs the optimization loop.

use crate::{
    ConvergencePredicate, CoordinationMetrics, ScheduleOutcome, TaskExecutor, TaskScheduler,
    ThresholdPredicate, WorkerSelector,
};
use optiloop_core::{
    Assignment, BacklogPolicy, Component, CycleConfig, CycleError, CycleState, CycleStatus,
    ExecutionResult, OptimizationAction, Result, Task, Time, Worker, WorkerSpec, MetricSpec,
};
use optiloop_evolution::{build_metrics, MetricOptimizer};
use optiloop_progress::{ConvergencePredictor, Prediction, PredictorConfig};
use optiloop_reflection::ReflectionEngine;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSummary {
    /// Iteration the tick ran as
    pub iteration: u64,
    /// Status after the tick
    pub status: CycleStatus,
    /// Composite score after the tick
    pub score: f64,
    /// Whether the tick failed and was rolled back
    pub failed: bool,
    /// Error that failed the tick
    pub error: Option<String>,
    /// Optimizer actions
    pub actions: Vec<OptimizationAction>,
    /// Predictor output
    pub prediction: Option<Prediction>,
    /// Task assignments
    pub assignments: Vec<Assignment>,
    /// Execution outcomes
    pub results: Vec<ExecutionResult>,
    /// Scheduler coordination metrics
    pub coordination: Option<CoordinationMetrics>,
    /// Follow-up tasks created
    pub new_tasks: usize,
    /// Tasks no worker could take
    pub unassigned: usize,
    /// Tasks discarded by the backlog policy
    pub dropped: usize,
    /// Value produced this tick
    pub value_generated: f64,
}

impl TickSummary {
    /// A summary for a tick that did no work.
    fn idle(state: &CycleState) -> Self {
        Self {
            iteration: state.iteration,
            status: state.status,
            score: state.composite_score(),
            failed: false,
            error: None,
            actions: Vec::new(),
            prediction: None,
            assignments: Vec::new(),
            results: Vec::new(),
            coordination: None,
            new_tasks: 0,
            unassigned: 0,
            dropped: 0,
            value_generated: 0.0,
        }
    }
}

/// Result of a single tick.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    /// State with this tick's deltas merged
    pub state: CycleState,
    /// What the tick did
    pub summary: TickSummary,
    /// Whether the cycle has finished
    pub done: bool,
}

/// Final report for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Composite score at the end
    pub final_score: f64,
    /// Ticks run, failed ones included
    pub total_iterations: u64,
    /// Value produced by all executions
    pub total_value_generated: f64,
    /// Final value of every metric
    pub per_metric_final_values: BTreeMap<String, f64>,
    /// Terminal status
    pub status: CycleStatus,
    /// Ticks that failed and were rolled back
    pub failed_ticks: u64,
    /// When the run started
    pub started_at: Time,
    /// When the run finished
    pub finished_at: Time,
}

/// Work done by a successful tick, before the predicate runs.
struct TickWork {
    actions: Vec<OptimizationAction>,
    prediction: Prediction,
    schedule: ScheduleOutcome,
    dropped: usize,
}

/// The cycle driver.
///
/// Runs the loop:
/// ```text
/// Optimize → Predict → Reflect → Schedule → Merge → Evaluate
/// ```
pub struct CycleDriver {
    config: CycleConfig,
    optimizer: MetricOptimizer,
    predictor: ConvergencePredictor,
    scheduler: TaskScheduler,
    predicate: Box<dyn ConvergencePredicate>,
    rng: StdRng,
    cancel: CancellationToken,
    seed_tasks: Vec<Task>,
}

impl CycleDriver {
    /// Create a driver for `config`.
    ///
    /// The random source is seeded from `config.seed`, or from entropy when
    /// no seed is set.
    pub fn new(config: CycleConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            optimizer: MetricOptimizer::new(),
            predictor: ConvergencePredictor::new(PredictorConfig::from(&config)),
            scheduler: TaskScheduler::new(config.history_capacity),
            predicate: Box::new(ThresholdPredicate),
            rng,
            cancel: CancellationToken::new(),
            seed_tasks: Vec::new(),
            config,
        })
    }

    /// Set the task executor.
    pub fn with_executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.scheduler = self.scheduler.with_executor(executor);
        self
    }

    /// Set the worker selection strategy.
    pub fn with_selector(mut self, selector: Box<dyn WorkerSelector>) -> Self {
        self.scheduler = self.scheduler.with_selector(selector);
        self
    }

    /// Set the reflection engine.
    pub fn with_reflection(mut self, reflection: ReflectionEngine) -> Self {
        self.scheduler = self.scheduler.with_reflection(reflection);
        self
    }

    /// Set the stopping rule.
    pub fn with_predicate(mut self, predicate: Box<dyn ConvergencePredicate>) -> Self {
        self.predicate = predicate;
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Tasks handed to the first tick of the next cycle.
    pub fn with_seed_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.seed_tasks = tasks;
        self
    }

    /// Token that stops the run at the next tick boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The configuration.
    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Build the initial state from metric and worker specs.
    pub fn new_cycle(
        &mut self,
        metrics: &BTreeMap<String, MetricSpec>,
        workers: Vec<WorkerSpec>,
    ) -> Result<CycleState> {
        let metrics = build_metrics(metrics, &mut self.rng, self.config.history_capacity)?;

        let mut seen = HashSet::new();
        let mut pool = Vec::with_capacity(workers.len());
        for spec in workers {
            if !seen.insert(spec.id.clone()) {
                return Err(CycleError::InvalidConfig(format!("duplicate worker id {}", spec.id)));
            }
            pool.push(Worker::from_spec(spec)?);
        }
        if pool.is_empty() {
            warn!("cycle has no workers, tasks will never be assigned");
        }

        let mut state = CycleState::new(metrics, pool, self.config.history_capacity);
        state.pending_tasks = std::mem::take(&mut self.seed_tasks);

        info!(
            metrics = state.metrics.len(),
            workers = state.worker_pool.len(),
            seed_tasks = state.pending_tasks.len(),
            "cycle created"
        );
        Ok(state)
    }

    /// Accept a state loaded from elsewhere, reopening it if it had finished.
    pub fn resume(&self, mut state: CycleState) -> Result<CycleState> {
        state.validate()?;
        if state.status.is_terminal() {
            info!(status = ?state.status, "reopening a finished cycle");
            state.status = CycleStatus::Running;
        }
        info!(iteration = state.iteration, metrics = state.metrics.len(), "cycle resumed");
        Ok(state)
    }

    /// Run one tick.
    ///
    /// A failing component rolls the state back to where it was before the
    /// tick; only the iteration counter and the failure counters move.
    pub async fn tick(&mut self, mut state: CycleState) -> TickOutcome {
        if state.status.is_terminal() {
            let summary = TickSummary::idle(&state);
            return TickOutcome { state, summary, done: true };
        }
        if self.cancel.is_cancelled() {
            info!(iteration = state.iteration, "cycle cancelled");
            state.status = CycleStatus::Cancelled;
            let summary = TickSummary::idle(&state);
            return TickOutcome { state, summary, done: true };
        }

        let snapshot = state.clone();
        state.iteration += 1;
        let iteration = state.iteration;
        info!(iteration, "tick started");

        match self.advance(&mut state).await {
            Ok(work) => {
                state.consecutive_failures = 0;
                state.status = self.predicate.evaluate(&state, Some(&work.prediction), &self.config);

                let summary = TickSummary {
                    iteration,
                    status: state.status,
                    score: state.composite_score(),
                    failed: false,
                    error: None,
                    actions: work.actions,
                    coordination: Some(work.schedule.coordination),
                    new_tasks: work.schedule.new_tasks.len(),
                    unassigned: work.schedule.unassigned.len(),
                    dropped: work.dropped,
                    value_generated: work.schedule.value_generated,
                    assignments: work.schedule.assignments,
                    results: work.schedule.results,
                    prediction: Some(work.prediction),
                };
                info!(
                    iteration,
                    score = summary.score,
                    status = ?summary.status,
                    pending = state.pending_tasks.len(),
                    "tick finished"
                );
                let done = state.status.is_terminal();
                TickOutcome { state, summary, done }
            }
            Err(e) => {
                error!(iteration, error = %e, "tick failed, rolling back");
                let mut state = snapshot;
                state.iteration = iteration;
                state.failed_ticks += 1;
                state.consecutive_failures += 1;

                state.status = match self.config.max_consecutive_failures {
                    Some(limit) if state.consecutive_failures >= limit => {
                        error!(failures = state.consecutive_failures, "failure limit reached");
                        CycleStatus::Aborted
                    }
                    _ => self.predicate.evaluate(&state, None, &self.config),
                };

                let mut summary = TickSummary::idle(&state);
                summary.failed = true;
                summary.error = Some(e.to_string());
                let done = state.status.is_terminal();
                TickOutcome { state, summary, done }
            }
        }
    }

    /// Tick until the cycle finishes.
    pub async fn run(&mut self, state: CycleState) -> (CycleState, RunSummary) {
        let started_at = chrono::Utc::now();
        info!(
            iteration = state.iteration,
            max_iterations = self.config.max_iterations,
            threshold = self.config.convergence_threshold,
            "run started"
        );

        let mut state = state;
        loop {
            let outcome = self.tick(state).await;
            state = outcome.state;
            if outcome.done {
                break;
            }
        }

        let summary = RunSummary {
            final_score: state.composite_score(),
            total_iterations: state.iteration,
            total_value_generated: state.total_value_generated,
            per_metric_final_values: state.metric_values(),
            status: state.status,
            failed_ticks: state.failed_ticks,
            started_at,
            finished_at: chrono::Utc::now(),
        };
        info!(
            status = ?summary.status,
            iterations = summary.total_iterations,
            score = summary.final_score,
            value = summary.total_value_generated,
            "run finished"
        );
        (state, summary)
    }

    async fn advance(&mut self, state: &mut CycleState) -> Result<TickWork> {
        let iteration = state.iteration;
        state.restore_availability(self.config.availability);

        let optimization = self.optimizer.optimize(&mut state.metrics, iteration - 1)?;
        state.score_history.push(optimization.score());

        let prediction = self.predictor.predict(&state.score_history, &state.metrics);
        if !(prediction.confidence.is_finite() && prediction.velocity.is_finite()) {
            return Err(CycleError::component(
                Component::Predictor,
                format!("non-finite prediction at iteration {}", iteration),
            ));
        }
        debug!(
            remaining = prediction.iterations_remaining,
            confidence = prediction.confidence,
            velocity = prediction.velocity,
            stagnating = prediction.stagnating,
            "prediction"
        );

        let mut tasks = std::mem::take(&mut state.pending_tasks);
        tasks.extend(
            self.scheduler
                .reflection()
                .insight_tasks(&prediction, &state.metrics, iteration, &mut self.rng),
        );

        let schedule = self
            .scheduler
            .schedule(
                tasks,
                &mut state.worker_pool,
                &mut state.worker_performance,
                iteration,
                &mut self.rng,
            )
            .await?;

        state.total_value_generated += schedule.value_generated;
        let (carried, dropped) = apply_backlog(self.config.backlog, schedule.unassigned.clone());
        state.pending_tasks = carried;
        state.pending_tasks.extend(schedule.new_tasks.iter().cloned());

        Ok(TickWork {
            actions: optimization.actions,
            prediction,
            schedule,
            dropped,
        })
    }
}

/// Split unassigned tasks into those carried to the next tick and a count
/// of those discarded.
pub fn apply_backlog(policy: BacklogPolicy, unassigned: Vec<Task>) -> (Vec<Task>, usize) {
    match policy {
        BacklogPolicy::Drop => {
            if !unassigned.is_empty() {
                warn!(count = unassigned.len(), "unassigned tasks dropped");
            }
            let dropped = unassigned.len();
            (Vec::new(), dropped)
        }
        BacklogPolicy::Carry { boost_after } => {
            let mut carried = Vec::with_capacity(unassigned.len());
            let mut dropped = 0;
            for mut task in unassigned {
                task.age += 1;
                if task.is_expired() {
                    warn!(task = %task.id, age = task.age, "backlog task expired");
                    dropped += 1;
                    continue;
                }
                if boost_after > 0 && task.age % boost_after == 0 {
                    task.priority = task.priority.promote();
                    debug!(task = %task.id, priority = ?task.priority, "backlog task promoted");
                }
                carried.push(task);
            }
            (carried, dropped)
        }
    }
}
