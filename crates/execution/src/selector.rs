//! Worker selection strategies.

use optiloop_core::{History, Task, Worker, WorkerId};
use std::collections::BTreeMap;

/// Strategy for choosing which worker takes a task.
pub trait WorkerSelector: Send + Sync {
    /// Suitability of `worker` for `task`.
    fn score(&self, task: &Task, worker: &Worker, performance: Option<&History>) -> f64;

    /// Index and score of the best available worker, or `None` if nobody is
    /// available. Ties keep the first worker in pool order.
    fn select(
        &self,
        task: &Task,
        workers: &[Worker],
        performance: &BTreeMap<WorkerId, History>,
    ) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (index, worker) in workers.iter().enumerate() {
            if !worker.is_available() {
                continue;
            }
            let score = self.score(task, worker, performance.get(&worker.id));
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((index, score));
            }
        }
        best
    }
}

/// Default selector weighing skill, recent performance and experience.
pub struct PerformanceSelector {
    /// Performance entries averaged for the recent-performance factor
    recent_window: usize,
    /// Recent-performance factor for workers with no history
    baseline: f64,
    /// Multiplier when the task type matches the specialization
    specialization_bonus: f64,
}

impl PerformanceSelector {
    /// Create a new performance selector.
    pub fn new() -> Self {
        Self {
            recent_window: 5,
            baseline: 0.7,
            specialization_bonus: 1.5,
        }
    }

    /// Set how many recent performance entries are averaged.
    pub fn with_recent_window(mut self, window: usize) -> Self {
        self.recent_window = window.max(1);
        self
    }

    /// Mean of the recent performance entries, or the new-worker baseline.
    pub fn recent_performance(&self, performance: Option<&History>) -> f64 {
        performance
            .and_then(|h| h.recent_mean(self.recent_window))
            .unwrap_or(self.baseline)
    }
}

/// `min(1, 0.7 + 0.01 * experience)`.
pub fn experience_factor(experience: u32) -> f64 {
    (0.7 + 0.01 * experience as f64).min(1.0)
}

impl Default for PerformanceSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerSelector for PerformanceSelector {
    fn score(&self, task: &Task, worker: &Worker, performance: Option<&History>) -> f64 {
        let base = worker.skill_level
            * self.recent_performance(performance)
            * experience_factor(worker.experience);
        if worker.specializes_in(&task.task_type) {
            base * self.specialization_bonus
        } else {
            base
        }
    }
}

/// Selector strategies available.
pub enum SelectorStrategy {
    /// Skill, performance and experience weighted selector
    Performance(PerformanceSelector),
}

impl WorkerSelector for SelectorStrategy {
    fn score(&self, task: &Task, worker: &Worker, performance: Option<&History>) -> f64 {
        match self {
            Self::Performance(s) => s.score(task, worker, performance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optiloop_core::{Priority, TaskAction, TaskId, WorkerSpec};

    fn worker(id: &str, specialization: &str, skill: f64) -> Worker {
        Worker::from_spec(WorkerSpec::new(id, specialization, skill)).unwrap()
    }

    fn task(task_type: &str) -> Task {
        Task::new(TaskId::new("t1"), task_type, TaskAction::Analyze, Priority::High, 0.3, 100.0)
    }

    #[test]
    fn test_score_new_worker_baseline() {
        let selector = PerformanceSelector::new();
        let score = selector.score(&task("research"), &worker("w1", "analysis", 0.8), None);
        // 0.8 * 0.7 * 0.7
        assert!((score - 0.392).abs() < 1e-12);
    }

    #[test]
    fn test_score_specialization_bonus_and_history() {
        let selector = PerformanceSelector::new();
        let mut history = History::new(10);
        for v in [0.2, 0.9, 0.9, 0.9, 0.9, 0.9] {
            history.push(v);
        }
        let mut w = worker("w1", "analysis", 0.8);
        w.experience = 50;
        let score = selector.score(&task("analysis"), &w, Some(&history));
        // 0.8 * 0.9 * 1.0 * 1.5 (only the last five entries count)
        assert!((score - 1.08).abs() < 1e-9);
    }

    #[test]
    fn test_experience_factor_caps() {
        assert!((experience_factor(0) - 0.7).abs() < 1e-12);
        assert!((experience_factor(10) - 0.8).abs() < 1e-12);
        assert_eq!(experience_factor(30), 1.0);
        assert_eq!(experience_factor(500), 1.0);
    }

    #[test]
    fn test_select_skips_unavailable_and_keeps_first_on_tie() {
        let selector = PerformanceSelector::new();
        let mut busy = worker("busy", "analysis", 1.0);
        busy.availability = 0.5;
        let workers = vec![busy, worker("a", "research", 0.6), worker("b", "research", 0.6)];

        let (index, _) = selector.select(&task("analysis"), &workers, &BTreeMap::new()).unwrap();
        assert_eq!(workers[index].id.as_str(), "a");
    }

    #[test]
    fn test_select_none_available() {
        let selector = SelectorStrategy::Performance(PerformanceSelector::new());
        let mut w = worker("w1", "analysis", 0.9);
        w.availability = 0.2;
        assert!(selector.select(&task("analysis"), &[w], &BTreeMap::new()).is_none());
    }
}
