//! Task model - the unit of work handed to workers.

use serde::{Deserialize, Serialize};
use crate::id::{TaskId, WorkerId};

/// A task represents a unit of work that can be assigned and executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Kind of work, matched textually against worker specializations
    pub task_type: String,

    /// What the task does for the loop
    #[serde(default)]
    pub action: TaskAction,

    /// Metric this task is about, if any
    #[serde(default)]
    pub metric: Option<String>,

    /// Scheduling priority
    pub priority: Priority,

    /// Difficulty in [0, 1]
    pub complexity: f64,

    /// Expected value if executed successfully
    pub estimated_value: f64,

    /// Ticks the task may wait before it expires
    pub deadline_iterations: u32,

    /// Ticks spent waiting in the backlog
    #[serde(default)]
    pub age: u32,
}

impl Task {
    /// Create a task with the priority's default deadline.
    pub fn new(
        id: TaskId,
        task_type: impl Into<String>,
        action: TaskAction,
        priority: Priority,
        complexity: f64,
        estimated_value: f64,
    ) -> Self {
        Self {
            id,
            task_type: task_type.into(),
            action,
            metric: None,
            priority,
            complexity: complexity.clamp(0.0, 1.0),
            estimated_value,
            deadline_iterations: priority.default_deadline(),
            age: 0,
        }
    }

    /// Attach the metric the task targets.
    pub fn for_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    /// Whether the task has waited past its deadline.
    pub fn is_expired(&self) -> bool {
        self.age > self.deadline_iterations
    }
}

/// What a task contributes to the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    /// Investigate a lagging metric
    #[default]
    Analyze,
    /// Act on an insight from a successful execution
    Optimize,
    /// Look for a way off a score plateau
    Research,
}

impl TaskAction {
    /// Stable lowercase tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskAction::Analyze => "analyze",
            TaskAction::Optimize => "optimize",
            TaskAction::Research => "research",
        }
    }
}

/// Scheduling priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Must be handled this tick
    Critical,
    /// Important
    High,
    /// Normal
    Medium,
    /// Nice to have
    Low,
}

impl Priority {
    /// Ordering rank, higher first.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Critical => 4,
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    /// One level up, saturating at critical.
    pub fn promote(self) -> Self {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High | Priority::Critical => Priority::Critical,
        }
    }

    /// Deadline given to tasks of this priority.
    pub fn default_deadline(&self) -> u32 {
        match self {
            Priority::Critical => 2,
            Priority::High => 3,
            Priority::Medium => 5,
            Priority::Low => 8,
        }
    }
}

/// A task bound to a worker during one scheduler invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Assigned task
    pub task_id: TaskId,

    /// Chosen worker
    pub worker_id: WorkerId,

    /// The worker's suitability score for this task
    pub match_score: f64,
}

/// Outcome of executing one assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Executed task
    pub task_id: TaskId,

    /// Worker that executed it
    pub worker_id: WorkerId,

    /// Whether the execution succeeded
    pub success: bool,

    /// Quality of the execution in [0, 1]
    pub performance_score: f64,

    /// Value produced
    pub value_generated: f64,

    /// Observations that seed follow-up work
    #[serde(default)]
    pub insights: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_rank_order() {
        assert!(Priority::Critical.rank() > Priority::High.rank());
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
    }

    #[test]
    fn test_priority_promote_saturates() {
        assert_eq!(Priority::Low.promote(), Priority::Medium);
        assert_eq!(Priority::High.promote(), Priority::Critical);
        assert_eq!(Priority::Critical.promote(), Priority::Critical);
    }

    #[test]
    fn test_task_expiry() {
        let mut task = Task::new(TaskId::new("t1"), "analysis", TaskAction::Analyze, Priority::Critical, 0.4, 100.0);
        assert_eq!(task.deadline_iterations, 2);
        task.age = 2;
        assert!(!task.is_expired());
        task.age = 3;
        assert!(task.is_expired());
    }

    #[test]
    fn test_task_deserializes_priority_lowercase() {
        let task: Task = serde_json::from_str(
            r#"{"id":"seed-1","task_type":"analysis","priority":"critical","complexity":0.2,"estimated_value":100.0,"deadline_iterations":3}"#,
        )
        .unwrap();
        assert_eq!(task.priority, Priority::Critical);
        assert_eq!(task.action, TaskAction::Analyze);
        assert_eq!(task.age, 0);
    }
}
