//! Task model.
//!
//! # Responsibilities
//! - Represent a unit of work submitted for dispatch
//! - Track task lifecycle status with monotonic transitions
//! - Record per-attempt call outcomes for auditability
//!
//! # Design Decisions
//! - Payload is opaque JSON; the dispatcher never inspects it beyond routing
//! - Status can only move forward: Pending → Assigned → Running → terminal
//! - Deadlines use the tokio clock so tests can drive expiry deterministically

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::ErrorKind;

/// Task priority levels. Lower discriminant = more urgent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Bypasses the deferred queue entirely.
    Critical = 0,
    High = 1,
    #[default]
    Medium = 2,
    Low = 3,
    /// Background work, drained last.
    Batch = 4,
}

impl Priority {
    /// Parse a priority from its lowercase name. Returns `None` for
    /// unrecognised strings.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "critical" => Some(Priority::Critical),
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            "batch" => Some(Priority::Batch),
            _ => None,
        }
    }
}

/// Caller-supplied description of a task, before an id is assigned.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Domain of the work, e.g. "contract" or "content". Used for
    /// capability keyword matching and per-type success history.
    pub task_type: String,
    pub priority: Priority,
    pub payload: serde_json::Value,
    pub required_capabilities: HashSet<String>,
    /// Optional time budget, measured from submission.
    pub deadline: Option<Duration>,
}

impl TaskSpec {
    pub fn new(task_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            task_type: task_type.into(),
            priority: Priority::default(),
            payload,
            required_capabilities: HashSet::new(),
            deadline: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.required_capabilities.insert(capability.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// A submitted task. Payload and requirements are immutable after creation.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub task_type: String,
    pub priority: Priority,
    pub payload: serde_json::Value,
    pub required_capabilities: HashSet<String>,
    pub deadline: Option<Instant>,
    pub created_at: Instant,
}

impl Task {
    pub fn from_spec(spec: TaskSpec) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            task_type: spec.task_type,
            priority: spec.priority,
            payload: spec.payload,
            required_capabilities: spec.required_capabilities,
            deadline: spec.deadline.map(|d| now + d),
            created_at: now,
        }
    }

    /// True if the task's deadline has already passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Task lifecycle status. Transitions are monotonic; see [`TaskStatus::rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Running,
    Completed,
    Failed,
    /// Deadline elapsed before dispatch; never sent to a destination.
    Expired,
}

impl TaskStatus {
    /// Ordering rank used to enforce forward-only transitions. Terminal
    /// states share the highest rank and never change once reached.
    pub fn rank(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Assigned => 1,
            TaskStatus::Running => 2,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Expired => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 3
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// Outcome of a single call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
    Timeout,
}

/// One entry in a task execution's append-only attempt log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAttempt {
    pub attempt_no: u32,
    pub destination_id: String,
    /// Attempt duration, measured inside the per-attempt timeout.
    pub duration: Duration,
    pub outcome: AttemptOutcome,
    pub error_kind: Option<ErrorKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Low < Priority::Batch);
        assert_eq!(Priority::from_name("CRITICAL"), Some(Priority::Critical));
        assert_eq!(Priority::from_name("urgent"), None);
    }

    #[test]
    fn test_status_transitions_are_monotonic() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Assigned));
        assert!(TaskStatus::Assigned.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Expired));

        // Never backwards, never out of a terminal state.
        assert!(!TaskStatus::Running.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Failed));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::Running));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expiry() {
        let spec = TaskSpec::new("content", serde_json::json!({"q": 1}))
            .with_deadline(Duration::from_secs(5));
        let task = Task::from_spec(spec);
        assert!(!task.is_expired());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(task.is_expired());
    }
}
