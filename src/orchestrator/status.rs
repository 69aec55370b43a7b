//! Task status registry.
//!
//! # Responsibilities
//! - Track the lifecycle status of every submitted task
//! - Enforce monotonic transitions; an illegal transition is ignored and
//!   logged, never applied
//!
//! The board does not expire entries itself; the orchestrator forgets a
//! task when its result is collected or evicted from retention.

use dashmap::DashMap;
use uuid::Uuid;

use crate::task::TaskStatus;

/// Concurrent task-id → status map with forward-only updates.
#[derive(Default)]
pub struct StatusBoard {
    statuses: DashMap<Uuid, TaskStatus>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new task as Pending.
    pub fn insert(&self, task_id: Uuid) {
        self.statuses.insert(task_id, TaskStatus::Pending);
    }

    /// Advance a task's status. Backwards transitions are dropped.
    pub fn advance(&self, task_id: Uuid, next: TaskStatus) {
        match self.statuses.get_mut(&task_id) {
            Some(mut current) => {
                if current.can_transition_to(next) {
                    *current = next;
                } else if *current != next {
                    tracing::warn!(
                        task = %task_id,
                        from = ?*current,
                        to = ?next,
                        "ignoring non-monotonic status transition"
                    );
                }
            }
            None => {
                self.statuses.insert(task_id, next);
            }
        }
    }

    pub fn get(&self, task_id: Uuid) -> Option<TaskStatus> {
        self.statuses.get(&task_id).map(|status| *status)
    }

    /// Drop a task's entry once its result has been collected or evicted.
    pub fn forget(&self, task_id: Uuid) {
        self.statuses.remove(&task_id);
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_updates() {
        let board = StatusBoard::new();
        let id = Uuid::new_v4();
        board.insert(id);
        assert_eq!(board.get(id), Some(TaskStatus::Pending));

        board.advance(id, TaskStatus::Running);
        board.advance(id, TaskStatus::Completed);
        assert_eq!(board.get(id), Some(TaskStatus::Completed));

        // Terminal state never reverts.
        board.advance(id, TaskStatus::Pending);
        board.advance(id, TaskStatus::Failed);
        assert_eq!(board.get(id), Some(TaskStatus::Completed));
    }
}
