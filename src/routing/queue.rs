//! Deferred-task priority queue.
//!
//! # Responsibilities
//! - Hold non-critical tasks until the drain loop dequeues them
//! - Order by priority, FIFO within equal priority
//! - Bound memory with a capacity limit
//!
//! # Design Decisions
//! - Min-heap keyed (priority, sequence); the sequence counter makes
//!   equal-priority ordering deterministic
//! - `Notify` wakes the single consumer; push never blocks

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tokio::sync::{Mutex, Notify};

use crate::error::DispatchError;
use crate::task::{Priority, Task};

struct QueuedTask {
    priority: Priority,
    sequence: u64,
    task: Task,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse both keys so the most urgent
        // priority pops first and lower sequence wins within a priority.
        other
            .priority
            .cmp(&self.priority)
            .then(other.sequence.cmp(&self.sequence))
    }
}

/// Bounded priority queue drained by a single consumer loop.
pub struct TaskQueue {
    heap: Mutex<BinaryHeap<QueuedTask>>,
    notify: Notify,
    sequence: AtomicU64,
    capacity: usize,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            sequence: AtomicU64::new(0),
            capacity,
        }
    }

    /// Enqueue a task. Fails when the queue is at capacity.
    pub async fn push(&self, task: Task) -> Result<(), DispatchError> {
        {
            let mut heap = self.heap.lock().await;
            if heap.len() >= self.capacity {
                return Err(DispatchError::QueueFull {
                    capacity: self.capacity,
                });
            }
            let sequence = self.sequence.fetch_add(1, AtomicOrdering::SeqCst);
            tracing::debug!(
                task = %task.id,
                priority = ?task.priority,
                depth = heap.len() + 1,
                "task enqueued"
            );
            heap.push(QueuedTask {
                priority: task.priority,
                sequence,
                task,
            });
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Dequeue the most urgent task, waiting until one is available.
    pub async fn pop(&self) -> Task {
        loop {
            if let Some(task) = self.try_pop().await {
                return task;
            }
            self.notify.notified().await;
        }
    }

    /// Dequeue without waiting.
    pub async fn try_pop(&self) -> Option<Task> {
        self.heap.lock().await.pop().map(|queued| queued.task)
    }

    pub async fn len(&self) -> usize {
        self.heap.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.heap.lock().await.is_empty()
    }
}
