//! Error taxonomy for destination calls and orchestration.
//!
//! # Responsibilities
//! - Classify call failures into kinds that drive retryability
//! - Typed orchestration errors (circuit open, retries exhausted, ...)
//!
//! # Design Decisions
//! - Validation and auth errors are never retried; surfaced verbatim
//! - Orchestration errors are distinct from call errors: a `CircuitOpen`
//!   consumed no retry budget and no network round trip

use serde::{Deserialize, Serialize};

/// Classification of a failed destination call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection-level failure (refused, reset, DNS).
    Network,
    /// Per-attempt deadline exceeded.
    Timeout,
    /// Credentials rejected by the destination.
    Auth,
    /// Malformed request payload.
    Validation,
    /// Destination over capacity (rate limit, quota).
    Resource,
    /// Destination accepted the call but failed to execute it.
    Execution,
    /// Anything that could not be classified.
    Unknown,
}

/// Error returned by a destination adapter, tagged with its kind.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?} error: {message}")]
pub struct CallError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CallError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }
}

/// Errors produced by the routing and resilience layers themselves.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// Circuit breaker rejected the call before any network activity.
    #[error("circuit open for destination {destination}")]
    CircuitOpen { destination: String },

    /// All retry attempts against one destination failed.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: CallError },

    /// A non-retryable error kind short-circuited the retry loop.
    #[error("non-retryable failure: {0}")]
    NonRetryable(CallError),

    /// No destination satisfies the task's requirements.
    #[error("no candidate destination for task")]
    NoCandidateDestination,

    /// The task's deadline elapsed before it could be dispatched.
    #[error("task {task_id} expired before dispatch")]
    TaskExpired { task_id: String },

    /// The destination id is not registered.
    #[error("unknown destination {0}")]
    UnknownDestination(String),

    /// The deferred queue is at capacity.
    #[error("task queue full (capacity {capacity})")]
    QueueFull { capacity: usize },
}

impl DispatchError {
    /// Whether the fallback selector should be consulted after this error.
    pub fn escalates_to_fallback(&self) -> bool {
        matches!(
            self,
            DispatchError::CircuitOpen { .. } | DispatchError::RetryExhausted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation() {
        let open = DispatchError::CircuitOpen {
            destination: "d1".into(),
        };
        assert!(open.escalates_to_fallback());

        let invalid = DispatchError::NonRetryable(CallError::new(ErrorKind::Validation, "bad"));
        assert!(!invalid.escalates_to_fallback());
    }
}
