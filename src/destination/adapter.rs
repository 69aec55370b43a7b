//! Destination call adapter trait.
//!
//! # Responsibilities
//! - Define the single abstract operation the retry engine invokes
//! - Keep concrete transports (HTTP/RPC/SDK) out of the core
//!
//! # Design Decisions
//! - Boxed futures keep the trait object-safe so destinations with different
//!   transports share one registry
//! - The adapter receives the per-attempt timeout as advisory context; the
//!   retry engine enforces the hard deadline regardless

use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::error::CallError;

/// Successful output of a destination call.
#[derive(Debug, Clone)]
pub struct CallResult {
    /// Opaque response payload.
    pub output: serde_json::Value,
    /// Destination-reported confidence in the output, 0.0 – 1.0.
    pub confidence: f64,
    /// Cost actually incurred, if the destination reports it.
    pub cost: f64,
}

impl CallResult {
    pub fn new(output: serde_json::Value) -> Self {
        Self {
            output,
            confidence: 1.0,
            cost: 0.0,
        }
    }
}

/// The one operation a destination exposes to the dispatcher.
///
/// Implementations live outside this crate (per-provider adapters). They must
/// be cheap to call concurrently; the dispatcher issues overlapping calls to
/// the same adapter.
pub trait CallAdapter: Send + Sync {
    fn call(
        &self,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<CallResult, CallError>>;
}

/// Adapter built from an async closure. Used by tests and simple embeddings.
pub struct FnAdapter<F>(pub F);

impl<F> CallAdapter for FnAdapter<F>
where
    F: Fn(serde_json::Value, Duration) -> BoxFuture<'static, Result<CallResult, CallError>>
        + Send
        + Sync,
{
    fn call(
        &self,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<CallResult, CallError>> {
        (self.0)(payload, timeout)
    }
}
