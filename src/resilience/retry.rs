//! Bounded-retry execution of one operation against one destination.
//!
//! # Responsibilities
//! - Gate every attempt through the destination's circuit breaker
//! - Enforce the per-attempt timeout (the hard cancellation boundary)
//! - Retry only error kinds the policy marks retryable
//! - Report every outcome to the circuit breaker and health tracker
//!
//! # Design Decisions
//! - Total attempts = max_attempts + 1 (initial call plus retries)
//! - A circuit rejection aborts immediately without consuming budget
//! - The attempt log is returned alongside the result for auditability

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::destination::{CallResult, Destination};
use crate::error::{CallError, DispatchError, ErrorKind};
use crate::health::HealthTracker;
use crate::observability::metrics;
use crate::resilience::backoff::{BackoffStrategy, Jitter};
use crate::resilience::circuit_breaker::CircuitBreakerRegistry;
use crate::task::{AttemptOutcome, CallAttempt};

/// Retry behavior for one task/destination pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Number of retries after the initial attempt.
    pub max_attempts: u32,
    pub strategy: BackoffStrategy,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
    pub retryable_kinds: HashSet<ErrorKind>,
    pub timeout_per_attempt_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            strategy: BackoffStrategy::default(),
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            jitter: true,
            retryable_kinds: [ErrorKind::Network, ErrorKind::Timeout, ErrorKind::Resource]
                .into_iter()
                .collect(),
            timeout_per_attempt_secs: 30,
        }
    }
}

impl RetryPolicy {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn timeout_per_attempt(&self) -> Duration {
        Duration::from_secs(self.timeout_per_attempt_secs)
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        self.retryable_kinds.contains(&kind)
    }
}

/// Executes calls against one destination under a retry policy.
pub struct RetryEngine {
    breakers: Arc<CircuitBreakerRegistry>,
    health: Arc<HealthTracker>,
    jitter: Jitter,
}

impl RetryEngine {
    pub fn new(breakers: Arc<CircuitBreakerRegistry>, health: Arc<HealthTracker>) -> Self {
        Self {
            breakers,
            health,
            jitter: Jitter::new(),
        }
    }

    /// Reproducible jitter for tests.
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter = Jitter::with_seed(seed);
        self
    }

    /// Execute the destination's opaque call under `policy`.
    ///
    /// Appends one [`CallAttempt`] per attempt to `attempts`, including
    /// circuit rejections (zero-duration entries).
    pub async fn execute(
        &self,
        destination: &Destination,
        payload: &serde_json::Value,
        policy: &RetryPolicy,
        attempts: &mut Vec<CallAttempt>,
    ) -> Result<CallResult, DispatchError> {
        let total_attempts = policy.max_attempts + 1;
        let mut last_error: Option<CallError> = None;

        for attempt_no in 1..=total_attempts {
            if !self.breakers.allow_call(&destination.id) {
                tracing::debug!(
                    destination = %destination.id,
                    attempt = attempt_no,
                    "call rejected by open circuit"
                );
                attempts.push(CallAttempt {
                    attempt_no,
                    destination_id: destination.id.clone(),
                    duration: Duration::ZERO,
                    outcome: AttemptOutcome::Failure,
                    error_kind: None,
                });
                return Err(DispatchError::CircuitOpen {
                    destination: destination.id.clone(),
                });
            }

            let started = Instant::now();
            let outcome = tokio::time::timeout(
                policy.timeout_per_attempt(),
                destination
                    .adapter
                    .call(payload.clone(), policy.timeout_per_attempt()),
            )
            .await;
            let duration = started.elapsed();

            match outcome {
                Ok(Ok(result)) => {
                    self.breakers.on_result(&destination.id, true);
                    self.health
                        .record_outcome(&destination.id, true, duration, None);
                    metrics::record_call(&destination.id, true, duration);
                    attempts.push(CallAttempt {
                        attempt_no,
                        destination_id: destination.id.clone(),
                        duration,
                        outcome: AttemptOutcome::Success,
                        error_kind: None,
                    });
                    if attempt_no > 1 {
                        tracing::debug!(
                            destination = %destination.id,
                            attempt = attempt_no,
                            "call succeeded after retries"
                        );
                    }
                    return Ok(result);
                }
                Ok(Err(error)) => {
                    self.record_failure(destination, attempt_no, duration, &error, attempts);
                    if !policy.is_retryable(error.kind) {
                        tracing::info!(
                            destination = %destination.id,
                            kind = ?error.kind,
                            "error kind not retryable, failing fast"
                        );
                        return Err(DispatchError::NonRetryable(error));
                    }
                    last_error = Some(error);
                }
                Err(_elapsed) => {
                    let error = CallError::timeout(format!(
                        "attempt exceeded {}s",
                        policy.timeout_per_attempt_secs
                    ));
                    self.record_failure(destination, attempt_no, duration, &error, attempts);
                    if !policy.is_retryable(ErrorKind::Timeout) {
                        return Err(DispatchError::NonRetryable(error));
                    }
                    last_error = Some(error);
                }
            }

            if attempt_no < total_attempts {
                let mut delay =
                    policy
                        .strategy
                        .delay(attempt_no, policy.base_delay(), policy.max_delay());
                if policy.jitter {
                    delay = self.jitter.apply(delay);
                }
                tracing::debug!(
                    destination = %destination.id,
                    attempt = attempt_no,
                    delay_ms = delay.as_millis() as u64,
                    "backing off before next attempt"
                );
                tokio::time::sleep(delay).await;
            }
        }

        let last = last_error.unwrap_or_else(|| CallError::new(ErrorKind::Unknown, "no attempts ran"));
        tracing::warn!(
            destination = %destination.id,
            attempts = total_attempts,
            last_error = %last,
            "retries exhausted"
        );
        Err(DispatchError::RetryExhausted {
            attempts: total_attempts,
            last,
        })
    }

    fn record_failure(
        &self,
        destination: &Destination,
        attempt_no: u32,
        duration: Duration,
        error: &CallError,
        attempts: &mut Vec<CallAttempt>,
    ) {
        self.breakers.on_result(&destination.id, false);
        self.health
            .record_outcome(&destination.id, false, duration, Some(error.kind));
        metrics::record_call(&destination.id, false, duration);
        tracing::warn!(
            destination = %destination.id,
            attempt = attempt_no,
            kind = ?error.kind,
            error = %error,
            "call attempt failed"
        );
        attempts.push(CallAttempt {
            attempt_no,
            destination_id: destination.id.clone(),
            duration,
            outcome: if error.kind == ErrorKind::Timeout {
                AttemptOutcome::Timeout
            } else {
                AttemptOutcome::Failure
            },
            error_kind: Some(error.kind),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::{DestinationDescriptor, DestinationRegistry};
    use crate::destination::adapter::{CallAdapter, FnAdapter};
    use crate::events::TracingSink;
    use crate::resilience::circuit_breaker::CircuitBreakerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn engine() -> (RetryEngine, Arc<CircuitBreakerRegistry>) {
        let sink: crate::events::SharedSink = Arc::new(TracingSink);
        let breakers = Arc::new(CircuitBreakerRegistry::new(
            CircuitBreakerConfig::default(),
            sink.clone(),
        ));
        let health = Arc::new(HealthTracker::new(sink));
        (
            RetryEngine::new(breakers.clone(), health).with_jitter_seed(7),
            breakers,
        )
    }

    fn destination(adapter: Arc<dyn CallAdapter>) -> Arc<Destination> {
        let registry = DestinationRegistry::new();
        registry.register(DestinationDescriptor::new("d1"), adapter);
        registry.get("d1").unwrap()
    }

    fn flaky_adapter(failures: u32) -> Arc<dyn CallAdapter> {
        let counter = Arc::new(AtomicU32::new(0));
        Arc::new(FnAdapter(move |_payload, _timeout| -> futures_util::future::BoxFuture<'static, Result<crate::destination::adapter::CallResult, crate::error::CallError>> {
            let counter = counter.clone();
            Box::pin(async move {
                if counter.fetch_add(1, Ordering::SeqCst) < failures {
                    Err(CallError::network("connection refused"))
                } else {
                    Ok(CallResult::new(serde_json::json!("ok")))
                }
            })
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let (engine, _) = engine();
        let dest = destination(flaky_adapter(2));
        let policy = RetryPolicy::default();
        let mut attempts = Vec::new();

        let result = engine
            .execute(&dest, &serde_json::json!({}), &policy, &mut attempts)
            .await;
        assert!(result.is_ok());
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[2].outcome, AttemptOutcome::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_bounded_by_policy() {
        let (engine, _) = engine();
        let dest = destination(flaky_adapter(u32::MAX));
        let policy = RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        };
        let mut attempts = Vec::new();

        let result = engine
            .execute(&dest, &serde_json::json!({}), &policy, &mut attempts)
            .await;
        assert!(matches!(
            result,
            Err(DispatchError::RetryExhausted { attempts: 3, .. })
        ));
        assert_eq!(attempts.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_fast() {
        let (engine, _) = engine();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let dest = destination(Arc::new(FnAdapter(move |_p, _t| -> futures_util::future::BoxFuture<'static, Result<crate::destination::adapter::CallResult, crate::error::CallError>> {
            let calls = calls_clone.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CallError::new(ErrorKind::Validation, "bad payload"))
            })
        })));
        let policy = RetryPolicy::default();
        let mut attempts = Vec::new();

        let result = engine
            .execute(&dest, &serde_json::json!({}), &policy, &mut attempts)
            .await;
        assert!(matches!(result, Err(DispatchError::NonRetryable(e)) if e.kind == ErrorKind::Validation));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_attempt_timeout_classified() {
        let (engine, _) = engine();
        let dest = destination(Arc::new(FnAdapter(|_p, _t| -> futures_util::future::BoxFuture<'static, Result<crate::destination::adapter::CallResult, crate::error::CallError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(CallResult::new(serde_json::json!("late")))
            })
        })));
        let policy = RetryPolicy {
            max_attempts: 1,
            timeout_per_attempt_secs: 5,
            ..RetryPolicy::default()
        };
        let mut attempts = Vec::new();

        let result = engine
            .execute(&dest, &serde_json::json!({}), &policy, &mut attempts)
            .await;
        assert!(matches!(result, Err(DispatchError::RetryExhausted { .. })));
        assert!(attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_short_circuits() {
        let (engine, breakers) = engine();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let dest = destination(Arc::new(FnAdapter(move |_p, _t| -> futures_util::future::BoxFuture<'static, Result<crate::destination::adapter::CallResult, crate::error::CallError>> {
            let calls = calls_clone.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(CallResult::new(serde_json::json!("ok")))
            })
        })));
        breakers.trip("d1");

        let policy = RetryPolicy::default();
        let mut attempts = Vec::new();
        let result = engine
            .execute(&dest, &serde_json::json!({}), &policy, &mut attempts)
            .await;

        assert!(matches!(result, Err(DispatchError::CircuitOpen { .. })));
        // No network call, no retry budget consumed.
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].duration, Duration::ZERO);
    }
}
