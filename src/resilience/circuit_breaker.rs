//! Per-destination circuit breakers.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: destination assumed down, calls fail fast
//! - Half-Open: probing recovery with a single outstanding call
//!
//! # State Transitions
//! ```text
//! Closed → Open:      consecutive_failures >= failure_threshold
//! Open → Half-Open:   lazily, on the next allow_call after recovery_timeout
//! Half-Open → Closed: half_open_successes >= success_threshold
//! Half-Open → Open:   any failure (opened_at reset)
//! ```
//!
//! # Design Decisions
//! - One breaker per destination, no global circuit
//! - A rejected call makes no network round trip and consumes no retry budget
//! - At most one probe call is outstanding in Half-Open until it resolves

use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::events::{Event, EventType, SharedSink};
use crate::observability::metrics;

/// Breaker thresholds. Defaults follow the dispatcher configuration; they are
/// operating points, not tuned truths.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Consecutive half-open successes before the circuit closes.
    pub success_threshold: u32,
    /// Seconds in Open before the next call may probe.
    pub recovery_timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            recovery_timeout_secs: 60,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl Breaker {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            opened_at: None,
            probe_in_flight: false,
        }
    }
}

/// Registry of per-destination breakers with atomic per-key transitions.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Mutex<Breaker>>,
    config: CircuitBreakerConfig,
    events: SharedSink,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig, events: SharedSink) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
            events,
        }
    }

    /// Whether a call to this destination may proceed right now.
    ///
    /// Returning `false` is a fast-fail: no network call happens and the
    /// retry budget is untouched. Open → Half-Open happens lazily here once
    /// the recovery timeout has elapsed.
    pub fn allow_call(&self, destination_id: &str) -> bool {
        self.with_breaker(destination_id, |breaker| match breaker.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = breaker
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.recovery_timeout() {
                    breaker.state = CircuitState::HalfOpen;
                    breaker.half_open_successes = 0;
                    breaker.probe_in_flight = true;
                    tracing::info!(destination = %destination_id, "circuit half-open, probing");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if breaker.probe_in_flight {
                    false
                } else {
                    breaker.probe_in_flight = true;
                    true
                }
            }
        })
    }

    /// Report the outcome of a call previously admitted by [`allow_call`].
    pub fn on_result(&self, destination_id: &str, success: bool) {
        let transition = self.with_breaker(destination_id, |breaker| {
            breaker.probe_in_flight = false;
            match (breaker.state, success) {
                (CircuitState::Closed, true) => {
                    breaker.consecutive_failures = 0;
                    None
                }
                (CircuitState::Closed, false) => {
                    breaker.consecutive_failures += 1;
                    if breaker.consecutive_failures >= self.config.failure_threshold {
                        breaker.state = CircuitState::Open;
                        breaker.opened_at = Some(Instant::now());
                        Some((CircuitState::Open, breaker.consecutive_failures))
                    } else {
                        None
                    }
                }
                (CircuitState::HalfOpen, true) => {
                    breaker.half_open_successes += 1;
                    if breaker.half_open_successes >= self.config.success_threshold {
                        breaker.state = CircuitState::Closed;
                        breaker.consecutive_failures = 0;
                        breaker.half_open_successes = 0;
                        breaker.opened_at = None;
                        Some((CircuitState::Closed, 0))
                    } else {
                        None
                    }
                }
                (CircuitState::HalfOpen, false) => {
                    breaker.state = CircuitState::Open;
                    breaker.opened_at = Some(Instant::now());
                    breaker.half_open_successes = 0;
                    Some((CircuitState::Open, breaker.consecutive_failures))
                }
                // Late results while Open (in-flight call finished after the
                // breaker tripped) do not drive transitions.
                (CircuitState::Open, _) => None,
            }
        });

        if let Some((new_state, failures)) = transition {
            metrics::record_circuit_state(destination_id, new_state);
            match new_state {
                CircuitState::Open => {
                    tracing::warn!(
                        destination = %destination_id,
                        consecutive_failures = failures,
                        "circuit opened"
                    );
                    self.events.emit(
                        Event::new(EventType::CircuitOpened)
                            .destination(destination_id)
                            .details(serde_json::json!({"consecutive_failures": failures})),
                    );
                }
                CircuitState::Closed => {
                    tracing::info!(destination = %destination_id, "circuit closed, destination recovered");
                    self.events.emit(
                        Event::new(EventType::CircuitClosed).destination(destination_id),
                    );
                }
                CircuitState::HalfOpen => {}
            }
        }
    }

    pub fn state(&self, destination_id: &str) -> CircuitState {
        self.with_breaker(destination_id, |breaker| breaker.state)
    }

    /// Maintenance hook: force a breaker back to Closed.
    pub fn reset(&self, destination_id: &str) {
        self.with_breaker(destination_id, |breaker| {
            *breaker = Breaker::new();
        });
        tracing::info!(destination = %destination_id, "circuit manually reset");
    }

    /// Maintenance hook: force a breaker Open.
    pub fn trip(&self, destination_id: &str) {
        self.with_breaker(destination_id, |breaker| {
            breaker.state = CircuitState::Open;
            breaker.opened_at = Some(Instant::now());
            breaker.probe_in_flight = false;
        });
        tracing::warn!(destination = %destination_id, "circuit manually tripped");
    }

    /// Drop a destination's breaker on deregistration.
    pub fn forget(&self, destination_id: &str) {
        self.breakers.remove(destination_id);
    }

    fn with_breaker<T>(&self, destination_id: &str, f: impl FnOnce(&mut Breaker) -> T) -> T {
        let entry = self
            .breakers
            .entry(destination_id.to_string())
            .or_insert_with(|| Mutex::new(Breaker::new()));
        let mut breaker = match entry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut breaker)
    }
}
