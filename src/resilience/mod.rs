//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to destination:
//!     → circuit_breaker.rs (allow_call gate; fast-fail when open)
//!     → retry.rs (per-attempt timeout, kind-based retryability)
//!     → backoff.rs (inter-attempt delay with jitter)
//!     → every outcome reported back to circuit_breaker + health tracker
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt runs under a hard deadline
//! - A rejected call consumes no retry budget and makes no network round trip
//! - Jitter draws from a seedable rng so tests are reproducible

pub mod backoff;
pub mod circuit_breaker;
pub mod retry;

pub use backoff::{BackoffStrategy, Jitter};
pub use circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use retry::{RetryEngine, RetryPolicy};
