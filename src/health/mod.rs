//! Health tracking subsystem.
//!
//! # Data Flow
//! ```text
//! Passive (tracker.rs):
//!     Every call attempt outcome
//!     → rolling window (last 100 calls or 1h)
//!     → Healthy / Degraded / Unhealthy classification
//!
//! Active (probe.rs):
//!     Periodic timer
//!     → synthetic call per destination
//!     → outcome recorded in tracker + circuit breaker
//!     → softmax load distribution republished
//! ```
//!
//! # Design Decisions
//! - Active and passive signals share one window; probes keep data fresh
//!   under low traffic rather than forming a separate health source
//! - Health state is per-destination; there is no pool-wide lock
//! - Status transitions are logged and emitted as events

pub mod probe;
pub mod tracker;

pub use probe::{HealthProbe, ProbeConfig};
pub use tracker::{HealthSnapshot, HealthStatus, HealthTracker};
