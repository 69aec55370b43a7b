//! Orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! submit_task
//!     → status.rs (Pending)
//!     → Critical: execute immediately | else: deferred queue
//!     → drain loop → execute_task
//!         → router (score, pick primary)
//!         → retry engine (primary, bounded attempts)
//!         → fallback selector (health-ordered alternates, bounded)
//!         → backup (last resort)
//!     → TaskResult { status, output, degraded, attempts }
//! ```
//!
//! # Design Decisions
//! - execute_task is infallible: exhaustion produces a Failed result with
//!   the full attempt log, never an Err
//! - A fallback success is flagged degraded so callers can tell reduced
//!   service from full service
//! - The backup sits outside the fallback attempt budget

pub mod dispatcher;
pub mod status;

pub use dispatcher::{DestinationReport, ResilienceOrchestrator, SystemHealth, TaskResult};
pub use status::StatusBoard;
