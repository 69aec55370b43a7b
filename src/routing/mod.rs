//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! submit_task
//!     → Critical: router.rs scores candidates synchronously
//!     → otherwise: queue.rs (priority min-heap, FIFO within priority)
//!         → single drain loop dequeues, checks deadline, routes
//!     → scorer.rs (capability / performance / load / cost weights)
//!     → RoutingDecision { destination, confidence, fallback_list, reason }
//!     → on failure: fallback.rs orders the remaining candidates
//! ```
//!
//! # Design Decisions
//! - One logical drain loop keeps equal-priority ordering deterministic;
//!   the dispatched call itself runs concurrently with others
//! - A destination missing a required capability is never selected while a
//!   capability-complete candidate exists
//! - Load counters increment on dispatch and decay multiplicatively per tick

pub mod fallback;
pub mod queue;
pub mod router;
pub mod scorer;

pub use fallback::FallbackSelector;
pub use queue::TaskQueue;
pub use router::{RouterConfig, RoutingDecision, TaskRouter};
pub use scorer::ScoringWeights;
