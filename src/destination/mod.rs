//! Destination subsystem.
//!
//! # Data Flow
//! ```text
//! Discovery collaborator
//!     → registry.rs (register/deregister destinations)
//!     → Router reads capabilities, cost, load
//!     → Retry engine invokes adapter.rs (the single opaque call)
//!     → Outcome feeds Health Tracker + Circuit Breaker
//! ```
//!
//! # Design Decisions
//! - The core never depends on a provider SDK; adapters implement one
//!   capability-tagged trait and live outside this crate
//! - Per-destination load is a CAS-updated float, decayed by the router tick
//! - Registry is a concurrent map, not a module-level singleton; injectable
//!   for tests

pub mod adapter;
pub mod registry;

pub use adapter::{CallAdapter, CallResult};
pub use registry::{Destination, DestinationDescriptor, DestinationRegistry};
