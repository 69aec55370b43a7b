//! Resilient task dispatcher.
//!
//! Routes tasks to remote, independently failing compute destinations and
//! keeps the system useful while parts of it are down.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────┐
//!                    │               ORCHESTRATOR                      │
//!                    │                                                │
//!   submit_task ─────┼─▶ priority queue ──▶ router ──▶ retry engine ──┼──▶ destination
//!                    │       (deferred)    (score &    (breaker gate, │      adapter
//!                    │                      pick)       timeout,      │
//!                    │                                  backoff)      │
//!                    │                         │                      │
//!                    │                         ▼ on failure           │
//!                    │                   fallback selector            │
//!                    │                   (health-ordered, backup      │
//!                    │                    last)                       │
//!                    │                                                │
//!                    │  ┌──────────────────────────────────────────┐  │
//!                    │  │          Cross-Cutting Concerns          │  │
//!                    │  │  config   health tracker + probes        │  │
//!                    │  │  events   circuit breakers   metrics     │  │
//!                    │  └──────────────────────────────────────────┘  │
//!                    └────────────────────────────────────────────────┘
//! ```
//!
//! Every call outcome feeds the per-destination circuit breaker and the
//! rolling health window, which in turn drive the next routing decision.

// Core subsystems
pub mod config;
pub mod destination;
pub mod orchestrator;
pub mod routing;

// Resilience and health
pub mod health;
pub mod resilience;

// Cross-cutting
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod observability;
pub mod task;

pub use config::DispatcherConfig;
pub use destination::{CallAdapter, CallResult, DestinationDescriptor};
pub use error::{CallError, DispatchError, ErrorKind};
pub use lifecycle::{Shutdown, ShutdownSignal};
pub use orchestrator::{ResilienceOrchestrator, SystemHealth, TaskResult};
pub use task::{Priority, TaskSpec, TaskStatus};
