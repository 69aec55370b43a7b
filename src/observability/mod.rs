//! Observability helpers.
//!
//! # Responsibilities
//! - Define the dispatcher's metric catalog
//! - Keep metric updates cheap enough for the dispatch hot path
//!
//! # Design Decisions
//! - Uses the `metrics` facade only; exporters are wired by the host
//!   process (dashboard rendering is an external collaborator)
//! - Structured logs go through `tracing` at the call sites themselves

pub mod metrics;
