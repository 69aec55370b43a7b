//! Lifecycle coordination for the dispatcher's background loops.

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownSignal};
