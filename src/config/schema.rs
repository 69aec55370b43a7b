//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! dispatcher. All types derive Serde traits for deserialization from
//! config files; subsystem-specific sections reuse the config types the
//! subsystems themselves define.

use serde::{Deserialize, Serialize};

use crate::health::ProbeConfig;
use crate::resilience::{CircuitBreakerConfig, RetryPolicy};
use crate::routing::RouterConfig;

/// Root configuration for the task dispatcher.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Per-destination circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Default retry policy applied when a task carries none of its own.
    pub retry: RetryPolicy,

    /// Routing weights, queue capacity and load decay.
    pub router: RouterConfig,

    /// Active health probe settings.
    pub probe: ProbeConfig,

    /// Orchestrator-level settings.
    pub orchestrator: OrchestratorConfig,
}

/// Orchestrator settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound on fallback destinations tried after the primary fails,
    /// not counting the backup emergency path.
    pub max_fallback_attempts: usize,

    /// How many finished tasks keep their result and status available for
    /// collection. The oldest entries are evicted beyond this bound.
    pub result_retention: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_fallback_attempts: 3,
            result_retention: 10_000,
        }
    }
}
