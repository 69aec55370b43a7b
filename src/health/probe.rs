//! Active health probing.
//!
//! # Responsibilities
//! - Periodically issue lightweight synthetic calls so health data stays
//!   fresh under low traffic
//! - Republish a softmax-weighted load-balancing distribution over healthy
//!   destinations after each sweep

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};

use crate::destination::DestinationRegistry;
use crate::health::tracker::{HealthStatus, HealthTracker};
use crate::lifecycle::ShutdownSignal;
use crate::resilience::CircuitBreakerRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    /// Payload sent on probe calls. Destinations treat it like any other
    /// opaque payload.
    pub payload: serde_json::Value,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            timeout_secs: 15,
            payload: serde_json::json!({"health_check": true}),
        }
    }
}

/// Background prober plus the published load distribution.
pub struct HealthProbe {
    registry: Arc<DestinationRegistry>,
    health: Arc<HealthTracker>,
    breakers: Arc<CircuitBreakerRegistry>,
    config: ProbeConfig,
    distribution: ArcSwap<HashMap<String, f64>>,
}

impl HealthProbe {
    pub fn new(
        registry: Arc<DestinationRegistry>,
        health: Arc<HealthTracker>,
        breakers: Arc<CircuitBreakerRegistry>,
        config: ProbeConfig,
    ) -> Self {
        Self {
            registry,
            health,
            breakers,
            config,
            distribution: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Latest softmax-weighted distribution over healthy destinations.
    /// Empty until the first sweep completes (or when nothing is healthy).
    pub fn load_distribution(&self) -> Arc<HashMap<String, f64>> {
        self.distribution.load_full()
    }

    /// Probe loop. Runs until the shutdown signal fires.
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownSignal) {
        if !self.config.enabled {
            tracing::info!("health probes disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.interval_secs,
            "health probe loop starting"
        );
        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        // The immediate first tick would probe before any real traffic.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("health probe loop received shutdown, exiting");
                    break;
                }
            }
        }
    }

    /// One probe sweep over all non-backup destinations.
    pub async fn sweep(&self) {
        let timeout = Duration::from_secs(self.config.timeout_secs);

        for destination in self.registry.all() {
            // The backup's availability is assumed, not measured.
            if destination.is_backup {
                continue;
            }
            // An open circuit means the breaker decides when to probe, via
            // its own half-open window.
            if !self.breakers.allow_call(&destination.id) {
                tracing::debug!(destination = %destination.id, "probe skipped, circuit open");
                continue;
            }

            let started = Instant::now();
            let outcome = time::timeout(
                timeout,
                destination.adapter.call(self.config.payload.clone(), timeout),
            )
            .await;
            let latency = started.elapsed();

            let (success, error) = match outcome {
                Ok(Ok(_)) => (true, None),
                Ok(Err(e)) => {
                    tracing::warn!(destination = %destination.id, error = %e, "probe failed");
                    (false, Some(e.kind))
                }
                Err(_) => {
                    tracing::warn!(destination = %destination.id, "probe timed out");
                    (false, Some(crate::error::ErrorKind::Timeout))
                }
            };

            self.breakers.on_result(&destination.id, success);
            self.health
                .record_outcome(&destination.id, success, latency, error);
        }

        self.republish_distribution();
    }

    /// Recompute the softmax distribution from current health snapshots.
    fn republish_distribution(&self) {
        let mut scores: Vec<(String, f64)> = Vec::new();
        for destination in self.registry.all() {
            if destination.is_backup {
                continue;
            }
            let snapshot = self.health.get_health(&destination.id);
            if snapshot.status == HealthStatus::Healthy {
                let latency = snapshot.avg_latency.as_secs_f64().max(0.1);
                scores.push((destination.id.clone(), snapshot.success_rate / latency));
            }
        }

        let distribution: HashMap<String, f64> = if scores.is_empty() {
            HashMap::new()
        } else {
            let total: f64 = scores.iter().map(|(_, s)| s.exp()).sum();
            scores
                .into_iter()
                .map(|(id, s)| (id, s.exp() / total))
                .collect()
        };

        tracing::debug!(destinations = distribution.len(), "load distribution republished");
        self.distribution.store(Arc::new(distribution));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::adapter::{CallResult, FnAdapter};
    use crate::destination::DestinationDescriptor;
    use crate::error::CallError;
    use crate::events::TracingSink;
    use crate::resilience::CircuitBreakerConfig;

    fn fixture(config: ProbeConfig) -> (Arc<HealthProbe>, Arc<DestinationRegistry>) {
        let registry = Arc::new(DestinationRegistry::new());
        let sink: crate::events::SharedSink = Arc::new(TracingSink);
        let health = Arc::new(HealthTracker::new(sink.clone()));
        let breakers = Arc::new(CircuitBreakerRegistry::new(
            CircuitBreakerConfig::default(),
            sink,
        ));
        let probe = Arc::new(HealthProbe::new(registry.clone(), health, breakers, config));
        (probe, registry)
    }

    fn ok_adapter() -> Arc<dyn crate::destination::CallAdapter> {
        Arc::new(FnAdapter(|_p, _t| -> futures_util::future::BoxFuture<'static, Result<crate::destination::adapter::CallResult, crate::error::CallError>> {
            Box::pin(async { Ok(CallResult::new(serde_json::json!("pong"))) })
        }))
    }

    fn failing_adapter() -> Arc<dyn crate::destination::CallAdapter> {
        Arc::new(FnAdapter(|_p, _t| -> futures_util::future::BoxFuture<'static, Result<crate::destination::adapter::CallResult, crate::error::CallError>> {
            Box::pin(async { Err(CallError::network("down")) })
        }))
    }

    #[tokio::test]
    async fn test_sweep_updates_health_and_distribution() {
        let (probe, registry) = fixture(ProbeConfig::default());
        registry.register(DestinationDescriptor::new("up"), ok_adapter());
        registry.register(DestinationDescriptor::new("down"), failing_adapter());
        registry.register(DestinationDescriptor::new("backup").backup(), ok_adapter());

        // A few sweeps to accumulate window samples.
        for _ in 0..5 {
            probe.sweep().await;
        }

        let distribution = probe.load_distribution();
        assert!(distribution.contains_key("up"));
        assert!(!distribution.contains_key("down"));
        // Backup is never probed and never in the distribution.
        assert!(!distribution.contains_key("backup"));
        let total: f64 = distribution.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_on_shutdown() {
        let (probe, _registry) = fixture(ProbeConfig {
            interval_secs: 1,
            ..ProbeConfig::default()
        });
        let shutdown = crate::lifecycle::Shutdown::new();
        let handle = tokio::spawn(probe.run(shutdown.subscribe()));

        tokio::time::advance(Duration::from_secs(3)).await;
        shutdown.trigger();
        handle.await.unwrap();
    }
}
