//! Fallback-chain ordering.
//!
//! # Responsibilities
//! - Order alternate destinations after a primary fails
//! - Guarantee a non-empty chain whenever a backup is registered
//!
//! # Design Decisions
//! - Deterministic: identical health snapshots always yield identical
//!   ordering (success rate desc, latency asc, id asc)
//! - Unknown health ranks with Degraded: untested beats known-bad
//! - The backup destination goes last unconditionally, even when healthy

use std::collections::HashSet;
use std::sync::Arc;

use crate::destination::{Destination, DestinationRegistry};
use crate::health::{HealthStatus, HealthTracker};

/// Ordered fallback candidates for one failed dispatch.
#[derive(Debug)]
pub struct FallbackChain {
    pub candidates: Vec<Arc<Destination>>,
    /// True when no destination matched the required capabilities and the
    /// filter was relaxed to the full set.
    pub capability_filter_relaxed: bool,
}

/// Orders alternate destinations by health partition and success rate.
pub struct FallbackSelector {
    registry: Arc<DestinationRegistry>,
    health: Arc<HealthTracker>,
}

impl FallbackSelector {
    pub fn new(registry: Arc<DestinationRegistry>, health: Arc<HealthTracker>) -> Self {
        Self { registry, health }
    }

    /// Order all registered destinations as fallbacks for `failed_id`.
    ///
    /// Partitions Healthy / Degraded (incl. Unknown) / Unhealthy, sorts each
    /// partition by success rate desc with latency then id tie-breaks, and
    /// appends the configured backup last.
    pub fn order_candidates(
        &self,
        failed_id: &str,
        required_capabilities: &HashSet<String>,
    ) -> FallbackChain {
        let backup = self.registry.backup();
        let pool: Vec<Arc<Destination>> = self
            .registry
            .all()
            .into_iter()
            .filter(|d| d.id != failed_id && !d.is_backup)
            .collect();

        let mut matching: Vec<Arc<Destination>> = pool
            .iter()
            .filter(|d| d.has_capabilities(required_capabilities))
            .cloned()
            .collect();

        let mut relaxed = false;
        if matching.is_empty() && !pool.is_empty() && !required_capabilities.is_empty() {
            tracing::warn!(
                required = ?required_capabilities,
                "no capability-matching fallback; relaxing filter to all destinations"
            );
            matching = pool;
            relaxed = true;
        }

        let mut healthy = Vec::new();
        let mut degraded = Vec::new();
        let mut unhealthy = Vec::new();

        for destination in matching {
            let snapshot = self.health.get_health(&destination.id);
            let entry = (destination, snapshot);
            match entry.1.status {
                HealthStatus::Healthy => healthy.push(entry),
                HealthStatus::Degraded | HealthStatus::Unknown => degraded.push(entry),
                HealthStatus::Unhealthy => unhealthy.push(entry),
            }
        }

        for partition in [&mut healthy, &mut degraded, &mut unhealthy] {
            partition.sort_by(|a, b| {
                b.1.success_rate
                    .total_cmp(&a.1.success_rate)
                    .then(a.1.avg_latency.cmp(&b.1.avg_latency))
                    .then(a.0.id.cmp(&b.0.id))
            });
        }

        let mut candidates: Vec<Arc<Destination>> = healthy
            .into_iter()
            .chain(degraded)
            .chain(unhealthy)
            .map(|(destination, _)| destination)
            .collect();

        if let Some(backup) = backup {
            if backup.id != failed_id {
                candidates.push(backup);
            }
        }

        FallbackChain {
            candidates,
            capability_filter_relaxed: relaxed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::adapter::{CallResult, FnAdapter};
    use crate::destination::DestinationDescriptor;
    use crate::events::TracingSink;
    use std::time::Duration;

    fn noop() -> Arc<dyn crate::destination::CallAdapter> {
        Arc::new(FnAdapter(|_p, _t| -> futures_util::future::BoxFuture<'static, Result<crate::destination::adapter::CallResult, crate::error::CallError>> {
            Box::pin(async { Ok(CallResult::new(serde_json::json!(null))) })
        }))
    }

    fn fixture() -> (FallbackSelector, Arc<DestinationRegistry>, Arc<HealthTracker>) {
        let registry = Arc::new(DestinationRegistry::new());
        let health = Arc::new(HealthTracker::new(Arc::new(TracingSink)));
        let selector = FallbackSelector::new(registry.clone(), health.clone());
        (selector, registry, health)
    }

    fn feed(health: &HealthTracker, id: &str, successes: u32, failures: u32, latency: Duration) {
        for _ in 0..successes {
            health.record_outcome(id, true, latency, None);
        }
        for _ in 0..failures {
            health.record_outcome(id, false, latency, Some(crate::error::ErrorKind::Network));
        }
    }

    #[tokio::test]
    async fn test_orders_by_health_partition() {
        let (selector, registry, health) = fixture();
        for id in ["healthy", "degraded", "unhealthy"] {
            registry.register(DestinationDescriptor::new(id), noop());
        }
        feed(&health, "healthy", 100, 0, Duration::from_secs(1));
        feed(&health, "degraded", 90, 10, Duration::from_secs(1));
        feed(&health, "unhealthy", 10, 90, Duration::from_secs(1));

        let chain = selector.order_candidates("failed", &HashSet::new());
        let ids: Vec<&str> = chain.candidates.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["healthy", "degraded", "unhealthy"]);
    }

    #[tokio::test]
    async fn test_excludes_failed_and_appends_backup() {
        let (selector, registry, health) = fixture();
        registry.register(DestinationDescriptor::new("d1"), noop());
        registry.register(DestinationDescriptor::new("d2"), noop());
        registry.register(DestinationDescriptor::new("backup").backup(), noop());
        feed(&health, "d1", 100, 0, Duration::from_secs(1));
        feed(&health, "d2", 100, 0, Duration::from_secs(1));
        // Backup is healthy too; it must still go last.
        feed(&health, "backup", 100, 0, Duration::from_millis(10));

        let chain = selector.order_candidates("d1", &HashSet::new());
        let ids: Vec<&str> = chain.candidates.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d2", "backup"]);
    }

    #[tokio::test]
    async fn test_capability_filter_and_relaxation() {
        let (selector, registry, _health) = fixture();
        registry.register(
            DestinationDescriptor::new("legal").with_capability("legal_review"),
            noop(),
        );
        registry.register(
            DestinationDescriptor::new("content").with_capability("copywriting"),
            noop(),
        );

        let mut required = HashSet::new();
        required.insert("legal_review".to_string());
        let chain = selector.order_candidates("failed", &required);
        assert_eq!(chain.candidates.len(), 1);
        assert_eq!(chain.candidates[0].id, "legal");
        assert!(!chain.capability_filter_relaxed);

        required.clear();
        required.insert("quantum_chemistry".to_string());
        let chain = selector.order_candidates("failed", &required);
        assert_eq!(chain.candidates.len(), 2);
        assert!(chain.capability_filter_relaxed);
    }

    #[tokio::test]
    async fn test_ordering_is_deterministic() {
        let (selector, registry, health) = fixture();
        for id in ["a", "b", "c", "d"] {
            registry.register(DestinationDescriptor::new(id), noop());
            // Identical stats: ordering must fall back to id.
            feed(&health, id, 50, 50, Duration::from_secs(2));
        }

        let first: Vec<String> = selector
            .order_candidates("x", &HashSet::new())
            .candidates
            .iter()
            .map(|d| d.id.clone())
            .collect();
        for _ in 0..5 {
            let again: Vec<String> = selector
                .order_candidates("x", &HashSet::new())
                .candidates
                .iter()
                .map(|d| d.id.clone())
                .collect();
            assert_eq!(first, again);
        }
        assert_eq!(first, vec!["a", "b", "c", "d"]);
    }
}
