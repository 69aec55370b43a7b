//! Destination registry.
//!
//! # Responsibilities
//! - Own the set of registered destinations
//! - Track per-destination load with atomic updates
//! - Serve capability lookups for the router and fallback selector

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::destination::adapter::CallAdapter;

/// Static description of a destination, supplied at registration by the
/// discovery collaborator.
#[derive(Debug, Clone)]
pub struct DestinationDescriptor {
    pub id: String,
    pub capabilities: HashSet<String>,
    pub cost_per_call: f64,
    /// Marks the always-available backup appended to every fallback chain.
    pub is_backup: bool,
}

impl DestinationDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capabilities: HashSet::new(),
            cost_per_call: 0.0,
            is_backup: false,
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn with_cost(mut self, cost_per_call: f64) -> Self {
        self.cost_per_call = cost_per_call;
        self
    }

    pub fn backup(mut self) -> Self {
        self.is_backup = true;
        self
    }
}

/// A registered destination. Immutable apart from the load counter.
pub struct Destination {
    pub id: String,
    pub capabilities: HashSet<String>,
    pub cost_per_call: f64,
    pub is_backup: bool,
    pub adapter: Arc<dyn CallAdapter>,
    /// Approximate in-flight load, stored as f64 bits for lock-free updates.
    load_bits: AtomicU64,
}

impl Destination {
    fn new(descriptor: DestinationDescriptor, adapter: Arc<dyn CallAdapter>) -> Self {
        Self {
            id: descriptor.id,
            capabilities: descriptor.capabilities,
            cost_per_call: descriptor.cost_per_call,
            is_backup: descriptor.is_backup,
            adapter,
            load_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Current load estimate.
    pub fn load(&self) -> f64 {
        f64::from_bits(self.load_bits.load(Ordering::Relaxed))
    }

    /// Add to the load counter (one dispatch = 1.0).
    pub fn add_load(&self, delta: f64) {
        self.update_load(|load| load + delta);
    }

    /// Multiply the load counter (decay tick).
    pub fn decay_load(&self, factor: f64) {
        self.update_load(|load| load * factor);
    }

    fn update_load(&self, f: impl Fn(f64) -> f64) {
        let mut current = self.load_bits.load(Ordering::Relaxed);
        loop {
            let next = f(f64::from_bits(current)).max(0.0).to_bits();
            match self.load_bits.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// True when the destination advertises every required capability.
    pub fn has_capabilities(&self, required: &HashSet<String>) -> bool {
        required.is_subset(&self.capabilities)
    }
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Destination")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .field("cost_per_call", &self.cost_per_call)
            .field("is_backup", &self.is_backup)
            .field("load", &self.load())
            .finish()
    }
}

/// Concurrent map of registered destinations.
#[derive(Default)]
pub struct DestinationRegistry {
    destinations: DashMap<String, Arc<Destination>>,
}

impl DestinationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a destination. Replacing resets its load counter.
    pub fn register(&self, descriptor: DestinationDescriptor, adapter: Arc<dyn CallAdapter>) {
        let id = descriptor.id.clone();
        let destination = Arc::new(Destination::new(descriptor, adapter));
        self.destinations.insert(id.clone(), destination);
        tracing::info!(destination = %id, "destination registered");
    }

    pub fn deregister(&self, id: &str) -> bool {
        let removed = self.destinations.remove(id).is_some();
        if removed {
            tracing::info!(destination = %id, "destination deregistered");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Arc<Destination>> {
        self.destinations.get(id).map(|entry| entry.clone())
    }

    pub fn all(&self) -> Vec<Arc<Destination>> {
        self.destinations
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// The registered backup destination, if any.
    pub fn backup(&self) -> Option<Arc<Destination>> {
        self.destinations
            .iter()
            .find(|entry| entry.value().is_backup)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::adapter::{CallResult, FnAdapter};

    fn noop_adapter() -> Arc<dyn CallAdapter> {
        Arc::new(FnAdapter(|_payload, _timeout| -> futures_util::future::BoxFuture<'static, Result<crate::destination::adapter::CallResult, crate::error::CallError>> {
            Box::pin(async { Ok(CallResult::new(serde_json::json!("ok"))) })
        }))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = DestinationRegistry::new();
        registry.register(
            DestinationDescriptor::new("d1").with_capability("legal_review"),
            noop_adapter(),
        );

        let dest = registry.get("d1").unwrap();
        assert!(dest.capabilities.contains("legal_review"));
        assert!(registry.get("missing").is_none());

        assert!(registry.deregister("d1"));
        assert!(!registry.deregister("d1"));
    }

    #[test]
    fn test_load_counter() {
        let registry = DestinationRegistry::new();
        registry.register(DestinationDescriptor::new("d1"), noop_adapter());
        let dest = registry.get("d1").unwrap();

        dest.add_load(1.0);
        dest.add_load(1.0);
        assert_eq!(dest.load(), 2.0);

        dest.decay_load(0.95);
        assert!((dest.load() - 1.9).abs() < 1e-9);
    }

    #[test]
    fn test_backup_lookup() {
        let registry = DestinationRegistry::new();
        registry.register(DestinationDescriptor::new("d1"), noop_adapter());
        assert!(registry.backup().is_none());

        registry.register(DestinationDescriptor::new("backup").backup(), noop_adapter());
        assert_eq!(registry.backup().unwrap().id, "backup");
    }

    #[test]
    fn test_capability_subset() {
        let registry = DestinationRegistry::new();
        registry.register(
            DestinationDescriptor::new("d1")
                .with_capability("legal_review")
                .with_capability("compliance_check"),
            noop_adapter(),
        );
        let dest = registry.get("d1").unwrap();

        let mut required = HashSet::new();
        required.insert("legal_review".to_string());
        assert!(dest.has_capabilities(&required));

        required.insert("code_review".to_string());
        assert!(!dest.has_capabilities(&required));
    }
}
