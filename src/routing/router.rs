//! Capability/health/load-aware task router.
//!
//! # Responsibilities
//! - Score and rank candidate destinations for a task
//! - Own the deferred queue and the per-type success history
//! - Maintain approximate per-destination load (dispatch + decay)

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::destination::{Destination, DestinationRegistry};
use crate::error::DispatchError;
use crate::health::HealthTracker;
use crate::observability::metrics;
use crate::routing::queue::TaskQueue;
use crate::routing::scorer::{self, ScoringWeights, CRITICAL_BACKUP_BONUS};
use crate::task::{Priority, Task};

/// Router tuning. Defaults mirror the dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub weights: ScoringWeights,
    /// Deferred queue capacity.
    pub queue_capacity: usize,
    /// Multiplicative load decay applied each tick.
    pub load_decay: f64,
    /// Seconds between load decay ticks.
    pub load_decay_interval_secs: u64,
    /// Default per-type experience when no history exists.
    pub default_type_experience: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            queue_capacity: 10_000,
            load_decay: 0.95,
            load_decay_interval_secs: 1,
            default_type_experience: 0.7,
        }
    }
}

/// The router's answer for one task.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub destination: Arc<Destination>,
    pub confidence: f64,
    /// Remaining ranked candidates, best first.
    pub fallback_list: Vec<Arc<Destination>>,
    pub reason: String,
    /// True when no destination matched the required capabilities and the
    /// filter was relaxed to the full set.
    pub capability_filter_relaxed: bool,
}

/// Scores and assigns tasks to destinations.
pub struct TaskRouter {
    registry: Arc<DestinationRegistry>,
    health: Arc<HealthTracker>,
    config: RouterConfig,
    queue: TaskQueue,
    /// (destination_id, task_type) → (successes, total).
    type_stats: DashMap<(String, String), (u64, u64)>,
}

impl TaskRouter {
    pub fn new(
        registry: Arc<DestinationRegistry>,
        health: Arc<HealthTracker>,
        config: RouterConfig,
    ) -> Self {
        let queue = TaskQueue::new(config.queue_capacity);
        Self {
            registry,
            health,
            config,
            queue,
            type_stats: DashMap::new(),
        }
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Rank candidates and pick the best destination for `task`.
    ///
    /// Never selects a destination missing a required capability while a
    /// capability-complete candidate exists; only when none exists is the
    /// filter relaxed (flagged on the decision).
    pub fn route(&self, task: &Task) -> Result<RoutingDecision, DispatchError> {
        let all = self.registry.all();
        if all.is_empty() {
            return Err(DispatchError::NoCandidateDestination);
        }

        let mut pool: Vec<Arc<Destination>> = all
            .iter()
            .filter(|d| d.has_capabilities(&task.required_capabilities))
            .cloned()
            .collect();

        let mut relaxed = false;
        if pool.is_empty() {
            tracing::warn!(
                task = %task.id,
                required = ?task.required_capabilities,
                "no capability-matching destination; relaxing filter"
            );
            pool = all;
            relaxed = true;
        }

        let mut scored: Vec<(f64, Arc<Destination>)> = pool
            .into_iter()
            .map(|destination| {
                let health = self.health.get_health(&destination.id);
                let mut score = scorer::destination_score(
                    &self.config.weights,
                    &destination,
                    &health,
                    &task.required_capabilities,
                    &task.task_type,
                );
                // Critical work leans on the always-available destination.
                if task.priority == Priority::Critical && destination.is_backup {
                    score *= CRITICAL_BACKUP_BONUS;
                }
                (score, destination)
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.id.cmp(&b.1.id)));

        let (best_score, destination) = scored.remove(0);
        let health = self.health.get_health(&destination.id);
        let confidence = scorer::routing_confidence(
            &destination,
            &health,
            &task.required_capabilities,
            &task.task_type,
            self.type_experience(&destination.id, &task.task_type),
        );

        let reason = if relaxed {
            format!(
                "no capability match; best of {} unfiltered candidates (score {:.3})",
                scored.len() + 1,
                best_score
            )
        } else {
            format!(
                "best of {} candidates (score {:.3})",
                scored.len() + 1,
                best_score
            )
        };

        tracing::debug!(
            task = %task.id,
            destination = %destination.id,
            score = best_score,
            confidence,
            "routing decision"
        );

        Ok(RoutingDecision {
            destination,
            confidence,
            fallback_list: scored.into_iter().map(|(_, d)| d).collect(),
            reason,
            capability_filter_relaxed: relaxed,
        })
    }

    /// Record a dispatch: bumps the destination's load estimate.
    pub fn record_dispatch(&self, destination: &Destination) {
        destination.add_load(1.0);
        metrics::record_dispatch(&destination.id);
    }

    /// Record an execution outcome into the per-type history.
    pub fn record_completion(&self, destination_id: &str, task_type: &str, success: bool) {
        let mut entry = self
            .type_stats
            .entry((destination_id.to_string(), task_type.to_string()))
            .or_insert((0, 0));
        if success {
            entry.0 += 1;
        }
        entry.1 += 1;
    }

    /// Historical success rate for this destination/task-type pair.
    pub fn type_experience(&self, destination_id: &str, task_type: &str) -> f64 {
        self.type_stats
            .get(&(destination_id.to_string(), task_type.to_string()))
            .map(|entry| {
                let (successes, total) = *entry;
                if total == 0 {
                    self.config.default_type_experience
                } else {
                    successes as f64 / total as f64
                }
            })
            .unwrap_or(self.config.default_type_experience)
    }

    /// One decay tick over all load counters.
    pub fn decay_loads(&self) {
        for destination in self.registry.all() {
            destination.decay_load(self.config.load_decay);
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}
