//! Destination scoring.
//!
//! # Responsibilities
//! - Weighted destination score: capability, performance, load, cost
//! - Routing confidence blending capability, health, history, and load
//!
//! # Design Decisions
//! - Weights are configuration defaults carried from the dispatcher config,
//!   not tuned truths
//! - Pure functions over snapshots; no locks, no I/O, trivially testable

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::destination::Destination;
use crate::health::{HealthSnapshot, HealthStatus};

/// Relative weight of each scoring factor. Should sum to 1.0 (validated at
/// config load).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub capability: f64,
    pub performance: f64,
    pub load: f64,
    pub cost: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            capability: 0.4,
            performance: 0.25,
            load: 0.2,
            cost: 0.15,
        }
    }
}

/// Per-capability bonus when a capability string contains the task-type
/// keyword.
const KEYWORD_BONUS: f64 = 0.1;
/// Cost normalization ceiling: a call costing this much scores 0.
const COST_CEILING: f64 = 2.0;
/// Score bonus applied to the backup destination for critical tasks.
pub const CRITICAL_BACKUP_BONUS: f64 = 1.2;

/// How well the destination's capabilities cover the requirements, 0.0 – 1.0.
///
/// Exact requirement overlap plus a small keyword bonus for capabilities
/// related to the task's domain. No requirements → neutral 0.8; destination
/// with no advertised capabilities → 0.5.
pub fn capability_match(
    required: &HashSet<String>,
    available: &HashSet<String>,
    task_type: &str,
) -> f64 {
    if required.is_empty() {
        return 0.8;
    }
    if available.is_empty() {
        return 0.5;
    }

    let matched = required.intersection(available).count();
    let ratio = matched as f64 / required.len() as f64;

    let keyword = task_type.to_lowercase();
    let bonus = available
        .iter()
        .filter(|cap| !keyword.is_empty() && cap.to_lowercase().contains(&keyword))
        .count() as f64
        * KEYWORD_BONUS;

    (ratio + bonus).min(1.0)
}

/// Success-rate-per-second-of-latency, normalized into 0.0 – 1.0.
pub fn normalized_performance(health: &HealthSnapshot) -> f64 {
    if health.status == HealthStatus::Unknown {
        // No data: assume middling performance rather than zero.
        return 0.5;
    }
    let latency_secs = health.avg_latency.as_secs_f64().max(1.0);
    ((health.success_rate / latency_secs) / 0.5).min(1.0)
}

/// Weighted score for ranking candidates. Higher is better.
pub fn destination_score(
    weights: &ScoringWeights,
    destination: &Destination,
    health: &HealthSnapshot,
    required: &HashSet<String>,
    task_type: &str,
) -> f64 {
    let capability = capability_match(required, &destination.capabilities, task_type);
    let performance = normalized_performance(health);
    let load = (1.0 - destination.load()).max(0.0);
    let cost = (1.0 - destination.cost_per_call / COST_CEILING).max(0.0);

    weights.capability * capability
        + weights.performance * performance
        + weights.load * load
        + weights.cost * cost
}

/// Confidence in a routing decision, 0.0 – 1.0.
///
/// Blends capability match (0.4), destination health (0.3), historical
/// success for this task type (0.2), and current load (0.1).
pub fn routing_confidence(
    destination: &Destination,
    health: &HealthSnapshot,
    required: &HashSet<String>,
    task_type: &str,
    type_experience: f64,
) -> f64 {
    let capability = capability_match(required, &destination.capabilities, task_type);
    let health_score = match health.status {
        HealthStatus::Unknown => 0.7,
        _ => health.success_rate,
    };
    let load_factor = (1.0 - destination.load()).max(0.5);

    0.4 * capability + 0.3 * health_score + 0.2 * type_experience + 0.1 * load_factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn caps(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn healthy_snapshot(rate: f64, latency_secs: u64) -> HealthSnapshot {
        HealthSnapshot {
            status: HealthStatus::Healthy,
            success_rate: rate,
            avg_latency: Duration::from_secs(latency_secs),
            sample_count: 50,
            last_error: None,
        }
    }

    #[test]
    fn test_capability_match_overlap() {
        let required = caps(&["legal_review", "compliance_check"]);
        let available = caps(&["legal_review"]);
        let score = capability_match(&required, &available, "contract");
        assert!((score - 0.5).abs() < 1e-9);

        let full = caps(&["legal_review", "compliance_check"]);
        assert!((capability_match(&required, &full, "contract") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_capability_keyword_bonus() {
        let required = caps(&["analysis"]);
        let available = caps(&["legal_analysis", "legal_review"]);
        // No exact overlap with "analysis"... except substring does not count
        // as set intersection; bonus comes from "legal" keyword.
        let score = capability_match(&required, &available, "legal");
        assert!((score - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_capability_neutral_cases() {
        assert!((capability_match(&caps(&[]), &caps(&["x"]), "t") - 0.8).abs() < 1e-9);
        assert!((capability_match(&caps(&["x"]), &caps(&[]), "t") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_performance_normalization() {
        // 1.0 success at 2s latency → (1.0/2)/0.5 = 1.0.
        let fast = healthy_snapshot(1.0, 2);
        assert!((normalized_performance(&fast) - 1.0).abs() < 1e-9);

        // 0.9 success at 9s latency → (0.9/9)/0.5 = 0.2.
        let slow = healthy_snapshot(0.9, 9);
        assert!((normalized_performance(&slow) - 0.2).abs() < 1e-9);

        let unknown = HealthSnapshot {
            status: HealthStatus::Unknown,
            success_rate: 0.0,
            avg_latency: Duration::ZERO,
            sample_count: 0,
            last_error: None,
        };
        assert!((normalized_performance(&unknown) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_in_unit_range() {
        let required = caps(&["legal_review"]);
        let registry = crate::destination::DestinationRegistry::new();
        registry.register(
            crate::destination::DestinationDescriptor::new("d1").with_capability("legal_review"),
            std::sync::Arc::new(crate::destination::adapter::FnAdapter(|_p, _t| -> futures_util::future::BoxFuture<'static, Result<crate::destination::adapter::CallResult, crate::error::CallError>> {
                Box::pin(async { Ok(crate::destination::CallResult::new(serde_json::json!(null))) })
            })),
        );
        let dest = registry.get("d1").unwrap();
        let health = healthy_snapshot(0.98, 2);

        let confidence = routing_confidence(&dest, &health, &required, "legal", 0.9);
        assert!(confidence > 0.0 && confidence <= 1.0);
        // Strong match, strong health: should be high.
        assert!(confidence > 0.8);
    }
}
