//! Rolling per-destination success/latency statistics.
//!
//! # Responsibilities
//! - Record every call outcome into a bounded rolling window
//! - Classify destinations as Healthy / Degraded / Unhealthy
//! - Never fail; unknown destinations report `Unknown`

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::ErrorKind;
use crate::events::{Event, EventType, SharedSink};
use crate::observability::metrics;

/// Window bounds: newest 100 calls, none older than 1 hour.
const WINDOW_CALLS: usize = 100;
const WINDOW_AGE: Duration = Duration::from_secs(3600);

/// Health classification thresholds (success rate, avg latency).
const HEALTHY_RATE: f64 = 0.95;
const HEALTHY_LATENCY: Duration = Duration::from_secs(10);
const DEGRADED_RATE: f64 = 0.85;
const DEGRADED_LATENCY: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    /// No samples recorded yet.
    Unknown,
}

/// Point-in-time health summary for one destination.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub success_rate: f64,
    /// Mean latency of successful calls in the window.
    pub avg_latency: Duration,
    pub sample_count: usize,
    pub last_error: Option<ErrorKind>,
}

impl HealthSnapshot {
    fn unknown() -> Self {
        Self {
            status: HealthStatus::Unknown,
            success_rate: 0.0,
            avg_latency: Duration::ZERO,
            sample_count: 0,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CallRecord {
    at: Instant,
    success: bool,
    latency: Duration,
    error: Option<ErrorKind>,
}

#[derive(Debug)]
struct Window {
    records: VecDeque<CallRecord>,
    last_status: HealthStatus,
}

/// Rolling success/latency statistics, one window per destination.
pub struct HealthTracker {
    windows: DashMap<String, Mutex<Window>>,
    events: SharedSink,
}

impl HealthTracker {
    pub fn new(events: SharedSink) -> Self {
        Self {
            windows: DashMap::new(),
            events,
        }
    }

    /// Record one call outcome. Infallible.
    pub fn record_outcome(
        &self,
        destination_id: &str,
        success: bool,
        latency: Duration,
        error: Option<ErrorKind>,
    ) {
        let entry = self
            .windows
            .entry(destination_id.to_string())
            .or_insert_with(|| {
                Mutex::new(Window {
                    records: VecDeque::with_capacity(WINDOW_CALLS),
                    last_status: HealthStatus::Unknown,
                })
            });

        let mut window = match entry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        window.records.push_back(CallRecord {
            at: Instant::now(),
            success,
            latency,
            error,
        });
        prune(&mut window.records);

        let snapshot = summarize(&window.records);
        metrics::record_destination_health(destination_id, snapshot.status);

        if snapshot.status != window.last_status {
            tracing::info!(
                destination = %destination_id,
                from = ?window.last_status,
                to = ?snapshot.status,
                success_rate = snapshot.success_rate,
                avg_latency_ms = snapshot.avg_latency.as_millis() as u64,
                "destination health changed"
            );
            self.events.emit(
                Event::new(EventType::HealthUpdate)
                    .destination(destination_id)
                    .details(serde_json::json!({
                        "status": format!("{:?}", snapshot.status),
                        "success_rate": snapshot.success_rate,
                        "avg_latency_ms": snapshot.avg_latency.as_millis() as u64,
                    })),
            );
            window.last_status = snapshot.status;
        }
    }

    /// Current health for a destination. Unknown if never seen.
    pub fn get_health(&self, destination_id: &str) -> HealthSnapshot {
        match self.windows.get(destination_id) {
            Some(entry) => {
                let mut window = match entry.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                prune(&mut window.records);
                summarize(&window.records)
            }
            None => HealthSnapshot::unknown(),
        }
    }

    /// Drop a destination's window on deregistration.
    pub fn forget(&self, destination_id: &str) {
        self.windows.remove(destination_id);
    }
}

fn prune(records: &mut VecDeque<CallRecord>) {
    // checked_sub: the process may be younger than the window.
    let cutoff = Instant::now().checked_sub(WINDOW_AGE);
    while records
        .front()
        .is_some_and(|r| cutoff.is_some_and(|c| r.at < c) || records.len() > WINDOW_CALLS)
    {
        records.pop_front();
    }
}

fn summarize(records: &VecDeque<CallRecord>) -> HealthSnapshot {
    if records.is_empty() {
        return HealthSnapshot::unknown();
    }

    let successes: Vec<&CallRecord> = records.iter().filter(|r| r.success).collect();
    let success_rate = successes.len() as f64 / records.len() as f64;
    let avg_latency = if successes.is_empty() {
        Duration::ZERO
    } else {
        successes.iter().map(|r| r.latency).sum::<Duration>() / successes.len() as u32
    };

    let status = if success_rate >= HEALTHY_RATE && avg_latency < HEALTHY_LATENCY {
        HealthStatus::Healthy
    } else if success_rate >= DEGRADED_RATE && avg_latency < DEGRADED_LATENCY {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    };

    let last_error = records.iter().rev().find_map(|r| r.error);

    HealthSnapshot {
        status,
        success_rate,
        avg_latency,
        sample_count: records.len(),
        last_error,
    }
}
