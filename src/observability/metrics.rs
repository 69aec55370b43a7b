//! Metric recording.
//!
//! # Metrics
//! - `dispatcher_calls_total` (counter): call attempts by destination, outcome
//! - `dispatcher_call_duration_seconds` (histogram): attempt latency
//! - `dispatcher_dispatches_total` (counter): dispatches by destination
//! - `dispatcher_tasks_total` (counter): task terminal states
//! - `dispatcher_destination_health` (gauge): 2=healthy 1=degraded 0=unhealthy
//! - `dispatcher_circuit_state` (gauge): 0=closed 1=half-open 2=open

use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::health::HealthStatus;
use crate::resilience::CircuitState;

pub fn record_call(destination_id: &str, success: bool, duration: Duration) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        "dispatcher_calls_total",
        "destination" => destination_id.to_string(),
        "outcome" => outcome,
    )
    .increment(1);
    histogram!(
        "dispatcher_call_duration_seconds",
        "destination" => destination_id.to_string(),
    )
    .record(duration.as_secs_f64());
}

pub fn record_dispatch(destination_id: &str) {
    counter!(
        "dispatcher_dispatches_total",
        "destination" => destination_id.to_string(),
    )
    .increment(1);
}

pub fn record_task_outcome(outcome: &'static str) {
    counter!("dispatcher_tasks_total", "outcome" => outcome).increment(1);
}

pub fn record_destination_health(destination_id: &str, status: HealthStatus) {
    let value = match status {
        HealthStatus::Healthy => 2.0,
        HealthStatus::Degraded => 1.0,
        HealthStatus::Unhealthy => 0.0,
        HealthStatus::Unknown => -1.0,
    };
    gauge!(
        "dispatcher_destination_health",
        "destination" => destination_id.to_string(),
    )
    .set(value);
}

pub fn record_circuit_state(destination_id: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!(
        "dispatcher_circuit_state",
        "destination" => destination_id.to_string(),
    )
    .set(value);
}

pub fn record_queue_depth(depth: usize) {
    gauge!("dispatcher_queue_depth").set(depth as f64);
}
