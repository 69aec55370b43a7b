//! Structured event emission.
//!
//! # Responsibilities
//! - Describe state changes (circuit transitions, routing, expiry) as
//!   serializable events
//! - Deliver events to an injectable sink; no wire format is mandated
//!
//! # Design Decisions
//! - Sinks must never block the dispatch path; the channel sink drops on
//!   overflow rather than applying backpressure
//! - Timestamps are unix milliseconds so events serialize without a clock
//!   abstraction leaking into the schema

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Event type discriminant, matching the outbound contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    HealthUpdate,
    CircuitOpened,
    CircuitClosed,
    TaskRouted,
    TaskExpired,
    TaskExhausted,
}

/// A structured event emitted to the external sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub details: serde_json::Value,
}

impl Event {
    pub fn new(event_type: EventType) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            event_type,
            timestamp,
            destination_id: None,
            task_id: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn destination(mut self, id: impl Into<String>) -> Self {
        self.destination_id = Some(id.into());
        self
    }

    pub fn task(mut self, id: impl std::fmt::Display) -> Self {
        self.task_id = Some(id.to_string());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Destination for emitted events. Implemented by external collaborators.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

pub type SharedSink = Arc<dyn EventSink>;

/// Default sink: logs events as structured tracing records.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: Event) {
        tracing::info!(
            event_type = ?event.event_type,
            destination = event.destination_id.as_deref().unwrap_or("-"),
            task = event.task_id.as_deref().unwrap_or("-"),
            details = %event.details,
            "dispatcher event"
        );
    }
}

/// Channel-backed sink for tests and in-process consumers. Bounded: a slow
/// consumer loses events instead of stalling emitters.
pub struct ChannelSink {
    tx: mpsc::Sender<Event>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::Receiver<Event>) {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: Event) {
        // Full buffer or dropped receiver: shed the event rather than block
        // the dispatch path.
        let _ = self.tx.try_send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_shape() {
        let event = Event::new(EventType::CircuitOpened)
            .destination("d1")
            .details(serde_json::json!({"consecutive_failures": 5}));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "circuit_opened");
        assert_eq!(json["destination_id"], "d1");
        assert!(json.get("task_id").is_none());
        assert_eq!(json["details"]["consecutive_failures"], 5);
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(Event::new(EventType::TaskRouted).task("t-1"));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, EventType::TaskRouted);
        assert_eq!(received.task_id.as_deref(), Some("t-1"));
    }

    #[tokio::test]
    async fn test_channel_sink_sheds_on_full_buffer() {
        let (sink, mut rx) = ChannelSink::with_capacity(1);
        sink.emit(Event::new(EventType::TaskRouted).task("t-1"));
        sink.emit(Event::new(EventType::TaskExpired).task("t-2"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, EventType::TaskRouted);
        // The overflowing event was dropped, not queued.
        assert!(rx.try_recv().is_err());
    }
}
