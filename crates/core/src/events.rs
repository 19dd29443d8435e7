//! Event-notification collaborator.

use serde_json::Value;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("failed to emit {event_type}: {reason}")]
pub struct EventError {
    pub event_type: String,
    pub reason: String,
}

/// Sink for domain events such as `BOOKED`.
pub trait EventSink: Send + Sync {
    fn emit(&self, event_type: &str, payload: &Value) -> Result<(), EventError>;
}

/// Writes every event to the `clinic::events` tracing target.
#[derive(Debug, Default, Clone)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event_type: &str, payload: &Value) -> Result<(), EventError> {
        tracing::info!(target: "clinic::events", event_type, %payload, "event emitted");
        Ok(())
    }
}

/// Keeps emitted events in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events emitted so far.
    pub fn events(&self) -> Vec<(String, Value)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event_type: &str, payload: &Value) -> Result<(), EventError> {
        let mut events = self.events.lock().map_err(|_| EventError {
            event_type: event_type.to_string(),
            reason: "recorder lock poisoned".into(),
        })?;
        events.push((event_type.to_string(), payload.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingEventSink::new();
        sink.emit("BOOKED", &json!({"n": 1})).unwrap();
        sink.emit("BOOKED", &json!({"n": 2})).unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].1["n"], 2);
    }

    #[test]
    fn tracing_sink_accepts_events() {
        assert!(TracingEventSink.emit("BOOKED", &json!({})).is_ok());
    }
}
