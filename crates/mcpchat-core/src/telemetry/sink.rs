//! Telemetry sinks

use parking_lot::Mutex;

use super::event::TelemetryEvent;

/// Fire-and-forget event destination
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: TelemetryEvent);
}

/// Emits events as `tracing` records under the `mcpchat::telemetry` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn emit(&self, event: TelemetryEvent) {
        tracing::info!(
            target: "mcpchat::telemetry",
            event = %event.name,
            attributes = ?event.attributes,
            "telemetry event"
        );
    }
}

/// Keeps every event, for tests
#[derive(Debug, Default)]
pub struct RecordingTelemetrySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    /// Events with the given name
    pub fn named(&self, name: &str) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }
}

impl TelemetrySink for RecordingTelemetrySink {
    fn emit(&self, event: TelemetryEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{FAILURE_EVENT, MESSAGE_SEND_EVENT};

    #[test]
    fn test_recording_sink() {
        let sink = RecordingTelemetrySink::new();
        sink.emit(TelemetryEvent::message_send("c1", "u1", "openai"));
        sink.emit(TelemetryEvent::failure(
            "c1",
            "u1",
            "openai",
            "gpt-4o",
            "generation_failed",
            "boom",
        ));

        assert_eq!(sink.events().len(), 2);
        let failures = sink.named(FAILURE_EVENT);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].attribute("model"), Some("gpt-4o"));
        assert_eq!(failures[0].attribute("errorMessage"), Some("boom"));
        assert_eq!(sink.named(MESSAGE_SEND_EVENT)[0].attribute("chatId"), Some("c1"));
    }

    #[test]
    fn test_tracing_sink_without_subscriber() {
        TracingTelemetrySink.emit(TelemetryEvent::new("noop").with("k", "v"));
    }
}
