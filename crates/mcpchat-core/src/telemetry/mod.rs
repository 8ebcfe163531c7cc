//! Turn telemetry
//!
//! Events are fire-and-forget: emitting never fails and never blocks a turn.

mod event;
mod sink;

pub use event::{TelemetryEvent, FAILURE_EVENT, MESSAGE_SEND_EVENT};
pub use sink::{RecordingTelemetrySink, TelemetrySink, TracingTelemetrySink};
