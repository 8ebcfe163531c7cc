//! Failure classification and reporting
//!
//! A turn that fails after its start frame gets one error delta, one failure
//! telemetry event and one log line. The stream is ended by the caller.

use std::sync::Arc;

use crate::logging::Logger;
use crate::stream::{FrameError, MessageFramer};
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use crate::{log_debug, log_warn};

use super::error::TurnError;

/// Coarse failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    GenerationFailed,
    ContextLengthExceeded,
    TransportClosed,
    Persistence,
    Internal,
}

impl ErrorClass {
    pub fn of(error: &TurnError) -> Self {
        match error {
            TurnError::Generation(e) if e.is_context_length_exceeded() => {
                ErrorClass::ContextLengthExceeded
            }
            TurnError::Generation(_) => ErrorClass::GenerationFailed,
            TurnError::Frame(FrameError::Closed) => ErrorClass::TransportClosed,
            TurnError::Frame(_) | TurnError::Internal(_) => ErrorClass::Internal,
            TurnError::Session(_) => ErrorClass::Persistence,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::GenerationFailed => "generation_failed",
            ErrorClass::ContextLengthExceeded => "context_length_exceeded",
            ErrorClass::TransportClosed => "transport_closed",
            ErrorClass::Persistence => "persistence",
            ErrorClass::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a failing turn belonged to
#[derive(Debug, Clone, Default)]
pub struct TurnIdentity {
    pub session_id: String,
    pub owner_id: String,
    pub provider: String,
    pub model: String,
}

/// Reports turn failures in-band and to telemetry
pub struct FailureReporter {
    telemetry: Arc<dyn TelemetrySink>,
    logger: Arc<dyn Logger>,
}

impl FailureReporter {
    pub fn new(telemetry: Arc<dyn TelemetrySink>, logger: Arc<dyn Logger>) -> Self {
        Self { telemetry, logger }
    }

    /// Classify, write the error delta and emit the failure event
    ///
    /// Nothing is written when the client is already gone.
    pub async fn report(
        &self,
        framer: &mut MessageFramer,
        identity: &TurnIdentity,
        error: &TurnError,
    ) -> ErrorClass {
        let class = ErrorClass::of(error);
        let message = error.to_string();

        log_warn!(
            self.logger,
            "[FailureReporter] Turn for {} failed ({}): {}",
            identity.session_id,
            class,
            message
        );

        self.telemetry.emit(TelemetryEvent::failure(
            &identity.session_id,
            &identity.owner_id,
            &identity.provider,
            &identity.model,
            class.as_str(),
            &message,
        ));

        if class != ErrorClass::TransportClosed && !framer.is_ended() {
            if let Err(e) = framer.error(&message).await {
                log_debug!(self.logger, "[FailureReporter] Could not write error frame: {}", e);
            }
        }

        class
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::providers::ProviderError;
    use crate::session::SessionError;
    use crate::stream::{BufferSink, Frame};
    use crate::telemetry::{RecordingTelemetrySink, FAILURE_EVENT};

    fn identity() -> TurnIdentity {
        TurnIdentity {
            session_id: "c1".into(),
            owner_id: "u1".into(),
            provider: "openai".into(),
            model: "gpt-4o".into(),
        }
    }

    #[test]
    fn test_classification() {
        let overflow = TurnError::Generation(ProviderError::ContextLengthExceeded {
            provider: "openai".into(),
            message: "too long".into(),
        });
        assert_eq!(ErrorClass::of(&overflow), ErrorClass::ContextLengthExceeded);
        assert_eq!(
            ErrorClass::of(&TurnError::Generation(ProviderError::Other("x".into()))),
            ErrorClass::GenerationFailed
        );
        assert_eq!(
            ErrorClass::of(&TurnError::Frame(FrameError::Closed)),
            ErrorClass::TransportClosed
        );
        assert_eq!(
            ErrorClass::of(&TurnError::Session(SessionError::NotFound("c1".into()))),
            ErrorClass::Persistence
        );
    }

    #[tokio::test]
    async fn test_report_writes_frame_and_event() {
        let telemetry = Arc::new(RecordingTelemetrySink::new());
        let reporter = FailureReporter::new(telemetry.clone(), Arc::new(NoOpLogger));
        let sink = BufferSink::new();
        let mut framer = MessageFramer::new(Box::new(sink.clone()));
        framer.start().await.unwrap();

        let error = TurnError::Generation(ProviderError::Other("model exploded".into()));
        let class = reporter.report(&mut framer, &identity(), &error).await;

        assert_eq!(class, ErrorClass::GenerationFailed);
        let frames = sink.frames().unwrap();
        assert!(matches!(&frames[1], Frame::Delta(text) if text.contains("model exploded")));

        let events = telemetry.named(FAILURE_EVENT);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].attribute("chatId"), Some("c1"));
        assert_eq!(events[0].attribute("provider"), Some("openai"));
        assert_eq!(events[0].attribute("errorClass"), Some("generation_failed"));
    }

    #[tokio::test]
    async fn test_closed_transport_writes_nothing() {
        let telemetry = Arc::new(RecordingTelemetrySink::new());
        let reporter = FailureReporter::new(telemetry.clone(), Arc::new(NoOpLogger));
        let sink = BufferSink::new();
        let mut framer = MessageFramer::new(Box::new(sink.clone()));
        framer.start().await.unwrap();

        reporter
            .report(&mut framer, &identity(), &TurnError::Frame(FrameError::Closed))
            .await;
        assert_eq!(sink.lines().len(), 1);
        assert_eq!(telemetry.events().len(), 1);
    }
}
