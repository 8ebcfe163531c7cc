//! Frame sequencing for one response
//!
//! A response is one start frame, any number of deltas, and exactly one end
//! frame. The framer refuses anything else.

use uuid::Uuid;

use crate::types::{FinishReason, Usage};

use super::frame::{Frame, FrameError, FrameResult};
use super::sink::FrameSink;

/// Fresh id for a start frame
pub fn generate_message_id() -> String {
    format!("msg-{}", Uuid::new_v4().simple())
}

/// Writes one well-formed frame sequence into a sink
pub struct MessageFramer {
    sink: Box<dyn FrameSink>,
    message_id: Option<String>,
    ended: bool,
}

impl MessageFramer {
    pub fn new(sink: Box<dyn FrameSink>) -> Self {
        Self {
            sink,
            message_id: None,
            ended: false,
        }
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn is_started(&self) -> bool {
        self.message_id.is_some()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    async fn write(&mut self, frame: Frame) -> FrameResult<()> {
        let line = frame.encode()?;
        self.sink.send(line).await
    }

    /// Write the start frame; returns its message id
    pub async fn start(&mut self) -> FrameResult<String> {
        if self.is_started() {
            return Err(FrameError::OutOfOrder("start written twice"));
        }
        let message_id = generate_message_id();
        self.message_id = Some(message_id.clone());
        self.write(Frame::Start {
            message_id: message_id.clone(),
        })
        .await?;
        Ok(message_id)
    }

    /// Write a text delta; empty text writes nothing
    pub async fn delta(&mut self, text: &str) -> FrameResult<()> {
        if !self.is_started() {
            return Err(FrameError::OutOfOrder("delta before start"));
        }
        if self.ended {
            return Err(FrameError::OutOfOrder("delta after end"));
        }
        if text.is_empty() {
            return Ok(());
        }
        self.write(Frame::Delta(text.to_string())).await
    }

    /// Write an error message as a delta, starting the stream if needed
    pub async fn error(&mut self, message: &str) -> FrameResult<()> {
        if !self.is_started() {
            self.start().await?;
        }
        self.delta(message).await
    }

    /// Write the end frame
    ///
    /// The framer counts as ended even when the write fails, so no second end
    /// frame can ever follow.
    pub async fn end(&mut self, finish_reason: FinishReason, usage: Usage) -> FrameResult<()> {
        if self.ended {
            return Err(FrameError::OutOfOrder("end written twice"));
        }
        if !self.is_started() {
            self.start().await?;
        }
        self.ended = true;
        self.write(Frame::End { finish_reason, usage }).await
    }
}
