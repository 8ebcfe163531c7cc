//! Destinations for encoded frames

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::frame::{parse_frames, Frame, FrameError, FrameResult};

/// Where encoded frame lines go
///
/// A failed send means the client is gone; callers treat it like any other
/// turn failure and still run cleanup.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, line: String) -> FrameResult<()>;
}

/// Sink feeding a channel, typically drained into an HTTP body
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&mut self, line: String) -> FrameResult<()> {
        self.tx.send(line).await.map_err(|_| FrameError::Closed)
    }
}

/// In-memory sink; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    lines: Arc<Mutex<Vec<String>>>,
    close_after: Option<usize>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `n` lines, then behave like a disconnected client
    pub fn closing_after(n: usize) -> Self {
        Self {
            close_after: Some(n),
            ..Self::default()
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Everything written, concatenated
    pub fn body(&self) -> String {
        self.lines.lock().concat()
    }

    pub fn frames(&self) -> FrameResult<Vec<Frame>> {
        parse_frames(&self.body())
    }
}

#[async_trait]
impl FrameSink for BufferSink {
    async fn send(&mut self, line: String) -> FrameResult<()> {
        let mut lines = self.lines.lock();
        if self.close_after.is_some_and(|n| lines.len() >= n) {
            return Err(FrameError::Closed);
        }
        lines.push(line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_reports_closed_receiver() {
        let (mut sink, mut rx) = ChannelSink::channel(4);
        sink.send("0:\"a\"\n".into()).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("0:\"a\"\n"));

        drop(rx);
        assert!(matches!(sink.send("x".into()).await, Err(FrameError::Closed)));
    }

    #[tokio::test]
    async fn test_buffer_sink_shares_and_closes() {
        let mut sink = BufferSink::closing_after(1);
        let observer = sink.clone();
        sink.send("0:\"a\"\n".into()).await.unwrap();
        assert!(sink.send("0:\"b\"\n".into()).await.is_err());
        assert_eq!(observer.lines().len(), 1);
        assert_eq!(observer.frames().unwrap(), vec![Frame::Delta("a".into())]);
    }
}
