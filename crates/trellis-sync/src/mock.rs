use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use trellis_core::errors::SyncError;

use crate::transport::{FrameSink, FrameStream, Transport};

/// One step of a scripted connection, played in order on the read side.
pub enum ScriptStep {
    /// Deliver a text frame to the client.
    Frame(String),
    /// Wait before the next step.
    Delay(Duration),
    /// Surface a transport error on the read side.
    Error(SyncError),
    /// The server closes the connection.
    Close,
    /// Keep the connection open until the client goes away.
    Hold,
}

impl ScriptStep {
    pub fn frame(text: impl Into<String>) -> Self {
        Self::Frame(text.into())
    }
}

/// Pre-programmed outcome for one `connect` call.
pub enum MockConnection {
    /// Connect succeeds; the connection then plays these steps.
    Script(Vec<ScriptStep>),
    /// Connect fails.
    ConnectError(SyncError),
}

impl MockConnection {
    /// Convenience: deliver these frames, then close.
    pub fn frames_then_close(frames: Vec<String>) -> Self {
        let mut steps: Vec<ScriptStep> = frames.into_iter().map(ScriptStep::Frame).collect();
        steps.push(ScriptStep::Close);
        Self::Script(steps)
    }

    /// Convenience: a connection that stays open and delivers nothing.
    pub fn held_open() -> Self {
        Self::Script(vec![ScriptStep::Hold])
    }

    /// Convenience: a refused connection.
    pub fn refused() -> Self {
        Self::ConnectError(SyncError::ConnectFailed("connection refused".into()))
    }
}

/// Transport returning pre-programmed connections in sequence, recording
/// every frame the client sends. Deterministic testing without a server.
pub struct MockTransport {
    connections: Mutex<VecDeque<MockConnection>>,
    connect_count: AtomicUsize,
    sent: Arc<Mutex<Vec<String>>>,
    urls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new(connections: Vec<MockConnection>) -> Self {
        Self {
            connections: Mutex::new(connections.into()),
            connect_count: AtomicUsize::new(0),
            sent: Arc::new(Mutex::new(Vec::new())),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// How many times `connect` was called.
    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::Relaxed)
    }

    /// Every text frame the client sent, across all connections.
    pub fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Every url the client dialed.
    pub fn dialed_urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), SyncError> {
        self.connect_count.fetch_add(1, Ordering::Relaxed);
        self.urls.lock().push(url.to_owned());

        let next = self.connections.lock().pop_front();
        match next {
            Some(MockConnection::Script(steps)) => Ok((
                Box::new(MockSink {
                    sent: Arc::clone(&self.sent),
                }),
                Box::new(MockFrames {
                    steps: steps.into(),
                }),
            )),
            Some(MockConnection::ConnectError(e)) => Err(e),
            None => Err(SyncError::ConnectFailed(
                "MockTransport: no connection scripted for this attempt".into(),
            )),
        }
    }
}

struct MockSink {
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send(&mut self, text: String) -> Result<(), SyncError> {
        self.sent.lock().push(text);
        Ok(())
    }

    async fn close(&mut self) {}
}

struct MockFrames {
    steps: VecDeque<ScriptStep>,
}

#[async_trait]
impl FrameStream for MockFrames {
    async fn next_frame(&mut self) -> Option<Result<String, SyncError>> {
        loop {
            match self.steps.pop_front() {
                Some(ScriptStep::Frame(text)) => return Some(Ok(text)),
                Some(ScriptStep::Delay(duration)) => {
                    tokio::time::sleep(duration).await;
                }
                Some(ScriptStep::Error(e)) => return Some(Err(e)),
                Some(ScriptStep::Close) | None => return None,
                Some(ScriptStep::Hold) => {
                    futures::future::pending::<()>().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_frames_in_order() {
        let transport = MockTransport::new(vec![MockConnection::frames_then_close(vec![
            "one".into(),
            "two".into(),
        ])]);

        let (_sink, mut stream) = transport.connect("ws://test").await.unwrap();
        assert_eq!(stream.next_frame().await.unwrap().unwrap(), "one");
        assert_eq!(stream.next_frame().await.unwrap().unwrap(), "two");
        assert!(stream.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn connect_error_surfaces() {
        let transport = MockTransport::new(vec![MockConnection::refused()]);
        let err = transport.connect("ws://test").await.err().unwrap();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn sent_frames_are_recorded() {
        let transport = MockTransport::new(vec![MockConnection::held_open()]);
        let (mut sink, _stream) = transport.connect("ws://test").await.unwrap();

        sink.send("hello".into()).await.unwrap();
        sink.send("world".into()).await.unwrap();
        assert_eq!(transport.sent_frames(), vec!["hello", "world"]);
    }

    #[tokio::test]
    async fn exhausted_script_refuses_connect() {
        let transport = MockTransport::new(vec![]);
        assert!(transport.connect("ws://test").await.is_err());
        assert_eq!(transport.connect_count(), 1);
        assert_eq!(transport.dialed_urls(), vec!["ws://test"]);
    }

    #[tokio::test]
    async fn read_error_surfaces_mid_script() {
        let transport = MockTransport::new(vec![MockConnection::Script(vec![
            ScriptStep::frame("ok"),
            ScriptStep::Error(SyncError::Transport("reset".into())),
        ])]);

        let (_sink, mut stream) = transport.connect("ws://test").await.unwrap();
        assert!(stream.next_frame().await.unwrap().is_ok());
        assert!(stream.next_frame().await.unwrap().is_err());
    }
}
