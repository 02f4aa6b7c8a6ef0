use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use trellis_core::errors::SyncError;

/// Dials one WebSocket connection. The trait seam lets tests swap in a
/// scripted transport (see [`crate::mock::MockTransport`]).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), SyncError>;
}

/// Write half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, text: String) -> Result<(), SyncError>;
    async fn close(&mut self);
}

/// Read half of a connection. `None` means the peer closed.
#[async_trait]
pub trait FrameStream: Send {
    async fn next_frame(&mut self) -> Option<Result<String, SyncError>>;
}

/// Derive the WebSocket base url from an HTTP base url, keeping the secure
/// scheme paired (`https` -> `wss`).
pub fn ws_base_url(http_base: &str) -> String {
    if let Some(rest) = http_base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = http_base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        http_base.to_owned()
    }
}

type WsSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production transport over tokio-tungstenite.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), SyncError> {
        let (socket, _response) = connect_async(url).await.map_err(|e| match e {
            WsError::Url(_) => SyncError::InvalidUrl(e.to_string()),
            other => SyncError::ConnectFailed(other.to_string()),
        })?;
        let (tx, rx) = socket.split();
        Ok((Box::new(WsSink { inner: tx }), Box::new(WsFrames { inner: rx })))
    }
}

struct WsSink {
    inner: SplitSink<WsSocket, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, text: String) -> Result<(), SyncError> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.inner.close().await;
    }
}

struct WsFrames {
    inner: SplitStream<WsSocket>,
}

#[async_trait]
impl FrameStream for WsFrames {
    async fn next_frame(&mut self) -> Option<Result<String, SyncError>> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text.to_string())),
                // Control frames are handled by tungstenite; binary frames
                // are not part of the protocol.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_))) => continue,
                Some(Ok(Message::Close(_))) => return None,
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Some(Err(SyncError::Transport(e.to_string()))),
                None => return None,
            }
        }
    }
}
