use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use trellis_core::ids::{ClientId, SessionId, WidgetId};
use trellis_core::model::{UpdateSink, WidgetModel};
use trellis_core::wire::{ClientMessage, ServerMessage};
use trellis_telemetry::MetricsRecorder;

use crate::backoff::ReconnectPolicy;
use crate::chrome::ConnectionChrome;
use crate::registry::ModelRegistry;
use crate::transport::{FrameSink, FrameStream, Transport};

/// Lifecycle of the server connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Dialing the server.
    Connecting,
    /// Connected; updates flow both ways.
    Open,
    /// Waiting out the backoff delay before the next connect.
    Retrying,
    /// The server rejected the session. Terminal.
    SessionInvalid,
    /// The reconnect budget is spent. Terminal.
    Exhausted,
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Retrying => "retrying",
            Self::SessionInvalid => "session_invalid",
            Self::Exhausted => "exhausted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SessionInvalid | Self::Exhausted)
    }
}

/// Configuration for the connection task.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// WebSocket base url, e.g. `ws://127.0.0.1:8000`.
    pub server_url: String,
    pub reconnect: ReconnectPolicy,
    /// Ask the server to replay widget states on every (re)open.
    pub resync_on_open: bool,
    /// Writer queue depth per connection.
    pub outbound_queue: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8000".into(),
            reconnect: ReconnectPolicy::default(),
            resync_on_open: true,
            outbound_queue: 32,
        }
    }
}

/// Session endpoint for one client: `<base>/ws/<client_id>/<session_id>`.
pub fn session_url(base: &str, client_id: &ClientId, session_id: &SessionId) -> String {
    format!(
        "{}/ws/{}/{}",
        base.trim_end_matches('/'),
        client_id,
        session_id
    )
}

/// Cheap, cloneable handle to a running connection.
///
/// Outbound updates are transmitted only while the connection is open;
/// otherwise they are dropped and counted, never queued. The handle doubles
/// as the [`UpdateSink`] installed on registered widget models.
#[derive(Clone)]
pub struct SyncHandle {
    client_id: ClientId,
    session_id: SessionId,
    registry: Arc<ModelRegistry>,
    outbound: Arc<RwLock<Option<mpsc::Sender<String>>>>,
    state_rx: watch::Receiver<ConnectionState>,
    metrics: Option<Arc<MetricsRecorder>>,
    cancel: CancellationToken,
}

impl SyncHandle {
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Watch channel mirroring the connection state.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Block until the connection reaches `target`, or the task ends.
    pub async fn wait_for_state(&self, target: ConnectionState) {
        let mut rx = self.state_rx.clone();
        let _ = rx.wait_for(|s| *s == target).await;
    }

    /// Register a model for inbound dispatch and install this handle as its
    /// outbound sink. Re-registering a widget id replaces the mapping.
    pub fn register(&self, model: Arc<WidgetModel>) {
        model.attach_sink(Arc::new(self.clone()));
        if self.registry.insert(model).is_some() {
            debug!("widget re-registered, previous model detached");
        }
        if let Some(m) = &self.metrics {
            m.gauge_set("sync.models.registered", &[], self.registry.len() as f64);
        }
    }

    /// Send one property update to the server. Dropped (and counted) when
    /// the connection is not open.
    pub fn send_update(&self, widget_id: &WidgetId, property: &str, value: &Value) {
        self.send_message(&ClientMessage::WidgetUpdate {
            widget_id: widget_id.clone(),
            property: property.to_owned(),
            value: value.clone(),
        });
    }

    /// Ask the server to replay current widget states.
    pub fn request_states(&self) {
        self.send_message(&ClientMessage::GetWidgetStates {
            client_id: self.client_id.clone(),
        });
    }

    /// Stop the connection task.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn send_message(&self, message: &ClientMessage) {
        let sender = self.outbound.read().as_ref().cloned();
        let Some(tx) = sender else {
            debug!(
                message_type = message.message_type(),
                "connection not open, outbound message dropped"
            );
            self.count_dropped("not_open");
            return;
        };

        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to serialize outbound message");
                return;
            }
        };

        match tx.try_send(text) {
            Ok(()) => {
                if let Some(m) = &self.metrics {
                    m.counter_inc(
                        "sync.outbound.sent",
                        &[("type", message.message_type())],
                        1,
                    );
                }
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("outbound queue full, message dropped");
                self.count_dropped("queue_full");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.count_dropped("closed");
            }
        }
    }

    fn count_dropped(&self, reason: &str) {
        if let Some(m) = &self.metrics {
            m.counter_inc("sync.outbound.dropped", &[("reason", reason)], 1);
        }
    }
}

impl UpdateSink for SyncHandle {
    fn send_update(&self, widget_id: &WidgetId, property: &str, value: &Value) {
        SyncHandle::send_update(self, widget_id, property, value);
    }
}

/// Owns the spawned connection task.
pub struct ConnectionManager {
    handle: SyncHandle,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Spawn the connection task. A fresh client id is generated per run;
    /// the session id comes from the bootstrap manifest.
    pub fn spawn(
        config: ConnectionConfig,
        session_id: SessionId,
        transport: Arc<dyn Transport>,
        registry: Arc<ModelRegistry>,
        chrome: Arc<dyn ConnectionChrome>,
        metrics: Option<Arc<MetricsRecorder>>,
    ) -> Self {
        let client_id = ClientId::new();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let outbound = Arc::new(RwLock::new(None));
        let cancel = CancellationToken::new();

        let handle = SyncHandle {
            client_id: client_id.clone(),
            session_id: session_id.clone(),
            registry: Arc::clone(&registry),
            outbound: Arc::clone(&outbound),
            state_rx,
            metrics: metrics.clone(),
            cancel: cancel.clone(),
        };

        let url = session_url(&config.server_url, &client_id, &session_id);
        let ctx = RunCtx {
            config,
            url,
            client_id,
            transport,
            registry,
            chrome,
            metrics,
            outbound,
            state_tx,
            cancel,
        };
        let task = tokio::spawn(run_connection(ctx));

        Self { handle, task }
    }

    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    /// Cancel the connection task and wait for it to finish.
    pub async fn shutdown(self) {
        self.handle.shutdown();
        let _ = self.task.await;
    }

    /// Wait for the task to end on its own (terminal state or cancellation).
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

struct RunCtx {
    config: ConnectionConfig,
    url: String,
    client_id: ClientId,
    transport: Arc<dyn Transport>,
    registry: Arc<ModelRegistry>,
    chrome: Arc<dyn ConnectionChrome>,
    metrics: Option<Arc<MetricsRecorder>>,
    outbound: Arc<RwLock<Option<mpsc::Sender<String>>>>,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl RunCtx {
    fn set_state(&self, state: ConnectionState) {
        trace!(state = state.name(), "connection state");
        let _ = self.state_tx.send(state);
    }

    fn count(&self, name: &str, labels: &[(&str, &str)]) {
        if let Some(m) = &self.metrics {
            m.counter_inc(name, labels, 1);
        }
    }
}

enum CloseReason {
    Closed(String),
    SessionInvalid(String),
    Cancelled,
}

async fn run_connection(ctx: RunCtx) {
    let mut attempts: u32 = 0;
    loop {
        ctx.set_state(ConnectionState::Connecting);
        let connect = tokio::select! {
            _ = ctx.cancel.cancelled() => return,
            result = ctx.transport.connect(&ctx.url) => result,
        };

        match connect {
            Ok((sink, stream)) => {
                let (tx, rx) = mpsc::channel(ctx.config.outbound_queue);
                if ctx.config.resync_on_open {
                    let resync = ClientMessage::GetWidgetStates {
                        client_id: ctx.client_id.clone(),
                    };
                    if let Ok(text) = serde_json::to_string(&resync) {
                        let _ = tx.try_send(text);
                    }
                }
                *ctx.outbound.write() = Some(tx);
                attempts = 0;
                ctx.set_state(ConnectionState::Open);
                ctx.chrome.connection_restored();
                ctx.count("sync.connections.opened", &[]);
                info!(url = %ctx.url, "connected to widget server");

                let reason = drive_connection(&ctx, sink, stream, rx).await;
                *ctx.outbound.write() = None;

                match reason {
                    CloseReason::SessionInvalid(message) => {
                        ctx.set_state(ConnectionState::SessionInvalid);
                        ctx.chrome.session_invalid(&message);
                        return;
                    }
                    CloseReason::Cancelled => return,
                    CloseReason::Closed(detail) => {
                        warn!(detail = %detail, "connection closed");
                    }
                }
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "fatal connect error, giving up");
                ctx.set_state(ConnectionState::Exhausted);
                ctx.chrome.reconnect_exhausted();
                return;
            }
            Err(e) => {
                warn!(error = %e, "connect failed");
            }
        }

        let next_attempt = attempts + 1;
        let Some(delay) = ctx.config.reconnect.delay_for(next_attempt) else {
            ctx.set_state(ConnectionState::Exhausted);
            ctx.chrome.reconnect_exhausted();
            return;
        };
        attempts = next_attempt;
        ctx.set_state(ConnectionState::Retrying);
        ctx.chrome.connection_lost();
        ctx.count("sync.reconnect.attempts", &[]);
        debug!(
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );

        tokio::select! {
            _ = ctx.cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Pump one open connection: forward queued outbound frames, dispatch
/// inbound frames. Returns why the connection ended.
async fn drive_connection(
    ctx: &RunCtx,
    mut sink: Box<dyn FrameSink>,
    mut stream: Box<dyn FrameStream>,
    mut rx: mpsc::Receiver<String>,
) -> CloseReason {
    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                sink.close().await;
                return CloseReason::Cancelled;
            }
            outbound = rx.recv() => match outbound {
                Some(text) => {
                    if let Err(e) = sink.send(text).await {
                        return CloseReason::Closed(e.to_string());
                    }
                }
                None => return CloseReason::Closed("outbound channel dropped".into()),
            },
            frame = stream.next_frame() => match frame {
                Some(Ok(text)) => {
                    if let Some(message) = dispatch_frame(ctx, &text) {
                        sink.close().await;
                        return CloseReason::SessionInvalid(message);
                    }
                }
                Some(Err(e)) => return CloseReason::Closed(e.to_string()),
                None => return CloseReason::Closed("closed by server".into()),
            },
        }
    }
}

/// Dispatch one inbound frame. Returns `Some(message)` when the server
/// invalidated the session; every other outcome keeps the connection open.
fn dispatch_frame(ctx: &RunCtx, text: &str) -> Option<String> {
    let message: ServerMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "malformed frame dropped");
            ctx.count("sync.messages.malformed", &[]);
            return None;
        }
    };
    ctx.count(
        "sync.messages.received",
        &[("type", message.message_type())],
    );

    match message {
        ServerMessage::SessionError { message } => {
            Some(message.unwrap_or_else(|| "session rejected".into()))
        }
        ServerMessage::WidgetUpdate {
            widget_id,
            property,
            value,
        } => {
            match ctx.registry.get(&widget_id) {
                Some(model) => model.apply_remote(property, value),
                None => {
                    debug!(widget_id = %widget_id, "update for unknown widget dropped");
                }
            }
            None
        }
        ServerMessage::Error { error } => {
            ctx.chrome.show_error(&error);
            None
        }
        ServerMessage::InitConfig { widgets } => {
            debug!(widget_count = widgets.len(), "init-config received");
            None
        }
        ServerMessage::Unknown => {
            trace!("unrecognized message type dropped");
            None
        }
    }
}
