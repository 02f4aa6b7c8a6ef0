/// Presentation-layer collaborator for connection lifecycle events.
///
/// The sync core decides *when* the user should see something; an
/// implementation decides *how* (status banner, modal, log line). Callbacks
/// are invoked from the connection task and must not block.
pub trait ConnectionChrome: Send + Sync {
    /// The connection dropped and a reconnect attempt is scheduled.
    fn connection_lost(&self);
    /// The connection is open (first connect or after a retry).
    fn connection_restored(&self);
    /// The server rejected the session. Reconnecting has stopped, and the
    /// connection-lost indicator should not be shown.
    fn session_invalid(&self, message: &str);
    /// The reconnect budget is spent.
    fn reconnect_exhausted(&self);
    /// The server reported an application error; the connection stays up.
    fn show_error(&self, message: &str);
}

/// Chrome that narrates lifecycle events to the log. Used by headless
/// clients and as a default when no UI is attached.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingChrome;

impl ConnectionChrome for LoggingChrome {
    fn connection_lost(&self) {
        tracing::warn!("connection lost, reconnecting");
    }

    fn connection_restored(&self) {
        tracing::info!("connection established");
    }

    fn session_invalid(&self, message: &str) {
        tracing::error!(message = %message, "session rejected by server");
    }

    fn reconnect_exhausted(&self) {
        tracing::error!("reconnect attempts exhausted, giving up");
    }

    fn show_error(&self, message: &str) {
        tracing::error!(message = %message, "server reported an error");
    }
}
