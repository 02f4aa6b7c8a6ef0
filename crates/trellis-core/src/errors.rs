/// Typed error hierarchy for the synchronization bridge.
/// Classifies errors as fatal (stop reconnecting), retryable, or operational.
#[derive(Clone, Debug, thiserror::Error)]
pub enum SyncError {
    // Fatal — don't retry
    #[error("session rejected by server: {0}")]
    SessionRejected(String),
    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    // Retryable
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("connection closed: {0}")]
    ConnectionClosed(String),
    #[error("transport error: {0}")]
    Transport(String),

    // Operational
    #[error("cancelled")]
    Cancelled,
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed(_) | Self::ConnectionClosed(_) | Self::Transport(_)
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionRejected(_) | Self::InvalidUrl(_))
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::SessionRejected(_) => "session_rejected",
            Self::InvalidUrl(_) => "invalid_url",
            Self::ConnectFailed(_) => "connect_failed",
            Self::ConnectionClosed(_) => "connection_closed",
            Self::Transport(_) => "transport",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(SyncError::ConnectFailed("refused".into()).is_retryable());
        assert!(SyncError::ConnectionClosed("going away".into()).is_retryable());
        assert!(SyncError::Transport("io".into()).is_retryable());
    }

    #[test]
    fn fatal_classification() {
        assert!(SyncError::SessionRejected("expired".into()).is_fatal());
        assert!(SyncError::InvalidUrl("not-a-url".into()).is_fatal());
        assert!(!SyncError::SessionRejected("expired".into()).is_retryable());
    }

    #[test]
    fn cancelled_is_neither() {
        let e = SyncError::Cancelled;
        assert!(!e.is_retryable());
        assert!(!e.is_fatal());
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(SyncError::Cancelled.error_kind(), "cancelled");
        assert_eq!(
            SyncError::SessionRejected("x".into()).error_kind(),
            "session_rejected"
        );
        assert_eq!(
            SyncError::ConnectFailed("x".into()).error_kind(),
            "connect_failed"
        );
    }
}
