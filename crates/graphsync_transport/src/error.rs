//! Error types for the transport layer.

use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur while exchanging a request with the remote service.
///
/// A response with a non-success status is not an error at this layer;
/// callers inspect [`Response::status`](crate::Response::status).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Network or client error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation could succeed if repeated.
        retryable: bool,
    },

    /// Malformed request or response framing.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server refused the supplied credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// Not connected.
    #[error("not connected to server")]
    NotConnected,
}

impl TransportError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if repeating the request might succeed.
    ///
    /// This is advisory; nothing in graphsync retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Transport { retryable, .. } => *retryable,
            TransportError::Timeout | TransportError::NotConnected => true,
            TransportError::Protocol(_) | TransportError::AuthenticationFailed(_) => false,
        }
    }
}
