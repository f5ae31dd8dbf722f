//! Error types for the replication engine.

use graphsync_codec::CodecError;
use graphsync_transport::TransportError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in replication engine operations.
///
/// Structural violations (wrong state, unknown store, read-only writes)
/// are returned synchronously. Remote failures reach the caller through
/// the request or commit handle that triggered them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The remote service answered with a non-success status.
    #[error("remote service returned {status}: {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Response text or a short description.
        message: String,
    },

    /// A named store, object or resource does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// Operation not permitted in the current lifecycle state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// The request was malformed (for example an empty store scope).
    #[error("invalid access: {message}")]
    InvalidAccess {
        /// Description of the problem.
        message: String,
    },

    /// A write was issued in a read-only transaction.
    #[error("object store {store} is read-only in this transaction")]
    ReadOnly {
        /// Store that received the write.
        store: String,
    },

    /// A request was issued on a store with no open transaction.
    #[error("transaction inactive: {message}")]
    TransactionInactive {
        /// Description of the problem.
        message: String,
    },

    /// A value was rejected.
    #[error("data error: {message}")]
    Data {
        /// Description of the rejected value.
        message: String,
    },

    /// Transaction was aborted.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for abort.
        reason: String,
    },

    /// Database is closed.
    #[error("database is closed")]
    DatabaseClosed,
}

impl CoreError {
    /// Creates a remote status error.
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates an invalid access error.
    pub fn invalid_access(message: impl Into<String>) -> Self {
        Self::InvalidAccess {
            message: message.into(),
        }
    }

    /// Creates a read-only error.
    pub fn read_only(store: impl Into<String>) -> Self {
        Self::ReadOnly {
            store: store.into(),
        }
    }

    /// Creates a transaction inactive error.
    pub fn transaction_inactive(message: impl Into<String>) -> Self {
        Self::TransactionInactive {
            message: message.into(),
        }
    }

    /// Creates a data error.
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    /// Creates a transaction aborted error.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Returns true if the error came from the network or the remote
    /// service rather than from a local rule.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Remote { .. })
    }
}
