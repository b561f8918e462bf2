//! Error types for tablet connections.

use shardwire_types::{ErrorCode, RpcError, WireError};
use thiserror::Error;

/// Result type for tablet connection operations.
pub type TabletResult<T> = Result<T, TabletError>;

/// A semantic failure reported by the tablet.
pub type ServerError = RpcError;

/// Errors surfaced at the tablet connection boundary.
///
/// Operational errors (`ConnClosed`, `Cancelled`, `DeadlineExceeded`,
/// `Transport`, `Protocol`) mean the request may never have reached the
/// tablet. `Server` means the tablet processed the request and rejected it.
/// `Config` is invalid usage caught locally, before anything is sent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TabletError {
    /// The connection was closed.
    #[error("connection closed")]
    ConnClosed,

    /// The caller cancelled the context.
    #[error("operation cancelled")]
    Cancelled,

    /// The context deadline elapsed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Network or transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Malformed or unexpected message on the wire.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The tablet reported a failure.
    #[error("server error: {0}")]
    Server(ServerError),

    /// Invalid usage or configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TabletError {
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

    /// Creates a server error.
    pub fn server(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Server(RpcError::new(code, message))
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true for failures to communicate, as opposed to failures
    /// reported by the tablet or caught locally.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            TabletError::ConnClosed
                | TabletError::Cancelled
                | TabletError::DeadlineExceeded
                | TabletError::Transport { .. }
                | TabletError::Protocol(_)
        )
    }

    /// Returns true if retrying, possibly on another connection, may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TabletError::Transport { retryable, .. } => *retryable,
            TabletError::ConnClosed | TabletError::DeadlineExceeded => true,
            TabletError::Server(err) => err.code.is_retryable(),
            _ => false,
        }
    }

    /// Returns the tablet's error code for server errors.
    pub fn server_code(&self) -> Option<ErrorCode> {
        match self {
            TabletError::Server(err) => Some(err.code),
            _ => None,
        }
    }
}

impl From<RpcError> for TabletError {
    fn from(err: RpcError) -> Self {
        TabletError::Server(err)
    }
}

impl From<WireError> for TabletError {
    fn from(err: WireError) -> Self {
        TabletError::Protocol(err.to_string())
    }
}

impl From<std::io::Error> for TabletError {
    fn from(err: std::io::Error) -> Self {
        TabletError::transport_retryable(err.to_string())
    }
}
