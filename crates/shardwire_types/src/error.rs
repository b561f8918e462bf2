//! Error codes shared across the RPC boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for wire encoding and decoding.
pub type WireResult<T> = Result<T, WireError>;

/// Errors produced while encoding or decoding wire messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Failed to encode a message.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a message.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },
}

impl WireError {
    /// Creates an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Creates a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }
}

/// Error code taxonomy reported by tablets.
///
/// Codes are grouped so that callers can decide a retry policy without
/// inspecting the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// No error.
    Success,
    /// The operation was cancelled by the caller.
    Cancelled,
    /// Unclassified failure.
    UnknownError,
    /// The request was malformed or semantically invalid.
    BadInput,
    /// The deadline expired before the operation completed.
    DeadlineExceeded,
    /// A constraint (such as a duplicate key) was violated.
    IntegrityError,
    /// The caller lacks permission for the operation.
    PermissionDenied,
    /// A quota or pool was exhausted.
    ResourceExhausted,
    /// The tablet does not serve the requested target.
    QueryNotServed,
    /// The referenced transaction does not exist.
    NotInTx,
    /// The tablet hit an internal invariant violation.
    InternalError,
    /// A transient condition; retrying may succeed.
    TransientError,
    /// The caller could not be authenticated.
    Unauthenticated,
}

impl ErrorCode {
    /// Returns true if a caller may retry the request as-is, possibly
    /// against another replica.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::QueryNotServed | ErrorCode::TransientError | ErrorCode::ResourceExhausted
        )
    }

    /// Returns the lowercase name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Success => "success",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::UnknownError => "unknown_error",
            ErrorCode::BadInput => "bad_input",
            ErrorCode::DeadlineExceeded => "deadline_exceeded",
            ErrorCode::IntegrityError => "integrity_error",
            ErrorCode::PermissionDenied => "permission_denied",
            ErrorCode::ResourceExhausted => "resource_exhausted",
            ErrorCode::QueryNotServed => "query_not_served",
            ErrorCode::NotInTx => "not_in_tx",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::TransientError => "transient_error",
            ErrorCode::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error as carried end-to-end over the wire: a code plus free text.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct RpcError {
    /// Error code.
    pub code: ErrorCode,
    /// Human readable message.
    pub message: String,
}

impl RpcError {
    /// Creates a new RPC error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
