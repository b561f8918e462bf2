//! Error types for the vindex framework.

use thiserror::Error;

/// Result type for vindex operations.
pub type VindexResult<T> = Result<T, VindexError>;

/// Errors raised by vindex construction, mapping and verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VindexError {
    /// The input value has a shape the vindex cannot map.
    #[error("{vindex}: unsupported input: {message}")]
    UnsupportedInput {
        /// Name of the vindex.
        vindex: String,
        /// Description of the rejected input.
        message: String,
    },

    /// The lookup backing store could not be reached.
    #[error("{vindex}: lookup store unavailable: {message}")]
    StoreUnavailable {
        /// Name of the vindex.
        vindex: String,
        /// Description from the store.
        message: String,
    },

    /// A lookup row already maps the value to a different keyspace id.
    #[error("{vindex}: lookup conflict: {message}")]
    LookupConflict {
        /// Name of the vindex.
        vindex: String,
        /// Description of the conflict.
        message: String,
    },

    /// A required construction parameter is missing.
    #[error("{vindex}: missing required parameter '{param}'")]
    MissingParam {
        /// Name of the vindex.
        vindex: String,
        /// Missing parameter name.
        param: String,
    },

    /// A construction parameter has an invalid value.
    #[error("{vindex}: invalid parameter '{param}': {message}")]
    InvalidParam {
        /// Name of the vindex.
        vindex: String,
        /// Parameter name.
        param: String,
        /// Why the value was rejected.
        message: String,
    },

    /// A constructor is already registered under this type name.
    #[error("vindex type '{0}' is already registered")]
    DuplicateType(String),

    /// No constructor is registered under this type name.
    #[error("vindex type '{0}' is not registered")]
    UnknownType(String),

    /// No vindex with this name exists in the keyspace.
    #[error("vindex '{vindex}' not found in keyspace '{keyspace}'")]
    UnknownVindex {
        /// Keyspace searched.
        keyspace: String,
        /// Vindex name.
        vindex: String,
    },

    /// The keyspace is not part of the schema.
    #[error("keyspace '{0}' not found")]
    UnknownKeyspace(String),

    /// The schema document is malformed.
    #[error("invalid vschema: {0}")]
    Schema(String),

    /// The vindex does not offer the requested capability.
    #[error("{vindex}: operation not supported: {operation}")]
    Unsupported {
        /// Name of the vindex.
        vindex: String,
        /// Requested operation.
        operation: String,
    },
}

impl VindexError {
    /// Creates an unsupported input error.
    pub fn unsupported_input(vindex: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnsupportedInput {
            vindex: vindex.into(),
            message: message.into(),
        }
    }

    /// Creates a missing parameter error.
    pub fn missing_param(vindex: impl Into<String>, param: impl Into<String>) -> Self {
        Self::MissingParam {
            vindex: vindex.into(),
            param: param.into(),
        }
    }

    /// Creates an invalid parameter error.
    pub fn invalid_param(
        vindex: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParam {
            vindex: vindex.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Wraps a store error with the vindex name.
    pub fn from_store(vindex: impl Into<String>, err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(message) => Self::StoreUnavailable {
                vindex: vindex.into(),
                message,
            },
            StoreError::Conflict(message) => Self::LookupConflict {
                vindex: vindex.into(),
                message,
            },
        }
    }

    /// Returns true for configuration errors that must stop startup.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            VindexError::MissingParam { .. }
                | VindexError::InvalidParam { .. }
                | VindexError::DuplicateType(_)
                | VindexError::UnknownType(_)
                | VindexError::Schema(_)
        )
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VindexError::StoreUnavailable { .. })
    }
}

/// Errors reported by a lookup backing store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The write conflicts with an existing row.
    #[error("conflict: {0}")]
    Conflict(String),
}
