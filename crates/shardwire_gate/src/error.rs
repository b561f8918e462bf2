//! Error types for keyspace-id routing.

use shardwire_tabletconn::TabletError;
use shardwire_types::{ErrorCode, KeyspaceId};
use shardwire_vindex::VindexError;
use thiserror::Error;

/// Result type for gate operations.
pub type GateResult<T> = Result<T, GateError>;

/// Errors raised while routing a request to shards.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GateError {
    /// The keyspace has no shards in the topology.
    #[error("keyspace '{0}' has no shards")]
    UnknownKeyspace(String),

    /// No shard range contains the keyspace id.
    #[error("no shard in keyspace '{keyspace}' owns keyspace id {keyspace_id}")]
    NoShard {
        /// Keyspace searched.
        keyspace: String,
        /// Keyspace id that found no owner.
        keyspace_id: KeyspaceId,
    },

    /// The topology is malformed.
    #[error("invalid topology: {0}")]
    Topology(String),

    /// The request cannot be routed as given.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A vindex failed to map a value.
    #[error("vindex error: {0}")]
    Vindex(#[from] VindexError),

    /// A shard task ended without a result.
    #[error("internal error: {0}")]
    Internal(String),

    /// A shard's tablet call failed.
    #[error("shard {keyspace}/{shard}: {source}")]
    Tablet {
        /// Keyspace of the failing shard.
        keyspace: String,
        /// Failing shard.
        shard: String,
        /// Connection error.
        #[source]
        source: TabletError,
    },
}

impl GateError {
    /// Wraps a tablet error with the shard it came from.
    pub fn tablet(keyspace: impl Into<String>, shard: impl Into<String>, source: TabletError) -> Self {
        Self::Tablet {
            keyspace: keyspace.into(),
            shard: shard.into(),
            source,
        }
    }

    /// Returns true if the request may be retried as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            GateError::Vindex(e) => e.is_retryable(),
            GateError::Tablet { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Returns the tablet's error code when a shard rejected the request.
    pub fn server_code(&self) -> Option<ErrorCode> {
        match self {
            GateError::Tablet { source, .. } => source.server_code(),
            _ => None,
        }
    }
}
