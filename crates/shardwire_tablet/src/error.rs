//! Error types for the tablet server.

use shardwire_tabletconn::TabletError;
use shardwire_types::{ErrorCode, RpcError, Target, TransactionId, WireError};
use thiserror::Error;

/// Result type for tablet server operations.
pub type ServerResult<T> = Result<T, TabletServerError>;

/// Errors raised while serving requests.
///
/// Every variant maps to an [`ErrorCode`] and travels to the client as an
/// [`RpcError`].
#[derive(Error, Debug)]
pub enum TabletServerError {
    /// The request addressed a keyspace or shard this tablet does not serve.
    #[error("target {requested} is not served here, serving {serving}")]
    QueryNotServed {
        /// Target named by the request.
        requested: Target,
        /// Target of this tablet.
        serving: Target,
    },

    /// Unknown or already ended transaction.
    #[error("transaction {0} not found")]
    NotInTx(TransactionId),

    /// Every transaction slot is taken.
    #[error("transaction pool is full: {0} open")]
    PoolExhausted(usize),

    /// A non-streaming result exceeded the configured row limit.
    #[error("result has {rows} rows, limit is {limit}")]
    TooManyRows {
        /// Rows in the result.
        rows: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Malformed or invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The query engine rejected a statement.
    #[error("{0}")]
    Engine(#[from] RpcError),

    /// Request decoding failed.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Framing failure on a client socket.
    #[error("frame error: {0}")]
    Frame(#[from] TabletError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TabletServerError {
    /// Returns the code reported to clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            TabletServerError::QueryNotServed { .. } => ErrorCode::QueryNotServed,
            TabletServerError::NotInTx(_) => ErrorCode::NotInTx,
            TabletServerError::PoolExhausted(_) | TabletServerError::TooManyRows { .. } => {
                ErrorCode::ResourceExhausted
            }
            TabletServerError::InvalidRequest(_) | TabletServerError::Wire(_) => ErrorCode::BadInput,
            TabletServerError::Engine(e) => e.code,
            TabletServerError::Frame(_) | TabletServerError::Io(_) => ErrorCode::InternalError,
        }
    }
}

impl From<TabletServerError> for RpcError {
    fn from(err: TabletServerError) -> Self {
        match err {
            TabletServerError::Engine(e) => e,
            other => RpcError::new(other.code(), other.to_string()),
        }
    }
}
