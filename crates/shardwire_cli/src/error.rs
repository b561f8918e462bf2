//! CLI error type.

use shardwire_tablet::TabletServerError;
use shardwire_tabletconn::TabletError;
use shardwire_vindex::VindexError;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that end a command.
#[derive(Error, Debug)]
pub enum CliError {
    /// Bad command-line argument.
    #[error("{0}")]
    Usage(String),

    /// The vschema or a vindex rejected the request.
    #[error(transparent)]
    Vindex(#[from] VindexError),

    /// The tablet connection failed.
    #[error(transparent)]
    Tablet(#[from] TabletError),

    /// The local tablet server failed.
    #[error(transparent)]
    Server(#[from] TabletServerError),

    /// JSON output could not be produced.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem failure.
    #[error("{path}: {source}")]
    Io {
        /// File involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    /// Creates a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}
