//! CBOR wire envelopes for the tablet RPC protocol.
//!
//! Every request is a [`Request`] naming its target and a [`Call`]. Every
//! response is a sequence of [`Frame`]s: unary calls answer with exactly one
//! frame, streaming calls answer with zero or more chunk frames followed by
//! [`Reply::StreamEnd`] or an error frame.

use crate::batch::CallerId;
use crate::error::{RpcError, WireError, WireResult};
use crate::health::StreamHealthResponse;
use crate::query::{BoundQuery, QueryResult, QuerySplit, SplitAlgorithm};
use crate::topo::Target;
use crate::TransactionId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A request addressed to a tablet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Target the caller believes it is talking to.
    pub target: Target,
    /// Forwarded caller identity.
    pub caller_id: Option<CallerId>,
    /// The operation.
    pub call: Call,
}

/// One tablet operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Call {
    /// Run one query, optionally inside a transaction.
    Execute {
        /// Query to run.
        query: BoundQuery,
        /// Transaction id, 0 for autocommit.
        transaction_id: TransactionId,
    },
    /// Run several queries.
    ExecuteBatch {
        /// Queries in order.
        queries: Vec<BoundQuery>,
        /// Wrap the batch in an internal transaction.
        as_transaction: bool,
        /// Transaction id, 0 for none.
        transaction_id: TransactionId,
    },
    /// Run a query and stream the result back in chunks.
    StreamExecute {
        /// Query to run.
        query: BoundQuery,
    },
    /// Open a transaction.
    Begin,
    /// Commit a transaction.
    Commit {
        /// Transaction to commit.
        transaction_id: TransactionId,
    },
    /// Roll back a transaction.
    Rollback {
        /// Transaction to roll back.
        transaction_id: TransactionId,
    },
    /// Open a transaction and run one query in it.
    BeginExecute {
        /// Query to run.
        query: BoundQuery,
    },
    /// Open a transaction and run several queries in it.
    BeginExecuteBatch {
        /// Queries in order.
        queries: Vec<BoundQuery>,
        /// Forwarded as-is; the tablet rejects it combined with a transaction.
        as_transaction: bool,
    },
    /// Split a query into sub-range queries.
    SplitQuery {
        /// Query to split.
        query: BoundQuery,
        /// Columns to split on (the first one drives the split).
        split_columns: Vec<String>,
        /// Desired number of splits, 0 if sized by rows.
        split_count: i64,
        /// Desired rows per split, 0 if sized by count.
        num_rows_per_query_part: i64,
        /// Split algorithm.
        algorithm: SplitAlgorithm,
    },
    /// Subscribe to health snapshots.
    StreamHealth,
}

impl Call {
    /// Returns the RPC method name, for logging.
    pub fn method(&self) -> &'static str {
        match self {
            Call::Execute { .. } => "Execute",
            Call::ExecuteBatch { .. } => "ExecuteBatch",
            Call::StreamExecute { .. } => "StreamExecute",
            Call::Begin => "Begin",
            Call::Commit { .. } => "Commit",
            Call::Rollback { .. } => "Rollback",
            Call::BeginExecute { .. } => "BeginExecute",
            Call::BeginExecuteBatch { .. } => "BeginExecuteBatch",
            Call::SplitQuery { .. } => "SplitQuery",
            Call::StreamHealth => "StreamHealth",
        }
    }

    /// Returns true for calls answered with a stream of frames.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Call::StreamExecute { .. } | Call::StreamHealth)
    }
}

/// A successful response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    /// Result of `Execute`.
    Result(QueryResult),
    /// Results of `ExecuteBatch`.
    Results(Vec<QueryResult>),
    /// Transaction id returned by `Begin`.
    TransactionId(TransactionId),
    /// Acknowledgement of `Commit` or `Rollback`.
    Done,
    /// Outcome of `BeginExecute`. The id is set whenever the begin worked.
    BeginExecute {
        /// Transaction opened by the begin part, 0 if it failed.
        transaction_id: TransactionId,
        /// Outcome of the execute part.
        result: Result<QueryResult, RpcError>,
    },
    /// Outcome of `BeginExecuteBatch`.
    BeginExecuteBatch {
        /// Transaction opened by the begin part, 0 if it failed.
        transaction_id: TransactionId,
        /// Outcome of the execute part.
        result: Result<Vec<QueryResult>, RpcError>,
    },
    /// Splits returned by `SplitQuery`.
    Splits(Vec<QuerySplit>),
    /// One chunk of a `StreamExecute` result.
    StreamChunk(QueryResult),
    /// One `StreamHealth` snapshot.
    Health(StreamHealthResponse),
    /// Clean end of a stream.
    StreamEnd,
}

/// One response frame: a reply or a server-reported error.
pub type Frame = Result<Reply, RpcError>;

/// Encodes any serializable message to CBOR.
pub fn to_cbor<T: Serialize>(message: &T) -> WireResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf)
        .map_err(|e| WireError::encoding_failed(e.to_string()))?;
    Ok(buf)
}

/// Decodes any deserializable message from CBOR.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> WireResult<T> {
    ciborium::from_reader(bytes).map_err(|e| WireError::decoding_failed(e.to_string()))
}

/// Encodes a request.
pub fn encode_request(request: &Request) -> WireResult<Vec<u8>> {
    to_cbor(request)
}

/// Decodes a request.
pub fn decode_request(bytes: &[u8]) -> WireResult<Request> {
    from_cbor(bytes)
}

/// Encodes a response frame.
pub fn encode_frame(frame: &Frame) -> WireResult<Vec<u8>> {
    to_cbor(frame)
}

/// Decodes a response frame.
pub fn decode_frame(bytes: &[u8]) -> WireResult<Frame> {
    from_cbor(bytes)
}
