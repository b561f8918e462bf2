//! # shardwire types
//!
//! Data model shared by the vindex framework, the tablet connection layer
//! and the reference tablet server.
//!
//! This crate provides:
//! - `KeyspaceId` and `KeyRange` for shard placement
//! - `Value`, `Type` and bind variables
//! - Query, result and split types
//! - Target and tablet addressing types
//! - Health snapshots
//! - The error code taxonomy carried across the RPC boundary
//! - CBOR wire envelopes (`wire` module)
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod error;
mod health;
mod keyspace;
mod query;
mod sqltype;
mod topo;
mod value;
pub mod wire;

pub use batch::{BoundKeyspaceIdQuery, CallerId, KeyspaceIdBatchQuery, Session, ShardSession};
pub use error::{ErrorCode, RpcError, WireError, WireResult};
pub use health::{RealtimeStats, StreamHealthResponse};
pub use keyspace::{KeyRange, KeyspaceId};
pub use query::{BoundQuery, Field, QueryResult, QuerySplit, SplitAlgorithm};
pub use sqltype::Type;
pub use topo::{EndPoint, TabletType, Target};
pub use value::{BindValue, BindVars, Value};

/// A transaction id as handed out by a tablet. Zero means "no transaction".
pub type TransactionId = i64;
