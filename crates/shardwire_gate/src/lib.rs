//! # shardwire gate
//!
//! Keyspace-id routing on top of vindexes and tablet connections.
//!
//! This crate provides:
//! - The [`Topology`] seam describing shards and their tablets, with an
//!   in-memory implementation
//! - A [`Resolver`] mapping keyspace ids and column values to shards
//! - [`Gate::execute_batch_keyspace_ids`], fanning a batch out to the owning
//!   shards in parallel and reassembling results in input order
//!
//! Cross-shard atomicity is out of scope: `as_transaction` makes each
//! shard's part atomic on its own.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod gate;
mod resolver;
mod topology;

pub use error::{GateError, GateResult};
pub use gate::Gate;
pub use resolver::Resolver;
pub use topology::{shard_key_range, MemoryTopology, ShardReference, Topology};
