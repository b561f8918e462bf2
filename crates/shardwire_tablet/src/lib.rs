//! # shardwire tablet
//!
//! Reference tablet server speaking the shardwire frame protocol.
//!
//! This crate provides:
//! - The [`QueryEngine`] seam and a scripted [`MemoryEngine`]
//! - A transaction pool with buffered, atomically applied commits
//! - Request dispatch ([`TabletService`]), reachable in-process through a
//!   loopback directory or over TCP through [`TabletServer`]
//! - Health snapshot broadcast to every `StreamHealth` subscriber
//!
//! # Architecture
//!
//! A tablet serves exactly one keyspace shard. Requests addressed to any
//! other keyspace or shard fail with `QueryNotServed`. The service is
//! transport-agnostic: it consumes one encoded request and produces either
//! one encoded frame or a channel of frames, so the TCP listener and the
//! loopback transport share every code path past framing.
//!
//! ```
//! use shardwire_tablet::{MemoryEngine, ServerConfig, TabletService};
//! use shardwire_tabletconn::LoopbackDirectory;
//! use shardwire_types::{EndPoint, TabletType};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(MemoryEngine::new());
//! engine.add_table("user", "id", (1..=1000).collect());
//!
//! let config = ServerConfig::new("commerce", "0", TabletType::Master);
//! let service = Arc::new(TabletService::new(config, engine));
//!
//! let directory = LoopbackDirectory::new();
//! directory.register(&EndPoint::new(1, "tablet-1", 15991), service).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod engine;
mod error;
mod health;
mod server;
mod service;
mod tx;

pub use config::ServerConfig;
pub use engine::{MemoryEngine, QueryEngine};
pub use error::{ServerResult, TabletServerError};
pub use health::HealthBroadcaster;
pub use server::TabletServer;
pub use service::{Response, TabletService};
pub use tx::TxPool;
