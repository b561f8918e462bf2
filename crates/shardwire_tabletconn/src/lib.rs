//! # shardwire tabletconn
//!
//! Protocol-independent connection to a single tablet.
//!
//! This crate provides:
//! - The [`TabletConn`] contract with streaming result and health readers
//! - Per-call [`Context`] carrying cancellation, deadline and caller id
//! - An init-time [`DialerRegistry`] selecting a wire protocol by name
//! - Built-in transports: length-delimited frames over TCP and an
//!   in-process loopback for embedding and tests
//! - The server-side [`FrameService`] seam and frame helpers for listeners
//! - Split-query planning ([`plan_splits`])
//!
//! ## Key Invariants
//!
//! - Every operation on a closed connection fails with [`TabletError::ConnClosed`]
//! - A transaction id is nonzero and is dropped by commit or rollback
//!   whatever their outcome
//! - A stream yields chunks in order and ends with `None`; an error ends it
//! - Query splits cover every row of the original query exactly once
//!
//! ## Usage
//!
//! ```no_run
//! use shardwire_tabletconn::{ConnConfig, Context, DialerRegistry, LoopbackDirectory};
//! use shardwire_types::{BoundQuery, EndPoint, TabletType, Target};
//!
//! # async fn demo() -> shardwire_tabletconn::TabletResult<()> {
//! let config = ConnConfig::new("tcp");
//! let registry = DialerRegistry::builder()
//!     .with_builtin(&config, LoopbackDirectory::new())?
//!     .build(&config)?;
//!
//! let ctx = Context::background();
//! let endpoint = EndPoint::new(1, "127.0.0.1", 15991);
//! let target = Target::new("commerce", "0", TabletType::Master);
//! let mut conn = registry.dial(&ctx, &endpoint, &target).await?;
//! let result = conn.execute(&ctx, BoundQuery::new("select 1"), 0).await?;
//! println!("{} rows", result.rows.len());
//! conn.close().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod config;
mod conn;
mod context;
mod dialer;
mod error;
mod loopback;
mod rpc_conn;
mod split;
mod tcp;

pub use channel::{FrameReceiver, RpcChannel};
pub use config::{ConnConfig, DEFAULT_PROTOCOL};
pub use conn::{BeginExecuteOutcome, ResultStream, StreamHealthReader, TabletConn};
pub use context::Context;
pub use dialer::{DialerRegistry, DialerRegistryBuilder, TabletDialer};
pub use error::{ServerError, TabletError, TabletResult};
pub use loopback::{FrameService, LoopbackChannel, LoopbackDialer, LoopbackDirectory, SessionId};
pub use rpc_conn::RpcTabletConn;
pub use split::{plan_splits, KeyStats, END_BIND_PREFIX, MAX_SPLIT_COUNT, START_BIND_PREFIX};
pub use tcp::{read_frame, write_frame, TcpChannel, TcpDialer, RPC_PORT};
