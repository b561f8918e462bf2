//! Tablet server configuration.

use shardwire_types::{TabletType, Target};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for a tablet server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Keyspace served.
    pub keyspace: String,
    /// Shard served.
    pub shard: String,
    /// Role of this tablet.
    pub tablet_type: TabletType,
    /// Address the TCP listener binds to.
    pub bind_addr: SocketAddr,
    /// Rows per chunk of a streamed result.
    pub stream_chunk_size: usize,
    /// Largest result a non-streaming execute may return.
    pub max_result_rows: usize,
    /// Period of health snapshot refreshes.
    pub health_interval: Duration,
    /// Maximum concurrently open transactions.
    pub max_transactions: usize,
    /// Largest accepted request frame.
    pub max_frame_len: usize,
}

impl ServerConfig {
    /// Creates a configuration serving one keyspace shard.
    pub fn new(keyspace: impl Into<String>, shard: impl Into<String>, tablet_type: TabletType) -> Self {
        Self {
            keyspace: keyspace.into(),
            shard: shard.into(),
            tablet_type,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 15991)),
            stream_chunk_size: 128,
            max_result_rows: 10_000,
            health_interval: Duration::from_secs(20),
            max_transactions: 20,
            max_frame_len: 16 * 1024 * 1024,
        }
    }

    /// Sets the listener address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the rows per streamed chunk.
    pub fn with_stream_chunk_size(mut self, rows: usize) -> Self {
        self.stream_chunk_size = rows.max(1);
        self
    }

    /// Sets the row limit of non-streaming results.
    pub fn with_max_result_rows(mut self, rows: usize) -> Self {
        self.max_result_rows = rows;
        self
    }

    /// Sets the health refresh period.
    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    /// Sets the transaction pool capacity.
    pub fn with_max_transactions(mut self, max: usize) -> Self {
        self.max_transactions = max;
        self
    }

    /// Sets the request frame limit.
    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// Returns the target this configuration serves.
    pub fn target(&self) -> Target {
        Target::new(self.keyspace.clone(), self.shard.clone(), self.tablet_type)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("test_keyspace", "0", TabletType::Master)
    }
}
