//! Health snapshot broadcast.

use shardwire_types::StreamHealthResponse;
use std::sync::Arc;
use tokio::sync::watch;

/// Latest-value broadcast of a tablet's health.
///
/// Subscribers observe the most recent snapshot; intermediate snapshots
/// published between two reads are skipped.
#[derive(Debug, Clone)]
pub struct HealthBroadcaster {
    tx: Arc<watch::Sender<StreamHealthResponse>>,
}

impl HealthBroadcaster {
    /// Creates a broadcaster holding `initial`.
    pub fn new(initial: StreamHealthResponse) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Replaces the current snapshot and wakes every subscriber.
    pub fn publish(&self, snapshot: StreamHealthResponse) {
        self.tx.send_replace(snapshot);
    }

    /// Returns the current snapshot.
    pub fn current(&self) -> StreamHealthResponse {
        self.tx.borrow().clone()
    }

    /// Subscribes to future snapshots; the current one is marked unseen.
    pub fn subscribe(&self) -> watch::Receiver<StreamHealthResponse> {
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        rx
    }

    /// Returns the number of live subscribers.
    pub fn subscribers(&self) -> usize {
        self.tx.receiver_count()
    }
}
