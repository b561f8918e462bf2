//! Tablet health snapshots.

use crate::topo::Target;
use serde::{Deserialize, Serialize};

/// Live serving statistics of a tablet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealtimeStats {
    /// Non-empty when the tablet considers itself unhealthy.
    pub health_error: String,
    /// Replication lag in seconds.
    pub seconds_behind_master: u32,
    /// CPU usage, 0.0 to 100.0.
    pub cpu_usage: f64,
    /// Queries per second served.
    pub qps: f64,
}

/// One point-in-time health report pulled from a health stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamHealthResponse {
    /// Target the tablet is serving.
    pub target: Target,
    /// Last externally triggered reparent time (unix seconds), 0 if never.
    pub tablet_externally_reparented_timestamp: i64,
    /// Serving statistics; absent until the tablet has computed them.
    pub realtime_stats: Option<RealtimeStats>,
}

impl StreamHealthResponse {
    /// Returns true when stats are present and report no error.
    pub fn is_healthy(&self) -> bool {
        self.realtime_stats
            .as_ref()
            .is_some_and(|stats| stats.health_error.is_empty())
    }
}
