//! Tablet addressing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Role of a tablet within its shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TabletType {
    /// Unknown or unset.
    #[default]
    Unknown,
    /// The writable primary.
    Master,
    /// A replica serving live traffic.
    Replica,
    /// A replica serving batch and analytics traffic.
    Rdonly,
    /// A spare replica not serving traffic.
    Spare,
    /// Experimental tablet.
    Experimental,
    /// Tablet taking a backup.
    Backup,
    /// Tablet restoring from a backup.
    Restore,
    /// Tablet used by a worker process.
    Worker,
}

impl TabletType {
    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TabletType::Unknown => "unknown",
            TabletType::Master => "master",
            TabletType::Replica => "replica",
            TabletType::Rdonly => "rdonly",
            TabletType::Spare => "spare",
            TabletType::Experimental => "experimental",
            TabletType::Backup => "backup",
            TabletType::Restore => "restore",
            TabletType::Worker => "worker",
        }
    }
}

impl fmt::Display for TabletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TabletType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(TabletType::Unknown),
            "master" => Ok(TabletType::Master),
            "replica" => Ok(TabletType::Replica),
            "rdonly" => Ok(TabletType::Rdonly),
            "spare" => Ok(TabletType::Spare),
            "experimental" => Ok(TabletType::Experimental),
            "backup" => Ok(TabletType::Backup),
            "restore" => Ok(TabletType::Restore),
            "worker" => Ok(TabletType::Worker),
            other => Err(format!("unknown tablet type: {other}")),
        }
    }
}

/// The logical owner a connection talks to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Keyspace name.
    pub keyspace: String,
    /// Shard name.
    pub shard: String,
    /// Tablet role.
    pub tablet_type: TabletType,
}

impl Target {
    /// Creates a target.
    pub fn new(keyspace: impl Into<String>, shard: impl Into<String>, tablet_type: TabletType) -> Self {
        Self {
            keyspace: keyspace.into(),
            shard: shard.into(),
            tablet_type,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.keyspace, self.shard, self.tablet_type)
    }
}

/// Network location of a tablet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndPoint {
    /// Tablet uid.
    pub uid: u32,
    /// Host name or address.
    pub host: String,
    /// Named ports, e.g. `"rpc"`.
    pub port_map: BTreeMap<String, u16>,
}

impl EndPoint {
    /// Creates an endpoint with a single `rpc` port.
    pub fn new(uid: u32, host: impl Into<String>, rpc_port: u16) -> Self {
        let mut port_map = BTreeMap::new();
        port_map.insert("rpc".to_string(), rpc_port);
        Self {
            uid,
            host: host.into(),
            port_map,
        }
    }

    /// Returns `host:port` for a named port.
    pub fn addr(&self, port_name: &str) -> Option<String> {
        self.port_map
            .get(port_name)
            .map(|port| format!("{}:{}", self.host, port))
    }
}
