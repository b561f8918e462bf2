//! Shard placement lookup.

use crate::error::{GateError, GateResult};
use parking_lot::RwLock;
use shardwire_types::{EndPoint, KeyRange};
use std::collections::HashMap;
use std::fmt::Debug;
use tracing::debug;

/// One shard of a keyspace and where its tablet listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardReference {
    /// Shard name, e.g. `-80`.
    pub name: String,
    /// Keyspace ids owned by the shard.
    pub key_range: KeyRange,
    /// Tablet serving the shard.
    pub endpoint: EndPoint,
}

/// Source of shard placement.
pub trait Topology: Send + Sync + Debug {
    /// Returns the shards of a keyspace.
    fn shards(&self, keyspace: &str) -> GateResult<Vec<ShardReference>>;
}

/// Parses a shard name into its key range. `0` names the single shard of
/// an unsharded keyspace.
pub fn shard_key_range(name: &str) -> GateResult<KeyRange> {
    if name == "0" {
        return Ok(KeyRange::full());
    }
    KeyRange::parse_shard_name(name)
        .ok_or_else(|| GateError::Topology(format!("invalid shard name '{name}'")))
}

/// Topology held in memory.
#[derive(Debug, Default)]
pub struct MemoryTopology {
    keyspaces: RwLock<HashMap<String, Vec<ShardReference>>>,
}

impl MemoryTopology {
    /// Creates an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a shard; its key range comes from the shard name.
    ///
    /// Fails when the name is invalid or the range overlaps another shard.
    pub fn add_shard(&self, keyspace: &str, name: &str, endpoint: EndPoint) -> GateResult<()> {
        let key_range = shard_key_range(name)?;
        let mut keyspaces = self.keyspaces.write();
        let shards = keyspaces.entry(keyspace.to_string()).or_default();
        if let Some(other) = shards.iter().find(|s| overlaps(&s.key_range, &key_range)) {
            return Err(GateError::Topology(format!(
                "shard {keyspace}/{name} overlaps {keyspace}/{}",
                other.name
            )));
        }
        debug!(keyspace, shard = name, uid = endpoint.uid, "shard added");
        shards.push(ShardReference {
            name: name.to_string(),
            key_range,
            endpoint,
        });
        shards.sort_by(|a, b| a.key_range.start.cmp(&b.key_range.start));
        Ok(())
    }
}

fn overlaps(a: &KeyRange, b: &KeyRange) -> bool {
    let a_before_b = !a.end.is_empty() && a.end <= b.start;
    let b_before_a = !b.end.is_empty() && b.end <= a.start;
    !(a_before_b || b_before_a)
}

impl Topology for MemoryTopology {
    fn shards(&self, keyspace: &str) -> GateResult<Vec<ShardReference>> {
        match self.keyspaces.read().get(keyspace) {
            Some(shards) if !shards.is_empty() => Ok(shards.clone()),
            _ => Err(GateError::UnknownKeyspace(keyspace.to_string())),
        }
    }
}
