//! Keyspace id to shard resolution.

use crate::error::{GateError, GateResult};
use crate::topology::{ShardReference, Topology};
use shardwire_types::KeyspaceId;
use shardwire_vindex::{VSchema, VindexInput};
use std::sync::Arc;

/// Resolves keyspace ids and column values to owning shards.
#[derive(Debug, Clone)]
pub struct Resolver {
    topology: Arc<dyn Topology>,
    vschema: Arc<VSchema>,
}

impl Resolver {
    /// Creates a resolver.
    pub fn new(topology: Arc<dyn Topology>, vschema: Arc<VSchema>) -> Self {
        Self { topology, vschema }
    }

    /// Returns the topology.
    pub fn topology(&self) -> &Arc<dyn Topology> {
        &self.topology
    }

    /// Returns the vschema.
    pub fn vschema(&self) -> &VSchema {
        &self.vschema
    }

    /// Returns the shard whose key range contains `keyspace_id`.
    pub fn shard_for(&self, keyspace: &str, keyspace_id: &KeyspaceId) -> GateResult<ShardReference> {
        self.topology
            .shards(keyspace)?
            .into_iter()
            .find(|shard| shard.key_range.contains(keyspace_id))
            .ok_or_else(|| GateError::NoShard {
                keyspace: keyspace.to_string(),
                keyspace_id: keyspace_id.clone(),
            })
    }

    /// Maps `value` through the named vindex and returns its shard.
    ///
    /// A value the vindex has no mapping for fails with `NoShard`.
    pub fn resolve_value(
        &self,
        keyspace: &str,
        vindex: &str,
        value: &VindexInput,
    ) -> GateResult<(KeyspaceId, ShardReference)> {
        let vindex = self.vschema.vindex(keyspace, vindex)?;
        let keyspace_id = vindex
            .map(std::slice::from_ref(value))?
            .into_iter()
            .next()
            .unwrap_or_default();
        if keyspace_id.is_empty() {
            return Err(GateError::NoShard {
                keyspace: keyspace.to_string(),
                keyspace_id,
            });
        }
        let shard = self.shard_for(keyspace, &keyspace_id)?;
        Ok((keyspace_id, shard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::MemoryTopology;
    use shardwire_types::EndPoint;
    use shardwire_vindex::{LookupStores, MemoryLookupStore, VindexRegistry};

    fn resolver() -> Resolver {
        let topo = MemoryTopology::new();
        topo.add_shard("user", "-80", EndPoint::new(1, "a", 1)).unwrap();
        topo.add_shard("user", "80-", EndPoint::new(2, "b", 2)).unwrap();
        let registry = VindexRegistry::builder().with_builtin().unwrap().build();
        let stores = LookupStores::new().with_store("default", Arc::new(MemoryLookupStore::new()));
        let vschema = VSchema::from_json(
            r#"{
                "keyspaces": {
                    "user": {
                        "sharded": true,
                        "vindexes": {
                            "user_id": { "type": "numeric" },
                            "email": { "type": "lookup_unique", "params": { "table": "email_idx" } }
                        }
                    }
                }
            }"#,
            &registry,
            &stores,
        )
        .unwrap();
        Resolver::new(Arc::new(topo), Arc::new(vschema))
    }

    #[test]
    fn values_resolve_through_vindex() {
        let r = resolver();
        let (ksid, shard) = r.resolve_value("user", "user_id", &VindexInput::Uint(1)).unwrap();
        assert_eq!(ksid.to_hex(), "0000000000000001");
        assert_eq!(shard.name, "-80");

        let (_, shard) = r
            .resolve_value("user", "user_id", &VindexInput::Uint(0x9000_0000_0000_0000))
            .unwrap();
        assert_eq!(shard.name, "80-");
    }

    #[test]
    fn unmapped_lookup_value_has_no_shard() {
        let r = resolver();
        let err = r
            .resolve_value("user", "email", &VindexInput::Text("nobody@example.com".into()))
            .unwrap_err();
        assert!(matches!(err, GateError::NoShard { .. }));
    }

    #[test]
    fn unknown_vindex_and_keyspace() {
        let r = resolver();
        assert!(matches!(
            r.resolve_value("user", "nope", &VindexInput::Uint(1)),
            Err(GateError::Vindex(_))
        ));
        assert!(matches!(
            r.shard_for("orders", &KeyspaceId::new(vec![1])),
            Err(GateError::UnknownKeyspace(_))
        ));
    }
}
