//! Declarative vindex schema loading.
//!
//! A vschema document lists keyspaces and the vindexes each declares:
//!
//! ```json
//! {
//!   "keyspaces": {
//!     "user": {
//!       "sharded": true,
//!       "vindexes": {
//!         "user_md5": { "type": "binary_md5" },
//!         "name_lookup": { "type": "lookup_unique", "params": { "table": "name_idx" } }
//!       }
//!     }
//!   }
//! }
//! ```

use crate::error::{VindexError, VindexResult};
use crate::lookup::LookupStores;
use crate::params::VindexParams;
use crate::registry::VindexRegistry;
use crate::traits::Vindex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VSchemaDoc {
    #[serde(default)]
    keyspaces: BTreeMap<String, KeyspaceDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyspaceDoc {
    #[serde(default)]
    sharded: bool,
    #[serde(default)]
    vindexes: BTreeMap<String, VindexDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VindexDoc {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    params: VindexParams,
}

/// The vindexes of one keyspace.
#[derive(Debug, Clone)]
pub struct KeyspaceSchema {
    /// Whether the keyspace is split across shards.
    pub sharded: bool,
    vindexes: BTreeMap<String, Arc<dyn Vindex>>,
}

impl KeyspaceSchema {
    /// Returns a vindex by name.
    pub fn vindex(&self, name: &str) -> Option<Arc<dyn Vindex>> {
        self.vindexes.get(name).cloned()
    }

    /// Returns the lowest-cost vindex among `candidates`.
    ///
    /// Ties go to the earlier candidate; unknown names are skipped.
    pub fn cheapest(&self, candidates: &[&str]) -> Option<Arc<dyn Vindex>> {
        candidates
            .iter()
            .filter_map(|name| self.vindexes.get(*name))
            .fold(None::<&Arc<dyn Vindex>>, |best, v| match best {
                Some(b) if b.cost() <= v.cost() => Some(b),
                _ => Some(v),
            })
            .cloned()
    }

    /// Returns the vindex names, sorted.
    pub fn vindex_names(&self) -> Vec<&str> {
        self.vindexes.keys().map(String::as_str).collect()
    }
}

/// Instantiated vindexes for every keyspace.
#[derive(Debug, Clone, Default)]
pub struct VSchema {
    keyspaces: BTreeMap<String, KeyspaceSchema>,
}

impl VSchema {
    /// Parses a JSON vschema and instantiates every declared vindex.
    ///
    /// Any unknown type or bad parameter fails the whole load.
    pub fn from_json(json: &str, registry: &VindexRegistry, stores: &LookupStores) -> VindexResult<Self> {
        let doc: VSchemaDoc =
            serde_json::from_str(json).map_err(|e| VindexError::Schema(e.to_string()))?;

        let mut keyspaces = BTreeMap::new();
        for (ks_name, ks_doc) in doc.keyspaces {
            if !ks_doc.sharded && !ks_doc.vindexes.is_empty() {
                return Err(VindexError::Schema(format!(
                    "unsharded keyspace '{ks_name}' cannot declare vindexes"
                )));
            }
            let mut vindexes = BTreeMap::new();
            for (name, vdoc) in ks_doc.vindexes {
                let vindex = registry.create(&vdoc.type_name, &name, &vdoc.params, stores)?;
                vindexes.insert(name, vindex);
            }
            info!(keyspace = %ks_name, vindexes = vindexes.len(), "loaded keyspace vschema");
            keyspaces.insert(
                ks_name,
                KeyspaceSchema {
                    sharded: ks_doc.sharded,
                    vindexes,
                },
            );
        }
        Ok(Self { keyspaces })
    }

    /// Returns a keyspace.
    pub fn keyspace(&self, name: &str) -> VindexResult<&KeyspaceSchema> {
        self.keyspaces
            .get(name)
            .ok_or_else(|| VindexError::UnknownKeyspace(name.to_string()))
    }

    /// Returns a vindex of a keyspace.
    pub fn vindex(&self, keyspace: &str, name: &str) -> VindexResult<Arc<dyn Vindex>> {
        self.keyspace(keyspace)?
            .vindex(name)
            .ok_or_else(|| VindexError::UnknownVindex {
                keyspace: keyspace.to_string(),
                vindex: name.to_string(),
            })
    }

    /// Returns the keyspace names, sorted.
    pub fn keyspace_names(&self) -> Vec<&str> {
        self.keyspaces.keys().map(String::as_str).collect()
    }
}
