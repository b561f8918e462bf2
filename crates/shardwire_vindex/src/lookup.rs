//! Lookup-table backed vindexes.
//!
//! A lookup vindex does not compute keyspace ids; it reads them from a
//! backing store keyed by the column value. Two outcomes must never be
//! confused:
//!
//! - the value has no row: `map` yields the empty [`KeyspaceId::NONE`]
//!   sentinel and `verify` returns `false`
//! - the store cannot be reached: the call fails with
//!   [`VindexError::StoreUnavailable`], which callers may retry

use crate::error::{StoreError, VindexError, VindexResult};
use crate::input::VindexInput;
use crate::registry::VindexSpec;
use crate::traits::{Lookup, Vindex};
use parking_lot::RwLock;
use shardwire_types::KeyspaceId;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Name of the store used when a vindex does not set the `store` parameter.
pub const DEFAULT_STORE: &str = "default";

/// Key-value backing store for lookup vindexes.
pub trait LookupStore: Send + Sync + Debug {
    /// Reads the keyspace id stored for `key`, or `None` if absent.
    fn get(&self, table: &str, key: &[u8]) -> Result<Option<KeyspaceId>, StoreError>;

    /// Stores `key -> ksid`. Idempotent for an identical row.
    fn insert(&self, table: &str, key: &[u8], ksid: &KeyspaceId) -> Result<(), StoreError>;

    /// Removes the row `key -> ksid` if present.
    fn delete(&self, table: &str, key: &[u8], ksid: &KeyspaceId) -> Result<(), StoreError>;
}

/// Named lookup stores available to vindex constructors.
#[derive(Debug, Clone, Default)]
pub struct LookupStores {
    stores: HashMap<String, Arc<dyn LookupStore>>,
}

impl LookupStores {
    /// Creates an empty set of stores.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named store.
    pub fn with_store(mut self, name: impl Into<String>, store: Arc<dyn LookupStore>) -> Self {
        self.stores.insert(name.into(), store);
        self
    }

    /// Returns a named store.
    pub fn get(&self, name: &str) -> Option<Arc<dyn LookupStore>> {
        self.stores.get(name).cloned()
    }
}

/// In-memory lookup store.
///
/// `set_available(false)` makes every call fail with
/// [`StoreError::Unavailable`], which models an unreachable backend.
#[derive(Debug)]
pub struct MemoryLookupStore {
    rows: RwLock<HashMap<(String, Vec<u8>), KeyspaceId>>,
    available: AtomicBool,
}

impl MemoryLookupStore {
    /// Creates an empty, available store.
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Marks the store reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns the number of rows across all tables.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store marked unavailable".into()))
        }
    }
}

impl Default for MemoryLookupStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupStore for MemoryLookupStore {
    fn get(&self, table: &str, key: &[u8]) -> Result<Option<KeyspaceId>, StoreError> {
        self.check_available()?;
        Ok(self
            .rows
            .read()
            .get(&(table.to_string(), key.to_vec()))
            .cloned())
    }

    fn insert(&self, table: &str, key: &[u8], ksid: &KeyspaceId) -> Result<(), StoreError> {
        self.check_available()?;
        let mut rows = self.rows.write();
        let row_key = (table.to_string(), key.to_vec());
        match rows.get(&row_key) {
            Some(existing) if existing != ksid => Err(StoreError::Conflict(format!(
                "{table}: key already maps to {existing}"
            ))),
            Some(_) => Ok(()),
            None => {
                rows.insert(row_key, ksid.clone());
                Ok(())
            }
        }
    }

    fn delete(&self, table: &str, key: &[u8], ksid: &KeyspaceId) -> Result<(), StoreError> {
        self.check_available()?;
        let mut rows = self.rows.write();
        let row_key = (table.to_string(), key.to_vec());
        if rows.get(&row_key) == Some(ksid) {
            rows.remove(&row_key);
        }
        Ok(())
    }
}

/// A unique lookup vindex: each value maps to at most one keyspace id.
///
/// Parameters:
/// - `table` (required): lookup table name inside the store
/// - `store` (optional): name of the store in [`LookupStores`], defaults
///   to `"default"`
#[derive(Debug)]
pub struct LookupUnique {
    name: String,
    table: String,
    store: Arc<dyn LookupStore>,
}

impl LookupUnique {
    /// Registered type name.
    pub const TYPE: &'static str = "lookup_unique";

    /// Creates the vindex over an explicit store.
    pub fn new(name: impl Into<String>, table: impl Into<String>, store: Arc<dyn LookupStore>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            store,
        }
    }

    /// Registry constructor.
    pub fn construct(spec: &VindexSpec<'_>) -> VindexResult<Arc<dyn Vindex>> {
        let table = spec.params.require_str(spec.name, "table")?;
        let store_name = match spec.params.get("store") {
            None => DEFAULT_STORE,
            Some(_) => spec.params.require_str(spec.name, "store")?,
        };
        let store = spec.stores.get(store_name).ok_or_else(|| {
            VindexError::invalid_param(spec.name, "store", format!("no lookup store named '{store_name}'"))
        })?;
        Ok(Arc::new(Self::new(spec.name, table, store)))
    }

    fn key(&self, id: &VindexInput) -> VindexResult<Vec<u8>> {
        match id {
            VindexInput::Value(v) if v.is_null() => Err(VindexError::unsupported_input(
                &self.name,
                "NULL cannot be looked up",
            )),
            other => Ok(other.lookup_key()),
        }
    }

    fn fetch(&self, id: &VindexInput) -> VindexResult<Option<KeyspaceId>> {
        let key = self.key(id)?;
        self.store
            .get(&self.table, &key)
            .map_err(|e| VindexError::from_store(&self.name, e))
    }
}

impl Vindex for LookupUnique {
    fn name(&self) -> &str {
        &self.name
    }

    fn cost(&self) -> u32 {
        10
    }

    fn map(&self, ids: &[VindexInput]) -> VindexResult<Vec<KeyspaceId>> {
        ids.iter()
            .map(|id| Ok(self.fetch(id)?.unwrap_or(KeyspaceId::NONE)))
            .collect()
    }

    fn verify(&self, id: &VindexInput, ksid: &KeyspaceId) -> VindexResult<bool> {
        Ok(self.fetch(id)?.as_ref() == Some(ksid))
    }

    fn as_lookup(&self) -> Option<&dyn Lookup> {
        Some(self)
    }
}

impl Lookup for LookupUnique {
    fn create(&self, id: &VindexInput, ksid: &KeyspaceId) -> VindexResult<()> {
        if ksid.is_empty() {
            return Err(VindexError::unsupported_input(
                &self.name,
                "cannot create a lookup row for the empty keyspace id",
            ));
        }
        let key = self.key(id)?;
        self.store
            .insert(&self.table, &key, ksid)
            .map_err(|e| VindexError::from_store(&self.name, e))?;
        debug!(vindex = %self.name, table = %self.table, %ksid, "created lookup row");
        Ok(())
    }

    fn delete(&self, ids: &[VindexInput], ksid: &KeyspaceId) -> VindexResult<()> {
        for id in ids {
            let key = self.key(id)?;
            self.store
                .delete(&self.table, &key, ksid)
                .map_err(|e| VindexError::from_store(&self.name, e))?;
        }
        debug!(vindex = %self.name, table = %self.table, count = ids.len(), "deleted lookup rows");
        Ok(())
    }
}
