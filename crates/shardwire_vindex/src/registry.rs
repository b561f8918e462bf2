//! Init-time registry of vindex constructors.

use crate::binary::Binary;
use crate::binary_md5::BinaryMd5;
use crate::error::{VindexError, VindexResult};
use crate::lookup::{LookupStores, LookupUnique};
use crate::numeric::Numeric;
use crate::params::VindexParams;
use crate::traits::Vindex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Everything a constructor gets to build one vindex instance.
#[derive(Debug, Clone, Copy)]
pub struct VindexSpec<'a> {
    /// Vindex name from the schema.
    pub name: &'a str,
    /// Declared parameters.
    pub params: &'a VindexParams,
    /// Lookup stores the vindex may capture.
    pub stores: &'a LookupStores,
}

/// A function building a vindex from its spec.
pub type VindexConstructor = fn(&VindexSpec<'_>) -> VindexResult<Arc<dyn Vindex>>;

/// Collects constructors during process initialization.
///
/// Registering a type name twice is an error; the registry has no removal.
#[derive(Default)]
pub struct VindexRegistryBuilder {
    constructors: HashMap<String, VindexConstructor>,
}

impl fmt::Debug for VindexRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}

impl VindexRegistryBuilder {
    /// Registers a constructor under a type name.
    pub fn register(
        mut self,
        type_name: impl Into<String>,
        constructor: VindexConstructor,
    ) -> VindexResult<Self> {
        let type_name = type_name.into();
        if self.constructors.contains_key(&type_name) {
            return Err(VindexError::DuplicateType(type_name));
        }
        debug!(vindex_type = %type_name, "registered vindex type");
        self.constructors.insert(type_name, constructor);
        Ok(self)
    }

    /// Registers every built-in vindex type.
    pub fn with_builtin(self) -> VindexResult<Self> {
        self.register(BinaryMd5::TYPE, BinaryMd5::construct)?
            .register(Binary::TYPE, Binary::construct)?
            .register(Numeric::TYPE, Numeric::construct)?
            .register(LookupUnique::TYPE, LookupUnique::construct)
    }

    /// Freezes the registry.
    pub fn build(self) -> VindexRegistry {
        VindexRegistry {
            constructors: Arc::new(self.constructors),
        }
    }
}

/// Read-only catalog of vindex constructors.
///
/// Cheap to clone; clones share the same frozen table.
#[derive(Clone)]
pub struct VindexRegistry {
    constructors: Arc<HashMap<String, VindexConstructor>>,
}

impl fmt::Debug for VindexRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VindexRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

impl VindexRegistry {
    /// Starts building a registry.
    pub fn builder() -> VindexRegistryBuilder {
        VindexRegistryBuilder::default()
    }

    /// Returns the constructor registered under `type_name`.
    pub fn get(&self, type_name: &str) -> VindexResult<VindexConstructor> {
        self.constructors
            .get(type_name)
            .copied()
            .ok_or_else(|| VindexError::UnknownType(type_name.to_string()))
    }

    /// Instantiates a vindex of the given type.
    pub fn create(
        &self,
        type_name: &str,
        name: &str,
        params: &VindexParams,
        stores: &LookupStores,
    ) -> VindexResult<Arc<dyn Vindex>> {
        let constructor = self.get(type_name)?;
        constructor(&VindexSpec {
            name,
            params,
            stores,
        })
    }

    /// Returns the registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
