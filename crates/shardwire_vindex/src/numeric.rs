//! Numeric identity vindex.

use crate::error::{VindexError, VindexResult};
use crate::input::VindexInput;
use crate::registry::VindexSpec;
use crate::traits::{Reversible, Vindex};
use shardwire_types::KeyspaceId;
use std::sync::Arc;

/// Maps an integral value to its 8-byte big-endian encoding.
///
/// Big-endian keeps numeric order and keyspace id order aligned, so
/// contiguous id ranges land on contiguous shards.
#[derive(Debug, Clone)]
pub struct Numeric {
    name: String,
}

impl Numeric {
    /// Registered type name.
    pub const TYPE: &'static str = "numeric";

    /// Creates the vindex.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Registry constructor. Takes no parameters.
    pub fn construct(spec: &VindexSpec<'_>) -> VindexResult<Arc<dyn Vindex>> {
        Ok(Arc::new(Self::new(spec.name)))
    }

    fn key(&self, id: &VindexInput) -> VindexResult<KeyspaceId> {
        let n = id.as_u64().ok_or_else(|| {
            VindexError::unsupported_input(
                &self.name,
                format!("expected integral value, got {}", id.kind()),
            )
        })?;
        Ok(KeyspaceId::new(n.to_be_bytes().to_vec()))
    }
}

impl Vindex for Numeric {
    fn name(&self) -> &str {
        &self.name
    }

    fn cost(&self) -> u32 {
        0
    }

    fn map(&self, ids: &[VindexInput]) -> VindexResult<Vec<KeyspaceId>> {
        ids.iter().map(|id| self.key(id)).collect()
    }

    fn verify(&self, id: &VindexInput, ksid: &KeyspaceId) -> VindexResult<bool> {
        Ok(&self.key(id)? == ksid)
    }

    fn as_reversible(&self) -> Option<&dyn Reversible> {
        Some(self)
    }
}

impl Reversible for Numeric {
    fn reverse_map(&self, ksid: &KeyspaceId) -> VindexResult<VindexInput> {
        let bytes: [u8; 8] = ksid.as_bytes().try_into().map_err(|_| {
            VindexError::unsupported_input(
                &self.name,
                format!("keyspace id must be 8 bytes, got {}", ksid.len()),
            )
        })?;
        Ok(VindexInput::Uint(u64::from_be_bytes(bytes)))
    }
}
