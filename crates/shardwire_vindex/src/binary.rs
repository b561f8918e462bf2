//! Identity vindex over binary content.

use crate::error::{VindexError, VindexResult};
use crate::input::VindexInput;
use crate::registry::VindexSpec;
use crate::traits::{Reversible, Vindex};
use shardwire_types::KeyspaceId;
use std::sync::Arc;

/// Uses the raw bytes of the column as the keyspace id.
#[derive(Debug, Clone)]
pub struct Binary {
    name: String,
}

impl Binary {
    /// Registered type name.
    pub const TYPE: &'static str = "binary";

    /// Creates the vindex.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Registry constructor. Takes no parameters.
    pub fn construct(spec: &VindexSpec<'_>) -> VindexResult<Arc<dyn Vindex>> {
        Ok(Arc::new(Self::new(spec.name)))
    }

    fn key(&self, id: &VindexInput) -> VindexResult<KeyspaceId> {
        id.raw_bytes().map(KeyspaceId::from).ok_or_else(|| {
            VindexError::unsupported_input(&self.name, format!("expected bytes, got {}", id.kind()))
        })
    }
}

impl Vindex for Binary {
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

impl Reversible for Binary {
    fn reverse_map(&self, ksid: &KeyspaceId) -> VindexResult<VindexInput> {
        Ok(VindexInput::Bytes(ksid.as_bytes().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_mapping() {
        let v = Binary::new("b");
        let ids = v.map(&[VindexInput::Bytes(vec![1, 2, 3])]).unwrap();
        assert_eq!(ids[0].as_bytes(), &[1, 2, 3]);
        assert_eq!(v.cost(), 0);
        assert!(v.verify(&VindexInput::Bytes(vec![1, 2, 3]), &ids[0]).unwrap());
    }

    #[test]
    fn reverse_returns_bytes() {
        let v = Binary::new("b");
        let rev = v.as_reversible().unwrap();
        let back = rev.reverse_map(&KeyspaceId::new(vec![9, 9])).unwrap();
        assert_eq!(back, VindexInput::Bytes(vec![9, 9]));
    }

    #[test]
    fn integers_are_rejected() {
        let v = Binary::new("b");
        assert!(v.map(&[VindexInput::Uint(1)]).is_err());
    }
}
