//! MD5 hash over binary column content.

use crate::error::{VindexError, VindexResult};
use crate::input::VindexInput;
use crate::registry::VindexSpec;
use crate::traits::Vindex;
use md5::{Digest, Md5};
use shardwire_types::KeyspaceId;
use std::sync::Arc;

/// Hashes raw bytes to a 16-byte keyspace id.
///
/// MD5 is used for its distribution, not for collision resistance against
/// an adversary. Only byte-shaped inputs are accepted.
#[derive(Debug, Clone)]
pub struct BinaryMd5 {
    name: String,
}

impl BinaryMd5 {
    /// Registered type name.
    pub const TYPE: &'static str = "binary_md5";

    /// Creates the vindex.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Registry constructor. Takes no parameters.
    pub fn construct(spec: &VindexSpec<'_>) -> VindexResult<Arc<dyn Vindex>> {
        Ok(Arc::new(Self::new(spec.name)))
    }

    fn hash(&self, id: &VindexInput) -> VindexResult<KeyspaceId> {
        let source = id.raw_bytes().ok_or_else(|| {
            VindexError::unsupported_input(
                &self.name,
                format!("unexpected data type for binary hash: {}", id.kind()),
            )
        })?;
        Ok(KeyspaceId::new(Md5::digest(source).to_vec()))
    }
}

impl Vindex for BinaryMd5 {
    fn name(&self) -> &str {
        &self.name
    }

    fn cost(&self) -> u32 {
        1
    }

    fn map(&self, ids: &[VindexInput]) -> VindexResult<Vec<KeyspaceId>> {
        ids.iter().map(|id| self.hash(id)).collect()
    }

    fn verify(&self, id: &VindexInput, ksid: &KeyspaceId) -> VindexResult<bool> {
        Ok(&self.hash(id)? == ksid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shardwire_types::Value;

    fn vindex() -> BinaryMd5 {
        BinaryMd5::new("binary_md5")
    }

    #[test]
    fn cost_is_one() {
        assert_eq!(vindex().cost(), 1);
        assert_eq!(vindex().name(), "binary_md5");
    }

    #[test]
    fn known_digest() {
        // md5("test1")
        let ids = vindex()
            .map(&[VindexInput::Bytes(b"test1".to_vec())])
            .unwrap();
        assert_eq!(ids[0].to_hex(), "5a105e8b9d40e1329780d62ea2265d8a");
    }

    #[test]
    fn value_and_bytes_agree() {
        let v = vindex();
        let ids = v
            .map(&[
                VindexInput::Value(Value::from_text("test1")),
                VindexInput::Bytes(b"test1".to_vec()),
            ])
            .unwrap();
        assert_eq!(ids[0], ids[1]);
    }

    #[test]
    fn rejects_non_binary_input() {
        let v = vindex();
        let err = v
            .map(&[VindexInput::Bytes(b"ok".to_vec()), VindexInput::Int(1)])
            .unwrap_err();
        assert!(matches!(err, VindexError::UnsupportedInput { .. }));

        let err = v
            .verify(&VindexInput::Text("a".into()), &KeyspaceId::NONE)
            .unwrap_err();
        assert!(matches!(err, VindexError::UnsupportedInput { .. }));
    }

    #[test]
    fn verify_rejects_wrong_id() {
        let v = vindex();
        let id = VindexInput::Bytes(b"test1".to_vec());
        assert!(!v.verify(&id, &KeyspaceId::new(vec![0u8; 16])).unwrap());
    }

    proptest! {
        #[test]
        fn map_then_verify(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let v = vindex();
            let id = VindexInput::Bytes(bytes);
            let ksid = v.map(std::slice::from_ref(&id)).unwrap().remove(0);
            prop_assert_eq!(ksid.len(), 16);
            prop_assert!(v.verify(&id, &ksid).unwrap());
            prop_assert_eq!(v.map(std::slice::from_ref(&id)).unwrap().remove(0), ksid);
        }

        #[test]
        fn distinct_inputs_distinct_ids(
            a in proptest::collection::vec(any::<u8>(), 0..32),
            b in proptest::collection::vec(any::<u8>(), 0..32),
        ) {
            prop_assume!(a != b);
            let v = vindex();
            let ids = v.map(&[VindexInput::Bytes(a), VindexInput::Bytes(b)]).unwrap();
            prop_assert_ne!(&ids[0], &ids[1]);
        }
    }
}
