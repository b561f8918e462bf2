//! Keyspace ids and key ranges.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, byte-ordered shard placement key.
///
/// Keyspace ids compare lexicographically byte-for-byte. The empty id is
/// used as the "no mapping" sentinel by lookup-backed vindexes.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyspaceId(Vec<u8>);

impl KeyspaceId {
    /// The empty sentinel id.
    pub const NONE: KeyspaceId = KeyspaceId(Vec::new());

    /// Creates a keyspace id from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parses a keyspace id from a hex string.
    pub fn from_hex(hex: &str) -> Option<Self> {
        decode_hex(hex).map(Self)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the id and returns the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns the length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the empty sentinel id.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the id as lowercase hex.
    pub fn to_hex(&self) -> String {
        encode_hex(&self.0)
    }
}

impl From<Vec<u8>> for KeyspaceId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for KeyspaceId {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for KeyspaceId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for KeyspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A half-open interval `[start, end)` of keyspace ids.
///
/// An empty `start` means "from the beginning", an empty `end` means
/// "to the end". Shard names such as `-80`, `40-c0` or `c0-` map directly
/// onto key ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRange {
    /// Inclusive lower bound (empty = unbounded).
    pub start: Vec<u8>,
    /// Exclusive upper bound (empty = unbounded).
    pub end: Vec<u8>,
}

impl KeyRange {
    /// Creates a key range from raw bounds.
    pub fn new(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// The range covering every keyspace id.
    pub fn full() -> Self {
        Self::default()
    }

    /// Parses a shard name of the form `<start-hex>-<end-hex>`.
    ///
    /// Returns `None` when the name has no dash or a bound is not valid hex.
    pub fn parse_shard_name(name: &str) -> Option<Self> {
        let (start, end) = name.split_once('-')?;
        let range = Self::new(decode_hex(start)?, decode_hex(end)?);
        if !range.start.is_empty() && !range.end.is_empty() && range.start >= range.end {
            return None;
        }
        Some(range)
    }

    /// Returns true if the range contains the keyspace id.
    pub fn contains(&self, id: &KeyspaceId) -> bool {
        let bytes = id.as_bytes();
        (self.start.is_empty() || bytes >= self.start.as_slice())
            && (self.end.is_empty() || bytes < self.end.as_slice())
    }

    /// Returns true if the range covers every keyspace id.
    pub fn is_full(&self) -> bool {
        self.start.is_empty() && self.end.is_empty()
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", encode_hex(&self.start), encode_hex(&self.end))
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_bytewise() {
        let a = KeyspaceId::new(vec![0x10]);
        let b = KeyspaceId::new(vec![0x10, 0x00]);
        let c = KeyspaceId::new(vec![0x80]);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn hex_display() {
        let id = KeyspaceId::new(vec![0x00, 0xab, 0x10]);
        assert_eq!(id.to_string(), "00ab10");
        assert_eq!(KeyspaceId::from_hex("00ab10"), Some(id));
        assert_eq!(KeyspaceId::from_hex("0"), None);
        assert_eq!(KeyspaceId::from_hex("zz"), None);
    }

    #[test]
    fn shard_names() {
        let lower = KeyRange::parse_shard_name("-80").unwrap();
        let upper = KeyRange::parse_shard_name("80-").unwrap();
        let full = KeyRange::parse_shard_name("-").unwrap();

        let low_id = KeyspaceId::new(vec![0x7f, 0xff]);
        let high_id = KeyspaceId::new(vec![0x80]);

        assert!(lower.contains(&low_id));
        assert!(!lower.contains(&high_id));
        assert!(upper.contains(&high_id));
        assert!(!upper.contains(&low_id));
        assert!(full.is_full());
        assert!(full.contains(&KeyspaceId::NONE));
        assert_eq!(lower.to_string(), "-80");
    }

    proptest::proptest! {
        #[test]
        fn adjacent_shards_own_each_id_once(
            bound in 1u8..=255,
            id in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..4),
        ) {
            let lower = KeyRange::parse_shard_name(&format!("-{bound:02x}")).unwrap();
            let upper = KeyRange::parse_shard_name(&format!("{bound:02x}-")).unwrap();
            let id = KeyspaceId::new(id);
            proptest::prop_assert!(lower.contains(&id) != upper.contains(&id));
        }
    }

    #[test]
    fn invalid_shard_names() {
        assert!(KeyRange::parse_shard_name("80").is_none());
        assert!(KeyRange::parse_shard_name("c0-40").is_none());
        assert!(KeyRange::parse_shard_name("x-").is_none());
    }
}
