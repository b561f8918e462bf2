//! Vindex capability traits.

use crate::error::VindexResult;
use crate::input::VindexInput;
use shardwire_types::KeyspaceId;
use std::fmt::Debug;

/// Core vindex capability.
///
/// Implementations are immutable after construction and are shared across
/// threads, so `map` and `verify` must not interfere with each other.
pub trait Vindex: Send + Sync + Debug {
    /// Returns the vindex name (unique within its keyspace).
    fn name(&self) -> &str;

    /// Returns the planning cost. Lower is preferred; constant per instance.
    fn cost(&self) -> u32;

    /// Maps each input to its keyspace id, in input order.
    ///
    /// A single unsupported input fails the whole call.
    fn map(&self, ids: &[VindexInput]) -> VindexResult<Vec<KeyspaceId>>;

    /// Returns true if `id` maps to exactly `ksid`.
    fn verify(&self, id: &VindexInput, ksid: &KeyspaceId) -> VindexResult<bool>;

    /// Returns the reverse-mapping capability, if the vindex has one.
    fn as_reversible(&self) -> Option<&dyn Reversible> {
        None
    }

    /// Returns the lookup-row maintenance capability, if the vindex has one.
    fn as_lookup(&self) -> Option<&dyn Lookup> {
        None
    }
}

/// A vindex whose mapping can be inverted.
pub trait Reversible: Vindex {
    /// Recovers the input value from a keyspace id.
    fn reverse_map(&self, ksid: &KeyspaceId) -> VindexResult<VindexInput>;
}

/// A vindex backed by lookup rows the caller maintains.
pub trait Lookup: Vindex {
    /// Records that `id` maps to `ksid`.
    fn create(&self, id: &VindexInput, ksid: &KeyspaceId) -> VindexResult<()>;

    /// Removes the rows for `ids` that map to `ksid`.
    fn delete(&self, ids: &[VindexInput], ksid: &KeyspaceId) -> VindexResult<()>;
}
