//! # shardwire vindex
//!
//! Pluggable mapping from column values to keyspace ids.
//!
//! This crate provides:
//! - The [`Vindex`] capability trait and its optional [`Reversible`] and
//!   [`Lookup`] extensions
//! - An init-time [`VindexRegistry`] of named constructors
//! - Built-in variants: `binary_md5`, `binary`, `numeric`, `lookup_unique`
//! - Lookup backing stores ([`LookupStore`], [`MemoryLookupStore`])
//! - Declarative schema loading ([`VSchema`])
//!
//! ## Key Invariants
//!
//! - `map` is deterministic and returns one keyspace id per input, in order
//! - `verify(x, map([x])[0])` is always true for supported inputs
//! - `cost` is constant for the life of an instance
//! - The registry is append-only during init and read-only afterwards
//!
//! ## Usage
//!
//! ```
//! use shardwire_vindex::{LookupStores, VindexInput, VindexParams, VindexRegistry};
//!
//! let registry = VindexRegistry::builder().with_builtin().unwrap().build();
//! let vindex = registry
//!     .create("binary_md5", "user_hash", &VindexParams::new(), &LookupStores::new())
//!     .unwrap();
//!
//! let input = VindexInput::Bytes(b"user-42".to_vec());
//! let ids = vindex.map(&[input.clone()]).unwrap();
//! assert_eq!(ids[0].len(), 16);
//! assert!(vindex.verify(&input, &ids[0]).unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod binary;
mod binary_md5;
mod error;
mod input;
mod lookup;
mod numeric;
mod params;
mod registry;
mod traits;
mod vschema;

pub use binary::Binary;
pub use binary_md5::BinaryMd5;
pub use error::{StoreError, VindexError, VindexResult};
pub use input::VindexInput;
pub use lookup::{LookupStore, LookupStores, LookupUnique, MemoryLookupStore, DEFAULT_STORE};
pub use numeric::Numeric;
pub use params::VindexParams;
pub use registry::{VindexConstructor, VindexRegistry, VindexRegistryBuilder, VindexSpec};
pub use traits::{Lookup, Reversible, Vindex};
pub use vschema::{KeyspaceSchema, VSchema};
