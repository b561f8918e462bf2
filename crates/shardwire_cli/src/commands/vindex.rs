//! `map` and `verify` command implementations.

use super::Format;
use crate::error::{CliError, CliResult};
use clap::ValueEnum;
use serde::Serialize;
use shardwire_types::KeyspaceId;
use shardwire_vindex::{
    LookupStores, MemoryLookupStore, VSchema, Vindex, VindexInput, VindexRegistry, DEFAULT_STORE,
};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// How command-line values are handed to a vindex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum InputKind {
    /// Unsigned integer.
    #[default]
    Uint,
    /// Signed integer.
    Int,
    /// Text string.
    Text,
    /// Hex-encoded bytes.
    Hex,
}

impl InputKind {
    /// Parses `raw` as this kind.
    pub fn parse(self, raw: &str) -> CliResult<VindexInput> {
        let bad = || CliError::usage(format!("'{raw}' is not a valid {self:?} value"));
        Ok(match self {
            InputKind::Uint => VindexInput::Uint(raw.parse().map_err(|_| bad())?),
            InputKind::Int => VindexInput::Int(raw.parse().map_err(|_| bad())?),
            InputKind::Text => VindexInput::Text(raw.to_string()),
            InputKind::Hex => VindexInput::Bytes(KeyspaceId::from_hex(raw).ok_or_else(bad)?.into_bytes()),
        })
    }
}

/// One mapped value.
#[derive(Debug, Serialize)]
pub struct MapRow {
    /// Value as given on the command line.
    pub value: String,
    /// Keyspace id in hex; empty when the vindex has no mapping.
    pub keyspace_id: String,
}

/// Loads a vschema with the builtin vindex types.
///
/// Lookup vindexes get an empty in-memory default store.
pub fn load_vschema(path: &Path) -> CliResult<VSchema> {
    let json = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let registry = VindexRegistry::builder().with_builtin()?.build();
    let stores = LookupStores::new().with_store(DEFAULT_STORE, Arc::new(MemoryLookupStore::new()));
    let vschema = VSchema::from_json(&json, &registry, &stores)?;
    debug!(path = %path.display(), keyspaces = vschema.keyspace_names().len(), "vschema loaded");
    Ok(vschema)
}

fn vindex(path: &Path, keyspace: &str, name: &str) -> CliResult<Arc<dyn Vindex>> {
    Ok(load_vschema(path)?.vindex(keyspace, name)?)
}

/// Maps every value through a vindex.
pub fn map_values(
    path: &Path,
    keyspace: &str,
    name: &str,
    kind: InputKind,
    values: &[String],
) -> CliResult<Vec<MapRow>> {
    let vindex = vindex(path, keyspace, name)?;
    let inputs = values
        .iter()
        .map(|raw| kind.parse(raw))
        .collect::<CliResult<Vec<_>>>()?;
    let ksids = vindex.map(&inputs)?;
    Ok(values
        .iter()
        .zip(ksids)
        .map(|(value, ksid)| MapRow {
            value: value.clone(),
            keyspace_id: ksid.to_hex(),
        })
        .collect())
}

/// Runs the map command.
pub fn run_map(
    path: &Path,
    keyspace: &str,
    name: &str,
    kind: InputKind,
    values: &[String],
    format: Format,
) -> CliResult<()> {
    for row in map_values(path, keyspace, name, kind, values)? {
        match format {
            Format::Text if row.keyspace_id.is_empty() => println!("{}\t(none)", row.value),
            Format::Text => println!("{}\t{}", row.value, row.keyspace_id),
            Format::Json => println!("{}", serde_json::to_string(&row)?),
        }
    }
    Ok(())
}

/// Checks that `value` maps to the hex keyspace id.
pub fn verify_value(
    path: &Path,
    keyspace: &str,
    name: &str,
    kind: InputKind,
    value: &str,
    ksid: &str,
) -> CliResult<bool> {
    let ksid = KeyspaceId::from_hex(ksid)
        .ok_or_else(|| CliError::usage(format!("'{ksid}' is not a hex keyspace id")))?;
    let vindex = vindex(path, keyspace, name)?;
    Ok(vindex.verify(&kind.parse(value)?, &ksid)?)
}

/// Runs the verify command.
pub fn run_verify(
    path: &Path,
    keyspace: &str,
    name: &str,
    kind: InputKind,
    value: &str,
    ksid: &str,
) -> CliResult<()> {
    println!("{}", verify_value(path, keyspace, name, kind, value, ksid)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn vschema_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"{
                "keyspaces": {
                    "user": {
                        "sharded": true,
                        "vindexes": {
                            "user_id": { "type": "numeric" },
                            "name": { "type": "binary_md5" },
                            "email": { "type": "lookup_unique", "params": { "table": "email_idx" } }
                        }
                    }
                }
            }"#,
        )
        .unwrap();
        file
    }

    #[test]
    fn input_kinds() {
        assert_eq!(InputKind::Uint.parse("7").unwrap(), VindexInput::Uint(7));
        assert_eq!(InputKind::Int.parse("-7").unwrap(), VindexInput::Int(-7));
        assert_eq!(InputKind::Hex.parse("0aff").unwrap(), VindexInput::Bytes(vec![0x0a, 0xff]));
        assert!(InputKind::Uint.parse("-7").is_err());
        assert!(InputKind::Hex.parse("abc").is_err());
    }

    #[test]
    fn map_prints_hex_keyspace_ids() {
        let file = vschema_file();
        let rows = map_values(
            file.path(),
            "user",
            "user_id",
            InputKind::Uint,
            &["1".into(), "256".into()],
        )
        .unwrap();
        assert_eq!(rows[0].keyspace_id, "0000000000000001");
        assert_eq!(rows[1].keyspace_id, "0000000000000100");

        let rows = map_values(file.path(), "user", "email", InputKind::Text, &["a@b.c".into()]).unwrap();
        assert!(rows[0].keyspace_id.is_empty());
    }

    #[test]
    fn verify_checks_the_mapping() {
        let file = vschema_file();
        let ok = verify_value(file.path(), "user", "user_id", InputKind::Uint, "1", "0000000000000001");
        assert!(ok.unwrap());
        let ok = verify_value(file.path(), "user", "user_id", InputKind::Uint, "2", "0000000000000001");
        assert!(!ok.unwrap());
        assert!(matches!(
            verify_value(file.path(), "user", "user_id", InputKind::Uint, "1", "xyz"),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn schema_failures_are_errors() {
        let file = vschema_file();
        assert!(matches!(
            map_values(file.path(), "user", "nope", InputKind::Uint, &[]),
            Err(CliError::Vindex(_))
        ));
        assert!(matches!(
            map_values(Path::new("/nonexistent/vschema.json"), "user", "user_id", InputKind::Uint, &[]),
            Err(CliError::Io { .. })
        ));
    }
}
