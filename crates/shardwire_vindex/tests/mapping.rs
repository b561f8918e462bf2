//! Cross-variant mapping tests through the public registry surface.

use proptest::prelude::*;
use shardwire_types::{KeyRange, KeyspaceId, Value};
use shardwire_vindex::{
    LookupStores, MemoryLookupStore, VSchema, Vindex, VindexError, VindexInput, VindexParams,
    VindexRegistry,
};
use std::sync::Arc;
use std::thread;

fn registry() -> VindexRegistry {
    VindexRegistry::builder().with_builtin().unwrap().build()
}

fn stores() -> (Arc<MemoryLookupStore>, LookupStores) {
    let store = Arc::new(MemoryLookupStore::new());
    let stores = LookupStores::new().with_store("default", store.clone());
    (store, stores)
}

fn create(type_name: &str) -> Arc<dyn Vindex> {
    registry()
        .create(type_name, type_name, &VindexParams::new(), &LookupStores::new())
        .unwrap()
}

#[test]
fn md5_places_rows_on_expected_shards() {
    let v = create("binary_md5");
    let ids = v
        .map(&[VindexInput::Bytes(b"test1".to_vec())])
        .unwrap();
    assert_eq!(ids[0].to_hex(), "5a105e8b9d40e1329780d62ea2265d8a");

    let upper = KeyRange::parse_shard_name("40-").unwrap();
    let lower = KeyRange::parse_shard_name("-40").unwrap();
    assert!(upper.contains(&ids[0]));
    assert!(!lower.contains(&ids[0]));
}

#[test]
fn map_preserves_input_order_and_length() {
    let v = create("numeric");
    let inputs: Vec<VindexInput> = (0..50u64).rev().map(VindexInput::Uint).collect();
    let ids = v.map(&inputs).unwrap();
    assert_eq!(ids.len(), inputs.len());
    for (input, ksid) in inputs.iter().zip(&ids) {
        assert!(v.verify(input, ksid).unwrap());
    }
}

#[test]
fn one_bad_input_fails_whole_batch() {
    let v = create("numeric");
    let err = v
        .map(&[VindexInput::Uint(1), VindexInput::Bytes(vec![1]), VindexInput::Uint(2)])
        .unwrap_err();
    assert!(matches!(err, VindexError::UnsupportedInput { .. }));
}

#[test]
fn capabilities_by_variant() {
    assert!(create("binary_md5").as_reversible().is_none());
    assert!(create("binary").as_reversible().is_some());
    assert!(create("numeric").as_reversible().is_some());
    assert!(create("numeric").as_lookup().is_none());

    let (_, stores) = stores();
    let lookup = registry()
        .create(
            "lookup_unique",
            "email_idx",
            &VindexParams::new().with("table", "email_keyspace_idx"),
            &stores,
        )
        .unwrap();
    assert!(lookup.as_lookup().is_some());
    assert!(lookup.as_reversible().is_none());
}

#[test]
fn lookup_roundtrip_through_schema() {
    let (store, stores) = stores();
    let vschema = VSchema::from_json(
        r#"{
            "keyspaces": {
                "user": {
                    "sharded": true,
                    "vindexes": {
                        "user_id": { "type": "numeric" },
                        "email_idx": { "type": "lookup_unique", "params": { "table": "email_keyspace_idx" } }
                    }
                }
            }
        }"#,
        &registry(),
        &stores,
    )
    .unwrap();

    let user_id = vschema.vindex("user", "user_id").unwrap();
    let email_idx = vschema.vindex("user", "email_idx").unwrap();

    let ksid = user_id.map(&[VindexInput::Uint(42)]).unwrap().remove(0);
    let email = VindexInput::Value(Value::from_text("a@example.com"));
    email_idx.as_lookup().unwrap().create(&email, &ksid).unwrap();

    assert_eq!(email_idx.map(std::slice::from_ref(&email)).unwrap(), vec![ksid.clone()]);
    assert!(email_idx.verify(&email, &ksid).unwrap());

    store.set_available(false);
    assert!(email_idx.verify(&email, &ksid).unwrap_err().is_retryable());
    store.set_available(true);

    let cheapest = vschema
        .keyspace("user")
        .unwrap()
        .cheapest(&["email_idx", "user_id"])
        .unwrap();
    assert_eq!(cheapest.name(), "user_id");
}

#[test]
fn shared_instances_map_concurrently() {
    let v = create("binary_md5");
    let handles: Vec<_> = (0..8u8)
        .map(|t| {
            let v = Arc::clone(&v);
            thread::spawn(move || {
                for i in 0..200u8 {
                    let input = VindexInput::Bytes(vec![t, i]);
                    let ksid = v.map(std::slice::from_ref(&input)).unwrap().remove(0);
                    assert!(v.verify(&input, &ksid).unwrap());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

proptest! {
    #[test]
    fn map_then_verify_holds(bytes in proptest::collection::vec(any::<u8>(), 0..64), n in any::<u64>()) {
        for type_name in ["binary_md5", "binary"] {
            let v = create(type_name);
            let input = VindexInput::Bytes(bytes.clone());
            let ksid = v.map(std::slice::from_ref(&input)).unwrap().remove(0);
            prop_assert!(v.verify(&input, &ksid).unwrap());
        }
        let v = create("numeric");
        let input = VindexInput::Value(Value::from_u64(n));
        let ksid = v.map(std::slice::from_ref(&input)).unwrap().remove(0);
        prop_assert!(v.verify(&input, &ksid).unwrap());
        prop_assert_ne!(ksid, KeyspaceId::NONE);
    }
}
