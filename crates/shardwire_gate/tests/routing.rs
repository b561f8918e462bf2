//! End-to-end routing across two loopback tablets.

use shardwire_gate::{Gate, GateError, MemoryTopology, Resolver};
use shardwire_tablet::{MemoryEngine, ServerConfig, TabletService};
use shardwire_tabletconn::{ConnConfig, Context, DialerRegistry, LoopbackDirectory};
use shardwire_types::{
    BoundKeyspaceIdQuery, BoundQuery, EndPoint, ErrorCode, Field, KeyspaceId,
    KeyspaceIdBatchQuery, QueryResult, Session, ShardSession, TabletType, Target, Type, Value,
};
use shardwire_vindex::{LookupStores, VSchema, VindexInput, VindexRegistry};
use std::sync::Arc;

struct Cluster {
    gate: Gate,
    low: Arc<MemoryEngine>,
    high: Arc<MemoryEngine>,
}

fn cluster(shards: &[&str]) -> Cluster {
    let directory = LoopbackDirectory::new();
    let topology = MemoryTopology::new();
    let mut engines = Vec::new();
    for (uid, shard) in shards.iter().enumerate() {
        let engine = Arc::new(MemoryEngine::new());
        let config = ServerConfig::new("user", *shard, TabletType::Master);
        let endpoint = EndPoint::new(uid as u32 + 1, format!("tablet-{shard}"), 15991);
        directory
            .register(&endpoint, Arc::new(TabletService::new(config, engine.clone())))
            .unwrap();
        topology.add_shard("user", shard, endpoint).unwrap();
        engines.push(engine);
    }

    let registry = VindexRegistry::builder().with_builtin().unwrap().build();
    let vschema = VSchema::from_json(
        r#"{ "keyspaces": { "user": { "sharded": true, "vindexes": { "user_id": { "type": "numeric" } } } } }"#,
        &registry,
        &LookupStores::new(),
    )
    .unwrap();

    let config = ConnConfig::new("loopback");
    let dialers = DialerRegistry::builder()
        .with_builtin(&config, directory)
        .unwrap()
        .build(&config)
        .unwrap();
    let gate = Gate::new(Resolver::new(Arc::new(topology), Arc::new(vschema)), dialers);
    let high = engines.last().cloned().unwrap();
    Cluster {
        gate,
        low: engines[0].clone(),
        high,
    }
}

fn ksid(user_id: u64, gate: &Gate) -> KeyspaceId {
    gate.resolver()
        .resolve_value("user", "user_id", &VindexInput::Uint(user_id))
        .unwrap()
        .0
}

fn query(sql: &str, ids: Vec<KeyspaceId>) -> BoundKeyspaceIdQuery {
    BoundKeyspaceIdQuery {
        query: BoundQuery::new(sql),
        keyspace: "user".into(),
        keyspace_ids: ids,
    }
}

const HIGH_USER: u64 = 0x9000_0000_0000_0001;

#[tokio::test]
async fn batch_is_split_by_owner_and_reassembled_in_order() {
    let c = cluster(&["-80", "80-"]);
    let row = |n: i64| {
        QueryResult::with_rows(vec![Field::new("id", Type::Int64)], vec![vec![Value::from_i64(n)]])
    };
    c.low.set_result("select * from user", row(1));
    c.high.set_result("select * from user", row(2));

    let low = ksid(1, &c.gate);
    let high = ksid(HIGH_USER, &c.gate);
    let batch = KeyspaceIdBatchQuery::new(
        vec![
            query("insert into user values (high)", vec![high.clone()]),
            query("select * from user", vec![low.clone(), high.clone()]),
            query("insert into user values (low)", vec![low]),
        ],
        TabletType::Master,
    );

    let results = c
        .gate
        .execute_batch_keyspace_ids(&Context::background(), batch)
        .await
        .unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].rows_affected, 1);
    let ids: Vec<i64> = results[1].rows.iter().map(|r| r[0].to_i64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(results[2].rows_affected, 1);

    assert_eq!(
        c.low.applied_sql(),
        vec!["select * from user", "insert into user values (low)"]
    );
    assert_eq!(
        c.high.applied_sql(),
        vec!["insert into user values (high)", "select * from user"]
    );
}

#[tokio::test]
async fn shard_failure_names_the_shard() {
    let c = cluster(&["-80", "80-"]);
    c.high
        .fail_on("insert dup", ErrorCode::IntegrityError, "duplicate key");
    let mut batch = KeyspaceIdBatchQuery::new(
        vec![
            query("insert ok", vec![ksid(HIGH_USER, &c.gate)]),
            query("insert dup", vec![ksid(HIGH_USER, &c.gate)]),
        ],
        TabletType::Master,
    );
    batch.as_transaction = true;

    let err = c
        .gate
        .execute_batch_keyspace_ids(&Context::background(), batch)
        .await
        .unwrap_err();
    assert_eq!(err.server_code(), Some(ErrorCode::IntegrityError));
    assert!(matches!(err, GateError::Tablet { ref shard, .. } if shard == "80-"));
    assert!(c.high.applied().is_empty());
}

#[tokio::test]
async fn uncovered_keyspace_id_has_no_shard() {
    let c = cluster(&["-80"]);
    let batch = KeyspaceIdBatchQuery::new(
        vec![query("select 1", vec![KeyspaceId::new(vec![0x90])])],
        TabletType::Master,
    );
    let err = c
        .gate
        .execute_batch_keyspace_ids(&Context::background(), batch)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::NoShard { .. }));
    assert!(c.low.applied().is_empty());
}

#[tokio::test]
async fn empty_keyspace_ids_are_rejected() {
    let c = cluster(&["-80", "80-"]);
    let batch = KeyspaceIdBatchQuery::new(vec![query("select 1", vec![])], TabletType::Master);
    let err = c
        .gate
        .execute_batch_keyspace_ids(&Context::background(), batch)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::InvalidRequest(_)));
}

#[tokio::test]
async fn session_transactions_are_not_forwarded() {
    let c = cluster(&["-80", "80-"]);
    let mut batch = KeyspaceIdBatchQuery::new(
        vec![query("insert into t values (1)", vec![ksid(1, &c.gate)])],
        TabletType::Master,
    );
    batch.session = Some(Session {
        in_transaction: true,
        shard_sessions: vec![ShardSession {
            target: Target::new("user", "-80", TabletType::Master),
            transaction_id: 7,
        }],
    });
    let err = c
        .gate
        .execute_batch_keyspace_ids(&Context::background(), batch)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::InvalidRequest(_)));
    assert!(c.low.applied().is_empty());
}
