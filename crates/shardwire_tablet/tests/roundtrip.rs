//! Client connections against a live tablet, over every built-in protocol.

use shardwire_tablet::{MemoryEngine, ServerConfig, TabletServer, TabletService};
use shardwire_tabletconn::{
    ConnConfig, Context, DialerRegistry, LoopbackDirectory, TabletConn, TabletError,
    END_BIND_PREFIX, START_BIND_PREFIX,
};
use shardwire_types::{
    BindValue, BoundQuery, EndPoint, ErrorCode, Field, QueryResult, QuerySplit, RealtimeStats,
    SplitAlgorithm, TabletType, Target, Type, Value,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const PROTOCOLS: [&str; 2] = ["loopback", "tcp"];

struct Harness {
    conn: Box<dyn TabletConn>,
    engine: Arc<MemoryEngine>,
    service: Arc<TabletService>,
    registry: DialerRegistry,
    endpoint: EndPoint,
    _shutdown: Option<oneshot::Sender<()>>,
}

impl Harness {
    async fn dial(&self) -> Box<dyn TabletConn> {
        self.registry
            .dial(&Context::background(), &self.endpoint, &target())
            .await
            .unwrap()
    }

    /// Waits for the tablet to notice departed clients.
    async fn wait_for_open_transactions(&self, expected: usize) {
        for _ in 0..200 {
            if self.service.open_transactions() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(self.service.open_transactions(), expected);
    }
}

fn target() -> Target {
    Target::new("user", "-80", TabletType::Master)
}

async fn harness(protocol: &str) -> Harness {
    let engine = Arc::new(MemoryEngine::new());
    engine.add_table("user", "id", (1..=200).collect());
    let config = ServerConfig::new("user", "-80", TabletType::Master).with_stream_chunk_size(3);
    let service = Arc::new(TabletService::new(config, engine.clone()));

    let directory = LoopbackDirectory::new();
    let (endpoint, shutdown) = if protocol == "loopback" {
        let endpoint = EndPoint::new(1, "tablet-1", 15991);
        directory.register(&endpoint, service.clone()).unwrap();
        (endpoint, None)
    } else {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = oneshot::channel::<()>();
        let server = TabletServer::new(service.clone());
        tokio::spawn(async move {
            server
                .serve(listener, async {
                    let _ = rx.await;
                })
                .await
        });
        (EndPoint::new(1, "127.0.0.1", port), Some(tx))
    };

    let conn_config = ConnConfig::new(protocol).with_call_timeout(Duration::from_secs(5));
    let registry = DialerRegistry::builder()
        .with_builtin(&conn_config, directory)
        .unwrap()
        .build(&conn_config)
        .unwrap();
    let conn = registry
        .dial(&Context::background(), &endpoint, &target())
        .await
        .unwrap();
    Harness {
        conn,
        engine,
        service,
        registry,
        endpoint,
        _shutdown: shutdown,
    }
}

fn server_code(err: &TabletError) -> Option<ErrorCode> {
    err.server_code()
}

#[tokio::test]
async fn transactions_commit_and_roll_back() {
    for protocol in PROTOCOLS {
        let mut h = harness(protocol).await;
        let ctx = Context::background();

        let tx = h.conn.begin(&ctx).await.unwrap();
        assert!(tx > 0);
        h.conn
            .execute(&ctx, BoundQuery::new("insert into user values (1)"), tx)
            .await
            .unwrap();
        assert!(h.engine.applied().is_empty(), "{protocol}");
        h.conn.commit(&ctx, tx).await.unwrap();
        assert_eq!(h.engine.applied_sql(), vec!["insert into user values (1)"]);

        let tx = h.conn.begin(&ctx).await.unwrap();
        h.conn
            .execute(&ctx, BoundQuery::new("insert into user values (2)"), tx)
            .await
            .unwrap();
        h.conn.rollback(&ctx, tx).await.unwrap();
        assert_eq!(h.engine.applied().len(), 1);
        assert_eq!(h.service.open_transactions(), 0);

        let err = h.conn
            .execute(&ctx, BoundQuery::new("select 1"), 999)
            .await
            .unwrap_err();
        assert!(matches!(err, TabletError::Config(_)), "{protocol}");
        h.conn.close().await;
    }
}

#[tokio::test]
async fn transactions_stay_with_their_connection() {
    for protocol in PROTOCOLS {
        let mut h = harness(protocol).await;
        let ctx = Context::background();
        let tx = h.conn.begin(&ctx).await.unwrap();

        let mut other = h.dial().await;
        let err = other
            .execute(&ctx, BoundQuery::new("insert into user values (1)"), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, TabletError::Config(_)), "{protocol}");
        assert!(matches!(other.commit(&ctx, tx).await, Err(TabletError::Config(_))));

        h.conn.commit(&ctx, tx).await.unwrap();
        assert!(h.engine.applied().is_empty());
        other.close().await;
        h.conn.close().await;
    }
}

#[tokio::test]
async fn abandoned_transactions_are_rolled_back() {
    for protocol in PROTOCOLS {
        let mut h = harness(protocol).await;
        let ctx = Context::background();

        let tx = h.conn.begin(&ctx).await.unwrap();
        h.conn
            .execute(&ctx, BoundQuery::new("insert into user values (1)"), tx)
            .await
            .unwrap();
        h.conn.close().await;
        assert_eq!(h.service.open_transactions(), 0, "{protocol}");

        let mut dropped = h.dial().await;
        dropped.begin(&ctx).await.unwrap();
        drop(dropped);
        h.wait_for_open_transactions(0).await;

        let limit = h.service.config().max_transactions;
        for _ in 0..limit + 5 {
            let mut conn = h.dial().await;
            conn.begin(&ctx).await.unwrap();
            conn.close().await;
        }
        h.wait_for_open_transactions(0).await;

        let mut fresh = h.dial().await;
        let tx = fresh.begin(&ctx).await.unwrap();
        fresh.rollback(&ctx, tx).await.unwrap();
        assert!(h.engine.applied().is_empty(), "{protocol}");
    }
}

#[tokio::test]
async fn batch_as_transaction_is_all_or_nothing() {
    for protocol in PROTOCOLS {
        let mut h = harness(protocol).await;
        let ctx = Context::background();
        h.engine
            .fail_on("insert into user values (2)", ErrorCode::IntegrityError, "duplicate key");

        let batch = vec![
            BoundQuery::new("insert into user values (1)"),
            BoundQuery::new("insert into user values (2)"),
        ];
        let err = h.conn.execute_batch(&ctx, batch, true, 0).await.unwrap_err();
        assert_eq!(server_code(&err), Some(ErrorCode::IntegrityError), "{protocol}");
        assert!(h.engine.applied().is_empty());
        assert_eq!(h.service.open_transactions(), 0);

        let results = h
            .conn
            .execute_batch(
                &ctx,
                vec![BoundQuery::new("insert into user values (3)"), BoundQuery::new("select 1")],
                true,
                0,
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(h.engine.applied().len(), 2);

        let err = h
            .conn
            .execute_batch(&ctx, vec![BoundQuery::new("select 1")], true, 7)
            .await
            .unwrap_err();
        assert!(matches!(err, TabletError::Config(_)));
    }
}

#[tokio::test]
async fn begin_execute_returns_handle_on_failure() {
    for protocol in PROTOCOLS {
        let mut h = harness(protocol).await;
        let ctx = Context::background();
        h.engine
            .fail_on("insert into user values (5)", ErrorCode::IntegrityError, "duplicate key");

        let outcome = h
            .conn
            .begin_execute(&ctx, BoundQuery::new("insert into user values (5)"))
            .await
            .unwrap();
        assert!(outcome.transaction_id > 0, "{protocol}");
        let err = outcome.result.unwrap_err();
        assert_eq!(server_code(&err), Some(ErrorCode::IntegrityError));
        assert_eq!(h.service.open_transactions(), 1);

        h.conn.rollback(&ctx, outcome.transaction_id).await.unwrap();
        assert_eq!(h.service.open_transactions(), 0);

        let outcome = h
            .conn
            .begin_execute_batch(&ctx, vec![BoundQuery::new("insert into user values (6)")], false)
            .await
            .unwrap();
        assert_eq!(outcome.result.unwrap().len(), 1);
        h.conn.commit(&ctx, outcome.transaction_id).await.unwrap();
        assert_eq!(h.engine.applied_sql(), vec!["insert into user values (6)"]);
    }
}

#[tokio::test]
async fn stream_execute_delivers_chunks_in_order() {
    for protocol in PROTOCOLS {
        let mut h = harness(protocol).await;
        let ctx = Context::background();
        h.engine.set_result(
            "select id from user",
            QueryResult::with_rows(
                vec![Field::new("id", Type::Int64)],
                (0..10).map(|i| vec![Value::from_i64(i)]).collect(),
            ),
        );

        let mut stream = h
            .conn
            .stream_execute(&ctx, BoundQuery::new("select id from user"))
            .await
            .unwrap();
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.recv().await.unwrap() {
            chunks.push(chunk);
        }
        assert_eq!(chunks.len(), 4, "{protocol}");
        assert_eq!(chunks[0].fields.len(), 1);
        let ids: Vec<i64> = chunks
            .iter()
            .flat_map(|c| c.rows.iter().map(|r| r[0].to_i64().unwrap()))
            .collect();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
        assert_eq!(stream.recv().await.unwrap(), None);
    }
}

#[tokio::test]
async fn stream_errors_surface_on_recv() {
    for protocol in PROTOCOLS {
        let mut h = harness(protocol).await;
        let ctx = Context::background();
        h.engine
            .fail_on("select broken", ErrorCode::InternalError, "disk on fire");
        let mut stream = h
            .conn
            .stream_execute(&ctx, BoundQuery::new("select broken"))
            .await
            .unwrap();
        let err = stream.recv().await.unwrap_err();
        assert_eq!(server_code(&err), Some(ErrorCode::InternalError), "{protocol}");
        assert_eq!(stream.recv().await.unwrap_err(), err);
    }
}

#[tokio::test]
async fn health_stream_follows_publications_until_cancelled() {
    for protocol in PROTOCOLS {
        let mut h = harness(protocol).await;
        let ctx = Context::background().child();

        let mut health = h.conn.stream_health(&ctx).await.unwrap();
        let first = health.recv().await.unwrap().unwrap();
        assert_eq!(first.target, target(), "{protocol}");

        h.engine.set_stats(RealtimeStats {
            qps: 42.0,
            ..Default::default()
        });
        h.service.publish_health();
        let next = health.recv().await.unwrap().unwrap();
        assert_eq!(next.realtime_stats.unwrap().qps, 42.0);

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let err = health.recv().await.unwrap_err();
        assert_eq!(err, TabletError::Cancelled);
    }
}

fn bound(split: &QuerySplit, prefix: &str) -> Option<i64> {
    match split.query.bind_vars.get(&format!("{prefix}id")) {
        Some(BindValue::Scalar(v)) => v.to_i64(),
        _ => None,
    }
}

#[tokio::test]
async fn split_query_covers_every_key_once() {
    for protocol in PROTOCOLS {
        let mut h = harness(protocol).await;
        let ctx = Context::background();

        for algorithm in [SplitAlgorithm::EqualSplits, SplitAlgorithm::FullScan] {
            let splits = h
                .conn
                .split_query_v2(
                    &ctx,
                    BoundQuery::new("select * from user where active = 1"),
                    vec![],
                    4,
                    0,
                    algorithm,
                )
                .await
                .unwrap();
            assert_eq!(splits.len(), 4, "{protocol} {algorithm:?}");
            for key in 1..=200i64 {
                let owners = splits
                    .iter()
                    .filter(|s| {
                        bound(s, START_BIND_PREFIX).map_or(true, |lo| key >= lo)
                            && bound(s, END_BIND_PREFIX).map_or(true, |hi| key < hi)
                    })
                    .count();
                assert_eq!(owners, 1, "key {key}");
            }
        }

        #[allow(deprecated)]
        let splits = h
            .conn
            .split_query(&ctx, BoundQuery::new("select * from user"), "id", 2)
            .await
            .unwrap();
        assert_eq!(splits.len(), 2);

        let err = h
            .conn
            .split_query_v2(
                &ctx,
                BoundQuery::new("select * from user order by id"),
                vec![],
                2,
                0,
                SplitAlgorithm::EqualSplits,
            )
            .await
            .unwrap_err();
        assert_eq!(server_code(&err), Some(ErrorCode::BadInput));
    }
}

#[tokio::test]
async fn set_target_routes_to_other_shard() {
    for protocol in PROTOCOLS {
        let mut h = harness(protocol).await;
        let ctx = Context::background();
        h.conn.set_target("user", "80-", TabletType::Master).unwrap();
        assert_eq!(h.conn.target().shard, "80-");

        let err = h
            .conn
            .execute(&ctx, BoundQuery::new("select 1"), 0)
            .await
            .unwrap_err();
        assert_eq!(server_code(&err), Some(ErrorCode::QueryNotServed), "{protocol}");
        assert!(err.is_retryable());
    }
}

#[tokio::test]
async fn closed_connection_rejects_calls() {
    for protocol in PROTOCOLS {
        let mut h = harness(protocol).await;
        let ctx = Context::background();
        h.conn.close().await;
        h.conn.close().await;

        let err = h
            .conn
            .execute(&ctx, BoundQuery::new("select 1"), 0)
            .await
            .unwrap_err();
        assert_eq!(err, TabletError::ConnClosed, "{protocol}");
        assert!(matches!(
            h.conn.stream_health(&ctx).await.err(),
            Some(TabletError::ConnClosed)
        ));
    }
}

#[tokio::test]
async fn close_ends_streams_opened_before_it() {
    for protocol in PROTOCOLS {
        let mut h = harness(protocol).await;
        let ctx = Context::background();
        h.engine.set_result(
            "select id from user",
            QueryResult::with_rows(
                vec![Field::new("id", Type::Int64)],
                (0..10).map(|i| vec![Value::from_i64(i)]).collect(),
            ),
        );
        let mut rows = h
            .conn
            .stream_execute(&ctx, BoundQuery::new("select id from user"))
            .await
            .unwrap();
        let mut health = h.conn.stream_health(&ctx).await.unwrap();
        assert!(health.recv().await.unwrap().is_some());

        h.conn.close().await;
        assert_eq!(rows.recv().await.unwrap_err(), TabletError::ConnClosed, "{protocol}");
        assert_eq!(health.recv().await.unwrap_err(), TabletError::ConnClosed, "{protocol}");
    }
}
