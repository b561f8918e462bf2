//! Request dispatch.

use crate::config::ServerConfig;
use crate::engine::QueryEngine;
use crate::error::{ServerResult, TabletServerError};
use crate::health::HealthBroadcaster;
use crate::tx::TxPool;
use async_trait::async_trait;
use bytes::Bytes;
use shardwire_tabletconn::{plan_splits, FrameService, SessionId};
use shardwire_types::wire::{self, Call, Frame, Reply, Request};
use shardwire_types::{
    BoundQuery, ErrorCode, QueryResult, RpcError, StreamHealthResponse, Target, TransactionId,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

const STREAM_BUFFER: usize = 8;

/// Encodes a frame, degrading to an internal error frame on failure.
fn encode(frame: &Frame) -> Bytes {
    match wire::encode_frame(frame) {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            error!(error = %e, "reply encoding failed");
            let fallback: Frame = Err(RpcError::new(ErrorCode::InternalError, e.to_string()));
            wire::encode_frame(&fallback).map(Bytes::from).unwrap_or_default()
        }
    }
}

/// How a request is answered.
#[derive(Debug)]
pub enum Response {
    /// Exactly one encoded frame.
    Unary(Bytes),
    /// Encoded frames ending with the stream end marker or an error frame.
    Stream(mpsc::Receiver<Bytes>),
}

enum StreamSource {
    Chunks(Vec<QueryResult>),
    Health(watch::Receiver<StreamHealthResponse>),
}

/// A tablet: target, engine, transaction pool and health, behind the frame
/// protocol.
pub struct TabletService {
    config: ServerConfig,
    target: Target,
    engine: Arc<dyn QueryEngine>,
    pool: TxPool,
    health: HealthBroadcaster,
    last_session: AtomicU64,
}

impl TabletService {
    /// Creates a service over `engine`.
    pub fn new(config: ServerConfig, engine: Arc<dyn QueryEngine>) -> Self {
        let target = config.target();
        let health = HealthBroadcaster::new(StreamHealthResponse {
            target: target.clone(),
            tablet_externally_reparented_timestamp: 0,
            realtime_stats: Some(engine.health()),
        });
        Self {
            pool: TxPool::new(config.max_transactions),
            config,
            target,
            engine,
            health,
            last_session: AtomicU64::new(0),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the served target.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Returns the engine.
    pub fn engine(&self) -> &Arc<dyn QueryEngine> {
        &self.engine
    }

    /// Returns the number of open transactions.
    pub fn open_transactions(&self) -> usize {
        self.pool.len()
    }

    /// Returns the health broadcaster.
    pub fn health(&self) -> &HealthBroadcaster {
        &self.health
    }

    /// Publishes a snapshot with the engine's current statistics.
    pub fn publish_health(&self) {
        let mut snapshot = self.health.current();
        snapshot.realtime_stats = Some(self.engine.health());
        self.health.publish(snapshot);
    }

    /// Records an external reparent and publishes it.
    pub fn set_externally_reparented(&self, timestamp: i64) {
        let mut snapshot = self.health.current();
        snapshot.tablet_externally_reparented_timestamp = timestamp;
        self.health.publish(snapshot);
    }

    /// Answers one encoded request of `session`.
    pub fn respond(&self, session: SessionId, request: &[u8]) -> Response {
        match wire::decode_request(request) {
            Ok(request) if request.call.is_streaming() => Response::Stream(self.start_stream(request)),
            Ok(request) => Response::Unary(encode(&self.handle(session, request))),
            Err(e) => Response::Unary(encode(&Err(TabletServerError::from(e).into()))),
        }
    }

    /// Answers a unary request of `session`.
    pub fn handle(&self, session: SessionId, request: Request) -> Frame {
        let method = request.call.method();
        let frame = self.dispatch(session, request).map_err(RpcError::from);
        match &frame {
            Ok(_) => debug!(method, "request served"),
            Err(e) => debug!(method, error = %e, "request failed"),
        }
        frame
    }

    fn check_target(&self, requested: &Target) -> ServerResult<()> {
        if requested.keyspace != self.target.keyspace || requested.shard != self.target.shard {
            return Err(TabletServerError::QueryNotServed {
                requested: requested.clone(),
                serving: self.target.clone(),
            });
        }
        Ok(())
    }

    fn dispatch(&self, session: SessionId, request: Request) -> ServerResult<Reply> {
        self.check_target(&request.target)?;
        match request.call {
            Call::Execute {
                query,
                transaction_id,
            } => self.execute(session, &query, transaction_id).map(Reply::Result),
            Call::ExecuteBatch {
                queries,
                as_transaction,
                transaction_id,
            } => self
                .execute_batch(session, &queries, as_transaction, transaction_id)
                .map(Reply::Results),
            Call::Begin => self.pool.begin(session).map(Reply::TransactionId),
            Call::Commit { transaction_id } => {
                self.pool.commit(transaction_id, session, self.engine.as_ref())?;
                Ok(Reply::Done)
            }
            Call::Rollback { transaction_id } => {
                self.pool.rollback(transaction_id, session)?;
                Ok(Reply::Done)
            }
            Call::BeginExecute { query } => {
                let transaction_id = self.pool.begin(session)?;
                let result = self
                    .execute(session, &query, transaction_id)
                    .map_err(RpcError::from);
                Ok(Reply::BeginExecute {
                    transaction_id,
                    result,
                })
            }
            Call::BeginExecuteBatch {
                queries,
                as_transaction,
            } => {
                if as_transaction {
                    return Err(TabletServerError::InvalidRequest(
                        "as_transaction cannot be combined with an explicit transaction".into(),
                    ));
                }
                let transaction_id = self.pool.begin(session)?;
                let result = self
                    .execute_batch(session, &queries, false, transaction_id)
                    .map_err(RpcError::from);
                Ok(Reply::BeginExecuteBatch {
                    transaction_id,
                    result,
                })
            }
            Call::SplitQuery {
                query,
                split_columns,
                split_count,
                num_rows_per_query_part,
                algorithm,
            } => {
                let splits = plan_splits(
                    &query,
                    &split_columns,
                    algorithm,
                    self.engine.key_stats(),
                    split_count,
                    num_rows_per_query_part,
                )?;
                Ok(Reply::Splits(splits))
            }
            call @ (Call::StreamExecute { .. } | Call::StreamHealth) => {
                Err(TabletServerError::InvalidRequest(format!(
                    "{} must be called as a stream",
                    call.method()
                )))
            }
        }
    }

    fn execute(
        &self,
        session: SessionId,
        query: &BoundQuery,
        transaction_id: TransactionId,
    ) -> ServerResult<QueryResult> {
        let result = if transaction_id == 0 {
            self.engine.execute(query)?
        } else {
            self.pool
                .execute(transaction_id, session, self.engine.as_ref(), query)?
        };
        if result.rows.len() > self.config.max_result_rows {
            return Err(TabletServerError::TooManyRows {
                rows: result.rows.len(),
                limit: self.config.max_result_rows,
            });
        }
        Ok(result)
    }

    fn execute_batch(
        &self,
        session: SessionId,
        queries: &[BoundQuery],
        as_transaction: bool,
        transaction_id: TransactionId,
    ) -> ServerResult<Vec<QueryResult>> {
        if !as_transaction {
            return queries
                .iter()
                .map(|query| self.execute(session, query, transaction_id))
                .collect();
        }
        if transaction_id != 0 {
            return Err(TabletServerError::InvalidRequest(
                "as_transaction cannot be combined with an open transaction".into(),
            ));
        }

        let id = self.pool.begin(session)?;
        let results: ServerResult<Vec<QueryResult>> = queries
            .iter()
            .map(|query| self.execute(session, query, id))
            .collect();
        match results {
            Ok(results) => {
                self.pool.commit(id, session, self.engine.as_ref())?;
                Ok(results)
            }
            Err(e) => {
                if let Err(rollback) = self.pool.rollback(id, session) {
                    warn!(transaction_id = id, error = %rollback, "batch rollback failed");
                }
                Err(e)
            }
        }
    }

    fn open_stream(&self, request: Request) -> ServerResult<StreamSource> {
        match request.call {
            Call::StreamHealth => Ok(StreamSource::Health(self.health.subscribe())),
            Call::StreamExecute { query } => {
                self.check_target(&request.target)?;
                let result = self.engine.evaluate(&query)?;
                Ok(StreamSource::Chunks(chunk_result(result, self.config.stream_chunk_size)))
            }
            call => Err(TabletServerError::InvalidRequest(format!(
                "{} cannot be streamed",
                call.method()
            ))),
        }
    }

    fn start_stream(&self, request: Request) -> mpsc::Receiver<Bytes> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let method = request.call.method();
        match self.open_stream(request) {
            Ok(StreamSource::Chunks(chunks)) => {
                tokio::spawn(send_chunks(tx, chunks));
            }
            Ok(StreamSource::Health(updates)) => {
                tokio::spawn(send_health(tx, updates));
            }
            Err(e) => {
                debug!(method, error = %e, "stream rejected");
                // Capacity is nonzero and the channel is fresh.
                let _ = tx.try_send(encode(&Err(e.into())));
            }
        }
        rx
    }
}

/// Splits rows into chunks; only the first chunk carries the fields.
fn chunk_result(result: QueryResult, size: usize) -> Vec<QueryResult> {
    if result.rows.is_empty() {
        return vec![result];
    }
    let mut fields = Some(result.fields);
    result
        .rows
        .chunks(size.max(1))
        .map(|rows| QueryResult {
            fields: fields.take().unwrap_or_default(),
            rows_affected: 0,
            insert_id: 0,
            rows: rows.to_vec(),
        })
        .collect()
}

async fn send_chunks(tx: mpsc::Sender<Bytes>, chunks: Vec<QueryResult>) {
    for chunk in chunks {
        if tx.send(encode(&Ok(Reply::StreamChunk(chunk)))).await.is_err() {
            debug!("stream receiver dropped");
            return;
        }
    }
    let _ = tx.send(encode(&Ok(Reply::StreamEnd))).await;
}

async fn send_health(tx: mpsc::Sender<Bytes>, mut updates: watch::Receiver<StreamHealthResponse>) {
    loop {
        tokio::select! {
            _ = tx.closed() => {
                debug!("health subscriber left");
                return;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        let snapshot = updates.borrow_and_update().clone();
        if tx.send(encode(&Ok(Reply::Health(snapshot)))).await.is_err() {
            return;
        }
    }
    let _ = tx.send(encode(&Ok(Reply::StreamEnd))).await;
}

#[async_trait]
impl FrameService for TabletService {
    fn open_session(&self) -> SessionId {
        let session = self.last_session.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(session, "session opened");
        session
    }

    fn close_session(&self, session: SessionId) {
        let released = self.pool.release(session);
        debug!(session, released, "session closed");
    }

    async fn unary(&self, session: SessionId, request: Bytes) -> Bytes {
        match wire::decode_request(&request) {
            Ok(request) => encode(&self.handle(session, request)),
            Err(e) => encode(&Err(TabletServerError::from(e).into())),
        }
    }

    async fn stream(&self, request: Bytes) -> mpsc::Receiver<Bytes> {
        match wire::decode_request(&request) {
            Ok(request) => self.start_stream(request),
            Err(e) => {
                let (tx, rx) = mpsc::channel(1);
                let _ = tx.try_send(encode(&Err(TabletServerError::from(e).into())));
                rx
            }
        }
    }
}
