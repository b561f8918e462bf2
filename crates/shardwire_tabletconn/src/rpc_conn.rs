//! Protocol-independent [`TabletConn`] over an [`RpcChannel`].

use crate::channel::{FrameReceiver, RpcChannel};
use crate::config::ConnConfig;
use crate::conn::{BeginExecuteOutcome, ResultStream, StreamHealthReader, TabletConn};
use crate::context::Context;
use crate::error::{TabletError, TabletResult};
use async_trait::async_trait;
use bytes::Bytes;
use shardwire_types::wire::{self, Call, Reply, Request};
use shardwire_types::{
    BoundQuery, EndPoint, QueryResult, QuerySplit, SplitAlgorithm, StreamHealthResponse,
    TabletType, Target, TransactionId,
};
use tracing::{debug, trace, warn};

/// A tablet connection speaking the CBOR frame protocol over any channel.
///
/// Every wire protocol drives this same type, so protocol choice never
/// changes call semantics.
pub struct RpcTabletConn<C: RpcChannel> {
    channel: Option<C>,
    endpoint: EndPoint,
    target: Target,
    config: ConnConfig,
    active_tx: Option<TransactionId>,
    lifetime: Context,
}

impl<C: RpcChannel> RpcTabletConn<C> {
    /// Wraps an established channel.
    pub fn new(channel: C, endpoint: EndPoint, target: Target, config: ConnConfig) -> Self {
        Self {
            channel: Some(channel),
            endpoint,
            target,
            config,
            active_tx: None,
            lifetime: Context::background(),
        }
    }

    /// Returns true once [`TabletConn::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.channel.is_none()
    }

    /// Returns the transaction begun on this connection, if still active.
    pub fn active_transaction(&self) -> Option<TransactionId> {
        self.active_tx
    }

    fn ensure_open(&self) -> TabletResult<()> {
        if self.channel.is_none() {
            return Err(TabletError::ConnClosed);
        }
        Ok(())
    }

    fn ensure_no_transaction(&self) -> TabletResult<()> {
        match self.active_tx {
            Some(active) => Err(TabletError::config(format!(
                "transaction {active} is still active on this connection"
            ))),
            None => Ok(()),
        }
    }

    /// Accepts 0 or the transaction begun on this connection.
    fn ensure_owned(&self, transaction_id: TransactionId) -> TabletResult<()> {
        if transaction_id != 0 && self.active_tx != Some(transaction_id) {
            return Err(TabletError::config(format!(
                "transaction {transaction_id} is not active on this connection"
            )));
        }
        Ok(())
    }

    /// Validates and retires a transaction id before commit or rollback.
    fn end_transaction(&mut self, transaction_id: TransactionId) -> TabletResult<()> {
        if transaction_id == 0 {
            return Err(TabletError::config("no transaction to end"));
        }
        self.ensure_owned(transaction_id)?;
        self.active_tx = None;
        Ok(())
    }

    fn encode(&self, ctx: &Context, call: Call) -> TabletResult<Bytes> {
        let request = Request {
            target: self.target.clone(),
            caller_id: ctx.caller_id().cloned(),
            call,
        };
        Ok(Bytes::from(wire::encode_request(&request)?))
    }

    async fn unary(&mut self, ctx: &Context, call: Call) -> TabletResult<Reply> {
        let method = call.method();
        let request = self.encode(ctx, call)?;
        let ctx = ctx.with_timeout(self.config.call_timeout);
        let channel = self.channel.as_mut().ok_or(TabletError::ConnClosed)?;
        let bytes = ctx.run(channel.call(request)).await?;
        let reply = wire::decode_frame(&bytes)??;
        trace!(method, target = %self.target, "call complete");
        Ok(reply)
    }

    async fn open(&mut self, ctx: &Context, call: Call) -> TabletResult<FrameStream> {
        let method = call.method();
        let request = self.encode(ctx, call)?;
        let open_ctx = ctx.with_timeout(self.config.call_timeout);
        let channel = self.channel.as_mut().ok_or(TabletError::ConnClosed)?;
        let frames = open_ctx.run(channel.open_stream(request)).await?;
        debug!(method, target = %self.target, "stream opened");
        Ok(FrameStream {
            ctx: ctx.clone(),
            closed: self.lifetime.clone(),
            frames: Some(frames),
            method,
            failure: None,
        })
    }
}

fn reply_kind(reply: &Reply) -> &'static str {
    match reply {
        Reply::Result(_) => "Result",
        Reply::Results(_) => "Results",
        Reply::TransactionId(_) => "TransactionId",
        Reply::Done => "Done",
        Reply::BeginExecute { .. } => "BeginExecute",
        Reply::BeginExecuteBatch { .. } => "BeginExecuteBatch",
        Reply::Splits(_) => "Splits",
        Reply::StreamChunk(_) => "StreamChunk",
        Reply::Health(_) => "Health",
        Reply::StreamEnd => "StreamEnd",
    }
}

fn unexpected(method: &str, reply: &Reply) -> TabletError {
    TabletError::Protocol(format!(
        "unexpected {} reply to {method}",
        reply_kind(reply)
    ))
}

#[async_trait]
impl<C: RpcChannel> TabletConn for RpcTabletConn<C> {
    async fn execute(
        &mut self,
        ctx: &Context,
        query: BoundQuery,
        transaction_id: TransactionId,
    ) -> TabletResult<QueryResult> {
        self.ensure_open()?;
        self.ensure_owned(transaction_id)?;
        match self
            .unary(ctx, Call::Execute {
                query,
                transaction_id,
            })
            .await?
        {
            Reply::Result(result) => Ok(result),
            other => Err(unexpected("Execute", &other)),
        }
    }

    async fn execute_batch(
        &mut self,
        ctx: &Context,
        queries: Vec<BoundQuery>,
        as_transaction: bool,
        transaction_id: TransactionId,
    ) -> TabletResult<Vec<QueryResult>> {
        self.ensure_open()?;
        if as_transaction && transaction_id != 0 {
            return Err(TabletError::config(format!(
                "as_transaction cannot be combined with open transaction {transaction_id}"
            )));
        }
        self.ensure_owned(transaction_id)?;
        match self
            .unary(ctx, Call::ExecuteBatch {
                queries,
                as_transaction,
                transaction_id,
            })
            .await?
        {
            Reply::Results(results) => Ok(results),
            other => Err(unexpected("ExecuteBatch", &other)),
        }
    }

    async fn stream_execute(
        &mut self,
        ctx: &Context,
        query: BoundQuery,
    ) -> TabletResult<Box<dyn ResultStream>> {
        self.ensure_open()?;
        let stream = self.open(ctx, Call::StreamExecute { query }).await?;
        Ok(Box::new(RpcResultStream(stream)))
    }

    async fn begin(&mut self, ctx: &Context) -> TabletResult<TransactionId> {
        self.ensure_open()?;
        self.ensure_no_transaction()?;
        match self.unary(ctx, Call::Begin).await? {
            Reply::TransactionId(id) if id != 0 => {
                self.active_tx = Some(id);
                debug!(transaction_id = id, target = %self.target, "transaction begun");
                Ok(id)
            }
            other => Err(unexpected("Begin", &other)),
        }
    }

    async fn commit(&mut self, ctx: &Context, transaction_id: TransactionId) -> TabletResult<()> {
        self.ensure_open()?;
        self.end_transaction(transaction_id)?;
        match self.unary(ctx, Call::Commit { transaction_id }).await? {
            Reply::Done => {
                debug!(transaction_id, target = %self.target, "transaction committed");
                Ok(())
            }
            other => Err(unexpected("Commit", &other)),
        }
    }

    async fn rollback(
        &mut self,
        ctx: &Context,
        transaction_id: TransactionId,
    ) -> TabletResult<()> {
        self.ensure_open()?;
        self.end_transaction(transaction_id)?;
        match self.unary(ctx, Call::Rollback { transaction_id }).await? {
            Reply::Done => {
                debug!(transaction_id, target = %self.target, "transaction rolled back");
                Ok(())
            }
            other => Err(unexpected("Rollback", &other)),
        }
    }

    async fn begin_execute(
        &mut self,
        ctx: &Context,
        query: BoundQuery,
    ) -> TabletResult<BeginExecuteOutcome<QueryResult>> {
        self.ensure_open()?;
        self.ensure_no_transaction()?;
        match self.unary(ctx, Call::BeginExecute { query }).await? {
            Reply::BeginExecute {
                transaction_id,
                result,
            } if transaction_id != 0 => {
                self.active_tx = Some(transaction_id);
                debug!(transaction_id, ok = result.is_ok(), "transaction begun with execute");
                Ok(BeginExecuteOutcome {
                    result: result.map_err(TabletError::Server),
                    transaction_id,
                })
            }
            other => Err(unexpected("BeginExecute", &other)),
        }
    }

    async fn begin_execute_batch(
        &mut self,
        ctx: &Context,
        queries: Vec<BoundQuery>,
        as_transaction: bool,
    ) -> TabletResult<BeginExecuteOutcome<Vec<QueryResult>>> {
        self.ensure_open()?;
        if as_transaction {
            return Err(TabletError::config(
                "as_transaction cannot be combined with the transaction begun by this call",
            ));
        }
        self.ensure_no_transaction()?;
        match self
            .unary(ctx, Call::BeginExecuteBatch {
                queries,
                as_transaction,
            })
            .await?
        {
            Reply::BeginExecuteBatch {
                transaction_id,
                result,
            } if transaction_id != 0 => {
                self.active_tx = Some(transaction_id);
                debug!(transaction_id, ok = result.is_ok(), "transaction begun with batch");
                Ok(BeginExecuteOutcome {
                    result: result.map_err(TabletError::Server),
                    transaction_id,
                })
            }
            other => Err(unexpected("BeginExecuteBatch", &other)),
        }
    }

    async fn split_query_v2(
        &mut self,
        ctx: &Context,
        query: BoundQuery,
        split_columns: Vec<String>,
        split_count: i64,
        num_rows_per_query_part: i64,
        algorithm: SplitAlgorithm,
    ) -> TabletResult<Vec<QuerySplit>> {
        self.ensure_open()?;
        if (split_count > 0) == (num_rows_per_query_part > 0) {
            return Err(TabletError::config(format!(
                "exactly one of split_count ({split_count}) and \
                 num_rows_per_query_part ({num_rows_per_query_part}) must be positive"
            )));
        }
        match self
            .unary(ctx, Call::SplitQuery {
                query,
                split_columns,
                split_count,
                num_rows_per_query_part,
                algorithm,
            })
            .await?
        {
            Reply::Splits(splits) => Ok(splits),
            other => Err(unexpected("SplitQuery", &other)),
        }
    }

    async fn stream_health(&mut self, ctx: &Context) -> TabletResult<Box<dyn StreamHealthReader>> {
        self.ensure_open()?;
        let stream = self.open(ctx, Call::StreamHealth).await?;
        Ok(Box::new(RpcHealthReader(stream)))
    }

    fn set_target(
        &mut self,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
    ) -> TabletResult<()> {
        self.ensure_open()?;
        self.target = Target::new(keyspace, shard, tablet_type);
        debug!(target = %self.target, "connection retargeted");
        Ok(())
    }

    fn target(&self) -> &Target {
        &self.target
    }

    fn end_point(&self) -> &EndPoint {
        &self.endpoint
    }

    async fn close(&mut self) {
        if self.channel.is_none() {
            return;
        }
        if let Some(transaction_id) = self.active_tx {
            if let Err(e) = self.rollback(&Context::background(), transaction_id).await {
                warn!(transaction_id, error = %e, "rollback on close failed");
            }
        }
        self.lifetime.cancel();
        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
            debug!(uid = self.endpoint.uid, host = %self.endpoint.host, "connection closed");
        }
    }
}

/// Frames of one streaming call, bound to the context that opened it and
/// to the lifetime of its connection.
struct FrameStream {
    ctx: Context,
    closed: Context,
    frames: Option<Box<dyn FrameReceiver>>,
    method: &'static str,
    failure: Option<TabletError>,
}

impl FrameStream {
    async fn next_reply(&mut self) -> TabletResult<Option<Reply>> {
        if self.closed.is_cancelled() {
            self.frames = None;
            return Err(TabletError::ConnClosed);
        }
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        match self.pull().await {
            Ok(Some(reply)) => Ok(Some(reply)),
            Ok(None) => {
                self.frames = None;
                Ok(None)
            }
            Err(e) => Err(self.end_with(e)),
        }
    }

    async fn pull(&mut self) -> TabletResult<Option<Reply>> {
        let Some(frames) = self.frames.as_mut() else {
            return Ok(None);
        };
        let received = tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(TabletError::ConnClosed),
            received = self.ctx.run(frames.recv()) => received,
        };
        let bytes = received?.ok_or_else(|| {
            TabletError::transport_retryable(format!(
                "{} stream closed before its end marker",
                self.method
            ))
        })?;
        match wire::decode_frame(&bytes)?? {
            Reply::StreamEnd => {
                debug!(method = self.method, "stream ended");
                Ok(None)
            }
            reply => Ok(Some(reply)),
        }
    }

    /// Ends the stream; `err` is returned again by every later call.
    fn end_with(&mut self, err: TabletError) -> TabletError {
        self.frames = None;
        self.failure = Some(err.clone());
        err
    }

    fn fail(&mut self, reply: &Reply) -> TabletError {
        let err = unexpected(self.method, reply);
        self.end_with(err)
    }
}

struct RpcResultStream(FrameStream);

#[async_trait]
impl ResultStream for RpcResultStream {
    async fn recv(&mut self) -> TabletResult<Option<QueryResult>> {
        match self.0.next_reply().await? {
            Some(Reply::StreamChunk(chunk)) => Ok(Some(chunk)),
            Some(other) => Err(self.0.fail(&other)),
            None => Ok(None),
        }
    }
}

struct RpcHealthReader(FrameStream);

#[async_trait]
impl StreamHealthReader for RpcHealthReader {
    async fn recv(&mut self) -> TabletResult<Option<StreamHealthResponse>> {
        match self.0.next_reply().await? {
            Some(Reply::Health(health)) => Ok(Some(health)),
            Some(other) => Err(self.0.fail(&other)),
            None => Ok(None),
        }
    }
}
