//! The tablet connection contract.

use crate::context::Context;
use crate::error::TabletResult;
use async_trait::async_trait;
use shardwire_types::{
    BoundQuery, EndPoint, QueryResult, QuerySplit, SplitAlgorithm, StreamHealthResponse,
    TabletType, Target, TransactionId,
};

/// Outcome of a combined begin and execute.
///
/// The begin and the execute can fail independently: when the begin worked
/// and the execute did not, `transaction_id` is nonzero and `result` holds
/// the execute error. The caller then owns the transaction and must end it.
#[derive(Debug, Clone, PartialEq)]
pub struct BeginExecuteOutcome<T> {
    /// Result of the execute part.
    pub result: TabletResult<T>,
    /// Transaction opened by the begin part.
    pub transaction_id: TransactionId,
}

/// Pull-based cursor over a streamed query result.
#[async_trait]
pub trait ResultStream: Send {
    /// Waits for the next chunk.
    ///
    /// Returns `Ok(None)` at the end of the stream. An error ends the stream
    /// and every later call returns it again; chunks received before it stay
    /// valid.
    async fn recv(&mut self) -> TabletResult<Option<QueryResult>>;
}

/// Pull-based cursor over health snapshots.
#[async_trait]
pub trait StreamHealthReader: Send {
    /// Waits for the next snapshot. Returns `Ok(None)` when the tablet ends
    /// the stream. An error ends the stream and is returned again by every
    /// later call.
    async fn recv(&mut self) -> TabletResult<Option<StreamHealthResponse>>;
}

/// An RPC handle bound to one tablet target.
///
/// Methods take `&mut self`: a connection serves one caller at a time, and
/// callers fanning out in parallel hold one connection each.
///
/// Every call takes a [`Context`] and fails with `Cancelled` or
/// `DeadlineExceeded` as soon as the context ends. After [`close`] every
/// call fails with `ConnClosed`, including reads from streams opened before
/// it.
///
/// A nonzero transaction id is only accepted by the connection that began
/// it; any other id is rejected with `Config` before anything is sent.
///
/// [`close`]: TabletConn::close
#[async_trait]
pub trait TabletConn: Send {
    /// Runs one query, inside `transaction_id` or autocommitted when it is 0.
    async fn execute(
        &mut self,
        ctx: &Context,
        query: BoundQuery,
        transaction_id: TransactionId,
    ) -> TabletResult<QueryResult>;

    /// Runs several queries in order.
    ///
    /// With `as_transaction` and `transaction_id == 0` the tablet wraps the
    /// batch in its own transaction: either every statement is committed or
    /// none is. `as_transaction` together with a nonzero `transaction_id` is
    /// rejected with `Config` before anything is sent.
    async fn execute_batch(
        &mut self,
        ctx: &Context,
        queries: Vec<BoundQuery>,
        as_transaction: bool,
        transaction_id: TransactionId,
    ) -> TabletResult<Vec<QueryResult>>;

    /// Starts a streaming query.
    ///
    /// Fails here only if the request cannot be sent; later failures
    /// surface from [`ResultStream::recv`].
    async fn stream_execute(
        &mut self,
        ctx: &Context,
        query: BoundQuery,
    ) -> TabletResult<Box<dyn ResultStream>>;

    /// Opens a transaction. Fails with `Config` while one is active.
    async fn begin(&mut self, ctx: &Context) -> TabletResult<TransactionId>;

    /// Commits a transaction begun on this connection. The id is dead
    /// afterwards whatever the outcome.
    async fn commit(&mut self, ctx: &Context, transaction_id: TransactionId) -> TabletResult<()>;

    /// Rolls back a transaction begun on this connection. The id is dead
    /// afterwards whatever the outcome.
    async fn rollback(&mut self, ctx: &Context, transaction_id: TransactionId)
        -> TabletResult<()>;

    /// Opens a transaction and runs one query in it.
    async fn begin_execute(
        &mut self,
        ctx: &Context,
        query: BoundQuery,
    ) -> TabletResult<BeginExecuteOutcome<QueryResult>>;

    /// Opens a transaction and runs several queries in it.
    ///
    /// `as_transaction` cannot be combined with the transaction this call
    /// opens and is rejected with `Config`.
    async fn begin_execute_batch(
        &mut self,
        ctx: &Context,
        queries: Vec<BoundQuery>,
        as_transaction: bool,
    ) -> TabletResult<BeginExecuteOutcome<Vec<QueryResult>>>;

    /// Splits a query on one column into `split_count` parts.
    #[deprecated(note = "use split_query_v2")]
    async fn split_query(
        &mut self,
        ctx: &Context,
        query: BoundQuery,
        split_column: &str,
        split_count: i64,
    ) -> TabletResult<Vec<QuerySplit>> {
        self.split_query_v2(
            ctx,
            query,
            vec![split_column.to_string()],
            split_count,
            0,
            SplitAlgorithm::EqualSplits,
        )
        .await
    }

    /// Splits a query into parts covering its whole key range.
    ///
    /// Exactly one of `split_count` and `num_rows_per_query_part` must be
    /// positive. An empty `split_columns` splits on the table's primary key.
    async fn split_query_v2(
        &mut self,
        ctx: &Context,
        query: BoundQuery,
        split_columns: Vec<String>,
        split_count: i64,
        num_rows_per_query_part: i64,
        algorithm: SplitAlgorithm,
    ) -> TabletResult<Vec<QuerySplit>>;

    /// Opens a health stream, independent of query traffic.
    async fn stream_health(&mut self, ctx: &Context) -> TabletResult<Box<dyn StreamHealthReader>>;

    /// Rebinds the connection to another target without redialing.
    fn set_target(&mut self, keyspace: &str, shard: &str, tablet_type: TabletType)
        -> TabletResult<()>;

    /// Returns the current target.
    fn target(&self) -> &Target;

    /// Returns the endpoint the connection was dialed to.
    fn end_point(&self) -> &EndPoint;

    /// Rolls back the transaction still open on this connection, if any,
    /// then releases the underlying channel. Calling it again is a no-op.
    async fn close(&mut self);
}
