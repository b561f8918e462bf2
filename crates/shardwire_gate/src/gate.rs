//! Fan-out of keyspace-id addressed batches.

use crate::error::{GateError, GateResult};
use crate::resolver::Resolver;
use crate::topology::ShardReference;
use shardwire_tabletconn::{Context, DialerRegistry, TabletError};
use shardwire_types::{BoundQuery, KeyspaceIdBatchQuery, QueryResult, Target};
use tokio::task::JoinSet;
use tracing::debug;

/// The queries of one batch that land on one shard, in input order.
#[derive(Debug)]
struct ShardBatch {
    target: Target,
    shard: ShardReference,
    indexes: Vec<usize>,
    queries: Vec<BoundQuery>,
    as_transaction: bool,
}

impl ShardBatch {
    fn fail(&self, source: TabletError) -> GateError {
        GateError::tablet(self.target.keyspace.clone(), self.shard.name.clone(), source)
    }

    async fn run(self, ctx: Context, dialers: DialerRegistry) -> GateResult<(Vec<usize>, Vec<QueryResult>)> {
        let mut conn = dialers
            .dial(&ctx, &self.shard.endpoint, &self.target)
            .await
            .map_err(|e| self.fail(e))?;
        let outcome = conn
            .execute_batch(&ctx, self.queries.clone(), self.as_transaction, 0)
            .await;
        conn.close().await;
        let results = outcome.map_err(|e| self.fail(e))?;
        if results.len() != self.indexes.len() {
            return Err(self.fail(TabletError::Protocol(format!(
                "{} results for {} queries",
                results.len(),
                self.indexes.len()
            ))));
        }
        debug!(target = %self.target, queries = results.len(), "shard batch done");
        Ok((self.indexes, results))
    }
}

/// Folds one shard's result into the result of the same query from other
/// shards.
fn merge(into: &mut QueryResult, part: QueryResult) {
    if into.fields.is_empty() {
        into.fields = part.fields;
    }
    if into.insert_id == 0 {
        into.insert_id = part.insert_id;
    }
    into.rows_affected += part.rows_affected;
    into.rows.extend(part.rows);
}

/// Routes keyspace-id addressed batches to their shards.
#[derive(Debug, Clone)]
pub struct Gate {
    resolver: Resolver,
    dialers: DialerRegistry,
}

impl Gate {
    /// Creates a gate dialing through `dialers`.
    pub fn new(resolver: Resolver, dialers: DialerRegistry) -> Self {
        Self { resolver, dialers }
    }

    /// Returns the resolver.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    fn plan(&self, batch: &KeyspaceIdBatchQuery) -> GateResult<Vec<ShardBatch>> {
        // Transaction ids live on the connection that began them.
        let open = batch
            .session
            .iter()
            .flat_map(|session| &session.shard_sessions)
            .find(|shard| shard.transaction_id != 0);
        if let Some(open) = open {
            return Err(GateError::InvalidRequest(format!(
                "transaction {} on {} cannot be carried onto a new connection",
                open.transaction_id, open.target
            )));
        }
        let mut parts: Vec<ShardBatch> = Vec::new();
        for (index, item) in batch.queries.iter().enumerate() {
            if item.keyspace_ids.is_empty() {
                return Err(GateError::InvalidRequest(format!(
                    "query {index} names no keyspace ids"
                )));
            }
            let mut owners: Vec<ShardReference> = Vec::new();
            for keyspace_id in &item.keyspace_ids {
                let shard = self.resolver.shard_for(&item.keyspace, keyspace_id)?;
                if !owners.iter().any(|s| s.name == shard.name) {
                    owners.push(shard);
                }
            }
            for shard in owners {
                let target = Target::new(item.keyspace.clone(), shard.name.clone(), batch.tablet_type);
                match parts.iter_mut().find(|p| p.target == target) {
                    Some(part) => {
                        part.indexes.push(index);
                        part.queries.push(item.query.clone());
                    }
                    None => parts.push(ShardBatch {
                        target,
                        shard,
                        indexes: vec![index],
                        queries: vec![item.query.clone()],
                        as_transaction: batch.as_transaction,
                    }),
                }
            }
        }
        Ok(parts)
    }

    /// Runs a batch on the shards owning its keyspace ids.
    ///
    /// Each shard receives its queries as one `execute_batch` over its own
    /// connection, in parallel with the other shards. Results come back in
    /// input order; a query spanning several shards gets their results
    /// merged. The first shard failure fails the call and abandons the
    /// remaining shards.
    ///
    /// Connections are dialed per call, so a session holding shard
    /// transactions is rejected with `InvalidRequest`.
    pub async fn execute_batch_keyspace_ids(
        &self,
        ctx: &Context,
        batch: KeyspaceIdBatchQuery,
    ) -> GateResult<Vec<QueryResult>> {
        let parts = self.plan(&batch)?;
        let ctx = match &batch.caller_id {
            Some(caller_id) => ctx.with_caller_id(caller_id.clone()),
            None => ctx.clone(),
        };
        debug!(queries = batch.queries.len(), shards = parts.len(), "routing keyspace id batch");

        let shards = parts.len();
        let mut tasks = JoinSet::new();
        for (order, part) in parts.into_iter().enumerate() {
            let run = part.run(ctx.clone(), self.dialers.clone());
            tasks.spawn(async move { (order, run.await) });
        }

        let mut outputs: Vec<Option<(Vec<usize>, Vec<QueryResult>)>> = vec![None; shards];
        while let Some(joined) = tasks.join_next().await {
            let (order, output) =
                joined.map_err(|e| GateError::Internal(format!("shard task failed: {e}")))?;
            outputs[order] = Some(output?);
        }

        // Merge in plan order, not completion order.
        let mut results = vec![QueryResult::new(); batch.queries.len()];
        for (indexes, parts) in outputs.into_iter().flatten() {
            for (index, part) in indexes.into_iter().zip(parts) {
                merge(&mut results[index], part);
            }
        }
        Ok(results)
    }
}
