//! Transaction pool.

use crate::engine::QueryEngine;
use crate::error::{ServerResult, TabletServerError};
use parking_lot::Mutex;
use shardwire_tabletconn::SessionId;
use shardwire_types::{BoundQuery, QueryResult, TransactionId};
use std::collections::HashMap;
use tracing::{debug, info};

/// Open transactions of one tablet.
///
/// Statements are evaluated when executed and buffered; commit applies the
/// buffer to the engine as one unit, rollback discards it.
///
/// Every transaction belongs to the session that began it. Other sessions
/// see it as unknown, and [`TxPool::release`] rolls back whatever a session
/// still holds when its client goes away.
#[derive(Debug)]
pub struct TxPool {
    capacity: usize,
    inner: Mutex<PoolState>,
}

#[derive(Debug)]
struct OpenTx {
    owner: SessionId,
    statements: Vec<BoundQuery>,
}

#[derive(Debug)]
struct PoolState {
    last_id: TransactionId,
    open: HashMap<TransactionId, OpenTx>,
}

impl PoolState {
    fn owned(&mut self, id: TransactionId, owner: SessionId) -> ServerResult<&mut OpenTx> {
        match self.open.get_mut(&id) {
            Some(tx) if tx.owner == owner => Ok(tx),
            _ => Err(TabletServerError::NotInTx(id)),
        }
    }

    fn take(&mut self, id: TransactionId, owner: SessionId) -> ServerResult<Vec<BoundQuery>> {
        self.owned(id, owner)?;
        self.open
            .remove(&id)
            .map(|tx| tx.statements)
            .ok_or(TabletServerError::NotInTx(id))
    }
}

impl TxPool {
    /// Creates a pool holding at most `capacity` open transactions.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(PoolState {
                last_id: 0,
                open: HashMap::new(),
            }),
        }
    }

    /// Opens a transaction for `owner`. Ids are nonzero and increase
    /// monotonically.
    pub fn begin(&self, owner: SessionId) -> ServerResult<TransactionId> {
        let mut state = self.inner.lock();
        if state.open.len() >= self.capacity {
            return Err(TabletServerError::PoolExhausted(state.open.len()));
        }
        state.last_id += 1;
        let id = state.last_id;
        state.open.insert(
            id,
            OpenTx {
                owner,
                statements: Vec::new(),
            },
        );
        debug!(transaction_id = id, session = owner, "transaction begun");
        Ok(id)
    }

    /// Evaluates `query` inside transaction `id` and buffers it.
    pub fn execute(
        &self,
        id: TransactionId,
        owner: SessionId,
        engine: &dyn QueryEngine,
        query: &BoundQuery,
    ) -> ServerResult<QueryResult> {
        let mut state = self.inner.lock();
        let tx = state.owned(id, owner)?;
        let result = engine.evaluate(query)?;
        tx.statements.push(query.clone());
        Ok(result)
    }

    /// Applies the buffered statements of `id` and ends it.
    pub fn commit(
        &self,
        id: TransactionId,
        owner: SessionId,
        engine: &dyn QueryEngine,
    ) -> ServerResult<()> {
        let statements = self.inner.lock().take(id, owner)?;
        debug!(transaction_id = id, statements = statements.len(), "transaction committed");
        engine.apply(statements);
        Ok(())
    }

    /// Discards the buffered statements of `id` and ends it.
    pub fn rollback(&self, id: TransactionId, owner: SessionId) -> ServerResult<()> {
        self.inner.lock().take(id, owner)?;
        debug!(transaction_id = id, "transaction rolled back");
        Ok(())
    }

    /// Rolls back every transaction `owner` still holds and returns how many
    /// there were.
    pub fn release(&self, owner: SessionId) -> usize {
        let mut state = self.inner.lock();
        let before = state.open.len();
        state.open.retain(|_, tx| tx.owner != owner);
        let released = before - state.open.len();
        if released > 0 {
            info!(session = owner, released, "abandoned transactions rolled back");
        }
        released
    }

    /// Returns the number of open transactions.
    pub fn len(&self) -> usize {
        self.inner.lock().open.len()
    }

    /// Returns true when no transaction is open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
