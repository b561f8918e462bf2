//! Query engine seam and the scripted in-memory engine.

use parking_lot::RwLock;
use shardwire_tabletconn::KeyStats;
use shardwire_types::{BoundQuery, ErrorCode, QueryResult, RealtimeStats, RpcError};
use std::collections::HashMap;

/// Storage behind a tablet.
///
/// Statements are evaluated and applied in two steps so that a transaction
/// can check every statement up front and apply the whole set at commit.
pub trait QueryEngine: Send + Sync + 'static {
    /// Computes the result of a statement without side effects.
    fn evaluate(&self, query: &BoundQuery) -> Result<QueryResult, RpcError>;

    /// Applies statements as one unit.
    fn apply(&self, statements: Vec<BoundQuery>);

    /// Key statistics for split planning.
    fn key_stats(&self) -> &dyn KeyStats;

    /// Current serving statistics.
    fn health(&self) -> RealtimeStats;

    /// Evaluates and applies a single autocommitted statement.
    fn execute(&self, query: &BoundQuery) -> Result<QueryResult, RpcError> {
        let result = self.evaluate(query)?;
        self.apply(vec![query.clone()]);
        Ok(result)
    }
}

#[derive(Debug, Default)]
struct Table {
    primary_key: String,
    columns: HashMap<String, Vec<i64>>,
}

#[derive(Debug, Default)]
struct EngineState {
    results: HashMap<String, QueryResult>,
    failures: HashMap<String, RpcError>,
    applied: Vec<BoundQuery>,
    tables: HashMap<String, Table>,
    stats: RealtimeStats,
}

/// Scripted engine for tests and demos.
///
/// Results are looked up by exact SQL text. Unscripted reads return an
/// empty result and unscripted writes report one affected row.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: RwLock<EngineState>,
}

fn is_read(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"))
}

impl MemoryEngine {
    /// Creates an engine with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the result returned for `sql`.
    pub fn set_result(&self, sql: impl Into<String>, result: QueryResult) {
        self.state.write().results.insert(sql.into(), result);
    }

    /// Makes every evaluation of `sql` fail.
    pub fn fail_on(&self, sql: impl Into<String>, code: ErrorCode, message: impl Into<String>) {
        self.state
            .write()
            .failures
            .insert(sql.into(), RpcError::new(code, message));
    }

    /// Removes an injected failure.
    pub fn clear_failure(&self, sql: &str) {
        self.state.write().failures.remove(sql);
    }

    /// Registers a table and the values of its primary key.
    pub fn add_table(&self, table: impl Into<String>, primary_key: impl Into<String>, keys: Vec<i64>) {
        let primary_key = primary_key.into();
        let mut columns = HashMap::new();
        columns.insert(primary_key.clone(), keys);
        self.state.write().tables.insert(
            table.into(),
            Table {
                primary_key,
                columns,
            },
        );
    }

    /// Adds another integral column to a registered table.
    pub fn add_column(&self, table: &str, column: impl Into<String>, values: Vec<i64>) -> Result<(), RpcError> {
        let mut state = self.state.write();
        let table = state
            .tables
            .get_mut(table)
            .ok_or_else(|| unknown_table(table))?;
        table.columns.insert(column.into(), values);
        Ok(())
    }

    /// Replaces the serving statistics.
    pub fn set_stats(&self, stats: RealtimeStats) {
        self.state.write().stats = stats;
    }

    /// Returns the applied statements in order.
    pub fn applied(&self) -> Vec<BoundQuery> {
        self.state.read().applied.clone()
    }

    /// Returns the SQL of the applied statements in order.
    pub fn applied_sql(&self) -> Vec<String> {
        self.state.read().applied.iter().map(|q| q.sql.clone()).collect()
    }

    fn column(&self, table: &str, column: &str) -> Result<Vec<i64>, RpcError> {
        let state = self.state.read();
        let t = state.tables.get(table).ok_or_else(|| unknown_table(table))?;
        t.columns.get(column).cloned().ok_or_else(|| {
            RpcError::new(
                ErrorCode::BadInput,
                format!("table {table} has no integral column {column}"),
            )
        })
    }
}

fn unknown_table(table: &str) -> RpcError {
    RpcError::new(ErrorCode::BadInput, format!("unknown table {table}"))
}

impl QueryEngine for MemoryEngine {
    fn evaluate(&self, query: &BoundQuery) -> Result<QueryResult, RpcError> {
        let state = self.state.read();
        if let Some(err) = state.failures.get(&query.sql) {
            return Err(err.clone());
        }
        Ok(match state.results.get(&query.sql) {
            Some(result) => result.clone(),
            None if is_read(&query.sql) => QueryResult::new(),
            None => QueryResult::affected(1),
        })
    }

    fn apply(&self, statements: Vec<BoundQuery>) {
        self.state.write().applied.extend(statements);
    }

    fn key_stats(&self) -> &dyn KeyStats {
        self
    }

    fn health(&self) -> RealtimeStats {
        self.state.read().stats.clone()
    }
}

impl KeyStats for MemoryEngine {
    fn primary_key(&self, table: &str) -> Result<String, RpcError> {
        self.state
            .read()
            .tables
            .get(table)
            .map(|t| t.primary_key.clone())
            .ok_or_else(|| unknown_table(table))
    }

    fn row_count(&self, table: &str) -> Result<u64, RpcError> {
        let primary_key = self.primary_key(table)?;
        Ok(self.column(table, &primary_key)?.len() as u64)
    }

    fn min_max(&self, table: &str, column: &str) -> Result<Option<(i64, i64)>, RpcError> {
        let values = self.column(table, column)?;
        Ok(values.iter().min().copied().zip(values.iter().max().copied()))
    }

    fn sorted_keys(&self, table: &str, column: &str) -> Result<Vec<i64>, RpcError> {
        let mut values = self.column(table, column)?;
        values.sort_unstable();
        Ok(values)
    }
}
