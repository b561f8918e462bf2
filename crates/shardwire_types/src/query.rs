//! Queries, results and query splits.

use crate::sqltype::Type;
use crate::value::{BindValue, BindVars, Value};
use serde::{Deserialize, Serialize};

/// A SQL statement with its bind variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundQuery {
    /// SQL text.
    pub sql: String,
    /// Named bind variables.
    pub bind_vars: BindVars,
}

impl BoundQuery {
    /// Creates a query without bind variables.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bind_vars: BindVars::new(),
        }
    }

    /// Adds a bind variable.
    pub fn with_bind(mut self, name: impl Into<String>, value: impl Into<BindValue>) -> Self {
        self.bind_vars.insert(name.into(), value.into());
        self
    }
}

/// A column description in a result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Column type.
    pub ty: Type,
}

impl Field {
    /// Creates a field.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A materialized result set, or one chunk of a streamed result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column descriptions. Streams send them only in the first chunk.
    pub fields: Vec<Field>,
    /// Number of rows changed by a DML statement.
    pub rows_affected: u64,
    /// Auto-increment id generated by an insert.
    pub insert_id: u64,
    /// Result rows.
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a result carrying only an affected-row count.
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    /// Creates a result with fields and rows.
    pub fn with_rows(fields: Vec<Field>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            fields,
            rows,
            ..Self::default()
        }
    }
}

/// Algorithm used to split a query for parallel scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitAlgorithm {
    /// Divide the split column's value range into equally wide intervals.
    #[default]
    EqualSplits,
    /// Walk the split column in order and cut every N rows.
    FullScan,
}

/// One sub-range of a split query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySplit {
    /// The rewritten query restricted to this sub-range.
    pub query: BoundQuery,
    /// Estimated number of rows in this sub-range.
    pub row_count: i64,
}
