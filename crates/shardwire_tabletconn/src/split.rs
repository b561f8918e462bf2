//! Split-query planning.
//!
//! Turns one `select` into an ordered list of sub-queries, each restricted
//! to a half-open range of the split column:
//!
//! ```text
//! select * from t where (a = 1) and id >= :_splitquery_start_id and id < :_splitquery_end_id
//! ```
//!
//! The first split has no lower bound and the last has no upper bound, so
//! the splits cover every row exactly once whatever the key distribution.
//! SQL is inspected textually only: the query must be a single-table
//! `select` without ordering, grouping, limits, joins or unions.

use shardwire_types::{BindValue, BoundQuery, ErrorCode, QuerySplit, RpcError, SplitAlgorithm, Value};

/// Prefix of the lower-bound bind variable.
pub const START_BIND_PREFIX: &str = "_splitquery_start_";
/// Prefix of the upper-bound bind variable.
pub const END_BIND_PREFIX: &str = "_splitquery_end_";
/// Largest `split_count` a caller may ask for.
pub const MAX_SPLIT_COUNT: i64 = 1 << 16;

const FORBIDDEN: &[&str] = &["limit", "having", "join", "union"];

/// Key statistics the planner needs from the storage engine.
///
/// Split columns are integral.
pub trait KeyStats {
    /// Returns the primary key column used when no split column is given.
    fn primary_key(&self, table: &str) -> Result<String, RpcError>;

    /// Returns the number of rows in the table.
    fn row_count(&self, table: &str) -> Result<u64, RpcError>;

    /// Returns the smallest and largest value of the column, or `None` for
    /// an empty table.
    fn min_max(&self, table: &str, column: &str) -> Result<Option<(i64, i64)>, RpcError>;

    /// Returns every value of the column in ascending order.
    fn sorted_keys(&self, table: &str, column: &str) -> Result<Vec<i64>, RpcError>;
}

fn bad_input(message: impl Into<String>) -> RpcError {
    RpcError::new(ErrorCode::BadInput, message)
}

/// The parts of a splittable `select`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectShape<'a> {
    /// Everything before `where` (or the whole statement).
    head: &'a str,
    /// The original `where` predicate.
    predicate: Option<&'a str>,
    /// The table read from.
    table: String,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Finds `word` as a whole word in already-lowercased `haystack`.
fn find_word(haystack: &str, word: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(offset) = haystack[from..].find(word) {
        let start = from + offset;
        let end = start + word.len();
        let before = start == 0 || !is_word_byte(bytes[start - 1]);
        let after = end == bytes.len() || !is_word_byte(bytes[end]);
        if before && after {
            return Some(start);
        }
        from = end;
    }
    None
}

impl<'a> SelectShape<'a> {
    fn parse(sql: &'a str) -> Result<Self, RpcError> {
        let sql = sql.trim().trim_end_matches(';').trim_end();
        let lower = sql.to_ascii_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|w| !w.is_empty())
            .collect();

        if words.first() != Some(&"select") {
            return Err(bad_input(format!("only select statements can be split: {sql}")));
        }
        for pair in words.windows(2) {
            if pair[1] == "by" && (pair[0] == "order" || pair[0] == "group") {
                return Err(bad_input(format!("cannot split a query with {} by", pair[0])));
            }
        }
        if let Some(word) = words.iter().find(|w| FORBIDDEN.contains(w)) {
            return Err(bad_input(format!("cannot split a query with {word}")));
        }

        let from = find_word(&lower, "from")
            .ok_or_else(|| bad_input("query has no from clause"))?;
        let table = sql[from + 4..]
            .split_whitespace()
            .next()
            .map(|t| t.trim_matches('`'))
            .filter(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.'))
            .ok_or_else(|| bad_input("split queries must read from exactly one named table"))?
            .to_string();

        let (head, predicate) = match find_word(&lower, "where") {
            Some(pos) => {
                let predicate = sql[pos + 5..].trim();
                if predicate.is_empty() {
                    return Err(bad_input("empty where clause"));
                }
                (sql[..pos].trim_end(), Some(predicate))
            }
            None => (sql, None),
        };
        Ok(Self {
            head,
            predicate,
            table,
        })
    }

    fn restrict(&self, bounds: &str) -> String {
        match self.predicate {
            Some(predicate) => format!("{} where ({predicate}) and {bounds}", self.head),
            None => format!("{} where {bounds}", self.head),
        }
    }
}

fn ceil_div(a: u64, b: u64) -> u64 {
    if b == 0 {
        return a;
    }
    a.div_ceil(b)
}

/// Boundaries for equally wide key ranges.
///
/// The count never exceeds the key span or the number of rows, so a sparse
/// table gets at most one split per row.
fn equal_boundaries(min: i64, max: i64, count: u64, rows: u64) -> Vec<i64> {
    let span = i128::from(max) - i128::from(min) + 1;
    let n = i128::from(count.min(rows).max(1)).min(span);
    (1..n)
        .map(|i| (i128::from(min) + span * i / n) as i64)
        .collect()
}

/// Boundaries every `per_part` rows over sorted keys.
///
/// Runs of equal keys are never cut, so a part can exceed `per_part`.
fn row_boundaries(keys: &[i64], per_part: u64) -> Vec<i64> {
    let step = usize::try_from(per_part.max(1)).unwrap_or(usize::MAX);
    let mut boundaries: Vec<i64> = Vec::new();
    for &key in keys.iter().step_by(step).skip(1) {
        if boundaries.last().map_or(keys[0] < key, |&last| last < key) {
            boundaries.push(key);
        }
    }
    boundaries
}

/// Plans the splits of `query`.
///
/// Exactly one of `split_count` and `num_rows_per_query_part` must be
/// positive, and `split_count` is at most [`MAX_SPLIT_COUNT`]. The first of `split_columns` drives the split; when empty,
/// the table's primary key is used.
pub fn plan_splits(
    query: &BoundQuery,
    split_columns: &[String],
    algorithm: SplitAlgorithm,
    stats: &dyn KeyStats,
    split_count: i64,
    num_rows_per_query_part: i64,
) -> Result<Vec<QuerySplit>, RpcError> {
    if (split_count > 0) == (num_rows_per_query_part > 0) {
        return Err(bad_input(
            "exactly one of split_count and num_rows_per_query_part must be positive",
        ));
    }
    if split_count > MAX_SPLIT_COUNT {
        return Err(bad_input(format!(
            "split_count {split_count} exceeds the limit of {MAX_SPLIT_COUNT}"
        )));
    }
    let shape = SelectShape::parse(&query.sql)?;
    let column = match split_columns.first() {
        Some(column) => column.clone(),
        None => stats.primary_key(&shape.table)?,
    };
    let rows = stats.row_count(&shape.table)?;

    let (boundaries, keys) = match algorithm {
        SplitAlgorithm::EqualSplits => {
            let count = if split_count > 0 {
                split_count as u64
            } else {
                ceil_div(rows, num_rows_per_query_part as u64).max(1)
            };
            let boundaries = match stats.min_max(&shape.table, &column)? {
                Some((min, max)) => equal_boundaries(min, max, count, rows),
                None => Vec::new(),
            };
            (boundaries, None)
        }
        SplitAlgorithm::FullScan => {
            let keys = stats.sorted_keys(&shape.table, &column)?;
            let per_part = if num_rows_per_query_part > 0 {
                num_rows_per_query_part as u64
            } else {
                ceil_div(keys.len() as u64, split_count as u64).max(1)
            };
            (row_boundaries(&keys, per_part), Some(keys))
        }
    };

    let parts = boundaries.len() + 1;
    let mut lower: Option<i64> = None;
    let mut splits = Vec::with_capacity(parts);
    for upper in boundaries.iter().copied().map(Some).chain(std::iter::once(None)) {
        let row_count = match &keys {
            Some(keys) => {
                let from = lower.map_or(0, |l| keys.partition_point(|&k| k < l));
                let to = upper.map_or(keys.len(), |u| keys.partition_point(|&k| k < u));
                (to - from) as i64
            }
            None => (rows / parts as u64) as i64,
        };
        splits.push(QuerySplit {
            query: bound_split(query, &shape, &column, lower, upper),
            row_count,
        });
        lower = upper;
    }
    Ok(splits)
}

fn bound_split(
    query: &BoundQuery,
    shape: &SelectShape<'_>,
    column: &str,
    lower: Option<i64>,
    upper: Option<i64>,
) -> BoundQuery {
    let mut bound = query.clone();
    let mut clauses = Vec::with_capacity(2);
    if let Some(start) = lower {
        let name = format!("{START_BIND_PREFIX}{column}");
        clauses.push(format!("{column} >= :{name}"));
        bound.bind_vars.insert(name, BindValue::Scalar(Value::from_i64(start)));
    }
    if let Some(end) = upper {
        let name = format!("{END_BIND_PREFIX}{column}");
        clauses.push(format!("{column} < :{name}"));
        bound.bind_vars.insert(name, BindValue::Scalar(Value::from_i64(end)));
    }
    if !clauses.is_empty() {
        bound.sql = shape.restrict(&clauses.join(" and "));
    }
    bound
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Keys(Vec<i64>);

    impl KeyStats for Keys {
        fn primary_key(&self, _table: &str) -> Result<String, RpcError> {
            Ok("id".into())
        }

        fn row_count(&self, _table: &str) -> Result<u64, RpcError> {
            Ok(self.0.len() as u64)
        }

        fn min_max(&self, _table: &str, _column: &str) -> Result<Option<(i64, i64)>, RpcError> {
            Ok(self.0.first().copied().zip(self.0.last().copied()))
        }

        fn sorted_keys(&self, _table: &str, _column: &str) -> Result<Vec<i64>, RpcError> {
            Ok(self.0.clone())
        }
    }

    fn bind(split: &QuerySplit, prefix: &str, column: &str) -> Option<i64> {
        match split.query.bind_vars.get(&format!("{prefix}{column}")) {
            Some(BindValue::Scalar(v)) => v.to_i64(),
            _ => None,
        }
    }

    fn owners(splits: &[QuerySplit], key: i64) -> usize {
        splits
            .iter()
            .filter(|s| {
                bind(s, START_BIND_PREFIX, "id").map_or(true, |lo| key >= lo)
                    && bind(s, END_BIND_PREFIX, "id").map_or(true, |hi| key < hi)
            })
            .count()
    }

    #[test]
    fn rewrites_with_and_without_predicate() {
        let stats = Keys((1..=100).collect());
        let splits = plan_splits(
            &BoundQuery::new("select * from users"),
            &[],
            SplitAlgorithm::EqualSplits,
            &stats,
            2,
            0,
        )
        .unwrap();
        assert_eq!(splits.len(), 2);
        assert_eq!(
            splits[0].query.sql,
            "select * from users where id < :_splitquery_end_id"
        );
        assert_eq!(
            splits[1].query.sql,
            "select * from users where id >= :_splitquery_start_id"
        );
        assert_eq!(bind(&splits[0], END_BIND_PREFIX, "id"), Some(51));
        assert_eq!(splits[0].row_count, 50);

        let query = BoundQuery::new("select a from users where a = :a").with_bind("a", 3i64);
        let splits = plan_splits(&query, &["id".into()], SplitAlgorithm::EqualSplits, &stats, 3, 0).unwrap();
        assert_eq!(splits.len(), 3);
        assert_eq!(
            splits[1].query.sql,
            "select a from users where (a = :a) and id >= :_splitquery_start_id and id < :_splitquery_end_id"
        );
        assert!(splits[1].query.bind_vars.contains_key("a"));
    }

    #[test]
    fn rejects_unsplittable_queries() {
        let stats = Keys(vec![1]);
        for sql in [
            "select * from t order by id",
            "select count(*) from t group by a",
            "select * from t limit 10",
            "select * from a join b on a.id = b.id",
            "select * from a union select * from b",
            "update t set a = 1",
            "select 1",
            "select * from (select * from t) x",
        ] {
            let err = plan_splits(&BoundQuery::new(sql), &[], SplitAlgorithm::EqualSplits, &stats, 2, 0)
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::BadInput, "{sql}");
        }
    }

    #[test]
    fn words_inside_identifiers_are_not_keywords() {
        let stats = Keys((0..10).collect());
        let query = BoundQuery::new("select ordered_by, limits from t where rejoined = 1");
        let splits = plan_splits(&query, &[], SplitAlgorithm::EqualSplits, &stats, 2, 0).unwrap();
        assert_eq!(splits.len(), 2);
    }

    #[test]
    fn sizing_parameters_are_exclusive() {
        let stats = Keys(vec![1, 2, 3]);
        let query = BoundQuery::new("select * from t");
        assert!(plan_splits(&query, &[], SplitAlgorithm::FullScan, &stats, 0, 0).is_err());
        assert!(plan_splits(&query, &[], SplitAlgorithm::FullScan, &stats, 2, 2).is_err());
    }

    #[test]
    fn empty_table_yields_original_query() {
        let stats = Keys(vec![]);
        let query = BoundQuery::new("select * from t where a = 1");
        for algorithm in [SplitAlgorithm::EqualSplits, SplitAlgorithm::FullScan] {
            let splits = plan_splits(&query, &[], algorithm, &stats, 4, 0).unwrap();
            assert_eq!(splits.len(), 1);
            assert_eq!(splits[0].query, query);
        }
    }

    #[test]
    fn split_count_is_bounded() {
        let stats = Keys(vec![i64::MIN, i64::MAX]);
        let query = BoundQuery::new("select * from t");
        for count in [MAX_SPLIT_COUNT + 1, 1_000_000_000, 1 << 62, i64::MAX] {
            let err = plan_splits(&query, &[], SplitAlgorithm::EqualSplits, &stats, count, 0).unwrap_err();
            assert_eq!(err.code, ErrorCode::BadInput, "{count}");
        }
        let splits = plan_splits(&query, &[], SplitAlgorithm::EqualSplits, &stats, MAX_SPLIT_COUNT, 0).unwrap();
        assert_eq!(splits.len(), 2);
        assert_eq!(owners(&splits, i64::MIN), 1);
        assert_eq!(owners(&splits, i64::MAX), 1);
    }

    #[test]
    fn narrow_key_span_falls_back() {
        let stats = Keys(vec![5, 6, 7]);
        let query = BoundQuery::new("select * from t");
        let splits = plan_splits(&query, &[], SplitAlgorithm::EqualSplits, &stats, 10, 0).unwrap();
        assert_eq!(splits.len(), 3);
    }

    #[test]
    fn full_scan_counts_rows() {
        let stats = Keys((0..10).collect());
        let query = BoundQuery::new("select * from t");
        let splits = plan_splits(&query, &[], SplitAlgorithm::FullScan, &stats, 0, 4).unwrap();
        let counts: Vec<i64> = splits.iter().map(|s| s.row_count).collect();
        assert_eq!(counts, vec![4, 4, 2]);
    }

    #[test]
    fn full_scan_keeps_duplicate_runs_together() {
        let stats = Keys(vec![1, 1, 1, 1, 2, 3]);
        let query = BoundQuery::new("select * from t");
        let splits = plan_splits(&query, &[], SplitAlgorithm::FullScan, &stats, 0, 2).unwrap();
        let counts: Vec<i64> = splits.iter().map(|s| s.row_count).collect();
        assert_eq!(counts.iter().sum::<i64>(), 6);
        assert_eq!(counts[0], 4);
    }

    proptest! {
        #[test]
        fn splits_cover_every_key_once(
            mut keys in proptest::collection::vec(-1000i64..1000, 0..200),
            n in 1i64..20,
            full_scan in any::<bool>(),
        ) {
            keys.sort_unstable();
            let stats = Keys(keys.clone());
            let algorithm = if full_scan { SplitAlgorithm::FullScan } else { SplitAlgorithm::EqualSplits };
            let splits = plan_splits(&BoundQuery::new("select * from t"), &[], algorithm, &stats, n, 0).unwrap();

            prop_assert!(!splits.is_empty());
            prop_assert!(splits.len() as i64 <= n);
            for key in &keys {
                prop_assert_eq!(owners(&splits, *key), 1);
            }
            if !full_scan && !keys.is_empty() {
                let span = keys[keys.len() - 1] - keys[0] + 1;
                prop_assert_eq!(splits.len() as i64, n.min(span).min(keys.len() as i64));
            }
        }
    }
}
