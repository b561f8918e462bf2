//! `split` command implementation.

use super::{dial, Format, TargetArgs};
use crate::error::{CliError, CliResult};
use clap::ValueEnum;
use shardwire_tabletconn::Context;
use shardwire_types::{BindValue, BoundQuery, QuerySplit, SplitAlgorithm, Value};

/// Split algorithm names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Algorithm {
    /// Equally wide value intervals.
    #[default]
    Equal,
    /// Equally sized row runs.
    FullScan,
}

impl From<Algorithm> for SplitAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Equal => SplitAlgorithm::EqualSplits,
            Algorithm::FullScan => SplitAlgorithm::FullScan,
        }
    }
}

/// Arguments of the split command.
#[derive(Debug, Clone)]
pub struct SplitRequest {
    /// Query to split.
    pub sql: String,
    /// Split column; the primary key when absent.
    pub column: Option<String>,
    /// Number of parts, 0 to size by rows.
    pub count: i64,
    /// Rows per part, 0 to size by count.
    pub rows_per_part: i64,
    /// Splitting algorithm.
    pub algorithm: Algorithm,
}

impl SplitRequest {
    fn validate(&self) -> CliResult<()> {
        if (self.count > 0) == (self.rows_per_part > 0) {
            return Err(CliError::usage("give exactly one of --count and --rows-per-part"));
        }
        Ok(())
    }
}

fn render_value(value: &Value) -> String {
    value
        .to_i64()
        .map(|v| v.to_string())
        .unwrap_or_else(|| format!("'{}'", String::from_utf8_lossy(value.raw())))
}

fn render(split: &QuerySplit) -> String {
    let binds: Vec<String> = split
        .query
        .bind_vars
        .iter()
        .map(|(name, bind)| match bind {
            BindValue::Scalar(v) => format!("{name}={}", render_value(v)),
            BindValue::List(vs) => format!(
                "{name}=({})",
                vs.iter().map(render_value).collect::<Vec<_>>().join(",")
            ),
        })
        .collect();
    format!("{}\t{}\t{}", split.row_count, split.query.sql, binds.join(" "))
}

/// Runs the split command.
pub async fn run(addr: &str, target: &TargetArgs, request: SplitRequest, format: Format) -> CliResult<()> {
    request.validate()?;
    let ctx = Context::background();
    let mut conn = dial(&ctx, addr, &target.target()).await?;
    let splits = conn
        .split_query_v2(
            &ctx,
            BoundQuery::new(request.sql),
            request.column.into_iter().collect(),
            request.count,
            request.rows_per_part,
            request.algorithm.into(),
        )
        .await;
    conn.close().await;

    for split in splits? {
        match format {
            Format::Text => println!("{}", render(&split)),
            Format::Json => println!("{}", serde_json::to_string(&split)?),
        }
    }
    Ok(())
}
