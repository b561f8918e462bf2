//! `health` command implementation.

use super::{dial, Format, TargetArgs};
use crate::error::CliResult;
use shardwire_tabletconn::Context;
use shardwire_types::StreamHealthResponse;
use tracing::{debug, warn};

fn render(health: &StreamHealthResponse) -> String {
    let stats = match &health.realtime_stats {
        None => "no stats yet".to_string(),
        Some(stats) if stats.health_error.is_empty() => format!(
            "healthy lag={}s cpu={:.1}% qps={:.1}",
            stats.seconds_behind_master, stats.cpu_usage, stats.qps
        ),
        Some(stats) => format!("unhealthy: {}", stats.health_error),
    };
    format!(
        "{} reparented={} {}",
        health.target, health.tablet_externally_reparented_timestamp, stats
    )
}

/// Runs the health command.
///
/// Prints snapshots until `count` have been seen, the stream ends or the
/// process is interrupted.
pub async fn run(addr: &str, target: &TargetArgs, count: Option<usize>, format: Format) -> CliResult<()> {
    let ctx = Context::background().child();
    let mut conn = dial(&ctx, addr, &target.target()).await?;
    let mut stream = conn.stream_health(&ctx).await?;

    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let mut seen = 0;
    while count.map_or(true, |limit| seen < limit) {
        let health = match stream.recv().await {
            Ok(Some(health)) => health,
            Ok(None) => break,
            Err(e) if ctx.is_cancelled() => {
                debug!(error = %e, "health stream interrupted");
                break;
            }
            Err(e) => {
                conn.close().await;
                return Err(e.into());
            }
        };
        match format {
            Format::Text => println!("{}", render(&health)),
            Format::Json => println!("{}", serde_json::to_string(&health)?),
        }
        seen += 1;
    }
    if seen == 0 {
        warn!(%addr, "no health snapshot received");
    }
    ctx.cancel();
    conn.close().await;
    Ok(())
}
