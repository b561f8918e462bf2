//! `serve` command implementation.

use super::TargetArgs;
use crate::error::CliResult;
use shardwire_tablet::{MemoryEngine, ServerConfig, TabletServer, TabletService};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Builds the in-memory tablet served by `serve`.
///
/// With `seed_table`, the table gets an `id` primary key holding `1..=rows`
/// so that `split` has something to work on.
pub fn build_service(
    addr: SocketAddr,
    target: &TargetArgs,
    seed_table: Option<&str>,
    rows: i64,
) -> Arc<TabletService> {
    let engine = Arc::new(MemoryEngine::new());
    if let Some(table) = seed_table {
        engine.add_table(table, "id", (1..=rows).collect());
    }
    let config = ServerConfig::new(target.keyspace.clone(), target.shard.clone(), target.tablet_type)
        .with_bind_addr(addr);
    Arc::new(TabletService::new(config, engine))
}

/// Runs the serve command until interrupted.
pub async fn run(
    addr: SocketAddr,
    target: &TargetArgs,
    seed_table: Option<&str>,
    rows: i64,
) -> CliResult<()> {
    let server = TabletServer::new(build_service(addr, target, seed_table, rows));
    let listener = server.bind().await?;
    server
        .serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for interrupts");
                std::future::pending::<()>().await;
            }
            info!("interrupted, shutting down");
        })
        .await?;
    Ok(())
}
