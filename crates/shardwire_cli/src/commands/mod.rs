//! CLI command implementations.

pub mod health;
pub mod serve;
pub mod split;
pub mod vindex;

use crate::error::{CliError, CliResult};
use clap::{Args, ValueEnum};
use shardwire_tabletconn::{ConnConfig, Context, DialerRegistry, LoopbackDirectory, TabletConn};
use shardwire_types::{EndPoint, TabletType, Target};

/// Output format shared by the reporting commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON document per line.
    Json,
}

/// Keyspace, shard and tablet type a command addresses.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Keyspace name
    #[arg(long, default_value = "test_keyspace")]
    pub keyspace: String,

    /// Shard name, e.g. `0` or `-80`
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub shard: String,

    /// Tablet type
    #[arg(long, default_value = "master")]
    pub tablet_type: TabletType,
}

impl TargetArgs {
    /// Returns the addressed target.
    pub fn target(&self) -> Target {
        Target::new(self.keyspace.clone(), self.shard.clone(), self.tablet_type)
    }
}

/// Parses `host:port` into an endpoint with an `rpc` port.
pub fn parse_endpoint(addr: &str) -> CliResult<EndPoint> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| CliError::usage(format!("address '{addr}' is not host:port")))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| CliError::usage(format!("address '{addr}' has an invalid port")))?;
    if host.is_empty() {
        return Err(CliError::usage(format!("address '{addr}' has no host")));
    }
    Ok(EndPoint::new(0, host, port))
}

/// Dials a tablet over tcp.
pub async fn dial(ctx: &Context, addr: &str, target: &Target) -> CliResult<Box<dyn TabletConn>> {
    let endpoint = parse_endpoint(addr)?;
    let config = ConnConfig::new("tcp");
    let registry = DialerRegistry::builder()
        .with_builtin(&config, LoopbackDirectory::new())?
        .build(&config)?;
    Ok(registry.dial(ctx, &endpoint, target).await?)
}
