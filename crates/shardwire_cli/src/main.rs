//! shardwire CLI
//!
//! Command-line tools for shardwire tablets and vindexes.
//!
//! # Commands
//!
//! - `serve` - Run an in-memory tablet over tcp
//! - `map` - Map values to keyspace ids through a vindex
//! - `verify` - Check that a value maps to a keyspace id
//! - `health` - Follow a tablet's health stream
//! - `split` - Split a query into key-range parts

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::split::{Algorithm, SplitRequest};
use commands::vindex::InputKind;
use commands::{Format, TargetArgs};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// shardwire command-line tools.
#[derive(Parser)]
#[command(name = "shardwire")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an in-memory tablet over tcp
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:15991")]
        addr: SocketAddr,

        #[command(flatten)]
        target: TargetArgs,

        /// Create this table with an `id` primary key
        #[arg(long)]
        seed_table: Option<String>,

        /// Rows in the seeded table
        #[arg(long, default_value = "1000")]
        rows: i64,
    },

    /// Map values to keyspace ids through a vindex
    Map {
        /// VSchema JSON file
        #[arg(long)]
        vschema: PathBuf,

        /// Keyspace holding the vindex
        #[arg(long)]
        keyspace: String,

        /// Vindex name
        #[arg(long)]
        vindex: String,

        /// How values are interpreted
        #[arg(long, value_enum, default_value_t)]
        input: InputKind,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: Format,

        /// Values to map
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Check that a value maps to a keyspace id
    Verify {
        /// VSchema JSON file
        #[arg(long)]
        vschema: PathBuf,

        /// Keyspace holding the vindex
        #[arg(long)]
        keyspace: String,

        /// Vindex name
        #[arg(long)]
        vindex: String,

        /// How the value is interpreted
        #[arg(long, value_enum, default_value_t)]
        input: InputKind,

        /// Value to check
        value: String,

        /// Expected keyspace id in hex
        keyspace_id: String,
    },

    /// Follow a tablet's health stream
    Health {
        /// Tablet address (host:port)
        #[arg(long, default_value = "127.0.0.1:15991")]
        addr: String,

        #[command(flatten)]
        target: TargetArgs,

        /// Stop after this many snapshots
        #[arg(short, long)]
        count: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: Format,
    },

    /// Split a query into key-range parts
    Split {
        /// Tablet address (host:port)
        #[arg(long, default_value = "127.0.0.1:15991")]
        addr: String,

        #[command(flatten)]
        target: TargetArgs,

        /// Split column (defaults to the primary key)
        #[arg(long)]
        column: Option<String>,

        /// Number of parts
        #[arg(long, default_value = "0")]
        count: i64,

        /// Rows per part
        #[arg(long, default_value = "0")]
        rows_per_part: i64,

        /// Splitting algorithm
        #[arg(long, value_enum, default_value_t)]
        algorithm: Algorithm,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: Format,

        /// Query to split
        sql: String,
    },
}

async fn run(command: Commands) -> error::CliResult<()> {
    match command {
        Commands::Serve {
            addr,
            target,
            seed_table,
            rows,
        } => commands::serve::run(addr, &target, seed_table.as_deref(), rows).await,
        Commands::Map {
            vschema,
            keyspace,
            vindex,
            input,
            format,
            values,
        } => commands::vindex::run_map(&vschema, &keyspace, &vindex, input, &values, format),
        Commands::Verify {
            vschema,
            keyspace,
            vindex,
            input,
            value,
            keyspace_id,
        } => commands::vindex::run_verify(&vschema, &keyspace, &vindex, input, &value, &keyspace_id),
        Commands::Health {
            addr,
            target,
            count,
            format,
        } => commands::health::run(&addr, &target, count, format).await,
        Commands::Split {
            addr,
            target,
            column,
            count,
            rows_per_part,
            algorithm,
            format,
            sql,
        } => {
            let request = SplitRequest {
                sql,
                column,
                count,
                rows_per_part,
                algorithm,
            };
            commands::split::run(&addr, &target, request, format).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}
