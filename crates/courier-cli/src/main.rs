//! # courier-cli
//!
//! Command-line interface for Courier.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use courier_core::Config;

mod commands;

/// Courier - MCP tool invocation and LLM sampling over pub/sub
#[derive(Parser)]
#[command(name = "courier")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tool and sampling executors plus the HTTP gateway
    Serve,
    /// Issue a single tool call through the full pub/sub path
    Call {
        /// Tool name
        #[arg(short, long)]
        tool: String,
        /// Tool arguments as JSON
        #[arg(short, long, default_value = "{}")]
        args: String,
        /// Timeout in milliseconds (defaults to the configured tool timeout)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Validate a README file directly, without the bus
    Validate {
        /// Path to the README
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load_validated()?;

    match cli.command {
        Commands::Serve => commands::serve(config).await,
        Commands::Call {
            tool,
            args,
            timeout_ms,
        } => commands::call(config, &tool, &args, timeout_ms).await,
        Commands::Validate { path } => commands::validate(&path).await,
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
