//! Aggregator CLI - schema and identity tooling for the results aggregator

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{doctor, identity, migrate};

/// Aggregator - manage the results database schema
#[derive(Parser)]
#[command(name = "aggregator", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and change the database schema version
    Migrate {
        #[command(subcommand)]
        command: migrate::MigrateCommands,
    },

    /// Run database health checks
    Doctor {
        /// Show verbose output
        #[arg(long, short)]
        verbose: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode a request identity header
    Identity {
        /// Header value (identity document, or "Bearer <jwt>" with --bearer)
        token: String,
        /// Treat the value as a debug-mode Authorization header
        #[arg(long)]
        bearer: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("AGGREGATOR_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Migrate { command } => migrate::run(command),
        Commands::Doctor { verbose, json } => doctor::run(verbose, json),
        Commands::Identity { token, bearer, json } => identity::run(&token, bearer, json),
    }
}
