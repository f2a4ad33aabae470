//! `coteach` -- command-line front end for the dispatch engine.
//!
//! # Commands
//!
//! - `coteach ask <prompt>` -- run one request through the full engine.
//! - `coteach route <text>` -- show what the rule router decides, no model call.
//! - `coteach budget` -- print the budget status restored from the ledger.
//! - `coteach serve` -- start the HTTP API.
//!
//! Configuration comes from `--config`, then `COTEACH_CONFIG`, then
//! `./coteach.json`. A missing file means defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

/// coteach -- request routing and cost control for classroom assistants.
#[derive(Parser)]
#[command(name = "coteach", version, about, long_about = None)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one request through routing, cache and the chosen responder.
    Ask(commands::ask::AskArgs),

    /// Classify text with the rule router only.
    Route(commands::route::RouteArgs),

    /// Show spend against the ceiling for the current window.
    Budget(commands::budget::BudgetArgs),

    /// Serve the HTTP API.
    Serve(commands::serve::ServeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Ask(args) => commands::ask::run(args, config_path).await?,
        Commands::Route(args) => commands::route::run(args)?,
        Commands::Budget(args) => commands::budget::run(args, config_path).await?,
        Commands::Serve(args) => commands::serve::run(args, config_path).await?,
    }

    Ok(())
}
