//! `coteach budget` -- spend against the ceiling for the current window.

use std::path::Path;

use clap::Args;
use coteach_types::ledger::BudgetStatus;

use super::{build_budget, load_config};

/// Arguments for the `coteach budget` subcommand.
#[derive(Args)]
pub struct BudgetArgs {
    /// Print the status as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Run the budget command.
///
/// Reads the configured ledger, so the numbers match what a running server
/// sharing that ledger would enforce.
pub async fn run(args: BudgetArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let status = build_budget(&config).await?.status();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", render(&status));
    }
    Ok(())
}

fn render(status: &BudgetStatus) -> String {
    let window = status
        .window_start
        .map(|start| start.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "lifetime".into());
    let mut out = String::new();
    out.push_str(&format!("Window:    {window}\n"));
    out.push_str(&format!(
        "Spent:     ${:.4} of ${:.2} ({:.1}%)\n",
        status.spent_usd, status.ceiling_usd, status.percent_used
    ));
    out.push_str(&format!("Reserved:  ${:.4}\n", status.reserved_usd));
    out.push_str(&format!("Remaining: ${:.4}\n", status.remaining_usd));
    out.push_str(&format!("Calls:     {}\n", status.calls));
    if status.warning {
        out.push_str("Warning:   spend is past the warning threshold\n");
    }
    out
}
