//! `coteach ask` -- run one request through the full engine.
//!
//! ```text
//! coteach ask "What are Alex's triggers?"
//! coteach ask "How do I handle a meltdown?" --session session_1a2b3c4d --trace
//! ```

use std::path::Path;

use clap::Args;
use coteach_services::api::handlers::new_session_id;
use coteach_types::request::{DispatchResult, DispatchStatus, Request};

use super::{build_engine, load_config};

/// Arguments for the `coteach ask` subcommand.
#[derive(Args)]
pub struct AskArgs {
    /// The request text.
    pub prompt: String,

    /// Session to continue. A new one is generated when omitted.
    #[arg(short, long)]
    pub session: Option<String>,

    /// Teacher issuing the request.
    #[arg(long, default_value = "teacher")]
    pub teacher: String,

    /// Print the step trace after the answer.
    #[arg(long)]
    pub trace: bool,

    /// Print the full dispatch result as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Run the ask command.
pub async fn run(args: AskArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let engine = build_engine(&config).await?;

    let session = args.session.unwrap_or_else(new_session_id);
    let result = engine
        .execute(Request::new(args.prompt, session, args.teacher))
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print!("{}", render(&result, args.trace));
    if result.status == DispatchStatus::Error {
        anyhow::bail!(
            "{}",
            result.error.as_deref().unwrap_or("request failed")
        );
    }
    Ok(())
}

/// Human-readable rendering of a dispatch result.
fn render(result: &DispatchResult, trace: bool) -> String {
    let mut out = String::new();
    if result.status == DispatchStatus::Ok {
        out.push_str(&result.response);
        out.push('\n');
        let responder = result
            .responder
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".into());
        let source = if result.cached { "cache" } else { "model" };
        out.push_str(&format!("\n[{responder} via {source}]\n"));
    }
    if trace {
        out.push_str("\nSteps:\n");
        for step in &result.steps {
            out.push_str(&format!(
                "  {:>2} {:<14} {}\n",
                step.sequence_index,
                step.module.as_str(),
                step.response
            ));
        }
    }
    out
}
