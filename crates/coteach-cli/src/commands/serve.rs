//! `coteach serve` -- HTTP API over the dispatch engine.

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use coteach_services::{ApiState, build_router, serve};
use tracing::info;

use super::{build_engine, load_config};

/// Arguments for the `coteach serve` subcommand.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on. Defaults to `server.bind` from the config.
    #[arg(short, long)]
    pub bind: Option<String>,
}

/// Run the server until Ctrl+C.
pub async fn run(args: ServeArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let engine = Arc::new(build_engine(&config).await?);
    let router = build_router(ApiState::new(engine), &config.server.cors_origins);

    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    info!(model = %config.model.chat_model, "starting coteach API");
    serve(router, &bind, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    })
    .await?;
    Ok(())
}
