//! CLI command implementations for `coteach`.
//!
//! - [`ask`] -- one request through the full engine.
//! - [`route`] -- rule router only.
//! - [`budget`] -- budget status from the ledger.
//! - [`serve`] -- HTTP API.

pub mod ask;
pub mod budget;
pub mod route;
pub mod serve;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use coteach_core::DispatchEngine;
use coteach_core::budget::BudgetTracker;
use coteach_core::budget::ledger::JsonlLedger;
use coteach_core::cache::CacheStore;
use coteach_core::conversation::InMemoryConversationStore;
use coteach_core::gateway::ModelGateway;
use coteach_core::responder::ResponderRegistry;
use coteach_llm::{OpenAiCompatProvider, ProviderConfig};
use coteach_types::config::Config;
use tracing::debug;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "COTEACH_CONFIG";

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "coteach.json";

/// Resolve which config file to read.
///
/// An explicit path wins, then [`CONFIG_ENV`], then [`DEFAULT_CONFIG_FILE`].
pub fn config_path(config_override: Option<&Path>) -> PathBuf {
    if let Some(path) = config_override {
        return path.to_path_buf();
    }
    match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

/// Load configuration from the override or via discovery.
///
/// An explicit `--config` path must exist. A discovered path that does not
/// exist yields the defaults.
pub fn load_config(config_override: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = config_override
        && !path.exists()
    {
        anyhow::bail!("config file not found: {}", path.display());
    }
    let path = config_path(config_override);
    let config = Config::load(&path)
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {e}", path.display()))?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Budget tracker backed by the configured ledger, with spend restored.
pub async fn build_budget(config: &Config) -> anyhow::Result<Arc<BudgetTracker>> {
    let mut tracker = BudgetTracker::new(config.budget.clone());
    if let Some(ref path) = config.budget.ledger_path {
        tracker = tracker.with_ledger(Arc::new(JsonlLedger::new(path)));
    }
    tracker
        .restore()
        .await
        .map_err(|e| anyhow::anyhow!("failed to restore budget ledger: {e}"))?;
    Ok(Arc::new(tracker))
}

/// Wire provider, budget, cache and responders into an engine.
pub async fn build_engine(config: &Config) -> anyhow::Result<DispatchEngine> {
    let provider_config = ProviderConfig::new(
        "llmod",
        config.model.base_url.clone(),
        config.model.api_key_env.clone(),
    )
    .with_timeout_secs(config.model.timeout_secs);
    let provider = Arc::new(OpenAiCompatProvider::new(provider_config));

    let budget = build_budget(config).await?;
    let gateway = ModelGateway::new(provider, budget, config.model.chat_model.clone())
        .with_max_tokens(config.model.max_tokens)
        .with_temperature(config.model.temperature);
    let cache = Arc::new(CacheStore::in_memory(config.cache.clone()));
    let conversations = Arc::new(InMemoryConversationStore::from_config(&config.dispatch));

    Ok(
        DispatchEngine::new(gateway, cache, ResponderRegistry::standard())
            .with_routing_config(config.routing.clone())
            .with_dispatch_config(config.dispatch.clone())
            .with_conversation_store(conversations),
    )
}
