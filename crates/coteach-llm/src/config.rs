//! Provider connection settings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How to reach one OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Human-readable provider name used in logs.
    pub name: String,

    /// Base URL of the API (e.g. "https://api.llmod.ai/v1").
    pub base_url: String,

    /// Environment variable that holds the API key.
    pub api_key_env: String,

    /// Extra HTTP headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Per-request timeout in seconds. Defaults to 60.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    /// Config with no extra headers and the default timeout.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key_env: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key_env: api_key_env.into(),
            headers: HashMap::new(),
            timeout_secs: None,
        }
    }

    /// Override the request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Effective timeout in seconds.
    pub fn timeout(&self) -> u64 {
        self.timeout_secs.unwrap_or(60)
    }
}
