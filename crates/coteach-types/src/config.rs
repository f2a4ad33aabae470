//! Configuration schema types.
//!
//! All structs accept both `snake_case` and `camelCase` field names in JSON
//! via `#[serde(alias)]`. Unknown fields are silently ignored for forward
//! compatibility, and every field has a default so an empty document (or a
//! missing file) yields a working configuration.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoteachError, Result};
use crate::responder::ResponderId;

fn default_true() -> bool {
    true
}

// ── Root config ──────────────────────────────────────────────────────────

/// Root configuration for the dispatch engine and its surfaces.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Model provider settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Rule router and fallback classifier settings.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Spending ceiling and rate table.
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Dispatch loop settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields [`Config::default`]. The loaded document is
    /// validated before it is returned.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.routing.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(invalid(format!(
                "routing.confidence_threshold must be within [0, 1], got {threshold}"
            )));
        }
        if self.dispatch.max_session_turns < self.dispatch.history_limit {
            return Err(invalid(
                "dispatch.max_session_turns must be at least dispatch.history_limit",
            ));
        }
        if self.budget.ceiling_usd <= 0.0 {
            return Err(invalid("budget.ceiling_usd must be positive"));
        }
        if self.budget.warning_threshold_usd > self.budget.ceiling_usd {
            return Err(invalid(
                "budget.warning_threshold_usd must not exceed budget.ceiling_usd",
            ));
        }
        match self.budget.window {
            BudgetWindow::Daily { reset_hour_utc } if reset_hour_utc > 23 => {
                return Err(invalid("budget.window.reset_hour_utc must be 0-23"));
            }
            BudgetWindow::Rolling { hours: 0 } => {
                return Err(invalid("budget.window.hours must be at least 1"));
            }
            _ => {}
        }
        if self.model.timeout_secs == 0
            || self.routing.fallback_timeout_secs == 0
            || self.dispatch.responder_timeout_secs == 0
            || self.dispatch.store_timeout_ms == 0
            || self.cache.store_timeout_ms == 0
            || self.budget.ledger_timeout_ms == 0
        {
            return Err(invalid("timeouts must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> CoteachError {
    CoteachError::ConfigInvalid {
        reason: reason.into(),
    }
}

// ── Model ────────────────────────────────────────────────────────────────

/// OpenAI-compatible model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the chat-completions API.
    #[serde(default = "default_base_url", alias = "baseUrl")]
    pub base_url: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env", alias = "apiKeyEnv")]
    pub api_key_env: String,

    /// Model used by responders and the fallback classifier.
    #[serde(default = "default_chat_model", alias = "chatModel")]
    pub chat_model: String,

    /// Per-request HTTP timeout.
    #[serde(default = "default_model_timeout", alias = "timeoutSecs")]
    pub timeout_secs: u64,

    /// Completion token cap for responder calls.
    #[serde(default = "default_max_tokens", alias = "maxTokens")]
    pub max_tokens: u32,

    /// Sampling temperature for responder calls. Single-word names read the
    /// same in both cases, so no alias is needed.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_base_url() -> String {
    "https://api.llmod.ai/v1".into()
}
fn default_api_key_env() -> String {
    "COTEACH_API_KEY".into()
}
fn default_chat_model() -> String {
    "gpt-5-mini".into()
}
fn default_model_timeout() -> u64 {
    60
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_temperature() -> f64 {
    0.7
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            chat_model: default_chat_model(),
            timeout_secs: default_model_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

// ── Routing ──────────────────────────────────────────────────────────────

/// Rule router and fallback classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Rule decisions below this confidence go to the fallback classifier.
    #[serde(default = "default_threshold", alias = "confidenceThreshold")]
    pub confidence_threshold: f64,

    /// Responder used when routing cannot be resolved.
    #[serde(default = "default_responder", alias = "defaultResponder")]
    pub default_responder: ResponderId,

    /// Completion token cap for the classification call.
    #[serde(default = "default_fallback_max_tokens", alias = "fallbackMaxTokens")]
    pub fallback_max_tokens: u32,

    /// Sampling temperature for the classification call.
    #[serde(default = "default_fallback_temperature", alias = "fallbackTemperature")]
    pub fallback_temperature: f64,

    /// Deadline for the classification call.
    #[serde(default = "default_fallback_timeout", alias = "fallbackTimeoutSecs")]
    pub fallback_timeout_secs: u64,

    /// When false, low-confidence requests go straight to the default responder.
    #[serde(default = "default_true", alias = "enableFallback")]
    pub enable_fallback: bool,
}

fn default_threshold() -> f64 {
    0.7
}
fn default_responder() -> ResponderId {
    ResponderId::RagAgent
}
fn default_fallback_max_tokens() -> u32 {
    200
}
fn default_fallback_temperature() -> f64 {
    0.3
}
fn default_fallback_timeout() -> u64 {
    20
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_threshold(),
            default_responder: default_responder(),
            fallback_max_tokens: default_fallback_max_tokens(),
            fallback_temperature: default_fallback_temperature(),
            fallback_timeout_secs: default_fallback_timeout(),
            enable_fallback: true,
        }
    }
}

// ── Cache ────────────────────────────────────────────────────────────────

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL applied when a responder has no override.
    #[serde(default = "default_ttl", alias = "defaultTtlSecs")]
    pub default_ttl_secs: u64,

    /// Per-responder TTLs keyed by wire name (e.g. `"ADMIN_AGENT"`).
    #[serde(default, alias = "ttlOverrides")]
    pub ttl_overrides: HashMap<String, u64>,

    /// Deadline for a single backend read or write.
    #[serde(default = "default_store_timeout", alias = "storeTimeoutMs")]
    pub store_timeout_ms: u64,
}

fn default_ttl() -> u64 {
    24 * 60 * 60
}
fn default_store_timeout() -> u64 {
    2000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl(),
            ttl_overrides: HashMap::new(),
            store_timeout_ms: default_store_timeout(),
        }
    }
}

impl CacheConfig {
    /// TTL in seconds for the given responder.
    pub fn ttl_secs_for(&self, responder: ResponderId) -> u64 {
        self.ttl_overrides
            .get(responder.as_str())
            .copied()
            .unwrap_or(self.default_ttl_secs)
    }
}

// ── Budget ───────────────────────────────────────────────────────────────

/// Per-1K-token prices for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRate {
    /// USD per 1,000 prompt tokens.
    #[serde(alias = "promptPer1k")]
    pub prompt_per_1k: f64,

    /// USD per 1,000 completion tokens.
    #[serde(alias = "completionPer1k")]
    pub completion_per_1k: f64,
}

impl ModelRate {
    /// Cost in USD for the given token counts.
    pub fn cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 / 1000.0) * self.prompt_per_1k
            + (completion_tokens as f64 / 1000.0) * self.completion_per_1k
    }
}

impl Default for ModelRate {
    fn default() -> Self {
        Self {
            prompt_per_1k: 0.00015,
            completion_per_1k: 0.0006,
        }
    }
}

/// The period over which spend is summed against the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BudgetWindow {
    /// Every ledger entry since inception counts.
    #[default]
    Lifetime,
    /// Calendar day that starts at the given UTC hour.
    Daily {
        /// Hour (0-23, UTC) at which the day rolls over.
        #[serde(default, alias = "resetHourUtc")]
        reset_hour_utc: u32,
    },
    /// Sliding window of the given length ending now.
    Rolling {
        /// Window length in hours.
        hours: u32,
    },
}

impl BudgetWindow {
    /// Start of the window containing `now`, or `None` for [`BudgetWindow::Lifetime`].
    pub fn start_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            BudgetWindow::Lifetime => None,
            BudgetWindow::Daily { reset_hour_utc } => {
                let hour = reset_hour_utc.min(23);
                let today = now.date_naive().and_hms_opt(hour, 0, 0)?;
                let today = Utc.from_utc_datetime(&today);
                if today <= now {
                    Some(today)
                } else {
                    Some(today - Duration::days(1))
                }
            }
            BudgetWindow::Rolling { hours } => Some(now - Duration::hours(i64::from(hours))),
        }
    }
}

/// Spending ceiling and cost table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Hard ceiling in USD for the current window.
    #[serde(default = "default_ceiling", alias = "ceilingUsd")]
    pub ceiling_usd: f64,

    /// Spend at which a warning is logged once per window.
    #[serde(default = "default_warning", alias = "warningThresholdUsd")]
    pub warning_threshold_usd: f64,

    /// Accounting window.
    #[serde(default)]
    pub window: BudgetWindow,

    /// Per-model rates keyed by model name.
    #[serde(default)]
    pub rates: HashMap<String, ModelRate>,

    /// Rate used for models missing from `rates`.
    #[serde(default, alias = "defaultRate")]
    pub default_rate: ModelRate,

    /// Append-only JSONL ledger file. In-memory when unset.
    #[serde(default, alias = "ledgerPath")]
    pub ledger_path: Option<String>,

    /// Deadline for one ledger append or replay.
    #[serde(default = "default_ledger_timeout", alias = "ledgerTimeoutMs")]
    pub ledger_timeout_ms: u64,
}

fn default_ceiling() -> f64 {
    13.0
}
fn default_warning() -> f64 {
    10.0
}
fn default_ledger_timeout() -> u64 {
    2000
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            ceiling_usd: default_ceiling(),
            warning_threshold_usd: default_warning(),
            window: BudgetWindow::default(),
            rates: HashMap::new(),
            default_rate: ModelRate::default(),
            ledger_path: None,
            ledger_timeout_ms: default_ledger_timeout(),
        }
    }
}

impl BudgetConfig {
    /// Rate for `model`, falling back to [`BudgetConfig::default_rate`].
    pub fn rate_for(&self, model: &str) -> ModelRate {
        self.rates.get(model).copied().unwrap_or(self.default_rate)
    }
}

// ── Dispatch / server ────────────────────────────────────────────────────

/// Dispatch loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Deadline for one responder invocation.
    #[serde(default = "default_responder_timeout", alias = "responderTimeoutSecs")]
    pub responder_timeout_secs: u64,

    /// Number of recent conversation turns handed to responders.
    #[serde(default = "default_history_limit", alias = "historyLimit")]
    pub history_limit: usize,

    /// Turns kept per session by the in-memory conversation store.
    #[serde(default = "default_max_session_turns", alias = "maxSessionTurns")]
    pub max_session_turns: usize,

    /// Sessions idle for longer than this are dropped from memory.
    #[serde(default = "default_session_idle", alias = "sessionIdleSecs")]
    pub session_idle_secs: u64,

    /// Deadline for one conversation store read or write.
    #[serde(default = "default_conversation_timeout", alias = "storeTimeoutMs")]
    pub store_timeout_ms: u64,
}

fn default_responder_timeout() -> u64 {
    90
}
fn default_history_limit() -> usize {
    6
}
fn default_max_session_turns() -> usize {
    50
}
fn default_session_idle() -> u64 {
    24 * 60 * 60
}
fn default_conversation_timeout() -> u64 {
    2000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            responder_timeout_secs: default_responder_timeout(),
            history_limit: default_history_limit(),
            max_session_turns: default_max_session_turns(),
            session_idle_secs: default_session_idle(),
            store_timeout_ms: default_conversation_timeout(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Allowed CORS origins. Empty means permissive.
    #[serde(default, alias = "corsOrigins")]
    pub cors_origins: Vec<String>,
}

fn default_bind() -> String {
    "127.0.0.1:8000".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.model.chat_model, "gpt-5-mini");
        assert_eq!(cfg.routing.confidence_threshold, 0.7);
        assert_eq!(cfg.routing.default_responder, ResponderId::RagAgent);
        assert_eq!(cfg.cache.default_ttl_secs, 86_400);
        assert_eq!(cfg.budget.ceiling_usd, 13.0);
        assert_eq!(cfg.budget.window, BudgetWindow::Lifetime);
        assert_eq!(cfg.dispatch.history_limit, 6);
        assert_eq!(cfg.dispatch.max_session_turns, 50);
        assert_eq!(cfg.dispatch.store_timeout_ms, 2000);
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
        cfg.validate().unwrap();
    }

    #[test]
    fn camel_case_aliases() {
        let json = r#"{
            "routing": {"confidenceThreshold": 0.5, "defaultResponder": "STUDENT_AGENT"},
            "model": {"chatModel": "tiny", "maxTokens": 300, "temperature": 0.2},
            "budget": {"ceilingUsd": 2.5, "warningThresholdUsd": 2.0,
                       "ledgerTimeoutMs": 500,
                       "window": {"kind": "daily", "resetHourUtc": 6}},
            "unknownSection": {"ignored": true}
        }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.routing.confidence_threshold, 0.5);
        assert_eq!(cfg.routing.default_responder, ResponderId::StudentAgent);
        assert_eq!(cfg.budget.ceiling_usd, 2.5);
        assert_eq!(cfg.budget.ledger_timeout_ms, 500);
        assert_eq!(cfg.model.max_tokens, 300);
        assert_eq!(cfg.model.temperature, 0.2);
        assert_eq!(
            cfg.budget.window,
            BudgetWindow::Daily { reset_hour_utc: 6 }
        );
    }

    #[test]
    fn ttl_overrides_apply_per_responder() {
        let cfg: CacheConfig =
            serde_json::from_str(r#"{"ttlOverrides": {"ADMIN_AGENT": 3600}}"#).unwrap();
        assert_eq!(cfg.ttl_secs_for(ResponderId::AdminAgent), 3600);
        assert_eq!(cfg.ttl_secs_for(ResponderId::RagAgent), 86_400);
        assert!(CacheConfig::default().ttl_overrides.is_empty());
    }

    #[test]
    fn rate_lookup_falls_back_to_default() {
        let mut cfg = BudgetConfig::default();
        cfg.rates.insert(
            "big-model".into(),
            ModelRate {
                prompt_per_1k: 0.01,
                completion_per_1k: 0.03,
            },
        );
        assert_eq!(cfg.rate_for("big-model").prompt_per_1k, 0.01);
        assert_eq!(cfg.rate_for("gpt-5-mini"), ModelRate::default());
    }

    #[test]
    fn rate_cost_sums_both_sides() {
        let rate = ModelRate::default();
        let cost = rate.cost(1000, 1000);
        assert!((cost - 0.00075).abs() < 1e-12);
    }

    #[test]
    fn daily_window_before_reset_hour_uses_previous_day() {
        let window = BudgetWindow::Daily { reset_hour_utc: 6 };
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 4, 0, 0).unwrap();
        let start = window.start_at(now).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 9, 6, 0, 0).unwrap());

        let later = Utc.with_ymd_and_hms(2026, 3, 10, 7, 30, 0).unwrap();
        assert_eq!(
            window.start_at(later).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn rolling_and_lifetime_windows() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(BudgetWindow::Lifetime.start_at(now), None);
        assert_eq!(
            BudgetWindow::Rolling { hours: 24 }.start_at(now).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn validate_rejects_bad_threshold_and_warning() {
        let mut cfg = Config::default();
        cfg.routing.confidence_threshold = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(CoteachError::ConfigInvalid { .. })
        ));

        let mut cfg = Config::default();
        cfg.budget.warning_threshold_usd = 20.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.budget.window = BudgetWindow::Rolling { hours: 0 };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(cfg.budget.ceiling_usd, 13.0);
    }

    #[test]
    fn load_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coteach.json");
        std::fs::write(&path, r#"{"model": {"chatModel": "tiny"}}"#).unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.model.chat_model, "tiny");

        std::fs::write(&path, r#"{"budget": {"ceiling_usd": -1}}"#).unwrap();
        assert!(Config::load(&path).is_err());

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load(&path), Err(CoteachError::Json(_))));
    }
}
