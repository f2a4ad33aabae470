//! Budget ledger entries and status snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::responder::ResponderId;

/// One recorded model call. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Model that served the call.
    pub model: String,
    /// Prompt-side tokens billed.
    pub prompt_tokens: u32,
    /// Completion-side tokens billed.
    pub completion_tokens: u32,
    /// Cost in USD.
    pub cost_usd: f64,
    /// Responder on whose behalf the call was made. `None` for routing calls.
    #[serde(default)]
    pub responder: Option<ResponderId>,
    /// When the call was settled.
    pub timestamp: DateTime<Utc>,
}

/// Point-in-time view of the budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    /// Spend recorded in the current window.
    pub spent_usd: f64,
    /// Estimates currently held by in-flight calls.
    pub reserved_usd: f64,
    /// Ceiling for the window.
    pub ceiling_usd: f64,
    /// `ceiling - spent - reserved`, floored at zero.
    pub remaining_usd: f64,
    /// Spend as a percentage of the ceiling.
    pub percent_used: f64,
    /// Whether spend has crossed the warning threshold.
    pub warning: bool,
    /// Number of ledger entries in the window.
    pub calls: usize,
    /// Start of the window. `None` for a lifetime window.
    pub window_start: Option<DateTime<Utc>>,
}
