//! Step records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::responder::ModuleName;

/// One entry of a request's execution trace.
///
/// `prompt` and `response` are free-form JSON so routing decisions, cache
/// lookups and model calls can all be recorded with their own shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Position in the trace, starting at 0.
    pub sequence_index: usize,
    /// Module the step belongs to.
    pub module: ModuleName,
    /// What was asked.
    pub prompt: serde_json::Value,
    /// What came back, or the error description.
    pub response: serde_json::Value,
    /// When the step started.
    pub timestamp: DateTime<Utc>,
}
