//! Cached responder outputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::responder::ResponderId;

/// A stored responder answer.
///
/// Entries are immutable after creation apart from `hit_count`. An entry
/// whose `expires_at` has passed is dead and must never be served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Truncated SHA-256 over responder and normalized text.
    pub cache_key: String,
    /// Responder that produced the payload.
    pub responder: ResponderId,
    /// Full SHA-256 of the normalized request text.
    pub prompt_fingerprint: String,
    /// The cached answer.
    pub response: String,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
    /// When the entry stops being served.
    pub expires_at: DateTime<Utc>,
    /// Number of times the entry has been served.
    #[serde(default)]
    pub hit_count: u64,
}

impl CacheEntry {
    /// Whether the entry is dead at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
