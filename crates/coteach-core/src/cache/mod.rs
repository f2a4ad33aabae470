//! Content-addressed response cache.
//!
//! Entries are keyed by responder and normalized request text, so two
//! requests that differ only in case or whitespace share an answer across
//! sessions. Expiry is checked at read time; a dead entry is never served
//! even if it has not been purged yet.
//!
//! The backend is a capability ([`CacheBackend`]). Every backend call
//! carries a deadline. Backend failures, timeouts and undecodable entries
//! on read are reported as a miss.
//!
//! The store holds no lock of its own. The hit counter is bumped through
//! [`CacheBackend::update`], so reads of different keys proceed in
//! parallel and concurrent hits on one key are each counted.

pub mod backend;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use coteach_types::ResponderId;
use coteach_types::cache::CacheEntry;
use coteach_types::config::{BudgetWindow, CacheConfig};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::clock::{Clock, system_clock};
use crate::error::CacheError;
pub use backend::{CacheBackend, InMemoryCacheBackend};

/// Length of the truncated hex cache key.
const CACHE_KEY_LEN: usize = 32;

/// Lower-case, trim and collapse internal whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic key over responder and normalized text.
pub fn cache_key(responder: ResponderId, text: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", responder.as_str(), normalize(text)).as_bytes());
    let mut hex = to_hex(&digest);
    hex.truncate(CACHE_KEY_LEN);
    hex
}

/// Full SHA-256 hex of the normalized text.
pub fn fingerprint(text: &str) -> String {
    to_hex(&Sha256::digest(normalize(text).as_bytes()))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// How long a stored answer stays live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheTtl {
    /// The responder's configured TTL.
    #[default]
    Configured,
    /// A fixed lifetime.
    For(Duration),
    /// Until the next UTC midnight, for answers tied to the day they were
    /// asked.
    UntilDayEnd,
}

impl CacheTtl {
    fn expires_at(self, now: DateTime<Utc>, configured: Duration) -> DateTime<Utc> {
        match self {
            CacheTtl::Configured => expiry(now, configured),
            CacheTtl::For(ttl) => expiry(now, ttl),
            CacheTtl::UntilDayEnd => BudgetWindow::Daily { reset_hour_utc: 0 }
                .start_at(now)
                .and_then(|today| today.checked_add_signed(chrono::Duration::days(1)))
                .unwrap_or_else(|| expiry(now, configured)),
        }
    }
}

/// Outcome of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// A live entry. Its `hit_count` already includes this read.
    Hit(CacheEntry),
    /// Nothing stored under the key.
    Miss,
    /// An entry exists but its expiry has passed.
    Expired,
    /// The stored payload could not be decoded.
    Corrupt(String),
    /// The backend failed or timed out.
    Unavailable(String),
}

impl CacheLookup {
    /// The entry on a hit.
    pub fn entry(self) -> Option<CacheEntry> {
        match self {
            CacheLookup::Hit(entry) => Some(entry),
            _ => None,
        }
    }

    /// Short label for traces and logs.
    pub fn label(&self) -> &'static str {
        match self {
            CacheLookup::Hit(_) => "hit",
            CacheLookup::Miss => "miss",
            CacheLookup::Expired => "expired",
            CacheLookup::Corrupt(_) => "corrupt",
            CacheLookup::Unavailable(_) => "unavailable",
        }
    }
}

/// Shared response cache.
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
    clock: Clock,
    timeout: Duration,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        let timeout = Duration::from_millis(config.store_timeout_ms);
        Self {
            backend,
            config,
            clock: system_clock(),
            timeout,
        }
    }

    /// Store over a fresh in-memory backend.
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(Arc::new(InMemoryCacheBackend::new()), config)
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// TTL for answers produced by `responder`.
    pub fn ttl_for(&self, responder: ResponderId) -> Duration {
        Duration::from_secs(self.config.ttl_secs_for(responder))
    }

    /// Read the entry for `(responder, text)` and count the hit.
    pub async fn lookup(&self, responder: ResponderId, text: &str) -> CacheLookup {
        let key = cache_key(responder, text);
        let now = (self.clock)();
        let count_hit = move |raw: &str| {
            let mut entry = serde_json::from_str::<CacheEntry>(raw).ok()?;
            if entry.is_expired(now) {
                return None;
            }
            entry.hit_count += 1;
            serde_json::to_string(&entry).ok()
        };

        let raw = match self.with_deadline(self.backend.update(&key, &count_hit)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(responder = %responder, key = %key, "cache miss");
                return CacheLookup::Miss;
            }
            Err(e) => {
                warn!(responder = %responder, error = %e, "cache read failed, treating as miss");
                return CacheLookup::Unavailable(e.to_string());
            }
        };

        let entry = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(responder = %responder, key = %key, error = %e, "corrupt cache entry");
                return CacheLookup::Corrupt(e.to_string());
            }
        };

        if entry.is_expired(now) {
            debug!(responder = %responder, key = %key, "cache entry expired");
            return CacheLookup::Expired;
        }

        debug!(responder = %responder, key = %key, hits = entry.hit_count, "cache hit");
        CacheLookup::Hit(entry)
    }

    /// The live entry for `(responder, text)`, if any.
    pub async fn get(&self, responder: ResponderId, text: &str) -> Option<CacheEntry> {
        self.lookup(responder, text).await.entry()
    }

    /// Store `response` for `(responder, text)`.
    ///
    /// Overwrites any previous entry and restarts its expiry.
    pub async fn put(
        &self,
        responder: ResponderId,
        text: &str,
        response: &str,
        ttl: CacheTtl,
    ) -> Result<CacheEntry, CacheError> {
        let now = (self.clock)();
        let entry = CacheEntry {
            cache_key: cache_key(responder, text),
            responder,
            prompt_fingerprint: fingerprint(text),
            response: response.to_string(),
            created_at: now,
            expires_at: ttl.expires_at(now, self.ttl_for(responder)),
            hit_count: 0,
        };
        let payload =
            serde_json::to_string(&entry).map_err(|e| CacheError::Backend(e.to_string()))?;

        self.with_deadline(self.backend.store(&entry.cache_key, payload))
            .await?;
        debug!(
            responder = %responder,
            key = %entry.cache_key,
            expires_at = %entry.expires_at,
            "cache entry written"
        );
        Ok(entry)
    }

    /// Drop the entry for `(responder, text)`. Returns whether one existed.
    pub async fn invalidate(&self, responder: ResponderId, text: &str) -> Result<bool, CacheError> {
        let key = cache_key(responder, text);
        self.with_deadline(self.backend.remove(&key)).await
    }

    /// Physically delete expired and undecodable entries. Returns how many
    /// were removed.
    pub async fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = (self.clock)();
        let keys = self.with_deadline(self.backend.keys()).await?;

        let mut removed = 0;
        for key in keys {
            let Some(raw) = self.with_deadline(self.backend.load(&key)).await? else {
                continue;
            };
            let dead = serde_json::from_str::<CacheEntry>(&raw)
                .map(|entry| entry.is_expired(now))
                .unwrap_or(true);
            if dead && self.with_deadline(self.backend.remove(&key)).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "purged expired cache entries");
        }
        Ok(removed)
    }

    async fn with_deadline<T>(
        &self,
        op: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("default_ttl_secs", &self.config.default_ttl_secs)
            .field("timeout", &self.timeout)
            .finish()
    }
}
