//! Ledger persistence backends.
//!
//! The ledger is append-only. [`LedgerBackend::entries_since`] lets the
//! tracker rebuild the running sum of the current window after a restart.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coteach_types::Result;
use coteach_types::ledger::LedgerEntry;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

/// Durable home for ledger entries.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Append one entry.
    async fn append(&self, entry: &LedgerEntry) -> Result<()>;

    /// Entries with `timestamp >= since` (all entries when `since` is `None`),
    /// in append order.
    async fn entries_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<LedgerEntry>>;
}

// ── In-memory ───────────────────────────────────────────────────────────

/// Ledger held in process memory. Lost on restart.
#[derive(Default)]
pub struct InMemoryLedger {
    entries: RwLock<Vec<LedgerEntry>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerBackend for InMemoryLedger {
    async fn append(&self, entry: &LedgerEntry) -> Result<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn entries_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<LedgerEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| since.is_none_or(|s| e.timestamp >= s))
            .cloned()
            .collect())
    }
}

// ── JSONL file ──────────────────────────────────────────────────────────

/// Append-only newline-delimited JSON file.
///
/// Lines that fail to parse are skipped with a warning on read.
pub struct JsonlLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl LedgerBackend for JsonlLedger {
    async fn append(&self, entry: &LedgerEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        // One writer at a time so concurrent lines never interleave.
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn entries_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<LedgerEntry>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut entries = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<LedgerEntry>(line) {
                Ok(entry) if since.is_none_or(|s| entry.timestamp >= s) => entries.push(entry),
                Ok(_) => {}
                Err(e) => {
                    warn!(line = line_no + 1, error = %e, "skipping invalid ledger line");
                }
            }
        }
        Ok(entries)
    }
}
