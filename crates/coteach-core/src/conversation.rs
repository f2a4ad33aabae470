//! Short-term conversation memory.
//!
//! The in-memory store is bounded two ways: each session keeps only its
//! newest `max_turns` turns, and sessions with no activity for `idle_ttl`
//! are dropped on the next write.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coteach_types::Result;
use coteach_types::ResponderId;
use coteach_types::config::DispatchConfig;
use coteach_types::request::{ConversationTurn, TurnRole};
use tokio::sync::RwLock;
use tracing::debug;

use crate::clock::{Clock, system_clock};

/// Per-session turn history.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append a turn to the session.
    async fn append(&self, session_id: &str, turn: ConversationTurn) -> Result<()>;

    /// The last `limit` turns of the session, oldest first.
    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>>;
}

/// Responders that answered earlier assistant turns, oldest first, without
/// repeats.
pub fn responders_used(history: &[ConversationTurn]) -> Vec<ResponderId> {
    let mut used = Vec::new();
    for turn in history {
        if turn.role == TurnRole::Assistant
            && let Some(id) = turn.responder
            && !used.contains(&id)
        {
            used.push(id);
        }
    }
    used
}

/// Student of the most recent turn that had one.
pub fn recent_student(history: &[ConversationTurn]) -> Option<String> {
    history
        .iter()
        .rev()
        .find_map(|turn| turn.student_name.clone())
}

// ── In-memory ───────────────────────────────────────────────────────────

struct Session {
    turns: Vec<ConversationTurn>,
    last_active: DateTime<Utc>,
}

/// Sessions held in process memory.
pub struct InMemoryConversationStore {
    sessions: RwLock<HashMap<String, Session>>,
    max_turns: usize,
    idle_ttl: Duration,
    clock: Clock,
}

impl InMemoryConversationStore {
    /// Store keeping 50 turns per session and a day of idleness.
    pub fn new() -> Self {
        Self::from_config(&DispatchConfig::default())
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns: config.max_session_turns.max(1),
            idle_ttl: Duration::from_secs(config.session_idle_secs),
            clock: system_clock(),
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Number of sessions currently held.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn is_idle(&self, session: &Session, now: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(self.idle_ttl)
            .ok()
            .and_then(|ttl| session.last_active.checked_add_signed(ttl))
            .is_some_and(|deadline| deadline <= now)
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append(&self, session_id: &str, turn: ConversationTurn) -> Result<()> {
        let now = (self.clock)();
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|id, session| id == session_id || !self.is_idle(session, now));
        if sessions.len() < before {
            debug!(evicted = before - sessions.len(), "idle conversation sessions dropped");
        }

        let session = sessions.entry(session_id.to_string()).or_insert_with(|| Session {
            turns: Vec::new(),
            last_active: now,
        });
        if self.is_idle(session, now) {
            session.turns.clear();
        }
        session.turns.push(turn);
        session.last_active = now;
        let excess = session.turns.len().saturating_sub(self.max_turns);
        session.turns.drain(..excess);
        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let now = (self.clock)();
        let sessions = self.sessions.read().await;
        let Some(session) = sessions.get(session_id) else {
            return Ok(Vec::new());
        };
        if self.is_idle(session, now) {
            return Ok(Vec::new());
        }
        let start = session.turns.len().saturating_sub(limit);
        Ok(session.turns[start..].to_vec())
    }
}

impl std::fmt::Debug for InMemoryConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryConversationStore")
            .field("max_turns", &self.max_turns)
            .field("idle_ttl", &self.idle_ttl)
            .finish()
    }
}
