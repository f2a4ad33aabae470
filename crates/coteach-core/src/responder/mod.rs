//! Responders: the specialists a request is dispatched to.
//!
//! The engine only consumes the [`Responder`] contract. Any model call a
//! responder makes goes through the [`MeteredModel`] in its context, so it
//! is budgeted and traced like every other call.

mod prompt;
pub mod prompts;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use coteach_types::ResponderId;
use coteach_types::request::ConversationTurn;

use crate::cache::CacheTtl;
use crate::error::ResponderError;
use crate::gateway::MeteredModel;

pub use prompt::PromptResponder;

/// What a responder gets besides the request text.
#[derive(Debug, Clone)]
pub struct ResponderContext {
    pub session_id: String,
    pub teacher_id: String,
    /// Student the request is about: named in it, or carried over from the
    /// most recent turn that named one.
    pub student_name: Option<String>,
    /// Recent turns of the session, oldest first.
    pub history: Vec<ConversationTurn>,
    /// Model access, bound to this responder's trace module.
    pub model: MeteredModel,
}

/// A responder's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponderOutput {
    pub text: String,
    /// False when the answer must not be reused, e.g. because it depends on
    /// data that changes between requests.
    pub cacheable: bool,
    /// Lifetime of the cached answer.
    pub ttl: CacheTtl,
}

impl ResponderOutput {
    pub fn cacheable(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cacheable: true,
            ttl: CacheTtl::Configured,
        }
    }

    pub fn uncacheable(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cacheable: false,
            ttl: CacheTtl::Configured,
        }
    }

    pub fn with_ttl(mut self, ttl: CacheTtl) -> Self {
        self.ttl = ttl;
        self
    }
}

#[async_trait]
pub trait Responder: Send + Sync {
    fn id(&self) -> ResponderId;

    async fn handle(
        &self,
        text: &str,
        context: &ResponderContext,
    ) -> Result<ResponderOutput, ResponderError>;
}

/// Responders by id.
#[derive(Clone, Default)]
pub struct ResponderRegistry {
    responders: HashMap<ResponderId, Arc<dyn Responder>>,
}

impl ResponderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four prompt-backed responders.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for id in ResponderId::ALL {
            registry.register(Arc::new(PromptResponder::standard(id)));
        }
        registry
    }

    /// Register `responder` under its own id, replacing any previous one.
    pub fn register(&mut self, responder: Arc<dyn Responder>) {
        self.responders.insert(responder.id(), responder);
    }

    pub fn with(mut self, responder: Arc<dyn Responder>) -> Self {
        self.register(responder);
        self
    }

    /// # Errors
    ///
    /// [`ResponderError::Unavailable`] when nothing is registered for `id`.
    pub fn get(&self, id: ResponderId) -> Result<Arc<dyn Responder>, ResponderError> {
        self.responders
            .get(&id)
            .cloned()
            .ok_or(ResponderError::Unavailable(id))
    }

    pub fn len(&self) -> usize {
        self.responders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responders.is_empty()
    }
}

impl std::fmt::Debug for ResponderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&str> = self.responders.keys().map(|id| id.as_str()).collect();
        ids.sort_unstable();
        f.debug_struct("ResponderRegistry")
            .field("responders", &ids)
            .finish()
    }
}
