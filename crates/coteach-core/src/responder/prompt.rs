use async_trait::async_trait;
use coteach_llm::ChatMessage;
use coteach_types::ResponderId;
use coteach_types::request::TurnRole;

use super::{Responder, ResponderContext, ResponderOutput, prompts};
use crate::cache::CacheTtl;
use crate::error::ResponderError;

/// Generic model-backed responder: system prompt plus context, one call.
#[derive(Debug, Clone)]
pub struct PromptResponder {
    id: ResponderId,
    system_prompt: String,
    /// Answers about a named student are not reused.
    uncacheable_with_student: bool,
    /// No answer is ever reused.
    never_cache: bool,
    cache_ttl: CacheTtl,
}

impl PromptResponder {
    pub fn new(id: ResponderId, system_prompt: impl Into<String>) -> Self {
        Self {
            id,
            system_prompt: system_prompt.into(),
            uncacheable_with_student: false,
            never_cache: false,
            cache_ttl: CacheTtl::Configured,
        }
    }

    /// The built-in configuration for `id`.
    pub fn standard(id: ResponderId) -> Self {
        match id {
            // Profiles change between requests; a reused answer could be stale.
            ResponderId::StudentAgent => Self::new(id, prompts::STUDENT).never_cache(),
            // Generic strategy answers are shared; student-specific ones are not.
            ResponderId::RagAgent => Self::new(id, prompts::STRATEGY).uncacheable_with_student(),
            ResponderId::AdminAgent => Self::new(id, prompts::ADMIN),
            // Briefings hold for the day they were asked.
            ResponderId::PredictAgent => {
                Self::new(id, prompts::PREDICT).with_cache_ttl(CacheTtl::UntilDayEnd)
            }
        }
    }

    pub fn uncacheable_with_student(mut self) -> Self {
        self.uncacheable_with_student = true;
        self
    }

    pub fn never_cache(mut self) -> Self {
        self.never_cache = true;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: CacheTtl) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Whether an answer may be reused, given the student it concerns.
    pub fn is_cacheable(&self, student_name: Option<&str>) -> bool {
        !(self.never_cache || (self.uncacheable_with_student && student_name.is_some()))
    }

    fn messages(&self, text: &str, context: &ResponderContext) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(self.system_prompt.clone())];
        if let Some(name) = &context.student_name {
            messages.push(ChatMessage::system(format!(
                "The request concerns the student {name}."
            )));
        }
        for turn in &context.history {
            messages.push(match turn.role {
                TurnRole::User => ChatMessage::user(turn.content.clone()),
                TurnRole::Assistant => ChatMessage::assistant(turn.content.clone()),
            });
        }
        messages.push(ChatMessage::user(text));
        messages
    }
}

#[async_trait]
impl Responder for PromptResponder {
    fn id(&self) -> ResponderId {
        self.id
    }

    async fn handle(
        &self,
        text: &str,
        context: &ResponderContext,
    ) -> Result<ResponderOutput, ResponderError> {
        let reply = context.model.complete(self.messages(text, context)).await?;
        let output = if self.is_cacheable(context.student_name.as_deref()) {
            ResponderOutput::cacheable(reply.text)
        } else {
            ResponderOutput::uncacheable(reply.text)
        };
        Ok(output.with_ttl(self.cache_ttl))
    }
}
