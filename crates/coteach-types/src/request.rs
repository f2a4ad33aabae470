//! Inbound requests, conversation turns and dispatch results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::responder::ResponderId;
use crate::trace::StepRecord;

/// A teacher's request. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// The request text as typed.
    pub text: String,
    /// Conversation the request belongs to.
    pub session_id: String,
    /// Teacher issuing the request.
    pub teacher_id: String,
    /// Arrival time.
    pub received_at: DateTime<Utc>,
}

impl Request {
    /// Create a request stamped with the current time.
    pub fn new(
        text: impl Into<String>,
        session_id: impl Into<String>,
        teacher_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            session_id: session_id.into(),
            teacher_id: teacher_id.into(),
            received_at: Utc::now(),
        }
    }
}

/// Who spoke a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One message of a session's short-term history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    /// Responder that produced an assistant turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responder: Option<ResponderId>,
    /// Student the turn was about, when one was named or carried over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            responder: None,
            student_name: None,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, responder: ResponderId) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            responder: Some(responder),
            student_name: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_student_name(mut self, name: Option<String>) -> Self {
        self.student_name = name;
        self
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Ok,
    Error,
}

/// Terminal artifact of one request. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    /// `ok` or `error`.
    pub status: DispatchStatus,
    /// Safe user-facing message when `status` is `error`.
    pub error: Option<String>,
    /// Answer text. Empty on error.
    pub response: String,
    /// Ordered execution trace.
    pub steps: Vec<StepRecord>,
    /// Responder that answered, if routing got that far.
    #[serde(default)]
    pub responder: Option<ResponderId>,
    /// Whether the answer came from the cache.
    #[serde(default)]
    pub cached: bool,
}

impl DispatchResult {
    /// Successful result.
    pub fn ok(
        response: impl Into<String>,
        responder: ResponderId,
        cached: bool,
        steps: Vec<StepRecord>,
    ) -> Self {
        Self {
            status: DispatchStatus::Ok,
            error: None,
            response: response.into(),
            steps,
            responder: Some(responder),
            cached,
        }
    }

    /// Failed result carrying the trace collected so far.
    pub fn error(
        message: impl Into<String>,
        responder: Option<ResponderId>,
        steps: Vec<StepRecord>,
    ) -> Self {
        Self {
            status: DispatchStatus::Error,
            error: Some(message.into()),
            response: String::new(),
            steps,
            responder,
            cached: false,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == DispatchStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_result_shape() {
        let result = DispatchResult::ok("hello", ResponderId::RagAgent, true, Vec::new());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["error"].is_null());
        assert_eq!(json["response"], "hello");
        assert_eq!(json["responder"], "RAG_AGENT");
        assert_eq!(json["cached"], true);
        assert!(json["steps"].as_array().unwrap().is_empty());
    }

    #[test]
    fn error_result_shape() {
        let result = DispatchResult::error("Query cannot be empty", None, Vec::new());
        assert!(!result.is_ok());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "Query cannot be empty");
        assert_eq!(json["response"], "");
    }

    #[test]
    fn turn_constructors() {
        let user = ConversationTurn::user("hi");
        assert_eq!(user.role, TurnRole::User);
        assert!(user.responder.is_none());
        let bot = ConversationTurn::assistant("hello", ResponderId::PredictAgent);
        assert_eq!(bot.responder, Some(ResponderId::PredictAgent));
        let json = serde_json::to_value(&bot).unwrap();
        assert_eq!(json["role"], "assistant");
        assert!(json.get("student_name").is_none());

        let about = bot.with_student_name(Some("Maya".into()));
        let back: ConversationTurn =
            serde_json::from_value(serde_json::to_value(&about).unwrap()).unwrap();
        assert_eq!(back.student_name.as_deref(), Some("Maya"));
    }
}
