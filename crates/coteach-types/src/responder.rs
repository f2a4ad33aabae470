//! Responder and trace-module identifiers.
//!
//! [`ResponderId`] names the four specialized handlers a request can be
//! dispatched to. [`ModuleName`] adds the orchestrator itself and is the
//! label used on every step record. Both serialize as `SCREAMING_SNAKE_CASE`
//! strings (e.g. `"STUDENT_AGENT"`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A specialized responder that can answer a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponderId {
    /// Student-profile lookup (triggers, history, what works).
    StudentAgent,
    /// Teaching-strategy retrieval.
    RagAgent,
    /// Document generation (reports, parent emails, summaries).
    AdminAgent,
    /// Daily-risk prediction and briefings.
    PredictAgent,
}

impl ResponderId {
    /// Every responder, in declaration order.
    pub const ALL: [ResponderId; 4] = [
        ResponderId::StudentAgent,
        ResponderId::RagAgent,
        ResponderId::AdminAgent,
        ResponderId::PredictAgent,
    ];

    /// Wire name of the responder.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponderId::StudentAgent => "STUDENT_AGENT",
            ResponderId::RagAgent => "RAG_AGENT",
            ResponderId::AdminAgent => "ADMIN_AGENT",
            ResponderId::PredictAgent => "PREDICT_AGENT",
        }
    }
}

impl fmt::Display for ResponderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownResponder(pub String);

impl fmt::Display for UnknownResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown responder: {}", self.0)
    }
}

impl std::error::Error for UnknownResponder {}

impl FromStr for ResponderId {
    type Err = UnknownResponder;

    /// Parses the wire name, case-insensitively and ignoring surrounding
    /// whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        ResponderId::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| UnknownResponder(s.to_string()))
    }
}

/// The module a step record is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleName {
    /// The dispatch engine itself (routing, cache decisions).
    Orchestrator,
    /// See [`ResponderId::StudentAgent`].
    StudentAgent,
    /// See [`ResponderId::RagAgent`].
    RagAgent,
    /// See [`ResponderId::AdminAgent`].
    AdminAgent,
    /// See [`ResponderId::PredictAgent`].
    PredictAgent,
}

impl ModuleName {
    /// Wire name of the module.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleName::Orchestrator => "ORCHESTRATOR",
            ModuleName::StudentAgent => "STUDENT_AGENT",
            ModuleName::RagAgent => "RAG_AGENT",
            ModuleName::AdminAgent => "ADMIN_AGENT",
            ModuleName::PredictAgent => "PREDICT_AGENT",
        }
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ResponderId> for ModuleName {
    fn from(id: ResponderId) -> Self {
        match id {
            ResponderId::StudentAgent => ModuleName::StudentAgent,
            ResponderId::RagAgent => ModuleName::RagAgent,
            ResponderId::AdminAgent => ModuleName::AdminAgent,
            ResponderId::PredictAgent => ModuleName::PredictAgent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("rag_agent".parse::<ResponderId>().unwrap(), ResponderId::RagAgent);
        assert_eq!(
            "  STUDENT_AGENT ".parse::<ResponderId>().unwrap(),
            ResponderId::StudentAgent
        );
    }

    #[test]
    fn parse_rejects_orchestrator_and_garbage() {
        assert!("ORCHESTRATOR".parse::<ResponderId>().is_err());
        let err = "TEACHER_AGENT".parse::<ResponderId>().unwrap_err();
        assert_eq!(err.to_string(), "unknown responder: TEACHER_AGENT");
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&ResponderId::PredictAgent).unwrap();
        assert_eq!(json, "\"PREDICT_AGENT\"");
        let module: ModuleName = serde_json::from_str("\"ORCHESTRATOR\"").unwrap();
        assert_eq!(module, ModuleName::Orchestrator);
    }

    #[test]
    fn module_from_responder() {
        for id in ResponderId::ALL {
            assert_eq!(ModuleName::from(id).as_str(), id.as_str());
        }
    }
}
