//! Routing decisions.
//!
//! One [`RoutingDecision`] is produced per request, first by the rule router
//! and, when that is not confident enough, by the fallback classifier.

use serde::{Deserialize, Serialize};

use crate::responder::ResponderId;

/// How a routing decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMethod {
    /// Deterministic pattern rule, no model call.
    Rule,
    /// Model-backed classification (or the default substituted for it).
    Model,
}

/// The responder chosen for a request and how sure the router is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Chosen responder. `None` when no rule matched.
    pub responder: Option<ResponderId>,
    /// Certainty in `[0, 1]`.
    pub confidence: f64,
    /// Rule or model.
    pub method: RoutingMethod,
    /// Label of the rule that fired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
    /// Student named in the request, title-cased.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
}

impl RoutingDecision {
    /// Decision for text that matched no rule.
    pub fn unresolved() -> Self {
        Self {
            responder: None,
            confidence: 0.0,
            method: RoutingMethod::Rule,
            matched_pattern: None,
            student_name: None,
        }
    }

    /// Decision produced by a pattern rule.
    pub fn rule(responder: ResponderId, confidence: f64, pattern: impl Into<String>) -> Self {
        Self {
            responder: Some(responder),
            confidence: confidence.clamp(0.0, 1.0),
            method: RoutingMethod::Rule,
            matched_pattern: Some(pattern.into()),
            student_name: None,
        }
    }

    /// Decision produced by the fallback classifier.
    pub fn model(responder: ResponderId, confidence: f64) -> Self {
        Self {
            responder: Some(responder),
            confidence: confidence.clamp(0.0, 1.0),
            method: RoutingMethod::Model,
            matched_pattern: None,
            student_name: None,
        }
    }

    /// The configured default responder, substituted with confidence 0 when
    /// classification failed.
    pub fn substitute(responder: ResponderId) -> Self {
        Self {
            responder: Some(responder),
            confidence: 0.0,
            method: RoutingMethod::Model,
            matched_pattern: Some("default".into()),
            student_name: None,
        }
    }

    /// Attach an extracted student name.
    pub fn with_student_name(mut self, name: Option<String>) -> Self {
        self.student_name = name;
        self
    }

    /// Human-readable explanation of the decision.
    pub fn explain(&self) -> String {
        let target = self
            .responder
            .map(|r| r.as_str().to_string())
            .unwrap_or_else(|| "no responder".into());
        let mut out = match self.method {
            RoutingMethod::Rule => format!(
                "rule-based: {target} (confidence {:.2})",
                self.confidence
            ),
            RoutingMethod::Model => format!(
                "model-based: {target} (confidence {:.2})",
                self.confidence
            ),
        };
        if let Some(pattern) = &self.matched_pattern {
            out.push_str(&format!(", matched {pattern}"));
        }
        if let Some(name) = &self.student_name {
            out.push_str(&format!(", student {name}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_has_zero_confidence() {
        let d = RoutingDecision::unresolved();
        assert!(d.responder.is_none());
        assert_eq!(d.confidence, 0.0);
        assert_eq!(d.explain(), "rule-based: no responder (confidence 0.00)");
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(RoutingDecision::model(ResponderId::AdminAgent, 1.7).confidence, 1.0);
        assert_eq!(RoutingDecision::model(ResponderId::AdminAgent, -0.2).confidence, 0.0);
    }

    #[test]
    fn explain_includes_pattern_and_student() {
        let d = RoutingDecision::rule(ResponderId::StudentAgent, 0.95, "student:possessive")
            .with_student_name(Some("Alex".into()));
        assert_eq!(
            d.explain(),
            "rule-based: STUDENT_AGENT (confidence 0.95), matched student:possessive, student Alex"
        );
    }

    #[test]
    fn serializes_method_lowercase() {
        let d = RoutingDecision::substitute(ResponderId::RagAgent);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["method"], "model");
        assert_eq!(json["responder"], "RAG_AGENT");
        assert!(json.get("student_name").is_none());
    }
}
