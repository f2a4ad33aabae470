//! Model-backed fallback classifier.
//!
//! Consulted only when the rule router is not confident. Makes exactly one
//! metered model call whose only job is picking a responder.

use std::sync::Arc;
use std::time::Duration;

use coteach_llm::ChatMessage;
use coteach_types::config::RoutingConfig;
use coteach_types::routing::RoutingDecision;
use coteach_types::{ModuleName, ResponderId};
use serde_json::Value;
use tracing::debug;

use crate::error::RoutingFailure;
use crate::gateway::ModelGateway;
use crate::json_repair::parse_with_repair;
use crate::tracer::StepTracer;

/// Confidence assumed when the model omits one.
const DEFAULT_MODEL_CONFIDENCE: f64 = 0.8;

const CLASSIFIER_SYSTEM_PROMPT: &str = "\
You route requests from a special education teacher to exactly one specialist.

Specialists:
- STUDENT_AGENT: questions about one student (profile, triggers, history, what works, what to avoid)
- RAG_AGENT: teaching strategies and evidence-based methods
- ADMIN_AGENT: paperwork (IEP reports, parent emails, summaries, documentation)
- PREDICT_AGENT: daily briefings, predictions and risk for upcoming events

Reply with a single JSON object and nothing else:
{\"primary_agent\": \"STUDENT_AGENT|RAG_AGENT|ADMIN_AGENT|PREDICT_AGENT\", \"confidence\": 0.0-1.0, \"student_name\": \"name or null\"}";

/// Session facts handed to the classifier.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub session_id: String,
    /// Responders that answered earlier turns of the session.
    pub previous_responders: Vec<ResponderId>,
}

/// Assigns a responder with one model call.
#[derive(Debug, Clone)]
pub struct FallbackClassifier {
    gateway: ModelGateway,
    max_tokens: u32,
    temperature: f64,
    timeout: Duration,
}

impl FallbackClassifier {
    pub fn new(gateway: ModelGateway, config: &RoutingConfig) -> Self {
        Self {
            gateway,
            max_tokens: config.fallback_max_tokens,
            temperature: config.fallback_temperature,
            timeout: Duration::from_secs(config.fallback_timeout_secs),
        }
    }

    /// Classify `text`. The call is traced on `tracer` under the
    /// orchestrator and billed without a responder.
    ///
    /// # Errors
    ///
    /// [`RoutingFailure`] when the call fails (including a budget veto or a
    /// timeout) or its output does not name a known responder.
    pub async fn classify(
        &self,
        text: &str,
        context: &SessionContext,
        tracer: Arc<StepTracer>,
    ) -> Result<RoutingDecision, RoutingFailure> {
        let model = self
            .gateway
            .bind(tracer, ModuleName::Orchestrator, None)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_timeout(self.timeout);

        let messages = vec![
            ChatMessage::system(CLASSIFIER_SYSTEM_PROMPT),
            ChatMessage::user(user_prompt(text, context)),
        ];
        let reply = model.complete(messages).await?;
        let decision = parse_classification(&reply.text)?;
        debug!(
            responder = ?decision.responder,
            confidence = decision.confidence,
            "fallback classification"
        );
        Ok(decision)
    }
}

fn user_prompt(text: &str, context: &SessionContext) -> String {
    let previous = if context.previous_responders.is_empty() {
        "none".to_string()
    } else {
        context
            .previous_responders
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "Request: {text}\n\nSession: {}\nSpecialists used earlier in this session: {previous}\n\nReply with the routing JSON only.",
        context.session_id
    )
}

/// Turn classifier output into a decision.
pub fn parse_classification(raw: &str) -> Result<RoutingDecision, RoutingFailure> {
    let value = parse_with_repair(raw).map_err(|e| RoutingFailure::Unparsable(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(RoutingFailure::Unparsable("expected a JSON object".into()));
    };

    let agent = obj
        .get("primary_agent")
        .and_then(Value::as_str)
        .ok_or_else(|| RoutingFailure::Unparsable("missing primary_agent".into()))?;
    let responder: ResponderId = agent
        .parse()
        .map_err(|_| RoutingFailure::UnknownResponder(agent.to_string()))?;

    let confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_MODEL_CONFIDENCE);

    let student_name = obj
        .get("student_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        .map(str::to_string);

    Ok(RoutingDecision::model(responder, confidence).with_student_name(student_name))
}
