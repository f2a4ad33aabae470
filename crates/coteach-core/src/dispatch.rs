//! The dispatch engine.
//!
//! One [`DispatchEngine::execute`] call runs one request through
//!
//! ```text
//! ROUTING -> CACHE_CHECK -> CACHE_HIT -> DONE
//!                        -> CACHE_MISS -> RESPONDER_EXEC -> CACHE_WRITE -> DONE
//! ```
//!
//! with every stage able to end in an error result. The engine owns a fresh
//! [`StepTracer`] per request and shares the cache, budget and conversation
//! store across requests. `execute` is infallible: failures become a
//! `DispatchResult` with status `error` and the trace collected so far, and
//! a budget veto inside a responder becomes a degraded answer with status
//! `ok`.
//!
//! A request that names no student inherits the student of the most recent
//! turn that had one, so follow-ups like "what else helps him?" keep their
//! subject. Conversation store calls carry a deadline; a slow or failing
//! store costs the request its history, never its answer.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use coteach_types::config::{DispatchConfig, RoutingConfig};
use coteach_types::ledger::BudgetStatus;
use coteach_types::request::{ConversationTurn, DispatchResult, Request};
use coteach_types::routing::RoutingDecision;
use coteach_types::{ModuleName, ResponderId};
use futures_util::FutureExt;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::budget::BudgetTracker;
use crate::cache::{CacheLookup, CacheStore, cache_key};
use crate::conversation::{
    ConversationStore, InMemoryConversationStore, recent_student, responders_used,
};
use crate::error::ResponderError;
use crate::gateway::ModelGateway;
use crate::responder::{ResponderContext, ResponderOutput, ResponderRegistry};
use crate::routing::{FallbackClassifier, RuleRouter, SessionContext};
use crate::tracer::StepTracer;

/// Message for an empty or whitespace-only request.
pub const EMPTY_QUERY_MESSAGE: &str = "Query cannot be empty";

/// Answer substituted when the budget vetoes a responder's model call.
pub const BUDGET_EXHAUSTED_RESPONSE: &str = "The model budget for this period is exhausted, so I can't prepare a full answer right now. Try a simpler query that can be answered without the model, or ask again once the budget resets.";

/// Caller-facing message for a failed responder. Details stay in the trace.
pub const RESPONDER_FAILURE_MESSAGE: &str =
    "Sorry, something went wrong while answering your request. Please try again.";

/// Routes, caches, executes and traces requests.
pub struct DispatchEngine {
    router: RuleRouter,
    fallback: Option<FallbackClassifier>,
    gateway: ModelGateway,
    cache: Arc<CacheStore>,
    responders: ResponderRegistry,
    conversations: Arc<dyn ConversationStore>,
    routing: RoutingConfig,
    dispatch: DispatchConfig,
}

impl DispatchEngine {
    /// Engine with default routing and dispatch settings and in-memory
    /// conversation memory.
    pub fn new(gateway: ModelGateway, cache: Arc<CacheStore>, responders: ResponderRegistry) -> Self {
        let routing = RoutingConfig::default();
        Self {
            router: RuleRouter::new(),
            fallback: Some(FallbackClassifier::new(gateway.clone(), &routing)),
            gateway,
            cache,
            responders,
            conversations: Arc::new(InMemoryConversationStore::new()),
            routing,
            dispatch: DispatchConfig::default(),
        }
    }

    pub fn with_routing_config(mut self, routing: RoutingConfig) -> Self {
        self.fallback = routing
            .enable_fallback
            .then(|| FallbackClassifier::new(self.gateway.clone(), &routing));
        self.routing = routing;
        self
    }

    pub fn with_dispatch_config(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_conversation_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.conversations = store;
        self
    }

    pub fn router(&self) -> &RuleRouter {
        &self.router
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn budget(&self) -> &Arc<BudgetTracker> {
        self.gateway.budget()
    }

    pub fn budget_status(&self) -> BudgetStatus {
        self.gateway.budget().status()
    }

    /// Answer `request`. Never fails; see the module docs.
    pub async fn execute(&self, request: Request) -> DispatchResult {
        let tracer = Arc::new(StepTracer::new());
        let result = self.run(&request, &tracer).await;
        info!(
            session = %request.session_id,
            status = if result.is_ok() { "ok" } else { "error" },
            responder = ?result.responder,
            cached = result.cached,
            steps = result.steps.len(),
            "dispatch completed"
        );
        result
    }

    async fn run(&self, request: &Request, tracer: &Arc<StepTracer>) -> DispatchResult {
        let text = request.text.trim();
        if text.is_empty() {
            tracer.record(
                ModuleName::Orchestrator,
                json!({ "action": "validation", "query": request.text }),
                json!({ "status": "error", "error": EMPTY_QUERY_MESSAGE }),
            );
            return DispatchResult::error(EMPTY_QUERY_MESSAGE, None, tracer.finish());
        }

        let history = self.history(&request.session_id).await;

        // ── ROUTING ─────────────────────────────────────────────────
        let decision = self
            .route(text, &request.session_id, &history, tracer)
            .await;
        let responder_id = decision
            .responder
            .unwrap_or(self.routing.default_responder);
        let student_name = decision.student_name.clone();
        self.remember(
            &request.session_id,
            ConversationTurn::user(text).with_student_name(student_name.clone()),
        )
        .await;

        // ── CACHE_CHECK ─────────────────────────────────────────────
        let lookup_step = tracer.start_step(
            ModuleName::Orchestrator,
            json!({
                "action": "cache_lookup",
                "responder": responder_id,
                "cache_key": cache_key(responder_id, text),
            }),
        );
        match self.cache.lookup(responder_id, text).await {
            CacheLookup::Hit(entry) => {
                tracer.finish_step(
                    lookup_step,
                    json!({
                        "status": "hit",
                        "reused": true,
                        "hit_count": entry.hit_count,
                        "created_at": entry.created_at,
                        "expires_at": entry.expires_at,
                    }),
                );
                self.remember(
                    &request.session_id,
                    ConversationTurn::assistant(entry.response.clone(), responder_id)
                        .with_student_name(student_name),
                )
                .await;
                return DispatchResult::ok(entry.response, responder_id, true, tracer.finish());
            }
            other => {
                let mut response = json!({ "status": other.label() });
                if let CacheLookup::Corrupt(detail) | CacheLookup::Unavailable(detail) = &other {
                    response["detail"] = Value::String(detail.clone());
                }
                tracer.finish_step(lookup_step, response);
            }
        }

        // ── RESPONDER_EXEC ──────────────────────────────────────────
        let output = match self
            .execute_responder(responder_id, text, request, &decision, &history, tracer)
            .await
        {
            Ok(output) => output,
            Err(ResponderError::BudgetExceeded { .. }) => {
                return DispatchResult::ok(
                    BUDGET_EXHAUSTED_RESPONSE,
                    responder_id,
                    false,
                    tracer.finish(),
                );
            }
            Err(_) => {
                return DispatchResult::error(
                    RESPONDER_FAILURE_MESSAGE,
                    Some(responder_id),
                    tracer.finish(),
                );
            }
        };

        // ── CACHE_WRITE ─────────────────────────────────────────────
        if output.cacheable {
            let write_step = tracer.start_step(
                ModuleName::Orchestrator,
                json!({ "action": "cache_write", "responder": responder_id }),
            );
            match self
                .cache
                .put(responder_id, text, &output.text, output.ttl)
                .await
            {
                Ok(entry) => tracer.finish_step(
                    write_step,
                    json!({
                        "status": "stored",
                        "cache_key": entry.cache_key,
                        "expires_at": entry.expires_at,
                    }),
                ),
                Err(e) => {
                    warn!(responder = %responder_id, error = %e, "cache write failed");
                    tracer.fail_step(write_step, &e);
                }
            }
        } else {
            debug!(responder = %responder_id, "answer marked non-cacheable");
        }

        self.remember(
            &request.session_id,
            ConversationTurn::assistant(output.text.clone(), responder_id)
                .with_student_name(student_name),
        )
        .await;
        DispatchResult::ok(output.text, responder_id, false, tracer.finish())
    }

    /// Rule router first; the fallback classifier below the threshold. The
    /// returned decision always names a responder.
    ///
    /// With the fallback disabled, a rule match below the threshold is kept
    /// and marked as such; only text no rule matched gets the default.
    async fn route(
        &self,
        text: &str,
        session_id: &str,
        history: &[ConversationTurn],
        tracer: &Arc<StepTracer>,
    ) -> RoutingDecision {
        let step = tracer.start_step(
            ModuleName::Orchestrator,
            json!({ "action": "routing", "query": text }),
        );

        let rule = self.router.classify(text);
        let confident = rule.confidence >= self.routing.confidence_threshold;
        let mut fallback_error = None;
        let mut below_threshold = false;
        let decision = if rule.responder.is_some() && confident {
            rule.clone()
        } else if let Some(fallback) = &self.fallback {
            let context = SessionContext {
                session_id: session_id.to_string(),
                previous_responders: responders_used(history),
            };
            match fallback.classify(text, &context, Arc::clone(tracer)).await {
                Ok(decision) => {
                    let name = decision.student_name.clone().or(rule.student_name.clone());
                    decision.with_student_name(name)
                }
                Err(e) => {
                    warn!(error = %e, "fallback classification failed, using default responder");
                    fallback_error = Some(e.to_string());
                    RoutingDecision::substitute(self.routing.default_responder)
                        .with_student_name(rule.student_name.clone())
                }
            }
        } else if rule.responder.is_some() {
            below_threshold = true;
            rule.clone()
        } else {
            RoutingDecision::substitute(self.routing.default_responder)
                .with_student_name(rule.student_name.clone())
        };

        let mut student_from_history = false;
        let decision = if decision.student_name.is_none() {
            let carried = recent_student(history);
            student_from_history = carried.is_some();
            decision.with_student_name(carried)
        } else {
            decision
        };

        info!(
            method = ?decision.method,
            responder = ?decision.responder,
            confidence = decision.confidence,
            "routing decision"
        );

        let mut response = json!({
            "responder": decision.responder,
            "confidence": decision.confidence,
            "method": decision.method,
            "matched_pattern": decision.matched_pattern,
            "student_name": decision.student_name,
            "explanation": decision.explain(),
        });
        if decision.method != rule.method || decision.responder != rule.responder {
            response["rule_confidence"] = json!(rule.confidence);
        }
        if let Some(error) = fallback_error {
            response["fallback_error"] = Value::String(error);
        }
        if below_threshold {
            response["below_threshold"] = Value::Bool(true);
            response["threshold"] = json!(self.routing.confidence_threshold);
        }
        if student_from_history {
            response["student_from_history"] = Value::Bool(true);
        }
        tracer.finish_step(step, response);
        decision
    }

    async fn execute_responder(
        &self,
        responder_id: ResponderId,
        text: &str,
        request: &Request,
        decision: &RoutingDecision,
        history: &[ConversationTurn],
        tracer: &Arc<StepTracer>,
    ) -> Result<ResponderOutput, ResponderError> {
        let module = ModuleName::from(responder_id);
        let step = tracer.start_step(
            module,
            json!({
                "action": "execute",
                "query": text,
                "student_name": decision.student_name,
                "history_turns": history.len(),
            }),
        );

        let outcome = match self.responders.get(responder_id) {
            Ok(responder) => {
                let context = ResponderContext {
                    session_id: request.session_id.clone(),
                    teacher_id: request.teacher_id.clone(),
                    student_name: decision.student_name.clone(),
                    history: history.to_vec(),
                    model: self
                        .gateway
                        .bind(Arc::clone(tracer), module, Some(responder_id)),
                };
                let timeout = Duration::from_secs(self.dispatch.responder_timeout_secs);
                let call = AssertUnwindSafe(responder.handle(text, &context)).catch_unwind();
                match tokio::time::timeout(timeout, call).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => Err(ResponderError::Failed("responder panicked".into())),
                    Err(_) => Err(ResponderError::Timeout {
                        after_secs: self.dispatch.responder_timeout_secs,
                    }),
                }
            }
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(output) => tracer.finish_step(
                step,
                json!({ "status": "ok", "cacheable": output.cacheable }),
            ),
            Err(ResponderError::BudgetExceeded { spent, ceiling }) => {
                info!(responder = %responder_id, "budget exhausted, returning degraded answer");
                tracer.finish_step(
                    step,
                    json!({
                        "status": "degraded",
                        "reason": "budget_exceeded",
                        "spent_usd": spent,
                        "ceiling_usd": ceiling,
                    }),
                );
            }
            Err(e) => {
                warn!(responder = %responder_id, error = %e, "responder failed");
                tracer.fail_step(step, e);
            }
        }
        outcome
    }

    fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch.store_timeout_ms)
    }

    async fn history(&self, session_id: &str) -> Vec<ConversationTurn> {
        let read = self
            .conversations
            .recent(session_id, self.dispatch.history_limit);
        match tokio::time::timeout(self.store_timeout(), read).await {
            Ok(Ok(turns)) => turns,
            Ok(Err(e)) => {
                warn!(session = %session_id, error = %e, "conversation history unavailable");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    session = %session_id,
                    timeout_ms = self.dispatch.store_timeout_ms,
                    "conversation history read timed out"
                );
                Vec::new()
            }
        }
    }

    async fn remember(&self, session_id: &str, turn: ConversationTurn) {
        let write = self.conversations.append(session_id, turn);
        match tokio::time::timeout(self.store_timeout(), write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(session = %session_id, error = %e, "failed to store conversation turn");
            }
            Err(_) => warn!(
                session = %session_id,
                timeout_ms = self.dispatch.store_timeout_ms,
                "conversation write timed out"
            ),
        }
    }
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("router", &self.router)
            .field("fallback", &self.fallback.is_some())
            .field("gateway", &self.gateway)
            .field("responders", &self.responders)
            .finish()
    }
}
