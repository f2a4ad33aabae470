//! The metered path every model call goes through.
//!
//! [`ModelGateway`] owns the provider and the budget. Each call site
//! (fallback classifier, responders) receives a [`MeteredModel`] bound to
//! its request tracer and trace module. A call then:
//!
//! 1. opens a trace step with the outgoing messages,
//! 2. reserves the worst-case cost, the full completion cap included (or
//!    fails with `BudgetExceeded` without contacting the provider),
//! 3. calls the provider under a deadline,
//! 4. settles the reservation against the reported usage, recording the
//!    single ledger entry for the call,
//! 5. closes the trace step with the reply or the error.

use std::sync::Arc;
use std::time::Duration;

use coteach_llm::{ChatMessage, ChatRequest, Provider, Usage};
use coteach_types::{ModuleName, ResponderId};
use serde_json::json;
use tracing::{debug, info};

use crate::budget::{BudgetTracker, estimate_prompt_tokens};
use crate::error::ModelCallError;
use crate::tracer::StepTracer;

/// Text and accounting of a completed model call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub usage: Usage,
    pub cost_usd: f64,
    pub model: String,
}

/// Shared provider plus budget, with call defaults.
#[derive(Clone)]
pub struct ModelGateway {
    provider: Arc<dyn Provider>,
    budget: Arc<BudgetTracker>,
    model: String,
    timeout: Duration,
    max_tokens: u32,
    temperature: f64,
}

impl ModelGateway {
    pub fn new(
        provider: Arc<dyn Provider>,
        budget: Arc<BudgetTracker>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            budget,
            model: model.into(),
            timeout: Duration::from_secs(60),
            max_tokens: 1000,
            temperature: 0.7,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn budget(&self) -> &Arc<BudgetTracker> {
        &self.budget
    }

    /// A handle whose calls are traced under `module` and attributed to
    /// `responder` in the ledger.
    pub fn bind(
        &self,
        tracer: Arc<StepTracer>,
        module: ModuleName,
        responder: Option<ResponderId>,
    ) -> MeteredModel {
        MeteredModel {
            gateway: self.clone(),
            tracer,
            module,
            responder,
        }
    }
}

impl std::fmt::Debug for ModelGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelGateway")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A [`ModelGateway`] bound to one request's tracer.
#[derive(Clone)]
pub struct MeteredModel {
    gateway: ModelGateway,
    tracer: Arc<StepTracer>,
    module: ModuleName,
    responder: Option<ResponderId>,
}

impl MeteredModel {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.gateway.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.gateway.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.gateway.temperature = temperature;
        self
    }

    pub fn module(&self) -> ModuleName {
        self.module
    }

    /// Make one metered, traced model call.
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<ModelReply, ModelCallError> {
        let gw = &self.gateway;
        let request = ChatRequest::new(gw.model.clone(), messages)
            .with_max_tokens(gw.max_tokens)
            .with_temperature(gw.temperature);
        let prompt_chars = request.prompt_chars();

        let step = self.tracer.start_step(
            self.module,
            json!({
                "action": "model_call",
                "model": gw.model,
                "messages": request.messages,
            }),
        );

        let estimate = gw.budget.estimate(&gw.model, prompt_chars, gw.max_tokens);
        let hold = gw.budget.worst_case(&gw.model, prompt_chars, gw.max_tokens);
        let reservation = match gw.budget.reserve(hold) {
            Ok(r) => r,
            Err(e) => {
                info!(module = %self.module, error = %e, "model call vetoed by budget");
                self.tracer.fail_step(step, &e);
                return Err(e);
            }
        };

        let response = match tokio::time::timeout(gw.timeout, gw.provider.complete(&request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let err = ModelCallError::Provider(e);
                self.tracer.fail_step(step, &err);
                return Err(err);
            }
            Err(_) => {
                let err = ModelCallError::Timeout {
                    after_ms: u64::try_from(gw.timeout.as_millis()).unwrap_or(u64::MAX),
                };
                self.tracer.fail_step(step, &err);
                return Err(err);
            }
        };

        let text = response.text().map(str::to_string);
        let usage = response.usage.unwrap_or_else(|| {
            let prompt_tokens = estimate_prompt_tokens(prompt_chars);
            let completion_tokens =
                estimate_prompt_tokens(text.as_deref().map_or(0, |t| t.chars().count()));
            Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }
        });
        let entry = gw
            .budget
            .settle(reservation, &gw.model, self.responder, usage)
            .await;

        let Some(text) = text else {
            let err = ModelCallError::EmptyResponse;
            self.tracer.fail_step(step, &err);
            return Err(err);
        };

        debug!(
            module = %self.module,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cost_usd = entry.cost_usd,
            "model call completed"
        );
        self.tracer.finish_step(
            step,
            json!({
                "text": text,
                "prompt_tokens": usage.prompt_tokens,
                "completion_tokens": usage.completion_tokens,
                "cost_usd": entry.cost_usd,
                "estimated_usd": estimate,
            }),
        );

        Ok(ModelReply {
            text,
            usage,
            cost_usd: entry.cost_usd,
            model: gw.model.clone(),
        })
    }
}

impl std::fmt::Debug for MeteredModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeteredModel")
            .field("model", &self.gateway.model)
            .field("module", &self.module)
            .field("responder", &self.responder)
            .finish()
    }
}
