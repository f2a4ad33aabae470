//! HTTP request handlers for the REST API.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use coteach_types::ledger::BudgetStatus;
use coteach_types::request::{DispatchResult, Request};
use serde::Deserialize;
use uuid::Uuid;

use super::ApiState;

/// Teacher id used when the client sends none.
const DEFAULT_TEACHER_ID: &str = "teacher";

/// Build all API routes.
pub fn api_routes() -> Router<ApiState> {
    Router::new()
        .route("/execute", post(execute))
        .route("/execute/budget", get(budget_status))
        .route("/health", get(health_check))
}

/// Body of `POST /api/execute`.
#[derive(Debug, Deserialize)]
pub struct ExecuteBody {
    pub prompt: String,
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default, alias = "teacherId")]
    pub teacher_id: Option<String>,
}

/// `session_` followed by 8 hex characters.
pub fn new_session_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("session_{}", &id[..8])
}

async fn execute(State(state): State<ApiState>, Json(body): Json<ExecuteBody>) -> Json<DispatchResult> {
    let session_id = body
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(new_session_id);
    let teacher_id = body
        .teacher_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TEACHER_ID.to_string());

    let request = Request::new(body.prompt, session_id, teacher_id);
    Json(state.engine.execute(request).await)
}

async fn budget_status(State(state): State<ApiState>) -> Json<BudgetStatus> {
    Json(state.engine.budget_status())
}

async fn health_check(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}
