//! REST API over the dispatch engine.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /api/execute` | run one request through the engine |
//! | `GET /api/execute/budget` | budget status snapshot |
//! | `GET /api/health` | liveness |

pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use coteach_core::DispatchEngine;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state accessible by all API handlers.
#[derive(Clone)]
pub struct ApiState {
    /// The engine every request is dispatched through.
    pub engine: Arc<DispatchEngine>,
    /// When the state was created, for uptime reporting.
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        Self {
            engine,
            started_at: Instant::now(),
        }
    }
}

/// Build the API router with all routes.
///
/// An empty `cors_origins` list allows any origin.
pub fn build_router(state: ApiState, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .nest("/api", handlers::api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
