//! HTTP boundary for the coteach dispatch engine.
//!
//! Exposes the engine through a small axum router (see [`api`]) and a
//! [`serve`] helper that binds it to a socket.

pub mod api;
pub mod error;

use std::net::SocketAddr;

use axum::Router;
use tracing::info;

pub use api::{ApiState, build_router};
pub use error::{Result, ServiceError};

/// Bind `addr` and serve `router` until `shutdown` resolves.
pub async fn serve(
    router: Router,
    addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr: SocketAddr = addr.parse().map_err(|_| ServiceError::InvalidAddress {
        addr: addr.to_string(),
    })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServiceError::Bind { addr, source })?;
    info!(%addr, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServiceError::Serve)
}
