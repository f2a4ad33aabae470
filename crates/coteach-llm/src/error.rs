//! Provider error types for coteach-llm.
//!
//! All provider operations return [`Result<T>`] which uses [`ProviderError`]
//! as the error type.

use thiserror::Error;

/// Errors that can occur when calling a chat-completion provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The HTTP request failed or the provider answered with a server error.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The provider rejected the credentials (HTTP 401/403).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The provider returned HTTP 429.
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested wait before the next call, in milliseconds.
        retry_after_ms: u64,
    },

    /// The requested model does not exist on the provider.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The provider is missing required configuration (e.g. API key).
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// The provider answered with a body that could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The HTTP client gave up waiting for the provider.
    #[error("timeout")]
    Timeout,

    /// An HTTP-level error from reqwest.
    #[error("http error: {0}")]
    Http(reqwest::Error),

    /// A JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Http(err)
        }
    }
}

impl ProviderError {
    /// Whether the same call could succeed if issued again later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. } | ProviderError::Timeout | ProviderError::Http(_)
        )
    }
}

/// A convenience type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
