//! The [`Provider`] trait for chat completions.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatRequest, ChatResponse};

/// A provider that can execute chat completion requests.
///
/// The production implementation is
/// [`OpenAiCompatProvider`](crate::openai_compat::OpenAiCompatProvider).
/// Tests substitute scripted fakes behind `Arc<dyn Provider>`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the provider name (e.g. "llmod", "openai").
    fn name(&self) -> &str;

    /// Execute a chat completion request and return the response.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`](crate::error::ProviderError) if the request
    /// fails due to network issues, authentication problems, rate limiting,
    /// or invalid responses.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;
}
