//! Chat-completion provider abstraction for coteach.
//!
//! This crate provides a unified interface for calling LLM APIs via
//! OpenAI-compatible endpoints. It is a standalone library with no
//! dependencies on other coteach crates.
//!
//! # Architecture
//!
//! - [`Provider`] trait defines the chat completion interface
//! - [`OpenAiCompatProvider`] implements it for any OpenAI-compatible API
//! - [`ProviderConfig`] describes how to connect to a provider
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use coteach_llm::{ChatMessage, ChatRequest, OpenAiCompatProvider, Provider, ProviderConfig};
//!
//! let provider = OpenAiCompatProvider::new(ProviderConfig::new(
//!     "llmod",
//!     "https://api.llmod.ai/v1",
//!     "COTEACH_API_KEY",
//! ));
//!
//! let request = ChatRequest::new("gpt-5-mini", vec![
//!     ChatMessage::system("You are a classroom assistant."),
//!     ChatMessage::user("How do I handle a meltdown?"),
//! ]);
//!
//! let response = provider.complete(&request).await?;
//! println!("{}", response.text().unwrap_or_default());
//! ```

pub mod config;
pub mod error;
pub mod openai_compat;
pub mod provider;
pub mod types;

pub use config::ProviderConfig;
pub use error::{ProviderError, Result};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::Provider;
pub use types::{ChatMessage, ChatRequest, ChatResponse, Choice, Usage};
