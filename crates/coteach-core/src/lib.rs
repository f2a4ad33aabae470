//! # coteach-core
//!
//! The dispatch and cost-control engine.
//!
//! For every request the [`dispatch::DispatchEngine`] decides which
//! responder answers it, whether a cached answer can be reused, and how the
//! execution is recorded:
//!
//! - [`routing`] -- rule router and model-backed fallback classifier
//! - [`cache`] -- content-addressed response cache over a pluggable backend
//! - [`budget`] -- cost ledger with an atomically enforced ceiling
//! - [`tracer`] -- ordered per-request step trace
//! - [`gateway`] -- the metered path every model call goes through
//! - [`responder`] -- responder trait, registry and the prompt-backed responder
//! - [`conversation`] -- short-term conversation memory

pub mod budget;
pub mod cache;
pub mod clock;
pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod json_repair;
pub mod responder;
pub mod routing;
pub mod tracer;

pub use dispatch::DispatchEngine;
pub use error::{CacheError, ModelCallError, ResponderError, RoutingFailure};
