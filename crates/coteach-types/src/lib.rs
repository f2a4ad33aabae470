//! # coteach-types
//!
//! Core type definitions for the coteach dispatch engine.
//!
//! This crate is the foundation of the dependency graph -- all other
//! coteach crates depend on it. It contains:
//!
//! - **[`error`]** -- [`CoteachError`] and the crate-wide [`Result`] alias
//! - **[`config`]** -- Configuration schema (model, routing, cache, budget, server)
//! - **[`responder`]** -- Responder and trace-module identifiers
//! - **[`routing`]** -- Routing decisions produced for every request
//! - **[`cache`]** -- Cached responder outputs
//! - **[`ledger`]** -- Budget ledger entries and budget status snapshots
//! - **[`trace`]** -- Step records collected while answering one request
//! - **[`request`]** -- Inbound requests, conversation turns, dispatch results

pub mod cache;
pub mod config;
pub mod error;
pub mod ledger;
pub mod request;
pub mod responder;
pub mod routing;
pub mod trace;

pub use error::{CoteachError, Result};
pub use responder::{ModuleName, ResponderId};
