//! Failure kinds of the dispatch engine.
//!
//! Every kind is caught at the engine boundary; none reaches the caller as
//! anything other than a well-formed `DispatchResult`.

use coteach_llm::ProviderError;
use coteach_types::ResponderId;
use thiserror::Error;

/// A model call made through the metered gateway failed or was vetoed.
#[derive(Error, Debug)]
pub enum ModelCallError {
    /// The call would push spend past the ceiling and was not made.
    #[error("budget exceeded: spent ${spent:.4} of ${ceiling:.2}, call needs ~${estimated:.4}")]
    BudgetExceeded {
        /// Spend plus outstanding reservations at the time of the check.
        spent: f64,
        /// Configured ceiling.
        ceiling: f64,
        /// Estimated cost of the refused call.
        estimated: f64,
    },

    /// The provider did not answer within the deadline.
    #[error("model call timed out after {after_ms}ms")]
    Timeout {
        /// Deadline that elapsed.
        after_ms: u64,
    },

    /// The provider returned an error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The provider answered with no usable text.
    #[error("model returned an empty response")]
    EmptyResponse,
}

/// The fallback classifier could not resolve a responder.
#[derive(Error, Debug)]
pub enum RoutingFailure {
    /// The classification call itself failed.
    #[error("classification call failed: {0}")]
    Model(#[from] ModelCallError),

    /// The model output was not the expected JSON.
    #[error("unparsable classification output: {0}")]
    Unparsable(String),

    /// The model named a responder that does not exist.
    #[error("unknown responder in classification output: {0}")]
    UnknownResponder(String),
}

/// A responder could not produce an answer.
#[derive(Error, Debug)]
pub enum ResponderError {
    /// A model call was vetoed by the budget. Recovered as a degraded answer.
    #[error("budget exceeded: spent ${spent:.4} of ${ceiling:.2}")]
    BudgetExceeded {
        /// Spend at the time of the veto.
        spent: f64,
        /// Configured ceiling.
        ceiling: f64,
    },

    /// A model call failed.
    #[error("model call failed: {0}")]
    Model(ModelCallError),

    /// The responder as a whole overran its deadline.
    #[error("responder timed out after {after_secs}s")]
    Timeout {
        /// Deadline that elapsed.
        after_secs: u64,
    },

    /// Responder-specific failure.
    #[error("responder failed: {0}")]
    Failed(String),

    /// No responder is registered under this id.
    #[error("responder unavailable: {0}")]
    Unavailable(ResponderId),
}

impl From<ModelCallError> for ResponderError {
    fn from(err: ModelCallError) -> Self {
        match err {
            ModelCallError::BudgetExceeded { spent, ceiling, .. } => {
                ResponderError::BudgetExceeded { spent, ceiling }
            }
            other => ResponderError::Model(other),
        }
    }
}

/// A cache backend operation failed. Never surfaced to callers: reads
/// degrade to a miss and writes are logged.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backend reported an error.
    #[error("cache backend error: {0}")]
    Backend(String),

    /// The backend did not answer within the deadline.
    #[error("cache backend timed out after {after_ms}ms")]
    Timeout {
        /// Deadline that elapsed.
        after_ms: u64,
    },
}
