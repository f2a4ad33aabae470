//! Request routing.
//!
//! [`RuleRouter`] resolves most traffic with deterministic patterns and no
//! model call. When its confidence is below the configured threshold the
//! [`FallbackClassifier`] asks the model instead.

pub mod fallback;
pub mod rules;

pub use fallback::{FallbackClassifier, SessionContext, parse_classification};
pub use rules::RuleRouter;
