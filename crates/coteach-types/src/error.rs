//! Error types for the coteach engine.
//!
//! Provides [`CoteachError`] as the top-level error type. It is
//! non-exhaustive to allow future extension without breaking downstream.

use thiserror::Error;

/// Top-level error type for the coteach engine.
///
/// Variants are grouped into recoverable (timeout, provider, storage) and
/// fatal (config, I/O) categories to guide callers on whether retrying is
/// worthwhile.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoteachError {
    // ── Recoverable ──────────────────────────────────────────────────

    /// An operation exceeded its deadline.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Human-readable name of the operation that timed out.
        operation: String,
    },

    /// A model provider returned an error.
    #[error("provider error: {message}")]
    Provider {
        /// Provider-supplied error message.
        message: String,
    },

    /// A backing store (cache, ledger, conversation history) failed.
    #[error("storage error: {message}")]
    Storage {
        /// What went wrong.
        message: String,
    },

    // ── Fatal ────────────────────────────────────────────────────────

    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoteachError {
    /// Shorthand for a [`CoteachError::Storage`] error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// A convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CoteachError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display() {
        let err = CoteachError::Timeout {
            operation: "cache_read".into(),
        };
        assert_eq!(err.to_string(), "operation timed out: cache_read");
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CoteachError = io_err.into();
        assert!(matches!(err, CoteachError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{{bad}}").unwrap_err();
        let err: CoteachError = json_err.into();
        assert!(matches!(err, CoteachError::Json(_)));
    }

    #[test]
    fn storage_helper() {
        let err = CoteachError::storage("ledger file locked");
        assert_eq!(err.to_string(), "storage error: ledger file locked");
    }
}
