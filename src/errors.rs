//! Unified error types and result handling.
//!
//! Only caller-contract violations and collaborator failures live here. Data-quality
//! problems found while reconciling (malformed rows, ambiguous duplicates) are not
//! errors; they are reported as [`crate::core::model::DataIssue`] diagnostics.

use thiserror::Error;

/// Errors surfaced by the finance engine and its store adapters.
#[derive(Debug, Error)]
pub enum Error {
    /// The request itself is unusable (missing building id, inverted period).
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with the request
        message: String,
    },

    /// A collaborator store could not produce its snapshot.
    #[error("{source_name} source unavailable: {message}")]
    SourceUnavailable {
        /// Which source failed ("local" or "external")
        source_name: String,
        /// Underlying failure description
        message: String,
    },

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// Details about the configuration problem
        message: String,
    },

    /// Database error from the local ledger.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// JSON decoding or encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Environment variable error.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Shorthand for building an [`Error::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
