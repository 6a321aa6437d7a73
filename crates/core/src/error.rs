//! Engine error model.

use thiserror::Error;

/// Result type used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level error taxonomy.
///
/// Everything except `Internal` is recoverable and must leave no state
/// behind: a `NotFound` or `BadInput` aborts the operation before commit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A campaign or actor does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Malformed input (dice expression, mutation type, schema violation).
    #[error("{0}")]
    BadInput(String),

    /// The request did not carry a valid engine key.
    #[error("Invalid or missing ENGINE_KEY")]
    Unauthorized,

    /// Backing-store failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_input(msg: impl Into<String>) -> Self {
        Self::BadInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn campaign_not_found(id: impl core::fmt::Display) -> Self {
        Self::NotFound(format!("Campaign not found: {id}"))
    }
}
