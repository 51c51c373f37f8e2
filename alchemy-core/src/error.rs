//! Error types for engine operations.

use thiserror::Error;

/// Result type for engine operations.
pub type AlchemyResult<T> = Result<T, AlchemyError>;

/// Errors that can occur in engine operations.
///
/// Table and gesture operations are total and never produce these; they come
/// from loading external data (recipe tables, snapshots) and from preparing
/// remote payloads.
#[derive(Debug, Error)]
pub enum AlchemyError {
    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A recipe key was not of the form `a+b`.
    #[error("Invalid recipe key: {0}")]
    InvalidRecipeKey(String),

    /// A save payload exceeded the configured byte ceiling.
    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        /// Serialized size in bytes.
        size: usize,
        /// Configured ceiling in bytes.
        limit: usize,
    },
}
