//! Store error types.

use thiserror::Error;

/// Errors reported by a [`Store`](super::Store).
///
/// The engine propagates these unchanged and never retries.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Provisioned throughput exceeded.
    #[error("request throttled: {0}")]
    Throttled(String),

    /// The table or index does not exist.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// The caller may not perform the request.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The request is malformed (bad expression, missing key attribute, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// Any other store-side failure.
    #[error("internal store error: {0}")]
    Internal(String),

    /// Local storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Stored record or table description could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }
}

impl From<dynq_lang::ParseError> for StoreError {
    fn from(err: dynq_lang::ParseError) -> Self {
        StoreError::Validation(format!("invalid expression: {}", err))
    }
}

impl From<dynq_lang::EvalError> for StoreError {
    fn from(err: dynq_lang::EvalError) -> Self {
        StoreError::Validation(err.to_string())
    }
}
