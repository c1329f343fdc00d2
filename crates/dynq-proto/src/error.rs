//! Protocol error types.

use thiserror::Error;

/// Errors raised while parsing or validating request shapes.
#[derive(Debug, Error)]
pub enum Error {
    /// A filter tree did not match the expected grammar.
    #[error("invalid filter at '{path}': {message}")]
    InvalidFilter { path: String, message: String },

    /// An operator name is not part of the operator set.
    #[error("unknown operator '{operator}' on '{path}'")]
    UnknownOperator { path: String, operator: String },

    /// A sort term could not be parsed.
    #[error("invalid sort term '{0}'")]
    InvalidSort(String),

    /// A continuation token could not be decoded.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}

impl Error {
    pub(crate) fn invalid_filter(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidFilter {
            path: path.into(),
            message: message.into(),
        }
    }
}
