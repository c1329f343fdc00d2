//! Core error types.

use std::fmt;

use thiserror::Error;

use crate::storage::StoreError;

/// Category of a compilation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// A path segment does not name a field of the collection.
    UnknownField,
    /// The operator has no translation for this store.
    UnsupportedOperator,
    /// The leaf's value has the wrong shape for its operator.
    MalformedLeaf,
    /// The path crosses more relationships than the store can express.
    UnsupportedPath,
    /// A join path does not end at a relationship or upload field.
    UnknownJoinPath,
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompileErrorKind::UnknownField => "unknown field",
            CompileErrorKind::UnsupportedOperator => "unsupported operator",
            CompileErrorKind::MalformedLeaf => "malformed filter",
            CompileErrorKind::UnsupportedPath => "unsupported path",
            CompileErrorKind::UnknownJoinPath => "unknown join path",
        };
        f.write_str(name)
    }
}

/// A request that cannot be translated faithfully.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at '{path}': {message}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    /// The offending field or join path.
    pub path: String,
    pub message: String,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn unknown_field(path: impl Into<String>, segment: &str) -> Self {
        Self::new(
            CompileErrorKind::UnknownField,
            path,
            format!("no field named '{}'", segment),
        )
    }

    pub fn unsupported_operator(path: impl Into<String>, operator: impl fmt::Display) -> Self {
        Self::new(
            CompileErrorKind::UnsupportedOperator,
            path,
            format!("operator '{}' is not supported by this store", operator),
        )
    }

    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(CompileErrorKind::MalformedLeaf, path, message)
    }

    pub fn unsupported_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(CompileErrorKind::UnsupportedPath, path, message)
    }

    pub fn unknown_join_path(path: impl Into<String>) -> Self {
        Self::new(
            CompileErrorKind::UnknownJoinPath,
            path,
            "join path must end at a relationship or upload field",
        )
    }
}

/// Engine errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The request cannot be compiled.
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    /// A derived secondary index is not declared on the collection's table.
    #[error("index '{index}' required to sort by '{path}' is not declared on table '{table}'")]
    IndexResolution {
        index: String,
        table: String,
        path: String,
    },

    /// The store rejected or failed a request.
    #[error("store error: {0}")]
    Access(#[from] StoreError),

    /// No collection with this slug is registered.
    #[error("unknown collection '{0}'")]
    UnknownCollection(String),

    /// A supplied continuation token cannot be decoded.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// Converting between stored records and documents failed.
    #[error("transform error in '{collection}': {message}")]
    Transform { collection: String, message: String },

    /// Malformed request arguments.
    #[error("protocol error: {0}")]
    Protocol(dynq_proto::Error),
}

impl From<dynq_proto::Error> for Error {
    fn from(err: dynq_proto::Error) -> Self {
        match err {
            dynq_proto::Error::InvalidFilter { path, message } => {
                Error::Compile(CompileError::malformed(path, message))
            }
            dynq_proto::Error::UnknownOperator { path, operator } => Error::Compile(
                CompileError::unsupported_operator(path, operator),
            ),
            dynq_proto::Error::InvalidCursor(message) => Error::InvalidCursor(message),
            other => Error::Protocol(other),
        }
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_message_names_path() {
        let err = CompileError::unknown_field("meta.missing", "missing");
        assert_eq!(err.kind, CompileErrorKind::UnknownField);
        assert_eq!(
            err.to_string(),
            "unknown field at 'meta.missing': no field named 'missing'"
        );
    }

    #[test]
    fn test_protocol_errors_surface_as_compile_errors() {
        let err: Error = dynq_proto::Error::UnknownOperator {
            path: "title".into(),
            operator: "matches".into(),
        }
        .into();
        match err {
            Error::Compile(compile) => {
                assert_eq!(compile.kind, CompileErrorKind::UnsupportedOperator)
            }
            other => panic!("expected compile error, got {:?}", other),
        }
    }
}
