//! Error types for parsing and evaluating condition expressions.

use crate::span::Span;
use thiserror::Error;

/// Error during lexing/parsing.
#[derive(Debug, Error)]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// Source span where the error occurred.
    pub span: Span,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.message, self.span.start)
    }
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// Format the error with the offending token underlined.
    pub fn format_with_source(&self, source: &str) -> String {
        let start = self.span.start.min(source.len());
        let width = self.span.text(source).chars().count().max(1);
        format!(
            "error: {}\n  | {}\n  | {}^{}\n",
            self.message,
            source,
            " ".repeat(start),
            "~".repeat(width - 1)
        )
    }
}

/// Error while evaluating a parsed expression against an item.
#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    /// A `#name` placeholder has no entry in the attribute-name map.
    #[error("unbound attribute name placeholder '{0}'")]
    UnboundName(String),

    /// A `:value` placeholder has no entry in the attribute-value map.
    #[error("unbound attribute value placeholder '{0}'")]
    UnboundValue(String),

    /// An operand cannot be used where it appears.
    #[error("invalid operand: {0}")]
    InvalidOperand(String),
}

/// A combined error type for the public API.
#[derive(Debug, Error)]
pub enum LangError {
    /// Parse error.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    /// Evaluation error.
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),
}
