//! Condition-expression language for partition/sort-key stores.
//!
//! Expressions reference attributes through `#name` placeholders and operands through
//! `:value` placeholders, both resolved from maps supplied alongside the expression.
//!
//! ```text
//! (#n0 = :v0) AND (#n1 IN (:v1, :v2))
//! NOT contains(#n0.#n1, :v0)
//! #pk = :pk AND begins_with(#sk, :prefix)
//! #p0, #p1.#p2
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use dynq_lang::{parse_condition, Bindings, Evaluator};
//! use serde_json::json;
//!
//! let condition = parse_condition("#n0 > :v0").unwrap();
//! let names = BTreeMap::from([("#n0".to_string(), "views".to_string())]);
//! let values = BTreeMap::from([(":v0".to_string(), json!(3))]);
//! let evaluator = Evaluator::new(Bindings { names: &names, values: &values });
//!
//! let item = json!({"views": 10});
//! assert!(evaluator.evaluate(&condition, item.as_object().unwrap()).unwrap());
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod span;

pub use ast::{Comparator, Condition, DocumentPath, Function, Operand, PathElement};
pub use error::{EvalError, LangError, ParseError};
pub use eval::{compare_values, values_equal, Bindings, Evaluator, ResolvedElement};
pub use parser::{parse_condition, parse_projection};
pub use span::Span;

/// Tokenize a source string (for debugging/testing).
pub fn tokenize(source: &str) -> Result<Vec<lexer::SpannedToken>, ParseError> {
    lexer::tokenize(source)
}
