//! Query translation and execution.
//!
//! Compilation is split into small pure passes (filter, sort, access path,
//! projection) that the [`QueryEngine`] strings together per request before talking
//! to the store.

mod access_path;
mod executor;
mod join;
mod operator;
mod pagination;
mod path;
mod projection;
mod sort;
mod where_clause;

pub use access_path::{select_access_path, AccessKind, AccessPath};
pub use executor::QueryEngine;
pub use join::{join_specs, JoinResolver, JoinSpec, Multiplicity};
pub use operator::{operands, translate, Operands};
pub use pagination::{CacheKey, CursorCache, StartPoint};
pub use path::{resolve_path, RelationshipCrossing, ResolvedPath};
pub use projection::{compile_projection, Projection};
pub use sort::{compile_sort, CompiledSort};
pub use where_clause::{CompiledCondition, TokenCounter, WhereCompiler};
