//! dynq core - query translation, pagination and joins over partition/sort-key stores.
//!
//! This crate turns backend-agnostic find requests into the store's placeholder
//! condition expressions, pages through results with continuation tokens and
//! splices related documents into parents.

pub mod catalog;
pub mod config;
pub mod error;
pub mod query;
pub mod storage;
pub mod transform;

pub use catalog::{Catalog, CollectionDef, FieldDef, FieldType, IndexDef, LocalizationConfig, TableDef};
pub use config::EngineConfig;
pub use error::{CompileError, CompileErrorKind, Error, Result};
pub use query::QueryEngine;
pub use storage::{LocalStore, Store, StoreConfig, StoreError};
pub use transform::{JsonTransform, Transform};

/// Re-export protocol types.
pub use dynq_proto as proto;
