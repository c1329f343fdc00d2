//! Schema catalog: collections, their fields and the tables backing them.
//!
//! The engine consumes only what it needs to translate queries: each collection's
//! field list (name, type, subfields, localization, relationship targets) and the key
//! schema of its table and secondary indexes.

mod collection;
mod field;
mod registry;

pub use collection::{
    CollectionDef, FieldRef, IndexDef, KeySchema, TableDef, CREATED_AT_FIELD, ID_FIELD,
    UPDATED_AT_FIELD,
};
pub use field::{FieldDef, FieldType};
pub use registry::{Catalog, LocalizationConfig, ALL_LOCALES};
