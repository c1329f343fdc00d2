//! Compilation of sort specifications.

use dynq_proto::sort::{SortSpec, SortTerm};

use super::path::resolve_path;
use crate::catalog::{Catalog, CollectionDef};
use crate::error::Error;

/// The single ordering directive a store read can honour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSort {
    pub ascending: bool,
    /// Secondary index the ordering requires, if any.
    pub index_id: Option<String>,
    /// Stored attribute path being ordered by (dotted, locale included).
    pub attribute_path: String,
    /// The field path as requested.
    pub field: String,
}

/// Compile the authoritative (first) term of a sort specification.
///
/// An empty specification falls back to the collection's default sort. A path that
/// crosses a relationship is ordered through the derived index
/// `<relationshipPath>_<terminalPath>_index`.
pub fn compile_sort(
    spec: &SortSpec,
    catalog: &Catalog,
    collection: &CollectionDef,
    locale: Option<&str>,
) -> Result<CompiledSort, Error> {
    let term = match spec.primary() {
        Some(term) => term.clone(),
        None => collection.default_sort().parse::<SortTerm>()?,
    };

    let resolved = resolve_path(catalog, collection, &term.field, locale)?;
    let index_id = resolved
        .crossing
        .as_ref()
        .map(|crossing| format!("{}_{}_index", crossing.relationship_path, crossing.remainder));

    Ok(CompiledSort {
        ascending: term.is_ascending(),
        index_id,
        attribute_path: resolved.dotted(),
        field: term.field,
    })
}
