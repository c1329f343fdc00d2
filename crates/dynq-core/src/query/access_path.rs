//! Choice between an indexed lookup and a full scan.

use super::sort::CompiledSort;
use super::where_clause::CompiledCondition;

/// How a read reaches its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    /// Key-condition query.
    Indexed,
    /// Full scan with the whole filter applied after the read.
    Scan,
}

/// The read plan for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPath {
    pub kind: AccessKind,
    /// Secondary index to read; `None` reads the table.
    pub index_id: Option<String>,
    pub ascending: bool,
}

impl AccessPath {
    pub fn is_indexed(&self) -> bool {
        self.kind == AccessKind::Indexed
    }
}

/// Select the access path for a compiled filter and sort.
///
/// A query is used only when the filter pins a key and the sort either needs no index
/// or needs the very index that key belongs to. Anything else scans, over the sort's
/// index when it has one.
pub fn select_access_path(condition: Option<&CompiledCondition>, sort: &CompiledSort) -> AccessPath {
    if let Some(condition) = condition {
        let sort_compatible = sort.index_id.is_none() || sort.index_id == condition.key_index;
        if condition.key_portion.is_some() && sort_compatible {
            return AccessPath {
                kind: AccessKind::Indexed,
                index_id: condition.key_index.clone(),
                ascending: sort.ascending,
            };
        }
    }

    AccessPath {
        kind: AccessKind::Scan,
        index_id: sort.index_id.clone(),
        ascending: sort.ascending,
    }
}
