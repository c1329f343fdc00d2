//! Continuation-token bookkeeping for numbered pages.
//!
//! The store only resumes a read from a continuation token, so page N of a request
//! can be fetched directly only when the token that ended page N-1 is known. The
//! [`CursorCache`] remembers those tokens per request shape.
//!
//! The cache is monotonic: a recorded token is kept until an explicit clear.
//! Concurrent requests for the same page may race to record; the first write that
//! lands wins and later writes are dropped.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use dashmap::DashMap;
use dynq_proto::Cursor;
use tracing::warn;

use super::projection::Projection;
use super::sort::CompiledSort;
use super::where_clause::CompiledCondition;

/// Identity of a paginated request: collection plus a fingerprint of its shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub collection: String,
    pub fingerprint: u64,
}

impl CacheKey {
    /// Fingerprint a compiled request.
    ///
    /// Unlike a plan fingerprint this includes operand values: a continuation token
    /// is only meaningful for the exact request that produced it.
    pub fn new(
        collection: &str,
        condition: Option<&CompiledCondition>,
        sort: &CompiledSort,
        limit: u32,
        locale: Option<&str>,
        projection: &Projection,
    ) -> Self {
        let mut hasher = DefaultHasher::new();

        if let Some(condition) = condition {
            condition.expression.hash(&mut hasher);
            condition.name_tokens.hash(&mut hasher);
            for (token, value) in &condition.value_tokens {
                token.hash(&mut hasher);
                value.to_string().hash(&mut hasher);
            }
        }

        sort.ascending.hash(&mut hasher);
        sort.index_id.hash(&mut hasher);
        sort.attribute_path.hash(&mut hasher);
        limit.hash(&mut hasher);
        locale.hash(&mut hasher);
        projection.expression.hash(&mut hasher);
        projection.names.hash(&mut hasher);

        Self {
            collection: collection.to_string(),
            fingerprint: hasher.finish(),
        }
    }
}

/// Where a page read starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPoint {
    /// From the first item.
    Beginning,
    /// Immediately after the given token.
    After(Cursor),
    /// Pages `from_page..page` must be read (and discarded) first, starting after
    /// `from` or from the beginning.
    Replay { from_page: u32, from: Option<Cursor> },
}

/// Per-engine cache of the token ending each `(request, page)`.
#[derive(Debug, Default)]
pub struct CursorCache {
    entries: DashMap<(CacheKey, u32), Cursor>,
}

impl CursorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide where reading `page` starts.
    pub fn plan(&self, key: &CacheKey, page: u32, supplied: Option<&Cursor>) -> StartPoint {
        if let Some(cursor) = supplied {
            return StartPoint::After(cursor.clone());
        }
        if page <= 1 {
            return StartPoint::Beginning;
        }
        if let Some(cursor) = self.get(key, page - 1) {
            return StartPoint::After(cursor);
        }

        let nearest = (1..page - 1)
            .rev()
            .find_map(|p| self.get(key, p).map(|cursor| (p, cursor)));

        match nearest {
            Some((p, cursor)) => StartPoint::Replay {
                from_page: p + 1,
                from: Some(cursor),
            },
            None => StartPoint::Replay {
                from_page: 1,
                from: None,
            },
        }
    }

    /// Record the token that ended `page`. Returns `false` if one was already kept.
    pub fn record(&self, key: &CacheKey, page: u32, cursor: &Cursor) -> bool {
        let mut inserted = false;
        let entry = self
            .entries
            .entry((key.clone(), page))
            .or_insert_with(|| {
                inserted = true;
                cursor.clone()
            });

        if !inserted && entry.value() != cursor {
            warn!(
                collection = %key.collection,
                page,
                "dropped cursor write; page already has a recorded cursor"
            );
        }
        inserted
    }

    /// The token that ended `page`, if recorded.
    pub fn get(&self, key: &CacheKey, page: u32) -> Option<Cursor> {
        self.entries
            .get(&(key.clone(), page))
            .map(|entry| entry.value().clone())
    }

    /// Forget everything.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Forget every request of one collection.
    pub fn clear_collection(&self, collection: &str) {
        self.entries.retain(|(key, _), _| key.collection != collection);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
