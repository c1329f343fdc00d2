//! Result types for read responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cursor::Cursor;

/// A decoded document in its public shape.
pub type Document = Map<String, Value>;

/// One page of documents plus pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedDocs {
    pub docs: Vec<Document>,
    pub limit: u32,
    pub page: u32,
    pub total_docs: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub next_page: Option<u32>,
    pub prev_page: Option<u32>,
    pub paging_counter: u64,
    /// Continuation token for the following page, if the store reported one.
    pub next_cursor: Option<Cursor>,
}

impl PaginatedDocs {
    /// Build page metadata.
    ///
    /// When `total_docs` is `None` the total is inferred from the documents seen so
    /// far and `has_next_page` falls back to the presence of a continuation token.
    pub fn new(
        docs: Vec<Document>,
        limit: u32,
        page: u32,
        total_docs: Option<u64>,
        next_cursor: Option<Cursor>,
    ) -> Self {
        let limit = limit.max(1);
        let page = page.max(1);
        let offset = u64::from(page - 1) * u64::from(limit);

        let (total_docs, has_next_page) = match total_docs {
            Some(total) => (total, offset + (docs.len() as u64) < total),
            None => (offset + docs.len() as u64, next_cursor.is_some()),
        };
        let total_pages = total_docs.div_ceil(u64::from(limit));
        let has_prev_page = page > 1;

        Self {
            docs,
            limit,
            page,
            total_docs,
            total_pages,
            has_next_page,
            has_prev_page,
            next_page: has_next_page.then(|| page + 1),
            prev_page: has_prev_page.then(|| page - 1),
            paging_counter: offset + 1,
            next_cursor,
        }
    }

    /// An empty page.
    pub fn empty(limit: u32, page: u32) -> Self {
        Self::new(Vec::new(), limit, page, Some(0), None)
    }
}
