//! Read request arguments.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::cursor::Cursor;
use crate::filter::FilterNode;
use crate::select::Select;
use crate::sort::SortSpec;

/// Per-path join configuration. Opaque to the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinConfig {
    pub options: Value,
}

/// Map from dotted relationship path to its join configuration.
pub type JoinQuery = BTreeMap<String, JoinConfig>;

/// Arguments for a paginated `find`.
#[derive(Debug, Clone, PartialEq)]
pub struct FindArgs {
    /// Collection slug.
    pub collection: String,
    /// Optional filter tree.
    pub filter: Option<FilterNode>,
    /// Sort specification (first term is authoritative).
    pub sort: SortSpec,
    /// Optional field selection.
    pub select: Option<Select>,
    /// Relationship paths to hydrate.
    pub joins: JoinQuery,
    /// Page size. `None` uses the engine default.
    pub limit: Option<u32>,
    /// 1-based page number.
    pub page: u32,
    /// Active locale code (`all` for every locale).
    pub locale: Option<String>,
    /// Continuation token returned with the previous page.
    pub cursor: Option<Cursor>,
    /// Whether to count matching documents for the page metadata.
    pub pagination: bool,
}

impl FindArgs {
    /// Create arguments for the first page of a collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: None,
            sort: SortSpec::default(),
            select: None,
            joins: JoinQuery::new(),
            limit: None,
            page: 1,
            locale: None,
            cursor: None,
            pagination: true,
        }
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: FilterNode) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the sort specification.
    pub fn with_sort(mut self, sort: impl Into<SortSpec>) -> Self {
        self.sort = sort.into();
        self
    }

    /// Set the field selection.
    pub fn with_select(mut self, select: Select) -> Self {
        self.select = Some(select);
        self
    }

    /// Add a join path with default configuration.
    pub fn join(mut self, path: impl Into<String>) -> Self {
        self.joins.insert(path.into(), JoinConfig::default());
        self
    }

    /// Set the page size.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the page number.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Set the locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Resume from a cursor returned by a previous page.
    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Skip counting the total number of matching documents.
    pub fn without_pagination(mut self) -> Self {
        self.pagination = false;
        self
    }
}

/// Arguments for `find_one`.
#[derive(Debug, Clone, PartialEq)]
pub struct FindOneArgs {
    pub collection: String,
    pub filter: Option<FilterNode>,
    pub select: Option<Select>,
    pub joins: JoinQuery,
    pub locale: Option<String>,
}

impl FindOneArgs {
    /// Create arguments for a collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: None,
            select: None,
            joins: JoinQuery::new(),
            locale: None,
        }
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: FilterNode) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the field selection.
    pub fn with_select(mut self, select: Select) -> Self {
        self.select = Some(select);
        self
    }

    /// Add a join path with default configuration.
    pub fn join(mut self, path: impl Into<String>) -> Self {
        self.joins.insert(path.into(), JoinConfig::default());
        self
    }

    /// Set the locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

/// Arguments for `count`.
#[derive(Debug, Clone, PartialEq)]
pub struct CountArgs {
    pub collection: String,
    pub filter: Option<FilterNode>,
    pub locale: Option<String>,
}

impl CountArgs {
    /// Create arguments for a collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: None,
            locale: None,
        }
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: FilterNode) -> Self {
        self.filter = Some(filter);
        self
    }
}
