//! The store interface consumed by the engine.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::error::StoreError;

/// A raw stored record.
pub type Item = Map<String, Value>;

/// Default upper bound on keys in one batched get.
pub const DEFAULT_MAX_BATCH_GET_KEYS: usize = 100;

/// What a read returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadSelect {
    /// Matching items.
    #[default]
    Items,
    /// Only the number of matching items.
    Count,
}

/// A query or scan request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadRequest {
    pub table: String,
    /// Secondary index to read instead of the table.
    pub index_name: Option<String>,
    /// Key condition (queries only).
    pub key_condition: Option<String>,
    /// Post-read filter expression.
    pub filter: Option<String>,
    pub projection: Option<String>,
    /// `#name` placeholder bindings shared by all expressions.
    pub names: BTreeMap<String, String>,
    /// `:value` placeholder bindings shared by all expressions.
    pub values: BTreeMap<String, Value>,
    /// Maximum number of items evaluated (not matched).
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Item>,
    /// Key order for queries; scans ignore it.
    pub scan_forward: bool,
    pub select: ReadSelect,
}

impl ReadRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            scan_forward: true,
            ..Default::default()
        }
    }
}

/// Result of a query or scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOutput {
    /// Matching items (empty for count requests).
    pub items: Vec<Item>,
    /// Number of matching items.
    pub count: usize,
    /// Present when more items may follow.
    pub last_evaluated_key: Option<Item>,
}

/// A batched primary-key lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetRequest {
    pub table: String,
    pub keys: Vec<Item>,
    pub projection: Option<String>,
    pub names: BTreeMap<String, String>,
}

/// Result of a batched lookup. Missing keys are simply absent from `items`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetOutput {
    pub items: Vec<Item>,
    /// Keys the store did not get to; callers resubmit them.
    pub unprocessed_keys: Vec<Item>,
}

/// A partition/sort-key addressed store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read items addressed by a key condition.
    async fn query(&self, request: ReadRequest) -> Result<ReadOutput, StoreError>;

    /// Read every item of a table or index.
    async fn scan(&self, request: ReadRequest) -> Result<ReadOutput, StoreError>;

    /// Fetch items by primary key.
    async fn batch_get(&self, request: BatchGetRequest) -> Result<BatchGetOutput, StoreError>;

    /// Largest number of keys accepted by one [`Store::batch_get`].
    fn max_batch_get_keys(&self) -> usize {
        DEFAULT_MAX_BATCH_GET_KEYS
    }
}
