//! Query engine: runs find, find-one and count requests against a store.
//!
//! The engine compiles a request, picks its access path, reads pages from the store
//! and assembles the public result: transformed documents, resolved joins and
//! pagination metadata. It owns the cursor cache that maps numbered pages onto the
//! store's continuation tokens.

use std::sync::Arc;

use dynq_proto::{
    CountArgs, Cursor, Document, FilterNode, FindArgs, FindOneArgs, PaginatedDocs, SortSpec,
};
use tracing::{debug, warn};

use super::access_path::{select_access_path, AccessKind, AccessPath};
use super::join::{join_specs, JoinResolver, JoinSpec};
use super::pagination::{CacheKey, CursorCache, StartPoint};
use super::projection::{compile_projection, Projection};
use super::sort::{compile_sort, CompiledSort};
use super::where_clause::{CompiledCondition, TokenCounter, WhereCompiler};
use crate::catalog::{Catalog, CollectionDef};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::storage::{Item, ReadOutput, ReadRequest, ReadSelect, Store};
use crate::transform::{JsonTransform, Transform};

/// A compiled read: where the items come from and which of them match.
#[derive(Debug)]
struct ReadPlan<'c> {
    collection: &'c CollectionDef,
    condition: Option<CompiledCondition>,
    sort: CompiledSort,
    access: AccessPath,
}

impl ReadPlan<'_> {
    /// Build the store request for this plan. Paging fields are left unset.
    fn request(&self, projection: &Projection) -> ReadRequest {
        let mut request = ReadRequest::new(&self.collection.table.name);
        request.index_name = self.access.index_id.clone();
        request.scan_forward = self.access.ascending;
        request.projection = projection.expression.clone();
        request.names = projection.names.clone();

        if let Some(condition) = &self.condition {
            request
                .names
                .extend(condition.name_tokens.iter().map(|(k, v)| (k.clone(), v.clone())));
            request.values = condition.value_tokens.clone();
            match self.access.kind {
                AccessKind::Indexed => {
                    request.key_condition = condition.key_portion.clone();
                    request.filter = condition.filter_portion.clone();
                }
                AccessKind::Scan => request.filter = Some(condition.expression.clone()),
            }
        }

        request
    }
}

/// Items of one page and the key to continue after it.
struct PageRead {
    items: Vec<Item>,
    last_key: Option<Item>,
}

/// The engine instance. Cheap to share behind an `Arc`.
pub struct QueryEngine {
    store: Arc<dyn Store>,
    catalog: Arc<Catalog>,
    transform: Arc<dyn Transform>,
    cursors: CursorCache,
    config: EngineConfig,
}

impl QueryEngine {
    /// Create an engine storing documents as-is.
    pub fn new(store: Arc<dyn Store>, catalog: Arc<Catalog>) -> Self {
        Self {
            store,
            catalog,
            transform: Arc::new(JsonTransform),
            cursors: CursorCache::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The cursor cache shared by this engine's requests.
    pub fn cursors(&self) -> &CursorCache {
        &self.cursors
    }

    /// Fetch one page of documents.
    pub async fn find(&self, args: FindArgs) -> Result<PaginatedDocs> {
        let collection = self.collection(&args.collection)?;
        let locale = self.catalog.active_locale(args.locale.as_deref());

        let plan = self.plan(collection, args.filter.as_ref(), &args.sort, locale)?;
        let projection =
            compile_projection(args.select.as_ref(), &self.catalog, collection, locale)?;
        let joins = join_specs(&args.joins, &self.catalog, collection, locale)?;

        let limit = self.config.page_size(args.limit);
        let page = args.page.max(1);
        let key = CacheKey::new(
            &collection.slug,
            plan.condition.as_ref(),
            &plan.sort,
            limit,
            locale,
            &projection,
        );
        let template = plan.request(&projection);

        let start = match self.cursors.plan(&key, page, args.cursor.as_ref()) {
            StartPoint::Beginning => None,
            StartPoint::After(cursor) => Some(decode_cursor(&cursor)?),
            StartPoint::Replay { from_page, from } => {
                warn!(
                    collection = %collection.slug,
                    page,
                    from_page,
                    "no cursor cached for the previous page, replaying"
                );
                let resumed = self
                    .replay(&key, &plan, &template, from_page, page, from, limit)
                    .await?;
                match resumed {
                    Some(start) => Some(start),
                    None => {
                        let total = self.totals(&plan, args.pagination).await?;
                        return Ok(PaginatedDocs::new(Vec::new(), limit, page, total, None));
                    }
                }
            }
        };

        let read = self.fill_page(&plan, &template, start, limit).await?;
        let next_cursor = read.last_key.as_ref().map(Cursor::encode).transpose()?;

        let docs = self.assemble(collection, read.items, &joins).await?;
        let total = self.totals(&plan, args.pagination).await?;

        // A forwarded cursor without a page number says nothing about which page ended.
        let numbered = args.cursor.is_none() || page > 1;
        if let Some(cursor) = next_cursor.as_ref().filter(|_| numbered) {
            self.cursors.record(&key, page, cursor);
        }

        Ok(PaginatedDocs::new(docs, limit, page, total, next_cursor))
    }

    /// Fetch the first matching document, if any.
    pub async fn find_one(&self, args: FindOneArgs) -> Result<Option<Document>> {
        let collection = self.collection(&args.collection)?;
        let locale = self.catalog.active_locale(args.locale.as_deref());

        let plan = self.plan(collection, args.filter.as_ref(), &SortSpec::default(), locale)?;
        let projection =
            compile_projection(args.select.as_ref(), &self.catalog, collection, locale)?;
        let joins = join_specs(&args.joins, &self.catalog, collection, locale)?;

        let template = plan.request(&projection);
        let read = self.fill_page(&plan, &template, None, 1).await?;
        let docs = self.assemble(collection, read.items, &joins).await?;

        Ok(docs.into_iter().next())
    }

    /// Count matching documents.
    pub async fn count(&self, args: CountArgs) -> Result<u64> {
        let collection = self.collection(&args.collection)?;
        let locale = self.catalog.active_locale(args.locale.as_deref());

        let plan = self.plan(collection, args.filter.as_ref(), &SortSpec::default(), locale)?;
        self.count_matching(&plan).await
    }

    /// Forget every cached cursor.
    pub fn reset(&self) {
        self.cursors.clear();
    }

    /// Forget the cached cursors of one collection.
    pub fn clear_collection(&self, slug: &str) {
        self.cursors.clear_collection(slug);
    }

    fn collection(&self, slug: &str) -> Result<&CollectionDef> {
        self.catalog
            .collection(slug)
            .ok_or_else(|| Error::UnknownCollection(slug.to_string()))
    }

    fn plan<'c>(
        &'c self,
        collection: &'c CollectionDef,
        filter: Option<&FilterNode>,
        sort: &SortSpec,
        locale: Option<&'c str>,
    ) -> Result<ReadPlan<'c>> {
        let sort = compile_sort(sort, &self.catalog, collection, locale)?;

        let table = &collection.table;
        let key_schema = match &sort.index_id {
            None => table.primary_key(),
            Some(index) => table
                .key_schema(Some(index))
                .ok_or_else(|| Error::IndexResolution {
                    index: index.clone(),
                    table: table.name.clone(),
                    path: sort.field.clone(),
                })?,
        };

        let condition = match filter {
            Some(node) => {
                let (condition, _) = WhereCompiler::new(&self.catalog, collection, locale)
                    .with_key_schema(key_schema)
                    .compile(node, TokenCounter::new())?;
                Some(condition)
            }
            None => None,
        };

        let access = select_access_path(condition.as_ref(), &sort);

        debug!(
            collection = %collection.slug,
            access = ?access.kind,
            index = ?access.index_id,
            ascending = access.ascending,
            filter = ?condition.as_ref().map(|c| c.expression.as_str()),
            "planned read"
        );

        Ok(ReadPlan {
            collection,
            condition,
            sort,
            access,
        })
    }

    async fn read(&self, kind: AccessKind, request: ReadRequest) -> Result<ReadOutput> {
        debug!(
            table = %request.table,
            index = ?request.index_name,
            kind = ?kind,
            limit = ?request.limit,
            resumed = request.exclusive_start_key.is_some(),
            "store request"
        );

        let output = match kind {
            AccessKind::Indexed => self.store.query(request).await?,
            AccessKind::Scan => self.store.scan(request).await?,
        };
        Ok(output)
    }

    /// Read until `limit` items matched or the store has nothing more.
    ///
    /// A store limit bounds evaluated items, so a filtered read may need several
    /// requests to fill one page.
    async fn fill_page(
        &self,
        plan: &ReadPlan<'_>,
        template: &ReadRequest,
        start: Option<Item>,
        limit: u32,
    ) -> Result<PageRead> {
        let limit = limit as usize;
        let mut items = Vec::with_capacity(limit);
        let mut start = start;

        loop {
            let mut request = template.clone();
            request.limit = Some(limit - items.len());
            request.exclusive_start_key = start.take();

            let output = self.read(plan.access.kind, request).await?;
            items.extend(output.items);

            match output.last_evaluated_key {
                Some(key) if items.len() < limit => start = Some(key),
                last_key => return Ok(PageRead { items, last_key }),
            }
        }
    }

    /// Read and discard pages `from_page..page`, caching the cursor ending each.
    ///
    /// Returns the key to resume after for `page`, or `None` when the data ends first.
    #[allow(clippy::too_many_arguments)]
    async fn replay(
        &self,
        key: &CacheKey,
        plan: &ReadPlan<'_>,
        template: &ReadRequest,
        from_page: u32,
        page: u32,
        from: Option<Cursor>,
        limit: u32,
    ) -> Result<Option<Item>> {
        let mut start = from.as_ref().map(decode_cursor).transpose()?;

        for replayed in from_page..page {
            let read = self.fill_page(plan, template, start, limit).await?;
            let Some(last_key) = read.last_key else {
                debug!(collection = %key.collection, page = replayed, "data ended during replay");
                return Ok(None);
            };
            self.cursors.record(key, replayed, &Cursor::encode(&last_key)?);
            start = Some(last_key);
        }

        Ok(start)
    }

    async fn count_matching(&self, plan: &ReadPlan<'_>) -> Result<u64> {
        let mut request = plan.request(&Projection::all());
        request.select = ReadSelect::Count;

        let mut total = 0u64;
        loop {
            let output = self.read(plan.access.kind, request.clone()).await?;
            total += output.count as u64;
            match output.last_evaluated_key {
                Some(key) => request.exclusive_start_key = Some(key),
                None => return Ok(total),
            }
        }
    }

    async fn totals(&self, plan: &ReadPlan<'_>, pagination: bool) -> Result<Option<u64>> {
        if pagination && self.config.count_totals {
            Ok(Some(self.count_matching(plan).await?))
        } else {
            Ok(None)
        }
    }

    /// Transform stored items and resolve joins.
    async fn assemble(
        &self,
        collection: &CollectionDef,
        items: Vec<Item>,
        joins: &[JoinSpec],
    ) -> Result<Vec<Document>> {
        let mut docs = items
            .into_iter()
            .map(|item| self.transform.read(&collection.slug, item))
            .collect::<Result<Vec<_>>>()?;

        JoinResolver::new(
            self.store.as_ref(),
            &self.catalog,
            self.transform.as_ref(),
            self.config.batch_get_size,
        )
        .resolve(&mut docs, joins)
        .await?;

        Ok(docs)
    }
}

fn decode_cursor(cursor: &Cursor) -> Result<Item> {
    Ok(cursor.decode()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, FieldType, IndexDef, TableDef};
    use crate::storage::{LocalStore, StoreConfig};
    use serde_json::json;

    fn engine() -> (Arc<LocalStore>, QueryEngine) {
        let catalog = Catalog::new().with_collection(
            CollectionDef::new("events")
                .with_field(FieldDef::new("kind", FieldType::Text))
                .with_field(FieldDef::new("seq", FieldType::Number))
                .with_table(
                    TableDef::new("events")
                        .with_sort_key("seq")
                        .with_index(IndexDef::new("by_kind", "kind", Some("seq"))),
                ),
        );

        let store = Arc::new(LocalStore::open(StoreConfig::temporary()).unwrap());
        store
            .create_table(catalog.collection("events").unwrap().table.clone())
            .unwrap();
        let rows = [("a", 1, "click"), ("a", 2, "view"), ("a", 3, "click"), ("b", 1, "click")];
        for (id, seq, kind) in rows {
            let item = json!({"id": id, "seq": seq, "kind": kind});
            store.put_item("events", item.as_object().cloned().unwrap()).unwrap();
        }

        let engine = QueryEngine::new(store.clone(), Arc::new(catalog));
        (store, engine)
    }

    fn filter(value: serde_json::Value) -> FilterNode {
        FilterNode::from_json(&value).unwrap().unwrap()
    }

    #[test]
    fn test_plan_requests() {
        let (_store, engine) = engine();
        let events = engine.catalog().collection("events").unwrap();

        let keyed = filter(json!({"id": {"equals": "a"}, "kind": {"equals": "click"}}));
        let plan = engine.plan(events, Some(&keyed), &SortSpec::default(), None).unwrap();
        assert!(plan.access.is_indexed());

        let request = plan.request(&Projection::all());
        assert_eq!(request.key_condition.as_deref(), Some("#n0 = :v0"));
        assert_eq!(request.filter.as_deref(), Some("#n1 = :v1"));
        assert_eq!(request.names.len(), 2);

        let unkeyed = filter(json!({"kind": {"equals": "click"}}));
        let plan = engine.plan(events, Some(&unkeyed), &SortSpec::default(), None).unwrap();
        let request = plan.request(&Projection::all());
        assert_eq!(plan.access.kind, AccessKind::Scan);
        assert_eq!(request.key_condition, None);
        assert_eq!(request.filter.as_deref(), Some("#n0 = :v0"));
    }

    #[tokio::test]
    async fn test_filtered_page_is_filled() {
        let (_store, engine) = engine();

        // The first read evaluates a non-matching item, so a second read completes the page.
        let args = FindArgs::new("events")
            .with_filter(filter(json!({"kind": {"equals": "click"}})))
            .with_limit(3);
        let page = engine.find(args).await.unwrap();

        assert_eq!(page.docs.len(), 3);
        assert_eq!(page.total_docs, 3);
        assert!(!page.has_next_page);
    }

    #[tokio::test]
    async fn test_find_one_and_count() {
        let (_store, engine) = engine();

        let found = engine
            .find_one(
                FindOneArgs::new("events")
                    .with_filter(filter(json!({"id": {"equals": "a"}, "seq": {"equals": 2}}))),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["kind"], json!("view"));

        let none = engine
            .find_one(FindOneArgs::new("events").with_filter(filter(json!({"id": {"equals": "z"}}))))
            .await
            .unwrap();
        assert!(none.is_none());

        let count = engine
            .count(CountArgs::new("events").with_filter(filter(json!({"id": {"equals": "a"}}))))
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_unknown_collection_and_cursor() {
        let (_store, engine) = engine();

        let err = engine.find(FindArgs::new("nope")).await.unwrap_err();
        assert!(matches!(err, Error::UnknownCollection(_)));

        let args = FindArgs::new("events").with_cursor(Cursor::from_token("zz"));
        let err = engine.find(args).await.unwrap_err();
        assert!(matches!(err, Error::InvalidCursor(_)));
    }

    #[tokio::test]
    async fn test_reset_clears_cursors() {
        let (_store, engine) = engine();

        engine.find(FindArgs::new("events").with_limit(1)).await.unwrap();
        assert!(!engine.cursors().is_empty());

        engine.clear_collection("other");
        assert!(!engine.cursors().is_empty());
        engine.reset();
        assert!(engine.cursors().is_empty());
    }
}
