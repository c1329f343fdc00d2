//! Sled-backed implementation of the store interface.
//!
//! Each table lives in its own tree keyed by the encoded primary key, and table
//! descriptions are persisted in a `meta` tree. Secondary indexes are not
//! materialized: an index read walks the table, keeps items carrying the index key
//! attributes and orders them by index key.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use dynq_lang::{
    parse_condition, parse_projection, Bindings, Comparator, Condition, DocumentPath, Evaluator,
    Operand, ResolvedElement,
};
use parking_lot::RwLock;
use serde_json::Value;
use sled::{Db, Tree};
use tracing::{debug, trace};

use super::config::StoreConfig;
use super::error::StoreError;
use super::key::{encode_attributes, encode_value, extract_key};
use super::store::{
    BatchGetOutput, BatchGetRequest, Item, ReadOutput, ReadRequest, ReadSelect, Store,
};
use crate::catalog::TableDef;

/// Tree name for table descriptions.
const META_TREE: &str = "meta";

/// Prefix of table description keys in the meta tree.
const TABLE_PREFIX: &str = "table:";

#[derive(Clone)]
struct LocalTable {
    def: TableDef,
    tree: Tree,
}

impl LocalTable {
    fn primary_attributes(&self) -> Vec<&str> {
        let mut attributes = vec![self.def.partition_key.as_str()];
        attributes.extend(self.def.sort_key.as_deref());
        attributes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadKind {
    Query,
    Scan,
}

/// A local, embedded store.
pub struct LocalStore {
    db: Db,
    meta_tree: Tree,
    tables: RwLock<HashMap<String, LocalTable>>,
    max_batch_get_keys: usize,
}

impl LocalStore {
    /// Open or create a store with the given configuration.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let db = config.to_sled_config().open()?;
        let meta_tree = db.open_tree(META_TREE)?;

        let mut tables = HashMap::new();
        for entry in meta_tree.scan_prefix(TABLE_PREFIX) {
            let (_, bytes) = entry?;
            let def: TableDef = serde_json::from_slice(&bytes)?;
            let tree = db.open_tree(table_tree_name(&def.name))?;
            tables.insert(def.name.clone(), LocalTable { def, tree });
        }

        debug!(tables = tables.len(), "opened local store");

        Ok(Self {
            db,
            meta_tree,
            tables: RwLock::new(tables),
            max_batch_get_keys: config.max_batch_get_keys,
        })
    }

    /// Check if the database was recovered from a previous run.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// Create a table, or update the description of an existing one.
    pub fn create_table(&self, def: TableDef) -> Result<(), StoreError> {
        let key = format!("{}{}", TABLE_PREFIX, def.name);
        self.meta_tree.insert(key.as_bytes(), serde_json::to_vec(&def)?)?;

        let tree = self.db.open_tree(table_tree_name(&def.name))?;
        self.tables
            .write()
            .insert(def.name.clone(), LocalTable { def, tree });
        Ok(())
    }

    /// Names of all tables.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Insert or replace an item.
    pub fn put_item(&self, table: &str, item: Item) -> Result<(), StoreError> {
        let table = self.table(table)?;
        let key = encode_attributes(&item, &table.primary_attributes())?;
        table.tree.insert(key, serde_json::to_vec(&item)?)?;
        Ok(())
    }

    /// Number of items stored in a table.
    pub fn item_count(&self, table: &str) -> Result<usize, StoreError> {
        Ok(self.table(table)?.tree.len())
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn table(&self, name: &str) -> Result<LocalTable, StoreError> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::ResourceNotFound(format!("table '{}'", name)))
    }

    fn read(&self, request: &ReadRequest, kind: ReadKind) -> Result<ReadOutput, StoreError> {
        let table = self.table(&request.table)?;
        let schema = table
            .def
            .key_schema(request.index_name.as_deref())
            .ok_or_else(|| {
                StoreError::validation(format!(
                    "table '{}' has no index '{}'",
                    table.def.name,
                    request.index_name.as_deref().unwrap_or_default()
                ))
            })?;

        if request.limit == Some(0) {
            return Err(StoreError::validation("limit must be at least 1"));
        }

        let evaluator = Evaluator::new(Bindings {
            names: &request.names,
            values: &request.values,
        });

        let mut ordering = Vec::new();
        if schema.index.is_some() {
            ordering.push(schema.partition_key);
            ordering.extend(schema.sort_key);
        }
        ordering.extend(table.primary_attributes());

        let key_condition = match kind {
            ReadKind::Scan => None,
            ReadKind::Query => {
                let source = request.key_condition.as_deref().ok_or_else(|| {
                    StoreError::validation("query requires a key condition expression")
                })?;
                let condition = parse_condition(source)?;
                let partition = validate_key_condition(
                    &condition,
                    &evaluator,
                    request,
                    schema.partition_key,
                    schema.sort_key,
                )?;
                Some((condition, partition))
            }
        };
        let filter = request.filter.as_deref().map(parse_condition).transpose()?;
        let projection = request
            .projection
            .as_deref()
            .map(parse_projection)
            .transpose()?;

        // A table query only needs the items of one partition.
        let entries = match (&key_condition, schema.index) {
            (Some((_, partition)), None) => {
                let mut prefix = Vec::new();
                encode_value(partition, &mut prefix)?;
                table.tree.scan_prefix(prefix)
            }
            _ => table.tree.iter(),
        };

        let mut candidates: Vec<(Vec<u8>, Item)> = Vec::new();
        for entry in entries {
            let (_, bytes) = entry?;
            let item: Item = serde_json::from_slice(&bytes)?;

            // Items lacking an index key attribute are not part of the index.
            let Ok(position) = encode_attributes(&item, &ordering) else {
                continue;
            };
            if let Some((condition, _)) = &key_condition {
                if !evaluator.evaluate(condition, &item)? {
                    continue;
                }
            }
            candidates.push((position, item));
        }

        if schema.index.is_some() {
            candidates.sort_by(|a, b| a.0.cmp(&b.0));
        }

        let forward = kind == ReadKind::Scan || request.scan_forward;
        if !forward {
            candidates.reverse();
        }

        let start = match &request.exclusive_start_key {
            None => 0,
            Some(start_key) => {
                let start_position = encode_attributes(start_key, &ordering)?;
                candidates
                    .iter()
                    .position(|(p, _)| {
                        if forward {
                            *p > start_position
                        } else {
                            *p < start_position
                        }
                    })
                    .unwrap_or(candidates.len())
            }
        };

        let remaining = &candidates[start..];
        let evaluated = &remaining[..remaining.len().min(request.limit.unwrap_or(usize::MAX))];

        let mut output = ReadOutput::default();
        for (_, item) in evaluated {
            if let Some(filter) = &filter {
                if !evaluator.evaluate(filter, item)? {
                    continue;
                }
            }
            output.count += 1;
            if request.select == ReadSelect::Items {
                output.items.push(match &projection {
                    Some(paths) => evaluator.project(paths, item)?,
                    None => item.clone(),
                });
            }
        }

        if evaluated.len() < remaining.len() {
            if let Some((_, last)) = evaluated.last() {
                output.last_evaluated_key = Some(extract_key(last, &ordering));
            }
        }

        trace!(
            table = %request.table,
            index = ?request.index_name,
            kind = ?kind,
            evaluated = evaluated.len(),
            matched = output.count,
            more = output.last_evaluated_key.is_some(),
            "local read"
        );

        Ok(output)
    }

    fn get_batch(&self, request: &BatchGetRequest) -> Result<BatchGetOutput, StoreError> {
        if request.keys.len() > self.max_batch_get_keys {
            return Err(StoreError::validation(format!(
                "batch get accepts at most {} keys, got {}",
                self.max_batch_get_keys,
                request.keys.len()
            )));
        }

        let table = self.table(&request.table)?;
        let primary = table.primary_attributes();
        let projection = request
            .projection
            .as_deref()
            .map(parse_projection)
            .transpose()?;
        let values = BTreeMap::new();
        let evaluator = Evaluator::new(Bindings {
            names: &request.names,
            values: &values,
        });

        let mut output = BatchGetOutput::default();
        for key in &request.keys {
            let encoded = encode_attributes(key, &primary)?;
            if let Some(bytes) = table.tree.get(encoded)? {
                let item: Item = serde_json::from_slice(&bytes)?;
                output.items.push(match &projection {
                    Some(paths) => evaluator.project(paths, &item)?,
                    None => item,
                });
            }
        }

        Ok(output)
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn query(&self, request: ReadRequest) -> Result<ReadOutput, StoreError> {
        self.read(&request, ReadKind::Query)
    }

    async fn scan(&self, request: ReadRequest) -> Result<ReadOutput, StoreError> {
        self.read(&request, ReadKind::Scan)
    }

    async fn batch_get(&self, request: BatchGetRequest) -> Result<BatchGetOutput, StoreError> {
        self.get_batch(&request)
    }

    fn max_batch_get_keys(&self) -> usize {
        self.max_batch_get_keys
    }
}

fn table_tree_name(table: &str) -> String {
    format!("{}{}", TABLE_PREFIX, table)
}

/// Check that a key condition only references key attributes and pins the partition
/// key with an equality. Returns the partition key value.
fn validate_key_condition<'r>(
    condition: &Condition,
    evaluator: &Evaluator<'_>,
    request: &'r ReadRequest,
    partition_key: &str,
    sort_key: Option<&str>,
) -> Result<&'r Value, StoreError> {
    let attribute = |path: &DocumentPath| -> Result<String, StoreError> {
        match evaluator.resolve(path)?.as_slice() {
            [ResolvedElement::Key(name)] => Ok(name.clone()),
            _ => Err(StoreError::validation(format!(
                "key condition path '{}' is not a top-level attribute",
                path
            ))),
        }
    };

    for path in condition.paths() {
        let name = attribute(path)?;
        if name != partition_key && Some(name.as_str()) != sort_key {
            return Err(StoreError::validation(format!(
                "key condition references non-key attribute '{}'",
                name
            )));
        }
    }

    let conjuncts = match condition {
        Condition::And(children) => children.as_slice(),
        other => std::slice::from_ref(other),
    };

    let mut partition = None;
    for conjunct in conjuncts {
        match conjunct {
            Condition::Compare {
                left: Operand::Path(path),
                op: Comparator::Eq,
                right: Operand::Value(token),
            } if attribute(path)? == partition_key => {
                partition = request.values.get(token);
            }
            Condition::Compare { .. } | Condition::Between { .. } | Condition::Function(_) => {}
            _ => {
                return Err(StoreError::validation(
                    "key condition supports only AND of comparisons, BETWEEN and begins_with",
                ))
            }
        }
    }

    partition.ok_or_else(|| {
        StoreError::validation(format!(
            "key condition must test '{}' for equality",
            partition_key
        ))
    })
}
