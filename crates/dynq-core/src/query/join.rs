//! Relationship joins: batch-fetch referenced documents and splice them into parents.
//!
//! Resolution runs in three phases:
//! 1. Collect: walk every parent along each join path and gather referenced ids per
//!    target collection.
//! 2. Fetch: issue chunked batched gets for every (path, target) concurrently,
//!    resubmitting keys the store leaves unprocessed.
//! 3. Splice: replace each reference with its document. References whose document
//!    does not exist keep their original value.
//!
//! Any fetch failure fails the whole resolution; nothing is spliced in that case.

use std::collections::{BTreeMap, HashMap};

use dynq_proto::{Document, JoinQuery};
use futures::future::try_join_all;
use serde_json::{Map, Value};
use tracing::debug;

use super::path::resolve_path;
use crate::catalog::{Catalog, CollectionDef};
use crate::error::{CompileError, Error};
use crate::storage::{BatchGetRequest, Item, Store, StoreError};
use crate::transform::Transform;

/// Attribute naming the target collection of a polymorphic reference.
const RELATION_TO: &str = "relationTo";
/// Attribute holding the referenced id of a polymorphic reference.
const RELATION_VALUE: &str = "value";

/// Whether a relationship holds one reference or a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    One,
    Many,
}

/// A join path checked against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    /// The path as requested.
    pub path: String,
    /// Stored attribute segments leading to the references.
    pub segments: Vec<String>,
    /// Target collections; more than one for polymorphic relationships.
    pub targets: Vec<String>,
    pub multiplicity: Multiplicity,
    /// The relationship field is localized; `segments` already carry the locale.
    pub localized: bool,
}

impl JoinSpec {
    pub fn is_polymorphic(&self) -> bool {
        self.targets.len() > 1
    }

    /// The (target, id) a stored reference points at.
    fn reference<'v>(&'v self, value: &'v Value) -> Option<(&'v str, &'v Value)> {
        match value {
            Value::String(_) | Value::Number(_) if !self.is_polymorphic() => {
                self.targets.first().map(|t| (t.as_str(), value))
            }
            Value::Object(map) => {
                let target = map.get(RELATION_TO)?.as_str()?;
                let id = map.get(RELATION_VALUE)?;
                let known = self.targets.iter().any(|t| t == target);
                (known && is_id(id)).then_some((target, id))
            }
            _ => None,
        }
    }
}

/// Check join paths against a collection.
pub fn join_specs(
    joins: &JoinQuery,
    catalog: &Catalog,
    collection: &CollectionDef,
    locale: Option<&str>,
) -> Result<Vec<JoinSpec>, CompileError> {
    joins
        .keys()
        .map(|path| {
            let resolved = resolve_path(catalog, collection, path, locale)
                .map_err(|_| CompileError::unknown_join_path(path.as_str()))?;

            let def = match resolved.terminal.def() {
                Some(def) if def.field_type.is_reference() && resolved.crossing.is_none() => def,
                _ => return Err(CompileError::unknown_join_path(path.as_str())),
            };

            Ok(JoinSpec {
                path: path.clone(),
                segments: resolved.attributes,
                targets: def.relation_to.clone(),
                multiplicity: if def.has_many {
                    Multiplicity::Many
                } else {
                    Multiplicity::One
                },
                localized: def.localized,
            })
        })
        .collect()
}

/// Referenced ids per target, keyed by their canonical string form.
type IdsByTarget = BTreeMap<String, BTreeMap<String, Value>>;
/// Fetched documents per target, keyed by canonical id.
type DocsByTarget = HashMap<String, HashMap<String, Document>>;

/// Resolves joins for one request.
pub struct JoinResolver<'a> {
    store: &'a dyn Store,
    catalog: &'a Catalog,
    transform: &'a dyn Transform,
    batch_size: usize,
}

impl<'a> JoinResolver<'a> {
    pub fn new(
        store: &'a dyn Store,
        catalog: &'a Catalog,
        transform: &'a dyn Transform,
        batch_size: usize,
    ) -> Self {
        let batch_size = batch_size.min(store.max_batch_get_keys()).max(1);
        Self {
            store,
            catalog,
            transform,
            batch_size,
        }
    }

    /// Resolve every join path, augmenting `docs` in place.
    pub async fn resolve(&self, docs: &mut [Document], specs: &[JoinSpec]) -> Result<(), Error> {
        if docs.is_empty() || specs.is_empty() {
            return Ok(());
        }

        // Collect
        let wanted: Vec<IdsByTarget> = specs.iter().map(|spec| collect_ids(docs, spec)).collect();

        // Fetch
        let fetched: Vec<DocsByTarget> = try_join_all(
            specs
                .iter()
                .zip(&wanted)
                .map(|(spec, ids)| self.fetch_path(spec, ids)),
        )
        .await?;

        // Splice
        for (spec, found) in specs.iter().zip(&fetched) {
            for doc in docs.iter_mut() {
                visit_references_mut(doc, &spec.segments, &mut |value| {
                    splice(spec, found, value);
                });
            }
        }

        Ok(())
    }

    async fn fetch_path(&self, spec: &JoinSpec, ids: &IdsByTarget) -> Result<DocsByTarget, Error> {
        debug!(
            path = %spec.path,
            multiplicity = ?spec.multiplicity,
            localized = spec.localized,
            targets = ids.len(),
            ids = ids.values().map(BTreeMap::len).sum::<usize>(),
            "resolving join"
        );

        let results = try_join_all(
            ids.iter()
                .map(|(target, ids)| self.fetch_target(target, ids.values().cloned().collect())),
        )
        .await?;

        Ok(ids.keys().cloned().zip(results).collect())
    }

    async fn fetch_target(
        &self,
        target: &str,
        ids: Vec<Value>,
    ) -> Result<HashMap<String, Document>, Error> {
        let collection = self
            .catalog
            .collection(target)
            .ok_or_else(|| Error::UnknownCollection(target.to_string()))?;
        let partition_key = collection.table.partition_key.as_str();

        let chunks = try_join_all(ids.chunks(self.batch_size).map(|chunk| {
            let keys: Vec<Item> = chunk
                .iter()
                .map(|id| {
                    let mut key = Map::new();
                    key.insert(partition_key.to_string(), id.clone());
                    key
                })
                .collect();
            self.fetch_chunk(&collection.table.name, keys)
        }))
        .await?;

        let mut found = HashMap::new();
        for item in chunks.into_iter().flatten() {
            let Some(id) = item.get(partition_key).and_then(id_key) else {
                continue;
            };
            found.insert(id, self.transform.read(target, item)?);
        }
        Ok(found)
    }

    async fn fetch_chunk(&self, table: &str, keys: Vec<Item>) -> Result<Vec<Item>, Error> {
        let mut items = Vec::new();
        let mut pending = keys;

        while !pending.is_empty() {
            let submitted = pending.len();
            let output = self
                .store
                .batch_get(BatchGetRequest {
                    table: table.to_string(),
                    keys: pending,
                    ..Default::default()
                })
                .await?;
            if output.items.is_empty() && output.unprocessed_keys.len() >= submitted {
                return Err(StoreError::Throttled(format!(
                    "batched get on '{}' made no progress",
                    table
                ))
                .into());
            }
            items.extend(output.items);
            pending = output.unprocessed_keys;
        }

        Ok(items)
    }
}

fn collect_ids(docs: &[Document], spec: &JoinSpec) -> IdsByTarget {
    let mut ids = IdsByTarget::new();
    for doc in docs {
        visit_references(doc, &spec.segments, &mut |value| {
            if let Some((target, id)) = spec.reference(value) {
                if let Some(key) = id_key(id) {
                    ids.entry(target.to_string())
                        .or_default()
                        .insert(key, id.clone());
                }
            }
        });
    }
    ids
}

fn splice(spec: &JoinSpec, found: &DocsByTarget, value: &mut Value) {
    let Some((target, id)) = spec.reference(value) else {
        return;
    };
    let Some(doc) = id_key(id).and_then(|key| found.get(target)?.get(&key)) else {
        return;
    };
    let doc = Value::Object(doc.clone());

    match value {
        Value::Object(reference) => {
            reference.insert(RELATION_VALUE.to_string(), doc);
        }
        other => *other = doc,
    }
}

fn is_id(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_))
}

fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Call `f` on every reference found along `segments`.
///
/// Intermediate values may be objects or arrays of objects; a terminal array is a
/// list of references.
fn visit_references(doc: &Map<String, Value>, segments: &[String], f: &mut impl FnMut(&Value)) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if let Some(value) = doc.get(first) {
        visit_value(value, rest, f);
    }
}

fn visit_value(value: &Value, segments: &[String], f: &mut impl FnMut(&Value)) {
    match (value, segments.split_first()) {
        (Value::Array(items), _) => {
            for item in items {
                visit_value(item, segments, f);
            }
        }
        (Value::Object(map), Some((first, rest))) => {
            if let Some(next) = map.get(first) {
                visit_value(next, rest, f);
            }
        }
        (_, None) => f(value),
        _ => {}
    }
}

fn visit_references_mut(
    doc: &mut Map<String, Value>,
    segments: &[String],
    f: &mut impl FnMut(&mut Value),
) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if let Some(value) = doc.get_mut(first) {
        visit_value_mut(value, rest, f);
    }
}

fn visit_value_mut(value: &mut Value, segments: &[String], f: &mut impl FnMut(&mut Value)) {
    if let Value::Array(items) = value {
        for item in items {
            visit_value_mut(item, segments, f);
        }
        return;
    }

    match segments.split_first() {
        Some((first, rest)) => {
            if let Some(next) = value.as_object_mut().and_then(|map| map.get_mut(first)) {
                visit_value_mut(next, rest, f);
            }
        }
        None => f(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, FieldType};
    use crate::error::CompileErrorKind;
    use dynq_proto::JoinConfig;
    use serde_json::json;

    fn catalog() -> Catalog {
        Catalog::new()
            .with_collection(CollectionDef::new("users"))
            .with_collection(CollectionDef::new("teams"))
            .with_collection(
                CollectionDef::new("posts")
                    .with_field(FieldDef::new("title", FieldType::Text))
                    .with_field(FieldDef::relationship("author", "users"))
                    .with_field(FieldDef::relationship("reviewers", "users").has_many())
                    .with_field(
                        FieldDef::new("owner", FieldType::Relationship)
                            .with_relation_to(vec!["users".into(), "teams".into()]),
                    )
                    .with_field(
                        FieldDef::new("sections", FieldType::Array)
                            .with_fields(vec![FieldDef::relationship("editor", "users")]),
                    ),
            )
    }

    fn joins(paths: &[&str]) -> JoinQuery {
        paths
            .iter()
            .map(|p| (p.to_string(), JoinConfig::default()))
            .collect()
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_join_specs() {
        let catalog = catalog();
        let posts = catalog.collection("posts").unwrap();

        let specs =
            join_specs(&joins(&["author", "owner", "reviewers"]), &catalog, posts, None).unwrap();
        assert_eq!(specs.len(), 3);
        let owner = specs.iter().find(|s| s.path == "owner").unwrap();
        assert!(owner.is_polymorphic());
        let reviewers = specs.iter().find(|s| s.path == "reviewers").unwrap();
        assert_eq!(reviewers.multiplicity, Multiplicity::Many);
        assert!(!reviewers.localized);

        let err = join_specs(&joins(&["title"]), &catalog, posts, None).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::UnknownJoinPath);
        let err = join_specs(&joins(&["nope"]), &catalog, posts, None).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::UnknownJoinPath);
    }

    #[test]
    fn test_collect_ids_across_shapes() {
        let catalog = catalog();
        let posts = catalog.collection("posts").unwrap();
        let paths = joins(&["owner", "sections.editor", "reviewers"]);
        let specs = join_specs(&paths, &catalog, posts, None).unwrap();

        let docs = vec![
            doc(json!({
                "id": "p1",
                "owner": {"relationTo": "teams", "value": "t1"},
                "sections": [{"editor": "u1"}, {"editor": "u2"}],
                "reviewers": ["u2", "u3"]
            })),
            doc(json!({
                "id": "p2",
                "owner": {"relationTo": "users", "value": "u1"},
                "sections": [{"editor": "u1"}]
            })),
        ];

        let owner = collect_ids(&docs, &specs[0]);
        assert_eq!(owner["teams"].len(), 1);
        assert_eq!(owner["users"].len(), 1);

        let reviewers = collect_ids(&docs, &specs[1]);
        assert_eq!(reviewers["users"].keys().collect::<Vec<_>>(), vec!["u2", "u3"]);

        let editors = collect_ids(&docs, &specs[2]);
        assert_eq!(editors["users"].len(), 2);
    }

    #[test]
    fn test_splice_keeps_unresolved_references() {
        let catalog = catalog();
        let posts = catalog.collection("posts").unwrap();
        let specs = join_specs(&joins(&["reviewers", "owner"]), &catalog, posts, None).unwrap();
        let (owner, reviewers) = (&specs[0], &specs[1]);

        let mut found = DocsByTarget::new();
        found
            .entry("users".to_string())
            .or_default()
            .insert("u1".to_string(), doc(json!({"id": "u1", "name": "Ada"})));

        let mut post = doc(json!({
            "reviewers": ["u1", "u9"],
            "owner": {"relationTo": "users", "value": "u1"}
        }));
        visit_references_mut(&mut post, &reviewers.segments, &mut |v| splice(reviewers, &found, v));
        visit_references_mut(&mut post, &owner.segments, &mut |v| splice(owner, &found, v));

        assert_eq!(
            Value::Object(post),
            json!({
                "reviewers": [{"id": "u1", "name": "Ada"}, "u9"],
                "owner": {"relationTo": "users", "value": {"id": "u1", "name": "Ada"}}
            })
        );
    }
}
