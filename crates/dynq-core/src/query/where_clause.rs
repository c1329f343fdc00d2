//! Compilation of filter trees into placeholder condition expressions.
//!
//! Every attribute-name segment and every operand gets a fresh placeholder, so the
//! same field appearing in two branches never collides. Allocation is driven by a
//! [`TokenCounter`] passed in and handed back, which makes compilation a pure
//! function of `(tree, counter)`.

use std::collections::BTreeMap;

use dynq_proto::{FilterNode, LeafNode, LogicalNode, LogicalOp, Operator};
use serde_json::Value;
use tracing::trace;

use super::operator::{operands, translate, Operands};
use super::path::resolve_path;
use crate::catalog::{Catalog, CollectionDef, KeySchema};
use crate::error::CompileError;

/// Next free name and value placeholder numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenCounter {
    pub names: u32,
    pub values: u32,
}

impl TokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_name(&mut self) -> String {
        let token = format!("#n{}", self.names);
        self.names += 1;
        token
    }

    fn next_value(&mut self) -> String {
        let token = format!(":v{}", self.values);
        self.values += 1;
        token
    }
}

/// A compiled filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledCondition {
    /// The whole filter as one expression.
    pub expression: String,
    /// `#nK` token to attribute name.
    pub name_tokens: BTreeMap<String, String>,
    /// `:vK` token to operand value.
    pub value_tokens: BTreeMap<String, Value>,
    /// Conditions on the active key, usable as a key condition.
    pub key_portion: Option<String>,
    /// The remaining conditions, applied after the read.
    pub filter_portion: Option<String>,
    /// Index addressed by `key_portion`; `None` means the table's primary key.
    pub key_index: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyRole {
    Partition,
    Sort,
}

/// A compiled node before key/filter splitting.
struct Fragment {
    expression: String,
    role: Option<KeyRole>,
    leaf: bool,
}

/// Compiles filter trees for one collection and request locale.
pub struct WhereCompiler<'c> {
    catalog: &'c Catalog,
    collection: &'c CollectionDef,
    locale: Option<&'c str>,
    key: KeySchema<'c>,
}

impl<'c> WhereCompiler<'c> {
    /// Create a compiler targeting the table's primary key.
    ///
    /// `locale` is the active locale (see [`Catalog::active_locale`]).
    pub fn new(catalog: &'c Catalog, collection: &'c CollectionDef, locale: Option<&'c str>) -> Self {
        Self {
            catalog,
            collection,
            locale,
            key: collection.table.primary_key(),
        }
    }

    /// Look for key conditions on a secondary index instead of the primary key.
    pub fn with_key_schema(mut self, key: KeySchema<'c>) -> Self {
        self.key = key;
        self
    }

    /// Compile a filter tree, starting token allocation at `counter`.
    pub fn compile(
        &self,
        node: &FilterNode,
        counter: TokenCounter,
    ) -> Result<(CompiledCondition, TokenCounter), CompileError> {
        let mut compiled = CompiledCondition::default();

        let (conjuncts, counter) = match node {
            FilterNode::Logical(LogicalNode {
                op: LogicalOp::And,
                children,
            }) if !children.is_empty() => {
                let mut counter = counter;
                let mut fragments = Vec::with_capacity(children.len());
                for child in children {
                    let (fragment, next) = self.compile_node(child, counter, &mut compiled)?;
                    fragments.push(fragment);
                    counter = next;
                }
                (fragments, counter)
            }
            _ => {
                let (fragment, counter) = self.compile_node(node, counter, &mut compiled)?;
                (vec![fragment], counter)
            }
        };

        compiled.expression = join(conjuncts.iter().map(|f| f.expression.as_str()), LogicalOp::And);
        self.split_key_portion(&conjuncts, &mut compiled);

        trace!(
            leaves = node.leaf_count(),
            names = compiled.name_tokens.len(),
            values = compiled.value_tokens.len(),
            keyed = compiled.key_portion.is_some(),
            "compiled filter"
        );

        Ok((compiled, counter))
    }

    fn compile_node(
        &self,
        node: &FilterNode,
        counter: TokenCounter,
        out: &mut CompiledCondition,
    ) -> Result<(Fragment, TokenCounter), CompileError> {
        match node {
            FilterNode::Leaf(leaf) => self.compile_leaf(leaf, counter, out),
            FilterNode::Logical(LogicalNode { op, children }) => {
                if children.is_empty() {
                    return Err(CompileError::malformed(
                        op.keyword().to_ascii_lowercase(),
                        "logical operator without conditions",
                    ));
                }

                let mut counter = counter;
                let mut parts = Vec::with_capacity(children.len());
                for child in children {
                    let (fragment, next) = self.compile_node(child, counter, out)?;
                    parts.push(fragment.expression);
                    counter = next;
                }

                let expression = join(parts.iter().map(String::as_str), *op);
                Ok((
                    Fragment {
                        expression,
                        role: None,
                        leaf: false,
                    },
                    counter,
                ))
            }
        }
    }

    fn compile_leaf(
        &self,
        leaf: &LeafNode,
        mut counter: TokenCounter,
        out: &mut CompiledCondition,
    ) -> Result<(Fragment, TokenCounter), CompileError> {
        let path = leaf.field_path.as_str();
        let operands = operands(leaf.operator, path, &leaf.value)?;
        let resolved = resolve_path(self.catalog, self.collection, path, self.locale)?;

        let field = resolved
            .attributes
            .iter()
            .map(|attribute| {
                let token = counter.next_name();
                out.name_tokens.insert(token.clone(), attribute.clone());
                token
            })
            .collect::<Vec<_>>()
            .join(".");

        let role = resolved
            .is_top_level()
            .then(|| key_role(&self.key, &resolved.attributes[0], leaf.operator, &operands))
            .flatten();

        let tokens: Operands<String> = operands.map(|value| {
            let token = counter.next_value();
            out.value_tokens.insert(token.clone(), value);
            token
        });

        let expression = translate(leaf.operator, path, &field, &tokens)?;
        Ok((
            Fragment {
                expression,
                role,
                leaf: true,
            },
            counter,
        ))
    }

    fn split_key_portion(&self, conjuncts: &[Fragment], compiled: &mut CompiledCondition) {
        let find = |role: KeyRole| {
            conjuncts
                .iter()
                .position(|f| f.leaf && f.role == Some(role))
        };

        let Some(partition) = find(KeyRole::Partition) else {
            compiled.filter_portion = Some(compiled.expression.clone());
            return;
        };
        let sort = find(KeyRole::Sort);

        let mut key = conjuncts[partition].expression.clone();
        if let Some(sort) = sort {
            key.push_str(" AND ");
            key.push_str(&conjuncts[sort].expression);
        }

        let rest: Vec<&str> = conjuncts
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != partition && Some(*i) != sort)
            .map(|(_, f)| f.expression.as_str())
            .collect();

        compiled.key_portion = Some(key);
        compiled.filter_portion = (!rest.is_empty()).then(|| join(rest.into_iter(), LogicalOp::And));
        compiled.key_index = self.key.index.map(String::from);
    }
}

fn key_role(
    key: &KeySchema<'_>,
    attribute: &str,
    operator: Operator,
    operands: &Operands<Value>,
) -> Option<KeyRole> {
    let single = matches!(operands, Operands::Single(_));
    if attribute == key.partition_key && operator == Operator::Equals && single {
        return Some(KeyRole::Partition);
    }
    if Some(attribute) == key.sort_key {
        let usable = match operator {
            Operator::Equals
            | Operator::GreaterThan
            | Operator::GreaterThanEqual
            | Operator::LessThan
            | Operator::LessThanEqual
            | Operator::BeginsWith => single,
            Operator::Between => matches!(operands, Operands::Range(..)),
            _ => false,
        };
        if usable {
            return Some(KeyRole::Sort);
        }
    }
    None
}

/// Join expressions with a connective, parenthesizing each when there is more than one.
fn join<'a>(parts: impl Iterator<Item = &'a str>, op: LogicalOp) -> String {
    let parts: Vec<&str> = parts.collect();
    if parts.len() == 1 {
        return parts[0].to_string();
    }
    parts
        .iter()
        .map(|p| format!("({})", p))
        .collect::<Vec<_>>()
        .join(&format!(" {} ", op.keyword()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, FieldType, IndexDef, LocalizationConfig, TableDef};
    use crate::error::CompileErrorKind;
    use serde_json::json;

    fn catalog() -> Catalog {
        Catalog::new()
            .with_localization(LocalizationConfig::new(vec!["en".into(), "de".into()], "en"))
            .with_collection(
                CollectionDef::new("posts")
                    .with_field(FieldDef::new("a", FieldType::Number))
                    .with_field(FieldDef::new("b", FieldType::Number))
                    .with_field(FieldDef::new("title", FieldType::Text).localized())
                    .with_field(FieldDef::new("status", FieldType::Select))
                    .with_field(FieldDef::new("seq", FieldType::Number))
                    .with_table(
                        TableDef::new("posts")
                            .with_sort_key("seq")
                            .with_index(IndexDef::new("by_status", "status", None)),
                    ),
            )
    }

    fn compile(filter: Value) -> Result<CompiledCondition, CompileError> {
        let catalog = catalog();
        let posts = catalog.collection("posts").unwrap();
        let node = FilterNode::from_json(&filter).unwrap().unwrap();
        WhereCompiler::new(&catalog, posts, Some("en"))
            .compile(&node, TokenCounter::new())
            .map(|(compiled, _)| compiled)
    }

    #[test]
    fn test_and_of_equals_and_in() {
        let compiled = compile(json!({"and": [{"a": {"equals": 1}}, {"b": {"in": [2, 3]}}]})).unwrap();

        assert_eq!(compiled.expression, "(#n0 = :v0) AND (#n1 IN (:v1, :v2))");
        assert_eq!(compiled.name_tokens.len(), 2);
        assert_eq!(compiled.value_tokens.len(), 3);
        assert_eq!(compiled.name_tokens["#n0"], "a");
        assert_eq!(compiled.name_tokens["#n1"], "b");
        assert_eq!(compiled.value_tokens[":v2"], json!(3));
    }

    #[test]
    fn test_same_field_in_branches_gets_distinct_tokens() {
        let compiled = compile(json!({
            "or": [{"a": {"equals": 1}}, {"a": {"equals": 2}}]
        }))
        .unwrap();

        assert_eq!(compiled.expression, "(#n0 = :v0) OR (#n1 = :v1)");
        assert_eq!(compiled.name_tokens["#n0"], "a");
        assert_eq!(compiled.name_tokens["#n1"], "a");
    }

    #[test]
    fn test_nested_logical() {
        let compiled = compile(json!({
            "and": [
                {"a": {"equals": 1}},
                {"or": [{"b": {"equals": 2}}, {"b": {"exists": false}}]}
            ]
        }))
        .unwrap();

        assert_eq!(
            compiled.expression,
            "(#n0 = :v0) AND ((#n1 = :v1) OR (attribute_not_exists(#n2)))"
        );
    }

    #[test]
    fn test_localized_field_gets_locale_segment() {
        let compiled = compile(json!({"title": {"like": "rust"}})).unwrap();
        assert_eq!(compiled.expression, "contains(#n0.#n1, :v0)");
        assert_eq!(compiled.name_tokens["#n1"], "en");
    }

    #[test]
    fn test_key_portion_from_top_level_conjuncts() {
        let compiled = compile(json!({
            "id": {"equals": "p1"},
            "seq": {"greater_than": 3},
            "a": {"equals": 1}
        }))
        .unwrap();

        assert_eq!(compiled.key_portion.as_deref(), Some("#n1 = :v1 AND #n2 > :v2"));
        assert_eq!(compiled.filter_portion.as_deref(), Some("#n0 = :v0"));
        assert_eq!(compiled.key_index, None);
    }

    #[test]
    fn test_root_leaf_partition_key() {
        let compiled = compile(json!({"id": {"equals": "p1"}})).unwrap();
        assert_eq!(compiled.key_portion.as_deref(), Some("#n0 = :v0"));
        assert!(compiled.filter_portion.is_none());
    }

    #[test]
    fn test_or_never_yields_key_portion() {
        let compiled = compile(json!({
            "or": [{"id": {"equals": "p1"}}, {"a": {"equals": 1}}]
        }))
        .unwrap();
        assert!(compiled.key_portion.is_none());
        assert_eq!(compiled.filter_portion.as_deref(), Some(compiled.expression.as_str()));
    }

    #[test]
    fn test_nested_key_leaf_does_not_count() {
        let compiled = compile(json!({
            "and": [{"a": {"equals": 1}}, {"and": [{"id": {"equals": "p1"}}, {"b": {"equals": 2}}]}]
        }))
        .unwrap();
        assert!(compiled.key_portion.is_none());
    }

    #[test]
    fn test_secondary_index_key_schema() {
        let catalog = catalog();
        let posts = catalog.collection("posts").unwrap();
        let node = FilterNode::from_json(&json!({"status": {"equals": "draft"}}))
            .unwrap()
            .unwrap();

        let key = posts.table.key_schema(Some("by_status")).unwrap();
        let (compiled, _) = WhereCompiler::new(&catalog, posts, None)
            .with_key_schema(key)
            .compile(&node, TokenCounter::new())
            .unwrap();

        assert_eq!(compiled.key_portion.as_deref(), Some("#n0 = :v0"));
        assert_eq!(compiled.key_index.as_deref(), Some("by_status"));
    }

    #[test]
    fn test_counter_threading_is_deterministic() {
        let catalog = catalog();
        let posts = catalog.collection("posts").unwrap();
        let node = FilterNode::from_json(&json!({"a": {"in": [1, 2]}, "b": {"equals": 3}}))
            .unwrap()
            .unwrap();
        let compiler = WhereCompiler::new(&catalog, posts, None);

        let start = TokenCounter { names: 4, values: 7 };
        let (first, end) = compiler.compile(&node, start).unwrap();
        let (second, _) = compiler.compile(&node, start).unwrap();

        assert_eq!(first, second);
        assert_eq!(end, TokenCounter { names: 6, values: 10 });
        assert!(first.expression.starts_with("(#n4 IN (:v7, :v8))"));
    }

    #[test]
    fn test_errors() {
        let err = compile(json!({"missing": {"equals": 1}})).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::UnknownField);

        let err = compile(json!({"a": {"near": [1, 2]}})).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::UnsupportedOperator);

        let err = compile(json!({"a": {"between": [1]}})).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::MalformedLeaf);
    }
}
