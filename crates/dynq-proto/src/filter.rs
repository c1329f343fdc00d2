//! Filter tree types for document queries.
//!
//! A filter arrives as a JSON-like tree (`{"and": [...]}`, `{"title": {"equals": "x"}}`)
//! and is parsed once into a [`FilterNode`]. Later stages never re-inspect the raw
//! JSON to decide whether a node is logical or a leaf.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::Error;

/// Comparison operators accepted in a filter leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Field equals value.
    Equals,
    /// Field does not equal value.
    NotEquals,
    /// Field greater than value.
    GreaterThan,
    /// Field greater than or equal to value.
    GreaterThanEqual,
    /// Field less than value.
    LessThan,
    /// Field less than or equal to value.
    LessThanEqual,
    /// Field is one of a list of values.
    In,
    /// Field is none of a list of values.
    NotIn,
    /// Attribute is present (or absent when the value is `false`).
    Exists,
    /// Attribute is absent.
    NotExists,
    /// String or list contains the value (every value when given a list).
    Contains,
    /// String or list contains none of the values.
    NotContains,
    /// List contains every value.
    All,
    /// String starts with the value.
    BeginsWith,
    /// Substring match.
    Like,
    /// Negated substring match.
    NotLike,
    /// Value lies within an inclusive two-value range.
    Between,
    /// Geospatial proximity.
    Near,
    /// Geospatial containment.
    Within,
    /// Geospatial intersection.
    Intersects,
}

impl Operator {
    /// Wire name of the operator.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::GreaterThan => "greater_than",
            Operator::GreaterThanEqual => "greater_than_equal",
            Operator::LessThan => "less_than",
            Operator::LessThanEqual => "less_than_equal",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Exists => "exists",
            Operator::NotExists => "not_exists",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::All => "all",
            Operator::BeginsWith => "begins_with",
            Operator::Like => "like",
            Operator::NotLike => "not_like",
            Operator::Between => "between",
            Operator::Near => "near",
            Operator::Within => "within",
            Operator::Intersects => "intersects",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s {
            "equals" => Operator::Equals,
            "not_equals" => Operator::NotEquals,
            "greater_than" => Operator::GreaterThan,
            "greater_than_equal" => Operator::GreaterThanEqual,
            "less_than" => Operator::LessThan,
            "less_than_equal" => Operator::LessThanEqual,
            "in" => Operator::In,
            "not_in" => Operator::NotIn,
            "exists" => Operator::Exists,
            "not_exists" => Operator::NotExists,
            "contains" => Operator::Contains,
            "not_contains" => Operator::NotContains,
            "all" => Operator::All,
            "begins_with" => Operator::BeginsWith,
            "like" => Operator::Like,
            "not_like" => Operator::NotLike,
            "between" => Operator::Between,
            "near" => Operator::Near,
            "within" => Operator::Within,
            "intersects" => Operator::Intersects,
            _ => return Err(()),
        };
        Ok(op)
    }
}

/// Logical connective of a [`LogicalNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    /// Every child must match.
    And,
    /// At least one child must match.
    Or,
}

impl LogicalOp {
    /// Keyword used in condition expressions.
    pub fn keyword(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

/// A logical combination of sub-filters.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalNode {
    pub op: LogicalOp,
    pub children: Vec<FilterNode>,
}

/// A single `field operator value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    /// Dotted path to the field (e.g. `meta.title`, `author.name`).
    pub field_path: String,
    pub operator: Operator,
    pub value: Value,
}

/// A parsed filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Logical(LogicalNode),
    Leaf(LeafNode),
}

impl FilterNode {
    /// Create a leaf node.
    pub fn leaf(field_path: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        FilterNode::Leaf(LeafNode {
            field_path: field_path.into(),
            operator,
            value: value.into(),
        })
    }

    /// Create an equality leaf.
    pub fn equals(field_path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field_path, Operator::Equals, value)
    }

    /// Create an AND node.
    pub fn and(children: Vec<FilterNode>) -> Self {
        FilterNode::Logical(LogicalNode {
            op: LogicalOp::And,
            children,
        })
    }

    /// Create an OR node.
    pub fn or(children: Vec<FilterNode>) -> Self {
        FilterNode::Logical(LogicalNode {
            op: LogicalOp::Or,
            children,
        })
    }

    /// Check if this is a leaf node.
    pub fn is_leaf(&self) -> bool {
        matches!(self, FilterNode::Leaf(_))
    }

    /// Number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            FilterNode::Leaf(_) => 1,
            FilterNode::Logical(node) => node.children.iter().map(FilterNode::leaf_count).sum(),
        }
    }

    /// Parse a filter from its JSON representation.
    ///
    /// Returns `Ok(None)` for an empty filter (`{}` or `null`).
    pub fn from_json(value: &Value) -> Result<Option<FilterNode>, Error> {
        match value {
            Value::Null => Ok(None),
            Value::Object(_) => parse_object(value, ""),
            _ => Err(Error::invalid_filter("", "expected an object")),
        }
    }
}

fn parse_object(value: &Value, parent: &str) -> Result<Option<FilterNode>, Error> {
    let map = value
        .as_object()
        .ok_or_else(|| Error::invalid_filter(parent, "expected an object"))?;

    let mut nodes = Vec::new();

    for (key, entry) in map {
        let logical = if key.eq_ignore_ascii_case("and") {
            Some(LogicalOp::And)
        } else if key.eq_ignore_ascii_case("or") {
            Some(LogicalOp::Or)
        } else {
            None
        };

        match logical {
            Some(op) => {
                let items = entry.as_array().ok_or_else(|| {
                    Error::invalid_filter(key.as_str(), "logical operator expects an array")
                })?;

                let mut children = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(child) = parse_object(item, key)? {
                        children.push(child);
                    }
                }

                if !children.is_empty() {
                    nodes.push(FilterNode::Logical(LogicalNode { op, children }));
                }
            }
            None => {
                let operators = entry.as_object().ok_or_else(|| {
                    Error::invalid_filter(key.as_str(), "expected an object of operators")
                })?;
                if operators.is_empty() {
                    return Err(Error::invalid_filter(
                        key.as_str(),
                        "expected at least one operator",
                    ));
                }

                for (name, operand) in operators {
                    let operator = name.parse::<Operator>().map_err(|_| Error::UnknownOperator {
                        path: key.clone(),
                        operator: name.clone(),
                    })?;
                    nodes.push(FilterNode::leaf(key.as_str(), operator, operand.clone()));
                }
            }
        }
    }

    Ok(match nodes.len() {
        0 => None,
        1 => nodes.pop(),
        _ => Some(FilterNode::and(nodes)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_single_leaf() {
        let node = FilterNode::from_json(&json!({"title": {"equals": "hello"}}))
            .unwrap()
            .unwrap();

        assert_eq!(node, FilterNode::equals("title", "hello"));
    }

    #[test]
    fn test_parse_nested_logical() {
        let node = FilterNode::from_json(&json!({
            "or": [
                {"a": {"equals": 1}},
                {"AND": [{"b": {"in": [2, 3]}}, {"c": {"exists": true}}]}
            ]
        }))
        .unwrap()
        .unwrap();

        match node {
            FilterNode::Logical(LogicalNode { op, children }) => {
                assert_eq!(op, LogicalOp::Or);
                assert_eq!(children.len(), 2);
                assert!(children[0].is_leaf());
                assert!(!children[1].is_leaf());
            }
            _ => panic!("Expected logical node"),
        }
    }

    #[test]
    fn test_multiple_operators_are_anded() {
        let node = FilterNode::from_json(&json!({
            "views": {"greater_than": 1, "less_than": 10}
        }))
        .unwrap()
        .unwrap();

        match node {
            FilterNode::Logical(LogicalNode { op, children }) => {
                assert_eq!(op, LogicalOp::And);
                assert_eq!(children.len(), 2);
            }
            _ => panic!("Expected logical node"),
        }
    }

    #[test]
    fn test_empty_filter() {
        assert!(FilterNode::from_json(&json!({})).unwrap().is_none());
        assert!(FilterNode::from_json(&Value::Null).unwrap().is_none());
        assert!(FilterNode::from_json(&json!({"and": []})).unwrap().is_none());
    }

    #[test]
    fn test_unknown_operator() {
        let err = FilterNode::from_json(&json!({"title": {"matches": "x"}})).unwrap_err();
        assert!(matches!(err, Error::UnknownOperator { .. }));
        assert!(err.to_string().contains("matches"));
    }

    #[test]
    fn test_malformed_shapes() {
        assert!(FilterNode::from_json(&json!({"or": {"a": {"equals": 1}}})).is_err());
        assert!(FilterNode::from_json(&json!({"a": 1})).is_err());
        assert!(FilterNode::from_json(&json!([1, 2])).is_err());
        assert!(FilterNode::from_json(&json!({"a": {}})).is_err());
        assert!(FilterNode::from_json(&json!({"and": [{"views": {}}]})).is_err());
    }

    #[test]
    fn test_operator_names_roundtrip() {
        for op in [
            Operator::Equals,
            Operator::NotIn,
            Operator::BeginsWith,
            Operator::Between,
            Operator::Intersects,
        ] {
            assert_eq!(op.name().parse::<Operator>(), Ok(op));
        }
    }

    #[test]
    fn test_leaf_count() {
        let node = FilterNode::and(vec![
            FilterNode::equals("a", 1),
            FilterNode::or(vec![FilterNode::equals("b", 2), FilterNode::equals("c", 3)]),
        ]);
        assert_eq!(node.leaf_count(), 3);
    }
}
