//! Evaluation of parsed expressions against JSON items.
//!
//! Comparisons follow the store's typing rules: numbers compare numerically, strings
//! lexicographically, and operands of mismatched types never satisfy an ordering. A
//! missing attribute fails every condition except `<>`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::ast::*;
use crate::error::EvalError;

/// Placeholder bindings for one expression.
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'a> {
    pub names: &'a BTreeMap<String, String>,
    pub values: &'a BTreeMap<String, Value>,
}

/// A path element after placeholder substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedElement {
    Key(String),
    Index(usize),
}

/// Evaluates conditions and projections for a single set of bindings.
pub struct Evaluator<'a> {
    bindings: Bindings<'a>,
}

impl<'a> Evaluator<'a> {
    pub fn new(bindings: Bindings<'a>) -> Self {
        Self { bindings }
    }

    /// Substitute name placeholders in a path.
    pub fn resolve(&self, path: &DocumentPath) -> Result<Vec<ResolvedElement>, EvalError> {
        path.elements
            .iter()
            .map(|element| match element {
                PathElement::Placeholder(token) => self
                    .bindings
                    .names
                    .get(token)
                    .map(|name| ResolvedElement::Key(name.clone()))
                    .ok_or_else(|| EvalError::UnboundName(token.clone())),
                PathElement::Attribute(name) => Ok(ResolvedElement::Key(name.clone())),
                PathElement::Index(index) => Ok(ResolvedElement::Index(*index)),
            })
            .collect()
    }

    /// Look up the value at a path in an item.
    pub fn lookup<'i>(
        &self,
        path: &DocumentPath,
        item: &'i Map<String, Value>,
    ) -> Result<Option<&'i Value>, EvalError> {
        let resolved = self.resolve(path)?;
        Ok(lookup_resolved(&resolved, item))
    }

    /// Evaluate a condition against an item.
    pub fn evaluate(
        &self,
        condition: &Condition,
        item: &Map<String, Value>,
    ) -> Result<bool, EvalError> {
        match condition {
            Condition::Compare { left, op, right } => {
                let left = self.operand(left, item)?;
                let right = self.operand(right, item)?;
                Ok(match (left, right) {
                    (Some(l), Some(r)) => compare_with(*op, &l, &r),
                    _ => *op == Comparator::Ne,
                })
            }
            Condition::Between { operand, low, high } => {
                let (Some(v), Some(lo), Some(hi)) = (
                    self.operand(operand, item)?,
                    self.operand(low, item)?,
                    self.operand(high, item)?,
                ) else {
                    return Ok(false);
                };
                Ok(compare_with(Comparator::Ge, &v, &lo) && compare_with(Comparator::Le, &v, &hi))
            }
            Condition::In { operand, list } => {
                let Some(v) = self.operand(operand, item)? else {
                    return Ok(false);
                };
                for candidate in list {
                    if let Some(c) = self.operand(candidate, item)? {
                        if values_equal(&v, &c) {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
            Condition::Function(function) => self.function(function, item),
            Condition::Not(inner) => Ok(!self.evaluate(inner, item)?),
            Condition::And(children) => {
                for child in children {
                    if !self.evaluate(child, item)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Or(children) => {
                for child in children {
                    if self.evaluate(child, item)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    fn function(&self, function: &Function, item: &Map<String, Value>) -> Result<bool, EvalError> {
        match function {
            Function::AttributeExists(path) => Ok(self.lookup(path, item)?.is_some()),
            Function::AttributeNotExists(path) => Ok(self.lookup(path, item)?.is_none()),
            Function::BeginsWith(path, operand) => {
                let attr = self.lookup(path, item)?;
                let prefix = self.operand(operand, item)?;
                Ok(match (attr, prefix) {
                    (Some(Value::String(s)), Some(Value::String(p))) => s.starts_with(p.as_str()),
                    _ => false,
                })
            }
            Function::Contains(path, operand) => {
                let attr = self.lookup(path, item)?;
                let needle = self.operand(operand, item)?;
                Ok(match (attr, needle) {
                    (Some(Value::String(s)), Some(Value::String(n))) => s.contains(n.as_str()),
                    (Some(Value::Array(items)), Some(n)) => {
                        items.iter().any(|element| values_equal(element, &n))
                    }
                    _ => false,
                })
            }
        }
    }

    fn operand(
        &self,
        operand: &Operand,
        item: &Map<String, Value>,
    ) -> Result<Option<Value>, EvalError> {
        match operand {
            Operand::Value(token) => self
                .bindings
                .values
                .get(token)
                .cloned()
                .map(Some)
                .ok_or_else(|| EvalError::UnboundValue(token.clone())),
            Operand::Path(path) => Ok(self.lookup(path, item)?.cloned()),
            Operand::Size(path) => Ok(self.lookup(path, item)?.and_then(attribute_size)),
        }
    }

    /// Copy the projected paths of an item into a new item.
    ///
    /// A path containing a list index projects the whole list it indexes into.
    pub fn project(
        &self,
        paths: &[DocumentPath],
        item: &Map<String, Value>,
    ) -> Result<Map<String, Value>, EvalError> {
        let mut out = Map::new();

        for path in paths {
            let prefix: Vec<ResolvedElement> = self
                .resolve(path)?
                .into_iter()
                .take_while(|element| matches!(element, ResolvedElement::Key(_)))
                .collect();

            if let Some(value) = lookup_resolved(&prefix, item) {
                let keys: Vec<&str> = prefix
                    .iter()
                    .filter_map(|element| match element {
                        ResolvedElement::Key(key) => Some(key.as_str()),
                        ResolvedElement::Index(_) => None,
                    })
                    .collect();
                insert_at(&mut out, &keys, value.clone());
            }
        }

        Ok(out)
    }
}

fn lookup_resolved<'i>(path: &[ResolvedElement], item: &'i Map<String, Value>) -> Option<&'i Value> {
    let (first, rest) = path.split_first()?;
    let mut current = match first {
        ResolvedElement::Key(key) => item.get(key)?,
        ResolvedElement::Index(_) => return None,
    };

    for element in rest {
        current = match (element, current) {
            (ResolvedElement::Key(key), Value::Object(map)) => map.get(key)?,
            (ResolvedElement::Index(index), Value::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }

    Some(current)
}

fn insert_at(out: &mut Map<String, Value>, keys: &[&str], value: Value) {
    let Some((last, parents)) = keys.split_last() else {
        return;
    };

    let mut target = out;
    for key in parents {
        let entry = target
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        target = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }

    target.insert((*last).to_string(), value);
}

fn attribute_size(value: &Value) -> Option<Value> {
    let size = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => return None,
    };
    Some(Value::from(size as u64))
}

/// Equality with numeric normalisation (`1` equals `1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between two values of the same scalar type.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare_with(op: Comparator, a: &Value, b: &Value) -> bool {
    match op {
        Comparator::Eq => values_equal(a, b),
        Comparator::Ne => !values_equal(a, b),
        Comparator::Lt => compare_values(a, b) == Some(Ordering::Less),
        Comparator::Le => matches!(compare_values(a, b), Some(Ordering::Less | Ordering::Equal)),
        Comparator::Gt => compare_values(a, b) == Some(Ordering::Greater),
        Comparator::Ge => matches!(
            compare_values(a, b),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_condition, parse_projection};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn item(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn check(expr: &str, names: &[(&str, &str)], values: &[(&str, Value)], doc: Value) -> bool {
        let names: BTreeMap<String, String> = names
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let values: BTreeMap<String, Value> = values
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let evaluator = Evaluator::new(Bindings {
            names: &names,
            values: &values,
        });
        evaluator
            .evaluate(&parse_condition(expr).unwrap(), &item(doc))
            .unwrap()
    }

    #[test]
    fn test_comparisons() {
        let doc = json!({"views": 10, "title": "hello"});
        assert!(check("#n0 = :v0", &[("#n0", "views")], &[(":v0", json!(10.0))], doc.clone()));
        assert!(check("#n0 > :v0", &[("#n0", "views")], &[(":v0", json!(3))], doc.clone()));
        assert!(!check("#n0 < :v0", &[("#n0", "title")], &[(":v0", json!(3))], doc.clone()));
        assert!(check("#n0 <> :v0", &[("#n0", "missing")], &[(":v0", json!(1))], doc.clone()));
        assert!(!check("#n0 = :v0", &[("#n0", "missing")], &[(":v0", json!(1))], doc));
    }

    #[test]
    fn test_between_and_in() {
        let doc = json!({"n": 5});
        let names = [("#n0", "n")];
        assert!(check(
            "#n0 BETWEEN :v0 AND :v1",
            &names,
            &[(":v0", json!(5)), (":v1", json!(9))],
            doc.clone()
        ));
        assert!(check(
            "NOT (#n0 IN (:v0, :v1))",
            &names,
            &[(":v0", json!(1)), (":v1", json!(2))],
            doc
        ));
    }

    #[test]
    fn test_functions() {
        let doc = json!({"title": "hello world", "tags": ["a", "b"], "meta": {"slug": "x"}});
        assert!(check("contains(#n0, :v0)", &[("#n0", "title")], &[(":v0", json!("o w"))], doc.clone()));
        assert!(check("contains(#n0, :v0)", &[("#n0", "tags")], &[(":v0", json!("b"))], doc.clone()));
        assert!(check("begins_with(#n0, :v0)", &[("#n0", "title")], &[(":v0", json!("hell"))], doc.clone()));
        assert!(check(
            "attribute_exists(#n0.#n1)",
            &[("#n0", "meta"), ("#n1", "slug")],
            &[],
            doc.clone()
        ));
        assert!(check("attribute_not_exists(#n0)", &[("#n0", "nope")], &[], doc.clone()));
        assert!(check("size(#n0) = :v0", &[("#n0", "tags")], &[(":v0", json!(2))], doc));
    }

    #[test]
    fn test_unbound_placeholders() {
        let names = BTreeMap::new();
        let values = BTreeMap::new();
        let evaluator = Evaluator::new(Bindings {
            names: &names,
            values: &values,
        });
        let err = evaluator
            .evaluate(&parse_condition("#n0 = :v0").unwrap(), &Map::new())
            .unwrap_err();
        assert_eq!(err, EvalError::UnboundName("#n0".to_string()));
    }

    #[test]
    fn test_projection() {
        let names: BTreeMap<String, String> = [("#p0", "id"), ("#p1", "meta"), ("#p2", "title")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let values = BTreeMap::new();
        let evaluator = Evaluator::new(Bindings {
            names: &names,
            values: &values,
        });

        let doc = item(json!({"id": "1", "body": "x", "meta": {"title": "t", "slug": "s"}}));
        let paths = parse_projection("#p0, #p1.#p2").unwrap();
        let projected = evaluator.project(&paths, &doc).unwrap();

        assert_eq!(Value::Object(projected), json!({"id": "1", "meta": {"title": "t"}}));
    }
}
