//! Translation of filter operators into condition fragments.

use dynq_proto::Operator;
use serde_json::Value;

use crate::error::CompileError;

/// The operands a leaf binds, after arity checks.
///
/// Parameterised so the same shape carries raw values and, after token allocation,
/// the value tokens standing in for them.
#[derive(Debug, Clone, PartialEq)]
pub enum Operands<T> {
    /// A single operand.
    Single(T),
    /// One or more operands.
    List(Vec<T>),
    /// Inclusive bounds.
    Range(T, T),
    /// Presence test; `true` when the attribute must exist.
    Presence(bool),
}

impl<T> Operands<T> {
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Operands<U> {
        match self {
            Operands::Single(v) => Operands::Single(f(v)),
            Operands::List(vs) => Operands::List(vs.into_iter().map(f).collect()),
            Operands::Range(lo, hi) => {
                let lo = f(lo);
                Operands::Range(lo, f(hi))
            }
            Operands::Presence(exists) => Operands::Presence(exists),
        }
    }
}

/// Check a leaf value against its operator's arity.
pub fn operands(operator: Operator, path: &str, value: &Value) -> Result<Operands<Value>, CompileError> {
    match operator {
        Operator::Equals
        | Operator::NotEquals
        | Operator::GreaterThan
        | Operator::GreaterThanEqual
        | Operator::LessThan
        | Operator::LessThanEqual
        | Operator::BeginsWith
        | Operator::Like
        | Operator::NotLike => Ok(Operands::Single(value.clone())),
        Operator::In | Operator::NotIn | Operator::All => match value {
            Value::Array(items) if !items.is_empty() => Ok(Operands::List(items.clone())),
            Value::Array(_) => Err(CompileError::malformed(
                path,
                format!("'{}' requires at least one value", operator),
            )),
            _ => Err(CompileError::malformed(
                path,
                format!("'{}' requires an array of values", operator),
            )),
        },
        Operator::Contains | Operator::NotContains => match value {
            Value::Array(items) if items.is_empty() => Err(CompileError::malformed(
                path,
                format!("'{}' requires at least one value", operator),
            )),
            Value::Array(items) => Ok(Operands::List(items.clone())),
            other => Ok(Operands::Single(other.clone())),
        },
        Operator::Between => match value.as_array().map(Vec::as_slice) {
            Some([low, high]) => Ok(Operands::Range(low.clone(), high.clone())),
            _ => Err(CompileError::malformed(
                path,
                "'between' requires exactly two values",
            )),
        },
        Operator::Exists | Operator::NotExists => {
            let flag = presence_flag(value).ok_or_else(|| {
                CompileError::malformed(path, format!("'{}' requires a boolean", operator))
            })?;
            Ok(Operands::Presence(flag == (operator == Operator::Exists)))
        }
        Operator::Near | Operator::Within | Operator::Intersects => {
            Err(CompileError::unsupported_operator(path, operator))
        }
    }
}

fn presence_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

/// Render the condition fragment for one leaf.
///
/// `field` is the placeholder path (`#n0.#n1`) and the operands are value tokens.
pub fn translate(
    operator: Operator,
    path: &str,
    field: &str,
    operands: &Operands<String>,
) -> Result<String, CompileError> {
    let fragment = match (operator, operands) {
        (Operator::Equals, Operands::Single(v)) => format!("{} = {}", field, v),
        (Operator::NotEquals, Operands::Single(v)) => format!("{} <> {}", field, v),
        (Operator::GreaterThan, Operands::Single(v)) => format!("{} > {}", field, v),
        (Operator::GreaterThanEqual, Operands::Single(v)) => format!("{} >= {}", field, v),
        (Operator::LessThan, Operands::Single(v)) => format!("{} < {}", field, v),
        (Operator::LessThanEqual, Operands::Single(v)) => format!("{} <= {}", field, v),
        (Operator::In, Operands::List(vs)) => format!("{} IN ({})", field, vs.join(", ")),
        (Operator::NotIn, Operands::List(vs)) => {
            format!("NOT ({} IN ({}))", field, vs.join(", "))
        }
        (Operator::Exists | Operator::NotExists, Operands::Presence(true)) => {
            format!("attribute_exists({})", field)
        }
        (Operator::Exists | Operator::NotExists, Operands::Presence(false)) => {
            format!("attribute_not_exists({})", field)
        }
        (Operator::Contains | Operator::Like, Operands::Single(v)) => {
            format!("contains({}, {})", field, v)
        }
        (Operator::NotContains | Operator::NotLike, Operands::Single(v)) => {
            format!("NOT contains({}, {})", field, v)
        }
        (Operator::Contains | Operator::All, Operands::List(vs)) => {
            conjunction(vs.iter().map(|v| format!("contains({}, {})", field, v)))
        }
        (Operator::NotContains, Operands::List(vs)) => {
            conjunction(vs.iter().map(|v| format!("NOT contains({}, {})", field, v)))
        }
        (Operator::BeginsWith, Operands::Single(v)) => format!("begins_with({}, {})", field, v),
        (Operator::Between, Operands::Range(lo, hi)) => {
            format!("{} BETWEEN {} AND {}", field, lo, hi)
        }
        (Operator::Near | Operator::Within | Operator::Intersects, _) => {
            return Err(CompileError::unsupported_operator(path, operator))
        }
        (operator, _) => {
            return Err(CompileError::malformed(
                path,
                format!("operands do not match '{}'", operator),
            ))
        }
    };
    Ok(fragment)
}

fn conjunction(parts: impl Iterator<Item = String>) -> String {
    let parts: Vec<String> = parts.collect();
    if parts.len() == 1 {
        return parts.into_iter().next().unwrap_or_default();
    }
    format!("({})", parts.join(" AND "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileErrorKind;
    use serde_json::json;

    fn render(operator: Operator, value: Value) -> Result<String, CompileError> {
        let mut next = 0;
        let tokens = operands(operator, "f", &value)?.map(|_| {
            let token = format!(":v{}", next);
            next += 1;
            token
        });
        translate(operator, "f", "#n0", &tokens)
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(render(Operator::Equals, json!(1)).unwrap(), "#n0 = :v0");
        assert_eq!(render(Operator::NotEquals, json!(1)).unwrap(), "#n0 <> :v0");
        assert_eq!(render(Operator::GreaterThanEqual, json!(1)).unwrap(), "#n0 >= :v0");
        assert_eq!(render(Operator::LessThan, json!(1)).unwrap(), "#n0 < :v0");
    }

    #[test]
    fn test_lists() {
        assert_eq!(render(Operator::In, json!([1, 2])).unwrap(), "#n0 IN (:v0, :v1)");
        assert_eq!(
            render(Operator::NotIn, json!(["a"])).unwrap(),
            "NOT (#n0 IN (:v0))"
        );
        assert_eq!(
            render(Operator::All, json!(["a", "b"])).unwrap(),
            "(contains(#n0, :v0) AND contains(#n0, :v1))"
        );
        assert_eq!(
            render(Operator::Contains, json!(["a"])).unwrap(),
            "contains(#n0, :v0)"
        );
        assert_eq!(
            render(Operator::NotContains, json!(["a", "b"])).unwrap(),
            "(NOT contains(#n0, :v0) AND NOT contains(#n0, :v1))"
        );
    }

    #[test]
    fn test_presence() {
        assert_eq!(
            render(Operator::Exists, json!(true)).unwrap(),
            "attribute_exists(#n0)"
        );
        assert_eq!(
            render(Operator::Exists, json!(false)).unwrap(),
            "attribute_not_exists(#n0)"
        );
        assert_eq!(
            render(Operator::NotExists, json!(true)).unwrap(),
            "attribute_not_exists(#n0)"
        );
    }

    #[test]
    fn test_string_operators() {
        assert_eq!(
            render(Operator::BeginsWith, json!("ab")).unwrap(),
            "begins_with(#n0, :v0)"
        );
        assert_eq!(render(Operator::Like, json!("ab")).unwrap(), "contains(#n0, :v0)");
        assert_eq!(
            render(Operator::NotLike, json!("ab")).unwrap(),
            "NOT contains(#n0, :v0)"
        );
        assert_eq!(
            render(Operator::Between, json!([1, 5])).unwrap(),
            "#n0 BETWEEN :v0 AND :v1"
        );
    }

    #[test]
    fn test_arity_errors() {
        for (operator, value) in [
            (Operator::Between, json!([1])),
            (Operator::Between, json!(3)),
            (Operator::In, json!([])),
            (Operator::In, json!("x")),
            (Operator::Exists, json!(3)),
        ] {
            let err = render(operator, value).unwrap_err();
            assert_eq!(err.kind, CompileErrorKind::MalformedLeaf, "{}", operator);
        }
    }

    #[test]
    fn test_geospatial_rejected() {
        for operator in [Operator::Near, Operator::Within, Operator::Intersects] {
            let err = render(operator, json!([1.0, 2.0])).unwrap_err();
            assert_eq!(err.kind, CompileErrorKind::UnsupportedOperator);
        }
    }
}
