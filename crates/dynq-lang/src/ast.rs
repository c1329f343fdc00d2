//! Abstract syntax tree for condition, key-condition and projection expressions.

use std::fmt;

/// One element of a document path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathElement {
    /// `#name` placeholder, resolved through the attribute-name map.
    Placeholder(String),
    /// A literal attribute name written inline.
    Attribute(String),
    /// `[n]` list index.
    Index(usize),
}

/// A document path such as `#n0.#n1[0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPath {
    pub elements: Vec<PathElement>,
}

impl DocumentPath {
    pub fn new(elements: Vec<PathElement>) -> Self {
        Self { elements }
    }

    /// Name placeholders referenced by this path.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|e| match e {
            PathElement::Placeholder(p) => Some(p.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            match element {
                PathElement::Placeholder(name) | PathElement::Attribute(name) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                PathElement::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// A value-producing operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Attribute at a document path.
    Path(DocumentPath),
    /// `:value` placeholder.
    Value(String),
    /// `size(path)`.
    Size(DocumentPath),
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Ne => "<>",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }
}

/// Built-in boolean functions.
#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    AttributeExists(DocumentPath),
    AttributeNotExists(DocumentPath),
    BeginsWith(DocumentPath, Operand),
    Contains(DocumentPath, Operand),
}

/// A boolean condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        left: Operand,
        op: Comparator,
        right: Operand,
    },
    Between {
        operand: Operand,
        low: Operand,
        high: Operand,
    },
    In {
        operand: Operand,
        list: Vec<Operand>,
    },
    Function(Function),
    Not(Box<Condition>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    /// Collect every document path referenced by this condition.
    pub fn paths(&self) -> Vec<&DocumentPath> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a DocumentPath>) {
        fn operand<'a>(op: &'a Operand, out: &mut Vec<&'a DocumentPath>) {
            match op {
                Operand::Path(p) | Operand::Size(p) => out.push(p),
                Operand::Value(_) => {}
            }
        }

        match self {
            Condition::Compare { left, right, .. } => {
                operand(left, out);
                operand(right, out);
            }
            Condition::Between { operand: o, low, high } => {
                operand(o, out);
                operand(low, out);
                operand(high, out);
            }
            Condition::In { operand: o, list } => {
                operand(o, out);
                for item in list {
                    operand(item, out);
                }
            }
            Condition::Function(f) => match f {
                Function::AttributeExists(p) | Function::AttributeNotExists(p) => out.push(p),
                Function::BeginsWith(p, o) | Function::Contains(p, o) => {
                    out.push(p);
                    operand(o, out);
                }
            },
            Condition::Not(inner) => inner.collect_paths(out),
            Condition::And(children) | Condition::Or(children) => {
                for child in children {
                    child.collect_paths(out);
                }
            }
        }
    }

    /// Value placeholders referenced by this condition.
    pub fn value_placeholders(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_values(&mut out);
        out
    }

    fn collect_values<'a>(&'a self, out: &mut Vec<&'a str>) {
        fn operand<'a>(op: &'a Operand, out: &mut Vec<&'a str>) {
            if let Operand::Value(v) = op {
                out.push(v);
            }
        }

        match self {
            Condition::Compare { left, right, .. } => {
                operand(left, out);
                operand(right, out);
            }
            Condition::Between { operand: o, low, high } => {
                operand(o, out);
                operand(low, out);
                operand(high, out);
            }
            Condition::In { operand: o, list } => {
                operand(o, out);
                list.iter().for_each(|item| operand(item, out));
            }
            Condition::Function(Function::BeginsWith(_, o))
            | Condition::Function(Function::Contains(_, o)) => operand(o, out),
            Condition::Function(_) => {}
            Condition::Not(inner) => inner.collect_values(out),
            Condition::And(children) | Condition::Or(children) => {
                children.iter().for_each(|c| c.collect_values(out));
            }
        }
    }
}
