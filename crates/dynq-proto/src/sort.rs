//! Sort specification types.

use std::str::FromStr;

use crate::error::Error;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// A single `(field path, direction)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortTerm {
    /// Dotted field path to sort by.
    pub field: String,
    /// Sort direction.
    pub direction: SortDirection,
}

impl SortTerm {
    /// Create an ascending sort term.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Create a descending sort term.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Whether the term sorts ascending.
    pub fn is_ascending(&self) -> bool {
        self.direction == SortDirection::Asc
    }
}

impl FromStr for SortTerm {
    type Err = Error;

    /// Parse `field` (ascending) or `-field` (descending).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (field, direction) = match trimmed.strip_prefix('-') {
            Some(rest) => (rest, SortDirection::Desc),
            None => (trimmed.strip_prefix('+').unwrap_or(trimmed), SortDirection::Asc),
        };

        if field.is_empty() || field.split('.').any(str::is_empty) {
            return Err(Error::InvalidSort(s.to_string()));
        }

        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

/// An ordered list of sort terms. Only the first term is honoured by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub terms: Vec<SortTerm>,
}

impl SortSpec {
    /// Create a sort spec from terms.
    pub fn new(terms: Vec<SortTerm>) -> Self {
        Self { terms }
    }

    /// Parse a list of `field` / `-field` strings.
    pub fn parse<I, S>(items: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = items
            .into_iter()
            .map(|item| item.as_ref().parse::<SortTerm>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { terms })
    }

    /// The authoritative (first) term.
    pub fn primary(&self) -> Option<&SortTerm> {
        self.terms.first()
    }

    /// Check if no terms were given.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl From<SortTerm> for SortSpec {
    fn from(term: SortTerm) -> Self {
        Self { terms: vec![term] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_terms() {
        let spec = SortSpec::parse(["-createdAt", "title"]).unwrap();
        assert_eq!(spec.terms.len(), 2);
        assert_eq!(spec.primary(), Some(&SortTerm::desc("createdAt")));
        assert!(spec.terms[1].is_ascending());
    }

    #[test]
    fn test_parse_invalid() {
        assert!("-".parse::<SortTerm>().is_err());
        assert!("author..name".parse::<SortTerm>().is_err());
    }

    #[test]
    fn test_empty_spec() {
        assert!(SortSpec::default().primary().is_none());
    }
}
