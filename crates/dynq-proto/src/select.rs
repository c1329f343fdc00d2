//! Field selection (projection) requests.

use std::collections::BTreeMap;

/// Which fields of a document to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Select {
    /// Only the listed top-level fields.
    Fields(Vec<String>),
    /// `{field: true}` selects fields; any `false` entry switches to exclusion mode,
    /// where every field except those set to `false` is returned.
    Map(BTreeMap<String, bool>),
}

/// Resolved selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    Include,
    Exclude,
}

impl Select {
    /// Build an inclusion list.
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Select::Fields(fields.into_iter().map(Into::into).collect())
    }

    /// Build an exclusion map.
    pub fn excluding<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Select::Map(fields.into_iter().map(|f| (f.into(), false)).collect())
    }

    /// Selection mode implied by the request shape.
    pub fn mode(&self) -> SelectMode {
        match self {
            Select::Fields(_) => SelectMode::Include,
            Select::Map(map) if map.values().any(|v| !v) => SelectMode::Exclude,
            Select::Map(_) => SelectMode::Include,
        }
    }

    /// Whether a top-level field is selected.
    pub fn selects(&self, field: &str) -> bool {
        match self {
            Select::Fields(fields) => fields.iter().any(|f| f == field),
            Select::Map(map) => match self.mode() {
                SelectMode::Include => map.get(field).copied().unwrap_or(false),
                SelectMode::Exclude => map.get(field).copied().unwrap_or(true),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_modes() {
        let list = Select::fields(["title"]);
        assert_eq!(list.mode(), SelectMode::Include);
        assert!(list.selects("title"));
        assert!(!list.selects("body"));

        let map = Select::Map(BTreeMap::from([("title".to_string(), true)]));
        assert_eq!(map.mode(), SelectMode::Include);
        assert!(!map.selects("body"));
    }

    #[test]
    fn test_exclude_mode() {
        let select = Select::excluding(["body"]);
        assert_eq!(select.mode(), SelectMode::Exclude);
        assert!(select.selects("title"));
        assert!(!select.selects("body"));
    }
}
