//! Collection registry consumed by the query engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::collection::CollectionDef;

/// Locale that selects every locale of a localized field.
pub const ALL_LOCALES: &str = "all";

/// Locales available to localized fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizationConfig {
    pub locales: Vec<String>,
    pub default_locale: String,
}

impl LocalizationConfig {
    pub fn new(locales: Vec<String>, default_locale: impl Into<String>) -> Self {
        Self {
            locales,
            default_locale: default_locale.into(),
        }
    }
}

/// Read-only view of the collections known to an engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    collections: Vec<CollectionDef>,
    #[serde(default)]
    localization: Option<LocalizationConfig>,
    #[serde(skip)]
    by_slug: BTreeMap<String, usize>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from its JSON description.
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        let mut catalog: Catalog = serde_json::from_str(source)?;
        catalog.reindex();
        Ok(catalog)
    }

    /// Register a collection, replacing any collection with the same slug.
    pub fn with_collection(mut self, collection: CollectionDef) -> Self {
        match self.by_slug.get(&collection.slug) {
            Some(&pos) => self.collections[pos] = collection,
            None => {
                self.by_slug
                    .insert(collection.slug.clone(), self.collections.len());
                self.collections.push(collection);
            }
        }
        self
    }

    pub fn with_localization(mut self, localization: LocalizationConfig) -> Self {
        self.localization = Some(localization);
        self
    }

    /// Look up a collection by slug.
    pub fn collection(&self, slug: &str) -> Option<&CollectionDef> {
        self.by_slug.get(slug).map(|&pos| &self.collections[pos])
    }

    /// All registered collections in registration order.
    pub fn collections(&self) -> &[CollectionDef] {
        &self.collections
    }

    pub fn localization(&self) -> Option<&LocalizationConfig> {
        self.localization.as_ref()
    }

    /// The locale to apply to localized fields for a request.
    ///
    /// Returns `None` when localization is disabled or every locale is requested.
    pub fn active_locale<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        let localization = self.localization.as_ref()?;
        match requested {
            Some(ALL_LOCALES) => None,
            Some(locale) => Some(locale),
            None => Some(localization.default_locale.as_str()),
        }
    }

    fn reindex(&mut self) {
        self.by_slug = self
            .collections
            .iter()
            .enumerate()
            .map(|(pos, c)| (c.slug.clone(), pos))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, FieldType};

    #[test]
    fn test_register_and_lookup() {
        let catalog = Catalog::new()
            .with_collection(CollectionDef::new("posts"))
            .with_collection(
                CollectionDef::new("users").with_field(FieldDef::new("name", FieldType::Text)),
            );

        assert!(catalog.collection("posts").is_some());
        assert!(catalog.collection("missing").is_none());
        assert_eq!(catalog.collections().len(), 2);
    }

    #[test]
    fn test_replace_collection() {
        let catalog = Catalog::new()
            .with_collection(CollectionDef::new("posts"))
            .with_collection(CollectionDef::new("posts").without_timestamps());

        assert_eq!(catalog.collections().len(), 1);
        assert!(!catalog.collection("posts").unwrap().timestamps);
    }

    #[test]
    fn test_active_locale() {
        let plain = Catalog::new();
        assert_eq!(plain.active_locale(Some("en")), None);

        let catalog = Catalog::new()
            .with_localization(LocalizationConfig::new(vec!["en".into(), "de".into()], "en"));
        assert_eq!(catalog.active_locale(None), Some("en"));
        assert_eq!(catalog.active_locale(Some("de")), Some("de"));
        assert_eq!(catalog.active_locale(Some("all")), None);
    }

    #[test]
    fn test_from_json() {
        let catalog = Catalog::from_json(
            r#"{
                "localization": {"locales": ["en"], "defaultLocale": "en"},
                "collections": [
                    {"slug": "users", "table": {"name": "users"}}
                ]
            }"#,
        )
        .unwrap();

        assert!(catalog.collection("users").is_some());
        assert_eq!(catalog.active_locale(None), Some("en"));
    }
}
