//! Collection and table descriptions.

use serde::{Deserialize, Serialize};

use super::field::{FieldDef, FieldType};

/// Attribute holding a document's identifier.
pub const ID_FIELD: &str = "id";
/// Creation timestamp attribute, present when timestamps are enabled.
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Update timestamp attribute, present when timestamps are enabled.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

fn default_true() -> bool {
    true
}

fn default_partition_key() -> String {
    ID_FIELD.to_string()
}

/// Key attributes of a table or one of its indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema<'a> {
    /// Index name, `None` for the table's primary key.
    pub index: Option<&'a str>,
    pub partition_key: &'a str,
    pub sort_key: Option<&'a str>,
}

/// A secondary index declared on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDef {
    pub name: String,
    pub partition_key: String,
    #[serde(default)]
    pub sort_key: Option<String>,
}

impl IndexDef {
    pub fn new(
        name: impl Into<String>,
        partition_key: impl Into<String>,
        sort_key: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            partition_key: partition_key.into(),
            sort_key: sort_key.map(String::from),
        }
    }
}

/// Physical table backing a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDef {
    pub name: String,
    #[serde(default = "default_partition_key")]
    pub partition_key: String,
    #[serde(default)]
    pub sort_key: Option<String>,
    #[serde(default)]
    pub indexes: Vec<IndexDef>,
}

impl TableDef {
    /// Create a table keyed by `id` with no sort key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_key: default_partition_key(),
            sort_key: None,
            indexes: Vec::new(),
        }
    }

    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Look up a declared secondary index.
    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Key schema of the primary key.
    pub fn primary_key(&self) -> KeySchema<'_> {
        KeySchema {
            index: None,
            partition_key: &self.partition_key,
            sort_key: self.sort_key.as_deref(),
        }
    }

    /// Key schema of an index, or of the primary key when `index` is `None`.
    pub fn key_schema(&self, index: Option<&str>) -> Option<KeySchema<'_>> {
        match index {
            None => Some(self.primary_key()),
            Some(name) => self.index(name).map(|i| KeySchema {
                index: Some(i.name.as_str()),
                partition_key: &i.partition_key,
                sort_key: i.sort_key.as_deref(),
            }),
        }
    }
}

/// A document collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDef {
    pub slug: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Whether `createdAt`/`updatedAt` are maintained.
    #[serde(default = "default_true")]
    pub timestamps: bool,
    pub table: TableDef,
}

impl CollectionDef {
    /// Create a collection stored in a table of the same name.
    pub fn new(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            table: TableDef::new(slug.clone()),
            slug,
            fields: Vec::new(),
            timestamps: true,
        }
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_table(mut self, table: TableDef) -> Self {
        self.table = table;
        self
    }

    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    /// Look up a top-level field, including the implicit ones.
    pub fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        if let Some(field) = self.fields.iter().find(|f| f.name == name) {
            return Some(FieldRef::Declared(field));
        }
        self.is_implicit(name).then_some(FieldRef::Implicit)
    }

    /// Whether `name` is an attribute every document carries.
    pub fn is_implicit(&self, name: &str) -> bool {
        name == ID_FIELD
            || (self.timestamps && (name == CREATED_AT_FIELD || name == UPDATED_AT_FIELD))
    }

    /// Sort applied when the request names none.
    pub fn default_sort(&self) -> String {
        if self.timestamps {
            format!("-{}", CREATED_AT_FIELD)
        } else {
            format!("-{}", ID_FIELD)
        }
    }
}

/// A resolved reference to a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRef<'a> {
    Declared(&'a FieldDef),
    /// `id`, `createdAt` or `updatedAt`.
    Implicit,
}

impl<'a> FieldRef<'a> {
    pub fn def(&self) -> Option<&'a FieldDef> {
        match self {
            FieldRef::Declared(def) => Some(def),
            FieldRef::Implicit => None,
        }
    }

    pub fn field_type(&self) -> Option<FieldType> {
        self.def().map(|d| d.field_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_implicit_fields() {
        let posts = CollectionDef::new("posts");
        assert_eq!(posts.field("id"), Some(FieldRef::Implicit));
        assert_eq!(posts.field("createdAt"), Some(FieldRef::Implicit));
        assert_eq!(posts.default_sort(), "-createdAt");

        let plain = CollectionDef::new("plain").without_timestamps();
        assert!(plain.field("createdAt").is_none());
        assert_eq!(plain.default_sort(), "-id");
    }

    #[test]
    fn test_key_schemas() {
        let table = TableDef::new("posts")
            .with_index(IndexDef::new("author_name_index", "author_name", Some("id")));

        assert_eq!(table.primary_key().partition_key, "id");
        let index = table.key_schema(Some("author_name_index")).unwrap();
        assert_eq!(index.partition_key, "author_name");
        assert_eq!(index.sort_key, Some("id"));
        assert!(table.key_schema(Some("missing")).is_none());
    }

    #[test]
    fn test_deserialize_collection() {
        let collection: CollectionDef = serde_json::from_value(json!({
            "slug": "posts",
            "fields": [{"name": "title", "type": "text"}],
            "table": {"name": "posts-table"}
        }))
        .unwrap();

        assert!(collection.timestamps);
        assert_eq!(collection.table.partition_key, "id");
        assert!(collection.field("title").is_some());
    }
}
