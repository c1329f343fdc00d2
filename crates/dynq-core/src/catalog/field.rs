//! Field definitions for collections.

use serde::{Deserialize, Deserializer, Serialize};

/// Field types the engine distinguishes between.
///
/// Only the structural types (groups, arrays, blocks, relationships, uploads) change
/// how paths are resolved; the rest are carried for completeness of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Text,
    Textarea,
    Email,
    Code,
    RichText,
    Number,
    Checkbox,
    Date,
    Select,
    Radio,
    Json,
    Point,
    Group,
    Array,
    Blocks,
    Relationship,
    Upload,
}

impl FieldType {
    /// Whether a path may descend into this field's subfields.
    pub fn has_subfields(&self) -> bool {
        matches!(self, FieldType::Group | FieldType::Array | FieldType::Blocks)
    }

    /// Whether values of this field reference documents of another collection.
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Relationship | FieldType::Upload)
    }
}

/// A field definition within a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field data type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Subfields of group, array and blocks fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDef>,
    /// Whether the stored value is keyed by locale.
    #[serde(default)]
    pub localized: bool,
    /// Target collections of a relationship or upload field.
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub relation_to: Vec<String>,
    /// Whether a relationship holds a list of references.
    #[serde(default)]
    pub has_many: bool,
}

impl FieldDef {
    /// Create a new field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            fields: Vec::new(),
            localized: false,
            relation_to: Vec::new(),
            has_many: false,
        }
    }

    /// Create a relationship field pointing at a single collection.
    pub fn relationship(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, FieldType::Relationship).with_relation_to(vec![target.into()])
    }

    /// Create a group field with the given subfields.
    pub fn group(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self::new(name, FieldType::Group).with_fields(fields)
    }

    pub fn with_fields(mut self, fields: Vec<FieldDef>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_relation_to(mut self, targets: Vec<String>) -> Self {
        self.relation_to = targets;
        self
    }

    /// Mark the field as localized.
    pub fn localized(mut self) -> Self {
        self.localized = true;
        self
    }

    /// Mark the relationship as holding many references.
    pub fn has_many(mut self) -> Self {
        self.has_many = true;
        self
    }

    /// Look up a direct subfield by name.
    pub fn subfield(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether references may point at more than one collection.
    pub fn is_polymorphic(&self) -> bool {
        self.relation_to.len() > 1
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(target) => vec![target],
        OneOrMany::Many(targets) => targets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_builders() {
        let field = FieldDef::relationship("author", "users").has_many();
        assert!(field.field_type.is_reference());
        assert!(field.has_many);
        assert!(!field.is_polymorphic());
        assert_eq!(field.relation_to, vec!["users".to_string()]);
    }

    #[test]
    fn test_deserialize_relation_to_forms() {
        let single: FieldDef = serde_json::from_value(json!({
            "name": "author", "type": "relationship", "relationTo": "users"
        }))
        .unwrap();
        assert_eq!(single.relation_to, vec!["users"]);

        let poly: FieldDef = serde_json::from_value(json!({
            "name": "owner", "type": "relationship", "relationTo": ["users", "teams"]
        }))
        .unwrap();
        assert!(poly.is_polymorphic());
    }

    #[test]
    fn test_deserialize_group() {
        let group: FieldDef = serde_json::from_value(json!({
            "name": "meta",
            "type": "group",
            "fields": [{"name": "title", "type": "text", "localized": true}]
        }))
        .unwrap();
        assert!(group.field_type.has_subfields());
        assert!(group.subfield("title").unwrap().localized);
        assert!(group.subfield("missing").is_none());
    }
}
