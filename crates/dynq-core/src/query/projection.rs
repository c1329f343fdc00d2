//! Compilation of field selections into projection expressions.

use std::collections::{BTreeMap, BTreeSet};

use dynq_proto::select::{Select, SelectMode};

use super::path::resolve_path;
use crate::catalog::{Catalog, CollectionDef, FieldDef, FieldType, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};
use crate::error::CompileError;

/// A projection expression and its `#pK` name bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub names: BTreeMap<String, String>,
    /// `None` returns every attribute.
    pub expression: Option<String>,
}

impl Projection {
    /// Project every attribute.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.expression.is_none()
    }
}

/// Allocates one token per distinct attribute name and collects unique paths.
#[derive(Default)]
struct ProjectionBuilder {
    tokens: BTreeMap<String, String>,
    paths: Vec<String>,
    seen: BTreeSet<Vec<String>>,
}

impl ProjectionBuilder {
    fn add(&mut self, attributes: Vec<String>) {
        if !self.seen.insert(attributes.clone()) {
            return;
        }
        let path = attributes
            .iter()
            .map(|attribute| {
                let next = self.tokens.len();
                self.tokens
                    .entry(attribute.clone())
                    .or_insert_with(|| format!("#p{}", next))
                    .clone()
            })
            .collect::<Vec<_>>()
            .join(".");
        self.paths.push(path);
    }

    fn finish(self) -> Projection {
        Projection {
            names: self
                .tokens
                .into_iter()
                .map(|(attribute, token)| (token, attribute))
                .collect(),
            expression: Some(self.paths.join(", ")),
        }
    }
}

/// Compile a selection for a collection.
///
/// `locale` is the active locale; localized fields project only that locale when one
/// is active. The table's key attributes are always projected.
pub fn compile_projection(
    select: Option<&Select>,
    catalog: &Catalog,
    collection: &CollectionDef,
    locale: Option<&str>,
) -> Result<Projection, CompileError> {
    let Some(select) = select else {
        return Ok(Projection::all());
    };

    let fields: Vec<String> = match (select, select.mode()) {
        (Select::Fields(fields), _) => fields.clone(),
        (Select::Map(map), SelectMode::Include) => map
            .iter()
            .filter(|(_, included)| **included)
            .map(|(field, _)| field.clone())
            .collect(),
        (Select::Map(map), SelectMode::Exclude) => {
            for field in map.keys() {
                resolve_path(catalog, collection, field, None)?;
            }
            top_level_names(collection)
                .into_iter()
                .filter(|name| select.selects(name))
                .collect()
        }
    };

    let mut builder = ProjectionBuilder::default();
    builder.add(vec![collection.table.partition_key.clone()]);
    if let Some(sort_key) = &collection.table.sort_key {
        builder.add(vec![sort_key.clone()]);
    }

    for field in &fields {
        let resolved = resolve_path(catalog, collection, field, None)?;
        if resolved.crossing.is_some() {
            return Err(CompileError::unsupported_path(
                field.as_str(),
                "cannot project fields of related documents",
            ));
        }
        match resolved.terminal.def() {
            Some(def) => expand(def, resolved.attributes, locale, &mut builder),
            None => builder.add(resolved.attributes),
        }
    }

    Ok(builder.finish())
}

fn expand(def: &FieldDef, mut attributes: Vec<String>, locale: Option<&str>, out: &mut ProjectionBuilder) {
    match locale {
        Some(locale) if def.localized => {
            attributes.push(locale.to_string());
            out.add(attributes);
        }
        Some(_) if def.field_type == FieldType::Group && has_localized_descendant(def) => {
            for sub in &def.fields {
                let mut path = attributes.clone();
                path.push(sub.name.clone());
                expand(sub, path, locale, out);
            }
        }
        _ => out.add(attributes),
    }
}

fn has_localized_descendant(def: &FieldDef) -> bool {
    def.fields
        .iter()
        .any(|f| f.localized || (f.field_type == FieldType::Group && has_localized_descendant(f)))
}

fn top_level_names(collection: &CollectionDef) -> Vec<String> {
    let mut names = vec![ID_FIELD.to_string()];
    if collection.timestamps {
        names.push(CREATED_AT_FIELD.to_string());
        names.push(UPDATED_AT_FIELD.to_string());
    }
    names.extend(collection.fields.iter().map(|f| f.name.clone()));
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LocalizationConfig;
    use crate::error::CompileErrorKind;

    fn catalog() -> Catalog {
        Catalog::new()
            .with_localization(LocalizationConfig::new(vec!["en".into(), "de".into()], "en"))
            .with_collection(
                CollectionDef::new("posts")
                    .without_timestamps()
                    .with_field(FieldDef::new("title", FieldType::Text).localized())
                    .with_field(FieldDef::new("body", FieldType::RichText))
                    .with_field(FieldDef::relationship("author", "users"))
                    .with_field(FieldDef::group(
                        "meta",
                        vec![
                            FieldDef::new("slug", FieldType::Text),
                            FieldDef::new("summary", FieldType::Text).localized(),
                        ],
                    ))
                    .with_field(FieldDef::group(
                        "stats",
                        vec![FieldDef::new("views", FieldType::Number)],
                    )),
            )
            .with_collection(CollectionDef::new("users"))
    }

    fn project(select: Select, locale: Option<&str>) -> Result<Projection, CompileError> {
        let catalog = catalog();
        compile_projection(Some(&select), &catalog, catalog.collection("posts").unwrap(), locale)
    }

    #[test]
    fn test_no_selection_projects_everything() {
        let catalog = catalog();
        let projection =
            compile_projection(None, &catalog, catalog.collection("posts").unwrap(), None).unwrap();
        assert!(projection.is_all());
    }

    #[test]
    fn test_inclusion_list_with_locale() {
        let projection = project(Select::fields(["title", "body"]), Some("en")).unwrap();
        assert_eq!(projection.expression.as_deref(), Some("#p0, #p1.#p2, #p3"));
        assert_eq!(projection.names["#p0"], "id");
        assert_eq!(projection.names["#p1"], "title");
        assert_eq!(projection.names["#p2"], "en");
        assert_eq!(projection.names["#p3"], "body");
    }

    #[test]
    fn test_localized_without_locale_projects_all_locales() {
        let projection = project(Select::fields(["title"]), None).unwrap();
        assert_eq!(projection.expression.as_deref(), Some("#p0, #p1"));
    }

    #[test]
    fn test_group_recursion_only_for_localized_descendants() {
        let projection = project(Select::fields(["meta", "stats"]), Some("de")).unwrap();
        // id, meta.slug, meta.summary.de, stats
        assert_eq!(
            projection.expression.as_deref(),
            Some("#p0, #p1.#p2, #p1.#p3.#p4, #p5")
        );
        assert_eq!(projection.names["#p4"], "de");
        assert_eq!(projection.names["#p5"], "stats");
    }

    #[test]
    fn test_tokens_reused_per_attribute_name() {
        let projection = project(Select::fields(["id", "title", "id"]), Some("en")).unwrap();
        assert_eq!(projection.expression.as_deref(), Some("#p0, #p1.#p2"));
    }

    #[test]
    fn test_exclusion_map() {
        let projection = project(Select::excluding(["body", "meta"]), None).unwrap();
        let names: Vec<&str> = projection.names.values().map(String::as_str).collect();
        assert!(names.contains(&"title"));
        assert!(names.contains(&"author"));
        assert!(!names.contains(&"body"));
        assert!(!names.contains(&"meta"));
    }

    #[test]
    fn test_errors() {
        let err = project(Select::fields(["missing"]), None).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::UnknownField);

        let err = project(Select::excluding(["missing"]), None).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::UnknownField);
    }
}
