//! Field path resolution against the catalog.

use crate::catalog::{Catalog, CollectionDef, FieldDef, FieldRef};
use crate::error::CompileError;

/// A relationship crossed on the way to a path's terminal field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipCrossing {
    /// Dotted path up to and including the relationship field.
    pub relationship_path: String,
    /// Slug of the related collection.
    pub target: String,
    /// Dotted remainder resolved in the related collection, locale included.
    pub remainder: String,
}

/// A dotted field path checked against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath<'c> {
    /// Stored attribute names, with the locale appended for localized fields.
    pub attributes: Vec<String>,
    pub terminal: FieldRef<'c>,
    pub crossing: Option<RelationshipCrossing>,
}

impl ResolvedPath<'_> {
    /// The stored attribute path in dotted form.
    pub fn dotted(&self) -> String {
        self.attributes.join(".")
    }

    /// Whether the path names a single top-level attribute.
    pub fn is_top_level(&self) -> bool {
        self.attributes.len() == 1 && self.crossing.is_none()
    }
}

#[derive(Clone, Copy)]
enum Scope<'c> {
    Collection(&'c CollectionDef),
    Fields(&'c FieldDef),
}

impl<'c> Scope<'c> {
    fn lookup(&self, name: &str) -> Option<FieldRef<'c>> {
        match self {
            Scope::Collection(collection) => collection.field(name),
            Scope::Fields(parent) => parent.subfield(name).map(FieldRef::Declared),
        }
    }
}

/// Resolve a dotted path within a collection.
///
/// Groups, arrays and blocks are descended into; a relationship followed by further
/// segments continues in its (single) target collection. Only one relationship may be
/// crossed. `locale` is the active locale, appended to a localized terminal field.
pub fn resolve_path<'c>(
    catalog: &'c Catalog,
    collection: &'c CollectionDef,
    path: &str,
    locale: Option<&str>,
) -> Result<ResolvedPath<'c>, CompileError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(CompileError::unknown_field(path, ""));
    }

    let mut scope = Scope::Collection(collection);
    let mut crossed_at: Option<(usize, String)> = None;
    let mut terminal = None;

    for (i, segment) in segments.iter().enumerate() {
        let field = scope
            .lookup(segment)
            .ok_or_else(|| CompileError::unknown_field(path, segment))?;

        if i + 1 == segments.len() {
            terminal = Some(field);
            break;
        }

        let def = match field.def() {
            Some(def) => def,
            None => return Err(CompileError::unknown_field(path, segments[i + 1])),
        };

        if def.field_type.has_subfields() {
            scope = Scope::Fields(def);
        } else if def.field_type.is_reference() {
            if crossed_at.is_some() {
                return Err(CompileError::unsupported_path(
                    path,
                    "paths may cross at most one relationship",
                ));
            }
            let [target] = def.relation_to.as_slice() else {
                return Err(CompileError::unsupported_path(
                    path,
                    format!("'{}' is polymorphic and cannot be traversed", def.name),
                ));
            };
            let related = catalog.collection(target).ok_or_else(|| {
                CompileError::unsupported_path(
                    path,
                    format!("related collection '{}' is not registered", target),
                )
            })?;
            crossed_at = Some((i, related.slug.clone()));
            scope = Scope::Collection(related);
        } else {
            return Err(CompileError::unknown_field(path, segments[i + 1]));
        }
    }

    let terminal = terminal.ok_or_else(|| CompileError::unknown_field(path, ""))?;

    let mut attributes: Vec<String> = segments.iter().map(|s| s.to_string()).collect();
    if let (Some(def), Some(locale)) = (terminal.def(), locale) {
        if def.localized {
            attributes.push(locale.to_string());
        }
    }

    let crossing = crossed_at.map(|(i, target)| RelationshipCrossing {
        relationship_path: segments[..=i].join("."),
        target,
        remainder: attributes[i + 1..].join("."),
    });

    Ok(ResolvedPath {
        attributes,
        terminal,
        crossing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldType, LocalizationConfig};
    use crate::error::CompileErrorKind;

    fn catalog() -> Catalog {
        Catalog::new()
            .with_localization(LocalizationConfig::new(vec!["en".into(), "de".into()], "en"))
            .with_collection(
                CollectionDef::new("users")
                    .with_field(FieldDef::new("name", FieldType::Text).localized())
                    .with_field(FieldDef::relationship("team", "teams")),
            )
            .with_collection(CollectionDef::new("teams"))
            .with_collection(
                CollectionDef::new("posts")
                    .with_field(FieldDef::new("title", FieldType::Text))
                    .with_field(FieldDef::relationship("author", "users"))
                    .with_field(
                        FieldDef::relationship("owner", "users")
                            .with_relation_to(vec!["users".into(), "teams".into()]),
                    )
                    .with_field(FieldDef::group(
                        "meta",
                        vec![FieldDef::new("slug", FieldType::Text)],
                    )),
            )
    }

    fn resolve(path: &str, locale: Option<&str>) -> Result<Vec<String>, CompileError> {
        let catalog = catalog();
        let posts = catalog.collection("posts").unwrap();
        resolve_path(&catalog, posts, path, locale).map(|r| r.attributes)
    }

    #[test]
    fn test_plain_and_implicit_fields() {
        assert_eq!(resolve("title", None).unwrap(), vec!["title"]);
        assert_eq!(resolve("createdAt", None).unwrap(), vec!["createdAt"]);
        assert_eq!(resolve("meta.slug", None).unwrap(), vec!["meta", "slug"]);
    }

    #[test]
    fn test_relationship_crossing_with_locale() {
        let catalog = catalog();
        let posts = catalog.collection("posts").unwrap();
        let resolved = resolve_path(&catalog, posts, "author.name", Some("en")).unwrap();

        assert_eq!(resolved.dotted(), "author.name.en");
        let crossing = resolved.crossing.unwrap();
        assert_eq!(crossing.relationship_path, "author");
        assert_eq!(crossing.target, "users");
        assert_eq!(crossing.remainder, "name.en");
    }

    #[test]
    fn test_unknown_and_unsupported_paths() {
        let err = resolve("missing", None).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::UnknownField);

        let err = resolve("title.deeper", None).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::UnknownField);

        let err = resolve("author.team.id", None).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::UnsupportedPath);

        let err = resolve("owner.name", None).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::UnsupportedPath);

        assert!(resolve("meta..slug", None).is_err());
    }
}
