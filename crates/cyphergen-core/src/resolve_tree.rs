//! Parsed GraphQL selections.
//!
//! A [`ResolveTree`] is one requested field: its name, output alias,
//! arguments, and nested selections grouped by the type they apply to.

use cyphergen_common::types::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Nested selections keyed by output alias.
pub type FieldMap = IndexMap<String, ResolveTree>;

/// A requested GraphQL field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveTree {
    /// Field name in the schema.
    pub name: String,
    /// Output key; the name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Arguments.
    #[serde(default)]
    pub args: IndexMap<String, Value>,
    /// Selections per type name.
    #[serde(default)]
    pub fields_by_type_name: IndexMap<String, FieldMap>,
}

impl ResolveTree {
    /// A field with no arguments or selections.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the output alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Adds an argument.
    #[must_use]
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Adds selections that apply to `type_name`.
    #[must_use]
    pub fn with_fields(
        mut self,
        type_name: impl Into<String>,
        fields: impl IntoIterator<Item = ResolveTree>,
    ) -> Self {
        let map = self.fields_by_type_name.entry(type_name.into()).or_default();
        for field in fields {
            map.insert(field.alias().to_string(), field);
        }
        self
    }

    /// Output key.
    #[must_use]
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// A non-null argument.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name).filter(|v| !v.is_null())
    }

    /// Selections applying to any of `type_names`, merged in the given order.
    ///
    /// Later types override earlier ones for the same alias, so pass the
    /// interface before the concrete type.
    #[must_use]
    pub fn fields_for(&self, type_names: &[&str]) -> FieldMap {
        let mut merged = FieldMap::new();
        for type_name in type_names {
            if let Some(fields) = self.fields_by_type_name.get(*type_name) {
                for (alias, field) in fields {
                    merged.insert(alias.clone(), field.clone());
                }
            }
        }
        merged
    }

    /// Selections of every type, merged in declaration order.
    #[must_use]
    pub fn merged_fields(&self) -> FieldMap {
        let mut merged = FieldMap::new();
        for fields in self.fields_by_type_name.values() {
            for (alias, field) in fields {
                merged.entry(alias.clone()).or_insert_with(|| field.clone());
            }
        }
        merged
    }

    /// The first nested selection with the given schema name.
    #[must_use]
    pub fn find_field(&self, name: &str) -> Option<&ResolveTree> {
        self.fields_by_type_name
            .values()
            .flat_map(|fields| fields.values())
            .find(|field| field.name == name)
    }

    /// Returns `true` if any nested selection has the given schema name.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.find_field(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize() {
        let tree: ResolveTree = serde_json::from_str(
            r#"{
                "name": "movies",
                "args": {"where": {"title": "Matrix"}, "limit": null},
                "fieldsByTypeName": {"Movie": {"t": {"name": "title", "alias": "t"}}}
            }"#,
        )
        .unwrap();
        assert_eq!(tree.alias(), "movies");
        assert!(tree.arg("where").is_some());
        assert!(tree.arg("limit").is_none());
        assert_eq!(tree.merged_fields()["t"].name, "title");
        assert!(tree.has_field("title"));
    }

    #[test]
    fn test_fields_for_merges_in_order() {
        let tree = ResolveTree::new("productions")
            .with_fields("Production", [ResolveTree::new("title")])
            .with_fields(
                "Movie",
                [ResolveTree::new("runtime"), ResolveTree::new("title").with_arg("x", 1)],
            )
            .with_fields("Series", [ResolveTree::new("episodes")]);

        let movie = tree.fields_for(&["Production", "Movie"]);
        let keys: Vec<_> = movie.keys().cloned().collect();
        assert_eq!(keys, vec!["title", "runtime"]);
        assert!(movie["title"].arg("x").is_some());

        let series = tree.fields_for(&["Production", "Series"]);
        assert_eq!(series.len(), 2);
    }
}
