use cyphergen_common::types::Value;
use cyphergen_common::utils::error::{Result, SchemaError};
use cyphergen_core::resolve_tree::ResolveTree;
use cyphergen_core::schema::{AuthorizationOperation, ConcreteEntity, Entity, Relationship};

use super::as_input;
use crate::factory::{AuthorizationFactory, FactoryScope, FilterFactory};
use crate::query_ast::operations::{DeleteOperation, NestedDelete, Operation};
use crate::query_ast::selection::{NodeSelection, Selection};

/// Builds `deleteMovies(where, delete)`.
#[derive(Debug, Clone, Copy)]
pub struct DeleteFactory<'a> {
    scope: FactoryScope<'a>,
}

impl<'a> DeleteFactory<'a> {
    /// Creates a factory.
    #[must_use]
    pub fn new(scope: FactoryScope<'a>) -> Self {
        Self { scope }
    }

    /// Deletes the matched nodes of `target`, related nodes named in
    /// `delete` first.
    pub fn create_delete(&self, target: &'a ConcreteEntity, tree: &ResolveTree) -> Result<Operation<'a>> {
        let entity = self.scope.entity_of(target)?;
        let mut filters = FilterFactory::new(self.scope).create_node_filters(entity, tree.arg("where"))?;
        filters.extend(
            AuthorizationFactory::new(self.scope).create_entity_auth_filters(entity, &[AuthorizationOperation::Delete])?,
        );
        let nested = self.nested_deletes(entity, tree.arg("delete"))?;
        Ok(Operation::Delete(DeleteOperation {
            target,
            selection: Selection::Node(NodeSelection::of(target)),
            filters,
            nested,
        }))
    }

    /// `{ actors: [{ where: { node: {...} }, delete: {...} }] }` under `entity`.
    pub(crate) fn nested_deletes(&self, entity: &'a Entity, input: Option<&Value>) -> Result<Vec<NestedDelete<'a>>> {
        let Some(input) = input.filter(|v| !v.is_null()) else {
            return Ok(Vec::new());
        };
        let owner = format!("{}DeleteInput", entity.name());
        let mut deletes = Vec::new();
        for (name, value) in as_input(&owner, input)? {
            let relationship = entity.find_relationship(name).ok_or_else(|| SchemaError::FieldNotFound {
                entity: owner.clone(),
                field: name.clone(),
            })?;
            for item in value.items() {
                deletes.push(self.nested_delete(relationship, item)?);
            }
        }
        Ok(deletes)
    }

    /// One `{ where, delete }` item of `relationship`.
    pub(crate) fn nested_delete(&self, relationship: &'a Relationship, item: &Value) -> Result<NestedDelete<'a>> {
        let target = self.scope.schema.target_of(relationship)?;
        let item = as_input(&relationship.name, item)?;
        let mut filters = FilterFactory::new(self.scope).create_connection_filters(relationship, item.get("where"))?;
        filters.extend(
            AuthorizationFactory::new(self.scope).create_entity_auth_filters(target, &[AuthorizationOperation::Delete])?,
        );
        Ok(NestedDelete {
            relationship,
            target_labels: self.scope.labels_of(target),
            filters,
            nested: self.nested_deletes(target, item.get("delete"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TranslationContext;
    use crate::factory::operations::fixture;
    use cyphergen_adapters::cypher::Labels;
    use cyphergen_common::utils::error::Error;
    use serde_json::json;

    #[test]
    fn test_delete_with_nested_delete() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let factory = DeleteFactory::new(FactoryScope::new(&schema, &context));
        let movie = schema.entity("Movie").unwrap().as_concrete().unwrap();
        let tree = ResolveTree::new("deleteMovies")
            .with_arg("where", Value::from(json!({"title": "Heat"})))
            .with_arg(
                "delete",
                Value::from(json!({
                    "actors": {
                        "where": {"node": {"name": "Val"}},
                        "delete": {"productions": [{}]}
                    }
                })),
            );
        let Operation::Delete(delete) = factory.create_delete(movie, &tree).unwrap() else {
            panic!("expected a delete");
        };
        assert_eq!(delete.filters.len(), 1);
        assert_eq!(delete.nested.len(), 1);
        let actors = &delete.nested[0];
        assert_eq!(actors.target_labels, Labels::all(["Actor"]));
        assert_eq!(actors.filters.len(), 1);
        assert_eq!(actors.nested.len(), 1);
        assert_eq!(actors.nested[0].target_labels, Labels::any(["Movie", "Series"]));
        assert!(actors.nested[0].filters.is_empty());
    }

    #[test]
    fn test_unknown_nested_relationship() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let factory = DeleteFactory::new(FactoryScope::new(&schema, &context));
        let movie = schema.entity("Movie").unwrap().as_concrete().unwrap();
        let tree = ResolveTree::new("deleteMovies").with_arg("delete", Value::from(json!({"writers": {}})));
        let err = factory.create_delete(movie, &tree).unwrap_err();
        assert_eq!(
            err,
            Error::Schema(SchemaError::FieldNotFound {
                entity: "MovieDeleteInput".into(),
                field: "writers".into()
            })
        );
    }
}
