//! Builds the Query AST from a resolve tree.
//!
//! Each factory is a copyable view over a [`FactoryScope`]: the schema model
//! the request is resolved against and the per-request context. Factories
//! call each other freely; none of them keeps state between calls.
//!
//! Entry points are [`QueryAstFactory::create_query_ast`] for root Query and
//! Mutation fields, and [`QueryAstFactory::create_top_level_cypher_ast`] for
//! `@cypher` fields declared on the Query type.

mod authorization;
mod fields;
mod filters;
mod operations;
mod sort_pagination;

use std::sync::LazyLock;

use cyphergen_adapters::cypher::Labels;
use cyphergen_common::utils::error::{Error, Result, SchemaError};
use cyphergen_core::resolve_tree::{FieldMap, ResolveTree};
use cyphergen_core::schema::{Attribute, ConcreteEntity, Entity, RootField, SchemaModel};
use regex::Regex;
use tracing::debug;

pub use authorization::AuthorizationFactory;
pub use fields::FieldFactory;
pub use filters::FilterFactory;
pub use operations::{
    AggregateFactory, ConnectionFactory, CreateFactory, DeleteFactory, ReadFactory, UnwindPlan,
    UpdateFactory,
};
pub use sort_pagination::SortAndPaginationFactory;

use crate::context::TranslationContext;
use crate::query_ast::QueryAst;
use crate::query_ast::operations::{CypherScalarOperation, Operation};

/// Selections resolved by the GraphQL layer and never projected.
pub(crate) const INTROSPECTION_FIELDS: [&str; 3] = ["__typename", "__resolveType", "__id"];

pub(crate) fn is_introspection(name: &str) -> bool {
    INTROSPECTION_FIELDS.contains(&name)
}

/// A key grammar, compiled on first use.
pub(crate) type KeyPattern = LazyLock<std::result::Result<Regex, regex::Error>>;

pub(crate) fn compiled(pattern: &'static KeyPattern) -> Result<&'static Regex> {
    pattern
        .as_ref()
        .map_err(|e| Error::internal(format!("invalid key pattern: {e}")))
}

/// What every factory reads from.
#[derive(Debug, Clone, Copy)]
pub struct FactoryScope<'a> {
    /// The schema model.
    pub schema: &'a SchemaModel,
    /// The per-request context.
    pub context: &'a TranslationContext,
}

impl<'a> FactoryScope<'a> {
    /// Creates a scope.
    #[must_use]
    pub fn new(schema: &'a SchemaModel, context: &'a TranslationContext) -> Self {
        Self { schema, context }
    }

    /// Label constraint matching any concrete entity behind `entity`.
    pub(crate) fn labels_of(&self, entity: &Entity) -> Labels {
        match entity {
            Entity::Concrete(concrete) => concrete_labels(concrete),
            _ => Labels::any(
                self.schema
                    .concrete_entities(entity)
                    .into_iter()
                    .filter_map(|concrete| concrete.labels.first().cloned()),
            ),
        }
    }

    /// The entity of a concrete entity, for lookups shared with abstract ones.
    pub(crate) fn entity_of(&self, concrete: &ConcreteEntity) -> Result<&'a Entity> {
        self.schema.entity(&concrete.name)
    }
}

pub(crate) fn concrete_labels(entity: &ConcreteEntity) -> Labels {
    Labels::all(entity.labels.iter().cloned())
}

pub(crate) fn as_concrete(entity: &Entity) -> Result<&ConcreteEntity> {
    entity
        .as_concrete()
        .ok_or_else(|| Error::internal(format!("`{}` is not a concrete entity", entity.name())))
}

/// Selections under the mutation response field that carries the nodes,
/// such as `movies` in `createMovies { movies { title } }`.
pub(crate) fn response_fields(tree: &ResolveTree, entity: &Entity, response: &str) -> Result<FieldMap> {
    let plural = entity.plural();
    let mut nodes = FieldMap::new();
    for field in tree.merged_fields().values() {
        if field.name == plural {
            nodes = field.fields_for(&[entity.name()]);
        } else if field.name != "info" && !is_introspection(&field.name) {
            return Err(SchemaError::FieldNotFound {
                entity: response.to_string(),
                field: field.name.clone(),
            }
            .into());
        }
    }
    Ok(nodes)
}

/// Turns root fields into Query ASTs.
#[derive(Debug, Clone, Copy)]
pub struct QueryAstFactory<'a> {
    scope: FactoryScope<'a>,
}

impl<'a> QueryAstFactory<'a> {
    /// Creates a factory over `schema` for one request.
    #[must_use]
    pub fn new(schema: &'a SchemaModel, context: &'a TranslationContext) -> Self {
        Self {
            scope: FactoryScope::new(schema, context),
        }
    }

    /// The shared scope.
    #[must_use]
    pub fn scope(&self) -> FactoryScope<'a> {
        self.scope
    }

    /// Builds the AST of a root Query or Mutation field.
    pub fn create_query_ast(&self, tree: &ResolveTree) -> Result<QueryAst<'a>> {
        let root = self
            .scope
            .schema
            .root_field(&tree.name)
            .ok_or_else(|| SchemaError::UnknownRootField(tree.name.clone()))?;
        let scope = self.scope;
        let operation = match root {
            RootField::Read(entity) => ReadFactory::new(scope).create_read(entity, tree)?,
            RootField::Connection(entity) => {
                ConnectionFactory::new(scope).create_connection(entity, tree)?
            }
            RootField::Aggregate(entity) => {
                AggregateFactory::new(scope).create_aggregate(entity, tree)?
            }
            RootField::Create(entity) => {
                let target = as_concrete(entity)?;
                let factory = CreateFactory::new(scope);
                match factory.plan_unwind_create(target, tree)? {
                    UnwindPlan::Supported(operation) => Operation::UnwindCreate(operation),
                    UnwindPlan::Unsupported(reason) => {
                        debug!(entity = %target.name, reason, "batched create unavailable, creating row by row");
                        factory.create_create(target, tree)?
                    }
                }
            }
            RootField::Update(entity) => {
                UpdateFactory::new(scope).create_update(as_concrete(entity)?, tree)?
            }
            RootField::Delete(entity) => {
                DeleteFactory::new(scope).create_delete(as_concrete(entity)?, tree)?
            }
            RootField::Fulltext { entity, index } => {
                ConnectionFactory::new(scope).create_fulltext(entity, index, tree)?
            }
            RootField::Vector { entity, index } => {
                ConnectionFactory::new(scope).create_vector(entity, index, tree)?
            }
            RootField::Cypher(attribute) => return self.create_top_level_cypher_ast(tree, attribute),
        };
        Ok(QueryAst::new(operation))
    }

    /// Builds the AST of a `@cypher` field on the Query type.
    ///
    /// Fields returning an entity read the returned nodes like any other
    /// read; fields returning scalars unwind the statement's column.
    pub fn create_top_level_cypher_ast(&self, tree: &ResolveTree, attribute: &'a Attribute) -> Result<QueryAst<'a>> {
        let annotation = attribute.annotations.cypher.as_ref().ok_or_else(|| {
            SchemaError::InvalidSchema(format!("Query field `{}` has no @cypher statement", attribute.name))
        })?;
        let type_name = attribute.attribute_type.type_name();
        if let Some(entity) = self.scope.schema.get_entity(type_name) {
            let operation =
                ReadFactory::new(self.scope).create_cypher_read(attribute, annotation, entity, tree)?;
            return Ok(QueryAst::new(operation));
        }
        if !tree.fields_by_type_name.is_empty() {
            return Err(SchemaError::UnresolvedType {
                entity: "Query".to_string(),
                attribute: attribute.name.clone(),
                type_name: type_name.to_string(),
            }
            .into());
        }
        Ok(QueryAst::new(Operation::CypherScalar(CypherScalarOperation {
            attribute,
            annotation,
            arguments: tree.args.clone(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyphergen_core::schema::{AttributeType, InterfaceEntity};

    fn schema() -> SchemaModel {
        SchemaModel::builder()
            .entity(ConcreteEntity::new("Movie").attribute(Attribute::new("title", AttributeType::string())))
            .entity(ConcreteEntity::new("Series").attribute(Attribute::new("title", AttributeType::string())))
            .entity(InterfaceEntity::new("Production", ["Movie", "Series"]))
            .query_field(
                Attribute::new("titles", AttributeType::list_of(AttributeType::string()))
                    .cypher("MATCH (m:Movie) RETURN m.title AS t", "t"),
            )
            .query_field(
                Attribute::new("best", "Unknown".parse::<AttributeType>().unwrap())
                    .cypher("RETURN 1 AS x", "x"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_unknown_root_field() {
        let schema = schema();
        let context = TranslationContext::default();
        let factory = QueryAstFactory::new(&schema, &context);
        let err = factory.create_query_ast(&ResolveTree::new("nothing")).unwrap_err();
        assert_eq!(err, SchemaError::UnknownRootField("nothing".into()).into());
    }

    #[test]
    fn test_labels_of_interface() {
        let schema = schema();
        let context = TranslationContext::default();
        let scope = FactoryScope::new(&schema, &context);
        let production = schema.entity("Production").unwrap();
        assert_eq!(scope.labels_of(production), Labels::any(["Movie", "Series"]));
    }

    #[test]
    fn test_scalar_cypher_query_field() {
        let schema = schema();
        let context = TranslationContext::default();
        let factory = QueryAstFactory::new(&schema, &context);
        let ast = factory.create_query_ast(&ResolveTree::new("titles")).unwrap();
        assert!(matches!(ast.operation(), Operation::CypherScalar(_)));
    }

    #[test]
    fn test_unresolved_cypher_type() {
        let schema = schema();
        let context = TranslationContext::default();
        let factory = QueryAstFactory::new(&schema, &context);
        let tree = ResolveTree::new("best").with_fields("Unknown", [ResolveTree::new("id")]);
        let err = factory.create_query_ast(&tree).unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::UnresolvedType { .. })));
    }
}
