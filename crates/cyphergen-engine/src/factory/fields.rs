//! Selection sets to projected fields.

use cyphergen_common::utils::error::{Result, SchemaError};
use cyphergen_core::resolve_tree::{FieldMap, ResolveTree};
use cyphergen_core::schema::{Attribute, AttributeType, Entity, RelationshipProperties};

use super::operations::{AggregateFactory, ConnectionFactory, ReadFactory};
use super::{FactoryScope, is_introspection};
use crate::query_ast::fields::{AttributeField, AttributeFieldKind, CypherAttributeField, Field, OperationField};
use crate::query_ast::operations::Operation;

/// Builds the fields of node and edge projections.
#[derive(Debug, Clone, Copy)]
pub struct FieldFactory<'a> {
    scope: FactoryScope<'a>,
}

impl<'a> FieldFactory<'a> {
    /// Creates a factory.
    #[must_use]
    pub fn new(scope: FactoryScope<'a>) -> Self {
        Self { scope }
    }

    /// Fields selected on a node.
    ///
    /// Names are looked up in `entities` in order, so a concrete entity
    /// followed by the interface it was reached through resolves fields
    /// declared on either.
    pub fn create_fields(&self, entities: &[&'a Entity], fields: &FieldMap) -> Result<Vec<Field<'a>>> {
        let mut created = Vec::with_capacity(fields.len());
        for (alias, tree) in fields {
            if is_introspection(&tree.name) {
                continue;
            }
            created.push(self.create_field(entities, alias, tree)?);
        }
        Ok(created)
    }

    fn create_field(&self, entities: &[&'a Entity], alias: &str, tree: &ResolveTree) -> Result<Field<'a>> {
        let name = tree.name.as_str();
        let owner = entities.first().map_or("", |entity| entity.name());

        if let Some((entity, attribute)) = find(entities, |entity| entity.find_attribute(name)) {
            return self.attribute_field(entity, attribute, alias, tree);
        }
        if let Some((_, relationship)) = find(entities, |entity| entity.find_relationship(name)) {
            let operation = ReadFactory::new(self.scope).create_nested_read(relationship, tree)?;
            return Ok(operation_field(alias, operation));
        }
        if let Some(base) = name.strip_suffix("Connection")
            && let Some((_, relationship)) = find(entities, |entity| entity.find_relationship(base))
        {
            let operation = ConnectionFactory::new(self.scope).create_nested_connection(relationship, tree)?;
            return Ok(operation_field(alias, operation));
        }
        if let Some(base) = name.strip_suffix("Aggregate")
            && let Some((_, relationship)) = find(entities, |entity| entity.find_relationship(base))
        {
            let operation = AggregateFactory::new(self.scope).create_nested_aggregate(relationship, tree)?;
            return Ok(operation_field(alias, operation));
        }
        Err(SchemaError::FieldNotFound {
            entity: owner.to_string(),
            field: name.to_string(),
        }
        .into())
    }

    fn attribute_field(
        &self,
        entity: &'a Entity,
        attribute: &'a Attribute,
        alias: &str,
        tree: &ResolveTree,
    ) -> Result<Field<'a>> {
        let Some(annotation) = attribute.annotations.cypher.as_ref() else {
            return Ok(Field::Attribute(AttributeField {
                alias: alias.to_string(),
                attribute,
                kind: field_kind(&attribute.attribute_type, tree),
            }));
        };

        let type_name = attribute.attribute_type.type_name();
        if let Some(target) = self.scope.schema.get_entity(type_name) {
            let operation = ReadFactory::new(self.scope).create_cypher_read(attribute, annotation, target, tree)?;
            return Ok(operation_field(alias, operation));
        }
        if matches!(attribute.attribute_type.base(), AttributeType::Named(_)) && !tree.fields_by_type_name.is_empty() {
            return Err(SchemaError::UnresolvedType {
                entity: entity.name().to_string(),
                attribute: attribute.name.clone(),
                type_name: type_name.to_string(),
            }
            .into());
        }
        Ok(Field::Cypher(CypherAttributeField {
            alias: alias.to_string(),
            attribute,
            annotation,
            arguments: tree.args.clone(),
        }))
    }

    /// Fields selected under `properties` of a connection edge.
    pub fn create_edge_fields(&self, properties: &'a RelationshipProperties, fields: &FieldMap) -> Result<Vec<Field<'a>>> {
        let mut created = Vec::with_capacity(fields.len());
        for (alias, tree) in fields {
            let name = tree.name.as_str();
            if is_introspection(name) {
                continue;
            }
            if let Some(attribute) = properties.find_attribute(name) {
                created.push(Field::Attribute(AttributeField {
                    alias: alias.clone(),
                    attribute,
                    kind: field_kind(&attribute.attribute_type, tree),
                }));
            } else if name.ends_with("Connection") || name.ends_with("Aggregate") {
                return Err(SchemaError::InvalidAnchor {
                    anchor: properties.name.clone(),
                    field: name.to_string(),
                }
                .into());
            } else {
                return Err(SchemaError::FieldNotFound {
                    entity: properties.name.clone(),
                    field: name.to_string(),
                }
                .into());
            }
        }
        Ok(created)
    }
}

fn find<'a, T: 'a>(
    entities: &[&'a Entity],
    lookup: impl Fn(&'a Entity) -> Option<&'a T>,
) -> Option<(&'a Entity, &'a T)> {
    entities
        .iter()
        .find_map(|entity| lookup(*entity).map(|found| (*entity, found)))
}

fn operation_field<'a>(alias: &str, operation: Operation<'a>) -> Field<'a> {
    Field::Operation(OperationField {
        alias: alias.to_string(),
        operation: Box::new(operation),
    })
}

fn field_kind(attribute_type: &AttributeType, tree: &ResolveTree) -> AttributeFieldKind {
    if attribute_type.is_datetime() {
        AttributeFieldKind::DateTime
    } else if attribute_type.is_point() {
        AttributeFieldKind::Point {
            crs: tree.has_field("crs"),
        }
    } else {
        AttributeFieldKind::Plain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TranslationContext;
    use cyphergen_common::utils::error::Error;
    use cyphergen_core::schema::{
        ConcreteEntity, InterfaceEntity, Relationship, RelationshipDirection, ScalarType, SchemaModel,
    };

    fn schema() -> SchemaModel {
        SchemaModel::builder()
            .entity(
                ConcreteEntity::new("Movie")
                    .attribute(Attribute::new("title", AttributeType::string()))
                    .attribute(Attribute::new("released", AttributeType::Scalar(ScalarType::DateTime)))
                    .attribute(Attribute::new("location", AttributeType::Scalar(ScalarType::Point)))
                    .attribute(
                        Attribute::new("rating", AttributeType::Scalar(ScalarType::Float))
                            .cypher("RETURN 4.5 AS r", "r"),
                    )
                    .attribute(
                        Attribute::new("mystery", "Mystery".parse::<AttributeType>().unwrap())
                            .cypher("RETURN 1 AS m", "m"),
                    )
                    .relationship(
                        Relationship::new("actors", "ACTED_IN", RelationshipDirection::In, "Actor")
                            .with_properties("ActedIn"),
                    ),
            )
            .entity(
                ConcreteEntity::new("Actor")
                    .attribute(Attribute::new("name", AttributeType::string()))
                    .attribute(
                        Attribute::new("related", "[Movie]".parse::<AttributeType>().unwrap())
                            .cypher("MATCH (this)-[:ACTED_IN]->(m:Movie) RETURN m", "m"),
                    ),
            )
            .entity(
                InterfaceEntity::new("Production", ["Movie"])
                    .attribute(Attribute::new("title", AttributeType::string())),
            )
            .relationship_properties(
                RelationshipProperties::new("ActedIn").attribute(Attribute::new("role", AttributeType::string())),
            )
            .build()
            .unwrap()
    }

    fn field_map(trees: impl IntoIterator<Item = ResolveTree>) -> FieldMap {
        trees.into_iter().map(|tree| (tree.alias().to_string(), tree)).collect()
    }

    #[test]
    fn test_attribute_kinds() {
        let schema = schema();
        let context = TranslationContext::default();
        let factory = FieldFactory::new(FactoryScope::new(&schema, &context));
        let movie = schema.entity("Movie").unwrap();
        let fields = factory
            .create_fields(
                &[movie],
                &field_map([
                    ResolveTree::new("title").with_alias("name"),
                    ResolveTree::new("released"),
                    ResolveTree::new("location").with_fields("Point", [ResolveTree::new("crs")]),
                    ResolveTree::new("__typename"),
                ]),
            )
            .unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].alias(), "name");
        assert!(matches!(&fields[1], Field::Attribute(f) if f.kind == AttributeFieldKind::DateTime));
        assert!(matches!(&fields[2], Field::Attribute(f) if f.kind == AttributeFieldKind::Point { crs: true }));
    }

    #[test]
    fn test_relationship_fields_become_operations() {
        let schema = schema();
        let context = TranslationContext::default();
        let factory = FieldFactory::new(FactoryScope::new(&schema, &context));
        let movie = schema.entity("Movie").unwrap();
        let fields = factory
            .create_fields(
                &[movie],
                &field_map([
                    ResolveTree::new("actors").with_fields("Actor", [ResolveTree::new("name")]),
                    ResolveTree::new("actorsConnection").with_fields("MovieActorsConnection", [ResolveTree::new("totalCount")]),
                    ResolveTree::new("actorsAggregate").with_fields("MovieActorActorsAggregationSelection", [ResolveTree::new("count")]),
                ]),
            )
            .unwrap();
        assert!(matches!(&fields[0], Field::Operation(f) if matches!(*f.operation, Operation::Read(_))));
        assert!(matches!(&fields[1], Field::Operation(f) if matches!(*f.operation, Operation::Connection(_))));
        assert!(matches!(&fields[2], Field::Operation(f) if matches!(*f.operation, Operation::Aggregation(_))));
    }

    #[test]
    fn test_cypher_fields() {
        let schema = schema();
        let context = TranslationContext::default();
        let factory = FieldFactory::new(FactoryScope::new(&schema, &context));
        let movie = schema.entity("Movie").unwrap();
        let actor = schema.entity("Actor").unwrap();

        let scalar = factory.create_fields(&[movie], &field_map([ResolveTree::new("rating")])).unwrap();
        assert!(matches!(&scalar[0], Field::Cypher(_)));

        let nodes = factory
            .create_fields(
                &[actor],
                &field_map([ResolveTree::new("related").with_fields("Movie", [ResolveTree::new("title")])]),
            )
            .unwrap();
        assert!(matches!(&nodes[0], Field::Operation(f) if matches!(*f.operation, Operation::Read(_))));

        let err = factory
            .create_fields(
                &[movie],
                &field_map([ResolveTree::new("mystery").with_fields("Mystery", [ResolveTree::new("id")])]),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::UnresolvedType { .. })));
    }

    #[test]
    fn test_lookup_falls_back_to_interface() {
        let schema = schema();
        let context = TranslationContext::default();
        let factory = FieldFactory::new(FactoryScope::new(&schema, &context));
        let movie = schema.entity("Movie").unwrap();
        let production = schema.entity("Production").unwrap();
        let err = factory
            .create_fields(&[movie, production], &field_map([ResolveTree::new("budget")]))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::FieldNotFound {
                entity: "Movie".into(),
                field: "budget".into()
            }
            .into()
        );
    }

    #[test]
    fn test_edge_fields() {
        let schema = schema();
        let context = TranslationContext::default();
        let factory = FieldFactory::new(FactoryScope::new(&schema, &context));
        let properties = schema.relationship_properties("ActedIn").unwrap();

        let fields = factory
            .create_edge_fields(properties, &field_map([ResolveTree::new("role")]))
            .unwrap();
        assert_eq!(fields.len(), 1);

        let err = factory
            .create_edge_fields(properties, &field_map([ResolveTree::new("moviesConnection")]))
            .unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::InvalidAnchor { .. })));
    }
}
