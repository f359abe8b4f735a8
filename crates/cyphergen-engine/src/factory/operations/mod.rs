//! One factory per operation kind.
//!
//! Reads and connections resolve abstract entities into one branch per
//! concrete entity; mutations always target a concrete entity.

mod aggregate;
mod connection;
mod create;
mod delete;
mod read;
mod update;

pub use aggregate::AggregateFactory;
pub use connection::ConnectionFactory;
pub use create::{CreateFactory, UnwindPlan};
pub use delete::DeleteFactory;
pub use read::ReadFactory;
pub use update::UpdateFactory;

use cyphergen_common::types::Value;
use cyphergen_common::utils::error::{InputError, Result, SchemaError};
use cyphergen_core::schema::{Attribute, ConcreteEntity, Entity};
use indexmap::IndexMap;

use super::filters::as_where;
use super::{FactoryScope, FilterFactory};
use crate::query_ast::fields::Field;
use crate::query_ast::filters::Filter;

/// A concrete entity an operation reads, with the filters that apply to it.
#[derive(Debug)]
pub(crate) struct Branch<'a> {
    pub(crate) member: &'a Entity,
    pub(crate) target: &'a ConcreteEntity,
    pub(crate) filters: Vec<Filter<'a>>,
}

/// Resolves `entity` into branches and builds the `where` filters of each.
///
/// A union `where` is keyed by member type; when present, only the listed
/// members are read. Interface and concrete filters apply to every branch,
/// and a top-level interface `typename_IN` drops the implementations it
/// does not list.
pub(crate) fn branches<'a>(
    scope: FactoryScope<'a>,
    entity: &'a Entity,
    where_: Option<&Value>,
) -> Result<Vec<Branch<'a>>> {
    let filters = FilterFactory::new(scope);
    let union_where = match (entity, where_.filter(|v| !v.is_null())) {
        (Entity::Union(_), Some(value)) => Some(as_where("where", value)?),
        _ => None,
    };
    if let Some(map) = union_where {
        check_members(entity, map)?;
    }
    let typenames = match entity {
        Entity::Interface(_) => accepted_typenames(where_),
        _ => None,
    };

    let mut branches = Vec::new();
    for target in scope.schema.concrete_entities(entity) {
        let member = scope.entity_of(target)?;
        let branch_filters = match union_where {
            Some(map) if !map.is_empty() => match map.get(&target.name) {
                Some(value) => filters.create_node_filters(member, Some(value))?,
                None => continue,
            },
            Some(_) => Vec::new(),
            None => filters.create_node_filters(entity, where_)?,
        };
        if typenames.as_ref().is_some_and(|names| !names.contains(&target.name.as_str())) {
            continue;
        }
        branches.push(Branch {
            member,
            target,
            filters: branch_filters,
        });
    }
    Ok(branches)
}

/// Names listed by a top-level `typename_IN`, if it names any.
fn accepted_typenames(where_: Option<&Value>) -> Option<Vec<&str>> {
    let names: Vec<_> = where_?
        .as_map()?
        .get("typename_IN")?
        .as_list()?
        .iter()
        .filter_map(Value::as_str)
        .collect();
    (!names.is_empty()).then_some(names)
}

fn check_members(entity: &Entity, map: &IndexMap<String, Value>) -> Result<()> {
    let members = entity.concrete_names();
    match map.keys().find(|key| !members.contains(&key.as_str())) {
        Some(key) => Err(SchemaError::FieldNotFound {
            entity: entity.name().to_string(),
            field: key.clone(),
        }
        .into()),
        None => Ok(()),
    }
}

/// A mutation input object.
pub(crate) fn as_input<'v>(argument: &str, value: &'v Value) -> Result<&'v IndexMap<String, Value>> {
    value.as_map().ok_or_else(|| {
        InputError::invalid_argument(argument, format!("expected an object, got {}", value.type_name())).into()
    })
}

/// The entities a branch looks fields up in: the concrete entity first, then
/// the abstract entity it was reached through.
pub(crate) fn lookup_order<'a>(entity: &'a Entity, member: &'a Entity) -> Vec<&'a Entity> {
    if entity.name() == member.name() {
        vec![member]
    } else {
        vec![member, entity]
    }
}

/// Attributes read by `fields`, for attribute-level authorization.
pub(crate) fn read_attributes<'a>(fields: &[Field<'a>]) -> Vec<&'a Attribute> {
    fields
        .iter()
        .filter_map(|field| match field {
            Field::Attribute(field) => Some(field.attribute),
            Field::Cypher(field) => Some(field.attribute),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixture {
    use cyphergen_core::schema::{
        AttributeType, EntityAnnotations, FulltextIndex, InterfaceEntity, Relationship,
        RelationshipDirection, RelationshipProperties, ScalarType, SchemaModel, TimestampOperation,
        UnionEntity, VectorIndex,
    };

    use super::*;

    /// Movies, actors and series, with an interface, a union and edge
    /// properties.
    pub(crate) fn schema() -> SchemaModel {
        SchemaModel::builder()
            .entity(
                ConcreteEntity::new("Movie")
                    .attribute(Attribute::new("id", AttributeType::Scalar(ScalarType::Id)).autogenerated_id())
                    .attribute(Attribute::new("title", AttributeType::string()))
                    .attribute(Attribute::new("runtime", AttributeType::Scalar(ScalarType::Int)))
                    .attribute(Attribute::new("rating", AttributeType::Scalar(ScalarType::Float)))
                    .attribute(Attribute::new("released", AttributeType::Scalar(ScalarType::DateTime)))
                    .attribute(Attribute::new("tags", AttributeType::list_of(AttributeType::string())))
                    .attribute(Attribute::new("status", AttributeType::string()).default_value("DRAFT"))
                    .attribute(
                        Attribute::new("updatedAt", AttributeType::Scalar(ScalarType::DateTime))
                            .timestamp(&[TimestampOperation::Update]),
                    )
                    .relationship(
                        Relationship::new("actors", "ACTED_IN", RelationshipDirection::In, "Actor")
                            .with_properties("ActedIn"),
                    )
                    .relationship(Relationship::new("director", "DIRECTED", RelationshipDirection::In, "Actor").single())
                    .annotations(EntityAnnotations {
                        fulltext: vec![FulltextIndex {
                            index_name: "MovieTitle".into(),
                            query_name: "moviesByTitle".into(),
                            fields: vec!["title".into()],
                        }],
                        vector: vec![VectorIndex {
                            index_name: "MovieEmbedding".into(),
                            query_name: "similarMovies".into(),
                            embedding_property: "embedding".into(),
                        }],
                        ..EntityAnnotations::default()
                    }),
            )
            .entity(
                ConcreteEntity::new("Series")
                    .attribute(Attribute::new("title", AttributeType::string()))
                    .attribute(Attribute::new("episodes", AttributeType::Scalar(ScalarType::Int))),
            )
            .entity(
                ConcreteEntity::new("Actor")
                    .attribute(Attribute::new("name", AttributeType::string()))
                    .attribute(Attribute::new("born", AttributeType::Scalar(ScalarType::Int)))
                    .relationship(
                        Relationship::new("movies", "ACTED_IN", RelationshipDirection::Out, "Movie")
                            .with_properties("ActedIn"),
                    )
                    .relationship(Relationship::new(
                        "productions",
                        "ACTED_IN",
                        RelationshipDirection::Out,
                        "Production",
                    ))
                    .relationship(Relationship::new("favourites", "LIKES", RelationshipDirection::Out, "Search")),
            )
            .entity(
                InterfaceEntity::new("Production", ["Movie", "Series"])
                    .attribute(Attribute::new("title", AttributeType::string())),
            )
            .entity(UnionEntity::new("Search", ["Movie", "Actor"]))
            .relationship_properties(
                RelationshipProperties::new("ActedIn")
                    .attribute(Attribute::new("role", AttributeType::string()))
                    .attribute(Attribute::new("screenTime", AttributeType::Scalar(ScalarType::Int)).default_value(0)),
            )
            .build()
            .expect("fixture schema is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TranslationContext;
    use serde_json::json;

    #[test]
    fn test_interface_branches_share_filters() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let scope = FactoryScope::new(&schema, &context);
        let production = schema.entity("Production").unwrap();
        let where_ = Value::from(json!({"title": "Heat"}));
        let branches = branches(scope, production, Some(&where_)).unwrap();
        let names: Vec<_> = branches.iter().map(|b| b.target.name.as_str()).collect();
        assert_eq!(names, ["Movie", "Series"]);
        assert!(branches.iter().all(|b| b.filters.len() == 1));
    }

    #[test]
    fn test_interface_typename_in_restricts_branches() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let scope = FactoryScope::new(&schema, &context);
        let production = schema.entity("Production").unwrap();

        let where_ = Value::from(json!({"typename_IN": ["Movie"], "title": "Heat"}));
        let movies = branches(scope, production, Some(&where_)).unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].target.name, "Movie");

        let nested = Value::from(json!({"OR": [{"typename_IN": ["Movie"]}, {"title": "Heat"}]}));
        assert_eq!(branches(scope, production, Some(&nested)).unwrap().len(), 2);

        let foreign = Value::from(json!({"typename_IN": ["Actor"]}));
        assert!(branches(scope, production, Some(&foreign)).is_err());
    }

    #[test]
    fn test_union_where_restricts_members() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let scope = FactoryScope::new(&schema, &context);
        let search = schema.entity("Search").unwrap();

        let where_ = Value::from(json!({"Actor": {"name": "Val"}}));
        let restricted = branches(scope, search, Some(&where_)).unwrap();
        assert_eq!(restricted.len(), 1);
        assert_eq!(restricted[0].target.name, "Actor");

        let all = branches(scope, search, None).unwrap();
        assert_eq!(all.len(), 2);

        let err = branches(scope, search, Some(&Value::from(json!({"Series": {}})))).unwrap_err();
        assert!(matches!(
            err,
            cyphergen_common::utils::error::Error::Schema(SchemaError::FieldNotFound { .. })
        ));
    }
}
