//! The schema model.
//!
//! An immutable description of the entities, attributes and relationships a
//! translation resolves requests against. Build it once with
//! [`SchemaBuilder`] or [`SchemaModel::from_json`] and share it by
//! reference; it is `Send + Sync` and never mutated after [`SchemaBuilder::build`].
//!
//! # Example
//!
//! ```
//! use cyphergen_core::schema::{
//!     Attribute, AttributeType, ConcreteEntity, Relationship, RelationshipDirection, SchemaModel,
//! };
//!
//! let schema = SchemaModel::builder()
//!     .entity(
//!         ConcreteEntity::new("Movie")
//!             .attribute(Attribute::new("title", AttributeType::string()))
//!             .relationship(Relationship::new("actors", "ACTED_IN", RelationshipDirection::In, "Actor")),
//!     )
//!     .entity(ConcreteEntity::new("Actor").attribute(Attribute::new("name", AttributeType::string())))
//!     .build()
//!     .unwrap();
//!
//! assert!(schema.get_entity("Movie").is_some());
//! ```

mod annotations;
mod attribute;
mod entity;
mod relationship;

pub use annotations::{
    AuthorizationAnnotation, AuthorizationFilterRule, AuthorizationOperation,
    AuthorizationValidateRule, AuthorizationWhen, CypherAnnotation, EntityAnnotations,
    FulltextIndex, IdAnnotation, LimitAnnotation, TimestampAnnotation, TimestampOperation,
    VectorIndex,
};
pub use attribute::{Attribute, AttributeAnnotations, AttributeType, ScalarType};
pub use entity::{ConcreteEntity, Entity, InterfaceEntity, RootFieldNames, UnionEntity};
pub use relationship::{QueryDirection, Relationship, RelationshipDirection, RelationshipProperties};

use cyphergen_common::utils::error::{Result, SchemaError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// (De)serializes a name-keyed map as a list of named items.
pub(crate) mod named_map {
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub(crate) trait Named {
        fn name(&self) -> &str;
    }

    impl Named for super::Attribute {
        fn name(&self) -> &str {
            &self.name
        }
    }

    impl Named for super::Relationship {
        fn name(&self) -> &str {
            &self.name
        }
    }

    pub(crate) fn serialize<S, T>(map: &IndexMap<String, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        serializer.collect_seq(map.values())
    }

    pub(crate) fn deserialize<'de, D, T>(deserializer: D) -> Result<IndexMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Named,
    {
        let items = Vec::<T>::deserialize(deserializer)?;
        Ok(items
            .into_iter()
            .map(|item| (item.name().to_string(), item))
            .collect())
    }
}

/// A root Query or Mutation field resolved against the schema.
#[derive(Debug, Clone, Copy)]
pub enum RootField<'a> {
    /// `movies`
    Read(&'a Entity),
    /// `moviesConnection`
    Connection(&'a Entity),
    /// `moviesAggregate`
    Aggregate(&'a Entity),
    /// `createMovies`
    Create(&'a Entity),
    /// `updateMovies`
    Update(&'a Entity),
    /// `deleteMovies`
    Delete(&'a Entity),
    /// A `@fulltext` query field.
    Fulltext {
        /// Indexed entity.
        entity: &'a Entity,
        /// Index backing the field.
        index: &'a FulltextIndex,
    },
    /// A `@vector` query field.
    Vector {
        /// Indexed entity.
        entity: &'a Entity,
        /// Index backing the field.
        index: &'a VectorIndex,
    },
    /// A `@cypher` field on the Query type.
    Cypher(&'a Attribute),
}

/// The schema model.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaModel {
    #[serde(serialize_with = "serialize_values")]
    entities: IndexMap<String, Entity>,
    #[serde(serialize_with = "serialize_values")]
    relationship_properties: IndexMap<String, RelationshipProperties>,
    #[serde(serialize_with = "serialize_values")]
    query_fields: IndexMap<String, Attribute>,
}

fn serialize_values<S, T>(map: &IndexMap<String, T>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: Serialize,
{
    serializer.collect_seq(map.values())
}

/// On-disk form of a schema model.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaDocument {
    entities: Vec<Entity>,
    #[serde(default)]
    relationship_properties: Vec<RelationshipProperties>,
    #[serde(default)]
    query_fields: Vec<Attribute>,
}

impl SchemaModel {
    /// Starts building a schema model.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Loads and validates a schema model from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: SchemaDocument = serde_json::from_str(json)?;
        let mut builder = Self::builder();
        for entity in document.entities {
            builder = builder.entity(entity);
        }
        for properties in document.relationship_properties {
            builder = builder.relationship_properties(properties);
        }
        for field in document.query_fields {
            builder = builder.query_field(field);
        }
        builder.build()
    }

    /// Looks up an entity by name.
    #[must_use]
    pub fn get_entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// Looks up an entity by name, failing if it does not exist.
    pub fn entity(&self, name: &str) -> Result<&Entity> {
        self.get_entity(name)
            .ok_or_else(|| SchemaError::EntityNotFound(name.to_string()).into())
    }

    /// Returns `true` if `entity` is a concrete entity.
    #[must_use]
    pub fn is_concrete_entity(&self, entity: &Entity) -> bool {
        matches!(entity, Entity::Concrete(_))
    }

    /// The concrete entities behind `entity`, in declaration order.
    #[must_use]
    pub fn concrete_entities<'a>(&'a self, entity: &'a Entity) -> Vec<&'a ConcreteEntity> {
        entity
            .concrete_names()
            .into_iter()
            .filter_map(|name| self.get_entity(name).and_then(Entity::as_concrete))
            .collect()
    }

    /// All entities in declaration order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Looks up a relationship-properties type.
    #[must_use]
    pub fn relationship_properties(&self, name: &str) -> Option<&RelationshipProperties> {
        self.relationship_properties.get(name)
    }

    /// Edge properties of `relationship`, if it declares any.
    #[must_use]
    pub fn edge_properties(&self, relationship: &Relationship) -> Option<&RelationshipProperties> {
        relationship
            .properties
            .as_deref()
            .and_then(|name| self.relationship_properties(name))
    }

    /// The entity a relationship points to.
    pub fn target_of(&self, relationship: &Relationship) -> Result<&Entity> {
        self.entity(&relationship.target)
    }

    /// `@cypher` fields declared on the Query type.
    pub fn query_fields(&self) -> impl Iterator<Item = &Attribute> {
        self.query_fields.values()
    }

    /// Resolves a root Query or Mutation field name.
    #[must_use]
    pub fn root_field(&self, name: &str) -> Option<RootField<'_>> {
        if let Some(attribute) = self.query_fields.get(name) {
            return Some(RootField::Cypher(attribute));
        }
        for entity in self.entities.values() {
            let names = entity.root_fields();
            let concrete = !entity.is_abstract();
            if name == names.read {
                return Some(RootField::Read(entity));
            }
            if name == names.connection {
                return Some(RootField::Connection(entity));
            }
            if name == names.aggregate && !matches!(entity, Entity::Union(_)) {
                return Some(RootField::Aggregate(entity));
            }
            if concrete && name == names.create {
                return Some(RootField::Create(entity));
            }
            if concrete && name == names.update {
                return Some(RootField::Update(entity));
            }
            if concrete && name == names.delete {
                return Some(RootField::Delete(entity));
            }
            let annotations = entity.annotations();
            if let Some(index) = annotations.fulltext.iter().find(|i| i.query_name == name) {
                return Some(RootField::Fulltext { entity, index });
            }
            if let Some(index) = annotations.vector.iter().find(|i| i.query_name == name) {
                return Some(RootField::Vector { entity, index });
            }
        }
        None
    }
}

/// Builds and validates a [`SchemaModel`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: Vec<Entity>,
    relationship_properties: Vec<RelationshipProperties>,
    query_fields: Vec<Attribute>,
}

impl SchemaBuilder {
    /// Adds an entity.
    #[must_use]
    pub fn entity(mut self, entity: impl Into<Entity>) -> Self {
        self.entities.push(entity.into());
        self
    }

    /// Adds a relationship-properties type.
    #[must_use]
    pub fn relationship_properties(mut self, properties: RelationshipProperties) -> Self {
        self.relationship_properties.push(properties);
        self
    }

    /// Adds a `@cypher` field on the Query type.
    #[must_use]
    pub fn query_field(mut self, field: Attribute) -> Self {
        self.query_fields.push(field);
        self
    }

    /// Validates references and produces the model.
    pub fn build(self) -> Result<SchemaModel> {
        let mut model = SchemaModel::default();

        for mut entity in self.entities {
            if let Entity::Concrete(concrete) = &mut entity
                && concrete.labels.is_empty()
            {
                concrete.labels.push(concrete.name.clone());
            }
            let name = entity.name().to_string();
            if model.entities.insert(name.clone(), entity).is_some() {
                return Err(invalid(format!("entity `{name}` is declared twice")));
            }
        }
        for properties in self.relationship_properties {
            let name = properties.name.clone();
            if model.relationship_properties.insert(name.clone(), properties).is_some() {
                return Err(invalid(format!(
                    "relationship properties `{name}` are declared twice"
                )));
            }
        }
        for field in self.query_fields {
            if field.annotations.cypher.is_none() {
                return Err(invalid(format!(
                    "query field `{}` has no @cypher statement",
                    field.name
                )));
            }
            model.query_fields.insert(field.name.clone(), field);
        }

        for entity in model.entities.values() {
            for member in entity.concrete_names() {
                match model.entities.get(member) {
                    Some(Entity::Concrete(_)) => {}
                    Some(_) => {
                        return Err(invalid(format!(
                            "`{member}` in `{}` is not a concrete entity",
                            entity.name()
                        )));
                    }
                    None => return Err(SchemaError::EntityNotFound(member.to_string()).into()),
                }
            }
            for relationship in entity.relationships() {
                if !model.entities.contains_key(&relationship.target) {
                    return Err(SchemaError::EntityNotFound(relationship.target.clone()).into());
                }
                if let Some(properties) = &relationship.properties
                    && !model.relationship_properties.contains_key(properties)
                {
                    return Err(invalid(format!(
                        "relationship `{}.{}` references unknown properties `{properties}`",
                        entity.name(),
                        relationship.name
                    )));
                }
            }
        }

        tracing::debug!(
            entities = model.entities.len(),
            relationship_properties = model.relationship_properties.len(),
            "schema model built"
        );
        Ok(model)
    }
}

fn invalid(message: String) -> cyphergen_common::Error {
    SchemaError::InvalidSchema(message).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movies() -> SchemaBuilder {
        SchemaModel::builder()
            .entity(
                ConcreteEntity::new("Movie")
                    .attribute(Attribute::new("title", AttributeType::string()))
                    .relationship(
                        Relationship::new("actors", "ACTED_IN", RelationshipDirection::In, "Actor")
                            .with_properties("ActedIn"),
                    ),
            )
            .entity(ConcreteEntity::new("Actor"))
            .relationship_properties(RelationshipProperties::new("ActedIn"))
    }

    #[test]
    fn test_build_and_lookup() {
        let schema = movies().build().unwrap();
        let movie = schema.entity("Movie").unwrap();
        assert_eq!(movie.as_concrete().unwrap().labels, vec!["Movie"]);
        assert!(schema.is_concrete_entity(movie));

        let actors = movie.find_relationship("actors").unwrap();
        assert_eq!(schema.edge_properties(actors).unwrap().name, "ActedIn");
        assert!(matches!(
            schema.entity("Nope"),
            Err(cyphergen_common::Error::Schema(SchemaError::EntityNotFound(_)))
        ));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let result = SchemaModel::builder()
            .entity(ConcreteEntity::new("Movie").relationship(Relationship::new(
                "director",
                "DIRECTED",
                RelationshipDirection::In,
                "Person",
            )))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_interface_members_must_be_concrete() {
        let result = movies()
            .entity(InterfaceEntity::new("Production", ["Movie", "Show"]))
            .build();
        assert!(matches!(
            result,
            Err(cyphergen_common::Error::Schema(SchemaError::EntityNotFound(ref n))) if n == "Show"
        ));
    }

    #[test]
    fn test_root_field_dispatch() {
        let schema = movies()
            .entity(InterfaceEntity::new("Production", ["Movie"]))
            .build()
            .unwrap();
        assert!(matches!(schema.root_field("movies"), Some(RootField::Read(_))));
        assert!(matches!(
            schema.root_field("moviesConnection"),
            Some(RootField::Connection(_))
        ));
        assert!(matches!(schema.root_field("createMovies"), Some(RootField::Create(_))));
        assert!(matches!(
            schema.root_field("productionsAggregate"),
            Some(RootField::Aggregate(_))
        ));
        assert!(schema.root_field("createProductions").is_none());
        assert!(schema.root_field("unknown").is_none());
    }

    #[test]
    fn test_from_json() {
        let schema = SchemaModel::from_json(
            r#"{
                "entities": [
                    {"kind": "concrete", "name": "Actor",
                     "attributes": [{"name": "name", "type": "String"}]},
                    {"kind": "union", "name": "Search", "members": ["Actor"]}
                ],
                "queryFields": [
                    {"name": "topActor", "type": "Actor",
                     "annotations": {"cypher": {"statement": "MATCH (a:Actor) RETURN a", "columnName": "a"}}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(schema.entities().count(), 2);
        assert!(matches!(schema.root_field("topActor"), Some(RootField::Cypher(_))));
        let search = schema.entity("Search").unwrap();
        assert_eq!(schema.concrete_entities(search).len(), 1);
    }
}
