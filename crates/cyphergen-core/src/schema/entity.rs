//! Entities: concrete node types, interfaces and unions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use cyphergen_common::utils::strings::{default_plural, upper_first};

use super::annotations::EntityAnnotations;
use super::attribute::Attribute;
use super::relationship::Relationship;

/// A node type with labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcreteEntity {
    /// Type name.
    pub name: String,
    /// Labels; defaults to the type name.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Plural used for root fields; defaults to `movies` for `Movie`.
    #[serde(default)]
    pub plural: Option<String>,
    /// Attributes by name.
    #[serde(default, with = "super::named_map")]
    pub attributes: IndexMap<String, Attribute>,
    /// Relationships by name.
    #[serde(default, with = "super::named_map")]
    pub relationships: IndexMap<String, Relationship>,
    /// Directives.
    #[serde(default)]
    pub annotations: EntityAnnotations,
}

/// An abstract type implemented by concrete entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceEntity {
    /// Type name.
    pub name: String,
    /// Plural used for root fields.
    #[serde(default)]
    pub plural: Option<String>,
    /// Names of the implementing concrete entities.
    pub implementations: Vec<String>,
    /// Shared attributes by name.
    #[serde(default, with = "super::named_map")]
    pub attributes: IndexMap<String, Attribute>,
    /// Shared relationships by name.
    #[serde(default, with = "super::named_map")]
    pub relationships: IndexMap<String, Relationship>,
    /// Directives.
    #[serde(default)]
    pub annotations: EntityAnnotations,
}

/// A union of concrete entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnionEntity {
    /// Type name.
    pub name: String,
    /// Plural used for root fields.
    #[serde(default)]
    pub plural: Option<String>,
    /// Names of the member concrete entities.
    pub members: Vec<String>,
}

/// Any entity in the schema model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Entity {
    /// A labelled node type.
    Concrete(ConcreteEntity),
    /// An interface.
    Interface(InterfaceEntity),
    /// A union.
    Union(UnionEntity),
}

fn empty_annotations() -> &'static EntityAnnotations {
    static EMPTY: std::sync::OnceLock<EntityAnnotations> = std::sync::OnceLock::new();
    EMPTY.get_or_init(EntityAnnotations::default)
}

impl ConcreteEntity {
    /// Creates an entity labelled with its own name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            labels: vec![name.clone()],
            name,
            plural: None,
            attributes: IndexMap::new(),
            relationships: IndexMap::new(),
            annotations: EntityAnnotations::default(),
        }
    }

    /// Replaces the labels.
    #[must_use]
    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the plural.
    #[must_use]
    pub fn plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = Some(plural.into());
        self
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.insert(attribute.name.clone(), attribute);
        self
    }

    /// Adds a relationship.
    #[must_use]
    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships
            .insert(relationship.name.clone(), relationship);
        self
    }

    /// Sets the directives.
    #[must_use]
    pub fn annotations(mut self, annotations: EntityAnnotations) -> Self {
        self.annotations = annotations;
        self
    }
}

impl InterfaceEntity {
    /// Creates an interface with the given implementations.
    pub fn new<I, S>(name: impl Into<String>, implementations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            plural: None,
            implementations: implementations.into_iter().map(Into::into).collect(),
            attributes: IndexMap::new(),
            relationships: IndexMap::new(),
            annotations: EntityAnnotations::default(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.insert(attribute.name.clone(), attribute);
        self
    }

    /// Adds a relationship.
    #[must_use]
    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships
            .insert(relationship.name.clone(), relationship);
        self
    }
}

impl UnionEntity {
    /// Creates a union with the given members.
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            plural: None,
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

impl Entity {
    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Entity::Concrete(e) => &e.name,
            Entity::Interface(e) => &e.name,
            Entity::Union(e) => &e.name,
        }
    }

    /// Plural used to derive root field names.
    #[must_use]
    pub fn plural(&self) -> String {
        let explicit = match self {
            Entity::Concrete(e) => e.plural.as_ref(),
            Entity::Interface(e) => e.plural.as_ref(),
            Entity::Union(e) => e.plural.as_ref(),
        };
        explicit
            .cloned()
            .unwrap_or_else(|| default_plural(self.name()))
    }

    /// Root field names for this entity.
    #[must_use]
    pub fn root_fields(&self) -> RootFieldNames {
        let plural = self.plural();
        let upper = upper_first(&plural);
        RootFieldNames {
            connection: format!("{plural}Connection"),
            aggregate: format!("{plural}Aggregate"),
            create: format!("create{upper}"),
            update: format!("update{upper}"),
            delete: format!("delete{upper}"),
            read: plural,
        }
    }

    /// Returns the concrete entity, if this is one.
    #[must_use]
    pub fn as_concrete(&self) -> Option<&ConcreteEntity> {
        match self {
            Entity::Concrete(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` for interfaces and unions.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        !matches!(self, Entity::Concrete(_))
    }

    /// Looks up an attribute. Unions have none.
    #[must_use]
    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        match self {
            Entity::Concrete(e) => e.attributes.get(name),
            Entity::Interface(e) => e.attributes.get(name),
            Entity::Union(_) => None,
        }
    }

    /// Looks up a relationship. Unions have none.
    #[must_use]
    pub fn find_relationship(&self, name: &str) -> Option<&Relationship> {
        match self {
            Entity::Concrete(e) => e.relationships.get(name),
            Entity::Interface(e) => e.relationships.get(name),
            Entity::Union(_) => None,
        }
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        let map = match self {
            Entity::Concrete(e) => Some(&e.attributes),
            Entity::Interface(e) => Some(&e.attributes),
            Entity::Union(_) => None,
        };
        map.into_iter().flat_map(|m| m.values())
    }

    /// Relationships in declaration order.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        let map = match self {
            Entity::Concrete(e) => Some(&e.relationships),
            Entity::Interface(e) => Some(&e.relationships),
            Entity::Union(_) => None,
        };
        map.into_iter().flat_map(|m| m.values())
    }

    /// Directives. Unions carry none.
    #[must_use]
    pub fn annotations(&self) -> &EntityAnnotations {
        match self {
            Entity::Concrete(e) => &e.annotations,
            Entity::Interface(e) => &e.annotations,
            Entity::Union(_) => empty_annotations(),
        }
    }

    /// Names of the concrete entities behind this one, in declaration order.
    #[must_use]
    pub fn concrete_names(&self) -> Vec<&str> {
        match self {
            Entity::Concrete(e) => vec![e.name.as_str()],
            Entity::Interface(e) => e.implementations.iter().map(String::as_str).collect(),
            Entity::Union(e) => e.members.iter().map(String::as_str).collect(),
        }
    }
}

impl From<ConcreteEntity> for Entity {
    fn from(e: ConcreteEntity) -> Self {
        Entity::Concrete(e)
    }
}

impl From<InterfaceEntity> for Entity {
    fn from(e: InterfaceEntity) -> Self {
        Entity::Interface(e)
    }
}

impl From<UnionEntity> for Entity {
    fn from(e: UnionEntity) -> Self {
        Entity::Union(e)
    }
}

/// Root query and mutation field names of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootFieldNames {
    /// `movies`
    pub read: String,
    /// `moviesConnection`
    pub connection: String,
    /// `moviesAggregate`
    pub aggregate: String,
    /// `createMovies`
    pub create: String,
    /// `updateMovies`
    pub update: String,
    /// `deleteMovies`
    pub delete: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::attribute::AttributeType;

    #[test]
    fn test_root_fields() {
        let movie: Entity = ConcreteEntity::new("Movie").into();
        let names = movie.root_fields();
        assert_eq!(names.read, "movies");
        assert_eq!(names.connection, "moviesConnection");
        assert_eq!(names.create, "createMovies");

        let person: Entity = ConcreteEntity::new("Person").plural("people").into();
        assert_eq!(person.root_fields().delete, "deletePeople");
    }

    #[test]
    fn test_deserialize_entity() {
        let entity: Entity = serde_json::from_str(
            r#"{
                "kind": "concrete",
                "name": "Movie",
                "labels": ["Movie", "Film"],
                "attributes": [{"name": "title", "type": "String"}],
                "relationships": [
                    {"name": "actors", "type": "ACTED_IN", "direction": "IN", "target": "Actor"}
                ]
            }"#,
        )
        .unwrap();
        let concrete = entity.as_concrete().unwrap();
        assert_eq!(concrete.labels, vec!["Movie", "Film"]);
        assert_eq!(
            entity.find_attribute("title").unwrap().attribute_type,
            AttributeType::string()
        );
        assert!(entity.find_relationship("actors").unwrap().is_list);
    }

    #[test]
    fn test_union_has_no_fields() {
        let search: Entity = UnionEntity::new("Search", ["Movie", "Actor"]).into();
        assert!(search.find_attribute("title").is_none());
        assert_eq!(search.attributes().count(), 0);
        assert_eq!(search.concrete_names(), vec!["Movie", "Actor"]);
        assert!(search.is_abstract());
    }
}
