//! Relationships between entities.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::attribute::Attribute;

/// Direction of the stored relationship relative to the declaring entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipDirection {
    /// `(source)-[:T]->(target)`
    Out,
    /// `(source)<-[:T]-(target)`
    In,
}

/// Whether queries follow the stored direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryDirection {
    /// Follow the stored direction.
    #[default]
    Directed,
    /// Match either direction.
    Undirected,
}

/// A traversable edge declared on an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// GraphQL field name.
    pub name: String,
    /// Relationship type in the database.
    #[serde(rename = "type")]
    pub rel_type: String,
    /// Stored direction.
    pub direction: RelationshipDirection,
    /// Target entity name; may be an interface or union.
    pub target: String,
    /// Name of the edge-properties type, if any.
    #[serde(default)]
    pub properties: Option<String>,
    /// `[Target]` rather than `Target`.
    #[serde(default = "default_list")]
    pub is_list: bool,
    /// Query direction.
    #[serde(default)]
    pub query_direction: QueryDirection,
}

fn default_list() -> bool {
    true
}

impl Relationship {
    /// Creates a directed list relationship.
    pub fn new(
        name: impl Into<String>,
        rel_type: impl Into<String>,
        direction: RelationshipDirection,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            rel_type: rel_type.into(),
            direction,
            target: target.into(),
            properties: None,
            is_list: true,
            query_direction: QueryDirection::Directed,
        }
    }

    /// Sets the edge-properties type.
    #[must_use]
    pub fn with_properties(mut self, properties: impl Into<String>) -> Self {
        self.properties = Some(properties.into());
        self
    }

    /// Makes the relationship 1:1.
    #[must_use]
    pub fn single(mut self) -> Self {
        self.is_list = false;
        self
    }

    /// Makes queries ignore direction.
    #[must_use]
    pub fn undirected(mut self) -> Self {
        self.query_direction = QueryDirection::Undirected;
        self
    }

    /// GraphQL name of the connection field: `actorsConnection`.
    #[must_use]
    pub fn connection_field_name(&self) -> String {
        format!("{}Connection", self.name)
    }

    /// GraphQL name of the aggregation field: `actorsAggregate`.
    #[must_use]
    pub fn aggregate_field_name(&self) -> String {
        format!("{}Aggregate", self.name)
    }
}

/// Attributes stored on a relationship (`@relationshipProperties`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipProperties {
    /// Type name.
    pub name: String,
    /// Edge attributes.
    #[serde(with = "super::named_map")]
    pub attributes: IndexMap<String, Attribute>,
}

impl RelationshipProperties {
    /// Creates an empty properties type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.insert(attribute.name.clone(), attribute);
        self
    }

    /// Looks up an attribute.
    #[must_use]
    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}
