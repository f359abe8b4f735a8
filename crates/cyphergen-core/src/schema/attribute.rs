//! Attributes and their types.

use std::fmt;
use std::str::FromStr;

use cyphergen_common::types::Value;
use cyphergen_common::utils::error::SchemaError;
use serde::{Deserialize, Serialize};

use super::annotations::{AuthorizationAnnotation, CypherAnnotation, IdAnnotation, TimestampAnnotation, TimestampOperation};

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// `ID`
    Id,
    /// `String`
    String,
    /// `Int`
    Int,
    /// `BigInt`
    BigInt,
    /// `Float`
    Float,
    /// `Boolean`
    Boolean,
    /// `DateTime`
    DateTime,
    /// `LocalDateTime`
    LocalDateTime,
    /// `Time`
    Time,
    /// `LocalTime`
    LocalTime,
    /// `Date`
    Date,
    /// `Duration`
    Duration,
    /// `Point`
    Point,
    /// `CartesianPoint`
    CartesianPoint,
}

impl ScalarType {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "ID" => ScalarType::Id,
            "String" => ScalarType::String,
            "Int" => ScalarType::Int,
            "BigInt" => ScalarType::BigInt,
            "Float" => ScalarType::Float,
            "Boolean" => ScalarType::Boolean,
            "DateTime" => ScalarType::DateTime,
            "LocalDateTime" => ScalarType::LocalDateTime,
            "Time" => ScalarType::Time,
            "LocalTime" => ScalarType::LocalTime,
            "Date" => ScalarType::Date,
            "Duration" => ScalarType::Duration,
            "Point" => ScalarType::Point,
            "CartesianPoint" => ScalarType::CartesianPoint,
            _ => return None,
        })
    }

    /// GraphQL name of the scalar.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Id => "ID",
            ScalarType::String => "String",
            ScalarType::Int => "Int",
            ScalarType::BigInt => "BigInt",
            ScalarType::Float => "Float",
            ScalarType::Boolean => "Boolean",
            ScalarType::DateTime => "DateTime",
            ScalarType::LocalDateTime => "LocalDateTime",
            ScalarType::Time => "Time",
            ScalarType::LocalTime => "LocalTime",
            ScalarType::Date => "Date",
            ScalarType::Duration => "Duration",
            ScalarType::Point => "Point",
            ScalarType::CartesianPoint => "CartesianPoint",
        }
    }

    /// Cypher constructor for temporal scalars: `datetime`, `date`, ...
    #[must_use]
    pub fn temporal_function(self) -> Option<&'static str> {
        match self {
            ScalarType::DateTime => Some("datetime"),
            ScalarType::LocalDateTime => Some("localdatetime"),
            ScalarType::Time => Some("time"),
            ScalarType::LocalTime => Some("localtime"),
            ScalarType::Date => Some("date"),
            ScalarType::Duration => Some("duration"),
            _ => None,
        }
    }
}

/// The type of an attribute, written in GraphQL notation (`[String!]!`).
///
/// Non-null markers are accepted and dropped; translation does not depend
/// on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AttributeType {
    /// A built-in scalar.
    Scalar(ScalarType),
    /// An enum, custom scalar, or entity, resolved by name.
    Named(String),
    /// A list of the inner type.
    List(Box<AttributeType>),
}

impl AttributeType {
    /// `String`
    #[must_use]
    pub fn string() -> Self {
        AttributeType::Scalar(ScalarType::String)
    }

    /// `[inner]`
    #[must_use]
    pub fn list_of(inner: AttributeType) -> Self {
        AttributeType::List(Box::new(inner))
    }

    /// Returns `true` for list types.
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, AttributeType::List(_))
    }

    /// The innermost non-list type.
    #[must_use]
    pub fn base(&self) -> &AttributeType {
        match self {
            AttributeType::List(inner) => inner.base(),
            other => other,
        }
    }

    /// The innermost scalar, if the base type is a built-in scalar.
    #[must_use]
    pub fn scalar(&self) -> Option<ScalarType> {
        match self.base() {
            AttributeType::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// The type name of the base type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self.base() {
            AttributeType::Scalar(s) => s.name(),
            AttributeType::Named(name) => name,
            AttributeType::List(_) => "",
        }
    }

    /// Returns `true` for temporal scalars and lists of them.
    #[must_use]
    pub fn is_temporal(&self) -> bool {
        self.scalar().and_then(ScalarType::temporal_function).is_some()
    }

    /// Returns `true` for `Point`/`CartesianPoint` and lists of them.
    #[must_use]
    pub fn is_point(&self) -> bool {
        matches!(
            self.scalar(),
            Some(ScalarType::Point | ScalarType::CartesianPoint)
        )
    }

    /// Returns `true` for `Int`, `BigInt` and `Float`.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.scalar(),
            Some(ScalarType::Int | ScalarType::BigInt | ScalarType::Float)
        )
    }

    /// Returns `true` for `String` and `ID`.
    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self.scalar(), Some(ScalarType::String | ScalarType::Id))
    }

    /// Returns `true` for `DateTime`.
    #[must_use]
    pub fn is_datetime(&self) -> bool {
        self.scalar() == Some(ScalarType::DateTime)
    }
}

impl FromStr for AttributeType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('!');
        if let Some(inner) = trimmed.strip_prefix('[') {
            let inner = inner.strip_suffix(']').ok_or_else(|| {
                SchemaError::InvalidSchema(format!("malformed list type `{s}`"))
            })?;
            return Ok(AttributeType::list_of(inner.parse()?));
        }
        if trimmed.is_empty() {
            return Err(SchemaError::InvalidSchema("empty type name".into()));
        }
        Ok(ScalarType::parse(trimmed)
            .map(AttributeType::Scalar)
            .unwrap_or_else(|| AttributeType::Named(trimmed.to_string())))
    }
}

impl TryFrom<String> for AttributeType {
    type Error = SchemaError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::Scalar(s) => f.write_str(s.name()),
            AttributeType::Named(name) => f.write_str(name),
            AttributeType::List(inner) => write!(f, "[{inner}]"),
        }
    }
}

impl From<AttributeType> for String {
    fn from(t: AttributeType) -> Self {
        t.to_string()
    }
}

/// Directives attached to an attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeAnnotations {
    /// `@id`
    pub id: Option<IdAnnotation>,
    /// `@unique`
    pub unique: bool,
    /// `@timestamp`
    pub timestamp: Option<TimestampAnnotation>,
    /// `@default(value)`
    pub default: Option<Value>,
    /// `@alias(property)`
    pub alias: Option<String>,
    /// `@cypher(statement, columnName)`
    pub cypher: Option<CypherAnnotation>,
    /// `@authorization`
    pub authorization: Option<AuthorizationAnnotation>,
}

/// A field of an entity or of relationship properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// GraphQL field name.
    pub name: String,
    /// Field type.
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    /// Directives.
    #[serde(default)]
    pub annotations: AttributeAnnotations,
}

impl Attribute {
    /// Creates an attribute without annotations.
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            annotations: AttributeAnnotations::default(),
        }
    }

    /// Parses the type from GraphQL notation.
    pub fn typed(name: impl Into<String>, type_name: &str) -> Result<Self, SchemaError> {
        Ok(Self::new(name, type_name.parse()?))
    }

    /// Marks the attribute `@id(autogenerate: true)`.
    #[must_use]
    pub fn autogenerated_id(mut self) -> Self {
        self.annotations.id = Some(IdAnnotation { autogenerate: true });
        self.annotations.unique = true;
        self
    }

    /// Adds `@timestamp` for the given operations.
    #[must_use]
    pub fn timestamp(mut self, operations: &[TimestampOperation]) -> Self {
        self.annotations.timestamp = Some(TimestampAnnotation {
            operations: operations.to_vec(),
        });
        self
    }

    /// Adds `@default(value)`.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.annotations.default = Some(value.into());
        self
    }

    /// Adds `@alias(property)`.
    #[must_use]
    pub fn alias(mut self, property: impl Into<String>) -> Self {
        self.annotations.alias = Some(property.into());
        self
    }

    /// Adds `@cypher(statement, columnName)`.
    #[must_use]
    pub fn cypher(mut self, statement: impl Into<String>, column_name: impl Into<String>) -> Self {
        self.annotations.cypher = Some(CypherAnnotation {
            statement: statement.into(),
            column_name: column_name.into(),
        });
        self
    }

    /// Adds `@authorization`.
    #[must_use]
    pub fn authorization(mut self, annotation: AuthorizationAnnotation) -> Self {
        self.annotations.authorization = Some(annotation);
        self
    }

    /// Property name in the database.
    #[must_use]
    pub fn database_name(&self) -> &str {
        self.annotations.alias.as_deref().unwrap_or(&self.name)
    }

    /// Returns `true` for `@cypher` fields.
    #[must_use]
    pub fn is_cypher(&self) -> bool {
        self.annotations.cypher.is_some()
    }

    /// Returns `true` if the value is generated on create.
    #[must_use]
    pub fn is_autogenerated(&self) -> bool {
        self.annotations.id.as_ref().is_some_and(|id| id.autogenerate)
    }

    /// Returns `true` if `@timestamp` applies to `operation`.
    #[must_use]
    pub fn has_timestamp(&self, operation: TimestampOperation) -> bool {
        self.annotations
            .timestamp
            .as_ref()
            .is_some_and(|t| t.operations.contains(&operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_types() {
        let t: AttributeType = "[String!]!".parse().unwrap();
        assert!(t.is_list());
        assert!(t.is_string());
        assert_eq!(t.to_string(), "[String]");

        let t: AttributeType = "DateTime".parse().unwrap();
        assert!(t.is_temporal());
        assert!(t.is_datetime());
        assert_eq!(t.scalar().and_then(ScalarType::temporal_function), Some("datetime"));

        let t: AttributeType = "Movie".parse().unwrap();
        assert_eq!(t, AttributeType::Named("Movie".into()));

        assert!("[Int".parse::<AttributeType>().is_err());
    }

    #[test]
    fn test_deserialize_attribute() {
        let attr: Attribute = serde_json::from_str(
            r#"{"name": "released", "type": "Int", "annotations": {"alias": "year"}}"#,
        )
        .unwrap();
        assert!(attr.attribute_type.is_numeric());
        assert_eq!(attr.database_name(), "year");
    }

    #[test]
    fn test_timestamps() {
        let attr = Attribute::new("createdAt", AttributeType::Scalar(ScalarType::DateTime))
            .timestamp(&[TimestampOperation::Create]);
        assert!(attr.has_timestamp(TimestampOperation::Create));
        assert!(!attr.has_timestamp(TimestampOperation::Update));
    }
}
