//! `where` arguments to filter nodes.
//!
//! Keys follow the `<field>[_<OPERATOR>]` grammar: `title_CONTAINS`,
//! `actors_SOME`, `actorsConnection_NONE`, `actorsAggregate`. Exact field
//! names win over a parsed suffix, so a field called `name_IN` still
//! resolves to itself.

use std::sync::LazyLock;

use cyphergen_adapters::cypher::BinaryOp;
use cyphergen_common::types::Value;
use cyphergen_common::utils::error::{InputError, Result, SchemaError};
use cyphergen_core::schema::{Attribute, Entity, Relationship, RelationshipProperties};
use indexmap::IndexMap;
use regex::Regex;

use super::{FactoryScope, KeyPattern, as_concrete, compiled, concrete_labels};
use crate::query_ast::PropertyTarget;
use crate::query_ast::filters::{
    AggregationFilter, AggregationFunction, AggregationLeaf, AggregationPredicate,
    AggregationSubject, ConnectionFilter, CypherFilter, Filter, FilterOperator, FilterValue,
    LogicalFilter, LogicalOperator, PropertyFilter, RelationshipFilter, RelationshipQuantifier,
    TypenameFilter, supports_length,
};

static FILTER_KEY: KeyPattern = LazyLock::new(|| {
    Regex::new(
        r"^(?P<field>[_A-Za-z][_0-9A-Za-z]*?)(?:_(?P<operator>NOT_IN|NOT_CONTAINS|NOT_STARTS_WITH|NOT_ENDS_WITH|NOT_INCLUDES|STARTS_WITH|ENDS_WITH|CONTAINS|INCLUDES|DISTANCE|MATCHES|NOT|IN|LTE|LT|GTE|GT|EQ|SOME|ALL|NONE|SINGLE))?$",
    )
});

static AGGREGATION_KEY: KeyPattern = LazyLock::new(|| {
    Regex::new(
        r"^(?P<field>[_A-Za-z][_0-9A-Za-z]*?)_(?:(?P<function>SHORTEST_LENGTH|LONGEST_LENGTH|AVERAGE_LENGTH|SHORTEST|LONGEST|AVERAGE|MIN|MAX|SUM)_)?(?P<operator>EQUAL|EQ|GTE|GT|LTE|LT)$",
    )
});

/// Splits `title_CONTAINS` into `("title", Some("CONTAINS"))`.
pub(crate) fn split_key(key: &str) -> Result<(&str, Option<&str>)> {
    let captures = compiled(&FILTER_KEY)?.captures(key);
    Ok(match captures {
        Some(captures) => (
            captures.name("field").map_or(key, |m| m.as_str()),
            captures.name("operator").map(|m| m.as_str()),
        ),
        None => (key, None),
    })
}

fn aggregation_operator(suffix: &str) -> Option<BinaryOp> {
    Some(match suffix {
        "EQUAL" | "EQ" => BinaryOp::Eq,
        "GT" => BinaryOp::Gt,
        "GTE" => BinaryOp::Gte,
        "LT" => BinaryOp::Lt,
        "LTE" => BinaryOp::Lte,
        _ => return None,
    })
}

pub(crate) fn as_where<'v>(field: &str, value: &'v Value) -> Result<&'v IndexMap<String, Value>> {
    value
        .as_map()
        .ok_or_else(|| InputError::invalid_where(field, format!("expected an object, got {}", value.type_name())).into())
}

/// AND over `filters`; an empty AND when there are none, which contributes
/// no predicate.
pub(crate) fn conjunction(filters: Vec<Filter<'_>>) -> Filter<'_> {
    Filter::and(filters).unwrap_or_else(|| Filter::Logical(LogicalFilter::new(LogicalOperator::And, Vec::new())))
}

fn logical_operator(key: &str) -> Option<LogicalOperator> {
    match key {
        "AND" => Some(LogicalOperator::And),
        "OR" => Some(LogicalOperator::Or),
        "NOT" => Some(LogicalOperator::Not),
        _ => None,
    }
}

/// Where attributes of a filter level come from.
#[derive(Debug, Clone, Copy)]
enum AttributeSource<'a> {
    Node(&'a Entity),
    Edge(&'a RelationshipProperties),
}

impl<'a> AttributeSource<'a> {
    fn name(&self) -> &'a str {
        match *self {
            AttributeSource::Node(entity) => entity.name(),
            AttributeSource::Edge(properties) => &properties.name,
        }
    }

    fn find(&self, name: &str) -> Option<&'a Attribute> {
        match *self {
            AttributeSource::Node(entity) => entity.find_attribute(name),
            AttributeSource::Edge(properties) => properties.find_attribute(name),
        }
    }

    fn target(&self) -> PropertyTarget {
        match self {
            AttributeSource::Node(_) => PropertyTarget::Node,
            AttributeSource::Edge(_) => PropertyTarget::Edge,
        }
    }

    fn not_found(&self, field: &str) -> SchemaError {
        SchemaError::FieldNotFound {
            entity: self.name().to_string(),
            field: field.to_string(),
        }
    }
}

/// Turns `where` arguments into filters.
#[derive(Debug, Clone, Copy)]
pub struct FilterFactory<'a> {
    scope: FactoryScope<'a>,
    rule_values: bool,
}

impl<'a> FilterFactory<'a> {
    /// Creates a factory for client `where` arguments.
    #[must_use]
    pub fn new(scope: FactoryScope<'a>) -> Self {
        Self {
            scope,
            rule_values: false,
        }
    }

    /// Creates a factory for `@authorization` rules, where `"$jwt.<path>"`
    /// strings refer to claims.
    #[must_use]
    pub(crate) fn for_rules(scope: FactoryScope<'a>) -> Self {
        Self {
            scope,
            rule_values: true,
        }
    }

    fn value(&self, value: &Value) -> FilterValue {
        if self.rule_values {
            FilterValue::from_rule_value(value.clone())
        } else {
            FilterValue::Value(value.clone())
        }
    }

    /// Filters of a node `where`. `None` and `null` yield no filters.
    pub fn create_node_filters(&self, entity: &'a Entity, where_: Option<&Value>) -> Result<Vec<Filter<'a>>> {
        let Some(where_) = where_.filter(|v| !v.is_null()) else {
            return Ok(Vec::new());
        };
        let map = as_where("where", where_)?;
        if let Entity::Union(_) = entity {
            return Ok(self.union_filters(entity, map)?.into_iter().collect());
        }

        let mut filters = Vec::new();
        for (key, value) in map {
            if let Some(operator) = logical_operator(key) {
                filters.push(self.logical(key, operator, value, &|v| self.create_node_filters(entity, Some(v)))?);
            } else if key == "typename_IN" && matches!(entity, Entity::Interface(_)) {
                filters.push(self.typename_filter(entity, value)?);
            } else {
                filters.push(self.node_key_filter(entity, key, value)?);
            }
        }
        Ok(filters)
    }

    /// `{ Movie: {...}, Series: {...} }` on a union: nodes of a listed
    /// member that match its filters.
    fn union_filters(&self, entity: &'a Entity, map: &IndexMap<String, Value>) -> Result<Option<Filter<'a>>> {
        let members = entity.concrete_names();
        let mut branches = Vec::new();
        for (key, value) in map {
            if !members.contains(&key.as_str()) {
                return Err(SchemaError::FieldNotFound {
                    entity: entity.name().to_string(),
                    field: key.clone(),
                }
                .into());
            }
            let member = self.scope.schema.entity(key)?;
            let mut filters = vec![Filter::Typename(TypenameFilter {
                accepted: vec![concrete_labels(as_concrete(member)?)],
            })];
            filters.extend(self.create_node_filters(member, Some(value))?);
            branches.push(conjunction(filters));
        }
        Ok(match branches.len() {
            0 => None,
            _ => Some(Filter::Logical(LogicalFilter::new(LogicalOperator::Or, branches))),
        })
    }

    fn typename_filter(&self, entity: &'a Entity, value: &Value) -> Result<Filter<'a>> {
        let names = value
            .as_list()
            .ok_or_else(|| InputError::invalid_where("typename_IN", "expected a list of type names"))?;
        let implementations = entity.concrete_names();
        let mut accepted = Vec::with_capacity(names.len());
        for name in names {
            let name = name
                .as_str()
                .ok_or_else(|| InputError::invalid_where("typename_IN", "expected a list of type names"))?;
            if !implementations.contains(&name) {
                return Err(InputError::invalid_where(
                    "typename_IN",
                    format!("`{name}` does not implement `{}`", entity.name()),
                )
                .into());
            }
            accepted.push(concrete_labels(as_concrete(self.scope.schema.entity(name)?)?));
        }
        Ok(Filter::Typename(TypenameFilter { accepted }))
    }

    /// `AND: [...]`, `OR: [...]` or `NOT: {...}`, each level parsed by `parse`.
    fn logical(
        &self,
        key: &str,
        operator: LogicalOperator,
        value: &Value,
        parse: &dyn Fn(&Value) -> Result<Vec<Filter<'a>>>,
    ) -> Result<Filter<'a>> {
        if operator == LogicalOperator::Not {
            as_where(key, value)?;
            return Ok(Filter::Logical(LogicalFilter::new(operator, vec![conjunction(parse(value)?)])));
        }
        let mut children = Vec::new();
        for item in value.items() {
            as_where(key, item)?;
            children.push(conjunction(parse(item)?));
        }
        Ok(Filter::Logical(LogicalFilter::new(operator, children)))
    }

    fn node_key_filter(&self, entity: &'a Entity, key: &str, value: &Value) -> Result<Filter<'a>> {
        let source = AttributeSource::Node(entity);
        if let Some(attribute) = entity.find_attribute(key) {
            return self.attribute_filter(source, attribute, key, None, value);
        }
        if let Some(relationship) = entity.find_relationship(key) {
            return self.relationship_filter(relationship, key, None, value);
        }
        if let Some(relationship) = key
            .strip_suffix("Aggregate")
            .and_then(|name| entity.find_relationship(name))
        {
            return self.aggregation_filter(relationship, key, value);
        }

        let (field, operator) = split_key(key)?;
        if let Some(relationship) = field
            .strip_suffix("Connection")
            .and_then(|name| entity.find_relationship(name))
        {
            return self.connection_filter(relationship, key, operator, value);
        }
        if let Some(attribute) = entity.find_attribute(field) {
            return self.attribute_filter(source, attribute, key, operator, value);
        }
        if let Some(relationship) = entity.find_relationship(field) {
            return self.relationship_filter(relationship, key, operator, value);
        }
        Err(source.not_found(key).into())
    }

    fn attribute_filter(
        &self,
        source: AttributeSource<'a>,
        attribute: &'a Attribute,
        key: &str,
        suffix: Option<&str>,
        value: &Value,
    ) -> Result<Filter<'a>> {
        let unknown = || InputError::UnknownOperator {
            field: attribute.name.clone(),
            operator: suffix.unwrap_or_default().to_string(),
        };
        let operator = match suffix {
            None => FilterOperator::Eq,
            Some(suffix) => FilterOperator::from_suffix(suffix).ok_or_else(unknown)?,
        };
        let attribute_type = &attribute.attribute_type;
        let applies = match operator {
            op if op.is_string_operator() => attribute_type.is_string() && !attribute_type.is_list(),
            FilterOperator::Includes | FilterOperator::NotIncludes => attribute_type.is_list(),
            FilterOperator::Distance => attribute_type.is_point(),
            _ => true,
        };
        if !applies {
            return Err(unknown().into());
        }

        let value = self.value(value);
        if matches!(operator, FilterOperator::In | FilterOperator::NotIn)
            && let FilterValue::Value(v) = &value
            && !v.is_null()
            && v.as_list().is_none()
        {
            return Err(InputError::invalid_where(key, "expected a list").into());
        }

        if let Some(annotation) = attribute.annotations.cypher.as_ref() {
            if source.target() == PropertyTarget::Edge {
                return Err(InputError::invalid_where(key, "cannot filter on a @cypher edge property").into());
            }
            return Ok(Filter::Cypher(CypherFilter::new(attribute, annotation, operator, value)));
        }
        Ok(Filter::Property(PropertyFilter {
            attribute,
            operator,
            value,
            target: source.target(),
        }))
    }

    fn quantifier(relationship: &Relationship, suffix: Option<&str>) -> Result<RelationshipQuantifier> {
        match suffix {
            None => Ok(RelationshipQuantifier::Some),
            Some(suffix) => RelationshipQuantifier::from_suffix(suffix).ok_or_else(|| {
                InputError::UnknownOperator {
                    field: relationship.name.clone(),
                    operator: suffix.to_string(),
                }
                .into()
            }),
        }
    }

    /// `actors_SOME: { name: "Keanu" }`
    fn relationship_filter(
        &self,
        relationship: &'a Relationship,
        key: &str,
        suffix: Option<&str>,
        value: &Value,
    ) -> Result<Filter<'a>> {
        let quantifier = Self::quantifier(relationship, suffix)?;
        let target = self.scope.schema.target_of(relationship)?;
        let labels = self.scope.labels_of(target);
        if value.is_null() {
            return Ok(Filter::Relationship(RelationshipFilter::null(relationship, labels, quantifier)));
        }
        as_where(key, value)?;
        let inner = conjunction(self.create_node_filters(target, Some(value))?);
        Ok(Filter::Relationship(RelationshipFilter::new(relationship, labels, quantifier, inner)))
    }

    /// `actorsConnection_SOME: { node: {...}, edge: {...} }`
    fn connection_filter(
        &self,
        relationship: &'a Relationship,
        key: &str,
        suffix: Option<&str>,
        value: &Value,
    ) -> Result<Filter<'a>> {
        let quantifier = Self::quantifier(relationship, suffix)?;
        let target = self.scope.schema.target_of(relationship)?;
        let labels = self.scope.labels_of(target);
        if value.is_null() {
            return Ok(Filter::Connection(ConnectionFilter::null(relationship, labels, quantifier)));
        }
        as_where(key, value)?;
        let inner = conjunction(self.create_connection_filters(relationship, Some(value))?);
        Ok(Filter::Connection(ConnectionFilter::new(relationship, labels, quantifier, inner)))
    }

    /// Filters of a connection `where`: `{ node, edge, node_NOT, edge_NOT,
    /// AND, OR, NOT }`. Edge filters apply to the traversed relationship.
    pub fn create_connection_filters(
        &self,
        relationship: &'a Relationship,
        where_: Option<&Value>,
    ) -> Result<Vec<Filter<'a>>> {
        let Some(where_) = where_.filter(|v| !v.is_null()) else {
            return Ok(Vec::new());
        };
        let map = as_where(&relationship.connection_field_name(), where_)?;
        let target = self.scope.schema.target_of(relationship)?;

        let mut filters = Vec::new();
        for (key, value) in map {
            if let Some(operator) = logical_operator(key) {
                filters.push(self.logical(key, operator, value, &|v| {
                    self.create_connection_filters(relationship, Some(v))
                })?);
                continue;
            }
            let (side, negated) = match key.strip_suffix("_NOT") {
                Some(side) => (side, true),
                None => (key.as_str(), false),
            };
            let level = match side {
                "node" => self.create_node_filters(target, Some(value))?,
                "edge" => {
                    let properties = self.edge_properties(relationship, key)?;
                    self.create_edge_filters(properties, Some(value))?
                }
                _ => {
                    return Err(SchemaError::FieldNotFound {
                        entity: relationship.connection_field_name(),
                        field: key.clone(),
                    }
                    .into());
                }
            };
            let level = conjunction(level);
            filters.push(if negated {
                Filter::Logical(LogicalFilter::new(LogicalOperator::Not, vec![level]))
            } else {
                level
            });
        }
        Ok(filters)
    }

    fn edge_properties(&self, relationship: &Relationship, key: &str) -> Result<&'a RelationshipProperties> {
        self.scope.schema.edge_properties(relationship).ok_or_else(|| {
            SchemaError::FieldNotFound {
                entity: relationship.connection_field_name(),
                field: key.to_string(),
            }
            .into()
        })
    }

    /// Filters on relationship properties.
    pub fn create_edge_filters(
        &self,
        properties: &'a RelationshipProperties,
        where_: Option<&Value>,
    ) -> Result<Vec<Filter<'a>>> {
        let Some(where_) = where_.filter(|v| !v.is_null()) else {
            return Ok(Vec::new());
        };
        let source = AttributeSource::Edge(properties);
        let mut filters = Vec::new();
        for (key, value) in as_where("edge", where_)? {
            if let Some(operator) = logical_operator(key) {
                filters.push(self.logical(key, operator, value, &|v| self.create_edge_filters(properties, Some(v)))?);
                continue;
            }
            let (attribute, suffix) = match properties.find_attribute(key) {
                Some(attribute) => (attribute, None),
                None => {
                    let (field, suffix) = split_key(key)?;
                    let attribute = source.find(field).ok_or_else(|| source.not_found(key))?;
                    (attribute, suffix)
                }
            };
            filters.push(self.attribute_filter(source, attribute, key, suffix, value)?);
        }
        Ok(filters)
    }

    /// `actorsAggregate: { count_GT: 1, node: { name_SHORTEST_LENGTH_LT: 4 } }`
    fn aggregation_filter(&self, relationship: &'a Relationship, key: &str, value: &Value) -> Result<Filter<'a>> {
        let target = self.scope.schema.target_of(relationship)?;
        let predicate = self.aggregation_predicate(relationship, target, key, value)?;
        Ok(Filter::Aggregation(AggregationFilter {
            relationship,
            target_labels: self.scope.labels_of(target),
            predicate,
        }))
    }

    fn aggregation_predicate(
        &self,
        relationship: &'a Relationship,
        target: &'a Entity,
        field: &str,
        value: &Value,
    ) -> Result<AggregationPredicate<'a>> {
        let mut children = Vec::new();
        for (key, value) in as_where(field, value)? {
            match key.as_str() {
                "node" => children.push(self.aggregation_leaves(AttributeSource::Node(target), key, value)?),
                "edge" => {
                    let properties = self.edge_properties(relationship, key)?;
                    children.push(self.aggregation_leaves(AttributeSource::Edge(properties), key, value)?);
                }
                _ => {
                    if let Some(operator) = logical_operator(key) {
                        let parts = value
                            .items()
                            .map(|item| self.aggregation_predicate(relationship, target, key, item))
                            .collect::<Result<Vec<_>>>()?;
                        children.push(AggregationPredicate::Logical(operator, parts));
                    } else {
                        children.push(AggregationPredicate::Leaf(Self::count_leaf(key, value)?));
                    }
                }
            }
        }
        Ok(AggregationPredicate::Logical(LogicalOperator::And, children))
    }

    fn count_leaf(key: &str, value: &Value) -> Result<AggregationLeaf<'a>> {
        let operator = match key.strip_prefix("count") {
            Some("") => Some(BinaryOp::Eq),
            Some(suffix) => suffix.strip_prefix('_').and_then(aggregation_operator),
            None => None,
        };
        let operator = operator.ok_or_else(|| InputError::invalid_where(key, "unknown aggregation filter"))?;
        if value.as_i64().is_none() {
            return Err(InputError::invalid_where(key, "expected an integer").into());
        }
        Ok(AggregationLeaf::new(AggregationSubject::Count, operator, value.clone()))
    }

    /// Leaves under `node` or `edge` of an aggregation filter.
    fn aggregation_leaves(&self, source: AttributeSource<'a>, field: &str, value: &Value) -> Result<AggregationPredicate<'a>> {
        let pattern = compiled(&AGGREGATION_KEY)?;
        let mut children = Vec::new();
        for (key, value) in as_where(field, value)? {
            if let Some(operator) = logical_operator(key) {
                let parts = value
                    .items()
                    .map(|item| self.aggregation_leaves(source, key, item))
                    .collect::<Result<Vec<_>>>()?;
                children.push(AggregationPredicate::Logical(operator, parts));
                continue;
            }
            let captures = pattern
                .captures(key)
                .ok_or_else(|| InputError::invalid_where(key, "unknown aggregation filter"))?;
            let name = captures.name("field").map_or(key.as_str(), |m| m.as_str());
            let attribute = source.find(name).ok_or_else(|| source.not_found(name))?;
            let operator = captures
                .name("operator")
                .and_then(|m| aggregation_operator(m.as_str()))
                .ok_or_else(|| InputError::invalid_where(key, "unknown aggregation operator"))?;
            let function = Self::aggregation_function(attribute, key, captures.name("function").map(|m| m.as_str()))?;
            children.push(AggregationPredicate::Leaf(AggregationLeaf::new(
                AggregationSubject::Attribute {
                    attribute,
                    target: source.target(),
                    function,
                },
                operator,
                value.clone(),
            )));
        }
        Ok(AggregationPredicate::Logical(LogicalOperator::And, children))
    }

    fn aggregation_function(attribute: &Attribute, key: &str, name: Option<&str>) -> Result<AggregationFunction> {
        let attribute_type = &attribute.attribute_type;
        let function = match name {
            None => AggregationFunction::Any,
            Some("SHORTEST_LENGTH" | "SHORTEST") => AggregationFunction::ShortestLength,
            Some("LONGEST_LENGTH" | "LONGEST") => AggregationFunction::LongestLength,
            Some("AVERAGE_LENGTH") => AggregationFunction::AverageLength,
            Some("AVERAGE") if attribute_type.is_string() => AggregationFunction::AverageLength,
            Some("AVERAGE") => AggregationFunction::Average,
            Some("MIN") => AggregationFunction::Min,
            Some("MAX") => AggregationFunction::Max,
            Some("SUM") => AggregationFunction::Sum,
            Some(other) => {
                return Err(InputError::invalid_where(key, format!("unknown aggregation `{other}`")).into());
            }
        };
        let applies = match function {
            AggregationFunction::ShortestLength
            | AggregationFunction::LongestLength
            | AggregationFunction::AverageLength => supports_length(attribute_type),
            AggregationFunction::Sum | AggregationFunction::Average => attribute_type.is_numeric(),
            AggregationFunction::Min | AggregationFunction::Max => {
                attribute_type.is_numeric() || attribute_type.is_temporal()
            }
            AggregationFunction::Any => true,
        };
        if !applies {
            return Err(InputError::invalid_where(
                key,
                format!("cannot aggregate `{}` of type {}", attribute.name, attribute_type.type_name()),
            )
            .into());
        }
        Ok(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TranslationContext;
    use cyphergen_common::utils::error::Error;
    use cyphergen_core::schema::{
        AttributeType, ConcreteEntity, InterfaceEntity, RelationshipDirection, ScalarType, SchemaModel,
        UnionEntity,
    };
    use serde_json::json;

    fn schema() -> SchemaModel {
        SchemaModel::builder()
            .entity(
                ConcreteEntity::new("Movie")
                    .attribute(Attribute::new("title", AttributeType::string()))
                    .attribute(Attribute::new("released", AttributeType::Scalar(ScalarType::Int)))
                    .attribute(
                        Attribute::new("score", AttributeType::Scalar(ScalarType::Float))
                            .cypher("RETURN 1.0 AS s", "s"),
                    )
                    .relationship(
                        Relationship::new("actors", "ACTED_IN", RelationshipDirection::In, "Actor")
                            .with_properties("ActedIn"),
                    ),
            )
            .entity(
                ConcreteEntity::new("Series")
                    .attribute(Attribute::new("title", AttributeType::string()))
                    .attribute(Attribute::new("released", AttributeType::Scalar(ScalarType::Int))),
            )
            .entity(ConcreteEntity::new("Actor").attribute(Attribute::new("name", AttributeType::string())))
            .entity(
                InterfaceEntity::new("Production", ["Movie", "Series"])
                    .attribute(Attribute::new("title", AttributeType::string())),
            )
            .entity(UnionEntity::new("Search", ["Movie", "Actor"]))
            .relationship_properties(
                RelationshipProperties::new("ActedIn")
                    .attribute(Attribute::new("role", AttributeType::string())),
            )
            .build()
            .unwrap()
    }

    fn filters<'a>(schema: &'a SchemaModel, context: &'a TranslationContext, entity: &str, where_: serde_json::Value) -> Result<Vec<Filter<'a>>> {
        let factory = FilterFactory::new(FactoryScope::new(schema, context));
        factory.create_node_filters(schema.entity(entity)?, Some(&Value::from(where_)))
    }

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("title").unwrap(), ("title", None));
        assert_eq!(split_key("title_NOT_IN").unwrap(), ("title", Some("NOT_IN")));
        assert_eq!(split_key("first_name_STARTS_WITH").unwrap(), ("first_name", Some("STARTS_WITH")));
        assert_eq!(split_key("actorsConnection_NONE").unwrap(), ("actorsConnection", Some("NONE")));
    }

    #[test]
    fn test_property_operators() {
        let schema = schema();
        let context = TranslationContext::default();
        let result = filters(&schema, &context, "Movie", json!({"title_CONTAINS": "Matrix", "released_GTE": 1999})).unwrap();
        assert_eq!(result.len(), 2);
        assert!(matches!(
            &result[0],
            Filter::Property(PropertyFilter { operator: FilterOperator::Contains, target: PropertyTarget::Node, .. })
        ));
        assert!(matches!(&result[1], Filter::Property(PropertyFilter { operator: FilterOperator::Gte, .. })));
    }

    #[test]
    fn test_string_operator_on_number_is_rejected() {
        let schema = schema();
        let context = TranslationContext::default();
        let err = filters(&schema, &context, "Movie", json!({"released_CONTAINS": 1})).unwrap_err();
        assert!(matches!(err, Error::Input(InputError::UnknownOperator { .. })));
    }

    #[test]
    fn test_unknown_field() {
        let schema = schema();
        let context = TranslationContext::default();
        let err = filters(&schema, &context, "Movie", json!({"budget": 1})).unwrap_err();
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
    fn test_in_requires_list() {
        let schema = schema();
        let context = TranslationContext::default();
        let err = filters(&schema, &context, "Movie", json!({"title_IN": "Matrix"})).unwrap_err();
        assert!(matches!(err, Error::Input(InputError::InvalidWhere { .. })));
    }

    #[test]
    fn test_cypher_attribute_filter() {
        let schema = schema();
        let context = TranslationContext::default();
        let result = filters(&schema, &context, "Movie", json!({"score_GT": 0.5})).unwrap();
        assert!(matches!(&result[0], Filter::Cypher(_)));
        assert!(result[0].requires_subqueries());
    }

    #[test]
    fn test_relationship_quantifiers() {
        let schema = schema();
        let context = TranslationContext::default();
        let result = filters(
            &schema,
            &context,
            "Movie",
            json!({"actors_ALL": {"name": "Keanu"}, "actors": null, "actors_NOT": null}),
        )
        .unwrap();
        let quantifiers: Vec<_> = result
            .iter()
            .map(|filter| match filter {
                Filter::Relationship(rel) => (rel.quantifier, rel.inner.is_some()),
                other => panic!("unexpected filter {other:?}"),
            })
            .collect();
        assert_eq!(
            quantifiers,
            vec![
                (RelationshipQuantifier::All, true),
                (RelationshipQuantifier::Some, false),
                (RelationshipQuantifier::None, false),
            ]
        );
    }

    #[test]
    fn test_unknown_quantifier() {
        let schema = schema();
        let context = TranslationContext::default();
        let err = filters(&schema, &context, "Movie", json!({"actors_GT": {}})).unwrap_err();
        assert!(matches!(err, Error::Input(InputError::UnknownOperator { .. })));
    }

    #[test]
    fn test_connection_filter_with_edge() {
        let schema = schema();
        let context = TranslationContext::default();
        let result = filters(
            &schema,
            &context,
            "Movie",
            json!({"actorsConnection_SOME": {"node": {"name": "Keanu"}, "edge": {"role_STARTS_WITH": "N"}}}),
        )
        .unwrap();
        let Filter::Connection(connection) = &result[0] else {
            panic!("expected a connection filter");
        };
        let Some(Filter::Logical(inner)) = connection.inner.as_deref() else {
            panic!("expected node and edge filters");
        };
        assert!(matches!(
            &inner.children[1],
            Filter::Property(PropertyFilter { target: PropertyTarget::Edge, .. })
        ));
    }

    #[test]
    fn test_aggregation_filter() {
        let schema = schema();
        let context = TranslationContext::default();
        let result = filters(
            &schema,
            &context,
            "Movie",
            json!({"actorsAggregate": {"count_GT": 1, "node": {"name_SHORTEST_LENGTH_LT": 4}}}),
        )
        .unwrap();
        let Filter::Aggregation(aggregation) = &result[0] else {
            panic!("expected an aggregation filter");
        };
        let AggregationPredicate::Logical(LogicalOperator::And, children) = &aggregation.predicate else {
            panic!("expected a conjunction");
        };
        assert!(matches!(
            &children[0],
            AggregationPredicate::Leaf(AggregationLeaf { subject: AggregationSubject::Count, operator: BinaryOp::Gt, .. })
        ));
        let AggregationPredicate::Logical(_, leaves) = &children[1] else {
            panic!("expected node leaves");
        };
        assert!(matches!(
            &leaves[0],
            AggregationPredicate::Leaf(AggregationLeaf {
                subject: AggregationSubject::Attribute { function: AggregationFunction::ShortestLength, .. },
                ..
            })
        ));
    }

    #[test]
    fn test_sum_on_string_is_rejected() {
        let schema = schema();
        let context = TranslationContext::default();
        let factory = FilterFactory::new(FactoryScope::new(&schema, &context));
        let actors = schema.entity("Movie").unwrap().find_relationship("actors").unwrap();
        let err = factory
            .aggregation_filter(actors, "actorsAggregate", &Value::from(json!({"node": {"name_SUM_LT": 1}})))
            .unwrap_err();
        assert!(matches!(err, Error::Input(InputError::InvalidWhere { .. })));
    }

    #[test]
    fn test_logical_filters() {
        let schema = schema();
        let context = TranslationContext::default();
        let result = filters(
            &schema,
            &context,
            "Movie",
            json!({"OR": [{"title": "A"}, {"title": "B"}], "NOT": {"released": 1999}}),
        )
        .unwrap();
        let Filter::Logical(or) = &result[0] else {
            panic!("expected OR");
        };
        assert_eq!(or.operator, LogicalOperator::Or);
        assert_eq!(or.children.len(), 2);
        let Filter::Logical(not) = &result[1] else {
            panic!("expected NOT");
        };
        assert_eq!(not.operator, LogicalOperator::Not);
        assert_eq!(not.children.len(), 1);
    }

    #[test]
    fn test_interface_typename_filter() {
        let schema = schema();
        let context = TranslationContext::default();
        let result = filters(&schema, &context, "Production", json!({"typename_IN": ["Series"]})).unwrap();
        let Filter::Typename(typename) = &result[0] else {
            panic!("expected a typename filter");
        };
        assert_eq!(typename.accepted.len(), 1);

        let err = filters(&schema, &context, "Production", json!({"typename_IN": ["Actor"]})).unwrap_err();
        assert!(matches!(err, Error::Input(InputError::InvalidWhere { .. })));
    }

    #[test]
    fn test_union_where_is_keyed_by_member() {
        let schema = schema();
        let context = TranslationContext::default();
        let result = filters(&schema, &context, "Search", json!({"Movie": {"title": "Matrix"}})).unwrap();
        let Filter::Logical(or) = &result[0] else {
            panic!("expected OR over members");
        };
        assert_eq!(or.operator, LogicalOperator::Or);
        let Filter::Logical(branch) = &or.children[0] else {
            panic!("expected typename and member filters");
        };
        assert!(matches!(&branch.children[0], Filter::Typename(_)));

        let err = filters(&schema, &context, "Search", json!({"Series": {}})).unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::FieldNotFound { .. })));
    }

    #[test]
    fn test_rule_values_read_jwt_claims() {
        let schema = schema();
        let context = TranslationContext::default();
        let factory = FilterFactory::for_rules(FactoryScope::new(&schema, &context));
        let result = factory
            .create_node_filters(schema.entity("Actor").unwrap(), Some(&Value::from(json!({"name": "$jwt.sub"}))))
            .unwrap();
        assert!(matches!(
            &result[0],
            Filter::Property(PropertyFilter { value: FilterValue::JwtClaim(path), .. }) if path == "sub"
        ));
    }
}
