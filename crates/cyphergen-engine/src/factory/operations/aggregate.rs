use cyphergen_common::utils::error::{InputError, Result, SchemaError};
use cyphergen_core::resolve_tree::{FieldMap, ResolveTree};
use cyphergen_core::schema::{Attribute, AuthorizationOperation, Entity, Relationship};

use crate::factory::{AuthorizationFactory, FactoryScope, FilterFactory, is_introspection};
use crate::query_ast::PropertyTarget;
use crate::query_ast::fields::{AggregationAttributeField, AggregationSelection, CountField, Field};
use crate::query_ast::filters::Filter;
use crate::query_ast::operations::{AggregationEntry, AggregationOperation, AggregationSource, Operation};

/// Builds `moviesAggregate` and `actorsAggregate` selections.
#[derive(Debug, Clone, Copy)]
pub struct AggregateFactory<'a> {
    scope: FactoryScope<'a>,
}

impl<'a> AggregateFactory<'a> {
    /// Creates a factory.
    #[must_use]
    pub fn new(scope: FactoryScope<'a>) -> Self {
        Self { scope }
    }

    /// `moviesAggregate(where) { count title { shortest } }`
    ///
    /// Interfaces aggregate over the union of their implementations.
    pub fn create_aggregate(&self, entity: &'a Entity, tree: &ResolveTree) -> Result<Operation<'a>> {
        let owner = format!("{}AggregateSelection", entity.name());
        let mut entries = Vec::new();
        let mut attributes = Vec::new();
        for (alias, field) in tree.merged_fields() {
            let name = field.name.as_str();
            if is_introspection(name) {
                continue;
            }
            if name == "count" {
                entries.push(AggregationEntry::Field(Field::Count(CountField { alias })));
                continue;
            }
            let attribute = entity.find_attribute(name).ok_or_else(|| SchemaError::FieldNotFound {
                entity: owner.clone(),
                field: name.to_string(),
            })?;
            attributes.push(attribute);
            entries.push(AggregationEntry::Field(attribute_aggregate(
                attribute,
                PropertyTarget::Node,
                alias,
                &field,
            )?));
        }

        let filters = self.filters(entity, tree, &attributes)?;
        Ok(Operation::Aggregation(AggregationOperation {
            source: AggregationSource::Nodes(self.scope.schema.concrete_entities(entity)),
            filters,
            entries,
        }))
    }

    /// `actorsAggregate(where) { count node { name { longest } } edge { screenTime { max } } }`
    pub fn create_nested_aggregate(&self, relationship: &'a Relationship, tree: &ResolveTree) -> Result<Operation<'a>> {
        let target = self.scope.schema.target_of(relationship)?;
        let owner = relationship.aggregate_field_name();
        let mut entries = Vec::new();
        let mut attributes = Vec::new();
        for (alias, field) in tree.merged_fields() {
            match field.name.as_str() {
                "count" => entries.push(AggregationEntry::Field(Field::Count(CountField { alias }))),
                "node" => {
                    let fields = aggregate_fields(&field.merged_fields(), PropertyTarget::Node, |name| {
                        target.find_attribute(name).inspect(|attribute| attributes.push(*attribute))
                    }, &format!("{owner}Node"))?;
                    entries.push(AggregationEntry::Group { alias, fields });
                }
                "edge" => {
                    let properties = self.scope.schema.edge_properties(relationship).ok_or_else(|| {
                        SchemaError::FieldNotFound {
                            entity: owner.clone(),
                            field: "edge".to_string(),
                        }
                    })?;
                    let fields = aggregate_fields(
                        &field.merged_fields(),
                        PropertyTarget::Edge,
                        |name| properties.find_attribute(name),
                        &properties.name,
                    )?;
                    entries.push(AggregationEntry::Group { alias, fields });
                }
                name if is_introspection(name) => {}
                name => {
                    return Err(SchemaError::FieldNotFound {
                        entity: owner,
                        field: name.to_string(),
                    }
                    .into());
                }
            }
        }

        let filters = self.filters(target, tree, &attributes)?;
        Ok(Operation::Aggregation(AggregationOperation {
            source: AggregationSource::Relationship {
                relationship,
                target_labels: self.scope.labels_of(target),
            },
            filters,
            entries,
        }))
    }

    fn filters(&self, entity: &'a Entity, tree: &ResolveTree, attributes: &[&'a Attribute]) -> Result<Vec<Filter<'a>>> {
        let mut filters = FilterFactory::new(self.scope).create_node_filters(entity, tree.arg("where"))?;
        let auth = AuthorizationFactory::new(self.scope);
        let operations = [AuthorizationOperation::Aggregate];
        filters.extend(auth.create_entity_auth_filters(entity, &operations)?);
        filters.extend(auth.create_attribute_auth_filters(entity, attributes, &operations)?);
        Ok(filters)
    }
}

fn aggregate_fields<'a>(
    fields: &FieldMap,
    target: PropertyTarget,
    mut lookup: impl FnMut(&str) -> Option<&'a Attribute>,
    owner: &str,
) -> Result<Vec<Field<'a>>> {
    let mut created = Vec::with_capacity(fields.len());
    for (alias, field) in fields {
        if is_introspection(&field.name) {
            continue;
        }
        let attribute = lookup(&field.name).ok_or_else(|| SchemaError::FieldNotFound {
            entity: owner.to_string(),
            field: field.name.clone(),
        })?;
        created.push(attribute_aggregate(attribute, target, alias.clone(), field)?);
    }
    Ok(created)
}

/// `title { shortest longest }`: the requested aggregates of one attribute.
fn attribute_aggregate<'a>(
    attribute: &'a Attribute,
    target: PropertyTarget,
    alias: String,
    field: &ResolveTree,
) -> Result<Field<'a>> {
    if attribute.is_cypher() {
        return Err(InputError::invalid_argument(&alias, "@cypher fields cannot be aggregated").into());
    }
    let mut selections = Vec::new();
    for (key, selection) in field.merged_fields() {
        if is_introspection(&selection.name) {
            continue;
        }
        let aggregate = AggregationSelection::from_name(&selection.name).ok_or_else(|| SchemaError::FieldNotFound {
            entity: format!("{}AggregateSelection", attribute.attribute_type.type_name()),
            field: selection.name.clone(),
        })?;
        check_selection(attribute, aggregate, &alias)?;
        selections.push((key, aggregate));
    }
    Ok(Field::AggregationAttribute(AggregationAttributeField {
        alias,
        attribute,
        target,
        selections,
    }))
}

fn check_selection(attribute: &Attribute, selection: AggregationSelection, alias: &str) -> Result<()> {
    let attribute_type = &attribute.attribute_type;
    let supported = match selection {
        AggregationSelection::Shortest | AggregationSelection::Longest => attribute_type.is_string(),
        AggregationSelection::Average | AggregationSelection::Sum => attribute_type.is_numeric(),
        AggregationSelection::Min | AggregationSelection::Max => {
            attribute_type.is_numeric() || attribute_type.is_temporal() || attribute_type.is_string()
        }
    };
    if supported && !attribute_type.is_list() {
        Ok(())
    } else {
        Err(InputError::invalid_argument(
            alias,
            format!("{selection:?} does not apply to {}", attribute_type.type_name()).to_lowercase(),
        )
        .into())
    }
}
