use std::sync::LazyLock;

use cyphergen_common::types::Value;
use cyphergen_common::utils::error::{InputError, Result, SchemaError};
use cyphergen_common::utils::strings::upper_first;
use cyphergen_core::resolve_tree::ResolveTree;
use cyphergen_core::schema::{
    Attribute, AuthorizationOperation, AuthorizationWhen, ConcreteEntity, Entity, Relationship, TimestampOperation,
};
use regex::Regex;

use super::create::{check_keys, check_writable, unsupported_operation};
use super::{CreateFactory, DeleteFactory, as_input};
use crate::factory::{
    AuthorizationFactory, FactoryScope, FieldFactory, FilterFactory, KeyPattern, compiled, response_fields,
};
use crate::query_ast::operations::{
    DisconnectInput, MathOperator, NestedUpdate, Operation, PropertyUpdate, RelatedUpdate, UpdateOperation,
};
use crate::query_ast::selection::{NodeSelection, Selection};

/// `runtime_INCREMENT`, `tags_PUSH`
static UPDATE_KEY: KeyPattern = LazyLock::new(|| {
    Regex::new(r"^(?P<field>.+)_(?P<operator>INCREMENT|DECREMENT|ADD|SUBTRACT|MULTIPLY|DIVIDE|PUSH|POP)$")
});

/// Relationship operations accepted as top-level arguments of an update.
const RELATIONSHIP_ARGUMENTS: [&str; 4] = ["connect", "disconnect", "create", "delete"];

/// What one update input writes.
#[derive(Default)]
struct Assignments<'a> {
    properties: Vec<PropertyUpdate<'a>>,
    nested: Vec<NestedUpdate<'a>>,
    written: Vec<&'a Attribute>,
}

/// Builds `updateMovies(where, update, connect, disconnect, create, delete)`.
#[derive(Debug, Clone, Copy)]
pub struct UpdateFactory<'a> {
    scope: FactoryScope<'a>,
}

impl<'a> UpdateFactory<'a> {
    /// Creates a factory.
    #[must_use]
    pub fn new(scope: FactoryScope<'a>) -> Self {
        Self { scope }
    }

    /// Updates the matched nodes of `target`.
    ///
    /// Relationship inputs run in request order: those under `update` first,
    /// then the top-level `connect`, `disconnect`, `create` and `delete`.
    pub fn create_update(&self, target: &'a ConcreteEntity, tree: &ResolveTree) -> Result<Operation<'a>> {
        let entity = self.scope.entity_of(target)?;
        let auth = AuthorizationFactory::new(self.scope);
        let operations = [AuthorizationOperation::Update];

        let mut filters = FilterFactory::new(self.scope).create_node_filters(entity, tree.arg("where"))?;
        filters.extend(auth.create_entity_auth_filters(entity, &operations)?);

        let empty = Value::empty_map();
        let mut assignments = self.update_input(entity, tree.arg("update").unwrap_or(&empty))?;
        filters.extend(auth.create_attribute_auth_filters(entity, &assignments.written, &operations)?);

        for argument in RELATIONSHIP_ARGUMENTS {
            let Some(value) = tree.arg(argument) else {
                continue;
            };
            let owner = format!("{}{}Input", target.name, upper_first(argument));
            for (name, items) in as_input(&owner, value)? {
                let relationship = entity.find_relationship(name).ok_or_else(|| SchemaError::FieldNotFound {
                    entity: owner.clone(),
                    field: name.clone(),
                })?;
                for item in items.items() {
                    assignments
                        .nested
                        .extend(self.relationship_operation(relationship, argument, item)?);
                }
            }
        }

        let mut validate_after: Vec<_> = auth
            .create_entity_validate(entity, AuthorizationWhen::After, &operations)?
            .into_iter()
            .collect();
        validate_after.extend(auth.create_attribute_validate(
            entity,
            &assignments.written,
            AuthorizationWhen::After,
            &operations,
        )?);

        let response = format!("Update{}MutationResponse", upper_first(&entity.plural()));
        let selected = response_fields(tree, entity, &response)?;
        let fields = FieldFactory::new(self.scope).create_fields(&[entity], &selected)?;

        Ok(Operation::Update(UpdateOperation {
            target,
            selection: Selection::Node(NodeSelection::of(target)),
            filters,
            properties: assignments.properties,
            nested: assignments.nested,
            validate_after,
            fields,
        }))
    }

    /// Assignments and relationship inputs of an update input on `entity`,
    /// `@timestamp(operations: [UPDATE])` attributes included unless set.
    fn update_input(&self, entity: &'a Entity, input: &Value) -> Result<Assignments<'a>> {
        let owner = format!("{}UpdateInput", entity.name());
        let mut assignments = Assignments::default();
        for (key, value) in as_input(&owner, input)? {
            if let Some(attribute) = entity.find_attribute(key) {
                assignments.properties.push(assign(attribute, None, key, value)?);
                assignments.written.push(attribute);
            } else if let Some(relationship) = entity.find_relationship(key) {
                for item in value.items() {
                    assignments.nested.extend(self.relationship_update(relationship, item)?);
                }
            } else {
                let (attribute, operator) = suffixed(key, &owner, |name| entity.find_attribute(name))?;
                assignments.properties.push(assign(attribute, Some(operator), key, value)?);
                assignments.written.push(attribute);
            }
        }
        let timestamps = timestamps(entity.attributes(), &assignments.written);
        assignments.properties.extend(timestamps);
        Ok(assignments)
    }

    /// `actors: [{ where, update, connect, disconnect, create, delete }]`
    fn relationship_update(&self, relationship: &'a Relationship, item: &Value) -> Result<Vec<NestedUpdate<'a>>> {
        let owner = format!("{}UpdateFieldInput", upper_first(&relationship.name));
        let item = as_input(&owner, item)?;
        let mut nested = Vec::new();
        for (operation, value) in item {
            match operation.as_str() {
                "where" => {}
                "update" => nested.push(NestedUpdate::Update(self.related_update(
                    relationship,
                    item.get("where"),
                    value,
                )?)),
                _ => {
                    for item in value.items() {
                        nested.extend(self.relationship_operation(relationship, operation, item)?);
                    }
                }
            }
        }
        Ok(nested)
    }

    fn relationship_operation(
        &self,
        relationship: &'a Relationship,
        operation: &str,
        item: &Value,
    ) -> Result<Vec<NestedUpdate<'a>>> {
        Ok(match operation {
            "connect" => vec![NestedUpdate::Connect(CreateFactory::new(self.scope).connect(relationship, item)?)],
            "disconnect" => vec![NestedUpdate::Disconnect(self.disconnect(relationship, item)?)],
            "create" => CreateFactory::new(self.scope)
                .nested_creates(relationship, item)?
                .into_iter()
                .map(NestedUpdate::Create)
                .collect(),
            "delete" => vec![NestedUpdate::Delete(
                DeleteFactory::new(self.scope).nested_delete(relationship, item)?,
            )],
            _ => {
                let owner = format!("{}UpdateFieldInput", upper_first(&relationship.name));
                return Err(unsupported_operation(&owner, operation));
            }
        })
    }

    /// `update: { node, edge }` of the related nodes matching `where_`.
    fn related_update(
        &self,
        relationship: &'a Relationship,
        where_: Option<&Value>,
        update: &Value,
    ) -> Result<RelatedUpdate<'a>> {
        let target = self.scope.schema.target_of(relationship)?;
        let owner = format!("{}UpdateConnectionInput", upper_first(&relationship.name));
        let update = as_input(&owner, update)?;
        check_keys(update, &["node", "edge"], &owner)?;

        let auth = AuthorizationFactory::new(self.scope);
        let operations = [AuthorizationOperation::Update];
        let mut filters = FilterFactory::new(self.scope).create_connection_filters(relationship, where_)?;
        filters.extend(auth.create_entity_auth_filters(target, &operations)?);

        let node = match update.get("node").filter(|v| !v.is_null()) {
            Some(node) => self.update_input(target, node)?,
            None => Assignments::default(),
        };
        filters.extend(auth.create_attribute_auth_filters(target, &node.written, &operations)?);
        let edge = match update.get("edge").filter(|v| !v.is_null()) {
            Some(edge) => self.edge_updates(relationship, edge)?,
            None => Vec::new(),
        };

        Ok(RelatedUpdate {
            relationship,
            target_labels: self.scope.labels_of(target),
            filters,
            node: node.properties,
            edge,
            nested: node.nested,
        })
    }

    fn edge_updates(&self, relationship: &'a Relationship, input: &Value) -> Result<Vec<PropertyUpdate<'a>>> {
        let properties = self
            .scope
            .schema
            .edge_properties(relationship)
            .ok_or_else(|| SchemaError::FieldNotFound {
                entity: relationship.connection_field_name(),
                field: "edge".to_string(),
            })?;
        let owner = format!("{}UpdateInput", properties.name);
        let mut updates = Vec::new();
        let mut written = Vec::new();
        for (key, value) in as_input(&owner, input)? {
            let (attribute, operator) = match properties.find_attribute(key) {
                Some(attribute) => (attribute, None),
                None => {
                    let (attribute, operator) = suffixed(key, &owner, |name| properties.find_attribute(name))?;
                    (attribute, Some(operator))
                }
            };
            updates.push(assign(attribute, operator, key, value)?);
            written.push(attribute);
        }
        updates.extend(timestamps(properties.attributes.values(), &written));
        Ok(updates)
    }

    /// `{ where }` of a `disconnect`.
    fn disconnect(&self, relationship: &'a Relationship, item: &Value) -> Result<DisconnectInput<'a>> {
        let target = self.scope.schema.target_of(relationship)?;
        let owner = format!("{}DisconnectFieldInput", upper_first(&relationship.name));
        let item = as_input(&owner, item)?;
        check_keys(item, &["where"], &owner)?;
        let mut filters = FilterFactory::new(self.scope).create_connection_filters(relationship, item.get("where"))?;
        filters.extend(
            AuthorizationFactory::new(self.scope)
                .create_entity_auth_filters(target, &[AuthorizationOperation::DeleteRelationship])?,
        );
        Ok(DisconnectInput {
            relationship,
            target_labels: self.scope.labels_of(target),
            filters,
        })
    }
}

/// Resolves `field_OPERATOR` to the attribute and operator suffix.
fn suffixed<'a, 'k>(
    key: &'k str,
    owner: &str,
    find: impl Fn(&str) -> Option<&'a Attribute>,
) -> Result<(&'a Attribute, &'k str)> {
    let not_found = || SchemaError::FieldNotFound {
        entity: owner.to_string(),
        field: key.to_string(),
    };
    let captures = compiled(&UPDATE_KEY)?.captures(key).ok_or_else(not_found)?;
    let (Some(field), Some(operator)) = (captures.name("field"), captures.name("operator")) else {
        return Err(not_found().into());
    };
    let attribute = find(field.as_str()).ok_or_else(not_found)?;
    Ok((attribute, operator.as_str()))
}

fn assign<'a>(attribute: &'a Attribute, operator: Option<&str>, key: &str, value: &Value) -> Result<PropertyUpdate<'a>> {
    check_writable(attribute, key)?;
    let attribute_type = &attribute.attribute_type;
    let update = match operator {
        None => PropertyUpdate::Set {
            attribute,
            value: value.clone(),
        },
        Some("PUSH") => {
            if !attribute_type.is_list() {
                return Err(InputError::invalid_argument(key, "_PUSH applies to list fields").into());
            }
            let value = match value {
                Value::List(_) => value.clone(),
                item => Value::List(vec![item.clone()]),
            };
            PropertyUpdate::Push { attribute, value }
        }
        Some("POP") => {
            if !attribute_type.is_list() {
                return Err(InputError::invalid_argument(key, "_POP applies to list fields").into());
            }
            let count = value
                .as_i64()
                .filter(|count| *count >= 0)
                .ok_or_else(|| InputError::invalid_argument(key, "expected a non-negative integer"))?;
            PropertyUpdate::Pop { attribute, count }
        }
        Some(suffix) => {
            let operator = MathOperator::from_suffix(suffix).ok_or_else(|| InputError::UnknownOperator {
                field: attribute.name.clone(),
                operator: suffix.to_string(),
            })?;
            if !attribute_type.is_numeric() || attribute_type.is_list() {
                return Err(InputError::invalid_argument(key, "arithmetic applies to numeric fields").into());
            }
            if !matches!(value, Value::Int64(_) | Value::Float64(_)) {
                return Err(InputError::invalid_argument(key, format!("expected a number, got {}", value.type_name())).into());
            }
            PropertyUpdate::Math {
                attribute,
                operator,
                value: value.clone(),
            }
        }
    };
    Ok(update)
}

fn timestamps<'a>(declared: impl Iterator<Item = &'a Attribute>, written: &[&Attribute]) -> Vec<PropertyUpdate<'a>> {
    declared
        .filter(|attribute| attribute.has_timestamp(TimestampOperation::Update))
        .filter(|attribute| !written.iter().any(|w| w.name == attribute.name))
        .map(PropertyUpdate::Timestamp)
        .collect()
}
