use cyphergen_common::types::Value;
use cyphergen_common::utils::error::{Error, InputError, Result, SchemaError};
use cyphergen_common::utils::strings::upper_first;
use cyphergen_core::resolve_tree::ResolveTree;
use cyphergen_core::schema::{
    Attribute, AuthorizationOperation, AuthorizationWhen, ConcreteEntity, Entity, Relationship,
    RelationshipProperties, TimestampOperation,
};
use indexmap::IndexMap;
use tracing::trace;

use super::as_input;
use crate::factory::{AuthorizationFactory, FactoryScope, FieldFactory, FilterFactory, response_fields};
use crate::query_ast::fields::Field;
use crate::query_ast::filters::Filter;
use crate::query_ast::operations::{
    ConnectInput, CreateInput, CreateOperation, NestedCreate, Operation, PropertyInput, UnwindCreateOperation,
    UnwindNestedCreate, generated_properties,
};

/// Outcome of planning a batched create.
#[derive(Debug)]
pub enum UnwindPlan<'a> {
    /// Every row goes through one `UNWIND`.
    Supported(UnwindCreateOperation<'a>),
    /// The rows need a create each; carries the reason.
    Unsupported(&'static str),
}

/// Why a batched create was not planned.
enum Blocker {
    Unsupported(&'static str),
    Failed(Error),
}

impl From<Error> for Blocker {
    fn from(error: Error) -> Self {
        Blocker::Failed(error)
    }
}

impl From<SchemaError> for Blocker {
    fn from(error: SchemaError) -> Self {
        Blocker::Failed(error.into())
    }
}

/// Builds `createMovies(input)`.
#[derive(Debug, Clone, Copy)]
pub struct CreateFactory<'a> {
    scope: FactoryScope<'a>,
}

impl<'a> CreateFactory<'a> {
    /// Creates a factory.
    #[must_use]
    pub fn new(scope: FactoryScope<'a>) -> Self {
        Self { scope }
    }

    /// One create per input row.
    pub fn create_create(&self, target: &'a ConcreteEntity, tree: &ResolveTree) -> Result<Operation<'a>> {
        let inputs = required_input(tree)?
            .items()
            .map(|row| self.create_input(target, row))
            .collect::<Result<Vec<_>>>()?;
        Ok(Operation::Create(CreateOperation {
            target,
            inputs,
            fields: self.response(target, tree)?,
        }))
    }

    /// Plans the rows of `createMovies(input)` as a single `UNWIND`.
    ///
    /// Rows with `connect` inputs, nested creates of abstract entities or
    /// nested creates carrying validate rules are left to
    /// [`Self::create_create`]. Errors in the input are returned as such.
    pub fn plan_unwind_create(&self, target: &'a ConcreteEntity, tree: &ResolveTree) -> Result<UnwindPlan<'a>> {
        if !self.scope.context.config.unwind_create {
            return Ok(UnwindPlan::Unsupported("disabled by configuration"));
        }
        match self.unwind_create(target, tree) {
            Ok(operation) => Ok(UnwindPlan::Supported(operation)),
            Err(Blocker::Unsupported(reason)) => Ok(UnwindPlan::Unsupported(reason)),
            Err(Blocker::Failed(error)) => Err(error),
        }
    }

    fn unwind_create(
        &self,
        target: &'a ConcreteEntity,
        tree: &ResolveTree,
    ) -> std::result::Result<UnwindCreateOperation<'a>, Blocker> {
        let rows = required_input(tree)?
            .items()
            .map(|row| row.as_map().ok_or(Blocker::Unsupported("input rows are not objects")))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut shape = RowShape::new(target);
        for row in &rows {
            self.analyze(&mut shape, row)?;
        }
        trace!(entity = %target.name, rows = rows.len(), columns = shape.columns().len(), "planned batched create");

        let entity = self.scope.entity_of(target)?;
        Ok(UnwindCreateOperation {
            target,
            rows: Value::List(rows.iter().map(|row| shape.normalize(row)).collect()),
            attributes: shape.columns(),
            nested: shape.unwind_nested(),
            validate: self.create_validate(entity, &shape.provided)?,
            fields: self.response(target, tree)?,
        })
    }

    /// Merges the keys of `row` into `shape`.
    fn analyze(&self, shape: &mut RowShape<'a>, row: &IndexMap<String, Value>) -> std::result::Result<(), Blocker> {
        let target = shape.target;
        let owner = format!("{}CreateInput", target.name);
        for (key, value) in row {
            if let Some(attribute) = target.attributes.get(key) {
                check_creatable(attribute, key)?;
                if !shape.provided.iter().any(|provided| provided.name == attribute.name) {
                    shape.provided.push(attribute);
                }
                continue;
            }
            let relationship = target.relationships.get(key).ok_or_else(|| SchemaError::FieldNotFound {
                entity: owner.clone(),
                field: key.clone(),
            })?;
            let input = value
                .as_map()
                .ok_or(Blocker::Unsupported("relationship input is not an object"))?;
            if input.contains_key("connect") || input.contains_key("connectOrCreate") {
                return Err(Blocker::Unsupported("connect inputs"));
            }
            check_keys(input, &["create"], &field_input(&target.name, relationship))?;

            let related = self.scope.schema.target_of(relationship)?;
            let Some(related) = related.as_concrete() else {
                return Err(Blocker::Unsupported("nested create of an abstract entity"));
            };
            let related_entity = self.scope.entity_of(related)?;
            let operations = [AuthorizationOperation::Create];
            let auth = AuthorizationFactory::new(self.scope);
            if auth
                .create_entity_validate(related_entity, AuthorizationWhen::After, &operations)?
                .is_some()
            {
                return Err(Blocker::Unsupported("nested create with validate rules"));
            }
            let properties = self.scope.schema.edge_properties(relationship);
            if properties.is_some_and(|properties| properties.attributes.values().any(is_generated)) {
                return Err(Blocker::Unsupported("generated relationship properties"));
            }

            let nested = shape
                .nested
                .entry(relationship.name.as_str())
                .or_insert_with(|| NestedShape::new(relationship, related, properties));
            for item in input.get("create").into_iter().flat_map(Value::items) {
                let item = item.as_map().ok_or(Blocker::Unsupported("nested create is not an object"))?;
                check_keys(item, &["node", "edge"], &create_field_input(relationship))?;
                let node = item
                    .get("node")
                    .and_then(Value::as_map)
                    .ok_or(Blocker::Unsupported("nested create without a node"))?;
                self.analyze(&mut nested.node, node)?;
                if let Some(edge) = item.get("edge").filter(|v| !v.is_null()) {
                    nested.analyze_edge(edge)?;
                }
            }
        }
        Ok(())
    }

    /// One node with what hangs off it.
    pub(crate) fn create_input(&self, target: &'a ConcreteEntity, row: &Value) -> Result<CreateInput<'a>> {
        let entity = self.scope.entity_of(target)?;
        let owner = format!("{}CreateInput", target.name);
        let map = as_input(&owner, row)?;

        let mut properties = Vec::new();
        let mut provided = Vec::new();
        let mut creates = Vec::new();
        let mut connects = Vec::new();
        for (key, value) in map {
            if let Some(attribute) = target.attributes.get(key) {
                check_creatable(attribute, key)?;
                provided.push(attribute);
                properties.push(PropertyInput::Value {
                    attribute,
                    value: value.clone(),
                });
            } else if let Some(relationship) = target.relationships.get(key) {
                let input = as_input(&field_input(&target.name, relationship), value)?;
                for (operation, value) in input {
                    match operation.as_str() {
                        "create" => {
                            for item in value.items() {
                                creates.extend(self.nested_creates(relationship, item)?);
                            }
                        }
                        "connect" => {
                            for item in value.items() {
                                connects.push(self.connect(relationship, item)?);
                            }
                        }
                        _ => return Err(unsupported_operation(&field_input(&target.name, relationship), operation)),
                    }
                }
            } else {
                return Err(SchemaError::FieldNotFound {
                    entity: owner,
                    field: key.clone(),
                }
                .into());
            }
        }
        properties.extend(defaults(target.attributes.values(), map));
        properties.extend(generated_properties(target));

        Ok(CreateInput {
            target,
            properties,
            creates,
            connects,
            validate: self.create_validate(entity, &provided)?,
        })
    }

    /// `{ node, edge }` of a nested `create`. An abstract target takes its
    /// node keyed by concrete entity, one create per key.
    pub(crate) fn nested_creates(&self, relationship: &'a Relationship, item: &Value) -> Result<Vec<NestedCreate<'a>>> {
        let target = self.scope.schema.target_of(relationship)?;
        let owner = create_field_input(relationship);
        let item = as_input(&owner, item)?;
        check_keys(item, &["node", "edge"], &owner)?;
        let node = item
            .get("node")
            .filter(|v| !v.is_null())
            .ok_or_else(|| InputError::invalid_argument(format!("{}.node", relationship.name), "is required"))?;

        let mut nodes = Vec::new();
        match target.as_concrete() {
            Some(concrete) => nodes.push((concrete, node)),
            None => {
                let owner = format!("{}CreateInput", target.name());
                let members = self.scope.schema.concrete_entities(target);
                for (member, input) in as_input(&owner, node)? {
                    let concrete = members
                        .iter()
                        .find(|concrete| concrete.name == *member)
                        .ok_or_else(|| SchemaError::FieldNotFound {
                            entity: owner.clone(),
                            field: member.clone(),
                        })?;
                    nodes.push((*concrete, input));
                }
            }
        }

        let mut creates = Vec::with_capacity(nodes.len());
        for (concrete, input) in nodes {
            creates.push(NestedCreate {
                relationship,
                node: self.create_input(concrete, input)?,
                edge: self.edge_inputs(relationship, item.get("edge"))?,
            });
        }
        Ok(creates)
    }

    /// `{ where: { node }, edge }` of a `connect`.
    pub(crate) fn connect(&self, relationship: &'a Relationship, item: &Value) -> Result<ConnectInput<'a>> {
        let target = self.scope.schema.target_of(relationship)?;
        let owner = format!("{}ConnectFieldInput", upper_first(&relationship.name));
        let item = as_input(&owner, item)?;
        check_keys(item, &["where", "edge"], &owner)?;

        let mut filters = Vec::new();
        if let Some(where_) = item.get("where").filter(|v| !v.is_null()) {
            let where_owner = format!("{}ConnectWhere", target.name());
            for (key, value) in as_input(&where_owner, where_)? {
                if key != "node" {
                    return Err(SchemaError::FieldNotFound {
                        entity: where_owner,
                        field: key.clone(),
                    }
                    .into());
                }
                filters.extend(FilterFactory::new(self.scope).create_node_filters(target, Some(value))?);
            }
        }
        filters.extend(
            AuthorizationFactory::new(self.scope)
                .create_entity_auth_filters(target, &[AuthorizationOperation::CreateRelationship])?,
        );

        Ok(ConnectInput {
            relationship,
            target_labels: self.scope.labels_of(target),
            filters,
            edge: self.edge_inputs(relationship, item.get("edge"))?,
        })
    }

    /// Relationship properties written with a new relationship, defaults and
    /// generated values included.
    pub(crate) fn edge_inputs(&self, relationship: &'a Relationship, edge: Option<&Value>) -> Result<Vec<PropertyInput<'a>>> {
        let edge = edge.filter(|v| !v.is_null());
        let Some(properties) = self.scope.schema.edge_properties(relationship) else {
            return match edge {
                Some(_) => Err(SchemaError::FieldNotFound {
                    entity: relationship.connection_field_name(),
                    field: "edge".to_string(),
                }
                .into()),
                None => Ok(Vec::new()),
            };
        };

        let empty = IndexMap::new();
        let provided = match edge {
            Some(edge) => as_input(&properties.name, edge)?,
            None => &empty,
        };
        let mut inputs = Vec::new();
        for (key, value) in provided {
            let attribute = properties.find_attribute(key).ok_or_else(|| SchemaError::FieldNotFound {
                entity: format!("{}CreateInput", properties.name),
                field: key.clone(),
            })?;
            check_creatable(attribute, key)?;
            inputs.push(PropertyInput::Value {
                attribute,
                value: value.clone(),
            });
        }
        inputs.extend(defaults(properties.attributes.values(), provided));
        inputs.extend(properties.attributes.values().filter_map(|attribute| {
            if attribute.is_autogenerated() {
                Some(PropertyInput::Autogenerated(attribute))
            } else if attribute.has_timestamp(TimestampOperation::Create) {
                Some(PropertyInput::Timestamp(attribute))
            } else {
                None
            }
        }));
        Ok(inputs)
    }

    /// `AFTER` validate rules of the created entity and written attributes.
    fn create_validate(&self, entity: &'a Entity, written: &[&'a Attribute]) -> Result<Vec<Filter<'a>>> {
        let auth = AuthorizationFactory::new(self.scope);
        let operations = [AuthorizationOperation::Create];
        let mut validate: Vec<_> = auth
            .create_entity_validate(entity, AuthorizationWhen::After, &operations)?
            .into_iter()
            .collect();
        validate.extend(auth.create_attribute_validate(entity, written, AuthorizationWhen::After, &operations)?);
        Ok(validate)
    }

    fn response(&self, target: &'a ConcreteEntity, tree: &ResolveTree) -> Result<Vec<Field<'a>>> {
        let entity = self.scope.entity_of(target)?;
        let response = format!("Create{}MutationResponse", upper_first(&entity.plural()));
        let selected = response_fields(tree, entity, &response)?;
        FieldFactory::new(self.scope).create_fields(&[entity], &selected)
    }
}

/// Keys shared by every row of a batched create, one level of nesting.
struct RowShape<'a> {
    target: &'a ConcreteEntity,
    provided: Vec<&'a Attribute>,
    nested: IndexMap<&'a str, NestedShape<'a>>,
}

impl<'a> RowShape<'a> {
    fn new(target: &'a ConcreteEntity) -> Self {
        Self {
            target,
            provided: Vec::new(),
            nested: IndexMap::new(),
        }
    }

    /// Attributes every normalized row carries, in declaration order.
    fn columns(&self) -> Vec<&'a Attribute> {
        columns(self.target.attributes.values(), &self.provided)
    }

    /// `row` with every column present and every nested `create` a list.
    fn normalize(&self, row: &IndexMap<String, Value>) -> Value {
        let mut normalized: IndexMap<String, Value> = self
            .columns()
            .into_iter()
            .map(|attribute| (attribute.name.clone(), column_value(attribute, row)))
            .collect();
        for (name, nested) in &self.nested {
            let items = row
                .get(*name)
                .and_then(|input| input.get("create"))
                .map(|create| create.items().map(|item| nested.normalize(item)).collect())
                .unwrap_or_default();
            normalized.insert((*name).to_string(), single("create", Value::List(items)));
        }
        Value::Map(normalized)
    }

    fn unwind_nested(&self) -> Vec<UnwindNestedCreate<'a>> {
        self.nested
            .values()
            .map(|nested| UnwindNestedCreate {
                relationship: nested.relationship,
                target: nested.node.target,
                node_attributes: nested.node.columns(),
                edge_attributes: nested.edge_columns(),
                nested: nested.node.unwind_nested(),
            })
            .collect()
    }
}

struct NestedShape<'a> {
    relationship: &'a Relationship,
    node: RowShape<'a>,
    properties: Option<&'a RelationshipProperties>,
    edge: Vec<&'a Attribute>,
}

impl<'a> NestedShape<'a> {
    fn new(
        relationship: &'a Relationship,
        target: &'a ConcreteEntity,
        properties: Option<&'a RelationshipProperties>,
    ) -> Self {
        Self {
            relationship,
            node: RowShape::new(target),
            properties,
            edge: Vec::new(),
        }
    }

    fn analyze_edge(&mut self, edge: &Value) -> std::result::Result<(), Blocker> {
        let properties = self.properties.ok_or_else(|| SchemaError::FieldNotFound {
            entity: self.relationship.connection_field_name(),
            field: "edge".to_string(),
        })?;
        let edge = edge.as_map().ok_or(Blocker::Unsupported("edge input is not an object"))?;
        for key in edge.keys() {
            let attribute = properties.find_attribute(key).ok_or_else(|| SchemaError::FieldNotFound {
                entity: format!("{}CreateInput", properties.name),
                field: key.clone(),
            })?;
            check_creatable(attribute, key)?;
            if !self.edge.iter().any(|provided| provided.name == attribute.name) {
                self.edge.push(attribute);
            }
        }
        Ok(())
    }

    fn edge_columns(&self) -> Vec<&'a Attribute> {
        match self.properties {
            Some(properties) => columns(properties.attributes.values(), &self.edge),
            None => Vec::new(),
        }
    }

    fn normalize(&self, item: &Value) -> Value {
        let node = item
            .get("node")
            .and_then(Value::as_map)
            .map_or(Value::Null, |node| self.node.normalize(node));
        let empty = IndexMap::new();
        let provided = item.get("edge").and_then(Value::as_map).unwrap_or(&empty);
        let edge = self
            .edge_columns()
            .into_iter()
            .map(|attribute| (attribute.name.clone(), column_value(attribute, provided)))
            .collect();
        Value::Map([("node".to_string(), node), ("edge".to_string(), Value::Map(edge))].into_iter().collect())
    }
}

fn columns<'a>(declared: impl Iterator<Item = &'a Attribute>, provided: &[&'a Attribute]) -> Vec<&'a Attribute> {
    declared
        .filter(|attribute| {
            attribute.annotations.default.is_some() || provided.iter().any(|p| p.name == attribute.name)
        })
        .collect()
}

fn column_value(attribute: &Attribute, row: &IndexMap<String, Value>) -> Value {
    row.get(&attribute.name)
        .cloned()
        .or_else(|| attribute.annotations.default.clone())
        .unwrap_or(Value::Null)
}

fn single(key: &str, value: Value) -> Value {
    Value::Map([(key.to_string(), value)].into_iter().collect())
}

fn required_input(tree: &ResolveTree) -> Result<&Value> {
    tree.arg("input")
        .ok_or_else(|| InputError::invalid_argument("input", "is required").into())
}

/// Default values of the `declared` attributes missing from `provided`.
fn defaults<'a>(
    declared: impl Iterator<Item = &'a Attribute>,
    provided: &IndexMap<String, Value>,
) -> Vec<PropertyInput<'a>> {
    declared
        .filter(|attribute| !provided.contains_key(&attribute.name))
        .filter_map(|attribute| {
            let value = attribute.annotations.default.clone()?;
            Some(PropertyInput::Value { attribute, value })
        })
        .collect()
}

fn is_generated(attribute: &Attribute) -> bool {
    attribute.is_autogenerated() || attribute.has_timestamp(TimestampOperation::Create)
}

/// Rejects attributes the database computes or generates.
pub(crate) fn check_writable(attribute: &Attribute, argument: &str) -> Result<()> {
    if attribute.is_cypher() {
        Err(InputError::invalid_argument(argument, "@cypher fields cannot be written").into())
    } else if attribute.is_autogenerated() {
        Err(InputError::invalid_argument(argument, "autogenerated fields cannot be written").into())
    } else {
        Ok(())
    }
}

fn check_creatable(attribute: &Attribute, argument: &str) -> Result<()> {
    check_writable(attribute, argument)?;
    if attribute.has_timestamp(TimestampOperation::Create) {
        return Err(InputError::invalid_argument(argument, "timestamps are set on create").into());
    }
    Ok(())
}

pub(crate) fn check_keys(map: &IndexMap<String, Value>, allowed: &[&str], owner: &str) -> Result<()> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(SchemaError::FieldNotFound {
            entity: owner.to_string(),
            field: key.clone(),
        }
        .into()),
        None => Ok(()),
    }
}

/// `connectOrCreate` and other relationship operations without a create
/// counterpart.
pub(crate) fn unsupported_operation(owner: &str, operation: &str) -> Error {
    if operation == "connectOrCreate" {
        InputError::invalid_argument(operation, "connectOrCreate is not supported").into()
    } else {
        SchemaError::FieldNotFound {
            entity: owner.to_string(),
            field: operation.to_string(),
        }
        .into()
    }
}

/// `MovieActorsFieldInput`
fn field_input(owner: &str, relationship: &Relationship) -> String {
    format!("{owner}{}FieldInput", upper_first(&relationship.name))
}

/// `ActorsCreateFieldInput`
fn create_field_input(relationship: &Relationship) -> String {
    format!("{}CreateFieldInput", upper_first(&relationship.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::TranslationContext;
    use crate::factory::operations::fixture;
    use serde_json::json;

    fn movie_input(input: serde_json::Value) -> ResolveTree {
        ResolveTree::new("createMovies").with_arg("input", Value::from(input)).with_fields(
            "CreateMoviesMutationResponse",
            [ResolveTree::new("movies").with_fields("Movie", [ResolveTree::new("title")])],
        )
    }

    #[test]
    fn test_create_fills_defaults_and_generated_values() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let factory = CreateFactory::new(FactoryScope::new(&schema, &context));
        let movie = schema.entity("Movie").unwrap().as_concrete().unwrap();
        let tree = movie_input(json!([{
            "title": "Heat",
            "actors": {
                "create": [{"node": {"name": "Al"}, "edge": {"role": "Neil"}}],
                "connect": [{"where": {"node": {"name": "Val"}}}]
            }
        }]));
        let Operation::Create(create) = factory.create_create(movie, &tree).unwrap() else {
            panic!("expected a create");
        };
        assert_eq!(create.fields.len(), 1);
        let input = &create.inputs[0];
        let names: Vec<_> = input
            .properties
            .iter()
            .map(|property| match property {
                PropertyInput::Value { attribute, .. }
                | PropertyInput::Autogenerated(attribute)
                | PropertyInput::Timestamp(attribute) => attribute.name.as_str(),
            })
            .collect();
        assert_eq!(names, ["title", "status", "id"]);
        assert_eq!(input.creates.len(), 1);
        assert_eq!(input.creates[0].edge.len(), 2);
        assert_eq!(input.connects.len(), 1);
        assert_eq!(input.connects[0].filters.len(), 1);
    }

    #[test]
    fn test_create_rejects_generated_attributes() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let factory = CreateFactory::new(FactoryScope::new(&schema, &context));
        let movie = schema.entity("Movie").unwrap().as_concrete().unwrap();
        let err = factory.create_create(movie, &movie_input(json!([{"id": "1"}]))).unwrap_err();
        assert!(matches!(err, Error::Input(InputError::InvalidArgument { .. })));
    }

    #[test]
    fn test_abstract_nested_create_is_keyed_by_entity() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let factory = CreateFactory::new(FactoryScope::new(&schema, &context));
        let actor = schema.entity("Actor").unwrap();
        let productions = actor.find_relationship("productions").unwrap();
        let creates = factory
            .nested_creates(productions, &Value::from(json!({"node": {"Series": {"title": "Heat"}}})))
            .unwrap();
        assert_eq!(creates.len(), 1);
        assert_eq!(creates[0].node.target.name, "Series");
        assert!(creates[0].edge.is_empty());
    }

    #[test]
    fn test_connect_or_create_is_rejected() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let factory = CreateFactory::new(FactoryScope::new(&schema, &context));
        let movie = schema.entity("Movie").unwrap().as_concrete().unwrap();
        let tree = movie_input(json!([{"title": "Heat", "actors": {"connectOrCreate": []}}]));
        let err = factory.create_create(movie, &tree).unwrap_err();
        assert!(matches!(err, Error::Input(InputError::InvalidArgument { .. })));
    }

    #[test]
    fn test_unwind_rows_are_normalized() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let factory = CreateFactory::new(FactoryScope::new(&schema, &context));
        let movie = schema.entity("Movie").unwrap().as_concrete().unwrap();
        let tree = movie_input(json!([
            {"title": "Heat", "actors": {"create": [{"node": {"name": "Al"}, "edge": {"role": "Neil"}}]}},
            {"title": "Ronin"}
        ]));
        let UnwindPlan::Supported(create) = factory.plan_unwind_create(movie, &tree).unwrap() else {
            panic!("expected a batched create");
        };
        assert_eq!(
            create.rows,
            Value::from(json!([
                {
                    "title": "Heat",
                    "status": "DRAFT",
                    "actors": {"create": [{"node": {"name": "Al"}, "edge": {"role": "Neil", "screenTime": 0}}]}
                },
                {"title": "Ronin", "status": "DRAFT", "actors": {"create": []}}
            ]))
        );
        let columns: Vec<_> = create.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(columns, ["title", "status"]);
        assert_eq!(create.nested.len(), 1);
        assert_eq!(create.nested[0].edge_attributes.len(), 2);
    }

    #[test]
    fn test_unwind_falls_back() {
        let schema = fixture::schema();
        let movie = schema.entity("Movie").unwrap().as_concrete().unwrap();
        let actor = schema.entity("Actor").unwrap().as_concrete().unwrap();

        let disabled = TranslationContext::new(Config::default().with_unwind_create(false));
        let factory = CreateFactory::new(FactoryScope::new(&schema, &disabled));
        let plan = factory.plan_unwind_create(movie, &movie_input(json!([{"title": "Heat"}]))).unwrap();
        assert!(matches!(plan, UnwindPlan::Unsupported(_)));

        let context = TranslationContext::default();
        let factory = CreateFactory::new(FactoryScope::new(&schema, &context));
        let connect = movie_input(json!([{"actors": {"connect": [{"where": {"node": {"name": "Al"}}}]}}]));
        assert!(matches!(
            factory.plan_unwind_create(movie, &connect).unwrap(),
            UnwindPlan::Unsupported("connect inputs")
        ));

        let tree = ResolveTree::new("createActors")
            .with_arg("input", Value::from(json!([{"productions": {"create": [{"node": {"Series": {}}}]}}])));
        assert!(matches!(
            factory.plan_unwind_create(actor, &tree).unwrap(),
            UnwindPlan::Unsupported(_)
        ));
    }

    #[test]
    fn test_unwind_reports_input_errors() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let factory = CreateFactory::new(FactoryScope::new(&schema, &context));
        let movie = schema.entity("Movie").unwrap().as_concrete().unwrap();
        let err = factory.plan_unwind_create(movie, &movie_input(json!([{"budget": 1}]))).unwrap_err();
        assert_eq!(
            err,
            Error::Schema(SchemaError::FieldNotFound {
                entity: "MovieCreateInput".into(),
                field: "budget".into()
            })
        );
    }
}
