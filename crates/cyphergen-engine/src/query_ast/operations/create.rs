//! Row-by-row create, plus the write helpers shared with update and the
//! batched create.

use cyphergen_adapters::cypher::{
    CallImports, Clause, CreateClause, Expr, Labels, MatchClause, MergeClause, NodePattern,
    Pattern, Projection, ReturnClause, SetClause, SetItem, Variable, append_where,
};
use cyphergen_common::types::Value;
use cyphergen_common::utils::error::Result;
use cyphergen_core::schema::{
    Attribute, AttributeType, ConcreteEntity, Relationship, ScalarType, TimestampOperation,
};

use super::OperationTranspileResult;
use crate::query_ast::ExplainNode;
use crate::query_ast::context::QueryAstContext;
use crate::query_ast::fields::{Field, transpile_fields};
use crate::query_ast::filters::{Filter, predicate_of, subqueries_of};
use crate::query_ast::selection::traversal_pattern;

/// Column every mutation returns its projected nodes in.
pub(crate) const DATA: &str = "data";

/// Wraps a written value in the constructor its attribute type needs:
/// `datetime($param0)`, `point($param0)`, or a list comprehension for lists.
pub(crate) fn stored_value(ctx: &QueryAstContext<'_>, attribute_type: &AttributeType, value: Expr) -> Expr {
    let constructor = attribute_type
        .scalar()
        .and_then(ScalarType::temporal_function)
        .or_else(|| attribute_type.is_point().then_some("point"));
    match constructor {
        Some(name) if attribute_type.is_list() => {
            let item = ctx.env().var();
            Expr::ListComprehension {
                map: Some(Box::new(Expr::function(name, vec![item.expr()]))),
                variable: item,
                list: Box::new(value),
                predicate: None,
            }
        }
        Some(name) => Expr::function(name, vec![value]),
        None => value,
    }
}

/// `datetime()`, or the constructor matching the attribute's temporal type.
pub(crate) fn current_timestamp(attribute: &Attribute) -> Expr {
    let name = attribute
        .attribute_type
        .scalar()
        .and_then(ScalarType::temporal_function)
        .unwrap_or("datetime");
    Expr::function(name, Vec::new())
}

/// A value written to an attribute on create.
#[derive(Debug)]
pub enum PropertyInput<'a> {
    /// A provided or default value.
    Value {
        /// The attribute.
        attribute: &'a Attribute,
        /// The value.
        value: Value,
    },
    /// `@id(autogenerate: true)`
    Autogenerated(&'a Attribute),
    /// `@timestamp`
    Timestamp(&'a Attribute),
}

impl PropertyInput<'_> {
    pub(crate) fn set_item(&self, ctx: &QueryAstContext<'_>, subject: &Variable) -> SetItem {
        match self {
            PropertyInput::Value { attribute, value } => {
                let param = ctx.env().param(value.clone());
                SetItem::property(
                    subject,
                    attribute.database_name(),
                    stored_value(ctx, &attribute.attribute_type, param.into()),
                )
            }
            PropertyInput::Autogenerated(attribute) => SetItem::property(
                subject,
                attribute.database_name(),
                Expr::function("randomUUID", Vec::new()),
            ),
            PropertyInput::Timestamp(attribute) => {
                SetItem::property(subject, attribute.database_name(), current_timestamp(attribute))
            }
        }
    }
}

/// Values the database generates for a new node of `entity`.
pub fn generated_properties(entity: &ConcreteEntity) -> Vec<PropertyInput<'_>> {
    entity
        .attributes
        .values()
        .filter_map(|attribute| {
            if attribute.is_autogenerated() {
                Some(PropertyInput::Autogenerated(attribute))
            } else if attribute.has_timestamp(TimestampOperation::Create) {
                Some(PropertyInput::Timestamp(attribute))
            } else {
                None
            }
        })
        .collect()
}

fn set_clause(items: Vec<SetItem>) -> Option<Clause> {
    (!items.is_empty()).then(|| Clause::Set(SetClause { items }))
}

fn count_rows(ctx: &QueryAstContext<'_>) -> Clause {
    Clause::Return(ReturnClause::aliased(
        Expr::count(Expr::Star),
        &ctx.env().var(),
    ))
}

/// One node to create, with what hangs off it.
#[derive(Debug)]
pub struct CreateInput<'a> {
    /// The created entity.
    pub target: &'a ConcreteEntity,
    /// Written properties, generated ones included.
    pub properties: Vec<PropertyInput<'a>>,
    /// Related nodes created with it.
    pub creates: Vec<NestedCreate<'a>>,
    /// Existing nodes connected to it.
    pub connects: Vec<ConnectInput<'a>>,
    /// Validation evaluated once the node is written.
    pub validate: Vec<Filter<'a>>,
}

impl CreateInput<'_> {
    /// `CREATE (node:Label) SET ...`, then nested creates and connects.
    pub(crate) fn clauses(&self, ctx: &QueryAstContext<'_>, node: &Variable) -> Result<Vec<Clause>> {
        let node_ctx = ctx.push(None, node.clone());
        let mut clauses = vec![Clause::Create(CreateClause {
            pattern: Pattern::node(NodePattern::new(
                node.clone(),
                Labels::all(self.target.labels.iter().cloned()),
            )),
        })];
        let items = self
            .properties
            .iter()
            .map(|property| property.set_item(&node_ctx, node))
            .collect();
        clauses.extend(set_clause(items));
        for create in &self.creates {
            clauses.extend(create.clauses(&node_ctx)?);
        }
        for connect in &self.connects {
            clauses.push(connect.call(&node_ctx)?);
        }
        clauses.extend(subqueries_of(&self.validate, &node_ctx)?);
        if let Some(predicate) = predicate_of(&self.validate, &node_ctx)? {
            append_where(&mut clauses, predicate);
        }
        Ok(clauses)
    }

    fn explain(&self) -> ExplainNode {
        ExplainNode::new("CreateInput")
            .prop("entity", &self.target.name)
            .prop("properties", self.properties.len().to_string())
            .inputs(self.creates.iter().map(|create| {
                ExplainNode::new("NestedCreate")
                    .prop("relationship", &create.relationship.name)
                    .inputs([create.node.explain()])
            }))
            .inputs(self.connects.iter().map(ConnectInput::explain))
            .inputs(self.validate.iter().map(Filter::explain))
    }
}

/// `rel: { create: { node: {...}, edge: {...} } }`
#[derive(Debug)]
pub struct NestedCreate<'a> {
    /// Relationship from the parent.
    pub relationship: &'a Relationship,
    /// The created node, always of a concrete entity.
    pub node: CreateInput<'a>,
    /// Relationship properties.
    pub edge: Vec<PropertyInput<'a>>,
}

impl NestedCreate<'_> {
    /// Creates the node and `MERGE`s the relationship from the target of `ctx`.
    pub(crate) fn clauses(&self, ctx: &QueryAstContext<'_>) -> Result<Vec<Clause>> {
        let parent = ctx.target()?.clone();
        let env = ctx.env();
        let node = env.node_var();
        let mut clauses = self.node.clauses(ctx, &node)?;
        let relationship = env.node_var();
        clauses.push(Clause::Merge(MergeClause {
            pattern: traversal_pattern(
                &parent,
                self.relationship,
                Some(relationship.clone()),
                &node,
                Labels::None,
            ),
            on_create: Vec::new(),
        }));
        let items = self
            .edge
            .iter()
            .map(|property| property.set_item(ctx, &relationship))
            .collect();
        clauses.extend(set_clause(items));
        Ok(clauses)
    }

    /// The create in its own `CALL`, for use after other clauses.
    pub(crate) fn call(&self, ctx: &QueryAstContext<'_>) -> Result<Clause> {
        let parent = ctx.target()?.clone();
        let mut body = self.clauses(ctx)?;
        body.push(count_rows(ctx));
        Ok(Clause::call(CallImports::var(&parent), body))
    }
}

/// `rel: { connect: { where: { node: {...} }, edge: {...} } }`
#[derive(Debug)]
pub struct ConnectInput<'a> {
    /// Relationship from the parent.
    pub relationship: &'a Relationship,
    /// Labels of the connected nodes.
    pub target_labels: Labels,
    /// Which nodes to connect.
    pub filters: Vec<Filter<'a>>,
    /// Relationship properties.
    pub edge: Vec<PropertyInput<'a>>,
}

impl ConnectInput<'_> {
    /// `CALL { WITH parent MATCH (t:Label) WHERE ... MERGE (parent)-[r:TYPE]->(t) RETURN count(*) }`
    ///
    /// A `MATCH` without rows still yields one row from `count(*)`, so the
    /// parent row survives when nothing matches.
    pub(crate) fn call(&self, ctx: &QueryAstContext<'_>) -> Result<Clause> {
        let parent = ctx.target()?.clone();
        let env = ctx.env();
        let target = env.node_var();
        let inner = ctx.push(None, target.clone());

        let mut body = vec![Clause::Match(MatchClause::new(Pattern::node(NodePattern::new(
            target.clone(),
            self.target_labels.clone(),
        ))))];
        body.extend(subqueries_of(&self.filters, &inner)?);
        if let Some(predicate) = predicate_of(&self.filters, &inner)? {
            append_where(&mut body, predicate);
        }

        let relationship = env.node_var();
        body.push(Clause::Merge(MergeClause {
            pattern: traversal_pattern(
                &parent,
                self.relationship,
                Some(relationship.clone()),
                &target,
                Labels::None,
            ),
            on_create: Vec::new(),
        }));
        let items = self
            .edge
            .iter()
            .map(|property| property.set_item(ctx, &relationship))
            .collect();
        body.extend(set_clause(items));
        body.push(count_rows(ctx));
        Ok(Clause::call(CallImports::var(&parent), body))
    }

    pub(crate) fn explain(&self) -> ExplainNode {
        ExplainNode::new("Connect")
            .prop("relationship", &self.relationship.name)
            .inputs(self.filters.iter().map(Filter::explain))
    }
}

/// Creates one node per input row, each in its own `CALL`.
#[derive(Debug)]
pub struct CreateOperation<'a> {
    /// The created entity.
    pub target: &'a ConcreteEntity,
    /// One entry per input row.
    pub inputs: Vec<CreateInput<'a>>,
    /// Fields projected from every created node.
    pub fields: Vec<Field<'a>>,
}

impl CreateOperation<'_> {
    pub(crate) fn transpile(&self, ctx: &QueryAstContext<'_>) -> Result<OperationTranspileResult> {
        let env = ctx.env();
        let mut clauses = Vec::with_capacity(self.inputs.len() + 1);
        let mut nodes = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let node = env.node_var();
            let mut body = input.clauses(ctx, &node)?;
            body.push(Clause::Return(ReturnClause {
                items: vec![Projection::var(&node)],
                ..ReturnClause::default()
            }));
            clauses.push(Clause::call(CallImports::None, body));
            nodes.push(node);
        }

        let mut projections = Vec::with_capacity(nodes.len());
        for node in nodes {
            let node_ctx = ctx.push(None, node.clone());
            let (subqueries, items) = transpile_fields(&self.fields, &node_ctx)?;
            clauses.extend(subqueries);
            projections.push(Expr::MapProjection {
                subject: node,
                items,
            });
        }
        let data = Variable::named(DATA);
        clauses.push(Clause::Return(ReturnClause::aliased(Expr::List(projections), &data)));
        Ok(OperationTranspileResult {
            clauses,
            projection_expr: data.expr(),
        })
    }

    pub(crate) fn explain(&self) -> ExplainNode {
        ExplainNode::new("CreateOperation")
            .prop("entity", &self.target.name)
            .prop("rows", self.inputs.len().to_string())
            .inputs(self.inputs.iter().map(CreateInput::explain))
            .inputs(self.fields.iter().map(Field::explain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TranslationContext;
    use crate::query_ast::PropertyTarget;
    use crate::query_ast::QueryAst;
    use crate::query_ast::fields::{AttributeField, AttributeFieldKind};
    use crate::query_ast::filters::{FilterOperator, FilterValue, PropertyFilter};
    use crate::query_ast::operations::Operation;
    use cyphergen_core::schema::RelationshipDirection;

    #[test]
    fn test_create_with_nested_create_and_connect() {
        let actor = ConcreteEntity::new("Actor").attribute(Attribute::new("name", AttributeType::string()));
        let movie = ConcreteEntity::new("Movie")
            .attribute(Attribute::new("id", AttributeType::Scalar(ScalarType::Id)).autogenerated_id())
            .attribute(Attribute::new("title", AttributeType::string()));
        let actors = Relationship::new("actors", "ACTED_IN", RelationshipDirection::In, "Actor");
        let name = &actor.attributes["name"];

        let mut properties = vec![PropertyInput::Value {
            attribute: &movie.attributes["title"],
            value: Value::from("Matrix"),
        }];
        properties.extend(generated_properties(&movie));

        let input = CreateInput {
            target: &movie,
            properties,
            creates: vec![NestedCreate {
                relationship: &actors,
                node: CreateInput {
                    target: &actor,
                    properties: vec![PropertyInput::Value {
                        attribute: name,
                        value: Value::from("Keanu"),
                    }],
                    creates: Vec::new(),
                    connects: Vec::new(),
                    validate: Vec::new(),
                },
                edge: Vec::new(),
            }],
            connects: vec![ConnectInput {
                relationship: &actors,
                target_labels: Labels::all(["Actor"]),
                filters: vec![Filter::Property(PropertyFilter {
                    attribute: name,
                    operator: FilterOperator::Eq,
                    value: FilterValue::Value(Value::from("Carrie")),
                    target: PropertyTarget::Node,
                })],
                edge: Vec::new(),
            }],
            validate: Vec::new(),
        };
        let create = CreateOperation {
            target: &movie,
            inputs: vec![input],
            fields: vec![Field::Attribute(AttributeField {
                alias: "title".into(),
                attribute: &movie.attributes["title"],
                kind: AttributeFieldKind::Plain,
            })],
        };

        let result = QueryAst::new(Operation::Create(create))
            .build(&TranslationContext::default())
            .unwrap();
        assert_eq!(
            result.cypher,
            "CALL {\n    \
                 CREATE (this0:Movie)\n    \
                 SET this0.title = $param0, this0.id = randomUUID()\n    \
                 CREATE (this1:Actor)\n    \
                 SET this1.name = $param1\n    \
                 MERGE (this0)<-[this2:ACTED_IN]-(this1)\n    \
                 CALL {\n        \
                     WITH this0\n        \
                     MATCH (this3:Actor)\n        \
                     WHERE this3.name = $param2\n        \
                     MERGE (this0)<-[this4:ACTED_IN]-(this3)\n        \
                     RETURN count(*) AS var5\n    \
                 }\n    \
                 RETURN this0\n\
             }\n\
             RETURN [this0 {.title}] AS data"
        );
        assert_eq!(result.params.len(), 3);
    }

    #[test]
    fn test_stored_value_wraps_temporal_lists() {
        let env = crate::query_ast::context::QueryAstEnv::new();
        let translation = TranslationContext::default();
        let ctx = QueryAstContext::new(&env, &translation);
        let dates = AttributeType::list_of(AttributeType::Scalar(ScalarType::Date));
        let expr = stored_value(&ctx, &dates, Variable::named("x").expr());
        assert_eq!(
            cyphergen_adapters::cypher::build_expr(&expr).cypher,
            "[var0 IN x | date(var0)]"
        );
    }
}
