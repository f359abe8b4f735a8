use cyphergen_adapters::cypher::{
    BinaryOp, CallImports, Clause, DeleteClause, Expr, Labels, MatchClause, ReturnClause, SetClause,
    SetItem, Variable, append_where,
};
use cyphergen_common::types::Value;
use cyphergen_common::utils::error::Result;
use cyphergen_core::schema::{Attribute, ConcreteEntity, Relationship};

use super::create::{ConnectInput, DATA, NestedCreate, current_timestamp, stored_value};
use super::delete::NestedDelete;
use super::{OperationTranspileResult, match_filtered};
use crate::query_ast::ExplainNode;
use crate::query_ast::context::QueryAstContext;
use crate::query_ast::fields::{Field, transpile_fields};
use crate::query_ast::filters::{Filter, predicate_of, subqueries_of};
use crate::query_ast::selection::{Selection, traversal_pattern};

/// Arithmetic update suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOperator {
    /// `_INCREMENT`
    Increment,
    /// `_DECREMENT`
    Decrement,
    /// `_ADD`
    Add,
    /// `_SUBTRACT`
    Subtract,
    /// `_MULTIPLY`
    Multiply,
    /// `_DIVIDE`
    Divide,
}

impl MathOperator {
    /// Parses a key suffix without its leading underscore.
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "INCREMENT" => MathOperator::Increment,
            "DECREMENT" => MathOperator::Decrement,
            "ADD" => MathOperator::Add,
            "SUBTRACT" => MathOperator::Subtract,
            "MULTIPLY" => MathOperator::Multiply,
            "DIVIDE" => MathOperator::Divide,
            _ => return None,
        })
    }

    fn binary_op(self) -> BinaryOp {
        match self {
            MathOperator::Increment | MathOperator::Add => BinaryOp::Add,
            MathOperator::Decrement | MathOperator::Subtract => BinaryOp::Sub,
            MathOperator::Multiply => BinaryOp::Mul,
            MathOperator::Divide => BinaryOp::Div,
        }
    }
}

/// One assignment of an update.
#[derive(Debug)]
pub enum PropertyUpdate<'a> {
    /// `title: "..."`
    Set {
        /// The attribute.
        attribute: &'a Attribute,
        /// New value.
        value: Value,
    },
    /// `runtime_INCREMENT: 1`
    Math {
        /// The attribute.
        attribute: &'a Attribute,
        /// Applied operator.
        operator: MathOperator,
        /// Right operand.
        value: Value,
    },
    /// `tags_PUSH: [...]`
    Push {
        /// The attribute.
        attribute: &'a Attribute,
        /// Appended items, always a list.
        value: Value,
    },
    /// `tags_POP: 2`
    Pop {
        /// The attribute.
        attribute: &'a Attribute,
        /// Number of trailing items removed.
        count: i64,
    },
    /// `@timestamp(operations: [UPDATE])`
    Timestamp(&'a Attribute),
}

impl PropertyUpdate<'_> {
    fn attribute(&self) -> &Attribute {
        match self {
            PropertyUpdate::Set { attribute, .. }
            | PropertyUpdate::Math { attribute, .. }
            | PropertyUpdate::Push { attribute, .. }
            | PropertyUpdate::Pop { attribute, .. }
            | PropertyUpdate::Timestamp(attribute) => attribute,
        }
    }

    pub(crate) fn set_item(&self, ctx: &QueryAstContext<'_>, subject: &Variable) -> SetItem {
        let env = ctx.env();
        let attribute = self.attribute();
        let current = subject.property(attribute.database_name());
        let value = match self {
            PropertyUpdate::Set { value, .. } => {
                stored_value(ctx, &attribute.attribute_type, env.param(value.clone()).into())
            }
            PropertyUpdate::Math { operator, value, .. } => {
                current.binary(operator.binary_op(), env.param(value.clone()))
            }
            PropertyUpdate::Push { value, .. } => current.add(stored_value(
                ctx,
                &attribute.attribute_type,
                env.param(value.clone()).into(),
            )),
            PropertyUpdate::Pop { count, .. } => Expr::Slice {
                subject: Box::new(current),
                from: Some(Box::new(Expr::literal(0))),
                to: Some(Box::new(env.param(-count).into())),
            },
            PropertyUpdate::Timestamp(_) => current_timestamp(attribute),
        };
        SetItem::property(subject, attribute.database_name(), value)
    }

    fn describe(&self) -> String {
        let name = &self.attribute().name;
        match self {
            PropertyUpdate::Set { .. } => name.clone(),
            PropertyUpdate::Math { operator, .. } => format!("{name} {operator:?}"),
            PropertyUpdate::Push { .. } => format!("{name} Push"),
            PropertyUpdate::Pop { .. } => format!("{name} Pop"),
            PropertyUpdate::Timestamp(_) => format!("{name} Timestamp"),
        }
    }
}

fn set_clause(ctx: &QueryAstContext<'_>, assignments: &[(&PropertyUpdate<'_>, &Variable)]) -> Option<Clause> {
    if assignments.is_empty() {
        return None;
    }
    let items = assignments
        .iter()
        .map(|(update, subject)| update.set_item(ctx, subject))
        .collect();
    Some(Clause::Set(SetClause { items }))
}

fn count_rows(ctx: &QueryAstContext<'_>) -> Clause {
    Clause::Return(ReturnClause::aliased(Expr::count(Expr::Star), &ctx.env().var()))
}

/// `rel: { where: {...}, update: { node: {...}, edge: {...} } }`
#[derive(Debug)]
pub struct RelatedUpdate<'a> {
    /// Relationship from the parent.
    pub relationship: &'a Relationship,
    /// Labels of the related nodes.
    pub target_labels: Labels,
    /// Which related nodes are updated.
    pub filters: Vec<Filter<'a>>,
    /// Assignments on the related node.
    pub node: Vec<PropertyUpdate<'a>>,
    /// Assignments on the relationship.
    pub edge: Vec<PropertyUpdate<'a>>,
    /// Updates one level further down.
    pub nested: Vec<NestedUpdate<'a>>,
}

impl RelatedUpdate<'_> {
    fn call(&self, ctx: &QueryAstContext<'_>) -> Result<Clause> {
        let parent = ctx.target()?.clone();
        let env = ctx.env();
        let relationship = env.node_var();
        let target = env.node_var();
        let inner = ctx.push(Some(relationship.clone()), target.clone());

        let mut body = vec![Clause::Match(MatchClause::new(traversal_pattern(
            &parent,
            self.relationship,
            Some(relationship.clone()),
            &target,
            self.target_labels.clone(),
        )))];
        body.extend(subqueries_of(&self.filters, &inner)?);
        if let Some(predicate) = predicate_of(&self.filters, &inner)? {
            append_where(&mut body, predicate);
        }
        let assignments: Vec<_> = self
            .node
            .iter()
            .map(|update| (update, &target))
            .chain(self.edge.iter().map(|update| (update, &relationship)))
            .collect();
        body.extend(set_clause(&inner, &assignments));
        for nested in &self.nested {
            body.push(nested.call(&inner)?);
        }
        body.push(count_rows(ctx));
        Ok(Clause::call(CallImports::var(&parent), body))
    }
}

/// `rel: { disconnect: { where: {...} } }`
#[derive(Debug)]
pub struct DisconnectInput<'a> {
    /// Relationship from the parent.
    pub relationship: &'a Relationship,
    /// Labels of the related nodes.
    pub target_labels: Labels,
    /// Which relationships are removed.
    pub filters: Vec<Filter<'a>>,
}

impl DisconnectInput<'_> {
    fn call(&self, ctx: &QueryAstContext<'_>) -> Result<Clause> {
        let parent = ctx.target()?.clone();
        let env = ctx.env();
        let relationship = env.node_var();
        let target = env.node_var();
        let inner = ctx.push(Some(relationship.clone()), target.clone());

        let mut body = vec![Clause::Match(MatchClause::new(traversal_pattern(
            &parent,
            self.relationship,
            Some(relationship.clone()),
            &target,
            self.target_labels.clone(),
        )))];
        body.extend(subqueries_of(&self.filters, &inner)?);
        if let Some(predicate) = predicate_of(&self.filters, &inner)? {
            append_where(&mut body, predicate);
        }
        body.push(Clause::Delete(DeleteClause {
            detach: false,
            variables: vec![relationship],
        }));
        body.push(count_rows(ctx));
        Ok(Clause::call(CallImports::var(&parent), body))
    }
}

/// A relationship input of an update.
#[derive(Debug)]
pub enum NestedUpdate<'a> {
    /// Update related nodes.
    Update(RelatedUpdate<'a>),
    /// Create and connect a new node.
    Create(NestedCreate<'a>),
    /// Connect existing nodes.
    Connect(ConnectInput<'a>),
    /// Remove relationships.
    Disconnect(DisconnectInput<'a>),
    /// Delete related nodes.
    Delete(NestedDelete<'a>),
}

impl NestedUpdate<'_> {
    /// The input as a `CALL` importing the target of `ctx`.
    pub(crate) fn call(&self, ctx: &QueryAstContext<'_>) -> Result<Clause> {
        match self {
            NestedUpdate::Update(update) => update.call(ctx),
            NestedUpdate::Create(create) => create.call(ctx),
            NestedUpdate::Connect(connect) => connect.call(ctx),
            NestedUpdate::Disconnect(disconnect) => disconnect.call(ctx),
            NestedUpdate::Delete(delete) => delete.transpile(ctx),
        }
    }

    fn explain(&self) -> ExplainNode {
        match self {
            NestedUpdate::Update(update) => ExplainNode::new("NestedUpdate")
                .prop("relationship", &update.relationship.name)
                .inputs(update.filters.iter().map(Filter::explain))
                .inputs(update.nested.iter().map(NestedUpdate::explain)),
            NestedUpdate::Create(create) => {
                ExplainNode::new("NestedCreate").prop("relationship", &create.relationship.name)
            }
            NestedUpdate::Connect(connect) => connect.explain(),
            NestedUpdate::Disconnect(disconnect) => ExplainNode::new("Disconnect")
                .prop("relationship", &disconnect.relationship.name)
                .inputs(disconnect.filters.iter().map(Filter::explain)),
            NestedUpdate::Delete(delete) => delete.explain(),
        }
    }
}

/// Updates matched nodes of one concrete entity.
#[derive(Debug)]
pub struct UpdateOperation<'a> {
    /// The updated entity.
    pub target: &'a ConcreteEntity,
    /// How nodes are matched.
    pub selection: Selection<'a>,
    /// `where` and authorization filters evaluated before writing.
    pub filters: Vec<Filter<'a>>,
    /// Assignments on the matched nodes.
    pub properties: Vec<PropertyUpdate<'a>>,
    /// Relationship inputs, in request order.
    pub nested: Vec<NestedUpdate<'a>>,
    /// Validation evaluated after writing.
    pub validate_after: Vec<Filter<'a>>,
    /// Fields projected from every updated node.
    pub fields: Vec<Field<'a>>,
}

impl UpdateOperation<'_> {
    pub(crate) fn transpile(&self, ctx: &QueryAstContext<'_>) -> Result<OperationTranspileResult> {
        let matched = match_filtered(&self.selection, &self.filters, ctx)?;
        let nested = matched.ctx;
        let mut clauses = matched.clauses;
        let node = nested.target()?.clone();

        let assignments: Vec<_> = self.properties.iter().map(|update| (update, &node)).collect();
        clauses.extend(set_clause(&nested, &assignments));
        for input in &self.nested {
            clauses.push(input.call(&nested)?);
        }
        clauses.extend(subqueries_of(&self.validate_after, &nested)?);
        if let Some(predicate) = predicate_of(&self.validate_after, &nested)? {
            append_where(&mut clauses, predicate);
        }

        let (subqueries, items) = transpile_fields(&self.fields, &nested)?;
        clauses.extend(subqueries);
        let data = Variable::named(DATA);
        clauses.push(Clause::Return(ReturnClause::aliased(
            Expr::function_distinct(
                "collect",
                Expr::MapProjection {
                    subject: node,
                    items,
                },
            ),
            &data,
        )));
        Ok(OperationTranspileResult {
            clauses,
            projection_expr: data.expr(),
        })
    }

    pub(crate) fn explain(&self) -> ExplainNode {
        let properties = self
            .properties
            .iter()
            .map(PropertyUpdate::describe)
            .collect::<Vec<_>>()
            .join(", ");
        ExplainNode::new("UpdateOperation")
            .prop("entity", &self.target.name)
            .prop("selection", self.selection.describe())
            .prop("set", properties)
            .inputs(self.filters.iter().map(Filter::explain))
            .inputs(self.nested.iter().map(NestedUpdate::explain))
            .inputs(self.validate_after.iter().map(Filter::explain))
            .inputs(self.fields.iter().map(Field::explain))
    }
}
