//! Batched create: every input row goes through one `UNWIND`.

use cyphergen_adapters::cypher::{
    CallImports, Clause, CreateClause, Expr, Labels, MergeClause, NodePattern, Pattern, Projection,
    ReturnClause, SetClause, SetItem, UnwindClause, Variable, append_where,
};
use cyphergen_common::types::Value;
use cyphergen_common::utils::error::Result;
use cyphergen_core::schema::{Attribute, ConcreteEntity, Relationship};

use super::OperationTranspileResult;
use super::create::{DATA, generated_properties, stored_value};
use crate::query_ast::ExplainNode;
use crate::query_ast::context::{QueryAstContext, QueryAstEnv};
use crate::query_ast::fields::{Field, transpile_fields};
use crate::query_ast::filters::{Filter, predicate_of, subqueries_of};
use crate::query_ast::selection::traversal_pattern;

/// Prefix of every name the batched create allocates.
pub(crate) const UNWIND_PREFIX: &str = "create_";

/// `CREATE` of one node from the row in `source`, with its generated values.
fn create_node(
    ctx: &QueryAstContext<'_>,
    target: &ConcreteEntity,
    attributes: &[&Attribute],
    node: &Variable,
    source: &Expr,
) -> Vec<Clause> {
    let mut items: Vec<SetItem> = attributes
        .iter()
        .map(|attribute| {
            let value = source.clone().property(attribute.name.as_str());
            SetItem::property(
                node,
                attribute.database_name(),
                stored_value(ctx, &attribute.attribute_type, value),
            )
        })
        .collect();
    items.extend(
        generated_properties(target)
            .iter()
            .map(|property| property.set_item(ctx, node)),
    );

    let mut clauses = vec![Clause::Create(CreateClause {
        pattern: Pattern::node(NodePattern::new(
            node.clone(),
            Labels::all(target.labels.iter().cloned()),
        )),
    })];
    if !items.is_empty() {
        clauses.push(Clause::Set(SetClause { items }));
    }
    clauses
}

/// Nested `create` inputs of a batched create.
#[derive(Debug)]
pub struct UnwindNestedCreate<'a> {
    /// Relationship from the parent.
    pub relationship: &'a Relationship,
    /// The created entity.
    pub target: &'a ConcreteEntity,
    /// Attributes read from `node` of every item.
    pub node_attributes: Vec<&'a Attribute>,
    /// Attributes read from `edge` of every item.
    pub edge_attributes: Vec<&'a Attribute>,
    /// Creates one level further down.
    pub nested: Vec<UnwindNestedCreate<'a>>,
}

impl UnwindNestedCreate<'_> {
    /// `CALL { WITH parent, row UNWIND row.rel.create AS item CREATE ... MERGE ... }`
    ///
    /// `under_node` is set when `row` is itself an item, whose node fields
    /// sit under `node`.
    pub(crate) fn call(&self, ctx: &QueryAstContext<'_>, row: &Variable, under_node: bool) -> Result<Clause> {
        let parent = ctx.target()?.clone();
        let env = ctx.env();
        let item = env.var();
        let row_fields = if under_node {
            row.property("node")
        } else {
            row.expr()
        };

        let mut body = vec![Clause::Unwind(UnwindClause {
            expr: row_fields
                .property(self.relationship.name.as_str())
                .property("create"),
            alias: item.clone(),
        })];

        let node = env.node_var();
        let node_ctx = ctx.push(None, node.clone());
        body.extend(create_node(
            &node_ctx,
            self.target,
            &self.node_attributes,
            &node,
            &item.property("node"),
        ));

        let relationship = env.node_var();
        body.push(Clause::Merge(MergeClause {
            pattern: traversal_pattern(
                &parent,
                self.relationship,
                Some(relationship.clone()),
                &node,
                Labels::None,
            ),
            on_create: Vec::new(),
        }));
        let edge: Vec<SetItem> = self
            .edge_attributes
            .iter()
            .map(|attribute| {
                SetItem::property(
                    &relationship,
                    attribute.database_name(),
                    stored_value(
                        ctx,
                        &attribute.attribute_type,
                        item.property("edge").property(attribute.name.as_str()),
                    ),
                )
            })
            .collect();
        if !edge.is_empty() {
            body.push(Clause::Set(SetClause { items: edge }));
        }

        for nested in &self.nested {
            body.push(nested.call(&node_ctx, &item, true)?);
        }
        body.push(Clause::Return(ReturnClause::aliased(
            Expr::collect(Expr::null()),
            &env.var(),
        )));
        Ok(Clause::call(CallImports::Vars(vec![parent, row.clone()]), body))
    }

    fn explain(&self) -> ExplainNode {
        ExplainNode::new("UnwindNestedCreate")
            .prop("relationship", &self.relationship.name)
            .prop("entity", &self.target.name)
            .inputs(self.nested.iter().map(UnwindNestedCreate::explain))
    }
}

/// Creates every row of `rows` in a single `UNWIND`.
///
/// Names carry the `create_` prefix and come from an environment of their
/// own, so they never collide with names of the surrounding request.
#[derive(Debug)]
pub struct UnwindCreateOperation<'a> {
    /// The created entity.
    pub target: &'a ConcreteEntity,
    /// Normalized input rows: a list of maps with defaults filled in and
    /// nested `create` inputs as lists.
    pub rows: Value,
    /// Attributes read from every row.
    pub attributes: Vec<&'a Attribute>,
    /// Nested creates.
    pub nested: Vec<UnwindNestedCreate<'a>>,
    /// Validation evaluated on every created node.
    pub validate: Vec<Filter<'a>>,
    /// Fields projected from every created node.
    pub fields: Vec<Field<'a>>,
}

impl UnwindCreateOperation<'_> {
    pub(crate) fn transpile(&self, ctx: &QueryAstContext<'_>) -> Result<OperationTranspileResult> {
        let env = QueryAstEnv::with_prefix(UNWIND_PREFIX);
        let ctx = ctx.with_env(&env);
        let row = env.var();
        let rows = env.param(self.rows.clone());
        let node = env.node_var();
        let node_ctx = ctx.push(None, node.clone());

        let mut body = create_node(&node_ctx, self.target, &self.attributes, &node, &row.expr());
        for nested in &self.nested {
            body.push(nested.call(&node_ctx, &row, false)?);
        }
        body.extend(subqueries_of(&self.validate, &node_ctx)?);
        if let Some(predicate) = predicate_of(&self.validate, &node_ctx)? {
            append_where(&mut body, predicate);
        }
        body.push(Clause::Return(ReturnClause {
            items: vec![Projection::var(&node)],
            ..ReturnClause::default()
        }));

        let mut clauses = vec![
            Clause::Unwind(UnwindClause {
                expr: rows.into(),
                alias: row.clone(),
            }),
            Clause::call(CallImports::var(&row), body),
        ];
        let (subqueries, items) = transpile_fields(&self.fields, &node_ctx)?;
        clauses.extend(subqueries);
        let data = Variable::named(DATA);
        clauses.push(Clause::Return(ReturnClause::aliased(
            Expr::collect(Expr::MapProjection {
                subject: node,
                items,
            }),
            &data,
        )));
        Ok(OperationTranspileResult {
            clauses,
            projection_expr: data.expr(),
        })
    }

    pub(crate) fn explain(&self) -> ExplainNode {
        let rows = self.rows.as_list().map_or(0, <[Value]>::len);
        ExplainNode::new("UnwindCreateOperation")
            .prop("entity", &self.target.name)
            .prop("rows", rows.to_string())
            .inputs(self.nested.iter().map(UnwindNestedCreate::explain))
            .inputs(self.validate.iter().map(Filter::explain))
            .inputs(self.fields.iter().map(Field::explain))
    }
}
