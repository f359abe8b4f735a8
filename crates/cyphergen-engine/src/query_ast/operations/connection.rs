use cyphergen_adapters::cypher::{
    CallImports, Clause, Expr, Projection, ReturnClause, UnwindClause, Variable, WithClause,
};
use cyphergen_common::utils::error::Result;
use cyphergen_core::schema::ConcreteEntity;

use super::{
    OperationTranspileResult, explain_sort, match_filtered, pagination_props, sort_and_paginate,
};
use crate::query_ast::ExplainNode;
use crate::query_ast::context::QueryAstContext;
use crate::query_ast::fields::{Field, transpile_fields};
use crate::query_ast::filters::Filter;
use crate::query_ast::pagination::Pagination;
use crate::query_ast::selection::Selection;
use crate::query_ast::sort::Sort;

pub(crate) const EDGES: &str = "edges";
pub(crate) const EDGE: &str = "edge";
pub(crate) const TOTAL_COUNT: &str = "totalCount";

/// Output keys requested on a connection, by their response alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionProjection {
    /// `edges`
    pub edges: Option<String>,
    /// `edges.node`
    pub node: Option<String>,
    /// `edges.properties`
    pub properties: Option<String>,
    /// `edges.score` on index queries.
    pub score: Option<String>,
    /// `totalCount`; also set when `pageInfo` needs it.
    pub total_count: Option<String>,
}

/// `edges` and `totalCount` of one concrete entity.
#[derive(Debug)]
pub struct ConnectionOperation<'a> {
    /// The matched entity.
    pub target: &'a ConcreteEntity,
    /// How nodes are matched.
    pub selection: Selection<'a>,
    /// `where` and authorization filters.
    pub filters: Vec<Filter<'a>>,
    /// Fields under `edges.node`.
    pub node_fields: Vec<Field<'a>>,
    /// Fields under `edges.properties`.
    pub edge_fields: Vec<Field<'a>>,
    /// `ORDER BY` items over node and edge.
    pub sort: Vec<Sort<'a>>,
    /// `first` and `after`.
    pub pagination: Pagination,
    /// Requested keys.
    pub projection: ConnectionProjection,
}

impl ConnectionOperation<'_> {
    pub(crate) fn transpile(&self, ctx: &QueryAstContext<'_>) -> Result<OperationTranspileResult> {
        let matched = match_filtered(&self.selection, &self.filters, ctx)?;
        let nested = matched.ctx;
        let mut clauses = matched.clauses;
        let node = nested.target()?.clone();
        let relationship = nested.relationship().cloned();
        let score = matched.score;
        let edges = Variable::named(EDGES);
        let total = Variable::named(TOTAL_COUNT);

        let mut edge_entries = vec![("node", node.expr())];
        if let Some(relationship) = &relationship {
            edge_entries.push(("relationship", relationship.expr()));
        }
        if let Some(score) = &score {
            edge_entries.push(("score", score.expr()));
        }
        clauses.push(Clause::With(WithClause::items(vec![Projection::aliased(
            Expr::collect(Expr::map(edge_entries)),
            &edges,
        )])));
        clauses.push(Clause::With(WithClause::items(vec![
            Projection::var(&edges),
            Projection::aliased(Expr::size(edges.expr()), &total),
        ])));

        let mut envelope = Vec::new();
        if let Some(alias) = &self.projection.edges {
            let page = ctx.env().var();
            let body = self.edges_subquery(&nested, &node, relationship.as_ref(), score.as_ref(), &page)?;
            clauses.push(Clause::call(CallImports::var(&edges), body));
            envelope.push((alias.clone(), page.expr()));
        }
        if let Some(alias) = &self.projection.total_count {
            envelope.push((alias.clone(), total.expr()));
        }

        let result = ctx.env().var();
        clauses.push(Clause::Return(ReturnClause::aliased(Expr::map(envelope), &result)));
        Ok(OperationTranspileResult {
            clauses,
            projection_expr: result.expr(),
        })
    }

    /// `UNWIND edges AS edge ... RETURN collect({node: ..., properties: ...}) AS page`
    fn edges_subquery(
        &self,
        nested: &QueryAstContext<'_>,
        node: &Variable,
        relationship: Option<&Variable>,
        score: Option<&Variable>,
        page: &Variable,
    ) -> Result<Vec<Clause>> {
        let edge = Variable::named(EDGE);
        let mut clauses = vec![Clause::Unwind(UnwindClause {
            expr: Variable::named(EDGES).expr(),
            alias: edge.clone(),
        })];

        let mut unpacked = vec![Projection::aliased(edge.property("node"), node)];
        if let Some(relationship) = relationship {
            unpacked.push(Projection::aliased(edge.property("relationship"), relationship));
        }
        if let Some(score) = score {
            unpacked.push(Projection::aliased(edge.property("score"), score));
        }
        clauses.push(Clause::With(WithClause::items(unpacked)));
        clauses.extend(sort_and_paginate(&self.sort, &self.pagination, nested, score)?);

        let mut entries = Vec::new();
        if let Some(alias) = &self.projection.node {
            let (subqueries, items) = transpile_fields(&self.node_fields, nested)?;
            clauses.extend(subqueries);
            entries.push((
                alias.clone(),
                Expr::MapProjection {
                    subject: node.clone(),
                    items,
                },
            ));
        }
        if let (Some(alias), Some(relationship)) = (&self.projection.properties, relationship) {
            let edge_ctx = nested.with_target(relationship.clone());
            let (subqueries, items) = transpile_fields(&self.edge_fields, &edge_ctx)?;
            clauses.extend(subqueries);
            entries.push((
                alias.clone(),
                Expr::MapProjection {
                    subject: relationship.clone(),
                    items,
                },
            ));
        }
        if let (Some(alias), Some(score)) = (&self.projection.score, score) {
            entries.push((alias.clone(), score.expr()));
        }

        clauses.push(Clause::Return(ReturnClause::aliased(
            Expr::collect(Expr::map(entries)),
            page,
        )));
        Ok(clauses)
    }

    pub(crate) fn explain(&self) -> ExplainNode {
        let node = ExplainNode::new("ConnectionOperation")
            .prop("entity", &self.target.name)
            .prop("selection", self.selection.describe());
        pagination_props(node, &self.pagination)
            .inputs(self.filters.iter().map(Filter::explain))
            .inputs(explain_sort(&self.sort))
            .inputs(self.node_fields.iter().map(Field::explain))
            .inputs(
                self.edge_fields
                    .iter()
                    .map(|field| field.explain().prop("on", "edge")),
            )
    }
}
