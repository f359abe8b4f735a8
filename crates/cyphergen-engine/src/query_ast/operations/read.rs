use cyphergen_adapters::cypher::{
    Clause, Expr, MapItem, Projection, ReturnClause, Variable, WithClause,
};
use cyphergen_common::utils::error::Result;
use cyphergen_core::schema::ConcreteEntity;

use super::{
    OperationTranspileResult, collect_result, explain_sort, match_filtered, pagination_props,
    sort_and_paginate,
};
use crate::query_ast::context::QueryAstContext;
use crate::query_ast::fields::{Field, transpile_fields};
use crate::query_ast::filters::Filter;
use crate::query_ast::pagination::Pagination;
use crate::query_ast::selection::Selection;
use crate::query_ast::sort::Sort;
use crate::query_ast::{ExplainNode, PropertyTarget};

/// Key carrying the concrete type name in polymorphic projections.
pub(crate) const RESOLVE_TYPE_KEY: &str = "__resolveType";

/// Reads nodes of one concrete entity.
#[derive(Debug)]
pub struct ReadOperation<'a> {
    /// The matched entity.
    pub target: &'a ConcreteEntity,
    /// How the target is matched.
    pub selection: Selection<'a>,
    /// Projected fields, in request order.
    pub fields: Vec<Field<'a>>,
    /// `where` and authorization filters.
    pub filters: Vec<Filter<'a>>,
    /// `ORDER BY` items.
    pub sort: Vec<Sort<'a>>,
    /// `SKIP` and `LIMIT`.
    pub pagination: Pagination,
    /// Nested reads collect a list rather than a single node.
    pub is_list: bool,
}

impl ReadOperation<'_> {
    pub(crate) fn transpile(&self, ctx: &QueryAstContext<'_>) -> Result<OperationTranspileResult> {
        let matched = match_filtered(&self.selection, &self.filters, ctx)?;
        let nested = matched.ctx;
        let mut clauses = matched.clauses;
        clauses.extend(sort_and_paginate(
            &self.sort,
            &self.pagination,
            &nested,
            matched.score.as_ref(),
        )?);

        let (subqueries, items) = transpile_fields(&self.fields, &nested)?;
        clauses.extend(subqueries);

        let target = nested.target()?.clone();
        let projection = Expr::MapProjection {
            subject: target.clone(),
            items,
        };

        if !ctx.has_target() {
            clauses.push(Clause::Return(ReturnClause::aliased(projection, &target)));
            return Ok(OperationTranspileResult {
                clauses,
                projection_expr: target.expr(),
            });
        }

        let result = ctx.env().var();
        clauses.push(Clause::With(WithClause::items(vec![Projection::aliased(
            projection, &target,
        )])));
        clauses.push(Clause::Return(ReturnClause::aliased(
            collect_result(&target, self.is_list),
            &result,
        )));
        Ok(OperationTranspileResult {
            clauses,
            projection_expr: result.expr(),
        })
    }

    /// One `UNION` branch of a composite read, returning the projected node
    /// as `result`.
    ///
    /// Sorting happens after the union, so the projection also carries the
    /// values `sort` reads.
    pub(crate) fn transpile_branch(
        &self,
        ctx: &QueryAstContext<'_>,
        sort: &[Sort<'_>],
        result: &Variable,
    ) -> Result<Vec<Clause>> {
        let mut clauses = Vec::new();
        if ctx.has_target() {
            clauses.push(Clause::with_star());
        }
        let matched = match_filtered(&self.selection, &self.filters, ctx)?;
        let nested = matched.ctx;
        clauses.extend(matched.clauses);
        for item in sort {
            clauses.extend(item.get_subqueries(&nested)?);
        }

        let (subqueries, mut items) = transpile_fields(&self.fields, &nested)?;
        clauses.extend(subqueries);
        items.push(MapItem::Entry(
            RESOLVE_TYPE_KEY.to_string(),
            Expr::literal(self.target.name.as_str()),
        ));
        for item in sort {
            if let Some(entry) = item.projection_entry(&nested, PropertyTarget::Node)? {
                push_unique(&mut items, entry);
            }
        }

        let target = nested.target()?.clone();
        clauses.push(Clause::With(WithClause::items(vec![Projection::aliased(
            Expr::MapProjection {
                subject: target.clone(),
                items,
            },
            &target,
        )])));
        clauses.push(Clause::Return(ReturnClause::aliased(&target, result)));
        Ok(clauses)
    }

    pub(crate) fn explain(&self) -> ExplainNode {
        let node = ExplainNode::new("ReadOperation")
            .prop("entity", &self.target.name)
            .prop("selection", self.selection.describe());
        pagination_props(node, &self.pagination)
            .inputs(self.filters.iter().map(Filter::explain))
            .inputs(explain_sort(&self.sort))
            .inputs(self.fields.iter().map(Field::explain))
    }
}

fn map_item_key(item: &MapItem) -> &str {
    match item {
        MapItem::Property(key) | MapItem::Entry(key, _) => key,
    }
}

/// Adds `entry` unless a requested field already projects the same key.
pub(crate) fn push_unique(items: &mut Vec<MapItem>, entry: MapItem) {
    let key = map_item_key(&entry);
    if !items.iter().any(|item| map_item_key(item) == key) {
        items.push(entry);
    }
}
