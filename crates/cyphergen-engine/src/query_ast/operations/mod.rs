//! Cypher-producing units.
//!
//! Every operation transpiles into a clause list plus the expression its
//! parent projects. Nested reads and connections are wrapped by their parent
//! field in `CALL { WITH <parent> ... }`; aggregations and mutations place
//! their own subqueries.

mod aggregation;
mod composite;
mod connection;
mod create;
mod cypher;
mod delete;
mod read;
mod unwind_create;
mod update;

use cyphergen_adapters::cypher::{Clause, Expr, Variable, WithClause, append_where};
use cyphergen_common::utils::error::Result;

pub use aggregation::{AggregationEntry, AggregationOperation, AggregationSource};
pub use composite::{CompositeConnectionOperation, CompositeReadOperation, ConnectionBranch};
pub use connection::{ConnectionOperation, ConnectionProjection};
pub use create::{
    ConnectInput, CreateInput, CreateOperation, NestedCreate, PropertyInput, generated_properties,
};
pub use cypher::CypherScalarOperation;
pub use delete::{DeleteOperation, NestedDelete};
pub use read::ReadOperation;
pub use unwind_create::{UnwindCreateOperation, UnwindNestedCreate};
pub use update::{
    DisconnectInput, MathOperator, NestedUpdate, PropertyUpdate, RelatedUpdate, UpdateOperation,
};

use super::ExplainNode;
use super::context::QueryAstContext;
use super::filters::{Filter, predicate_of, subqueries_of};
use super::pagination::Pagination;
use super::selection::Selection;
use super::sort::Sort;

/// Clauses of an operation and the expression its parent projects.
#[derive(Debug)]
pub struct OperationTranspileResult {
    /// Clauses in execution order.
    pub clauses: Vec<Clause>,
    /// What the parent puts under the field's key.
    pub projection_expr: Expr,
}

/// A Cypher-producing unit of the Query AST.
#[derive(Debug)]
pub enum Operation<'a> {
    /// Reads nodes of one concrete entity.
    Read(ReadOperation<'a>),
    /// Reads nodes of every implementation of an interface or union.
    CompositeRead(CompositeReadOperation<'a>),
    /// `edges` and `totalCount` of one concrete entity.
    Connection(ConnectionOperation<'a>),
    /// `edges` and `totalCount` over every implementation.
    CompositeConnection(CompositeConnectionOperation<'a>),
    /// Aggregates.
    Aggregation(AggregationOperation<'a>),
    /// Row-by-row create.
    Create(CreateOperation<'a>),
    /// Batched create over `UNWIND`.
    UnwindCreate(UnwindCreateOperation<'a>),
    /// Update.
    Update(UpdateOperation<'a>),
    /// Delete.
    Delete(DeleteOperation<'a>),
    /// Scalar `@cypher` query field.
    CypherScalar(CypherScalarOperation<'a>),
}

impl Operation<'_> {
    /// Transpiles the operation in the scope of `ctx`.
    pub fn transpile(&self, ctx: &QueryAstContext<'_>) -> Result<OperationTranspileResult> {
        match self {
            Operation::Read(op) => op.transpile(ctx),
            Operation::CompositeRead(op) => op.transpile(ctx),
            Operation::Connection(op) => op.transpile(ctx),
            Operation::CompositeConnection(op) => op.transpile(ctx),
            Operation::Aggregation(op) => op.transpile(ctx),
            Operation::Create(op) => op.transpile(ctx),
            Operation::UnwindCreate(op) => op.transpile(ctx),
            Operation::Update(op) => op.transpile(ctx),
            Operation::Delete(op) => op.transpile(ctx),
            Operation::CypherScalar(op) => op.transpile(ctx),
        }
    }

    /// Returns `true` if a parent field must wrap the clauses in
    /// `CALL { WITH <parent> ... }`.
    #[must_use]
    pub fn is_wrapped_by_parent(&self) -> bool {
        matches!(
            self,
            Operation::Read(_)
                | Operation::CompositeRead(_)
                | Operation::Connection(_)
                | Operation::CompositeConnection(_)
        )
    }

    /// Explain tree node.
    #[must_use]
    pub fn explain(&self) -> ExplainNode {
        match self {
            Operation::Read(op) => op.explain(),
            Operation::CompositeRead(op) => op.explain(),
            Operation::Connection(op) => op.explain(),
            Operation::CompositeConnection(op) => op.explain(),
            Operation::Aggregation(op) => op.explain(),
            Operation::Create(op) => op.explain(),
            Operation::UnwindCreate(op) => op.explain(),
            Operation::Update(op) => op.explain(),
            Operation::Delete(op) => op.explain(),
            Operation::CypherScalar(op) => op.explain(),
        }
    }
}

/// A matched target with its filters applied.
pub(crate) struct Matched<'e> {
    pub(crate) clauses: Vec<Clause>,
    pub(crate) ctx: QueryAstContext<'e>,
    pub(crate) score: Option<Variable>,
}

/// Applies `selection`, then the subqueries and predicate of `filters`.
///
/// The predicate attaches to the matching clause when no subquery sits in
/// between, and to a trailing `WITH *` otherwise.
pub(crate) fn match_filtered<'e>(
    selection: &Selection<'_>,
    filters: &[Filter<'_>],
    ctx: &QueryAstContext<'e>,
) -> Result<Matched<'e>> {
    let selected = selection.apply(ctx)?;
    let mut clauses = selected.pre_clauses;
    clauses.push(selected.clause);
    let nested = selected.nested_context;
    clauses.extend(subqueries_of(filters, &nested)?);
    if let Some(predicate) = predicate_of(filters, &nested)? {
        append_where(&mut clauses, predicate);
    }
    Ok(Matched {
        clauses,
        ctx: nested,
        score: selected.score,
    })
}

/// Sort subqueries followed by `WITH * ORDER BY ... SKIP ... LIMIT ...`.
pub(crate) fn sort_and_paginate(
    sort: &[Sort<'_>],
    pagination: &Pagination,
    ctx: &QueryAstContext<'_>,
    score: Option<&Variable>,
) -> Result<Vec<Clause>> {
    let mut clauses = Vec::new();
    for item in sort {
        clauses.extend(item.get_subqueries(ctx)?);
    }
    if sort.is_empty() && pagination.is_empty() {
        return Ok(clauses);
    }
    let mut with = WithClause::star();
    for item in sort {
        with.order_by.extend(item.get_sort_fields(ctx, score)?);
    }
    let (skip, limit) = pagination.get_pagination(ctx);
    with.skip = skip;
    with.limit = limit;
    clauses.push(Clause::With(with));
    Ok(clauses)
}

/// `collect(x)` for list relationships, `head(collect(x))` otherwise.
pub(crate) fn collect_result(expr: impl Into<Expr>, is_list: bool) -> Expr {
    let collected = Expr::collect(expr);
    if is_list { collected } else { Expr::head(collected) }
}

pub(crate) fn explain_sort<'s>(sort: &'s [Sort<'s>]) -> impl Iterator<Item = ExplainNode> + 's {
    sort.iter()
        .map(|item| ExplainNode::new("Sort").prop("field", item.field_name()))
}

pub(crate) fn pagination_props(node: ExplainNode, pagination: &Pagination) -> ExplainNode {
    let node = match pagination.skip {
        Some(skip) => node.prop("skip", skip.to_string()),
        None => node,
    };
    match pagination.limit {
        Some(limit) => node.prop("limit", limit.to_string()),
        None => node,
    }
}
