use cyphergen_adapters::cypher::{Clause, Expr};
use cyphergen_common::utils::error::Result;

use super::Filter;
use crate::query_ast::context::QueryAstContext;

/// `AND`, `OR` or `NOT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    /// All children hold.
    And,
    /// Any child holds.
    Or,
    /// The single child does not hold.
    Not,
}

/// Combines child filters.
#[derive(Debug)]
pub struct LogicalFilter<'a> {
    /// The connective.
    pub operator: LogicalOperator,
    /// Children; `NOT` has exactly one.
    pub children: Vec<Filter<'a>>,
}

impl<'a> LogicalFilter<'a> {
    /// Creates a filter, lifting children of the same connective into this
    /// one so that nesting does not change the generated predicate.
    pub fn new(operator: LogicalOperator, children: Vec<Filter<'a>>) -> Self {
        let children = if operator == LogicalOperator::Not {
            children
        } else {
            children
                .into_iter()
                .flat_map(|child| match child {
                    Filter::Logical(inner) if inner.operator == operator => inner.children,
                    other => vec![other],
                })
                .collect()
        };
        Self { operator, children }
    }

    pub(crate) fn get_subqueries(&self, ctx: &QueryAstContext<'_>) -> Result<Vec<Clause>> {
        let mut clauses = Vec::new();
        for child in &self.children {
            clauses.extend(child.get_subqueries(ctx)?);
        }
        Ok(clauses)
    }

    pub(crate) fn get_predicate(&self, ctx: &QueryAstContext<'_>) -> Result<Option<Expr>> {
        let mut predicates = Vec::with_capacity(self.children.len());
        for child in &self.children {
            if let Some(predicate) = child.get_predicate(ctx)? {
                predicates.push(predicate);
            }
        }
        Ok(match self.operator {
            LogicalOperator::And => Expr::and_all(predicates),
            LogicalOperator::Or => Expr::or_all(predicates),
            LogicalOperator::Not => Expr::and_all(predicates).map(Expr::not),
        })
    }
}
