use std::cell::OnceCell;

use cyphergen_adapters::cypher::{Clause, Expr, Variable};
use cyphergen_common::utils::error::Result;
use cyphergen_core::schema::{Attribute, CypherAnnotation};
use indexmap::IndexMap;

use super::property::{FilterOperator, FilterValue, compare};
use crate::query_ast::context::QueryAstContext;
use crate::query_ast::selection::cypher_scalar_call;

/// Compares the value of a `@cypher` attribute.
#[derive(Debug)]
pub struct CypherFilter<'a> {
    /// The attribute.
    pub attribute: &'a Attribute,
    /// Its statement.
    pub annotation: &'a CypherAnnotation,
    /// The comparison.
    pub operator: FilterOperator,
    /// The compared value.
    pub value: FilterValue,
    column: OnceCell<Variable>,
}

impl<'a> CypherFilter<'a> {
    /// Creates a filter on `attribute`.
    pub fn new(
        attribute: &'a Attribute,
        annotation: &'a CypherAnnotation,
        operator: FilterOperator,
        value: FilterValue,
    ) -> Self {
        Self {
            attribute,
            annotation,
            operator,
            value,
            column: OnceCell::new(),
        }
    }

    fn column(&self, ctx: &QueryAstContext<'_>) -> &Variable {
        self.column.get_or_init(|| ctx.env().var())
    }

    pub(crate) fn get_subqueries(&self, ctx: &QueryAstContext<'_>) -> Result<Vec<Clause>> {
        let column = self.column(ctx);
        let is_list = self.attribute.attribute_type.is_list();
        Ok(vec![cypher_scalar_call(ctx, self.annotation, &IndexMap::new(), column, is_list)?])
    }

    pub(crate) fn get_predicate(&self, ctx: &QueryAstContext<'_>) -> Result<Option<Expr>> {
        let left = self.column(ctx).expr();
        compare(
            ctx,
            &self.attribute.name,
            left,
            Some(&self.attribute.attribute_type),
            self.operator,
            &self.value,
        )
        .map(Some)
    }
}
