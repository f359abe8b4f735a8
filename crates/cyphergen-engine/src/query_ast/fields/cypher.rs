use cyphergen_adapters::cypher::{Clause, MapItem};
use cyphergen_common::types::Value;
use cyphergen_common::utils::error::Result;
use cyphergen_core::schema::{Attribute, CypherAnnotation};
use indexmap::IndexMap;

use crate::query_ast::context::QueryAstContext;
use crate::query_ast::selection::cypher_scalar_call;

/// A scalar `@cypher` attribute, computed in a subquery.
#[derive(Debug)]
pub struct CypherAttributeField<'a> {
    /// Output key.
    pub alias: String,
    /// The attribute.
    pub attribute: &'a Attribute,
    /// Its statement.
    pub annotation: &'a CypherAnnotation,
    /// Field arguments.
    pub arguments: IndexMap<String, Value>,
}

impl CypherAttributeField<'_> {
    pub(crate) fn transpile(&self, ctx: &QueryAstContext<'_>) -> Result<(Vec<Clause>, MapItem)> {
        let column = ctx.env().var();
        let is_list = self.attribute.attribute_type.is_list();
        let call = cypher_scalar_call(ctx, self.annotation, &self.arguments, &column, is_list)?;
        Ok((vec![call], MapItem::Entry(self.alias.clone(), column.expr())))
    }
}
