use cyphergen_adapters::cypher::{Expr, Labels};
use cyphergen_common::utils::error::Result;

use crate::query_ast::context::QueryAstContext;

/// `typename_IN: [Movie, Series]` on an interface: the target must carry the
/// labels of one of the listed implementations.
#[derive(Debug)]
pub struct TypenameFilter {
    /// Labels of each accepted implementation.
    pub accepted: Vec<Labels>,
}

impl TypenameFilter {
    pub(crate) fn get_predicate(&self, ctx: &QueryAstContext<'_>) -> Result<Option<Expr>> {
        let target = ctx.target()?;
        let checks = self
            .accepted
            .iter()
            .map(|labels| Expr::has_labels(target, labels.clone()));
        Ok(Some(Expr::or_all(checks).unwrap_or_else(|| Expr::literal(false))))
    }
}
