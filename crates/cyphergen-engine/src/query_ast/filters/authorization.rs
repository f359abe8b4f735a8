//! `@authorization` filter and validate rules.

use cyphergen_adapters::cypher::{Clause, Expr};
use cyphergen_common::utils::error::Result;

use super::Filter;
use super::property::{FilterOperator, FilterValue, compare, jwt_claim};
use crate::query_ast::context::QueryAstContext;

/// How failing rules take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationKind {
    /// Rows that match no rule are dropped.
    Filter,
    /// Rows that match no rule abort the query with the forbidden error.
    Validate,
}

/// One rule: an optional authentication requirement plus its `where`.
#[derive(Debug)]
pub struct AuthorizationRule<'a> {
    /// Require `$isAuthenticated`.
    pub require_authentication: bool,
    /// `where: { node: ..., jwt: ... }`
    pub inner: Option<Box<Filter<'a>>>,
}

/// The rules of one entity or attribute for one operation; a row passes if
/// any rule holds.
#[derive(Debug)]
pub struct AuthorizationFilter<'a> {
    /// Filter or validate.
    pub kind: AuthorizationKind,
    /// The rules, combined with `OR`.
    pub rules: Vec<AuthorizationRule<'a>>,
}

impl AuthorizationFilter<'_> {
    pub(crate) fn requires_subqueries(&self) -> bool {
        self.rules
            .iter()
            .filter_map(|rule| rule.inner.as_deref())
            .any(Filter::requires_subqueries)
    }

    pub(crate) fn get_subqueries(&self, ctx: &QueryAstContext<'_>) -> Result<Vec<Clause>> {
        let mut clauses = Vec::new();
        for inner in self.rules.iter().filter_map(|rule| rule.inner.as_deref()) {
            clauses.extend(inner.get_subqueries(ctx)?);
        }
        Ok(clauses)
    }

    pub(crate) fn get_predicate(&self, ctx: &QueryAstContext<'_>) -> Result<Option<Expr>> {
        let mut alternatives = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let mut parts = Vec::new();
            if rule.require_authentication {
                parts.push(Expr::from(ctx.is_authenticated_param()).eq(Expr::literal(true)));
            }
            if let Some(inner) = &rule.inner {
                parts.extend(inner.get_predicate(ctx)?);
            }
            alternatives.push(Expr::and_all(parts).unwrap_or_else(|| Expr::literal(true)));
        }
        let Some(passes) = Expr::or_all(alternatives) else {
            return Ok(None);
        };
        Ok(Some(match self.kind {
            AuthorizationKind::Filter => passes,
            AuthorizationKind::Validate => validate_predicate(ctx, passes),
        }))
    }
}

/// `apoc.util.validatePredicate(NOT (passes), "<forbidden>", [0])`
pub(crate) fn validate_predicate(ctx: &QueryAstContext<'_>, passes: Expr) -> Expr {
    Expr::function(
        "apoc.util.validatePredicate",
        vec![
            passes.not(),
            Expr::literal(ctx.translation().config.forbidden_message.as_str()),
            Expr::List(vec![Expr::literal(0)]),
        ],
    )
}

/// Compares a JWT claim: `where: { jwt: { roles_INCLUDES: "admin" } }`.
#[derive(Debug)]
pub struct JwtFilter {
    /// Dotted claim path.
    pub path: String,
    /// The comparison.
    pub operator: FilterOperator,
    /// The compared value.
    pub value: FilterValue,
}

impl JwtFilter {
    pub(crate) fn get_predicate(&self, ctx: &QueryAstContext<'_>) -> Result<Option<Expr>> {
        let claim = jwt_claim(ctx, &self.path);
        let comparison = compare(ctx, &self.path, claim.clone(), None, self.operator, &self.value)?;
        Ok(Some(match self.operator {
            FilterOperator::Includes | FilterOperator::NotIncludes => Expr::And(vec![
                claim.is_not_null(),
                comparison,
            ]),
            _ => comparison,
        }))
    }
}
