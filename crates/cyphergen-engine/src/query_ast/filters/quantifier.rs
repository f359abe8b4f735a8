//! Quantified traversal predicates.
//!
//! Relationship filters (`actors_ALL`) and connection filters
//! (`actorsConnection_ALL`) both reduce to "some/all/none/exactly one of the
//! related nodes match". Both build their Cypher here so the two spellings
//! stay identical.

use std::cell::OnceCell;

use cyphergen_adapters::cypher::{
    BinaryOp, CallImports, Clause, Expr, Labels, MatchClause, Pattern, Quantifier, ReturnClause,
    Variable,
};
use cyphergen_common::utils::error::Result;
use cyphergen_core::schema::Relationship;

use super::Filter;
use crate::query_ast::context::QueryAstContext;
use crate::query_ast::selection::traversal_pattern;

/// How many related nodes must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipQuantifier {
    /// At least one.
    Some,
    /// Every one, and there is at least one.
    All,
    /// None.
    None,
    /// Exactly one.
    Single,
}

impl RelationshipQuantifier {
    /// Parses `SOME`, `ALL`, `NONE`, `SINGLE`; `NOT` is the deprecated `NONE`.
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "SOME" => RelationshipQuantifier::Some,
            "ALL" => RelationshipQuantifier::All,
            "NONE" | "NOT" => RelationshipQuantifier::None,
            "SINGLE" => RelationshipQuantifier::Single,
            _ => return None,
        })
    }

    /// Upper-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipQuantifier::Some => "SOME",
            RelationshipQuantifier::All => "ALL",
            RelationshipQuantifier::None => "NONE",
            RelationshipQuantifier::Single => "SINGLE",
        }
    }
}

/// Variables a traversal filter allocates once and reuses across
/// `get_subqueries` and `get_predicate`.
#[derive(Debug, Default)]
pub(crate) struct TraversalVars {
    scope: OnceCell<(Variable, Variable)>,
    result: OnceCell<Variable>,
}

/// One quantified traversal from the current target.
pub(crate) struct QuantifiedTraversal<'f, 'a> {
    pub relationship: &'a Relationship,
    pub labels: &'f Labels,
    pub quantifier: RelationshipQuantifier,
    /// `None` together with `is_null` compares the relationship to null.
    pub inner: Option<&'f Filter<'a>>,
    pub is_null: bool,
    pub vars: &'f TraversalVars,
}

fn count_when(predicate: Expr) -> Expr {
    Expr::count(Expr::Case {
        branches: vec![(predicate, Expr::literal(1))],
        otherwise: None,
    })
}

impl<'a> QuantifiedTraversal<'_, 'a> {
    fn scope<'e>(&self, ctx: &QueryAstContext<'e>) -> Result<(Variable, Pattern, QueryAstContext<'e>)> {
        let source = ctx.target()?.clone();
        let env = ctx.env();
        let (relationship, target) = self
            .vars
            .scope
            .get_or_init(|| (env.node_var(), env.node_var()));
        let pattern = traversal_pattern(
            &source,
            self.relationship,
            Some(relationship.clone()),
            target,
            self.labels.clone(),
        );
        let nested = ctx.push(Some(relationship.clone()), target.clone());
        Ok((source, pattern, nested))
    }

    fn uses_subquery(&self) -> bool {
        !self.is_null && self.inner.is_some_and(Filter::requires_subqueries)
    }

    /// `CALL { WITH this0 MATCH ... RETURN count(...) > 0 AS var3 }` when the
    /// inner filters need subqueries of their own, otherwise nothing.
    pub fn get_subqueries(&self, ctx: &QueryAstContext<'_>) -> Result<Vec<Clause>> {
        if !self.uses_subquery() {
            return Ok(Vec::new());
        }
        let (source, pattern, nested) = self.scope(ctx)?;
        let mut body = vec![Clause::Match(MatchClause::new(pattern))];
        let mut predicate = Expr::literal(true);
        if let Some(inner) = self.inner {
            body.extend(inner.get_subqueries(&nested)?);
            if let Some(inner) = inner.get_predicate(&nested)? {
                predicate = inner;
            }
        }

        let result = self.vars.result.get_or_init(|| ctx.env().var());
        let aggregate = match self.quantifier {
            RelationshipQuantifier::Some => {
                count_when(predicate).binary(BinaryOp::Gt, Expr::literal(0))
            }
            RelationshipQuantifier::None => count_when(predicate).eq(Expr::literal(0)),
            RelationshipQuantifier::Single => count_when(predicate).eq(Expr::literal(1)),
            RelationshipQuantifier::All => Expr::And(vec![
                Expr::count(nested.target()?).binary(BinaryOp::Gt, Expr::literal(0)),
                count_when(predicate.not()).eq(Expr::literal(0)),
            ]),
        };
        body.push(Clause::Return(ReturnClause::aliased(aggregate, result)));
        Ok(vec![Clause::call(CallImports::var(&source), body)])
    }

    /// The predicate in the scope of `ctx`.
    pub fn get_predicate(&self, ctx: &QueryAstContext<'_>) -> Result<Option<Expr>> {
        if self.uses_subquery() {
            let result = self.vars.result.get_or_init(|| ctx.env().var());
            return Ok(Some(result.expr().eq(Expr::literal(true))));
        }
        let (_, pattern, nested) = self.scope(ctx)?;
        if self.is_null {
            let exists = Expr::exists(pattern, None);
            return Ok(Some(if self.quantifier == RelationshipQuantifier::None {
                exists
            } else {
                exists.not()
            }));
        }

        let inner = match self.inner {
            Some(inner) => inner.get_predicate(&nested)?,
            None => None,
        };
        let predicate = match self.quantifier {
            RelationshipQuantifier::Some => Expr::exists(pattern, inner),
            RelationshipQuantifier::None => Expr::exists(pattern, inner).not(),
            RelationshipQuantifier::All => match inner {
                Some(inner) => Expr::And(vec![
                    Expr::exists(pattern.clone(), None),
                    Expr::exists(pattern, Some(inner.not())).not(),
                ]),
                None => Expr::exists(pattern, None),
            },
            RelationshipQuantifier::Single => {
                let item = ctx.env().var();
                Expr::Quantified {
                    quantifier: Quantifier::Single,
                    variable: item,
                    list: Box::new(Expr::PatternComprehension {
                        pattern: Box::new(pattern),
                        predicate: inner.map(Box::new),
                        map: Box::new(Expr::literal(1)),
                    }),
                    predicate: Box::new(Expr::literal(true)),
                }
            }
        };
        Ok(Some(predicate))
    }
}
