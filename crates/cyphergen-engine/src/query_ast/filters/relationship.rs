use cyphergen_adapters::cypher::{Clause, Expr, Labels};
use cyphergen_common::utils::error::Result;
use cyphergen_core::schema::Relationship;

use super::Filter;
use super::quantifier::{QuantifiedTraversal, RelationshipQuantifier, TraversalVars};
use crate::query_ast::context::QueryAstContext;

/// `actors_SOME: { name: "Keanu" }` and friends.
#[derive(Debug)]
pub struct RelationshipFilter<'a> {
    /// The traversed relationship.
    pub relationship: &'a Relationship,
    /// Labels of the related node.
    pub target_labels: Labels,
    /// How many related nodes must match.
    pub quantifier: RelationshipQuantifier,
    /// Filters on the related node; absent for `actors: null`.
    pub inner: Option<Box<Filter<'a>>>,
    vars: TraversalVars,
}

impl<'a> RelationshipFilter<'a> {
    /// Filters on related nodes.
    pub fn new(
        relationship: &'a Relationship,
        target_labels: Labels,
        quantifier: RelationshipQuantifier,
        inner: Filter<'a>,
    ) -> Self {
        Self {
            relationship,
            target_labels,
            quantifier,
            inner: Some(Box::new(inner)),
            vars: TraversalVars::default(),
        }
    }

    /// Tests for the absence of any related node, or with
    /// [`RelationshipQuantifier::None`] for the presence of one.
    pub fn null(relationship: &'a Relationship, target_labels: Labels, quantifier: RelationshipQuantifier) -> Self {
        Self {
            relationship,
            target_labels,
            quantifier,
            inner: None,
            vars: TraversalVars::default(),
        }
    }

    fn traversal(&self) -> QuantifiedTraversal<'_, 'a> {
        QuantifiedTraversal {
            relationship: self.relationship,
            labels: &self.target_labels,
            quantifier: self.quantifier,
            inner: self.inner.as_deref(),
            is_null: self.inner.is_none(),
            vars: &self.vars,
        }
    }

    pub(crate) fn get_subqueries(&self, ctx: &QueryAstContext<'_>) -> Result<Vec<Clause>> {
        self.traversal().get_subqueries(ctx)
    }

    pub(crate) fn get_predicate(&self, ctx: &QueryAstContext<'_>) -> Result<Option<Expr>> {
        self.traversal().get_predicate(ctx)
    }
}

/// `actorsConnection_ALL: { node: {...}, edge: {...} }` and friends.
#[derive(Debug)]
pub struct ConnectionFilter<'a> {
    /// The traversed relationship.
    pub relationship: &'a Relationship,
    /// Labels of the related node.
    pub target_labels: Labels,
    /// How many edges must match.
    pub quantifier: RelationshipQuantifier,
    /// Node and edge filters, combined.
    pub inner: Option<Box<Filter<'a>>>,
    vars: TraversalVars,
}

impl<'a> ConnectionFilter<'a> {
    /// Filters on edges.
    pub fn new(
        relationship: &'a Relationship,
        target_labels: Labels,
        quantifier: RelationshipQuantifier,
        inner: Filter<'a>,
    ) -> Self {
        Self {
            relationship,
            target_labels,
            quantifier,
            inner: Some(Box::new(inner)),
            vars: TraversalVars::default(),
        }
    }

    /// Tests for the absence of any edge.
    pub fn null(relationship: &'a Relationship, target_labels: Labels, quantifier: RelationshipQuantifier) -> Self {
        Self {
            relationship,
            target_labels,
            quantifier,
            inner: None,
            vars: TraversalVars::default(),
        }
    }

    fn traversal(&self) -> QuantifiedTraversal<'_, 'a> {
        QuantifiedTraversal {
            relationship: self.relationship,
            labels: &self.target_labels,
            quantifier: self.quantifier,
            inner: self.inner.as_deref(),
            is_null: self.inner.is_none(),
            vars: &self.vars,
        }
    }

    pub(crate) fn get_subqueries(&self, ctx: &QueryAstContext<'_>) -> Result<Vec<Clause>> {
        self.traversal().get_subqueries(ctx)
    }

    pub(crate) fn get_predicate(&self, ctx: &QueryAstContext<'_>) -> Result<Option<Expr>> {
        self.traversal().get_predicate(ctx)
    }
}
