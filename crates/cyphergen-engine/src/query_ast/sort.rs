//! `ORDER BY` items.

use std::cell::OnceCell;

use cyphergen_adapters::cypher::{Clause, Expr, MapItem, OrderBy, SortDirection, Variable};
use cyphergen_common::utils::error::{Error, Result};
use cyphergen_core::schema::{Attribute, CypherAnnotation};
use indexmap::IndexMap;

use super::PropertyTarget;
use super::context::QueryAstContext;
use super::selection::cypher_scalar_call;

/// One `ORDER BY` item.
#[derive(Debug)]
pub enum Sort<'a> {
    /// A stored property.
    Property(PropertySort<'a>),
    /// A `@cypher` attribute, computed in a subquery.
    Cypher(CypherPropertySort<'a>),
    /// Index relevance score.
    Score(SortDirection),
}

/// Sorts by a stored property.
#[derive(Debug)]
pub struct PropertySort<'a> {
    /// The attribute.
    pub attribute: &'a Attribute,
    /// Direction.
    pub direction: SortDirection,
    /// Node or relationship.
    pub target: PropertyTarget,
}

/// Sorts by the value of a `@cypher` attribute.
#[derive(Debug)]
pub struct CypherPropertySort<'a> {
    /// The attribute.
    pub attribute: &'a Attribute,
    /// Its statement.
    pub annotation: &'a CypherAnnotation,
    /// Direction.
    pub direction: SortDirection,
    column: OnceCell<Variable>,
}

impl<'a> CypherPropertySort<'a> {
    /// Creates a sort on `attribute`.
    pub fn new(attribute: &'a Attribute, annotation: &'a CypherAnnotation, direction: SortDirection) -> Self {
        Self {
            attribute,
            annotation,
            direction,
            column: OnceCell::new(),
        }
    }

    fn column(&self, ctx: &QueryAstContext<'_>) -> &Variable {
        self.column.get_or_init(|| ctx.env().var())
    }
}

impl Sort<'_> {
    /// Returns `true` if the sort needs a subquery before paging.
    #[must_use]
    pub fn needs_subquery(&self) -> bool {
        matches!(self, Sort::Cypher(_))
    }

    /// Subqueries computing the sort value.
    pub fn get_subqueries(&self, ctx: &QueryAstContext<'_>) -> Result<Vec<Clause>> {
        let Sort::Cypher(sort) = self else {
            return Ok(Vec::new());
        };
        let column = sort.column(ctx);
        let call = cypher_scalar_call(ctx, sort.annotation, &IndexMap::new(), column, false)?;
        Ok(vec![call])
    }

    /// The `ORDER BY` items in scope of `ctx`.
    pub fn get_sort_fields(
        &self,
        ctx: &QueryAstContext<'_>,
        score: Option<&Variable>,
    ) -> Result<Vec<OrderBy>> {
        let (expr, direction) = match self {
            Sort::Property(sort) => {
                let subject = match sort.target {
                    PropertyTarget::Node => ctx.target()?,
                    PropertyTarget::Edge => ctx.relationship().ok_or_else(|| {
                        Error::internal("edge sort outside of a relationship scope")
                    })?,
                };
                (subject.property(sort.attribute.database_name()), sort.direction)
            }
            Sort::Cypher(sort) => (sort.column(ctx).expr(), sort.direction),
            Sort::Score(direction) => {
                let score =
                    score.ok_or_else(|| Error::internal("score sort without a score column"))?;
                (score.expr(), *direction)
            }
        };
        Ok(vec![OrderBy { expr, direction }])
    }

    /// The `ORDER BY` items over projected maps, used after a `UNION`.
    ///
    /// `node` is the projected node map and `edge` the projected
    /// relationship properties map, if any.
    pub fn get_projection_sort_fields(&self, node: &Expr, edge: Option<&Expr>) -> Result<Vec<OrderBy>> {
        let (expr, direction) = match self {
            Sort::Property(PropertySort {
                attribute,
                direction,
                target: PropertyTarget::Node,
            })
            | Sort::Cypher(CypherPropertySort {
                attribute,
                direction,
                ..
            }) => (node.clone().property(attribute.name.clone()), *direction),
            Sort::Property(PropertySort {
                attribute,
                direction,
                target: PropertyTarget::Edge,
            }) => {
                let edge = edge.ok_or_else(|| Error::internal("edge sort without edge properties"))?;
                (edge.clone().property(attribute.name.clone()), *direction)
            }
            Sort::Score(_) => {
                return Err(Error::internal("score sort over a composite projection"));
            }
        };
        Ok(vec![OrderBy { expr, direction }])
    }

    /// The projection entry a composite branch must carry so that
    /// [`Sort::get_projection_sort_fields`] can read the sort value.
    pub fn projection_entry(&self, ctx: &QueryAstContext<'_>, on: PropertyTarget) -> Result<Option<MapItem>> {
        let entry = match self {
            Sort::Property(sort) if sort.target == on => {
                let name = sort.attribute.name.clone();
                if sort.attribute.database_name() == name {
                    MapItem::Property(name)
                } else {
                    let subject = match on {
                        PropertyTarget::Node => ctx.target()?,
                        PropertyTarget::Edge => ctx.relationship().ok_or_else(|| {
                            Error::internal("edge sort outside of a relationship scope")
                        })?,
                    };
                    MapItem::Entry(name, subject.property(sort.attribute.database_name()))
                }
            }
            Sort::Cypher(sort) if on == PropertyTarget::Node => {
                MapItem::Entry(sort.attribute.name.clone(), sort.column(ctx).expr())
            }
            _ => return Ok(None),
        };
        Ok(Some(entry))
    }

    /// GraphQL name of the sorted field.
    #[must_use]
    pub fn field_name(&self) -> &str {
        match self {
            Sort::Property(sort) => &sort.attribute.name,
            Sort::Cypher(sort) => &sort.attribute.name,
            Sort::Score(_) => "score",
        }
    }
}
