use cyphergen_adapters::cypher::{
    CallImports, Clause, Expr, Labels, MatchClause, NodePattern, Pattern, Projection, ReturnClause,
    UnionClause, Variable, append_where,
};
use cyphergen_common::utils::error::{Error, Result};
use cyphergen_core::schema::{ConcreteEntity, Relationship};

use super::OperationTranspileResult;
use crate::query_ast::context::QueryAstContext;
use crate::query_ast::fields::Field;
use crate::query_ast::filters::{Filter, predicate_of, subqueries_of};
use crate::query_ast::selection::traversal_pattern;
use crate::query_ast::{ExplainNode, PropertyTarget};

/// What is aggregated.
#[derive(Debug)]
pub enum AggregationSource<'a> {
    /// Nodes of the given entities; more than one are unioned first.
    Nodes(Vec<&'a ConcreteEntity>),
    /// Nodes related to the parent.
    Relationship {
        /// The traversed relationship.
        relationship: &'a Relationship,
        /// Labels of the aggregated nodes.
        target_labels: Labels,
    },
}

/// One key of the aggregate response.
#[derive(Debug)]
pub enum AggregationEntry<'a> {
    /// `count` or an attribute aggregate.
    Field(Field<'a>),
    /// `node { ... }` or `edge { ... }`.
    Group {
        /// Output key.
        alias: String,
        /// Aggregates inside the group.
        fields: Vec<Field<'a>>,
    },
}

/// Aggregates over matched nodes, one `CALL` per aggregated field.
#[derive(Debug)]
pub struct AggregationOperation<'a> {
    /// What is aggregated.
    pub source: AggregationSource<'a>,
    /// `where` and authorization filters.
    pub filters: Vec<Filter<'a>>,
    /// Requested keys, in request order.
    pub entries: Vec<AggregationEntry<'a>>,
}

impl AggregationOperation<'_> {
    pub(crate) fn transpile(&self, ctx: &QueryAstContext<'_>) -> Result<OperationTranspileResult> {
        let env = ctx.env();
        let relationship = match &self.source {
            AggregationSource::Relationship { .. } => {
                ctx.target()?;
                Some(env.node_var())
            }
            AggregationSource::Nodes(_) => None,
        };
        let inner = ctx.push(relationship, env.node_var());

        let mut clauses = Vec::new();
        let mut entries = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            match entry {
                AggregationEntry::Field(field) => {
                    let value = self.aggregate(field, ctx, &inner, &mut clauses)?;
                    entries.push((field.alias().to_string(), value));
                }
                AggregationEntry::Group { alias, fields } => {
                    let mut group = Vec::with_capacity(fields.len());
                    for field in fields {
                        let value = self.aggregate(field, ctx, &inner, &mut clauses)?;
                        group.push((field.alias().to_string(), value));
                    }
                    entries.push((alias.clone(), Expr::Map(group)));
                }
            }
        }

        let projection = Expr::Map(entries);
        if ctx.has_target() {
            return Ok(OperationTranspileResult {
                clauses,
                projection_expr: projection,
            });
        }
        let result = env.var();
        clauses.push(Clause::Return(ReturnClause::aliased(projection, &result)));
        Ok(OperationTranspileResult {
            clauses,
            projection_expr: result.expr(),
        })
    }

    /// Pushes the `CALL` computing `field` and returns its column.
    fn aggregate(
        &self,
        field: &Field<'_>,
        ctx: &QueryAstContext<'_>,
        inner: &QueryAstContext<'_>,
        clauses: &mut Vec<Clause>,
    ) -> Result<Expr> {
        let column = inner.env().var();
        let mut body = self.matching(ctx, inner)?;
        match field {
            Field::Count(_) => {
                body.push(Clause::Return(ReturnClause::aliased(
                    Expr::count(inner.target()?),
                    &column,
                )));
            }
            Field::AggregationAttribute(aggregate) => {
                let subject = match aggregate.target {
                    PropertyTarget::Node => inner.target()?,
                    PropertyTarget::Edge => inner.relationship().ok_or_else(|| {
                        Error::internal("edge aggregate outside of a relationship")
                    })?,
                };
                body.extend(aggregate.aggregate_clauses(subject, &column)?);
            }
            other => {
                return Err(Error::internal(format!(
                    "`{}` is not an aggregate field",
                    other.alias()
                )));
            }
        }
        let imports = match ctx.target() {
            Ok(parent) => CallImports::var(parent),
            Err(_) => CallImports::None,
        };
        clauses.push(Clause::call(imports, body));
        Ok(column.expr())
    }

    /// Clauses binding the aggregated nodes, filtered.
    fn matching(&self, ctx: &QueryAstContext<'_>, inner: &QueryAstContext<'_>) -> Result<Vec<Clause>> {
        let node = inner.target()?;
        let mut clauses = match &self.source {
            AggregationSource::Nodes(entities) => match entities.as_slice() {
                [entity] => vec![Clause::Match(MatchClause::new(node_pattern(node, entity)))],
                entities => {
                    let branches = entities
                        .iter()
                        .map(|entity| {
                            vec![
                                Clause::Match(MatchClause::new(node_pattern(node, entity))),
                                Clause::Return(ReturnClause {
                                    items: vec![Projection::var(node)],
                                    ..ReturnClause::default()
                                }),
                            ]
                        })
                        .collect();
                    vec![Clause::call(
                        CallImports::None,
                        vec![Clause::Union(UnionClause {
                            all: false,
                            branches,
                        })],
                    )]
                }
            },
            AggregationSource::Relationship {
                relationship,
                target_labels,
            } => vec![Clause::Match(MatchClause::new(traversal_pattern(
                ctx.target()?,
                relationship,
                inner.relationship().cloned(),
                node,
                target_labels.clone(),
            )))],
        };
        clauses.extend(subqueries_of(&self.filters, inner)?);
        if let Some(predicate) = predicate_of(&self.filters, inner)? {
            append_where(&mut clauses, predicate);
        }
        Ok(clauses)
    }

    pub(crate) fn explain(&self) -> ExplainNode {
        let source = match &self.source {
            AggregationSource::Nodes(entities) => entities
                .iter()
                .map(|entity| entity.name.as_str())
                .collect::<Vec<_>>()
                .join("|"),
            AggregationSource::Relationship { relationship, .. } => relationship.name.clone(),
        };
        let fields = self.entries.iter().flat_map(|entry| match entry {
            AggregationEntry::Field(field) => vec![field.explain()],
            AggregationEntry::Group { alias, fields } => vec![
                ExplainNode::new("AggregationGroup")
                    .prop("alias", alias)
                    .inputs(fields.iter().map(Field::explain)),
            ],
        });
        ExplainNode::new("AggregationOperation")
            .prop("source", source)
            .inputs(self.filters.iter().map(Filter::explain))
            .inputs(fields)
    }
}

fn node_pattern(node: &Variable, entity: &ConcreteEntity) -> Pattern {
    Pattern::node(NodePattern::new(
        node.clone(),
        Labels::all(entity.labels.iter().cloned()),
    ))
}
