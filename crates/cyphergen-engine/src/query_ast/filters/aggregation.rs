//! `actorsAggregate: { count_GT: 1, node: { name_SHORTEST_LENGTH_LT: 4 } }`

use std::cell::OnceCell;

use cyphergen_adapters::cypher::{
    BinaryOp, CallImports, Clause, Expr, Labels, MatchClause, Projection, Quantifier, ReturnClause,
    Variable,
};
use cyphergen_common::types::Value;
use cyphergen_common::utils::error::{Error, Result};
use cyphergen_core::schema::{Attribute, AttributeType, Relationship};

use super::logical::LogicalOperator;
use crate::query_ast::PropertyTarget;
use crate::query_ast::context::QueryAstContext;
use crate::query_ast::selection::traversal_pattern;

/// Aggregate computed over the related values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationFunction {
    /// `min(size(x))`
    ShortestLength,
    /// `max(size(x))`
    LongestLength,
    /// `avg(size(x))`
    AverageLength,
    /// `min(x)`
    Min,
    /// `max(x)`
    Max,
    /// `sum(x)`
    Sum,
    /// `avg(x)`
    Average,
    /// Deprecated element-wise form: `any(v IN collect(x) WHERE v = $p)`.
    Any,
}

/// What a leaf aggregates.
#[derive(Debug)]
pub enum AggregationSubject<'a> {
    /// Number of related nodes.
    Count,
    /// An attribute of the related nodes or of the edges.
    Attribute {
        /// The attribute.
        attribute: &'a Attribute,
        /// Node or edge.
        target: PropertyTarget,
        /// The aggregate.
        function: AggregationFunction,
    },
}

/// One comparison against an aggregate; computed as a boolean column.
#[derive(Debug)]
pub struct AggregationLeaf<'a> {
    /// What is aggregated.
    pub subject: AggregationSubject<'a>,
    /// Comparison.
    pub operator: BinaryOp,
    /// Compared value.
    pub value: Value,
    column: OnceCell<Variable>,
}

impl<'a> AggregationLeaf<'a> {
    /// Creates a leaf.
    pub fn new(subject: AggregationSubject<'a>, operator: BinaryOp, value: Value) -> Self {
        Self {
            subject,
            operator,
            value,
            column: OnceCell::new(),
        }
    }
}

/// Boolean structure over aggregation leaves.
#[derive(Debug)]
pub enum AggregationPredicate<'a> {
    /// `AND`, `OR` or `NOT` over children.
    Logical(LogicalOperator, Vec<AggregationPredicate<'a>>),
    /// A single comparison.
    Leaf(AggregationLeaf<'a>),
}

impl<'a> AggregationPredicate<'a> {
    fn leaves(&self) -> Vec<&AggregationLeaf<'a>> {
        match self {
            AggregationPredicate::Leaf(leaf) => vec![leaf],
            AggregationPredicate::Logical(_, children) => {
                children.iter().flat_map(AggregationPredicate::leaves).collect()
            }
        }
    }

    fn predicate(&self) -> Result<Option<Expr>> {
        match self {
            AggregationPredicate::Leaf(leaf) => {
                let column = leaf
                    .column
                    .get()
                    .ok_or_else(|| Error::internal("aggregation filter predicate before subquery"))?;
                Ok(Some(column.expr().eq(Expr::literal(true))))
            }
            AggregationPredicate::Logical(operator, children) => {
                let mut predicates = Vec::new();
                for child in children {
                    predicates.extend(child.predicate()?);
                }
                Ok(match operator {
                    LogicalOperator::And => Expr::and_all(predicates),
                    LogicalOperator::Or => Expr::or_all(predicates),
                    LogicalOperator::Not => Expr::and_all(predicates).map(Expr::not),
                })
            }
        }
    }
}

/// Filters on aggregates over a relationship, computed in one subquery.
#[derive(Debug)]
pub struct AggregationFilter<'a> {
    /// The aggregated relationship.
    pub relationship: &'a Relationship,
    /// Labels of the related node.
    pub target_labels: Labels,
    /// The comparisons.
    pub predicate: AggregationPredicate<'a>,
}

fn aggregate(
    ctx: &QueryAstContext<'_>,
    leaf: &AggregationLeaf<'_>,
    relationship: &Variable,
    target: &Variable,
) -> Expr {
    let env = ctx.env();
    let AggregationSubject::Attribute {
        attribute,
        target: owner,
        function,
    } = &leaf.subject
    else {
        let param = env.param(leaf.value.clone());
        return Expr::count(target).binary(leaf.operator, param);
    };

    let subject = match owner {
        PropertyTarget::Node => target,
        PropertyTarget::Edge => relationship,
    };
    let property = subject.property(attribute.database_name());
    let param: Expr = env.param(leaf.value.clone()).into();
    let param = match attribute.attribute_type.scalar().and_then(|s| s.temporal_function()) {
        Some(name) if matches!(function, AggregationFunction::Min | AggregationFunction::Max) => {
            Expr::function(name, vec![param])
        }
        _ => param,
    };
    let aggregated = match function {
        AggregationFunction::ShortestLength => Expr::function("min", vec![Expr::size(property)]),
        AggregationFunction::LongestLength => Expr::function("max", vec![Expr::size(property)]),
        AggregationFunction::AverageLength => Expr::function("avg", vec![Expr::size(property)]),
        AggregationFunction::Min => Expr::function("min", vec![property]),
        AggregationFunction::Max => Expr::function("max", vec![property]),
        AggregationFunction::Sum => Expr::function("sum", vec![property]),
        AggregationFunction::Average => Expr::function("avg", vec![property]),
        AggregationFunction::Any => {
            let item = env.var();
            return Expr::Quantified {
                quantifier: Quantifier::Any,
                list: Box::new(Expr::collect(property)),
                predicate: Box::new(item.expr().binary(leaf.operator, param)),
                variable: item,
            };
        }
    };
    aggregated.binary(leaf.operator, param)
}

impl AggregationFilter<'_> {
    pub(crate) fn get_subqueries(&self, ctx: &QueryAstContext<'_>) -> Result<Vec<Clause>> {
        let source = ctx.target()?;
        let env = ctx.env();
        let relationship = env.node_var();
        let target = env.node_var();
        let pattern = traversal_pattern(
            source,
            self.relationship,
            Some(relationship.clone()),
            &target,
            self.target_labels.clone(),
        );

        let mut items = Vec::new();
        for leaf in self.predicate.leaves() {
            let expr = aggregate(ctx, leaf, &relationship, &target);
            let column = leaf.column.get_or_init(|| env.var());
            items.push(Projection::aliased(expr, column));
        }
        let body = vec![
            Clause::Match(MatchClause::new(pattern)),
            Clause::Return(ReturnClause {
                items,
                ..ReturnClause::default()
            }),
        ];
        Ok(vec![Clause::call(CallImports::var(source), body)])
    }

    pub(crate) fn get_predicate(&self, _ctx: &QueryAstContext<'_>) -> Result<Option<Expr>> {
        self.predicate.predicate()
    }
}

/// Returns `true` if `attribute` supports the length aggregates.
#[must_use]
pub fn supports_length(attribute_type: &AttributeType) -> bool {
    attribute_type.is_string() && !attribute_type.is_list()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TranslationContext;
    use crate::query_ast::context::QueryAstEnv;
    use cyphergen_adapters::cypher::build;
    use cyphergen_core::schema::RelationshipDirection;

    #[test]
    fn test_one_column_per_leaf() {
        let relationship = Relationship::new("actors", "ACTED_IN", RelationshipDirection::In, "Actor");
        let name = Attribute::new("name", AttributeType::string());
        let filter = AggregationFilter {
            relationship: &relationship,
            target_labels: Labels::all(["Actor"]),
            predicate: AggregationPredicate::Logical(
                LogicalOperator::And,
                vec![
                    AggregationPredicate::Leaf(AggregationLeaf::new(
                        AggregationSubject::Count,
                        BinaryOp::Gt,
                        Value::from(1),
                    )),
                    AggregationPredicate::Leaf(AggregationLeaf::new(
                        AggregationSubject::Attribute {
                            attribute: &name,
                            target: PropertyTarget::Node,
                            function: AggregationFunction::ShortestLength,
                        },
                        BinaryOp::Lt,
                        Value::from(4),
                    )),
                ],
            ),
        };

        let env = QueryAstEnv::new();
        let translation = TranslationContext::default();
        let ctx = QueryAstContext::new(&env, &translation).with_target(env.node_var());
        let subqueries = filter.get_subqueries(&ctx).unwrap();
        let predicate = filter.get_predicate(&ctx).unwrap().unwrap();

        let cypher = build(&subqueries).cypher;
        let normalized = cypher.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(
            normalized,
            "CALL { WITH this0 MATCH (this0)<-[this1:ACTED_IN]-(this2:Actor) RETURN count(this2) > $param0 AS var3, min(size(this2.name)) < $param1 AS var4 }"
        );
        assert_eq!(
            cyphergen_adapters::cypher::build_expr(&predicate).cypher,
            "(var3 = true AND var4 = true)"
        );
    }
}
