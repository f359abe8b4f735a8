//! Filter nodes.
//!
//! Every filter answers two questions in the scope of a
//! [`QueryAstContext`]: which subqueries must run before its predicate can be
//! evaluated ([`Filter::get_subqueries`]), and what the predicate is
//! ([`Filter::get_predicate`]). Subqueries always come first; a filter that
//! contributes nothing returns no predicate.

mod aggregation;
mod authorization;
mod cypher;
mod logical;
mod property;
mod quantifier;
mod relationship;
mod typename;

use cyphergen_adapters::cypher::{Clause, Expr};
use cyphergen_common::utils::error::Result;

use super::ExplainNode;
use super::context::QueryAstContext;

pub use aggregation::{
    AggregationFilter, AggregationFunction, AggregationLeaf, AggregationPredicate,
    AggregationSubject, supports_length,
};
pub use authorization::{AuthorizationFilter, AuthorizationKind, AuthorizationRule, JwtFilter};
pub use cypher::CypherFilter;
pub use logical::{LogicalFilter, LogicalOperator};
pub use property::{FilterOperator, FilterValue, PropertyFilter};
pub use quantifier::RelationshipQuantifier;
pub use relationship::{ConnectionFilter, RelationshipFilter};
pub use typename::TypenameFilter;

/// A filter node.
#[derive(Debug)]
pub enum Filter<'a> {
    /// Attribute comparison.
    Property(PropertyFilter<'a>),
    /// `AND` / `OR` / `NOT`.
    Logical(LogicalFilter<'a>),
    /// Quantified filter on related nodes.
    Relationship(RelationshipFilter<'a>),
    /// Quantified filter on edges.
    Connection(ConnectionFilter<'a>),
    /// Filter on aggregates over a relationship.
    Aggregation(AggregationFilter<'a>),
    /// Comparison on a `@cypher` attribute.
    Cypher(CypherFilter<'a>),
    /// `typename_IN`.
    Typename(TypenameFilter),
    /// `@authorization` rules.
    Authorization(AuthorizationFilter<'a>),
    /// JWT claim comparison inside an authorization rule.
    Jwt(JwtFilter),
}

impl<'a> Filter<'a> {
    /// Conjunction of `filters`, or `None` when there are none.
    #[must_use]
    pub fn and(mut filters: Vec<Filter<'a>>) -> Option<Filter<'a>> {
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::Logical(LogicalFilter::new(LogicalOperator::And, filters))),
        }
    }

    /// Returns `true` if the filter needs a subquery before its predicate.
    #[must_use]
    pub fn requires_subqueries(&self) -> bool {
        match self {
            Filter::Aggregation(_) | Filter::Cypher(_) => true,
            Filter::Logical(logical) => logical.children.iter().any(Filter::requires_subqueries),
            Filter::Relationship(filter) => {
                filter.inner.as_deref().is_some_and(Filter::requires_subqueries)
            }
            Filter::Connection(filter) => {
                filter.inner.as_deref().is_some_and(Filter::requires_subqueries)
            }
            Filter::Authorization(filter) => filter.requires_subqueries(),
            Filter::Property(_) | Filter::Typename(_) | Filter::Jwt(_) => false,
        }
    }

    /// Clauses that must run before the predicate is evaluated.
    pub fn get_subqueries(&self, ctx: &QueryAstContext<'_>) -> Result<Vec<Clause>> {
        match self {
            Filter::Logical(filter) => filter.get_subqueries(ctx),
            Filter::Relationship(filter) => filter.get_subqueries(ctx),
            Filter::Connection(filter) => filter.get_subqueries(ctx),
            Filter::Aggregation(filter) => filter.get_subqueries(ctx),
            Filter::Cypher(filter) => filter.get_subqueries(ctx),
            Filter::Authorization(filter) => filter.get_subqueries(ctx),
            Filter::Property(_) | Filter::Typename(_) | Filter::Jwt(_) => Ok(Vec::new()),
        }
    }

    /// The predicate, if the filter contributes one.
    pub fn get_predicate(&self, ctx: &QueryAstContext<'_>) -> Result<Option<Expr>> {
        match self {
            Filter::Property(filter) => filter.get_predicate(ctx),
            Filter::Logical(filter) => filter.get_predicate(ctx),
            Filter::Relationship(filter) => filter.get_predicate(ctx),
            Filter::Connection(filter) => filter.get_predicate(ctx),
            Filter::Aggregation(filter) => filter.get_predicate(ctx),
            Filter::Cypher(filter) => filter.get_predicate(ctx),
            Filter::Typename(filter) => filter.get_predicate(ctx),
            Filter::Authorization(filter) => filter.get_predicate(ctx),
            Filter::Jwt(filter) => filter.get_predicate(ctx),
        }
    }

    /// Explain tree node.
    #[must_use]
    pub fn explain(&self) -> ExplainNode {
        match self {
            Filter::Property(filter) => ExplainNode::new("PropertyFilter")
                .prop("field", &filter.attribute.name)
                .prop("operator", format!("{:?}", filter.operator)),
            Filter::Logical(filter) => ExplainNode::new("LogicalFilter")
                .prop("operator", format!("{:?}", filter.operator))
                .inputs(filter.children.iter().map(Filter::explain)),
            Filter::Relationship(filter) => ExplainNode::new("RelationshipFilter")
                .prop("relationship", &filter.relationship.name)
                .prop("quantifier", filter.quantifier.as_str())
                .inputs(filter.inner.as_deref().map(Filter::explain)),
            Filter::Connection(filter) => ExplainNode::new("ConnectionFilter")
                .prop("relationship", &filter.relationship.name)
                .prop("quantifier", filter.quantifier.as_str())
                .inputs(filter.inner.as_deref().map(Filter::explain)),
            Filter::Aggregation(filter) => {
                ExplainNode::new("AggregationFilter").prop("relationship", &filter.relationship.name)
            }
            Filter::Cypher(filter) => {
                ExplainNode::new("CypherFilter").prop("field", &filter.attribute.name)
            }
            Filter::Typename(filter) => {
                ExplainNode::new("TypenameFilter").prop("accepted", filter.accepted.len().to_string())
            }
            Filter::Authorization(filter) => ExplainNode::new("AuthorizationFilter")
                .prop("kind", format!("{:?}", filter.kind))
                .inputs(
                    filter
                        .rules
                        .iter()
                        .filter_map(|rule| rule.inner.as_deref())
                        .map(Filter::explain),
                ),
            Filter::Jwt(filter) => ExplainNode::new("JwtFilter").prop("claim", &filter.path),
        }
    }
}

/// Subqueries of every filter, in order.
pub fn subqueries_of(filters: &[Filter<'_>], ctx: &QueryAstContext<'_>) -> Result<Vec<Clause>> {
    let mut clauses = Vec::new();
    for filter in filters {
        clauses.extend(filter.get_subqueries(ctx)?);
    }
    Ok(clauses)
}

/// Conjunction of the predicates of every filter.
pub fn predicate_of(filters: &[Filter<'_>], ctx: &QueryAstContext<'_>) -> Result<Option<Expr>> {
    let mut predicates = Vec::new();
    for filter in filters {
        predicates.extend(filter.get_predicate(ctx)?);
    }
    Ok(Expr::and_all(predicates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TranslationContext;
    use crate::query_ast::PropertyTarget;
    use crate::query_ast::context::QueryAstEnv;
    use cyphergen_adapters::cypher::{Labels, build, build_expr};
    use cyphergen_common::types::Value;
    use cyphergen_core::schema::{Attribute, AttributeType, Relationship, RelationshipDirection};
    use proptest::prelude::*;

    fn name_filter<'a>(attribute: &'a Attribute, value: &str) -> Filter<'a> {
        Filter::Property(PropertyFilter {
            attribute,
            operator: FilterOperator::Eq,
            value: FilterValue::Value(Value::from(value)),
            target: PropertyTarget::Node,
        })
    }

    fn render(filters: &[Filter<'_>]) -> (String, String) {
        let env = QueryAstEnv::new();
        let translation = TranslationContext::default();
        let ctx = QueryAstContext::new(&env, &translation).with_target(env.node_var());
        let subqueries = subqueries_of(filters, &ctx).unwrap();
        let predicate = predicate_of(filters, &ctx).unwrap().unwrap();
        let sub = build(&subqueries).cypher.split_whitespace().collect::<Vec<_>>().join(" ");
        (sub, build_expr(&predicate).cypher)
    }

    #[test]
    fn test_all_quantifier_shape() {
        let relationship = Relationship::new("actors", "ACTED_IN", RelationshipDirection::In, "Actor");
        let name = Attribute::new("name", AttributeType::string());
        let filter = Filter::Relationship(RelationshipFilter::new(
            &relationship,
            Labels::all(["Actor"]),
            RelationshipQuantifier::All,
            name_filter(&name, "Keanu"),
        ));
        let (_, predicate) = render(&[filter]);
        assert_eq!(
            predicate,
            "(EXISTS { MATCH (this0)<-[this1:ACTED_IN]-(this2:Actor) } AND NOT (EXISTS { MATCH (this0)<-[this1:ACTED_IN]-(this2:Actor) WHERE NOT (this2.name = $param0) }))"
        );
    }

    #[test]
    fn test_single_and_null_shapes() {
        let relationship = Relationship::new("actors", "ACTED_IN", RelationshipDirection::In, "Actor");
        let name = Attribute::new("name", AttributeType::string());
        let single = Filter::Relationship(RelationshipFilter::new(
            &relationship,
            Labels::all(["Actor"]),
            RelationshipQuantifier::Single,
            name_filter(&name, "Keanu"),
        ));
        assert_eq!(
            render(&[single]).1,
            "single(var3 IN [(this0)<-[this1:ACTED_IN]-(this2:Actor) WHERE this2.name = $param0 | 1] WHERE true)"
        );

        let null = Filter::Relationship(RelationshipFilter::null(
            &relationship,
            Labels::all(["Actor"]),
            RelationshipQuantifier::Some,
        ));
        assert_eq!(
            render(&[null]).1,
            "NOT (EXISTS { MATCH (this0)<-[this1:ACTED_IN]-(this2:Actor) })"
        );
    }

    #[test]
    fn test_nested_subquery_uses_count_form() {
        let relationship = Relationship::new("actors", "ACTED_IN", RelationshipDirection::In, "Actor");
        let rank = Attribute::new("rank", AttributeType::string()).cypher("RETURN 1 AS r", "r");
        let Some(annotation) = rank.annotations.cypher.as_ref() else {
            panic!("cypher annotation missing");
        };
        let inner = Filter::Cypher(CypherFilter::new(
            &rank,
            annotation,
            FilterOperator::Eq,
            FilterValue::Value(Value::from("a")),
        ));
        let filter = Filter::Relationship(RelationshipFilter::new(
            &relationship,
            Labels::all(["Actor"]),
            RelationshipQuantifier::None,
            inner,
        ));
        assert!(filter.requires_subqueries());
        let (subqueries, predicate) = render(&[filter]);
        assert!(subqueries.starts_with(
            "CALL { WITH this0 MATCH (this0)<-[this1:ACTED_IN]-(this2:Actor) CALL { WITH this2"
        ));
        assert!(subqueries.ends_with("RETURN count(CASE WHEN var3 = $param0 THEN 1 END) = 0 AS var4 }"));
        assert_eq!(predicate, "var4 = true");
    }

    fn quantifier() -> impl Strategy<Value = RelationshipQuantifier> {
        prop_oneof![
            Just(RelationshipQuantifier::Some),
            Just(RelationshipQuantifier::All),
            Just(RelationshipQuantifier::None),
            Just(RelationshipQuantifier::Single),
        ]
    }

    proptest! {
        #[test]
        fn relationship_and_connection_filters_agree(
            quantifier in quantifier(),
            value in "[a-z]{1,8}",
        ) {
            let relationship = Relationship::new("actors", "ACTED_IN", RelationshipDirection::In, "Actor");
            let name = Attribute::new("name", AttributeType::string());

            let via_relationship = Filter::Relationship(RelationshipFilter::new(
                &relationship,
                Labels::all(["Actor"]),
                quantifier,
                name_filter(&name, &value),
            ));
            let via_connection = Filter::Connection(ConnectionFilter::new(
                &relationship,
                Labels::all(["Actor"]),
                quantifier,
                name_filter(&name, &value),
            ));
            prop_assert_eq!(render(&[via_relationship]), render(&[via_connection]));
        }

        #[test]
        fn nested_and_is_flattened(values in proptest::collection::vec("[a-z]{1,6}", 2..5)) {
            let name = Attribute::new("name", AttributeType::string());
            let flat = Filter::Logical(LogicalFilter::new(
                LogicalOperator::And,
                values.iter().map(|v| name_filter(&name, v)).collect(),
            ));
            let nested = Filter::Logical(LogicalFilter::new(
                LogicalOperator::And,
                vec![Filter::Logical(LogicalFilter::new(
                    LogicalOperator::And,
                    values.iter().map(|v| name_filter(&name, v)).collect(),
                ))],
            ));
            prop_assert_eq!(render(&[flat]), render(&[nested]));
        }
    }
}
