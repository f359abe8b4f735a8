use cyphergen_adapters::cypher::{
    Clause, Expr, OrderBy, Projection, ReturnClause, SortDirection, Variable, WithClause,
};
use cyphergen_common::utils::error::{InputError, Result};
use cyphergen_core::schema::Attribute;

use crate::query_ast::PropertyTarget;

/// One aggregate requested on an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationSelection {
    /// Shortest string.
    Shortest,
    /// Longest string.
    Longest,
    /// Minimum.
    Min,
    /// Maximum.
    Max,
    /// Mean.
    Average,
    /// Sum.
    Sum,
}

impl AggregationSelection {
    /// Parses a selection name such as `shortest` or `average`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "shortest" => AggregationSelection::Shortest,
            "longest" => AggregationSelection::Longest,
            "min" => AggregationSelection::Min,
            "max" => AggregationSelection::Max,
            "average" => AggregationSelection::Average,
            "sum" => AggregationSelection::Sum,
            _ => return None,
        })
    }
}

/// `count`
#[derive(Debug)]
pub struct CountField {
    /// Output key.
    pub alias: String,
}

/// `title { shortest longest }` inside an aggregate selection.
#[derive(Debug)]
pub struct AggregationAttributeField<'a> {
    /// Output key.
    pub alias: String,
    /// The attribute.
    pub attribute: &'a Attribute,
    /// Node or edge.
    pub target: PropertyTarget,
    /// Requested aggregates with their output keys, in request order.
    pub selections: Vec<(String, AggregationSelection)>,
}

impl AggregationAttributeField<'_> {
    /// Clauses that end with `RETURN {...} AS column`, computing the
    /// requested aggregates of `subject`'s attribute.
    pub(crate) fn aggregate_clauses(&self, subject: &Variable, column: &Variable) -> Result<Vec<Clause>> {
        let property = subject.property(self.attribute.database_name());
        let is_string = self.attribute.attribute_type.is_string();
        let mut clauses = Vec::new();
        let list = Variable::named("list");

        let uses_length = self.selections.iter().any(|(_, s)| {
            matches!(s, AggregationSelection::Shortest | AggregationSelection::Longest)
        });
        if uses_length {
            if !is_string {
                return Err(InputError::invalid_argument(
                    &self.alias,
                    "shortest and longest apply to string fields only",
                )
                .into());
            }
            let mut order = WithClause::vars([subject]);
            order.order_by.push(OrderBy {
                expr: Expr::size(property.clone()),
                direction: SortDirection::Desc,
            });
            clauses.push(Clause::With(order));
            clauses.push(Clause::With(WithClause::items(vec![Projection::aliased(
                Expr::collect(property.clone()),
                &list,
            )])));
        }

        let entries = self
            .selections
            .iter()
            .map(|(alias, selection)| {
                let value = match selection {
                    AggregationSelection::Longest => Expr::head(list.expr()),
                    AggregationSelection::Shortest => Expr::function("last", vec![list.expr()]),
                    AggregationSelection::Min => Expr::function("min", vec![property.clone()]),
                    AggregationSelection::Max => Expr::function("max", vec![property.clone()]),
                    AggregationSelection::Average => Expr::function("avg", vec![property.clone()]),
                    AggregationSelection::Sum => Expr::function("sum", vec![property.clone()]),
                };
                (alias.clone(), value)
            })
            .collect::<Vec<_>>();
        clauses.push(Clause::Return(ReturnClause::aliased(Expr::Map(entries), column)));
        Ok(clauses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyphergen_adapters::cypher::build;
    use cyphergen_core::schema::{AttributeType, ScalarType};

    #[test]
    fn test_only_requested_string_aggregates() {
        let title = Attribute::new("title", AttributeType::string());
        let field = AggregationAttributeField {
            alias: "title".into(),
            attribute: &title,
            target: PropertyTarget::Node,
            selections: vec![("shortest".into(), AggregationSelection::Shortest)],
        };
        let clauses = field
            .aggregate_clauses(&Variable::named("this0"), &Variable::named("var1"))
            .unwrap();
        let cypher = build(&clauses).cypher;
        assert_eq!(
            cypher,
            "WITH this0\nORDER BY size(this0.title) DESC\nWITH collect(this0.title) AS list\nRETURN {shortest: last(list)} AS var1"
        );
    }

    #[test]
    fn test_length_on_numbers_is_rejected() {
        let runtime = Attribute::new("runtime", AttributeType::Scalar(ScalarType::Int));
        let field = AggregationAttributeField {
            alias: "runtime".into(),
            attribute: &runtime,
            target: PropertyTarget::Node,
            selections: vec![("longest".into(), AggregationSelection::Longest)],
        };
        assert!(field
            .aggregate_clauses(&Variable::named("this0"), &Variable::named("var1"))
            .is_err());
    }
}
