//! Comparisons on attribute values.

use cyphergen_adapters::cypher::{BinaryOp, Expr, Variable};
use cyphergen_common::types::Value;
use cyphergen_common::utils::error::{Error, InputError, Result};
use cyphergen_core::schema::{Attribute, AttributeType};

use crate::query_ast::PropertyTarget;
use crate::query_ast::context::QueryAstContext;

/// Comparison applied by a filter key suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// No suffix, or `_EQ`.
    Eq,
    /// `_NOT`
    Ne,
    /// `_IN`
    In,
    /// `_NOT_IN`
    NotIn,
    /// `_LT`
    Lt,
    /// `_LTE`
    Lte,
    /// `_GT`
    Gt,
    /// `_GTE`
    Gte,
    /// `_CONTAINS`
    Contains,
    /// `_NOT_CONTAINS`
    NotContains,
    /// `_STARTS_WITH`
    StartsWith,
    /// `_NOT_STARTS_WITH`
    NotStartsWith,
    /// `_ENDS_WITH`
    EndsWith,
    /// `_NOT_ENDS_WITH`
    NotEndsWith,
    /// `_MATCHES`
    Matches,
    /// `_INCLUDES`
    Includes,
    /// `_NOT_INCLUDES`
    NotIncludes,
    /// `_DISTANCE`
    Distance,
}

impl FilterOperator {
    /// Parses a key suffix without its leading underscore.
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "EQ" => FilterOperator::Eq,
            "NOT" => FilterOperator::Ne,
            "IN" => FilterOperator::In,
            "NOT_IN" => FilterOperator::NotIn,
            "LT" => FilterOperator::Lt,
            "LTE" => FilterOperator::Lte,
            "GT" => FilterOperator::Gt,
            "GTE" => FilterOperator::Gte,
            "CONTAINS" => FilterOperator::Contains,
            "NOT_CONTAINS" => FilterOperator::NotContains,
            "STARTS_WITH" => FilterOperator::StartsWith,
            "NOT_STARTS_WITH" => FilterOperator::NotStartsWith,
            "ENDS_WITH" => FilterOperator::EndsWith,
            "NOT_ENDS_WITH" => FilterOperator::NotEndsWith,
            "MATCHES" => FilterOperator::Matches,
            "INCLUDES" => FilterOperator::Includes,
            "NOT_INCLUDES" => FilterOperator::NotIncludes,
            "DISTANCE" => FilterOperator::Distance,
            _ => return None,
        })
    }

    /// Returns `true` if the operator only applies to strings.
    #[must_use]
    pub fn is_string_operator(self) -> bool {
        matches!(
            self,
            FilterOperator::Contains
                | FilterOperator::NotContains
                | FilterOperator::StartsWith
                | FilterOperator::NotStartsWith
                | FilterOperator::EndsWith
                | FilterOperator::NotEndsWith
                | FilterOperator::Matches
        )
    }

    /// The positive comparison and whether it is negated.
    fn split(self) -> (Self, bool) {
        match self {
            FilterOperator::Ne => (FilterOperator::Eq, true),
            FilterOperator::NotIn => (FilterOperator::In, true),
            FilterOperator::NotContains => (FilterOperator::Contains, true),
            FilterOperator::NotStartsWith => (FilterOperator::StartsWith, true),
            FilterOperator::NotEndsWith => (FilterOperator::EndsWith, true),
            FilterOperator::NotIncludes => (FilterOperator::Includes, true),
            other => (other, false),
        }
    }

    fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            FilterOperator::Eq | FilterOperator::Distance => BinaryOp::Eq,
            FilterOperator::Lt => BinaryOp::Lt,
            FilterOperator::Lte => BinaryOp::Lte,
            FilterOperator::Gt => BinaryOp::Gt,
            FilterOperator::Gte => BinaryOp::Gte,
            FilterOperator::Contains => BinaryOp::Contains,
            FilterOperator::StartsWith => BinaryOp::StartsWith,
            FilterOperator::EndsWith => BinaryOp::EndsWith,
            FilterOperator::Matches => BinaryOp::Matches,
            _ => return None,
        })
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// A client value, passed as a parameter.
    Value(Value),
    /// A JWT claim path such as `sub` or `roles`, from `"$jwt.sub"`.
    JwtClaim(String),
}

impl FilterValue {
    /// Recognizes `"$jwt.<path>"` strings inside authorization rules.
    #[must_use]
    pub fn from_rule_value(value: Value) -> Self {
        match value.as_str().and_then(|s| s.strip_prefix("$jwt.")) {
            Some(path) => FilterValue::JwtClaim(path.to_string()),
            None => FilterValue::Value(value),
        }
    }

    fn is_null(&self) -> bool {
        matches!(self, FilterValue::Value(Value::Null))
    }

    fn to_expr(&self, ctx: &QueryAstContext<'_>) -> Expr {
        match self {
            FilterValue::Value(value) => ctx.env().param(value.clone()).into(),
            FilterValue::JwtClaim(path) => Expr::function(
                "coalesce",
                vec![jwt_claim(ctx, path), ctx.jwt_default_param().into()],
            ),
        }
    }
}

/// `$jwt.a.b`
pub(crate) fn jwt_claim(ctx: &QueryAstContext<'_>, path: &str) -> Expr {
    path.split('.')
        .fold(Expr::from(ctx.jwt_param()), |expr, key| expr.property(key))
}

/// Builds `left <operator> value`, wrapping temporal and spatial values in
/// their Cypher constructors.
pub(crate) fn compare(
    ctx: &QueryAstContext<'_>,
    field: &str,
    left: Expr,
    attribute_type: Option<&AttributeType>,
    operator: FilterOperator,
    value: &FilterValue,
) -> Result<Expr> {
    let (positive, negated) = operator.split();
    if value.is_null() {
        return match positive {
            FilterOperator::Eq if negated => Ok(left.is_not_null()),
            FilterOperator::Eq => Ok(left.is_null()),
            _ => Err(InputError::invalid_where(field, "null is only allowed in equality filters").into()),
        };
    }

    let is_list = attribute_type.is_some_and(AttributeType::is_list);
    let is_point = attribute_type.is_some_and(AttributeType::is_point);
    let constructor = match attribute_type.and_then(AttributeType::scalar) {
        Some(scalar) => scalar.temporal_function(),
        None => None,
    }
    .or(if is_point { Some("point") } else { None });
    let wrap = |expr: Expr| match constructor {
        Some(name) => Expr::function(name, vec![expr]),
        None => expr,
    };

    let right = value.to_expr(ctx);
    let predicate = match positive {
        FilterOperator::In if is_list => {
            return Err(InputError::invalid_where(field, "`_IN` does not apply to list fields").into());
        }
        FilterOperator::In => match constructor {
            Some(name) => {
                let item = ctx.env().var();
                let converted = Expr::ListComprehension {
                    variable: item.clone(),
                    list: Box::new(right),
                    predicate: None,
                    map: Some(Box::new(Expr::function(name, vec![item.expr()]))),
                };
                left.in_list(converted)
            }
            None => left.in_list(right),
        },
        FilterOperator::Includes => wrap(right).in_list(left),
        FilterOperator::Lt | FilterOperator::Lte | FilterOperator::Gt | FilterOperator::Gte
            if is_point =>
        {
            point_distance(left, right, positive)?
        }
        FilterOperator::Distance if is_point => point_distance(left, right, FilterOperator::Eq)?,
        FilterOperator::Distance => {
            return Err(InputError::invalid_where(field, "`_DISTANCE` applies to points only").into());
        }
        FilterOperator::Eq if is_list => left.eq(right),
        other => {
            let op = other
                .binary_op()
                .ok_or_else(|| Error::internal(format!("no comparison for {other:?}")))?;
            let right = if other.is_string_operator() { right } else { wrap(right) };
            left.binary(op, right)
        }
    };
    Ok(if negated { predicate.not() } else { predicate })
}

/// `point.distance(left, point($p.point)) <op> $p.distance`
fn point_distance(left: Expr, right: Expr, operator: FilterOperator) -> Result<Expr> {
    let op = operator
        .binary_op()
        .ok_or_else(|| Error::internal("distance comparison without operator"))?;
    let distance = Expr::function(
        "point.distance",
        vec![left, Expr::function("point", vec![right.clone().property("point")])],
    );
    Ok(distance.binary(op, right.property("distance")))
}

/// Compares one attribute of the target node or of the traversed relationship.
#[derive(Debug)]
pub struct PropertyFilter<'a> {
    /// The attribute.
    pub attribute: &'a Attribute,
    /// The comparison.
    pub operator: FilterOperator,
    /// The compared value.
    pub value: FilterValue,
    /// Node or relationship.
    pub target: PropertyTarget,
}

impl PropertyFilter<'_> {
    pub(crate) fn subject<'c>(&self, ctx: &'c QueryAstContext<'_>) -> Result<&'c Variable> {
        match self.target {
            PropertyTarget::Node => ctx.target(),
            PropertyTarget::Edge => ctx
                .relationship()
                .ok_or_else(|| Error::internal("edge filter outside of a relationship scope")),
        }
    }

    /// `this0.title = $param0`
    pub fn get_predicate(&self, ctx: &QueryAstContext<'_>) -> Result<Option<Expr>> {
        let left = self.subject(ctx)?.property(self.attribute.database_name());
        compare(
            ctx,
            &self.attribute.name,
            left,
            Some(&self.attribute.attribute_type),
            self.operator,
            &self.value,
        )
        .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TranslationContext;
    use crate::query_ast::context::QueryAstEnv;
    use cyphergen_adapters::cypher::build_expr;
    use cyphergen_core::schema::ScalarType;

    fn render(attribute: &Attribute, operator: FilterOperator, value: FilterValue) -> String {
        let env = QueryAstEnv::new();
        let translation = TranslationContext::default();
        let ctx = QueryAstContext::new(&env, &translation).with_target(env.node_var());
        let filter = PropertyFilter {
            attribute,
            operator,
            value,
            target: PropertyTarget::Node,
        };
        let predicate = filter.get_predicate(&ctx).unwrap().unwrap();
        build_expr(&predicate).cypher
    }

    #[test]
    fn test_null_equality() {
        let title = Attribute::new("title", AttributeType::string());
        assert_eq!(
            render(&title, FilterOperator::Eq, FilterValue::Value(Value::Null)),
            "this0.title IS NULL"
        );
        assert_eq!(
            render(&title, FilterOperator::Ne, FilterValue::Value(Value::Null)),
            "this0.title IS NOT NULL"
        );
    }

    #[test]
    fn test_negated_string_operator() {
        let title = Attribute::new("title", AttributeType::string());
        assert_eq!(
            render(&title, FilterOperator::NotContains, FilterValue::Value("x".into())),
            "NOT (this0.title CONTAINS $param0)"
        );
    }

    #[test]
    fn test_temporal_values_are_wrapped() {
        let released = Attribute::new("released", AttributeType::Scalar(ScalarType::DateTime));
        assert_eq!(
            render(&released, FilterOperator::Gt, FilterValue::Value("2020-01-01T00:00:00Z".into())),
            "this0.released > datetime($param0)"
        );
        assert_eq!(
            render(&released, FilterOperator::In, FilterValue::Value(Value::List(vec![]))),
            "this0.released IN [var1 IN $param0 | datetime(var1)]"
        );
    }

    #[test]
    fn test_point_distance() {
        let location = Attribute::new("location", AttributeType::Scalar(ScalarType::Point));
        assert_eq!(
            render(&location, FilterOperator::Lt, FilterValue::Value(Value::empty_map())),
            "point.distance(this0.location, point($param0.point)) < $param0.distance"
        );
    }

    #[test]
    fn test_list_includes() {
        let tags = Attribute::new("tags", AttributeType::list_of(AttributeType::string()));
        assert_eq!(
            render(&tags, FilterOperator::Includes, FilterValue::Value("a".into())),
            "$param0 IN this0.tags"
        );
    }

    #[test]
    fn test_jwt_claim_value() {
        let owner = Attribute::new("owner", AttributeType::string());
        assert_eq!(
            render(&owner, FilterOperator::Eq, FilterValue::from_rule_value("$jwt.sub".into())),
            "this0.owner = coalesce($jwt.sub, $jwtDefault)"
        );
    }

    #[test]
    fn test_null_outside_equality_is_rejected() {
        let env = QueryAstEnv::new();
        let translation = TranslationContext::default();
        let ctx = QueryAstContext::new(&env, &translation).with_target(env.node_var());
        let title = Attribute::new("title", AttributeType::string());
        let filter = PropertyFilter {
            attribute: &title,
            operator: FilterOperator::Gt,
            value: FilterValue::Value(Value::Null),
            target: PropertyTarget::Node,
        };
        assert!(matches!(filter.get_predicate(&ctx), Err(Error::Input(_))));
    }
}
