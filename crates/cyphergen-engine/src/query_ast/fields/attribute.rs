use cyphergen_adapters::cypher::{Expr, MapItem};
use cyphergen_common::utils::error::Result;
use cyphergen_core::schema::Attribute;

use crate::query_ast::context::QueryAstContext;

/// How an attribute value is shaped for the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeFieldKind {
    /// Returned as stored.
    Plain,
    /// Reformatted as an ISO offset date-time string.
    DateTime,
    /// Returned as `{point, crs}`; `crs` only when requested.
    Point {
        /// Include the coordinate reference system.
        crs: bool,
    },
}

/// A stored attribute.
#[derive(Debug)]
pub struct AttributeField<'a> {
    /// Output key.
    pub alias: String,
    /// The attribute.
    pub attribute: &'a Attribute,
    /// Response shape.
    pub kind: AttributeFieldKind,
}

fn format_datetime(value: Expr) -> Expr {
    Expr::function(
        "apoc.date.convertFormat",
        vec![
            Expr::function("toString", vec![value]),
            Expr::literal("iso_zoned_date_time"),
            Expr::literal("iso_offset_date_time"),
        ],
    )
}

fn point_map(value: Expr, crs: bool) -> Expr {
    let mut entries = vec![("point".to_string(), value.clone())];
    if crs {
        entries.push(("crs".to_string(), value.property("crs")));
    }
    Expr::Map(entries)
}

impl AttributeField<'_> {
    pub(crate) fn projection(&self, ctx: &QueryAstContext<'_>) -> Result<MapItem> {
        let target = ctx.target()?;
        let stored = self.attribute.database_name();
        let value = target.property(stored);
        let is_list = self.attribute.attribute_type.is_list();

        let shaped = match self.kind {
            AttributeFieldKind::Plain if self.alias == stored => {
                return Ok(MapItem::Property(self.alias.clone()));
            }
            AttributeFieldKind::Plain => value,
            AttributeFieldKind::DateTime if is_list => {
                let item = ctx.env().var();
                Expr::ListComprehension {
                    map: Some(Box::new(format_datetime(item.expr()))),
                    variable: item,
                    list: Box::new(value),
                    predicate: None,
                }
            }
            AttributeFieldKind::DateTime => format_datetime(value),
            AttributeFieldKind::Point { crs } if is_list => {
                let item = ctx.env().var();
                Expr::ListComprehension {
                    map: Some(Box::new(point_map(item.expr(), crs))),
                    variable: item,
                    list: Box::new(value),
                    predicate: None,
                }
            }
            AttributeFieldKind::Point { crs } => Expr::Case {
                branches: vec![(value.clone().is_not_null(), point_map(value, crs))],
                otherwise: Some(Box::new(Expr::null())),
            },
        };
        Ok(MapItem::Entry(self.alias.clone(), shaped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TranslationContext;
    use crate::query_ast::context::QueryAstEnv;
    use cyphergen_adapters::cypher::{Variable, build_expr};
    use cyphergen_core::schema::{AttributeType, ScalarType};

    fn project(field: &AttributeField<'_>) -> String {
        let env = QueryAstEnv::new();
        let translation = TranslationContext::default();
        let ctx = QueryAstContext::new(&env, &translation).with_target(env.node_var());
        let item = field.projection(&ctx).unwrap();
        build_expr(&Expr::MapProjection {
            subject: Variable::named("this0"),
            items: vec![item],
        })
        .cypher
    }

    #[test]
    fn test_aliased_attribute() {
        let title = Attribute::new("title", AttributeType::string());
        let plain = AttributeField {
            alias: "title".into(),
            attribute: &title,
            kind: AttributeFieldKind::Plain,
        };
        assert_eq!(project(&plain), "this0 {.title}");

        let aliased = AttributeField {
            alias: "name".into(),
            attribute: &title,
            kind: AttributeFieldKind::Plain,
        };
        assert_eq!(project(&aliased), "this0 {name: this0.title}");
    }

    #[test]
    fn test_datetime_is_formatted() {
        let released = Attribute::new("released", AttributeType::Scalar(ScalarType::DateTime));
        let field = AttributeField {
            alias: "released".into(),
            attribute: &released,
            kind: AttributeFieldKind::DateTime,
        };
        assert_eq!(
            project(&field),
            "this0 {released: apoc.date.convertFormat(toString(this0.released), \"iso_zoned_date_time\", \"iso_offset_date_time\")}"
        );
    }

    #[test]
    fn test_point_with_crs() {
        let location = Attribute::new("location", AttributeType::Scalar(ScalarType::Point));
        let field = AttributeField {
            alias: "location".into(),
            attribute: &location,
            kind: AttributeFieldKind::Point { crs: true },
        };
        assert_eq!(
            project(&field),
            "this0 {location: CASE WHEN this0.location IS NOT NULL THEN {point: this0.location, crs: this0.location.crs} ELSE NULL END}"
        );
    }
}
