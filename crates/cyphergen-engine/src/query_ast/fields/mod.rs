//! Projected output keys.

mod aggregation;
mod attribute;
mod cypher;

use cyphergen_adapters::cypher::{CallImports, Clause, MapItem};
use cyphergen_common::utils::error::{Error, Result};

pub use aggregation::{AggregationAttributeField, AggregationSelection, CountField};
pub use attribute::{AttributeField, AttributeFieldKind};
pub use cypher::CypherAttributeField;

use super::ExplainNode;
use super::context::QueryAstContext;
use super::operations::Operation;

/// Subqueries a field needs and the map entry it contributes.
#[derive(Debug)]
pub struct FieldTranspileResult {
    /// Clauses to run before the projection.
    pub subqueries: Vec<Clause>,
    /// Entry in the parent's map projection.
    pub projection: MapItem,
}

/// A nested operation projected under `alias`, such as a relationship,
/// connection or aggregate field.
#[derive(Debug)]
pub struct OperationField<'a> {
    /// Output key.
    pub alias: String,
    /// The nested operation.
    pub operation: Box<Operation<'a>>,
}

/// A requested output key.
#[derive(Debug)]
pub enum Field<'a> {
    /// Stored attribute.
    Attribute(AttributeField<'a>),
    /// Scalar `@cypher` attribute.
    Cypher(CypherAttributeField<'a>),
    /// Nested operation.
    Operation(OperationField<'a>),
    /// `count` in an aggregate selection.
    Count(CountField),
    /// Attribute aggregates in an aggregate selection.
    AggregationAttribute(AggregationAttributeField<'a>),
}

impl Field<'_> {
    /// Output key.
    #[must_use]
    pub fn alias(&self) -> &str {
        match self {
            Field::Attribute(field) => &field.alias,
            Field::Cypher(field) => &field.alias,
            Field::Operation(field) => &field.alias,
            Field::Count(field) => &field.alias,
            Field::AggregationAttribute(field) => &field.alias,
        }
    }

    /// Subqueries and projection entry in the scope of `ctx`.
    pub fn transpile(&self, ctx: &QueryAstContext<'_>) -> Result<FieldTranspileResult> {
        let (subqueries, projection) = match self {
            Field::Attribute(field) => (Vec::new(), field.projection(ctx)?),
            Field::Cypher(field) => field.transpile(ctx)?,
            Field::Operation(field) => {
                let result = field.operation.transpile(ctx)?;
                let subqueries = if field.operation.is_wrapped_by_parent() {
                    vec![Clause::call(CallImports::var(ctx.target()?), result.clauses)]
                } else {
                    result.clauses
                };
                (subqueries, MapItem::Entry(field.alias.clone(), result.projection_expr))
            }
            Field::Count(_) | Field::AggregationAttribute(_) => {
                return Err(Error::internal(format!(
                    "aggregate field `{}` outside of an aggregation",
                    self.alias()
                )));
            }
        };
        Ok(FieldTranspileResult {
            subqueries,
            projection,
        })
    }

    /// Explain tree node.
    #[must_use]
    pub fn explain(&self) -> ExplainNode {
        match self {
            Field::Attribute(field) => ExplainNode::new("AttributeField")
                .prop("alias", &field.alias)
                .prop("kind", format!("{:?}", field.kind)),
            Field::Cypher(field) => ExplainNode::new("CypherAttributeField").prop("alias", &field.alias),
            Field::Operation(field) => ExplainNode::new("OperationField")
                .prop("alias", &field.alias)
                .inputs([field.operation.explain()]),
            Field::Count(field) => ExplainNode::new("CountField").prop("alias", &field.alias),
            Field::AggregationAttribute(field) => ExplainNode::new("AggregationAttributeField")
                .prop("alias", &field.alias)
                .prop("target", format!("{:?}", field.target)),
        }
    }
}

/// Transpiles `fields` in order, collecting their subqueries and entries.
pub fn transpile_fields(fields: &[Field<'_>], ctx: &QueryAstContext<'_>) -> Result<(Vec<Clause>, Vec<MapItem>)> {
    let mut subqueries = Vec::new();
    let mut items = Vec::with_capacity(fields.len());
    for field in fields {
        let result = field.transpile(ctx)?;
        subqueries.extend(result.subqueries);
        items.push(result.projection);
    }
    Ok((subqueries, items))
}
