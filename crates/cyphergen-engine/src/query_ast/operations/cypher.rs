use cyphergen_adapters::cypher::{Clause, Projection, ReturnClause, UnwindClause, Variable};
use cyphergen_common::types::Value;
use cyphergen_common::utils::error::Result;
use cyphergen_core::schema::{Attribute, CypherAnnotation};
use indexmap::IndexMap;

use super::OperationTranspileResult;
use crate::query_ast::ExplainNode;
use crate::query_ast::context::QueryAstContext;
use crate::query_ast::selection::cypher_statement_call;

/// A `@cypher` field on the query root that returns scalars.
#[derive(Debug)]
pub struct CypherScalarOperation<'a> {
    /// The root field.
    pub attribute: &'a Attribute,
    /// Its statement.
    pub annotation: &'a CypherAnnotation,
    /// Field arguments, passed as named parameters.
    pub arguments: IndexMap<String, Value>,
}

impl CypherScalarOperation<'_> {
    pub(crate) fn transpile(&self, ctx: &QueryAstContext<'_>) -> Result<OperationTranspileResult> {
        let value = ctx.env().node_var();
        let clauses = vec![
            cypher_statement_call(ctx, self.annotation, &self.arguments),
            Clause::Unwind(UnwindClause {
                expr: Variable::named(self.annotation.column_name.clone()).into(),
                alias: value.clone(),
            }),
            Clause::Return(ReturnClause {
                items: vec![Projection::var(&value)],
                ..ReturnClause::default()
            }),
        ];
        Ok(OperationTranspileResult {
            clauses,
            projection_expr: value.expr(),
        })
    }

    pub(crate) fn explain(&self) -> ExplainNode {
        ExplainNode::new("CypherScalarOperation")
            .prop("field", &self.attribute.name)
            .prop("column", &self.annotation.column_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TranslationContext;
    use crate::query_ast::QueryAst;
    use crate::query_ast::operations::Operation;
    use cyphergen_core::schema::AttributeType;

    #[test]
    fn test_scalar_statement_is_unwound() {
        let attribute = Attribute::new("recentTitles", AttributeType::list_of(AttributeType::string()))
            .cypher("MATCH (m:Movie) WHERE m.year > $year RETURN m.title AS title", "title");
        let Some(annotation) = attribute.annotations.cypher.as_ref() else {
            panic!("cypher annotation missing");
        };
        let mut arguments = IndexMap::new();
        arguments.insert("year".to_string(), Value::from(1999));
        let operation = CypherScalarOperation {
            attribute: &attribute,
            annotation,
            arguments,
        };

        let result = QueryAst::new(Operation::CypherScalar(operation))
            .build(&TranslationContext::default())
            .unwrap();
        assert_eq!(
            result.cypher,
            "CALL {\n    \
                 MATCH (m:Movie) WHERE m.year > $param0 RETURN m.title AS title\n\
             }\n\
             UNWIND title AS this0\n\
             RETURN this0"
        );
        assert_eq!(result.params["param0"], Value::from(1999));
    }
}
