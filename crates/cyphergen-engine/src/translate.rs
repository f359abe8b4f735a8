//! Translate drivers: resolve tree in, Cypher and parameters out.
//!
//! Every call builds its own Query AST and naming environment, so one
//! [`SchemaModel`] can serve concurrent translations.

use cyphergen_adapters::cypher::CypherResult;
use cyphergen_common::utils::error::{Result, SchemaError};
use cyphergen_core::resolve_tree::ResolveTree;
use cyphergen_core::schema::SchemaModel;
use tracing::{debug, instrument, trace};

use crate::context::TranslationContext;
use crate::factory::QueryAstFactory;
use crate::query_ast::{ExplainNode, QueryAst};

/// Translates a root Query or Mutation field.
///
/// # Examples
///
/// ```
/// use cyphergen_core::resolve_tree::ResolveTree;
/// use cyphergen_core::schema::{Attribute, AttributeType, ConcreteEntity, SchemaModel};
/// use cyphergen_engine::{TranslationContext, translate};
///
/// let schema = SchemaModel::builder()
///     .entity(ConcreteEntity::new("Movie").attribute(Attribute::new("title", AttributeType::string())))
///     .build()
///     .unwrap();
/// let tree = ResolveTree::new("movies").with_fields("Movie", [ResolveTree::new("title")]);
/// let result = translate(&schema, &tree, &TranslationContext::default()).unwrap();
/// assert_eq!(result.cypher, "MATCH (this0:Movie)\nRETURN this0 {.title} AS this0");
/// ```
#[instrument(skip_all, fields(field = %tree.name))]
pub fn translate(schema: &SchemaModel, tree: &ResolveTree, context: &TranslationContext) -> Result<CypherResult> {
    let ast = QueryAstFactory::new(schema, context).create_query_ast(tree)?;
    build(&ast, context)
}

/// Translates a `@cypher` field declared on the Query type.
#[instrument(skip_all, fields(field = %tree.name))]
pub fn translate_top_level_cypher(
    schema: &SchemaModel,
    tree: &ResolveTree,
    context: &TranslationContext,
) -> Result<CypherResult> {
    let attribute = schema
        .query_fields()
        .find(|attribute| attribute.name == tree.name)
        .ok_or_else(|| SchemaError::UnknownRootField(tree.name.clone()))?;
    let ast = QueryAstFactory::new(schema, context).create_top_level_cypher_ast(tree, attribute)?;
    build(&ast, context)
}

/// The Query AST a translation would transpile, without transpiling it.
#[instrument(skip_all, fields(field = %tree.name))]
pub fn explain(schema: &SchemaModel, tree: &ResolveTree, context: &TranslationContext) -> Result<ExplainNode> {
    let ast = QueryAstFactory::new(schema, context).create_query_ast(tree)?;
    Ok(ast.explain())
}

fn build(ast: &QueryAst<'_>, context: &TranslationContext) -> Result<CypherResult> {
    trace!(ast = %ast.explain(), "built query AST");
    let result = ast.build(context)?;
    debug!(cypher = %result.cypher, params = result.params.len(), "translated");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyphergen_common::types::Value;
    use cyphergen_core::schema::{Attribute, AttributeType, ConcreteEntity};

    fn schema() -> SchemaModel {
        SchemaModel::builder()
            .entity(ConcreteEntity::new("Movie").attribute(Attribute::new("title", AttributeType::string())))
            .query_field(
                Attribute::new("titleCount", "Int".parse::<AttributeType>().unwrap())
                    .cypher("MATCH (m:Movie) RETURN count(m) AS c", "c"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_translation_is_repeatable() {
        let schema = schema();
        let context = TranslationContext::default();
        let tree = ResolveTree::new("movies")
            .with_arg("where", Value::from(serde_json::json!({"title": "Heat"})))
            .with_fields("Movie", [ResolveTree::new("title")]);
        let first = translate(&schema, &tree, &context).unwrap();
        let second = translate(&schema, &tree, &context).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.params["param0"], Value::from("Heat"));
    }

    #[test]
    fn test_top_level_cypher_requires_a_query_field() {
        let schema = schema();
        let context = TranslationContext::default();
        assert!(translate_top_level_cypher(&schema, &ResolveTree::new("titleCount"), &context).is_ok());
        let err = translate_top_level_cypher(&schema, &ResolveTree::new("movies"), &context).unwrap_err();
        assert_eq!(err, SchemaError::UnknownRootField("movies".into()).into());
    }

    #[test]
    fn test_explain_names_the_operation() {
        let schema = schema();
        let context = TranslationContext::default();
        let tree = ResolveTree::new("movies").with_fields("Movie", [ResolveTree::new("title")]);
        let tree = explain(&schema, &tree, &context).unwrap();
        assert_eq!(tree.op, "QueryAST");
        assert_eq!(tree.inputs[0].op, "ReadOperation");
    }
}
