//! Deletes.
//!
//! A top-level delete attaches `DETACH DELETE` to its `MATCH`, or to a
//! `WITH *` when subqueries run in between. A nested delete collects the
//! related nodes first and deletes them in a subquery of its own.

use cyphergen_adapters::cypher::{
    CallImports, Clause, Expr, Labels, MatchClause, Projection, UnwindClause, WithClause,
    append_detach_delete, append_where,
};
use cyphergen_common::utils::error::Result;
use cyphergen_core::schema::{ConcreteEntity, Relationship};

use super::{OperationTranspileResult, match_filtered};
use crate::query_ast::ExplainNode;
use crate::query_ast::context::QueryAstContext;
use crate::query_ast::filters::{Filter, predicate_of, subqueries_of};
use crate::query_ast::selection::{Selection, traversal_pattern};

/// `delete: { rel: { where: {...}, delete: {...} } }`
#[derive(Debug)]
pub struct NestedDelete<'a> {
    /// Relationship from the parent.
    pub relationship: &'a Relationship,
    /// Labels of the deleted nodes.
    pub target_labels: Labels,
    /// Which related nodes are deleted.
    pub filters: Vec<Filter<'a>>,
    /// Deletes one level further down, run before this one.
    pub nested: Vec<NestedDelete<'a>>,
}

impl NestedDelete<'_> {
    /// `CALL { WITH * OPTIONAL MATCH ... WITH r, collect(DISTINCT t) AS v CALL { ... DETACH DELETE x } }`
    pub(crate) fn transpile(&self, ctx: &QueryAstContext<'_>) -> Result<Clause> {
        let parent = ctx.target()?.clone();
        let env = ctx.env();
        let relationship = env.node_var();
        let target = env.node_var();
        let inner = ctx.push(Some(relationship.clone()), target.clone());

        let mut body = vec![Clause::Match(MatchClause::optional(traversal_pattern(
            &parent,
            self.relationship,
            Some(relationship.clone()),
            &target,
            self.target_labels.clone(),
        )))];
        body.extend(subqueries_of(&self.filters, &inner)?);
        if let Some(predicate) = predicate_of(&self.filters, &inner)? {
            append_where(&mut body, predicate);
        }
        for nested in &self.nested {
            body.push(nested.transpile(&inner)?);
            body.push(Clause::with_star());
        }

        let collected = env.var();
        body.push(Clause::With(WithClause::items(vec![
            Projection::var(&relationship),
            Projection::aliased(Expr::function_distinct("collect", target.expr()), &collected),
        ])));
        let item = env.var();
        let mut deletion = vec![Clause::Unwind(UnwindClause {
            expr: collected.expr(),
            alias: item.clone(),
        })];
        append_detach_delete(&mut deletion, item);
        body.push(Clause::call(CallImports::var(&collected), deletion));

        Ok(Clause::call(CallImports::Star, body))
    }

    pub(crate) fn explain(&self) -> ExplainNode {
        ExplainNode::new("NestedDelete")
            .prop("relationship", &self.relationship.name)
            .inputs(self.filters.iter().map(Filter::explain))
            .inputs(self.nested.iter().map(NestedDelete::explain))
    }
}

/// Deletes matched nodes of one concrete entity.
#[derive(Debug)]
pub struct DeleteOperation<'a> {
    /// The deleted entity.
    pub target: &'a ConcreteEntity,
    /// How nodes are matched.
    pub selection: Selection<'a>,
    /// `where` and authorization filters.
    pub filters: Vec<Filter<'a>>,
    /// Related nodes deleted first.
    pub nested: Vec<NestedDelete<'a>>,
}

impl DeleteOperation<'_> {
    pub(crate) fn transpile(&self, ctx: &QueryAstContext<'_>) -> Result<OperationTranspileResult> {
        let matched = match_filtered(&self.selection, &self.filters, ctx)?;
        let nested = matched.ctx;
        let mut clauses = matched.clauses;
        for delete in &self.nested {
            clauses.push(delete.transpile(&nested)?);
        }
        append_detach_delete(&mut clauses, nested.target()?.clone());
        Ok(OperationTranspileResult {
            clauses,
            projection_expr: Expr::null(),
        })
    }

    pub(crate) fn explain(&self) -> ExplainNode {
        ExplainNode::new("DeleteOperation")
            .prop("entity", &self.target.name)
            .prop("selection", self.selection.describe())
            .inputs(self.filters.iter().map(Filter::explain))
            .inputs(self.nested.iter().map(NestedDelete::explain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TranslationContext;
    use crate::query_ast::PropertyTarget;
    use crate::query_ast::QueryAst;
    use crate::query_ast::filters::{
        CypherFilter, FilterOperator, FilterValue, PropertyFilter,
    };
    use crate::query_ast::operations::Operation;
    use crate::query_ast::selection::NodeSelection;
    use cyphergen_common::types::Value;
    use cyphergen_core::schema::{Attribute, AttributeType, RelationshipDirection};

    fn build(delete: DeleteOperation<'_>) -> String {
        QueryAst::new(Operation::Delete(delete))
            .build(&TranslationContext::default())
            .unwrap()
            .cypher
    }

    #[test]
    fn test_detach_delete_attaches_to_match() {
        let movie = ConcreteEntity::new("Movie").attribute(Attribute::new("title", AttributeType::string()));
        let delete = DeleteOperation {
            target: &movie,
            selection: Selection::Node(NodeSelection::of(&movie)),
            filters: vec![Filter::Property(PropertyFilter {
                attribute: &movie.attributes["title"],
                operator: FilterOperator::Eq,
                value: FilterValue::Value(Value::from("Matrix")),
                target: PropertyTarget::Node,
            })],
            nested: Vec::new(),
        };
        assert_eq!(
            build(delete),
            "MATCH (this0:Movie)\nWHERE this0.title = $param0\nDETACH DELETE this0"
        );
    }

    #[test]
    fn test_subquery_filter_moves_delete_to_with() {
        let rank = Attribute::new("rank", AttributeType::string()).cypher("RETURN 1 AS r", "r");
        let movie = ConcreteEntity::new("Movie").attribute(rank);
        let attribute = &movie.attributes["rank"];
        let Some(annotation) = attribute.annotations.cypher.as_ref() else {
            panic!("cypher annotation missing");
        };
        let delete = DeleteOperation {
            target: &movie,
            selection: Selection::Node(NodeSelection::of(&movie)),
            filters: vec![Filter::Cypher(CypherFilter::new(
                attribute,
                annotation,
                FilterOperator::Eq,
                FilterValue::Value(Value::from("a")),
            ))],
            nested: Vec::new(),
        };
        let cypher = build(delete);
        assert!(cypher.starts_with("MATCH (this0:Movie)\nCALL {"));
        assert!(cypher.ends_with("}\nWITH *\nWHERE var1 = $param0\nDETACH DELETE this0"));
    }

    #[test]
    fn test_nested_delete_runs_before_parent() {
        let actor = ConcreteEntity::new("Actor");
        let movie = ConcreteEntity::new("Movie");
        let actors = Relationship::new("actors", "ACTED_IN", RelationshipDirection::In, "Actor");
        let delete = DeleteOperation {
            target: &movie,
            selection: Selection::Node(NodeSelection::of(&movie)),
            filters: Vec::new(),
            nested: vec![NestedDelete {
                relationship: &actors,
                target_labels: Labels::all(actor.labels.iter().cloned()),
                filters: Vec::new(),
                nested: Vec::new(),
            }],
        };
        assert_eq!(
            build(delete),
            "MATCH (this0:Movie)\n\
             CALL {\n    \
                 WITH *\n    \
                 OPTIONAL MATCH (this0)<-[this1:ACTED_IN]-(this2:Actor)\n    \
                 WITH this1, collect(DISTINCT this2) AS var3\n    \
                 CALL {\n        \
                     WITH var3\n        \
                     UNWIND var3 AS var4\n        \
                     WITH *\n        \
                     DETACH DELETE var4\n    \
                 }\n\
             }\n\
             WITH *\n\
             DETACH DELETE this0"
        );
    }
}
