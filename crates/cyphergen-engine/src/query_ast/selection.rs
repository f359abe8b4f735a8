//! How an operation matches its target.

use cyphergen_adapters::cypher::{
    CallImports, Clause, Direction, Expr, Labels, MatchClause, NodePattern, Param, Pattern,
    ProcedureClause, Projection, RawClause, RelationshipPattern, ReturnClause, UnwindClause,
    Variable, WithClause,
};
use cyphergen_common::types::Value;
use cyphergen_common::utils::error::Result;
use cyphergen_core::schema::{
    ConcreteEntity, CypherAnnotation, FulltextIndex, QueryDirection, Relationship,
    RelationshipDirection, VectorIndex,
};
use indexmap::IndexMap;

use super::context::{JWT_PARAM, QueryAstContext};

/// The clauses produced by applying a selection.
#[derive(Debug)]
pub struct SelectionResult<'e> {
    /// Clauses that must run before [`SelectionResult::clause`].
    pub pre_clauses: Vec<Clause>,
    /// The matching clause; filters attach to it when it supports `WHERE`.
    pub clause: Clause,
    /// Context with the matched node as target.
    pub nested_context: QueryAstContext<'e>,
    /// Relevance score column for index selections.
    pub score: Option<Variable>,
}

/// How an operation matches its target node.
#[derive(Debug)]
pub enum Selection<'a> {
    /// `MATCH (this0:Label)`
    Node(NodeSelection),
    /// `MATCH (source)-[this1:TYPE]->(this2:Label)`
    Relationship(RelationshipSelection<'a>),
    /// `CALL db.index.fulltext.queryNodes(...)`
    Fulltext(FulltextSelection<'a>),
    /// `CALL db.index.vector.queryNodes(...)`
    Vector(VectorSelection<'a>),
    /// A `@cypher` statement yielding nodes.
    Cypher(CypherSelection<'a>),
}

/// Matches nodes by label.
#[derive(Debug)]
pub struct NodeSelection {
    /// Label constraint.
    pub labels: Labels,
    /// `OPTIONAL MATCH` when set.
    pub optional: bool,
}

impl NodeSelection {
    /// Matches every node of `entity`.
    pub fn of(entity: &ConcreteEntity) -> Self {
        Self {
            labels: Labels::all(entity.labels.iter().cloned()),
            optional: false,
        }
    }
}

/// Traverses a relationship from the current target.
#[derive(Debug)]
pub struct RelationshipSelection<'a> {
    /// The relationship.
    pub relationship: &'a Relationship,
    /// Labels of the target node.
    pub target_labels: Labels,
    /// `OPTIONAL MATCH` when set.
    pub optional: bool,
}

/// Queries a fulltext index.
#[derive(Debug)]
pub struct FulltextSelection<'a> {
    /// Index.
    pub index: &'a FulltextIndex,
    /// Search phrase.
    pub phrase: Value,
    /// Labels the results must carry.
    pub labels: Labels,
}

/// Queries a vector index.
#[derive(Debug)]
pub struct VectorSelection<'a> {
    /// Index.
    pub index: &'a VectorIndex,
    /// Query embedding.
    pub vector: Value,
    /// Number of nearest neighbours to fetch.
    pub neighbours: i64,
    /// Labels the results must carry.
    pub labels: Labels,
}

/// Runs a `@cypher` statement and binds its column as the target.
#[derive(Debug)]
pub struct CypherSelection<'a> {
    /// The statement.
    pub annotation: &'a CypherAnnotation,
    /// Field arguments, passed as named parameters.
    pub arguments: IndexMap<String, Value>,
}

/// Pattern for `relationship` as seen from its declaring entity.
pub fn relationship_pattern(relationship: &Relationship, variable: Option<Variable>) -> RelationshipPattern {
    let direction = match (relationship.query_direction, relationship.direction) {
        (QueryDirection::Undirected, _) => Direction::Undirected,
        (QueryDirection::Directed, RelationshipDirection::Out) => Direction::Outgoing,
        (QueryDirection::Directed, RelationshipDirection::In) => Direction::Incoming,
    };
    RelationshipPattern::new(variable, relationship.rel_type.clone(), direction)
}

/// `(source)-[variable:TYPE]->(target:Labels)`
pub fn traversal_pattern(
    source: &Variable,
    relationship: &Relationship,
    relationship_var: Option<Variable>,
    target: &Variable,
    labels: Labels,
) -> Pattern {
    Pattern::node(NodePattern::bound(source)).related(
        relationship_pattern(relationship, relationship_var),
        NodePattern::new(target.clone(), labels),
    )
}

/// Replaces each `$name` in `statement` that has an entry in `renames`.
fn rename_parameters(statement: &str, renames: &IndexMap<&str, &str>) -> String {
    let mut out = String::with_capacity(statement.len());
    let mut rest = statement;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..=pos]);
        let after = &rest[pos + 1..];
        let end = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..end];
        out.push_str(renames.get(name).copied().unwrap_or(name));
        rest = &after[end..];
    }
    out.push_str(rest);
    out
}

fn references_parameter(statement: &str, name: &str) -> bool {
    statement.match_indices('$').any(|(pos, _)| {
        let after = &statement[pos + 1..];
        after.starts_with(name)
            && !after[name.len()..].starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
    })
}

/// `CALL { [WITH this0 WITH this0 AS this] <statement> }`
///
/// Every argument is bound to a fresh parameter and its `$name` references
/// are rewritten, so repeated calls of one field never share values. `$jwt`
/// is bound when the statement still references it.
pub fn cypher_statement_call(
    ctx: &QueryAstContext<'_>,
    annotation: &CypherAnnotation,
    arguments: &IndexMap<String, Value>,
) -> Clause {
    let env = ctx.env();
    let mut params: Vec<Param> = arguments.values().map(|value| env.param(value.clone())).collect();
    let renames: IndexMap<&str, &str> = arguments
        .keys()
        .zip(&params)
        .map(|(name, param)| (name.as_str(), param.name()))
        .collect();
    let statement = rename_parameters(&annotation.statement, &renames);
    if references_parameter(&statement, JWT_PARAM) {
        params.push(ctx.jwt_param());
    }

    let mut body = Vec::new();
    let imports = match ctx.target() {
        Ok(target) => {
            body.push(Clause::With(WithClause::items(vec![Projection::aliased(
                target,
                &Variable::named("this"),
            )])));
            CallImports::var(target)
        }
        Err(_) => CallImports::None,
    };
    body.push(Clause::Raw(RawClause {
        cypher: statement,
        params,
    }));
    Clause::call(imports, body)
}

/// `CALL { WITH this0 <statement call> UNWIND col AS v RETURN head(collect(v)) AS v }`
///
/// Binds the value of a scalar `@cypher` field to `column`; list fields keep
/// the whole `collect`.
pub fn cypher_scalar_call(
    ctx: &QueryAstContext<'_>,
    annotation: &CypherAnnotation,
    arguments: &IndexMap<String, Value>,
    column: &Variable,
    is_list: bool,
) -> Result<Clause> {
    let target = ctx.target()?;
    let collected = Expr::collect(column);
    let value = if is_list { collected } else { Expr::head(collected) };
    let body = vec![
        cypher_statement_call(ctx, annotation, arguments),
        Clause::Unwind(UnwindClause {
            expr: Variable::named(annotation.column_name.clone()).into(),
            alias: column.clone(),
        }),
        Clause::Return(ReturnClause::aliased(value, column)),
    ];
    Ok(Clause::call(CallImports::var(target), body))
}

impl Selection<'_> {
    /// Produces the matching clauses and the context of the matched node.
    pub fn apply<'e>(&self, ctx: &QueryAstContext<'e>) -> Result<SelectionResult<'e>> {
        let env = ctx.env();
        match self {
            Selection::Node(node) => {
                let target = env.node_var();
                let pattern = Pattern::node(NodePattern::new(target.clone(), node.labels.clone()));
                let clause = if node.optional {
                    MatchClause::optional(pattern)
                } else {
                    MatchClause::new(pattern)
                };
                Ok(SelectionResult {
                    pre_clauses: Vec::new(),
                    clause: Clause::Match(clause),
                    nested_context: ctx.push(None, target),
                    score: None,
                })
            }
            Selection::Relationship(rel) => {
                let source = ctx.target()?.clone();
                let relationship_var = env.node_var();
                let target = env.node_var();
                let pattern = traversal_pattern(
                    &source,
                    rel.relationship,
                    Some(relationship_var.clone()),
                    &target,
                    rel.target_labels.clone(),
                );
                let clause = if rel.optional {
                    MatchClause::optional(pattern)
                } else {
                    MatchClause::new(pattern)
                };
                Ok(SelectionResult {
                    pre_clauses: Vec::new(),
                    clause: Clause::Match(clause),
                    nested_context: ctx.push(Some(relationship_var), target),
                    score: None,
                })
            }
            Selection::Fulltext(fulltext) => {
                let target = env.node_var();
                let score = env.var();
                let phrase = env.param(fulltext.phrase.clone());
                let clause = ProcedureClause {
                    name: "db.index.fulltext.queryNodes".into(),
                    args: vec![Expr::literal(fulltext.index.index_name.as_str()), phrase.into()],
                    yields: vec![
                        ("node".into(), Some(target.clone())),
                        ("score".into(), Some(score.clone())),
                    ],
                    predicate: Some(Expr::has_labels(&target, fulltext.labels.clone())),
                };
                Ok(SelectionResult {
                    pre_clauses: Vec::new(),
                    clause: Clause::CallProcedure(clause),
                    nested_context: ctx.push(None, target),
                    score: Some(score),
                })
            }
            Selection::Vector(vector) => {
                let target = env.node_var();
                let score = env.var();
                let neighbours = env.param(vector.neighbours);
                let embedding = env.param(vector.vector.clone());
                let clause = ProcedureClause {
                    name: "db.index.vector.queryNodes".into(),
                    args: vec![
                        Expr::literal(vector.index.index_name.as_str()),
                        neighbours.into(),
                        embedding.into(),
                    ],
                    yields: vec![
                        ("node".into(), Some(target.clone())),
                        ("score".into(), Some(score.clone())),
                    ],
                    predicate: Some(Expr::has_labels(&target, vector.labels.clone())),
                };
                Ok(SelectionResult {
                    pre_clauses: Vec::new(),
                    clause: Clause::CallProcedure(clause),
                    nested_context: ctx.push(None, target),
                    score: Some(score),
                })
            }
            Selection::Cypher(cypher) => {
                let call = cypher_statement_call(ctx, cypher.annotation, &cypher.arguments);
                let target = env.node_var();
                let column = Variable::named(cypher.annotation.column_name.clone());
                let clause = WithClause::items(vec![Projection::aliased(column, &target)]);
                Ok(SelectionResult {
                    pre_clauses: vec![call],
                    clause: Clause::With(clause),
                    nested_context: ctx.push(None, target),
                    score: None,
                })
            }
        }
    }

    /// Short description for AST printing.
    pub fn describe(&self) -> String {
        match self {
            Selection::Node(_) => "NodeSelection".into(),
            Selection::Relationship(rel) => {
                format!("RelationshipSelection<{}>", rel.relationship.name)
            }
            Selection::Fulltext(f) => format!("FulltextSelection<{}>", f.index.index_name),
            Selection::Vector(v) => format!("VectorSelection<{}>", v.index.index_name),
            Selection::Cypher(c) => format!("CypherSelection<{}>", c.annotation.column_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TranslationContext;
    use crate::query_ast::context::QueryAstEnv;
    use cyphergen_adapters::cypher::build;

    #[test]
    fn test_relationship_selection_requires_target() {
        let relationship =
            Relationship::new("movies", "ACTED_IN", RelationshipDirection::Out, "Movie");
        let selection = Selection::Relationship(RelationshipSelection {
            relationship: &relationship,
            target_labels: Labels::all(["Movie"]),
            optional: false,
        });
        let env = QueryAstEnv::new();
        let translation = TranslationContext::default();
        let root = QueryAstContext::new(&env, &translation);
        assert!(selection.apply(&root).is_err());

        let parent = root.with_target(env.node_var());
        let result = selection.apply(&parent).unwrap();
        assert_eq!(
            build(&[result.clause]).cypher,
            "MATCH (this0)-[this1:ACTED_IN]->(this2:Movie)"
        );
        assert_eq!(result.nested_context.target().unwrap().name(), "this2");
    }

    #[test]
    fn test_cypher_selection_imports_parent() {
        let annotation = CypherAnnotation {
            statement: "MATCH (this)-[:KNOWS]->(f) WHERE f.age > $minAge RETURN f".into(),
            column_name: "f".into(),
        };
        let mut arguments = IndexMap::new();
        arguments.insert("minAge".to_string(), Value::from(30));
        let selection = Selection::Cypher(CypherSelection {
            annotation: &annotation,
            arguments,
        });

        let env = QueryAstEnv::new();
        let translation = TranslationContext::default();
        let root = QueryAstContext::new(&env, &translation);
        let parent = root.with_target(env.node_var());
        let result = selection.apply(&parent).unwrap();

        let mut clauses = result.pre_clauses;
        clauses.push(result.clause);
        let built = build(&clauses);
        let normalized = built.cypher.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(
            normalized,
            "CALL { WITH this0 WITH this0 AS this MATCH (this)-[:KNOWS]->(f) WHERE f.age > $param0 RETURN f } WITH f AS this1"
        );
        assert_eq!(built.params["param0"], Value::from(30));
        assert!(!built.params.contains_key("minAge"));
    }

    #[test]
    fn test_rename_parameters_respects_name_boundaries() {
        let mut renames = IndexMap::new();
        renames.insert("factor", "param3");
        renames.insert("jwt", "param4");
        assert_eq!(
            rename_parameters("RETURN $factor * $factorial + $jwt.sub, '$'", &renames),
            "RETURN $param3 * $factorial + $param4.sub, '$'"
        );
        assert!(references_parameter("RETURN $jwt.sub", JWT_PARAM));
        assert!(!references_parameter("RETURN $jwtDefault", JWT_PARAM));
    }
}
