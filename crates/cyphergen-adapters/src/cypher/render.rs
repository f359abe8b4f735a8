//! Renders clause lists into Cypher text plus a parameter map.

use std::fmt::Write;

use cyphergen_common::types::Value;
use cyphergen_common::utils::error::{Error, Result};
use cyphergen_common::utils::strings::is_plain_identifier;
use indexmap::IndexMap;
use serde::Serialize;

use super::clause::{
    CallImports, Clause, OrderBy, Projection, ReturnClause, SetItem, WithClause,
};
use super::expr::{Expr, MapItem};
use super::pattern::{Direction, Labels, NodePattern, Pattern, RelationshipPattern};
use super::variable::Param;

/// A built statement: Cypher text and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CypherResult {
    /// Cypher text.
    pub cypher: String,
    /// Parameters in first-use order.
    pub params: IndexMap<String, Value>,
}

/// Builds a statement from a clause list.
///
/// Clauses are separated by newlines, subquery bodies are indented by four
/// spaces, and every referenced parameter is collected once.
#[must_use]
pub fn build(clauses: &[Clause]) -> CypherResult {
    let mut renderer = Renderer::default();
    let cypher = renderer.clauses(clauses);
    CypherResult {
        cypher,
        params: renderer.params,
    }
}

/// Builds a statement, failing if one parameter name is bound to two
/// different values.
pub fn try_build(clauses: &[Clause]) -> Result<CypherResult> {
    let mut renderer = Renderer::default();
    let cypher = renderer.clauses(clauses);
    match renderer.conflict {
        Some(name) => Err(Error::internal(format!(
            "parameter ${name} is bound to more than one value"
        ))),
        None => Ok(CypherResult {
            cypher,
            params: renderer.params,
        }),
    }
}

/// Renders a single expression, returning the text and its parameters.
#[must_use]
pub fn build_expr(expr: &Expr) -> CypherResult {
    let mut renderer = Renderer::default();
    let mut cypher = String::new();
    renderer.expr(&mut cypher, expr);
    CypherResult {
        cypher,
        params: renderer.params,
    }
}

#[derive(Default)]
struct Renderer {
    params: IndexMap<String, Value>,
    conflict: Option<String>,
}

fn escape_name(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Renderer {
    fn clauses(&mut self, clauses: &[Clause]) -> String {
        clauses
            .iter()
            .map(|c| self.clause(c))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn collect_param(&mut self, param: &Param) {
        match self.params.get(param.name()) {
            Some(value) if value != param.value() => {
                self.conflict.get_or_insert_with(|| param.name().to_string());
            }
            Some(_) => {}
            None => {
                self.params.insert(param.name().to_string(), param.value().clone());
            }
        }
    }

    fn param(&mut self, out: &mut String, param: &Param) {
        self.collect_param(param);
        out.push('$');
        out.push_str(&escape_name(param.name()));
    }

    fn clause(&mut self, clause: &Clause) -> String {
        let mut out = String::new();
        match clause {
            Clause::Match(m) => {
                out.push_str(if m.optional { "OPTIONAL MATCH " } else { "MATCH " });
                for (i, pattern) in m.patterns.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.pattern(&mut out, pattern);
                }
                if let Some(predicate) = &m.predicate {
                    out.push_str("\nWHERE ");
                    self.expr(&mut out, predicate);
                }
                self.detach_delete(&mut out, &m.detach_delete);
            }
            Clause::With(w) => self.with(&mut out, w),
            Clause::Unwind(u) => {
                out.push_str("UNWIND ");
                self.expr(&mut out, &u.expr);
                let _ = write!(out, " AS {}", escape_name(u.alias.name()));
            }
            Clause::Call(call) => {
                let mut body = String::new();
                match &call.imports {
                    CallImports::None => {}
                    CallImports::Star => body.push_str("WITH *\n"),
                    CallImports::Vars(vars) => {
                        let names: Vec<_> = vars.iter().map(|v| escape_name(v.name())).collect();
                        let _ = writeln!(body, "WITH {}", names.join(", "));
                    }
                }
                body.push_str(&self.clauses(&call.body));
                out.push_str("CALL {\n");
                out.push_str(&indent(&body));
                out.push_str("\n}");
            }
            Clause::Union(union) => {
                let separator = if union.all { "\nUNION ALL\n" } else { "\nUNION\n" };
                let branches: Vec<_> = union.branches.iter().map(|b| self.clauses(b)).collect();
                out.push_str(&branches.join(separator));
            }
            Clause::Create(create) => {
                out.push_str("CREATE ");
                self.pattern(&mut out, &create.pattern);
            }
            Clause::Merge(merge) => {
                out.push_str("MERGE ");
                self.pattern(&mut out, &merge.pattern);
                if !merge.on_create.is_empty() {
                    out.push_str("\nON CREATE SET ");
                    self.set_items(&mut out, &merge.on_create);
                }
            }
            Clause::Set(set) => {
                out.push_str("SET ");
                self.set_items(&mut out, &set.items);
            }
            Clause::Delete(delete) => {
                out.push_str(if delete.detach { "DETACH DELETE " } else { "DELETE " });
                let names: Vec<_> = delete.variables.iter().map(|v| escape_name(v.name())).collect();
                out.push_str(&names.join(", "));
            }
            Clause::CallProcedure(procedure) => {
                let _ = write!(out, "CALL {}(", procedure.name);
                self.expr_list(&mut out, &procedure.args);
                out.push(')');
                if !procedure.yields.is_empty() {
                    out.push_str(" YIELD ");
                    for (i, (column, alias)) in procedure.yields.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(column);
                        if let Some(alias) = alias {
                            let _ = write!(out, " AS {}", escape_name(alias.name()));
                        }
                    }
                }
                if let Some(predicate) = &procedure.predicate {
                    out.push_str("\nWHERE ");
                    self.expr(&mut out, predicate);
                }
            }
            Clause::Return(r) => self.return_clause(&mut out, r),
            Clause::Raw(raw) => {
                for param in &raw.params {
                    self.collect_param(param);
                }
                out.push_str(&raw.cypher);
            }
        }
        out
    }

    fn with(&mut self, out: &mut String, with: &WithClause) {
        out.push_str("WITH ");
        if with.distinct {
            out.push_str("DISTINCT ");
        }
        if with.star {
            out.push('*');
            if !with.items.is_empty() {
                out.push_str(", ");
            }
        }
        self.projections(out, &with.items);
        self.paging(out, &with.order_by, with.skip.as_ref(), with.limit.as_ref());
        if let Some(predicate) = &with.predicate {
            out.push_str("\nWHERE ");
            self.expr(out, predicate);
        }
        self.detach_delete(out, &with.detach_delete);
    }

    fn return_clause(&mut self, out: &mut String, r: &ReturnClause) {
        out.push_str("RETURN ");
        if r.distinct {
            out.push_str("DISTINCT ");
        }
        self.projections(out, &r.items);
        self.paging(out, &r.order_by, r.skip.as_ref(), r.limit.as_ref());
    }

    fn projections(&mut self, out: &mut String, items: &[Projection]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.expr(out, &item.expr);
            if let Some(alias) = &item.alias {
                let same = matches!(&item.expr, Expr::Variable(v) if v == alias);
                if !same {
                    let _ = write!(out, " AS {}", escape_name(alias.name()));
                }
            }
        }
    }

    fn paging(
        &mut self,
        out: &mut String,
        order_by: &[OrderBy],
        skip: Option<&Expr>,
        limit: Option<&Expr>,
    ) {
        if !order_by.is_empty() {
            out.push_str("\nORDER BY ");
            for (i, order) in order_by.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                self.expr(out, &order.expr);
                let _ = write!(out, " {}", order.direction.as_str());
            }
        }
        if let Some(skip) = skip {
            out.push_str("\nSKIP ");
            self.expr(out, skip);
        }
        if let Some(limit) = limit {
            out.push_str("\nLIMIT ");
            self.expr(out, limit);
        }
    }

    fn detach_delete(&mut self, out: &mut String, vars: &[super::variable::Variable]) {
        if !vars.is_empty() {
            let names: Vec<_> = vars.iter().map(|v| escape_name(v.name())).collect();
            let _ = write!(out, "\nDETACH DELETE {}", names.join(", "));
        }
    }

    fn set_items(&mut self, out: &mut String, items: &[SetItem]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match item {
                SetItem::Assign(target, value) => {
                    self.expr(out, target);
                    out.push_str(" = ");
                    self.expr(out, value);
                }
                SetItem::Merge(variable, value) => {
                    let _ = write!(out, "{} += ", escape_name(variable.name()));
                    self.expr(out, value);
                }
            }
        }
    }

    fn pattern(&mut self, out: &mut String, pattern: &Pattern) {
        self.node(out, &pattern.start);
        for (rel, node) in &pattern.hops {
            self.relationship(out, rel);
            self.node(out, node);
        }
    }

    fn node(&mut self, out: &mut String, node: &NodePattern) {
        out.push('(');
        if let Some(v) = &node.variable {
            out.push_str(&escape_name(v.name()));
        }
        Self::labels(out, &node.labels);
        out.push(')');
    }

    fn labels(out: &mut String, labels: &Labels) {
        match labels {
            Labels::None => {}
            Labels::All(all) => {
                for label in all {
                    out.push(':');
                    out.push_str(&escape_name(label));
                }
            }
            Labels::Any(any) => {
                out.push(':');
                let names: Vec<_> = any.iter().map(|l| escape_name(l)).collect();
                out.push_str(&names.join("|"));
            }
        }
    }

    fn relationship(&mut self, out: &mut String, rel: &RelationshipPattern) {
        out.push_str(if rel.direction == Direction::Incoming { "<-[" } else { "-[" });
        if let Some(v) = &rel.variable {
            out.push_str(&escape_name(v.name()));
        }
        if !rel.types.is_empty() {
            out.push(':');
            let names: Vec<_> = rel.types.iter().map(|t| escape_name(t)).collect();
            out.push_str(&names.join("|"));
        }
        out.push_str(if rel.direction == Direction::Outgoing { "]->" } else { "]-" });
    }

    fn expr_list(&mut self, out: &mut String, items: &[Expr]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.expr(out, item);
        }
    }

    /// Renders an operand, parenthesizing compound expressions.
    fn operand(&mut self, out: &mut String, expr: &Expr) {
        if matches!(
            expr,
            Expr::Binary { .. } | Expr::IsNull(_) | Expr::IsNotNull(_) | Expr::HasLabels { .. }
        ) {
            out.push('(');
            self.expr(out, expr);
            out.push(')');
        } else {
            self.expr(out, expr);
        }
    }

    fn logical(&mut self, out: &mut String, items: &[Expr], keyword: &str, empty: &str) {
        match items {
            [] => out.push_str(empty),
            [single] => self.expr(out, single),
            _ => {
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        let _ = write!(out, " {keyword} ");
                    }
                    self.expr(out, item);
                }
                out.push(')');
            }
        }
    }

    fn literal(out: &mut String, value: &Value) {
        match value {
            Value::Null => out.push_str("NULL"),
            Value::Bool(b) => {
                let _ = write!(out, "{b}");
            }
            Value::Int64(i) => {
                let _ = write!(out, "{i}");
            }
            Value::Float64(f) => {
                let _ = write!(out, "{f:?}");
            }
            Value::String(s) => {
                let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
                let _ = write!(out, "\"{escaped}\"");
            }
            Value::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    Self::literal(out, item);
                }
                out.push(']');
            }
            Value::Map(map) => {
                out.push('{');
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{}: ", escape_name(key));
                    Self::literal(out, item);
                }
                out.push('}');
            }
        }
    }

    fn expr(&mut self, out: &mut String, expr: &Expr) {
        match expr {
            Expr::Variable(v) => out.push_str(&escape_name(v.name())),
            Expr::Param(p) => self.param(out, p),
            Expr::Literal(value) => Self::literal(out, value),
            Expr::Property { subject, key } => {
                self.operand(out, subject);
                out.push('.');
                out.push_str(&escape_name(key));
            }
            Expr::Slice { subject, from, to } => {
                self.operand(out, subject);
                out.push('[');
                if let Some(from) = from {
                    self.expr(out, from);
                }
                out.push_str("..");
                if let Some(to) = to {
                    self.expr(out, to);
                }
                out.push(']');
            }
            Expr::Binary { left, op, right } => {
                self.operand(out, left);
                let _ = write!(out, " {} ", op.as_str());
                self.operand(out, right);
            }
            Expr::And(items) => self.logical(out, items, "AND", "true"),
            Expr::Or(items) => self.logical(out, items, "OR", "false"),
            Expr::Not(inner) => {
                out.push_str("NOT (");
                self.expr(out, inner);
                out.push(')');
            }
            Expr::IsNull(inner) => {
                self.operand(out, inner);
                out.push_str(" IS NULL");
            }
            Expr::IsNotNull(inner) => {
                self.operand(out, inner);
                out.push_str(" IS NOT NULL");
            }
            Expr::HasLabels { subject, labels } => {
                out.push_str(&escape_name(subject.name()));
                Self::labels(out, labels);
            }
            Expr::Function { name, args, distinct } => {
                out.push_str(name);
                out.push('(');
                if *distinct {
                    out.push_str("DISTINCT ");
                }
                self.expr_list(out, args);
                out.push(')');
            }
            Expr::Map(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{}: ", escape_name(key));
                    self.expr(out, value);
                }
                out.push('}');
            }
            Expr::MapProjection { subject, items } => {
                let _ = write!(out, "{} {{", escape_name(subject.name()));
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    match item {
                        MapItem::Property(key) => {
                            out.push('.');
                            out.push_str(&escape_name(key));
                        }
                        MapItem::Entry(key, value) => {
                            let _ = write!(out, "{}: ", escape_name(key));
                            self.expr(out, value);
                        }
                    }
                }
                out.push('}');
            }
            Expr::List(items) => {
                out.push('[');
                self.expr_list(out, items);
                out.push(']');
            }
            Expr::ListComprehension {
                variable,
                list,
                predicate,
                map,
            } => {
                let _ = write!(out, "[{} IN ", escape_name(variable.name()));
                self.expr(out, list);
                if let Some(predicate) = predicate {
                    out.push_str(" WHERE ");
                    self.expr(out, predicate);
                }
                if let Some(map) = map {
                    out.push_str(" | ");
                    self.expr(out, map);
                }
                out.push(']');
            }
            Expr::PatternComprehension {
                pattern,
                predicate,
                map,
            } => {
                out.push('[');
                self.pattern(out, pattern);
                if let Some(predicate) = predicate {
                    out.push_str(" WHERE ");
                    self.expr(out, predicate);
                }
                out.push_str(" | ");
                self.expr(out, map);
                out.push(']');
            }
            Expr::Quantified {
                quantifier,
                variable,
                list,
                predicate,
            } => {
                let _ = write!(
                    out,
                    "{}({} IN ",
                    quantifier.as_str(),
                    escape_name(variable.name())
                );
                self.expr(out, list);
                out.push_str(" WHERE ");
                self.expr(out, predicate);
                out.push(')');
            }
            Expr::Exists { pattern, predicate } => {
                out.push_str("EXISTS { MATCH ");
                self.pattern(out, pattern);
                if let Some(predicate) = predicate {
                    out.push_str(" WHERE ");
                    self.expr(out, predicate);
                }
                out.push_str(" }");
            }
            Expr::Case {
                branches,
                otherwise,
            } => {
                out.push_str("CASE");
                for (condition, value) in branches {
                    out.push_str(" WHEN ");
                    self.expr(out, condition);
                    out.push_str(" THEN ");
                    self.expr(out, value);
                }
                if let Some(otherwise) = otherwise {
                    out.push_str(" ELSE ");
                    self.expr(out, otherwise);
                }
                out.push_str(" END");
            }
            Expr::Star => out.push('*'),
            Expr::Raw(text) => out.push_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher::clause::{CallClause, MatchClause, RawClause, UnwindClause};
    use crate::cypher::variable::Variable;

    fn normalize(cypher: &str) -> String {
        cypher.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_nested_read_shape() {
        let actor = Variable::named("this0");
        let rel = Variable::named("this1");
        let movie = Variable::named("this2");
        let collected = Variable::named("var3");

        let inner = vec![
            Clause::Match(MatchClause::new(
                Pattern::node(NodePattern::bound(&actor)).related(
                    RelationshipPattern::new(Some(rel), "ACTED_IN", Direction::Outgoing),
                    NodePattern::new(movie.clone(), Labels::all(["Movie"])),
                ),
            )),
            Clause::With(WithClause::items(vec![Projection::aliased(
                Expr::MapProjection {
                    subject: movie.clone(),
                    items: vec![MapItem::Property("title".into())],
                },
                &movie,
            )])),
            Clause::Return(ReturnClause::aliased(Expr::collect(&movie), &collected)),
        ];
        let clauses = vec![
            Clause::Match(MatchClause::new(Pattern::node(NodePattern::new(
                actor.clone(),
                Labels::all(["Actor"]),
            )))),
            Clause::Call(CallClause {
                imports: CallImports::var(&actor),
                body: inner,
            }),
            Clause::Return(ReturnClause::aliased(
                Expr::MapProjection {
                    subject: actor.clone(),
                    items: vec![
                        MapItem::Property("name".into()),
                        MapItem::Entry("movies".into(), collected.expr()),
                    ],
                },
                &actor,
            )),
        ];

        let result = build(&clauses);
        assert_eq!(
            normalize(&result.cypher),
            "MATCH (this0:Actor) CALL { WITH this0 MATCH (this0)-[this1:ACTED_IN]->(this2:Movie) \
             WITH this2 {.title} AS this2 RETURN collect(this2) AS var3 } \
             RETURN this0 {.name, movies: var3} AS this0"
        );
        assert!(result.cypher.contains("\n    MATCH (this0)"));
    }

    #[test]
    fn test_params_collected_once_in_order() {
        let node = Variable::named("this0");
        let p0 = Param::new("param0", "Stuff");
        let p1 = Param::new("param1", 3);
        let predicate = Expr::and_all([
            node.property("name").eq(p0.clone()),
            node.property("age").gt(p1),
            node.property("alias").eq(p0),
        ]);
        let clauses = vec![Clause::Match(
            MatchClause::new(Pattern::node(NodePattern::new(
                node.clone(),
                Labels::all(["Actor"]),
            )))
            .with_where(predicate),
        )];

        let result = build(&clauses);
        assert_eq!(
            result.cypher,
            "MATCH (this0:Actor)\nWHERE (this0.name = $param0 AND this0.age > $param1 AND this0.alias = $param0)"
        );
        let keys: Vec<_> = result.params.keys().cloned().collect();
        assert_eq!(keys, vec!["param0", "param1"]);
        assert_eq!(result.params["param0"], Value::from("Stuff"));
    }

    #[test]
    fn test_conflicting_param_values_are_rejected() {
        let raw = |value: i64| {
            Clause::Raw(RawClause {
                cypher: "RETURN $factor AS s".into(),
                params: vec![Param::new("factor", value)],
            })
        };
        let same = try_build(&[raw(1), raw(1)]).unwrap();
        assert_eq!(same.params["factor"], Value::Int64(1));

        let err = try_build(&[raw(1), raw(100)]).unwrap_err();
        assert!(matches!(err, Error::Internal(message) if message.contains("$factor")));
    }

    #[test]
    fn test_not_and_null_checks() {
        let v = Variable::named("this0");
        let expr = Expr::exists(
            Pattern::node(NodePattern::bound(&v)).related(
                RelationshipPattern::new(None, "LIKES", Direction::Incoming),
                NodePattern::new(Variable::named("this1"), Labels::all(["User"])),
            ),
            Some(v.property("title").is_null()),
        )
        .not();
        assert_eq!(
            build_expr(&expr).cypher,
            "NOT (EXISTS { MATCH (this0)<-[:LIKES]-(this1:User) WHERE this0.title IS NULL })"
        );
    }

    #[test]
    fn test_literals_and_escaping() {
        let expr = Expr::List(vec![
            Expr::literal(1.0),
            Expr::literal("a\"b"),
            Expr::null(),
            Variable::named("my var").expr(),
        ]);
        assert_eq!(build_expr(&expr).cypher, "[1.0, \"a\\\"b\", NULL, `my var`]");
    }

    #[test]
    fn test_with_paging_and_unwind() {
        let v = Variable::named("this0");
        let mut with = WithClause::star();
        with.order_by.push(OrderBy {
            expr: v.property("title"),
            direction: super::super::clause::SortDirection::Desc,
        });
        with.limit = Some(Expr::literal(10));
        let clauses = vec![
            Clause::Unwind(UnwindClause {
                expr: Param::new("create_param0", Value::List(Vec::new())).expr(),
                alias: Variable::named("create_var0"),
            }),
            Clause::With(with),
        ];
        assert_eq!(
            build(&clauses).cypher,
            "UNWIND $create_param0 AS create_var0\nWITH *\nORDER BY this0.title DESC\nLIMIT 10"
        );
    }
}
