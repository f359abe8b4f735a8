//! Cypher clauses.
//!
//! A statement is an ordered list of [`Clause`]s. Subqueries (`CALL { ... }`)
//! and unions nest further clause lists.

use super::expr::Expr;
use super::pattern::Pattern;
use super::variable::{Param, Variable};

/// A single Cypher clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `MATCH` or `OPTIONAL MATCH`.
    Match(MatchClause),
    /// `WITH`.
    With(WithClause),
    /// `UNWIND expr AS var`.
    Unwind(UnwindClause),
    /// `CALL { ... }` subquery.
    Call(CallClause),
    /// `branch UNION branch ...`.
    Union(UnionClause),
    /// `CREATE pattern`.
    Create(CreateClause),
    /// `MERGE pattern`.
    Merge(MergeClause),
    /// `SET a = b, c += d`.
    Set(SetClause),
    /// `DELETE` / `DETACH DELETE`.
    Delete(DeleteClause),
    /// `CALL proc(args) YIELD ...`.
    CallProcedure(ProcedureClause),
    /// `RETURN`.
    Return(ReturnClause),
    /// Verbatim Cypher with the parameters it references.
    Raw(RawClause),
}

/// Clauses that can carry a trailing `WHERE`.
pub trait SupportsWhere {
    /// Conjoins `predicate` with any existing `WHERE` predicate.
    fn and_where(&mut self, predicate: Expr);
}

/// Clauses that can carry a trailing `DETACH DELETE`.
pub trait SupportsDetachDelete {
    /// Appends `variable` to the `DETACH DELETE` list.
    fn detach_delete(&mut self, variable: Variable);
}

fn conjoin(slot: &mut Option<Expr>, predicate: Expr) {
    *slot = Expr::and_all(slot.take().into_iter().chain(std::iter::once(predicate)));
}

impl Clause {
    /// Returns the clause as a [`SupportsWhere`], if it can carry a `WHERE`.
    pub fn supports_where(&mut self) -> Option<&mut dyn SupportsWhere> {
        match self {
            Clause::Match(m) => Some(m),
            Clause::With(w) => Some(w),
            Clause::CallProcedure(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the clause as a [`SupportsDetachDelete`], if it can carry a
    /// `DETACH DELETE`.
    pub fn supports_detach_delete(&mut self) -> Option<&mut dyn SupportsDetachDelete> {
        match self {
            Clause::Match(m) => Some(m),
            Clause::With(w) => Some(w),
            _ => None,
        }
    }

    /// `WITH *`
    #[must_use]
    pub fn with_star() -> Self {
        Clause::With(WithClause::star())
    }

    /// `CALL { WITH vars ... }`
    #[must_use]
    pub fn call(imports: CallImports, body: Vec<Clause>) -> Self {
        Clause::Call(CallClause { imports, body })
    }
}

/// Appends `predicate` to the last clause if it can carry a `WHERE`, or
/// appends `WITH * WHERE predicate` otherwise.
pub fn append_where(clauses: &mut Vec<Clause>, predicate: Expr) {
    if let Some(target) = clauses.last_mut().and_then(Clause::supports_where) {
        target.and_where(predicate);
        return;
    }
    let mut with = WithClause::star();
    with.and_where(predicate);
    clauses.push(Clause::With(with));
}

/// Appends `DETACH DELETE variable` to the last clause if it supports it,
/// inserting a `WITH *` first otherwise.
pub fn append_detach_delete(clauses: &mut Vec<Clause>, variable: Variable) {
    if let Some(target) = clauses.last_mut().and_then(Clause::supports_detach_delete) {
        target.detach_delete(variable);
        return;
    }
    let mut with = WithClause::star();
    with.detach_delete(variable);
    clauses.push(Clause::With(with));
}

/// A `MATCH` clause.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchClause {
    /// `OPTIONAL MATCH` when set.
    pub optional: bool,
    /// Comma separated patterns.
    pub patterns: Vec<Pattern>,
    /// `WHERE` predicate.
    pub predicate: Option<Expr>,
    /// Variables removed with `DETACH DELETE`.
    pub detach_delete: Vec<Variable>,
}

impl MatchClause {
    /// `MATCH pattern`
    #[must_use]
    pub fn new(pattern: Pattern) -> Self {
        Self {
            patterns: vec![pattern],
            ..Self::default()
        }
    }

    /// `OPTIONAL MATCH pattern`
    #[must_use]
    pub fn optional(pattern: Pattern) -> Self {
        Self {
            optional: true,
            ..Self::new(pattern)
        }
    }

    /// Sets the `WHERE` predicate, conjoined with any existing one.
    #[must_use]
    pub fn with_where(mut self, predicate: Option<Expr>) -> Self {
        if let Some(predicate) = predicate {
            self.and_where(predicate);
        }
        self
    }
}

impl SupportsWhere for MatchClause {
    fn and_where(&mut self, predicate: Expr) {
        conjoin(&mut self.predicate, predicate);
    }
}

impl SupportsDetachDelete for MatchClause {
    fn detach_delete(&mut self, variable: Variable) {
        self.detach_delete.push(variable);
    }
}

/// `expr [AS alias]` in `WITH` and `RETURN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// Projected expression.
    pub expr: Expr,
    /// Output name; omitted when the expression is that variable.
    pub alias: Option<Variable>,
}

impl Projection {
    /// `expr AS alias`
    pub fn aliased(expr: impl Into<Expr>, alias: &Variable) -> Self {
        Self {
            expr: expr.into(),
            alias: Some(alias.clone()),
        }
    }

    /// A bare variable.
    #[must_use]
    pub fn var(variable: &Variable) -> Self {
        Self {
            expr: variable.expr(),
            alias: None,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// `ASC`
    #[default]
    Asc,
    /// `DESC`
    Desc,
}

impl SortDirection {
    /// Cypher keyword.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// `expr ASC|DESC`
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// Sort key.
    pub expr: Expr,
    /// Direction.
    pub direction: SortDirection,
}

/// A `WITH` clause.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WithClause {
    /// `WITH DISTINCT`.
    pub distinct: bool,
    /// Leading `*`.
    pub star: bool,
    /// Projected items after the optional `*`.
    pub items: Vec<Projection>,
    /// `ORDER BY`.
    pub order_by: Vec<OrderBy>,
    /// `SKIP`.
    pub skip: Option<Expr>,
    /// `LIMIT`.
    pub limit: Option<Expr>,
    /// `WHERE`, rendered after paging.
    pub predicate: Option<Expr>,
    /// Variables removed with `DETACH DELETE`.
    pub detach_delete: Vec<Variable>,
}

impl WithClause {
    /// `WITH *`
    #[must_use]
    pub fn star() -> Self {
        Self {
            star: true,
            ..Self::default()
        }
    }

    /// `WITH a, b AS c`
    #[must_use]
    pub fn items(items: Vec<Projection>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// `WITH a, b`
    #[must_use]
    pub fn vars<'v>(vars: impl IntoIterator<Item = &'v Variable>) -> Self {
        Self::items(vars.into_iter().map(Projection::var).collect())
    }

    /// Returns `true` if the clause adds nothing beyond `WITH *`.
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        self.star
            && !self.distinct
            && self.items.is_empty()
            && self.order_by.is_empty()
            && self.skip.is_none()
            && self.limit.is_none()
            && self.predicate.is_none()
            && self.detach_delete.is_empty()
    }
}

impl SupportsWhere for WithClause {
    fn and_where(&mut self, predicate: Expr) {
        conjoin(&mut self.predicate, predicate);
    }
}

impl SupportsDetachDelete for WithClause {
    fn detach_delete(&mut self, variable: Variable) {
        self.detach_delete.push(variable);
    }
}

/// `UNWIND expr AS alias`
#[derive(Debug, Clone, PartialEq)]
pub struct UnwindClause {
    /// List to unwind.
    pub expr: Expr,
    /// Element variable.
    pub alias: Variable,
}

/// Variables imported into a `CALL` subquery.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CallImports {
    /// No importing `WITH`.
    #[default]
    None,
    /// `WITH *`
    Star,
    /// `WITH a, b`
    Vars(Vec<Variable>),
}

impl CallImports {
    /// Imports a single variable.
    #[must_use]
    pub fn var(variable: &Variable) -> Self {
        CallImports::Vars(vec![variable.clone()])
    }
}

/// `CALL { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct CallClause {
    /// Importing `WITH`.
    pub imports: CallImports,
    /// Subquery body.
    pub body: Vec<Clause>,
}

/// `a UNION b` or `a UNION ALL b`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionClause {
    /// `UNION ALL` when set.
    pub all: bool,
    /// One clause list per branch.
    pub branches: Vec<Vec<Clause>>,
}

/// `CREATE pattern`
#[derive(Debug, Clone, PartialEq)]
pub struct CreateClause {
    /// Pattern to create.
    pub pattern: Pattern,
}

/// `MERGE pattern [ON CREATE SET ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct MergeClause {
    /// Pattern to merge.
    pub pattern: Pattern,
    /// Assignments applied only when the pattern is created.
    pub on_create: Vec<SetItem>,
}

/// An assignment inside `SET`.
#[derive(Debug, Clone, PartialEq)]
pub enum SetItem {
    /// `target = value`
    Assign(Expr, Expr),
    /// `variable += map`
    Merge(Variable, Expr),
}

impl SetItem {
    /// `variable.key = value`
    pub fn property(variable: &Variable, key: impl Into<String>, value: impl Into<Expr>) -> Self {
        SetItem::Assign(variable.property(key), value.into())
    }
}

/// `SET item, item`
#[derive(Debug, Clone, PartialEq)]
pub struct SetClause {
    /// Assignments.
    pub items: Vec<SetItem>,
}

/// `[DETACH] DELETE vars`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteClause {
    /// `DETACH DELETE` when set.
    pub detach: bool,
    /// Variables to delete.
    pub variables: Vec<Variable>,
}

/// `CALL proc(args) YIELD col AS var WHERE ...`
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureClause {
    /// Fully qualified procedure name.
    pub name: String,
    /// Arguments.
    pub args: Vec<Expr>,
    /// Yielded columns with optional aliases.
    pub yields: Vec<(String, Option<Variable>)>,
    /// `WHERE` predicate on the yielded columns.
    pub predicate: Option<Expr>,
}

impl SupportsWhere for ProcedureClause {
    fn and_where(&mut self, predicate: Expr) {
        conjoin(&mut self.predicate, predicate);
    }
}

/// `RETURN`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReturnClause {
    /// `RETURN DISTINCT`.
    pub distinct: bool,
    /// Returned items.
    pub items: Vec<Projection>,
    /// `ORDER BY`.
    pub order_by: Vec<OrderBy>,
    /// `SKIP`.
    pub skip: Option<Expr>,
    /// `LIMIT`.
    pub limit: Option<Expr>,
}

impl ReturnClause {
    /// `RETURN expr AS alias`
    pub fn aliased(expr: impl Into<Expr>, alias: &Variable) -> Self {
        Self {
            items: vec![Projection::aliased(expr, alias)],
            ..Self::default()
        }
    }
}

/// Verbatim Cypher.
#[derive(Debug, Clone, PartialEq)]
pub struct RawClause {
    /// Statement text.
    pub cypher: String,
    /// Parameters referenced by the text.
    pub params: Vec<Param>,
}
