//! Typed Cypher builder.
//!
//! Statements are assembled from [`Clause`]s, [`Expr`]s and [`Pattern`]s and
//! turned into text with [`build`]. Variable names are chosen by the caller;
//! the builder only escapes them.

mod clause;
mod expr;
mod pattern;
mod render;
mod variable;

pub use clause::{
    CallClause, CallImports, Clause, CreateClause, DeleteClause, MatchClause, MergeClause,
    OrderBy, ProcedureClause, Projection, RawClause, ReturnClause, SetClause, SetItem,
    SortDirection, SupportsDetachDelete, SupportsWhere, UnionClause, UnwindClause, WithClause,
    append_detach_delete, append_where,
};
pub use expr::{BinaryOp, Expr, MapItem, Quantifier};
pub use pattern::{Direction, Labels, NodePattern, Pattern, RelationshipPattern};
pub use render::{CypherResult, build, build_expr, try_build};
pub use variable::{Param, Variable};
