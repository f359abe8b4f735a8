//! The Query AST.
//!
//! A [`QueryAst`] is built once per request by the factories in
//! [`crate::factory`] and turned into Cypher by [`QueryAst::build`]. The tree
//! is made of closed enums: [`Operation`] at the top and at every nested
//! relationship, [`Field`] for each requested output key, [`Filter`] for
//! `where` arguments and authorization rules, and [`Sort`] for ordering.
//!
//! Transpilation is a single depth-first walk. Each node receives the
//! [`QueryAstContext`] of its nesting level and returns clauses plus the
//! expression its parent should project. Variable and parameter names come
//! from one [`QueryAstEnv`] per build, so the same tree always yields the
//! same Cypher.

pub mod context;
pub mod fields;
pub mod filters;
pub mod operations;
pub mod pagination;
pub mod selection;
pub mod sort;

use std::fmt;

use cyphergen_adapters::cypher::{CypherResult, try_build};
use cyphergen_common::utils::error::Result;
use serde::Serialize;

use crate::context::TranslationContext;

pub use context::{QueryAstContext, QueryAstEnv};
pub use fields::{Field, FieldTranspileResult};
pub use filters::Filter;
pub use operations::{Operation, OperationTranspileResult};
pub use pagination::{PageInfo, Pagination, cursor_to_offset, offset_to_cursor};
pub use selection::Selection;
pub use sort::Sort;

/// Whether a property lives on the matched node or on the traversed
/// relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyTarget {
    /// The matched node.
    Node,
    /// The traversed relationship.
    Edge,
}

/// Root of a Query AST.
#[derive(Debug)]
pub struct QueryAst<'a> {
    operation: Operation<'a>,
}

impl<'a> QueryAst<'a> {
    /// Wraps a top-level operation.
    #[must_use]
    pub fn new(operation: Operation<'a>) -> Self {
        Self { operation }
    }

    /// The top-level operation.
    #[must_use]
    pub fn operation(&self) -> &Operation<'a> {
        &self.operation
    }

    /// Transpiles the tree into Cypher and parameters.
    pub fn build(&self, translation: &TranslationContext) -> Result<CypherResult> {
        let env = QueryAstEnv::new();
        let ctx = QueryAstContext::new(&env, translation);
        let result = self.operation.transpile(&ctx)?;
        try_build(&result.clauses)
    }

    /// Explain tree of the AST.
    #[must_use]
    pub fn explain(&self) -> ExplainNode {
        ExplainNode::new("QueryAST").inputs([self.operation.explain()])
    }
}

/// A node of the explain tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainNode {
    /// Node kind.
    pub op: String,
    /// Descriptive properties.
    pub props: Vec<(String, String)>,
    /// Children.
    pub inputs: Vec<ExplainNode>,
}

impl ExplainNode {
    /// Creates a node without properties or children.
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            props: Vec::new(),
            inputs: Vec::new(),
        }
    }

    /// Adds a property.
    #[must_use]
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.push((key.into(), value.into()));
        self
    }

    /// Appends children.
    #[must_use]
    pub fn inputs(mut self, inputs: impl IntoIterator<Item = ExplainNode>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}{}", "", self.op, indent = depth * 2)?;
        if !self.props.is_empty() {
            let props: Vec<_> = self.props.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, " [{}]", props.join(", "))?;
        }
        writeln!(f)?;
        for input in &self.inputs {
            input.write(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for ExplainNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, 0)
    }
}
