//! Naming and scoping during transpilation.
//!
//! [`QueryAstEnv`] hands out variable and parameter names for one
//! translation. [`QueryAstContext`] records which variables are in scope at a
//! given nesting level; descending into a relationship derives a new context
//! and leaves the parent untouched, so siblings see the same parent scope.

use std::sync::atomic::{AtomicU32, Ordering};

use cyphergen_adapters::cypher::{Param, Variable};
use cyphergen_common::types::Value;
use cyphergen_common::utils::error::{Error, Result};

use crate::context::TranslationContext;

/// Reserved parameter holding the JWT claims.
pub const JWT_PARAM: &str = "jwt";
/// Reserved parameter holding whether the request is authenticated.
pub const IS_AUTHENTICATED_PARAM: &str = "isAuthenticated";
/// Reserved parameter compared against missing JWT claims.
pub const JWT_DEFAULT_PARAM: &str = "jwtDefault";

/// Name source for one translation.
///
/// Node and relationship variables are named `this{n}`, every other variable
/// `var{n}`; both share one counter. Parameters have their own counter and
/// are named `param{n}`. An optional prefix keeps names from separate
/// environments apart.
#[derive(Debug, Default)]
pub struct QueryAstEnv {
    prefix: String,
    var_counter: AtomicU32,
    param_counter: AtomicU32,
}

impl QueryAstEnv {
    /// Creates an environment with unprefixed names.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an environment whose names start with `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    fn next_var_id(&self) -> u32 {
        self.var_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// A fresh node or relationship variable: `this{n}`.
    pub fn node_var(&self) -> Variable {
        Variable::named(format!("{}this{}", self.prefix, self.next_var_id()))
    }

    /// A fresh variable for anything else: `var{n}`.
    pub fn var(&self) -> Variable {
        Variable::named(format!("{}var{}", self.prefix, self.next_var_id()))
    }

    /// A fresh parameter bound to `value`: `$param{n}`.
    pub fn param(&self, value: impl Into<Value>) -> Param {
        let id = self.param_counter.fetch_add(1, Ordering::Relaxed);
        Param::new(format!("{}param{id}", self.prefix), value)
    }
}

/// Scope of one nesting level.
#[derive(Debug, Clone)]
pub struct QueryAstContext<'e> {
    env: &'e QueryAstEnv,
    translation: &'e TranslationContext,
    target: Option<Variable>,
    relationship: Option<Variable>,
    source: Option<Variable>,
}

impl<'e> QueryAstContext<'e> {
    /// The root context: nothing is in scope yet.
    pub fn new(env: &'e QueryAstEnv, translation: &'e TranslationContext) -> Self {
        Self {
            env,
            translation,
            target: None,
            relationship: None,
            source: None,
        }
    }

    /// The naming environment.
    pub fn env(&self) -> &'e QueryAstEnv {
        self.env
    }

    /// The per-request context.
    pub fn translation(&self) -> &'e TranslationContext {
        self.translation
    }

    /// Returns `true` if a target node is in scope.
    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// The node currently being matched, filtered or projected.
    pub fn target(&self) -> Result<&Variable> {
        self.target
            .as_ref()
            .ok_or_else(|| Error::internal("query AST context has no target"))
    }

    /// The relationship traversed to reach the target, if any.
    pub fn relationship(&self) -> Option<&Variable> {
        self.relationship.as_ref()
    }

    /// The node the traversal started from, if any.
    pub fn source(&self) -> Option<&Variable> {
        self.source.as_ref()
    }

    /// Derives the context of a traversal from the current target.
    #[must_use]
    pub fn push(&self, relationship: Option<Variable>, target: Variable) -> Self {
        Self {
            env: self.env,
            translation: self.translation,
            source: self.target.clone(),
            relationship,
            target: Some(target),
        }
    }

    /// Derives a context with a new target and the same relationship scope.
    #[must_use]
    pub fn with_target(&self, target: Variable) -> Self {
        Self {
            target: Some(target),
            ..self.clone()
        }
    }

    /// Derives a context that uses another naming environment.
    #[must_use]
    pub fn with_env<'n>(&self, env: &'n QueryAstEnv) -> QueryAstContext<'n>
    where
        'e: 'n,
    {
        QueryAstContext {
            env,
            translation: self.translation,
            target: self.target.clone(),
            relationship: self.relationship.clone(),
            source: self.source.clone(),
        }
    }

    /// `$jwt`
    pub fn jwt_param(&self) -> Param {
        Param::new(JWT_PARAM, self.translation.jwt_claims())
    }

    /// `$isAuthenticated`
    pub fn is_authenticated_param(&self) -> Param {
        Param::new(IS_AUTHENTICATED_PARAM, self.translation.is_authenticated())
    }

    /// `$jwtDefault`
    pub fn jwt_default_param(&self) -> Param {
        Param::new(JWT_DEFAULT_PARAM, Value::empty_map())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_counter() {
        let env = QueryAstEnv::new();
        assert_eq!(env.node_var().name(), "this0");
        assert_eq!(env.node_var().name(), "this1");
        assert_eq!(env.var().name(), "var2");
        assert_eq!(env.param("x").name(), "param0");
        assert_eq!(env.node_var().name(), "this3");
    }

    #[test]
    fn test_prefix() {
        let env = QueryAstEnv::with_prefix("create_");
        assert_eq!(env.var().name(), "create_var0");
        assert_eq!(env.param(1).name(), "create_param0");
    }

    #[test]
    fn test_push_derives_new_scope() {
        let env = QueryAstEnv::new();
        let translation = TranslationContext::default();
        let root = QueryAstContext::new(&env, &translation);
        assert!(root.target().is_err());

        let parent = root.with_target(env.node_var());
        let child = parent.push(Some(env.node_var()), env.node_var());

        assert_eq!(parent.target().unwrap().name(), "this0");
        assert!(parent.relationship().is_none());
        assert_eq!(child.source().unwrap().name(), "this0");
        assert_eq!(child.relationship().unwrap().name(), "this1");
        assert_eq!(child.target().unwrap().name(), "this2");
    }

    #[test]
    fn test_auth_params() {
        let env = QueryAstEnv::new();
        let translation = TranslationContext::default();
        let ctx = QueryAstContext::new(&env, &translation);
        assert_eq!(ctx.is_authenticated_param().value(), &Value::Bool(false));
        assert_eq!(ctx.jwt_param().value(), &Value::empty_map());
    }
}
