//! Variables and parameters.

use std::fmt;

use cyphergen_common::types::Value;

use super::expr::Expr;

/// A Cypher variable such as `this0` or `var3`.
///
/// Names are assigned eagerly by whoever creates the variable; the builder
/// never renames.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable(String);

impl Variable {
    /// Creates a variable with a fixed name.
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the variable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Returns an expression referencing this variable.
    #[must_use]
    pub fn expr(&self) -> Expr {
        Expr::Variable(self.clone())
    }

    /// Returns `variable.key`.
    #[must_use]
    pub fn property(&self, key: impl Into<String>) -> Expr {
        self.expr().property(key)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Variable> for Expr {
    fn from(v: Variable) -> Self {
        Expr::Variable(v)
    }
}

impl From<&Variable> for Expr {
    fn from(v: &Variable) -> Self {
        Expr::Variable(v.clone())
    }
}

/// A query parameter: a name plus the value bound to it.
///
/// The value travels with the expression tree and is collected into the
/// parameter map when the statement is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    value: Value,
}

impl Param {
    /// Creates a parameter.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns the parameter name (without `$`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the bound value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns an expression referencing this parameter.
    #[must_use]
    pub fn expr(&self) -> Expr {
        Expr::Param(self.clone())
    }
}

impl From<Param> for Expr {
    fn from(p: Param) -> Self {
        Expr::Param(p)
    }
}
