//! Cypher expressions.

use cyphergen_common::types::Value;

use super::pattern::{Labels, Pattern};
use super::variable::{Param, Variable};

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `IN`
    In,
    /// `CONTAINS`
    Contains,
    /// `STARTS WITH`
    StartsWith,
    /// `ENDS WITH`
    EndsWith,
    /// `=~`
    Matches,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

impl BinaryOp {
    /// Cypher spelling of the operator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::In => "IN",
            BinaryOp::Contains => "CONTAINS",
            BinaryOp::StartsWith => "STARTS WITH",
            BinaryOp::EndsWith => "ENDS WITH",
            BinaryOp::Matches => "=~",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    /// Returns `true` for `+ - * /`.
    #[must_use]
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
        )
    }
}

/// List predicate functions: `any(x IN list WHERE p)` and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    /// `any`
    Any,
    /// `all`
    All,
    /// `none`
    None,
    /// `single`
    Single,
}

impl Quantifier {
    /// Cypher function name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Quantifier::Any => "any",
            Quantifier::All => "all",
            Quantifier::None => "none",
            Quantifier::Single => "single",
        }
    }
}

/// An entry of a map projection.
#[derive(Debug, Clone, PartialEq)]
pub enum MapItem {
    /// `.name`
    Property(String),
    /// `key: expr`
    Entry(String, Expr),
}

/// A Cypher expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A variable reference.
    Variable(Variable),
    /// A parameter reference (`$name`).
    Param(Param),
    /// An inline literal.
    Literal(Value),
    /// `subject.key`
    Property {
        /// Expression being accessed.
        subject: Box<Expr>,
        /// Property key.
        key: String,
    },
    /// `subject[from..to]`
    Slice {
        /// List being sliced.
        subject: Box<Expr>,
        /// Inclusive start.
        from: Option<Box<Expr>>,
        /// Exclusive end.
        to: Option<Box<Expr>>,
    },
    /// `left op right`
    Binary {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Conjunction.
    And(Vec<Expr>),
    /// Disjunction.
    Or(Vec<Expr>),
    /// `NOT (expr)`
    Not(Box<Expr>),
    /// `expr IS NULL`
    IsNull(Box<Expr>),
    /// `expr IS NOT NULL`
    IsNotNull(Box<Expr>),
    /// `subject:Label`
    HasLabels {
        /// Node variable.
        subject: Variable,
        /// Labels to check.
        labels: Labels,
    },
    /// `name(args)`
    Function {
        /// Function name, possibly namespaced.
        name: String,
        /// Arguments.
        args: Vec<Expr>,
        /// Whether the single argument is `DISTINCT`.
        distinct: bool,
    },
    /// `{key: value, ...}`
    Map(Vec<(String, Expr)>),
    /// `subject {.a, b: expr}`
    MapProjection {
        /// Projected variable.
        subject: Variable,
        /// Projection entries in output order.
        items: Vec<MapItem>,
    },
    /// `[a, b]`
    List(Vec<Expr>),
    /// `[x IN list WHERE p | m]`
    ListComprehension {
        /// Iteration variable.
        variable: Variable,
        /// Source list.
        list: Box<Expr>,
        /// Optional filter.
        predicate: Option<Box<Expr>>,
        /// Optional mapping.
        map: Option<Box<Expr>>,
    },
    /// `[(a)-->(b) WHERE p | m]`
    PatternComprehension {
        /// Pattern to match.
        pattern: Box<Pattern>,
        /// Optional filter.
        predicate: Option<Box<Expr>>,
        /// Mapping for each match.
        map: Box<Expr>,
    },
    /// `any(x IN list WHERE p)`
    Quantified {
        /// Which list predicate.
        quantifier: Quantifier,
        /// Iteration variable.
        variable: Variable,
        /// Source list.
        list: Box<Expr>,
        /// Predicate.
        predicate: Box<Expr>,
    },
    /// `EXISTS { MATCH pattern WHERE p }`
    Exists {
        /// Pattern to match.
        pattern: Box<Pattern>,
        /// Optional filter.
        predicate: Option<Box<Expr>>,
    },
    /// `CASE WHEN c THEN v ... ELSE e END`
    Case {
        /// `(condition, value)` pairs.
        branches: Vec<(Expr, Expr)>,
        /// Fallback value.
        otherwise: Option<Box<Expr>>,
    },
    /// `*`, as in `count(*)`.
    Star,
    /// Verbatim Cypher text.
    Raw(String),
}

impl Expr {
    /// An inline literal.
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// `NULL`
    #[must_use]
    pub fn null() -> Self {
        Expr::Literal(Value::Null)
    }

    /// `self.key`
    #[must_use]
    pub fn property(self, key: impl Into<String>) -> Self {
        Expr::Property {
            subject: Box::new(self),
            key: key.into(),
        }
    }

    /// `self op right`
    #[must_use]
    pub fn binary(self, op: BinaryOp, right: impl Into<Expr>) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right.into()),
        }
    }

    /// `self = right`
    #[must_use]
    pub fn eq(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, right)
    }

    /// `self > right`
    #[must_use]
    pub fn gt(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, right)
    }

    /// `self IN right`
    #[must_use]
    pub fn in_list(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::In, right)
    }

    /// `self + right`
    #[must_use]
    pub fn add(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Add, right)
    }

    /// `NOT (self)`
    #[must_use]
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// `self IS NULL`
    #[must_use]
    pub fn is_null(self) -> Self {
        Expr::IsNull(Box::new(self))
    }

    /// `self IS NOT NULL`
    #[must_use]
    pub fn is_not_null(self) -> Self {
        Expr::IsNotNull(Box::new(self))
    }

    /// `name(args)`
    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
            distinct: false,
        }
    }

    /// `name(DISTINCT arg)`
    pub fn function_distinct(name: impl Into<String>, arg: Expr) -> Self {
        Expr::Function {
            name: name.into(),
            args: vec![arg],
            distinct: true,
        }
    }

    /// `count(expr)`
    #[must_use]
    pub fn count(expr: impl Into<Expr>) -> Self {
        Expr::function("count", vec![expr.into()])
    }

    /// `collect(expr)`
    #[must_use]
    pub fn collect(expr: impl Into<Expr>) -> Self {
        Expr::function("collect", vec![expr.into()])
    }

    /// `head(expr)`
    #[must_use]
    pub fn head(expr: Expr) -> Self {
        Expr::function("head", vec![expr])
    }

    /// `size(expr)`
    #[must_use]
    pub fn size(expr: Expr) -> Self {
        Expr::function("size", vec![expr])
    }

    /// `{key: value, ...}` from string-keyed entries.
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Expr)>,
        K: Into<String>,
    {
        Expr::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// `label check` on a variable.
    #[must_use]
    pub fn has_labels(subject: &Variable, labels: Labels) -> Self {
        Expr::HasLabels {
            subject: subject.clone(),
            labels,
        }
    }

    /// `EXISTS { MATCH pattern [WHERE predicate] }`
    #[must_use]
    pub fn exists(pattern: Pattern, predicate: Option<Expr>) -> Self {
        Expr::Exists {
            pattern: Box::new(pattern),
            predicate: predicate.map(Box::new),
        }
    }

    /// Conjunction of zero or more predicates.
    ///
    /// Returns `None` for an empty input and the predicate itself for a
    /// single one. Nested conjunctions are flattened, so `AND(AND(a, b), c)`
    /// and `AND(a, b, c)` are the same expression.
    pub fn and_all(predicates: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        let mut flat = Vec::new();
        for predicate in predicates {
            match predicate {
                Expr::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Expr::And(flat)),
        }
    }

    /// Disjunction of zero or more predicates, flattened like [`Expr::and_all`].
    pub fn or_all(predicates: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        let mut flat = Vec::new();
        for predicate in predicates {
            match predicate {
                Expr::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Expr::Or(flat)),
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}
