// crates/cql2-logic/src/expr.rs
// ============================================================================
// Module: Predicate Expressions
// Description: Immutable CQL2 expression tree and logical combinators.
// Purpose: Represent row-level predicates and combine them without mutation.
// Dependencies: serde_json, crate::error
// ============================================================================

//! ## Overview
//! [`Expr`] is a tagged tree: an operator node with ordered arguments, a
//! property reference, or a literal. Nodes are never mutated after
//! construction; [`Expr::and`] and [`Expr::conjunction`] always build a new
//! tree. `TRUE` is the identity of conjunction and `FALSE` absorbs it.

use std::fmt;

use serde_json::Number;
use serde_json::Value;

use crate::error::Cql2Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum nesting depth accepted by both wire forms.
pub const MAX_EXPR_DEPTH: usize = 64;

// ============================================================================
// SECTION: Operators
// ============================================================================

/// Operator at the root of an [`Expr::Op`] node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Logical conjunction.
    And,
    /// Logical disjunction.
    Or,
    /// Logical negation.
    Not,
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// Wildcard string match.
    Like,
    /// Inclusive range test.
    Between,
    /// Membership in a literal list.
    In,
    /// Null or missing test.
    IsNull,
    /// Any other operator or function, stored lowercase (`casei`, `s_intersects`, ...).
    Function(String),
}

impl Op {
    /// Resolves an operator from its structured-form name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            "=" => Self::Eq,
            "<>" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "like" => Self::Like,
            "between" => Self::Between,
            "in" => Self::In,
            "isnull" => Self::IsNull,
            other => Self::Function(other.to_string()),
        }
    }

    /// Returns the structured-form operator name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "like",
            Self::Between => "between",
            Self::In => "in",
            Self::IsNull => "isNull",
            Self::Function(name) => name,
        }
    }

    /// Returns true for binary comparison operators.
    #[must_use]
    pub const fn is_comparison(&self) -> bool {
        matches!(self, Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }

    /// Checks the argument count for operators with a fixed shape.
    ///
    /// # Errors
    ///
    /// Returns [`Cql2Error::InvalidArity`] when the count does not fit.
    pub fn check_arity(&self, found: usize) -> Result<(), Cql2Error> {
        let ok = match self {
            Self::And | Self::Or => found >= 2,
            Self::Not | Self::IsNull => found == 1,
            Self::Between => found == 3,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::Like | Self::In => {
                found == 2
            }
            Self::Function(_) => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Cql2Error::InvalidArity {
                op: self.as_str().to_string(),
                found,
            })
        }
    }
}

// ============================================================================
// SECTION: Expression Tree
// ============================================================================

/// CQL2 expression node.
///
/// # Invariants
/// - `Op` nodes built by the parsers satisfy [`Op::check_arity`].
/// - `And`/`Or` nodes always carry at least two arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Boolean literal; `TRUE` and `FALSE` are the degenerate predicates.
    Bool(bool),
    /// String literal.
    String(String),
    /// Numeric literal.
    Number(Number),
    /// Reference to a record property.
    Property(String),
    /// Instant literal (`TIMESTAMP('...')`).
    Timestamp(String),
    /// Calendar date literal (`DATE('...')`).
    Date(String),
    /// Temporal interval literal with two bounds.
    Interval(Vec<Expr>),
    /// GeoJSON geometry, or `{"bbox": [...]}`.
    Geometry(Value),
    /// Array literal.
    Array(Vec<Expr>),
    /// Operator applied to ordered arguments.
    Op {
        /// Root operator.
        op: Op,
        /// Ordered arguments.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Predicate that places no restriction on rows.
    pub const TRUE: Self = Self::Bool(true);
    /// Predicate that denies every row.
    pub const FALSE: Self = Self::Bool(false);

    /// Builds an operator node.
    #[must_use]
    pub const fn op(op: Op, args: Vec<Self>) -> Self {
        Self::Op {
            op,
            args,
        }
    }

    /// Builds a property reference.
    #[must_use]
    pub fn property(name: impl Into<String>) -> Self {
        Self::Property(name.into())
    }

    /// Builds a string literal.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Builds a binary comparison.
    #[must_use]
    pub fn compare(op: Op, left: Self, right: Self) -> Self {
        Self::op(op, vec![left, right])
    }

    /// Builds a logical negation.
    #[must_use]
    pub fn negate(inner: Self) -> Self {
        Self::op(Op::Not, vec![inner])
    }

    /// Returns true for the `TRUE` predicate.
    #[must_use]
    pub const fn is_true(&self) -> bool {
        matches!(self, Self::Bool(true))
    }

    /// Returns true for the `FALSE` predicate.
    #[must_use]
    pub const fn is_false(&self) -> bool {
        matches!(self, Self::Bool(false))
    }

    /// Combines two predicates with logical AND, returning a new node.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        Self::conjunction([self.clone(), other.clone()])
    }

    /// Builds the conjunction of `parts`.
    ///
    /// Nested `And` nodes are flattened at every depth, structurally equal
    /// terms are kept once, `TRUE` terms are dropped, and any `FALSE` term
    /// yields `FALSE`. Applying the same term twice is therefore a no-op.
    #[must_use]
    pub fn conjunction(parts: impl IntoIterator<Item = Self>) -> Self {
        let mut terms: Vec<Self> = Vec::new();
        for part in parts {
            if !push_conjuncts(part, &mut terms) {
                return Self::FALSE;
            }
        }
        match terms.len() {
            0 => Self::TRUE,
            1 => terms.pop().unwrap_or(Self::TRUE),
            _ => Self::op(Op::And, terms),
        }
    }

    /// Validates operator arity and nesting depth for the whole tree.
    ///
    /// # Errors
    ///
    /// Returns [`Cql2Error`] for arity or depth violations.
    pub fn validate(&self) -> Result<(), Cql2Error> {
        self.validate_at(1)
    }

    /// Validates the subtree rooted at `self`, which sits at `depth`.
    fn validate_at(&self, depth: usize) -> Result<(), Cql2Error> {
        if depth > MAX_EXPR_DEPTH {
            return Err(Cql2Error::NestingTooDeep {
                max_depth: MAX_EXPR_DEPTH,
                actual_depth: depth,
            });
        }
        match self {
            Self::Op {
                op,
                args,
            } => {
                op.check_arity(args.len())?;
                args.iter().try_for_each(|arg| arg.validate_at(depth + 1))
            }
            Self::Array(items) | Self::Interval(items) => {
                items.iter().try_for_each(|item| item.validate_at(depth + 1))
            }
            _ => Ok(()),
        }
    }
}

/// Appends the conjuncts of `expr` to `terms`; returns false on a `FALSE` term.
fn push_conjuncts(expr: Expr, terms: &mut Vec<Expr>) -> bool {
    match expr {
        Expr::Op {
            op: Op::And,
            args,
        } => args.into_iter().all(|arg| push_conjuncts(arg, terms)),
        Expr::Bool(true) => true,
        Expr::Bool(false) => false,
        term => {
            if !terms.contains(&term) {
                terms.push(term);
            }
            true
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}
