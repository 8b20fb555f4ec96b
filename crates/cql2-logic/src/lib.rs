// crates/cql2-logic/src/lib.rs
// ============================================================================
// Module: CQL2 Logic Root
// Description: Public API surface for CQL2 predicate handling.
// Purpose: Wire together the expression tree, both wire forms, and evaluation.
// Dependencies: crate::{error, eval, expr, json, text}
// ============================================================================

//! ## Overview
//! Row-level access predicates are CQL2 expressions. This crate parses them
//! from cql2-text and cql2-json, serializes them back to either form without
//! changing their meaning, combines them with logical AND, and evaluates them
//! against JSON records.
//!
//! ```
//! use cql2_logic::Expr;
//!
//! let generated = Expr::parse_text("collection = 'public'").unwrap();
//! let client = Expr::parse_text("\"eo:cloud_cover\" < 10").unwrap();
//! let combined = generated.and(&client);
//! assert_eq!(
//!     combined.to_text(),
//!     "((collection = 'public') AND (\"eo:cloud_cover\" < 10))"
//! );
//! ```

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod error;
pub mod eval;
pub mod expr;
pub mod json;
pub mod text;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::Cql2Error;
pub use error::EvalError;
pub use expr::Expr;
pub use expr::MAX_EXPR_DEPTH;
pub use expr::Op;

// ============================================================================
// SECTION: Filter Languages
// ============================================================================

/// Wire form of a filter, as named by the `filter-lang` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterLang {
    /// Infix text form.
    Cql2Text,
    /// Structured JSON form.
    Cql2Json,
}

impl FilterLang {
    /// Parses a `filter-lang` value.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "cql2-text" => Some(Self::Cql2Text),
            "cql2-json" => Some(Self::Cql2Json),
            _ => None,
        }
    }

    /// Returns the `filter-lang` value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cql2Text => "cql2-text",
            Self::Cql2Json => "cql2-json",
        }
    }

    /// Parses `input` in this language.
    ///
    /// # Errors
    ///
    /// Returns [`Cql2Error`] when the input is not a valid expression.
    pub fn parse_expr(self, input: &str) -> Result<Expr, Cql2Error> {
        match self {
            Self::Cql2Text => Expr::parse_text(input),
            Self::Cql2Json => Expr::parse_json(input),
        }
    }

    /// Serializes `expr` in this language.
    #[must_use]
    pub fn render(self, expr: &Expr) -> String {
        match self {
            Self::Cql2Text => expr.to_text(),
            Self::Cql2Json => expr.to_json().to_string(),
        }
    }
}
