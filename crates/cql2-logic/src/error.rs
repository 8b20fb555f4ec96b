// crates/cql2-logic/src/error.rs
// ============================================================================
// Module: CQL2 Errors
// Description: Error types for parsing, validating, and evaluating predicates.
// Purpose: Give callers structured diagnostics with byte offsets.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Parse failures carry the byte offset of the offending token so callers can
//! report client filter mistakes precisely. Evaluation failures are separate:
//! a predicate that cannot be evaluated against a record is treated as
//! non-matching by callers that fail closed.

use thiserror::Error;

// ============================================================================
// SECTION: Parse Errors
// ============================================================================

/// Errors raised while reading or validating a CQL2 expression.
///
/// # Invariants
/// - Positions are byte offsets into the original text input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Cql2Error {
    /// Input was empty or contained only whitespace.
    #[error("expression is empty")]
    EmptyInput,
    /// Input exceeded the configured size limit.
    #[error("expression exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    InputTooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual input length in bytes.
        actual_bytes: usize,
    },
    /// Input exceeded the configured nesting depth.
    #[error("expression nesting exceeds limit: depth {actual_depth} (max {max_depth})")]
    NestingTooDeep {
        /// Maximum allowed nesting depth.
        max_depth: usize,
        /// Depth reached when the error occurred.
        actual_depth: usize,
    },
    /// Unexpected token encountered during parsing.
    #[error("unexpected token `{found}` at {position}, expected {expected}")]
    UnexpectedToken {
        /// Human-friendly expectation summary.
        expected: &'static str,
        /// The token that was actually seen.
        found: String,
        /// Byte offset in the original input.
        position: usize,
    },
    /// A quoted string or identifier was not closed.
    #[error("unterminated literal starting at {position}")]
    UnterminatedLiteral {
        /// Byte offset of the opening quote.
        position: usize,
    },
    /// Numeric literal failed to parse.
    #[error("invalid number `{raw}` at {position}")]
    InvalidNumber {
        /// The raw numeric text.
        raw: String,
        /// Byte offset in the original input.
        position: usize,
    },
    /// Unexpected trailing input after a complete expression.
    #[error("unexpected trailing input at {position}")]
    TrailingInput {
        /// Byte offset where unexpected input begins.
        position: usize,
    },
    /// Structured (JSON) form did not describe a valid expression.
    #[error("invalid cql2-json: {0}")]
    InvalidJson(String),
    /// Operator received the wrong number of arguments.
    #[error("operator `{op}` does not accept {found} arguments")]
    InvalidArity {
        /// Operator name.
        op: String,
        /// Number of arguments supplied.
        found: usize,
    },
}

// ============================================================================
// SECTION: Evaluation Errors
// ============================================================================

/// Errors raised while evaluating a predicate against a JSON record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// Operand types cannot be compared by the operator.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// Operator or function has no in-process evaluator.
    #[error("unsupported operator: {0}")]
    Unsupported(String),
    /// A LIKE pattern could not be compiled.
    #[error("invalid like pattern: {0}")]
    InvalidPattern(String),
}
