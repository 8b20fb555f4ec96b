// crates/cql2-logic/src/eval.rs
// ============================================================================
// Module: Predicate Evaluation
// Description: Evaluates an `Expr` against a JSON record.
// Purpose: Decide whether a fetched collection or item satisfies a predicate.
// Dependencies: regex, serde_json, crate::expr, crate::error
// ============================================================================

//! ## Overview
//! Evaluation is read-only: the predicate tree is borrowed and never altered.
//! Properties resolve against the record's top level first, then its
//! `properties` object, then as a dotted path. Missing properties evaluate to
//! null, and any comparison involving null is false. Spatial and temporal
//! relation operators have no in-process evaluator and return
//! [`EvalError::Unsupported`]; callers treat that as a non-match.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;

use crate::error::EvalError;
use crate::expr::Expr;
use crate::expr::Op;

// ============================================================================
// SECTION: Public API
// ============================================================================

impl Expr {
    /// Returns whether `record` satisfies the predicate.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] for type mismatches or unsupported operators.
    pub fn matches(&self, record: &Value) -> Result<bool, EvalError> {
        eval_bool(self, record)
    }
}

// ============================================================================
// SECTION: Boolean Evaluation
// ============================================================================

/// Evaluates an expression in boolean position.
fn eval_bool(expr: &Expr, record: &Value) -> Result<bool, EvalError> {
    let Expr::Op {
        op,
        args,
    } = expr
    else {
        return match eval_scalar(expr, record)? {
            Value::Bool(flag) => Ok(flag),
            Value::Null => Ok(false),
            other => Err(EvalError::TypeMismatch(format!("expected boolean, found {other}"))),
        };
    };
    match (op, args.as_slice()) {
        (Op::And, _) => {
            for arg in args {
                if !eval_bool(arg, record)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Op::Or, _) => {
            for arg in args {
                if eval_bool(arg, record)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (Op::Not, [inner]) => Ok(!eval_bool(inner, record)?),
        (Op::IsNull, [inner]) => Ok(eval_scalar(inner, record)?.is_null()),
        (Op::Like, [value, pattern]) => {
            let value = eval_scalar(value, record)?;
            let pattern = eval_scalar(pattern, record)?;
            match (value.as_str(), pattern.as_str()) {
                (Some(text), Some(pattern)) => Ok(like_regex(pattern)?.is_match(text)),
                _ => Ok(false),
            }
        }
        (Op::Between, [value, low, high]) => {
            let value = eval_scalar(value, record)?;
            let low = eval_scalar(low, record)?;
            let high = eval_scalar(high, record)?;
            let above = compare(&value, &low)?.is_some_and(Ordering::is_ge);
            let below = compare(&value, &high)?.is_some_and(Ordering::is_le);
            Ok(above && below)
        }
        (Op::In, [value, list]) => {
            let value = eval_scalar(value, record)?;
            let Value::Array(items) = eval_scalar(list, record)? else {
                return Err(EvalError::TypeMismatch("IN requires a list".to_string()));
            };
            Ok(items.iter().any(|item| loosely_equal(&value, item)))
        }
        (op, [left, right]) if op.is_comparison() => {
            let left = eval_scalar(left, record)?;
            let right = eval_scalar(right, record)?;
            if left.is_null() || right.is_null() {
                return Ok(false);
            }
            Ok(match op {
                Op::Eq => loosely_equal(&left, &right),
                Op::Ne => !loosely_equal(&left, &right),
                _ => compare(&left, &right)?.is_some_and(|ordering| match op {
                    Op::Lt => ordering.is_lt(),
                    Op::Le => ordering.is_le(),
                    Op::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }),
            })
        }
        (Op::Function(name), [left, right]) if name.starts_with("a_") => {
            array_relation(name, &eval_scalar(left, record)?, &eval_scalar(right, record)?)
        }
        (op, _) => Err(EvalError::Unsupported(op.as_str().to_string())),
    }
}

// ============================================================================
// SECTION: Scalar Evaluation
// ============================================================================

/// Evaluates an expression to a JSON value.
fn eval_scalar(expr: &Expr, record: &Value) -> Result<Value, EvalError> {
    match expr {
        Expr::Bool(flag) => Ok(Value::Bool(*flag)),
        Expr::String(text) | Expr::Timestamp(text) | Expr::Date(text) => {
            Ok(Value::String(text.clone()))
        }
        Expr::Number(number) => Ok(Value::Number(number.clone())),
        Expr::Property(name) => Ok(resolve_property(record, name).cloned().unwrap_or(Value::Null)),
        Expr::Array(items) => items
            .iter()
            .map(|item| eval_scalar(item, record))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Op {
            op: Op::Function(name),
            args,
        } if name == "casei" => match args.as_slice() {
            [inner] => Ok(match eval_scalar(inner, record)? {
                Value::String(text) => Value::String(text.to_lowercase()),
                other => other,
            }),
            _ => Err(EvalError::TypeMismatch("casei takes one argument".to_string())),
        },
        Expr::Op {
            ..
        } => eval_bool(expr, record).map(Value::Bool),
        Expr::Interval(_) | Expr::Geometry(_) => {
            Err(EvalError::Unsupported("spatial or interval literal".to_string()))
        }
    }
}

/// Resolves a property against the record.
fn resolve_property<'a>(record: &'a Value, name: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(name) {
        return Some(value);
    }
    if let Some(value) = record.get("properties").and_then(|props| props.get(name)) {
        return Some(value);
    }
    name.split('.').try_fold(record, |current, segment| current.get(segment))
}

// ============================================================================
// SECTION: Comparison Helpers
// ============================================================================

/// Equality with numeric values compared by magnitude.
fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => left == right,
    }
}

/// Orders two values of the same kind; `None` when either side is null.
fn compare(left: &Value, right: &Value) -> Result<Option<Ordering>, EvalError> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(None),
        (Value::Number(_), Value::Number(_)) => {
            let a = left.as_f64().unwrap_or_default();
            let b = right.as_f64().unwrap_or_default();
            Ok(a.partial_cmp(&b))
        }
        (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
        (Value::Bool(a), Value::Bool(b)) => Ok(Some(a.cmp(b))),
        _ => Err(EvalError::TypeMismatch(format!("cannot order {left} against {right}"))),
    }
}

/// Translates a LIKE pattern (`%`, `_`, `\` escape) into an anchored regex.
fn like_regex(pattern: &str) -> Result<Regex, EvalError> {
    let mut source = String::from("^");
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    source.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source).map_err(|err| EvalError::InvalidPattern(err.to_string()))
}

/// Evaluates the `a_*` array relation functions.
fn array_relation(name: &str, left: &Value, right: &Value) -> Result<bool, EvalError> {
    let (Some(left), Some(right)) = (left.as_array(), right.as_array()) else {
        return Ok(false);
    };
    let contains_all =
        |outer: &[Value], inner: &[Value]| inner.iter().all(|item| outer.contains(item));
    match name {
        "a_contains" => Ok(contains_all(left, right)),
        "a_containedby" => Ok(contains_all(right, left)),
        "a_overlaps" => Ok(left.iter().any(|item| right.contains(item))),
        "a_equals" => Ok(contains_all(left, right) && contains_all(right, left)),
        other => Err(EvalError::Unsupported(other.to_string())),
    }
}
