// crates/cql2-logic/src/json.rs
// ============================================================================
// Module: CQL2 JSON Form
// Description: Conversion between `Expr` and the structured cql2-json tree.
// Purpose: Read and write filters carried in JSON request bodies.
// Dependencies: serde, serde_json, crate::expr, crate::error
// ============================================================================

//! ## Overview
//! The structured form encodes operators as `{"op": ..., "args": [...]}`,
//! properties as `{"property": ...}`, and temporal literals as
//! `{"timestamp": ...}`, `{"date": ...}`, and `{"interval": [...]}`. GeoJSON
//! geometries and `{"bbox": [...]}` objects pass through unchanged.
//! `Serialize`/`Deserialize` for [`Expr`] go through this form.

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::Error as _;
use serde_json::Map;
use serde_json::Value;

use crate::error::Cql2Error;
use crate::expr::Expr;
use crate::expr::MAX_EXPR_DEPTH;
use crate::expr::Op;

// ============================================================================
// SECTION: Public API
// ============================================================================

impl Expr {
    /// Builds an expression from a cql2-json value.
    ///
    /// # Errors
    ///
    /// Returns [`Cql2Error`] when the value does not describe an expression.
    pub fn from_json(value: &Value) -> Result<Self, Cql2Error> {
        let expr = read_value(value, 1)?;
        expr.validate()?;
        Ok(expr)
    }

    /// Parses cql2-json text.
    ///
    /// # Errors
    ///
    /// Returns [`Cql2Error::InvalidJson`] for malformed JSON or expressions.
    pub fn parse_json(input: &str) -> Result<Self, Cql2Error> {
        let value: Value =
            serde_json::from_str(input).map_err(|err| Cql2Error::InvalidJson(err.to_string()))?;
        Self::from_json(&value)
    }

    /// Serializes the expression to a cql2-json value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(value) => Value::Bool(*value),
            Self::String(value) => Value::String(value.clone()),
            Self::Number(number) => Value::Number(number.clone()),
            Self::Property(name) => tagged("property", Value::String(name.clone())),
            Self::Timestamp(value) => tagged("timestamp", Value::String(value.clone())),
            Self::Date(value) => tagged("date", Value::String(value.clone())),
            Self::Interval(bounds) => {
                tagged("interval", Value::Array(bounds.iter().map(Self::to_json).collect()))
            }
            Self::Geometry(geometry) => geometry.clone(),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Op {
                op,
                args,
            } => {
                let mut node = Map::new();
                node.insert("op".to_string(), Value::String(op.as_str().to_string()));
                node.insert(
                    "args".to_string(),
                    Value::Array(args.iter().map(Self::to_json).collect()),
                );
                Value::Object(node)
            }
        }
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(D::Error::custom)
    }
}

// ============================================================================
// SECTION: Reader
// ============================================================================

/// Builds a single-key object.
fn tagged(key: &str, value: Value) -> Value {
    let mut node = Map::new();
    node.insert(key.to_string(), value);
    Value::Object(node)
}

/// Reads a cql2-json value at the given depth.
fn read_value(value: &Value, depth: usize) -> Result<Expr, Cql2Error> {
    if depth > MAX_EXPR_DEPTH {
        return Err(Cql2Error::NestingTooDeep {
            max_depth: MAX_EXPR_DEPTH,
            actual_depth: depth,
        });
    }
    match value {
        Value::Bool(flag) => Ok(Expr::Bool(*flag)),
        Value::Number(number) => Ok(Expr::Number(number.clone())),
        Value::String(text) => Ok(Expr::String(text.clone())),
        Value::Array(items) => read_list(items, depth).map(Expr::Array),
        Value::Object(node) => read_object(node, depth),
        Value::Null => Err(Cql2Error::InvalidJson("null is not an expression".to_string())),
    }
}

/// Reads every element of a JSON array.
fn read_list(items: &[Value], depth: usize) -> Result<Vec<Expr>, Cql2Error> {
    items.iter().map(|item| read_value(item, depth + 1)).collect()
}

/// Reads a JSON object node.
fn read_object(node: &Map<String, Value>, depth: usize) -> Result<Expr, Cql2Error> {
    if let Some(op) = node.get("op") {
        let name = op
            .as_str()
            .ok_or_else(|| Cql2Error::InvalidJson("`op` must be a string".to_string()))?;
        let args = match node.get("args") {
            Some(Value::Array(items)) => read_list(items, depth)?,
            Some(single) => vec![read_value(single, depth + 1)?],
            None => Vec::new(),
        };
        let op = Op::from_name(name);
        op.check_arity(args.len())?;
        return Ok(Expr::op(op, args));
    }
    if let Some(name) = node.get("property") {
        return string_member(name, "property").map(Expr::Property);
    }
    if let Some(value) = node.get("timestamp") {
        return string_member(value, "timestamp").map(Expr::Timestamp);
    }
    if let Some(value) = node.get("date") {
        return string_member(value, "date").map(Expr::Date);
    }
    if let Some(bounds) = node.get("interval") {
        let Value::Array(items) = bounds else {
            return Err(Cql2Error::InvalidJson("`interval` must be an array".to_string()));
        };
        if items.len() != 2 {
            return Err(Cql2Error::InvalidArity {
                op: "interval".to_string(),
                found: items.len(),
            });
        }
        return read_list(items, depth).map(Expr::Interval);
    }
    if node.contains_key("type") || node.contains_key("bbox") {
        return Ok(Expr::Geometry(Value::Object(node.clone())));
    }
    Err(Cql2Error::InvalidJson("object is not a recognized expression node".to_string()))
}

/// Extracts a string member for tagged literal nodes.
fn string_member(value: &Value, key: &str) -> Result<String, Cql2Error> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Cql2Error::InvalidJson(format!("`{key}` must be a string")))
}
