// crates/stac-auth-proxy-filters/src/generator.rs
// ============================================================================
// Module: Filter Generator Capability
// Description: Request context, generator trait, and generator errors.
// Purpose: Define the seam between the pipeline and predicate producers.
// Dependencies: async-trait, cql2-logic, serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! A [`FilterGenerator`] turns a [`FilterContext`] into a CQL2 predicate. The
//! pipeline invokes the generator bound to the request's resource kind at
//! most once per request, bounded by [`generate_with_timeout`].
//! Security posture: generator output is untrusted and is parsed before use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use cql2_logic::Expr;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Request attributes exposed to generators under `req`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestInfo {
    /// Prefix-stripped request path.
    pub path: String,
    /// Uppercase HTTP method.
    pub method: String,
    /// Query parameters (first value wins).
    pub query_params: BTreeMap<String, String>,
    /// Route parameters (`collection_id`, `item_id`).
    pub path_params: BTreeMap<String, String>,
    /// Request headers keyed by lowercase name.
    pub headers: BTreeMap<String, String>,
}

/// Context handed to a filter generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterContext {
    /// Request attributes.
    pub req: RequestInfo,
    /// Verified token claims, when authenticated.
    pub payload: Option<Value>,
    /// True when a valid token accompanied the request.
    pub authenticated: bool,
    /// Scopes granted by the token.
    pub scopes: Vec<String>,
}

impl FilterContext {
    /// Returns the JSON form used by templates and remote policy engines.
    #[must_use]
    pub fn as_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Resolves a dotted path (`req.headers.authorization`) inside a JSON value.
#[must_use]
pub fn value_at_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |current, segment| current.get(segment))
}

// ============================================================================
// SECTION: Generator Trait
// ============================================================================

/// Produces a row-level predicate for a request.
#[async_trait]
pub trait FilterGenerator: Send + Sync {
    /// Generates the predicate for `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] when the generator fails or its output is not
    /// a valid expression.
    async fn generate(&self, ctx: &FilterContext) -> Result<Expr, FilterError>;
}

/// Invokes `generator` with a per-call deadline.
///
/// # Errors
///
/// Returns [`FilterError::Timeout`] when the deadline passes, otherwise the
/// generator's own error.
pub async fn generate_with_timeout(
    generator: &dyn FilterGenerator,
    ctx: &FilterContext,
    timeout: Duration,
) -> Result<Expr, FilterError> {
    tokio::time::timeout(timeout, generator.generate(ctx))
        .await
        .map_err(|_| FilterError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)))?
}

/// Parses textual generator output.
///
/// Output is trimmed; empty output denies every row, a JSON object is read
/// as cql2-json, anything else as cql2-text.
///
/// # Errors
///
/// Returns [`FilterError::InvalidOutput`] when the output is not a valid
/// expression.
pub fn parse_generated(output: &str) -> Result<Expr, FilterError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Expr::FALSE);
    }
    if trimmed.starts_with('{')
        && let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed)
    {
        return Expr::from_json(&value).map_err(|err| FilterError::InvalidOutput(err.to_string()));
    }
    Expr::parse_text(trimmed).map_err(|err| FilterError::InvalidOutput(err.to_string()))
}

/// Reads a structured generator result (`string`, `object`, or `bool`).
///
/// # Errors
///
/// Returns [`FilterError::InvalidOutput`] for other shapes or invalid
/// expressions.
pub fn parse_generated_value(value: &Value) -> Result<Expr, FilterError> {
    match value {
        Value::String(text) => parse_generated(text),
        Value::Object(_) => {
            Expr::from_json(value).map_err(|err| FilterError::InvalidOutput(err.to_string()))
        }
        Value::Bool(flag) => Ok(Expr::Bool(*flag)),
        other => Err(FilterError::InvalidOutput(format!("unsupported filter result: {other}"))),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Filter generation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The generator raised.
    #[error("filter generator failed: {0}")]
    Generator(String),
    /// The generator exceeded its per-call deadline.
    #[error("filter generator timed out after {0} ms")]
    Timeout(u64),
    /// The generator produced something that is not a CQL2 expression.
    #[error("invalid generated filter: {0}")]
    InvalidOutput(String),
    /// No generator is registered under the configured identifier.
    #[error("unknown filter generator: {0}")]
    UnknownGenerator(String),
    /// Generator construction arguments are invalid.
    #[error("invalid filter generator config: {0}")]
    Config(String),
}
