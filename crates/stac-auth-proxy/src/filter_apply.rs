// crates/stac-auth-proxy/src/filter_apply.rs
// ============================================================================
// Module: Predicate Application
// Description: Merges predicates into requests and validates fetched records.
// Purpose: Enforce row-level filtering without upstream cooperation.
// Dependencies: cql2-logic, serde_json, tracing, crate::{exchange, error}
// ============================================================================

//! ## Overview
//! Listings and searches get the predicate ANDed into the client's filter:
//! query parameters for `GET` (default `cql2-text`), the JSON body for
//! `POST` (default `cql2-json`). The client's `filter-lang` is kept.
//! Single-record reads are validated after the fact; a record that fails the
//! predicate is reported as missing so its existence does not leak.
//! Combination flattens and de-duplicates terms, so applying the same
//! predicate twice leaves the request unchanged.

use cql2_logic::Expr;
use cql2_logic::FilterLang;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;

use crate::error::ProxyError;
use crate::error::ReasonCode;
use crate::exchange::ProxyRequest;
use crate::exchange::ProxyResponse;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Filter parameter / body field.
pub const FILTER_KEY: &str = "filter";
/// Filter language parameter / body field.
pub const FILTER_LANG_KEY: &str = "filter-lang";

// ============================================================================
// SECTION: Request Merging
// ============================================================================

/// ANDs `predicate` into the request's `filter` query parameter.
///
/// # Errors
///
/// Returns `invalid_request` when the client filter or language is invalid.
pub fn apply_to_query(request: &mut ProxyRequest, predicate: &Expr) -> Result<(), ProxyError> {
    let lang = match request.query_value(FILTER_LANG_KEY) {
        Some(raw) => parse_lang(raw)?,
        None => FilterLang::Cql2Text,
    };
    let mut terms = vec![predicate.clone()];
    for raw in request.query_values(FILTER_KEY) {
        terms.push(lang.parse_expr(raw).map_err(invalid_client_filter)?);
    }
    let combined = Expr::conjunction(terms);
    request.set_query(FILTER_KEY, lang.render(&combined));
    request.set_query(FILTER_LANG_KEY, lang.as_str());
    Ok(())
}

/// ANDs `predicate` into the `filter` field of a JSON search body.
///
/// # Errors
///
/// Returns `invalid_request` when the body is not a JSON object or the
/// client filter cannot be parsed.
pub fn apply_to_body(request: &mut ProxyRequest, predicate: &Expr) -> Result<(), ProxyError> {
    let mut body = json_object_body(request)?;
    let lang = match body.get(FILTER_LANG_KEY) {
        Some(Value::String(raw)) => parse_lang(raw)?,
        Some(_) => {
            return Err(ProxyError::new(
                ReasonCode::InvalidRequest,
                "`filter-lang` must be a string",
            ));
        }
        None => FilterLang::Cql2Json,
    };
    let mut terms = vec![predicate.clone()];
    match body.get(FILTER_KEY) {
        None | Some(Value::Null) => {}
        Some(Value::String(raw)) => {
            terms.push(lang.parse_expr(raw).map_err(invalid_client_filter)?);
        }
        Some(structured) => {
            terms.push(Expr::from_json(structured).map_err(invalid_client_filter)?);
        }
    }
    let combined = Expr::conjunction(terms);
    let rendered = match lang {
        FilterLang::Cql2Json => combined.to_json(),
        FilterLang::Cql2Text => Value::String(combined.to_text()),
    };
    body.insert(FILTER_KEY.to_string(), rendered);
    body.insert(FILTER_LANG_KEY.to_string(), Value::String(lang.as_str().to_string()));
    request.set_json_body(&Value::Object(body));
    Ok(())
}

// ============================================================================
// SECTION: Record Validation
// ============================================================================

/// Returns whether `record` satisfies `predicate`; evaluation errors count as
/// a non-match.
#[must_use]
pub fn record_satisfies(predicate: &Expr, record: &Value) -> bool {
    match predicate.matches(record) {
        Ok(matched) => matched,
        Err(err) => {
            debug!(error = %err, "predicate evaluation failed; treating as non-match");
            false
        }
    }
}

/// Validates a single-record upstream response against `predicate`.
///
/// Only 200 and 404 are inspected; both become `record_not_found` unless the
/// record satisfies the predicate.
///
/// # Errors
///
/// Returns `record_not_found` or `upstream_invalid_response`.
pub fn check_record(response: &ProxyResponse, predicate: &Expr) -> Result<(), ProxyError> {
    match response.status.as_u16() {
        404 => Err(ProxyError::not_found()),
        200 => {
            let record = response.json_body().ok_or_else(|| {
                ProxyError::new(
                    ReasonCode::UpstreamInvalidResponse,
                    "upstream record is not valid json",
                )
            })?;
            if record_satisfies(predicate, &record) {
                Ok(())
            } else {
                Err(ProxyError::not_found())
            }
        }
        _ => Ok(()),
    }
}

/// Checks every record a create request would write.
///
/// Bulk bodies (`{"items": {...}}` or `{"items": [...]}`) are checked per
/// item; anything else is checked as one record.
///
/// # Errors
///
/// Returns `invalid_request` for non-object bodies and `predicate_denied`
/// when any record fails the predicate.
pub fn check_create(request: &ProxyRequest, predicate: &Expr, bulk: bool) -> Result<(), ProxyError> {
    let body = Value::Object(json_object_body(request)?);
    let records: Vec<&Value> = match body.get("items") {
        Some(Value::Object(items)) if bulk => items.values().collect(),
        Some(Value::Array(items)) if bulk => items.iter().collect(),
        _ => vec![&body],
    };
    if records.iter().all(|record| record_satisfies(predicate, record)) {
        Ok(())
    } else {
        Err(denied())
    }
}

/// Checks the state an update would leave behind.
///
/// `PUT` bodies replace `current`; `PATCH` bodies are merged into it.
///
/// # Errors
///
/// Returns `invalid_request` for non-object bodies and `predicate_denied`
/// when the resulting record fails the predicate.
pub fn check_update(
    request: &ProxyRequest,
    current: &Value,
    predicate: &Expr,
    patch: bool,
) -> Result<(), ProxyError> {
    let body = Value::Object(json_object_body(request)?);
    let next = if patch {
        let mut merged = current.clone();
        merge_patch(&mut merged, &body);
        merged
    } else {
        body
    };
    if record_satisfies(predicate, &next) { Ok(()) } else { Err(denied()) }
}

/// Applies a JSON merge patch to `target`.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(changes) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(fields) = target {
        for (key, change) in changes {
            if change.is_null() {
                fields.remove(key);
            } else {
                merge_patch(fields.entry(key.clone()).or_insert(Value::Null), change);
            }
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a client `filter-lang` value.
fn parse_lang(raw: &str) -> Result<FilterLang, ProxyError> {
    FilterLang::parse(raw).ok_or_else(|| {
        ProxyError::new(ReasonCode::InvalidRequest, format!("unsupported filter-lang `{raw}`"))
    })
}

/// Maps a client filter parse error.
fn invalid_client_filter(err: cql2_logic::Cql2Error) -> ProxyError {
    ProxyError::new(ReasonCode::InvalidRequest, format!("invalid client filter: {err}"))
}

/// Returns the `predicate_denied` error.
fn denied() -> ProxyError {
    ProxyError::new(ReasonCode::PredicateDenied, "record would not satisfy the access filter")
}

/// Parses the request body as a JSON object; an empty body is `{}`.
fn json_object_body(request: &ProxyRequest) -> Result<Map<String, Value>, ProxyError> {
    if request.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice(&request.body) {
        Ok(Value::Object(body)) => Ok(body),
        Ok(_) => Err(ProxyError::new(ReasonCode::InvalidRequest, "body must be a JSON object")),
        Err(err) => {
            Err(ProxyError::new(ReasonCode::InvalidRequest, format!("body is not valid JSON: {err}")))
        }
    }
}

#[cfg(test)]
mod tests;
