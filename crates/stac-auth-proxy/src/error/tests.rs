// crates/stac-auth-proxy/src/error/tests.rs
// ============================================================================
// Module: Proxy Error Unit Tests
// Description: Status, body, and challenge rendering.
// Purpose: Keep reason codes stable for clients.
// Dependencies: super, serde_json
// ============================================================================

#![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

use axum::http::StatusCode;
use axum::http::header::WWW_AUTHENTICATE;
use serde_json::Value;
use serde_json::json;

use super::ProxyError;
use super::ReasonCode;

#[test]
fn statuses_follow_the_reason_table() {
    let table = [
        (ReasonCode::RootPathMismatch, 404),
        (ReasonCode::RecordNotFound, 404),
        (ReasonCode::MissingToken, 401),
        (ReasonCode::InvalidToken, 401),
        (ReasonCode::InsufficientScope, 403),
        (ReasonCode::PredicateDenied, 403),
        (ReasonCode::InvalidRequest, 400),
        (ReasonCode::MutationNotSupported, 501),
        (ReasonCode::FilterGeneratorFailed, 500),
        (ReasonCode::InvalidGeneratedFilter, 502),
        (ReasonCode::FilterGeneratorTimeout, 504),
        (ReasonCode::UpstreamUnavailable, 502),
        (ReasonCode::UpstreamInvalidResponse, 502),
        (ReasonCode::UpstreamTimeout, 504),
        (ReasonCode::SigningKeysUnavailable, 503),
    ];
    for (reason, status) in table {
        assert_eq!(reason.status().as_u16(), status, "{}", reason.as_str());
    }
}

#[test]
fn body_carries_code_and_description() {
    let response = ProxyError::not_found().into_response();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body, json!({"code": "record_not_found", "description": "Record not found."}));
    assert!(response.headers.get(WWW_AUTHENTICATE).is_none());
}

#[test]
fn unauthenticated_responses_carry_bearer_challenge() {
    let response = ProxyError::new(ReasonCode::MissingToken, "missing").into_response();
    assert_eq!(response.headers.get(WWW_AUTHENTICATE).unwrap(), "Bearer");
}

#[test]
fn scope_failures_name_required_scopes() {
    let required = vec!["collections:write".to_string(), "admin".to_string()];
    let response = ProxyError::insufficient_scope(&required).into_response();
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(
        response.headers.get(WWW_AUTHENTICATE).unwrap(),
        "Bearer error=\"insufficient_scope\", scope=\"collections:write admin\""
    );
}
