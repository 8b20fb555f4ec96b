// crates/stac-auth-proxy/src/filter_apply/tests.rs
// ============================================================================
// Module: Predicate Application Unit Tests
// Description: Query/body merging, idempotence, and record validation.
// Purpose: Ensure predicates are enforced exactly once per request.
// Dependencies: super, cql2-logic, serde_json
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use axum::http::Method;
use axum::http::StatusCode;
use cql2_logic::Expr;
use serde_json::Value;
use serde_json::json;

use super::apply_to_body;
use super::apply_to_query;
use super::check_create;
use super::check_record;
use super::check_update;
use super::merge_patch;
use crate::error::ReasonCode;
use crate::exchange::ProxyRequest;
use crate::exchange::ProxyResponse;

fn predicate() -> Expr {
    Expr::parse_text("owner = 'alice'").unwrap()
}

fn body_of(request: &ProxyRequest) -> Value {
    serde_json::from_slice(&request.body).unwrap()
}

#[test]
fn query_gets_filter_when_client_sent_none() {
    let mut request = ProxyRequest::new(Method::GET, "/search").with_raw_query(Some("limit=5"));
    apply_to_query(&mut request, &predicate()).unwrap();
    assert_eq!(request.query_value("filter"), Some(predicate().to_text().as_str()));
    assert_eq!(request.query_value("filter-lang"), Some("cql2-text"));
    assert_eq!(request.query_value("limit"), Some("5"));
}

#[test]
fn query_filter_is_anded_with_client_filter() {
    let mut request = ProxyRequest::new(Method::GET, "/collections/a/items")
        .with_raw_query(Some("filter=eo%3Acloud_cover%20%3C%2010"));
    apply_to_query(&mut request, &predicate()).unwrap();
    let merged = Expr::parse_text(request.query_value("filter").unwrap()).unwrap();
    let expected = Expr::conjunction([predicate(), Expr::parse_text("eo:cloud_cover < 10").unwrap()]);
    assert_eq!(merged, expected);
}

#[test]
fn applying_twice_does_not_duplicate_the_term() {
    let mut request =
        ProxyRequest::new(Method::GET, "/search").with_raw_query(Some("filter=a%20%3D%201"));
    apply_to_query(&mut request, &predicate()).unwrap();
    let once = request.query.clone();
    apply_to_query(&mut request, &predicate()).unwrap();
    assert_eq!(request.query, once);
}

#[test]
fn short_array_predicates_apply_idempotently() {
    let predicates = [
        Expr::from_json(&json!({"op": "in", "args": [{"property": "collection"}, []]})).unwrap(),
        Expr::from_json(&json!({"op": "a_contains", "args": [{"property": "tags"}, ["optical"]]}))
            .unwrap(),
    ];
    for predicate in predicates {
        let mut request = ProxyRequest::new(Method::GET, "/search");
        apply_to_query(&mut request, &predicate).unwrap();
        let once = request.query.clone();
        let sent = Expr::parse_text(request.query_value("filter").unwrap()).unwrap();
        assert_eq!(sent, predicate);
        apply_to_query(&mut request, &predicate).unwrap();
        assert_eq!(request.query, once);
    }
}

#[test]
fn query_keeps_client_json_language() {
    let client = r#"{"op":"=","args":[{"property":"a"},1]}"#;
    let mut request = ProxyRequest::new(Method::GET, "/search");
    request.query.push(("filter-lang".to_string(), "cql2-json".to_string()));
    request.query.push(("filter".to_string(), client.to_string()));
    apply_to_query(&mut request, &predicate()).unwrap();
    let rendered: Value = serde_json::from_str(request.query_value("filter").unwrap()).unwrap();
    assert_eq!(rendered["op"], "and");
    assert_eq!(request.query_value("filter-lang"), Some("cql2-json"));
}

#[test]
fn unparsable_client_filter_is_a_bad_request() {
    let mut request =
        ProxyRequest::new(Method::GET, "/search").with_raw_query(Some("filter=a%20%3D%20%3D"));
    let err = apply_to_query(&mut request, &predicate()).unwrap_err();
    assert_eq!(err.reason, ReasonCode::InvalidRequest);
    let mut request =
        ProxyRequest::new(Method::GET, "/search").with_raw_query(Some("filter-lang=sql"));
    assert_eq!(apply_to_query(&mut request, &predicate()).unwrap_err().reason, ReasonCode::InvalidRequest);
}

#[test]
fn search_body_gets_structured_filter() {
    let mut request =
        ProxyRequest::new(Method::POST, "/search").with_body(r#"{"collections": ["a"]}"#);
    apply_to_body(&mut request, &predicate()).unwrap();
    let body = body_of(&request);
    assert_eq!(body["filter"], predicate().to_json());
    assert_eq!(body["filter-lang"], "cql2-json");
    assert_eq!(body["collections"], json!(["a"]));
}

#[test]
fn search_body_merges_text_filter_in_text_form() {
    let mut request = ProxyRequest::new(Method::POST, "/search")
        .with_body(r#"{"filter": "a = 1", "filter-lang": "cql2-text"}"#);
    apply_to_body(&mut request, &predicate()).unwrap();
    let body = body_of(&request);
    let merged = Expr::parse_text(body["filter"].as_str().unwrap()).unwrap();
    assert_eq!(merged, Expr::conjunction([predicate(), Expr::parse_text("a = 1").unwrap()]));
}

#[test]
fn empty_search_body_is_an_empty_object() {
    let mut request = ProxyRequest::new(Method::POST, "/search");
    apply_to_body(&mut request, &predicate()).unwrap();
    assert_eq!(body_of(&request)["filter"], predicate().to_json());
}

#[test]
fn non_object_search_body_is_rejected() {
    let mut request = ProxyRequest::new(Method::POST, "/search").with_body("[1, 2]");
    let err = apply_to_body(&mut request, &predicate()).unwrap_err();
    assert_eq!(err.reason, ReasonCode::InvalidRequest);
}

#[test]
fn record_that_fails_predicate_is_not_found() {
    let response = ProxyResponse::new(StatusCode::OK, r#"{"id": "x", "owner": "bob"}"#);
    assert_eq!(check_record(&response, &predicate()).unwrap_err().reason, ReasonCode::RecordNotFound);
    let response = ProxyResponse::new(StatusCode::OK, r#"{"id": "x", "properties": {"owner": "alice"}}"#);
    assert!(check_record(&response, &predicate()).is_ok());
}

#[test]
fn upstream_404_and_garbage_are_classified() {
    let missing = ProxyResponse::new(StatusCode::NOT_FOUND, "{}");
    assert_eq!(check_record(&missing, &predicate()).unwrap_err().reason, ReasonCode::RecordNotFound);
    let garbage = ProxyResponse::new(StatusCode::OK, "<html>");
    assert_eq!(
        check_record(&garbage, &predicate()).unwrap_err().reason,
        ReasonCode::UpstreamInvalidResponse
    );
    let error = ProxyResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "oops");
    assert!(check_record(&error, &predicate()).is_ok());
}

#[test]
fn unsupported_operators_count_as_non_match() {
    let spatial = Expr::parse_text("S_INTERSECTS(geometry, POINT(0 0))");
    if let Ok(spatial) = spatial {
        let response = ProxyResponse::new(StatusCode::OK, r#"{"id": "x"}"#);
        assert!(check_record(&response, &spatial).is_err());
    }
}

#[test]
fn bulk_create_checks_every_item() {
    let request = ProxyRequest::new(Method::POST, "/collections/a/bulk_items").with_body(
        r#"{"items": {"1": {"owner": "alice"}, "2": {"owner": "bob"}}}"#,
    );
    assert_eq!(check_create(&request, &predicate(), true).unwrap_err().reason, ReasonCode::PredicateDenied);
    let request = ProxyRequest::new(Method::POST, "/collections").with_body(r#"{"owner": "alice"}"#);
    assert!(check_create(&request, &predicate(), false).is_ok());
}

#[test]
fn patch_is_checked_against_merged_record() {
    let current = json!({"id": "x", "owner": "alice", "title": "t"});
    let request = ProxyRequest::new(Method::PATCH, "/collections/x").with_body(r#"{"title": "new"}"#);
    assert!(check_update(&request, &current, &predicate(), true).is_ok());
    let request = ProxyRequest::new(Method::PUT, "/collections/x").with_body(r#"{"title": "new"}"#);
    assert_eq!(
        check_update(&request, &current, &predicate(), false).unwrap_err().reason,
        ReasonCode::PredicateDenied
    );
}

#[test]
fn merge_patch_removes_nulls_and_recurses() {
    let mut target = json!({"a": 1, "b": {"c": 2, "d": 3}});
    merge_patch(&mut target, &json!({"a": null, "b": {"c": 5}, "e": [1]}));
    assert_eq!(target, json!({"b": {"c": 5, "d": 3}, "e": [1]}));
}
