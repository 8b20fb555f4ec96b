// crates/stac-auth-proxy/tests/proxy_scenarios.rs
// ============================================================================
// Module: Proxy Scenario Tests
// Description: End-to-end runs through the router against mock dependencies.
// Purpose: Pin filtering, scope enforcement, record hiding, and key rotation.
// Dependencies: stac-auth-proxy, wiremock, jsonwebtoken, tokio
// ============================================================================

//! End-to-end proxy scenarios driven through the axum router.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap for clarity."
)]

mod common;

use axum::http::StatusCode;
use cql2_logic::Expr;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use stac_auth_proxy::ProxyServer;
use stac_auth_proxy_config::EndpointRule;
use stac_auth_proxy_config::FilterBinding;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;

use crate::common::identity_provider;
use crate::common::jwks_fetches;
use crate::common::key_one;
use crate::common::key_two;
use crate::common::proxy_config;
use crate::common::publish_keys;
use crate::common::request;
use crate::common::send;
use crate::common::upstream_hits;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn template(text: &str) -> FilterBinding {
    FilterBinding {
        generator: "template".to_string(),
        args: vec![Value::String(text.to_string())],
        kwargs: Map::new(),
    }
}

fn filter_param(request: &wiremock::Request) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(key, _)| key == "filter")
        .map(|(_, value)| value.into_owned())
}

async fn mount_json(server: &MockServer, verb: &str, route: &str, status: u16, body: Value) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

// ============================================================================
// SECTION: Scenarios
// ============================================================================

#[tokio::test]
async fn anonymous_listing_is_forwarded_with_the_predicate() {
    let upstream = MockServer::start().await;
    let idp = identity_provider(&[key_one()]).await;
    mount_json(&upstream, "GET", "/collections", 200, json!({"collections": [], "links": []})).await;
    let mut config = proxy_config(&upstream, &idp);
    config.access.default_public = true;
    config.filters.collections = Some(template("private = false"));
    let server = ProxyServer::from_config(config).unwrap();

    let response = send(&server, request("GET", "/collections", None, None)).await;

    assert_eq!(response.status, StatusCode::OK);
    let hits = upstream_hits(&upstream, "/collections").await;
    assert_eq!(hits.len(), 1);
    let expected = Expr::parse_text("private = false").unwrap().to_text();
    assert_eq!(filter_param(&hits[0]), Some(expected));
}

#[tokio::test]
async fn repeated_predicate_is_not_stacked() {
    let upstream = MockServer::start().await;
    let idp = identity_provider(&[key_one()]).await;
    mount_json(&upstream, "GET", "/collections", 200, json!({"collections": []})).await;
    let mut config = proxy_config(&upstream, &idp);
    config.access.default_public = true;
    config.filters.collections = Some(template("private = false"));
    let server = ProxyServer::from_config(config).unwrap();

    let response =
        send(&server, request("GET", "/collections?filter=private%20%3D%20false", None, None)).await;

    assert_eq!(response.status, StatusCode::OK);
    let hits = upstream_hits(&upstream, "/collections").await;
    let expected = Expr::parse_text("private = false").unwrap().to_text();
    assert_eq!(filter_param(&hits[0]), Some(expected));
}

#[tokio::test]
async fn create_without_required_scope_is_forbidden_and_not_forwarded() {
    let upstream = MockServer::start().await;
    let idp = identity_provider(&[key_one()]).await;
    mount_json(&upstream, "POST", "/collections", 201, json!({"id": "new"})).await;
    let mut config = proxy_config(&upstream, &idp);
    config.access.default_public = true;
    config.access.private_endpoints =
        vec![EndpointRule::new(r"^/collections$", &["POST"]).with_scopes(&["collections:write"])];
    let server = ProxyServer::from_config(config).unwrap();
    let token = key_one().mint(&json!({"sub": "alice", "scope": "items:read"}));

    let response = send(
        &server,
        request("POST", "/collections", Some(&token), Some(&json!({"id": "new"}))),
    )
    .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["code"], "insufficient_scope");
    let challenge = response.headers.get("www-authenticate").unwrap().to_str().unwrap();
    assert!(challenge.contains("collections:write"));
    assert!(upstream_hits(&upstream, "/collections").await.is_empty());
}

#[tokio::test]
async fn create_with_required_scope_is_forwarded() {
    let upstream = MockServer::start().await;
    let idp = identity_provider(&[key_one()]).await;
    mount_json(&upstream, "POST", "/collections", 201, json!({"id": "new"})).await;
    let mut config = proxy_config(&upstream, &idp);
    config.access.default_public = true;
    config.access.private_endpoints =
        vec![EndpointRule::new(r"^/collections$", &["POST"]).with_scopes(&["collections:write"])];
    let server = ProxyServer::from_config(config).unwrap();
    let token = key_one().mint(&json!({"sub": "alice", "scope": "collections:write"}));

    let response = send(
        &server,
        request("POST", "/collections", Some(&token), Some(&json!({"id": "new"}))),
    )
    .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(upstream_hits(&upstream, "/collections").await.len(), 1);
}

#[tokio::test]
async fn record_failing_the_predicate_reads_as_missing() {
    let upstream = MockServer::start().await;
    let idp = identity_provider(&[key_one()]).await;
    mount_json(
        &upstream,
        "GET",
        "/collections/restricted-collection",
        200,
        json!({"id": "restricted-collection", "type": "Collection", "private": true, "links": []}),
    )
    .await;
    let mut config = proxy_config(&upstream, &idp);
    config.access.default_public = true;
    config.filters.collections = Some(template("private = false"));
    let server = ProxyServer::from_config(config).unwrap();

    let response =
        send(&server, request("GET", "/collections/restricted-collection", None, None)).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["code"], "record_not_found");
    assert!(response.body.get("private").is_none());
}

#[tokio::test]
async fn rotated_signing_key_is_picked_up_without_restart() {
    let upstream = MockServer::start().await;
    let idp = identity_provider(&[key_one()]).await;
    mount_json(&upstream, "POST", "/collections", 201, json!({"id": "new"})).await;
    let mut config = proxy_config(&upstream, &idp);
    config.access.default_public = true;
    config.access.private_endpoints = vec![EndpointRule::new(r"^/collections$", &["POST"])];
    let server = ProxyServer::from_config(config).unwrap();
    let body = json!({"id": "new"});

    let first = key_one().mint(&json!({"sub": "alice"}));
    let response = send(&server, request("POST", "/collections", Some(&first), Some(&body))).await;
    assert_eq!(response.status, StatusCode::CREATED);

    publish_keys(&idp, &[key_one(), key_two()]).await;
    let rotated = key_two().mint(&json!({"sub": "alice"}));
    let response = send(&server, request("POST", "/collections", Some(&rotated), Some(&body))).await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(jwks_fetches(&idp).await, 1);
    let discovery = idp
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == common::DISCOVERY_PATH)
        .count();
    assert_eq!(discovery, 0);
}

#[tokio::test]
async fn token_from_unpublished_key_is_rejected() {
    let upstream = MockServer::start().await;
    let idp = identity_provider(&[key_one()]).await;
    let mut config = proxy_config(&upstream, &idp);
    config.access.default_public = true;
    config.access.private_endpoints = vec![EndpointRule::new(r"^/collections$", &["POST"])];
    let server = ProxyServer::from_config(config).unwrap();
    let token = key_two().mint(&json!({"sub": "mallory"}));

    let response =
        send(&server, request("POST", "/collections", Some(&token), Some(&json!({})))).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "invalid_token");
    assert!(upstream_hits(&upstream, "/collections").await.is_empty());
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let upstream = MockServer::start().await;
    let idp = identity_provider(&[key_one()]).await;
    let mut config = proxy_config(&upstream, &idp);
    config.access.default_public = true;
    config.access.private_endpoints = vec![EndpointRule::new(r"^/collections$", &["POST"])];
    let server = ProxyServer::from_config(config).unwrap();
    let expired = common::now_secs() - 3600;
    let token = key_one().mint(&json!({"sub": "alice", "exp": expired}));

    let response =
        send(&server, request("POST", "/collections", Some(&token), Some(&json!({})))).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "invalid_token");
}

#[tokio::test]
async fn unreachable_identity_provider_reports_unavailable_keys() {
    let upstream = MockServer::start().await;
    let idp = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&idp)
        .await;
    let mut config = proxy_config(&upstream, &idp);
    config.access.default_public = true;
    config.access.private_endpoints = vec![EndpointRule::new(r"^/collections$", &["POST"])];
    let server = ProxyServer::from_config(config).unwrap();
    let token = key_one().mint(&json!({"sub": "alice"}));

    let response =
        send(&server, request("POST", "/collections", Some(&token), Some(&json!({})))).await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["code"], "signing_keys_unavailable");
}
