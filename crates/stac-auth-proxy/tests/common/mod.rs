// crates/stac-auth-proxy/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Signing keys, mock identity provider, and proxy harness.
// Purpose: Drive the full router against wiremock dependencies.
// Dependencies: stac-auth-proxy, jsonwebtoken, rsa, wiremock
// ============================================================================

//! ## Overview
//! Fixtures for end-to-end proxy tests. Two RSA signing keys are generated
//! once per test binary; the mock identity provider publishes a discovery
//! document and whichever of them the test chooses. Requests are driven
//! through [`ProxyServer::router`] with `tower::ServiceExt::oneshot`.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test fixtures.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::OnceLock;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use axum::body::Body;
use axum::http::HeaderMap;
use axum::http::Request;
use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use http_body_util::BodyExt;
use jsonwebtoken::Algorithm;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs1::LineEnding;
use rsa::traits::PublicKeyParts;
use serde_json::Value;
use serde_json::json;
use stac_auth_proxy::ProxyServer;
use stac_auth_proxy_config::ProxyConfig;
use tower::ServiceExt;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;

// ============================================================================
// SECTION: Signing Keys
// ============================================================================

/// Path of the mock discovery document.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
/// Path of the mock key set.
pub const JWKS_PATH: &str = "/jwks";

/// RSA signing key with its public JWK.
pub struct TestKey {
    /// Key identifier.
    pub kid: String,
    /// Private signing key.
    encoding: EncodingKey,
    /// Public JWK.
    pub jwk: Value,
}

impl TestKey {
    /// Generates a 2048-bit RSA key.
    fn generate(kid: &str) -> Self {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("rsa keygen");
        let pem = private.to_pkcs1_pem(LineEnding::LF).expect("pem encode");
        let encoding = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("encoding key");
        let jwk = json!({
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": kid,
            "n": URL_SAFE_NO_PAD.encode(private.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(private.e().to_bytes_be()),
        });
        Self {
            kid: kid.to_string(),
            encoding,
            jwk,
        }
    }

    /// Signs `claims` with an `exp` one hour out unless one is given.
    pub fn mint(&self, claims: &Value) -> String {
        let mut claims = claims.clone();
        if claims.get("exp").is_none() {
            claims["exp"] = json!(now_secs() + 3600);
        }
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        jsonwebtoken::encode(&header, &claims, &self.encoding).expect("sign token")
    }
}

/// Returns the current UNIX time in seconds.
pub fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("clock").as_secs()
}

/// Returns the first shared key.
pub fn key_one() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| TestKey::generate("key-1"))
}

/// Returns the second shared key.
pub fn key_two() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| TestKey::generate("key-2"))
}

// ============================================================================
// SECTION: Mock Identity Provider
// ============================================================================

/// Starts an identity provider publishing `keys`.
pub async fn identity_provider(keys: &[&TestKey]) -> MockServer {
    let server = MockServer::start().await;
    publish_keys(&server, keys).await;
    server
}

/// Replaces the published key set (and discovery document) with `keys`.
pub async fn publish_keys(server: &MockServer, keys: &[&TestKey]) {
    server.reset().await;
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": uri,
            "jwks_uri": format!("{uri}{JWKS_PATH}"),
        })))
        .mount(server)
        .await;
    let jwks: Vec<Value> = keys.iter().map(|key| key.jwk.clone()).collect();
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"keys": jwks})))
        .mount(server)
        .await;
}

/// Counts key set fetches served by `server`.
pub async fn jwks_fetches(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == JWKS_PATH)
        .count()
}

// ============================================================================
// SECTION: Proxy Harness
// ============================================================================

/// Builds a configuration pointing at the mock upstream and provider.
///
/// Startup probes are off and request-triggered key refreshes are not rate
/// limited.
pub fn proxy_config(upstream: &MockServer, idp: &MockServer) -> ProxyConfig {
    let mut config = ProxyConfig::new(upstream.uri(), format!("{}{DISCOVERY_PATH}", idp.uri()));
    config.oidc.jwks_refresh_cooldown_ms = 0;
    config.startup.wait_for_upstream = false;
    config.startup.check_conformance = false;
    config
}

/// Response captured from the router.
pub struct Captured {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body parsed as JSON (`Null` when empty or not JSON).
    pub body: Value,
}

/// Sends one request through the proxy router.
pub async fn send(server: &ProxyServer, request: Request<Body>) -> Captured {
    let response = server.router().oneshot(request).await.expect("router call");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Captured {
        status,
        headers,
        body,
    }
}

/// Builds a request with an optional bearer token and JSON body.
pub fn request(method_name: &str, uri: &str, token: Option<&str>, body: Option<&Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method_name).uri(uri).header("host", "proxy.example");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

/// Returns the requests the upstream received on `request_path`.
pub async fn upstream_hits(upstream: &MockServer, request_path: &str) -> Vec<wiremock::Request> {
    upstream
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == request_path)
        .collect()
}
