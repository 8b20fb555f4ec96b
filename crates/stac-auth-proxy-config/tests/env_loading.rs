//! Environment loading tests for stac-auth-proxy-config.
// crates/stac-auth-proxy-config/tests/env_loading.rs
// =============================================================================
// Module: Environment Loading Tests
// Description: Validate `ProxyConfig::from_env_with` key handling.
// Purpose: Ensure environment configuration matches the TOML model.
// =============================================================================

use std::collections::HashMap;

use serde_json::json;
use stac_auth_proxy_config::ConfigError;
use stac_auth_proxy_config::ENV_KEYS;
use stac_auth_proxy_config::MutationPolicy;
use stac_auth_proxy_config::ProxyConfig;

type TestResult = Result<(), String>;

fn load(pairs: &[(&str, &str)]) -> Result<ProxyConfig, ConfigError> {
    let mut env: HashMap<String, String> = HashMap::new();
    env.insert("UPSTREAM_URL".to_string(), "http://stac:8080".to_string());
    env.insert(
        "OIDC_DISCOVERY_URL".to_string(),
        "https://idp.example/.well-known/openid-configuration".to_string(),
    );
    for (key, value) in pairs {
        env.insert((*key).to_string(), (*value).to_string());
    }
    ProxyConfig::from_env_with(|key| env.get(key).cloned())
}

#[test]
fn required_keys_are_enforced() -> TestResult {
    match ProxyConfig::from_env_with(|_| None) {
        Err(err) if err.to_string().contains("UPSTREAM_URL is required") => Ok(()),
        other => Err(format!("unexpected result {other:?}")),
    }
}

#[test]
fn every_documented_key_is_listed() -> TestResult {
    for key in ["UPSTREAM_URL", "PRIVATE_ENDPOINTS", "ITEMS_FILTER_KWARGS", "MUTATION_POLICY"] {
        if !ENV_KEYS.contains(&key) {
            return Err(format!("{key} missing from ENV_KEYS"));
        }
    }
    Ok(())
}

#[test]
fn scalar_keys_override_defaults() -> TestResult {
    let config = load(&[
        ("ROOT_PATH", "/stac"),
        ("OVERRIDE_HOST", "false"),
        ("DEFAULT_PUBLIC", "true"),
        ("ALLOWED_JWT_AUDIENCES", "stac, api"),
        ("OIDC_DISCOVERY_INTERNAL_URL", "http://idp:8080/.well-known/openid-configuration"),
        ("OPENAPI_SPEC_ENDPOINT", "/api"),
        ("ENABLE_AUTHENTICATION_EXTENSION", "0"),
        ("WAIT_FOR_UPSTREAM", "no"),
        ("BIND_ADDR", "127.0.0.1:9000"),
    ])
    .map_err(|err| err.to_string())?;
    if config.server.root_path != "/stac" || config.upstream.override_host {
        return Err("server/upstream keys not applied".to_string());
    }
    if !config.access.default_public {
        return Err("DEFAULT_PUBLIC not applied".to_string());
    }
    if config.oidc.allowed_audiences != vec!["stac".to_string(), "api".to_string()] {
        return Err("audiences not parsed".to_string());
    }
    if config.oidc.fetch_url() != "http://idp:8080/.well-known/openid-configuration" {
        return Err("internal discovery url not preferred for fetches".to_string());
    }
    if config.openapi.spec_endpoint.as_deref() != Some("/api") || config.auth_extension.enabled {
        return Err("augmentation keys not applied".to_string());
    }
    if config.startup.wait_for_upstream || config.server.bind != "127.0.0.1:9000" {
        return Err("startup/bind keys not applied".to_string());
    }
    Ok(())
}

#[test]
fn filter_binding_triples_are_read() -> TestResult {
    let config = load(&[
        ("ITEMS_FILTER_CLS", "opa"),
        ("ITEMS_FILTER_KWARGS", r#"{"host": "http://opa:8181", "decision": "stac/items"}"#),
        ("COLLECTIONS_FILTER_CLS", "template"),
        ("COLLECTIONS_FILTER_ARGS", r#"["private = false"]"#),
        ("MUTATION_POLICY", "validate"),
    ])
    .map_err(|err| err.to_string())?;
    let items = config.filters.items.ok_or("items binding missing")?;
    if items.generator != "opa" || items.kwargs.get("decision") != Some(&json!("stac/items")) {
        return Err(format!("unexpected items binding {items:?}"));
    }
    let collections = config.filters.collections.ok_or("collections binding missing")?;
    if collections.args != vec![json!("private = false")] {
        return Err(format!("unexpected collections binding {collections:?}"));
    }
    if config.filters.mutation_policy != MutationPolicy::Validate {
        return Err("mutation policy not applied".to_string());
    }
    Ok(())
}

#[test]
fn filter_args_must_be_an_array() -> TestResult {
    match load(&[("ITEMS_FILTER_CLS", "template"), ("ITEMS_FILTER_ARGS", r#"{"a": 1}"#)]) {
        Err(err) if err.to_string().contains("ITEMS_FILTER_ARGS must be a JSON array") => Ok(()),
        other => Err(format!("unexpected result {other:?}")),
    }
}

#[test]
fn private_endpoints_object_form_is_validated() -> TestResult {
    let config = load(&[(
        "PRIVATE_ENDPOINTS",
        r#"{"^/collections$": [["POST", "collection:create"]], "^/search$": ["POST"]}"#,
    )])
    .map_err(|err| err.to_string())?;
    let rules = &config.access.private_endpoints;
    if rules.len() != 2 || rules[0].scopes != vec!["collection:create".to_string()] {
        return Err(format!("unexpected rules {rules:?}"));
    }
    match load(&[("PRIVATE_ENDPOINTS", r#"{"^/(bad": ["GET"]}"#)]) {
        Err(ConfigError::Invalid(_)) => Ok(()),
        other => Err(format!("bad pattern accepted: {other:?}")),
    }
}

#[test]
fn malformed_boolean_is_rejected() -> TestResult {
    match load(&[("DEFAULT_PUBLIC", "sometimes")]) {
        Err(err) if err.to_string().contains("DEFAULT_PUBLIC must be a boolean") => Ok(()),
        other => Err(format!("unexpected result {other:?}")),
    }
}
