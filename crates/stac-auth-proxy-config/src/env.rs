// crates/stac-auth-proxy-config/src/env.rs
// ============================================================================
// Module: Environment Configuration
// Description: Builds `ProxyConfig` from enumerated environment keys.
// Purpose: Support container deployments configured without a TOML file.
// Dependencies: serde_json, crate::config
// ============================================================================

//! ## Overview
//! Only the keys listed in [`ENV_KEYS`] are read. Booleans accept
//! `true/false/1/0/yes/no/on/off`; structured values (endpoint tables,
//! generator arguments, scheme overrides) are JSON. Endpoint tables accept
//! either a list of `{pattern, methods, scopes}` rules or an ordered object
//! mapping a pattern to a list whose entries are a method or a
//! `[method, "scope scope"]` pair.

use serde_json::Map;
use serde_json::Value;

use crate::config::ConfigError;
use crate::config::EndpointRule;
use crate::config::FilterBinding;
use crate::config::MutationPolicy;
use crate::config::ProxyConfig;

// ============================================================================
// SECTION: Keys
// ============================================================================

/// Environment keys recognized by [`ProxyConfig::from_env`].
pub const ENV_KEYS: [&str; 25] = [
    "UPSTREAM_URL",
    "OIDC_DISCOVERY_URL",
    "OIDC_DISCOVERY_INTERNAL_URL",
    "ALLOWED_JWT_AUDIENCES",
    "DEFAULT_PUBLIC",
    "PUBLIC_ENDPOINTS",
    "PRIVATE_ENDPOINTS",
    "ROOT_PATH",
    "OVERRIDE_HOST",
    "HEALTHZ_PREFIX",
    "WAIT_FOR_UPSTREAM",
    "CHECK_CONFORMANCE",
    "ENABLE_COMPRESSION",
    "OPENAPI_SPEC_ENDPOINT",
    "OPENAPI_AUTH_SCHEME_NAME",
    "OPENAPI_AUTH_SCHEME_OVERRIDE",
    "ENABLE_AUTHENTICATION_EXTENSION",
    "ITEMS_FILTER_CLS",
    "ITEMS_FILTER_ARGS",
    "ITEMS_FILTER_KWARGS",
    "COLLECTIONS_FILTER_CLS",
    "COLLECTIONS_FILTER_ARGS",
    "COLLECTIONS_FILTER_KWARGS",
    "MUTATION_POLICY",
    "BIND_ADDR",
];

// ============================================================================
// SECTION: Loading
// ============================================================================

impl ProxyConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required key is missing or a value is
    /// malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required key is missing or a value is
    /// malformed.
    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let upstream = get("UPSTREAM_URL")
            .ok_or_else(|| ConfigError::Invalid("UPSTREAM_URL is required".to_string()))?;
        let discovery = get("OIDC_DISCOVERY_URL")
            .ok_or_else(|| ConfigError::Invalid("OIDC_DISCOVERY_URL is required".to_string()))?;
        let mut config = Self::new(upstream.trim(), discovery.trim());

        if let Some(bind) = get("BIND_ADDR") {
            config.server.bind = bind.trim().to_string();
        }
        if let Some(root) = get("ROOT_PATH") {
            config.server.root_path = root.trim().to_string();
        }
        if let Some(prefix) = get("HEALTHZ_PREFIX") {
            config.server.healthz_prefix = prefix.trim().to_string();
        }
        if let Some(raw) = get("ENABLE_COMPRESSION") {
            config.server.enable_compression = parse_bool("ENABLE_COMPRESSION", &raw)?;
        }
        if let Some(raw) = get("OVERRIDE_HOST") {
            config.upstream.override_host = parse_bool("OVERRIDE_HOST", &raw)?;
        }

        config.oidc.discovery_internal_url =
            get("OIDC_DISCOVERY_INTERNAL_URL").map(|value| value.trim().to_string());
        if let Some(raw) = get("ALLOWED_JWT_AUDIENCES") {
            config.oidc.allowed_audiences = parse_list(&raw);
        }

        if let Some(raw) = get("DEFAULT_PUBLIC") {
            config.access.default_public = parse_bool("DEFAULT_PUBLIC", &raw)?;
        }
        if let Some(raw) = get("PUBLIC_ENDPOINTS") {
            config.access.public_endpoints = parse_endpoints("PUBLIC_ENDPOINTS", &raw)?;
        }
        if let Some(raw) = get("PRIVATE_ENDPOINTS") {
            config.access.private_endpoints = parse_endpoints("PRIVATE_ENDPOINTS", &raw)?;
        }

        config.openapi.spec_endpoint =
            get("OPENAPI_SPEC_ENDPOINT").map(|value| value.trim().to_string());
        if let Some(name) = get("OPENAPI_AUTH_SCHEME_NAME") {
            config.openapi.auth_scheme_name = name.trim().to_string();
        }
        if let Some(raw) = get("OPENAPI_AUTH_SCHEME_OVERRIDE") {
            config.openapi.auth_scheme_override =
                Some(parse_json("OPENAPI_AUTH_SCHEME_OVERRIDE", &raw)?);
        }
        if let Some(raw) = get("ENABLE_AUTHENTICATION_EXTENSION") {
            config.auth_extension.enabled = parse_bool("ENABLE_AUTHENTICATION_EXTENSION", &raw)?;
        }

        config.filters.items = parse_binding(&get, "ITEMS")?;
        config.filters.collections = parse_binding(&get, "COLLECTIONS")?;
        if let Some(raw) = get("MUTATION_POLICY") {
            config.filters.mutation_policy = match raw.trim().to_ascii_lowercase().as_str() {
                "reject" => MutationPolicy::Reject,
                "validate" => MutationPolicy::Validate,
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "MUTATION_POLICY must be reject or validate, found {other}"
                    )));
                }
            };
        }

        if let Some(raw) = get("WAIT_FOR_UPSTREAM") {
            config.startup.wait_for_upstream = parse_bool("WAIT_FOR_UPSTREAM", &raw)?;
        }
        if let Some(raw) = get("CHECK_CONFORMANCE") {
            config.startup.check_conformance = parse_bool("CHECK_CONFORMANCE", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// SECTION: Value Parsers
// ============================================================================

/// Parses a boolean environment value.
fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid(format!("{key} must be a boolean, found {other}"))),
    }
}

/// Parses a comma-separated list, dropping blank entries.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses a JSON environment value.
fn parse_json(key: &str, raw: &str) -> Result<Value, ConfigError> {
    serde_json::from_str(raw).map_err(|err| ConfigError::Parse(format!("{key}: {err}")))
}

/// Reads a `<PREFIX>_FILTER_CLS/ARGS/KWARGS` triple.
fn parse_binding<G>(get: &G, prefix: &str) -> Result<Option<FilterBinding>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let cls_key = format!("{prefix}_FILTER_CLS");
    let Some(generator) = get(&cls_key) else {
        return Ok(None);
    };
    let args_key = format!("{prefix}_FILTER_ARGS");
    let args = match get(&args_key) {
        Some(raw) => match parse_json(&args_key, &raw)? {
            Value::Array(items) => items,
            _ => return Err(ConfigError::Invalid(format!("{args_key} must be a JSON array"))),
        },
        None => Vec::new(),
    };
    let kwargs_key = format!("{prefix}_FILTER_KWARGS");
    let kwargs = match get(&kwargs_key) {
        Some(raw) => match parse_json(&kwargs_key, &raw)? {
            Value::Object(map) => map,
            _ => return Err(ConfigError::Invalid(format!("{kwargs_key} must be a JSON object"))),
        },
        None => Map::new(),
    };
    Ok(Some(FilterBinding {
        generator: generator.trim().to_string(),
        args,
        kwargs,
    }))
}

/// Parses an endpoint table in list or ordered-object form.
fn parse_endpoints(key: &str, raw: &str) -> Result<Vec<EndpointRule>, ConfigError> {
    match parse_json(key, raw)? {
        list @ Value::Array(_) => serde_json::from_value(list)
            .map_err(|err| ConfigError::Parse(format!("{key}: {err}"))),
        Value::Object(table) => {
            let mut rules = Vec::new();
            for (pattern, entries) in table {
                rules.extend(rules_for_pattern(key, &pattern, &entries)?);
            }
            Ok(rules)
        }
        _ => Err(ConfigError::Invalid(format!("{key} must be a JSON list or object"))),
    }
}

/// Expands one ordered-object entry into rules, one per distinct scope set.
fn rules_for_pattern(
    key: &str,
    pattern: &str,
    entries: &Value,
) -> Result<Vec<EndpointRule>, ConfigError> {
    let Value::Array(entries) = entries else {
        return Err(ConfigError::Invalid(format!("{key} entry for `{pattern}` must be a list")));
    };
    let mut rules: Vec<EndpointRule> = Vec::new();
    for entry in entries {
        let (method, scopes) = match entry {
            Value::String(method) => (method.clone(), Vec::new()),
            Value::Array(pair) => match pair.as_slice() {
                [Value::String(method), Value::String(scopes)] => (
                    method.clone(),
                    scopes.split_whitespace().map(str::to_string).collect::<Vec<_>>(),
                ),
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "{key} entry for `{pattern}` must be [method, \"scopes\"]"
                    )));
                }
            },
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "{key} entry for `{pattern}` must be a method or [method, \"scopes\"]"
                )));
            }
        };
        if let Some(rule) = rules.iter_mut().find(|rule| rule.scopes == scopes) {
            rule.methods.push(method);
        } else {
            rules.push(EndpointRule {
                pattern: pattern.to_string(),
                methods: vec![method],
                scopes,
            });
        }
    }
    Ok(rules)
}
