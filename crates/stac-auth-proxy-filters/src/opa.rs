// crates/stac-auth-proxy-filters/src/opa.rs
// ============================================================================
// Module: OPA Filter Generator
// Description: Obtains predicates from an Open Policy Agent decision.
// Purpose: Delegate row-level policy to an external policy engine.
// Dependencies: reqwest, serde_json, tracing, crate::{cache, generator}
// ============================================================================

//! ## Overview
//! The generator POSTs `{"input": <context>}` to
//! `{host}/v1/data/{decision}` and reads the decision's `result` (cql2-text
//! string or cql2-json object). Results are memoized per value of the
//! `cache_key` context path for `cache_ttl_secs`.
//! Security posture: cache keys are fingerprinted; raw tokens are not kept.

use std::time::Duration;

use async_trait::async_trait;
use cql2_logic::Expr;
use reqwest::Client;
use serde_json::Value;
use serde_json::json;
use stac_auth_proxy_config::FilterBinding;
use tracing::debug;

use crate::cache::TtlCache;
use crate::generator::FilterContext;
use crate::generator::FilterError;
use crate::generator::FilterGenerator;
use crate::generator::parse_generated_value;
use crate::generator::value_at_path;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default context path used as the memo key.
pub const DEFAULT_CACHE_KEY: &str = "req.headers.authorization";
/// Default memo lifetime in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 5;

/// OPA generator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaConfig {
    /// Policy engine base URL.
    pub host: String,
    /// Decision path (`stac/items/cql2`).
    pub decision: String,
    /// Dotted context path whose value keys the memo cache.
    pub cache_key: String,
    /// Memo lifetime.
    pub cache_ttl: Duration,
}

impl OpaConfig {
    /// Builds settings with default caching.
    #[must_use]
    pub fn new(host: impl Into<String>, decision: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            decision: decision.into(),
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }

    /// Reads settings from a binding: `host`/`decision` from kwargs or the
    /// first two positional args, plus optional `cache_key`/`cache_ttl_secs`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Config`] when required values are missing.
    pub fn from_binding(binding: &FilterBinding) -> Result<Self, FilterError> {
        let string_arg = |name: &str, position: usize| {
            binding
                .kwargs
                .get(name)
                .or_else(|| binding.args.get(position))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| FilterError::Config(format!("opa generator requires `{name}`")))
        };
        let mut config = Self::new(string_arg("host", 0)?, string_arg("decision", 1)?);
        if let Some(key) = binding.kwargs.get("cache_key") {
            config.cache_key = key
                .as_str()
                .ok_or_else(|| FilterError::Config("`cache_key` must be a string".to_string()))?
                .to_string();
        }
        let ttl = binding.kwargs.get("cache_ttl_secs").or_else(|| binding.kwargs.get("cache_ttl"));
        if let Some(ttl) = ttl {
            config.cache_ttl = ttl
                .as_f64()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .ok_or_else(|| {
                    FilterError::Config(
                        "`cache_ttl_secs` must be a non-negative number".to_string(),
                    )
                })?;
        }
        Ok(config)
    }

    /// Returns the decision endpoint URL.
    #[must_use]
    pub fn decision_url(&self) -> String {
        format!(
            "{}/v1/data/{}",
            self.host.trim_end_matches('/'),
            self.decision.trim_start_matches('/')
        )
    }
}

// ============================================================================
// SECTION: Generator
// ============================================================================

/// Policy-engine-backed filter generator.
pub struct OpaGenerator {
    /// Generator settings.
    config: OpaConfig,
    /// HTTP client for decision calls.
    client: Client,
    /// Memoized predicates keyed by cache-key value.
    cache: TtlCache<Expr>,
}

impl OpaGenerator {
    /// Creates the generator.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Config`] when the HTTP client cannot be built.
    pub fn new(config: OpaConfig) -> Result<Self, FilterError> {
        let client = Client::builder()
            .build()
            .map_err(|err| FilterError::Config(format!("opa client: {err}")))?;
        let cache = TtlCache::new(config.cache_ttl);
        Ok(Self {
            config,
            client,
            cache,
        })
    }

    /// Calls the decision endpoint.
    async fn fetch(&self, input: Value) -> Result<Expr, FilterError> {
        let response = self
            .client
            .post(self.config.decision_url())
            .json(&json!({ "input": input }))
            .send()
            .await
            .map_err(|err| FilterError::Generator(format!("opa request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FilterError::Generator(format!("opa returned status {}", status.as_u16())));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|err| FilterError::Generator(format!("opa response is not json: {err}")))?;
        let result = body
            .get("result")
            .ok_or_else(|| FilterError::Generator("opa response has no `result`".to_string()))?;
        parse_generated_value(result)
    }
}

#[async_trait]
impl FilterGenerator for OpaGenerator {
    async fn generate(&self, ctx: &FilterContext) -> Result<Expr, FilterError> {
        let input = ctx.as_json();
        let key = value_at_path(&input, &self.config.cache_key).cloned().unwrap_or(Value::Null);
        let key_bytes = key.to_string().into_bytes();
        if let Some(cached) = self.cache.get(&key_bytes) {
            debug!(decision = %self.config.decision, "opa decision served from cache");
            return Ok(cached);
        }
        let expr = self.fetch(input).await?;
        self.cache.insert(&key_bytes, expr.clone());
        Ok(expr)
    }
}
