// crates/stac-auth-proxy-config/src/config.rs
// ============================================================================
// Module: STAC Auth Proxy Configuration
// Description: Configuration model, TOML loading, and validation.
// Purpose: Provide strict, fail-closed config parsing for the proxy.
// Dependencies: regex, serde, serde_json, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file when a path is supplied (CLI flag
//! or `STAC_AUTH_PROXY_CONFIG`), otherwise from the enumerated environment
//! keys (see [`crate::env`]). Every rule pattern must compile and every URL
//! must be absolute before the proxy serves traffic.
//! Security posture: config inputs are untrusted; invalid configuration is a
//! fatal startup error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable used to point at a TOML config file.
pub const CONFIG_ENV_VAR: &str = "STAC_AUTH_PROXY_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of rules per endpoint table.
pub(crate) const MAX_ENDPOINT_RULES: usize = 512;
/// HTTP methods accepted in endpoint rules.
const KNOWN_METHODS: [&str; 9] =
    ["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "TRACE", "CONNECT"];

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// STAC auth proxy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Listener and request-shaping configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream STAC API configuration.
    pub upstream: UpstreamConfig,
    /// Identity provider configuration.
    pub oidc: OidcConfig,
    /// Endpoint visibility rules.
    #[serde(default)]
    pub access: AccessConfig,
    /// OpenAPI description augmentation.
    #[serde(default)]
    pub openapi: OpenApiConfig,
    /// STAC authentication extension augmentation.
    #[serde(default)]
    pub auth_extension: AuthExtensionConfig,
    /// Row-level filter bindings and policy.
    #[serde(default)]
    pub filters: FiltersConfig,
    /// Startup pre-flight checks.
    #[serde(default)]
    pub startup: StartupConfig,
}

impl ProxyConfig {
    /// Builds a configuration with defaults for every optional field.
    #[must_use]
    pub fn new(upstream_url: impl Into<String>, discovery_url: impl Into<String>) -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::new(upstream_url),
            oidc: OidcConfig::new(discovery_url),
            access: AccessConfig::default(),
            openapi: OpenApiConfig::default(),
            auth_extension: AuthExtensionConfig::default(),
            filters: FiltersConfig::default(),
            startup: StartupConfig::default(),
        }
    }

    /// Loads configuration using the default resolution rules.
    ///
    /// An explicit `path` wins, then [`CONFIG_ENV_VAR`]; with neither, the
    /// configuration is read from environment keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match resolve_path(path)? {
            Some(resolved) => Self::load_file(&resolved),
            None => Self::from_env(),
        }
    }

    /// Loads and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when reading, parsing, or validation fails.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if path.to_string_lossy().len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates TOML configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.upstream.validate()?;
        self.oidc.validate()?;
        self.access.validate()?;
        self.openapi.validate()?;
        self.auth_extension.validate()?;
        self.filters.validate()?;
        self.startup.validate()
    }
}

/// Listener and request-shaping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// External path prefix stripped on ingress (empty for none).
    #[serde(default)]
    pub root_path: String,
    /// Health endpoint prefix, relative to the root path.
    #[serde(default = "default_healthz_prefix")]
    pub healthz_prefix: String,
    /// Compress responses when the client accepts it.
    #[serde(default = "default_true")]
    pub enable_compression: bool,
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            root_path: String::new(),
            healthz_prefix: default_healthz_prefix(),
            enable_compression: true,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the address is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("server.bind is invalid: {}", self.bind)))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        validate_prefix("server.root_path", &self.root_path, true)?;
        validate_prefix("server.healthz_prefix", &self.healthz_prefix, false)?;
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("server.max_body_bytes must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Upstream STAC API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL of the upstream STAC API.
    pub url: String,
    /// Replace the `Host` header with the upstream authority.
    #[serde(default = "default_true")]
    pub override_host: bool,
    /// Forward call timeout in milliseconds.
    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,
    /// Connection establishment timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl UpstreamConfig {
    /// Builds upstream configuration with defaults.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            override_host: true,
            timeout_ms: default_upstream_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }

    /// Validates upstream configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("upstream.url", &self.url)?;
        validate_non_zero("upstream.timeout_ms", self.timeout_ms)?;
        validate_non_zero("upstream.connect_timeout_ms", self.connect_timeout_ms)
    }
}

/// Identity provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OidcConfig {
    /// Public discovery document URL (advertised in API descriptions).
    pub discovery_url: String,
    /// Internal-network discovery URL used for fetching keys.
    #[serde(default)]
    pub discovery_internal_url: Option<String>,
    /// Accepted `aud` values; empty accepts tokens without an audience only.
    #[serde(default)]
    pub allowed_audiences: Vec<String>,
    /// Accepted JWS algorithms.
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<String>,
    /// Minimum spacing between signing-key refreshes in milliseconds.
    #[serde(default = "default_jwks_refresh_cooldown_ms")]
    pub jwks_refresh_cooldown_ms: u64,
    /// Discovery and key-set fetch timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl OidcConfig {
    /// Builds identity provider configuration with defaults.
    #[must_use]
    pub fn new(discovery_url: impl Into<String>) -> Self {
        Self {
            discovery_url: discovery_url.into(),
            discovery_internal_url: None,
            allowed_audiences: Vec::new(),
            algorithms: default_algorithms(),
            jwks_refresh_cooldown_ms: default_jwks_refresh_cooldown_ms(),
            request_timeout_ms: default_connect_timeout_ms(),
        }
    }

    /// Returns the discovery URL used for network fetches.
    #[must_use]
    pub fn fetch_url(&self) -> &str {
        self.discovery_internal_url.as_deref().unwrap_or(&self.discovery_url)
    }

    /// Validates identity provider configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("oidc.discovery_url", &self.discovery_url)?;
        if let Some(internal) = &self.discovery_internal_url {
            validate_http_url("oidc.discovery_internal_url", internal)?;
        }
        if self.algorithms.is_empty() {
            return Err(ConfigError::Invalid("oidc.algorithms must not be empty".to_string()));
        }
        validate_non_zero("oidc.request_timeout_ms", self.request_timeout_ms)
    }
}

/// Endpoint visibility configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessConfig {
    /// When true only `private_endpoints` is consulted; otherwise only
    /// `public_endpoints`.
    #[serde(default)]
    pub default_public: bool,
    /// Ordered rules that make endpoints public when `default_public` is false.
    #[serde(default = "default_public_endpoints")]
    pub public_endpoints: Vec<EndpointRule>,
    /// Ordered rules that make endpoints private when `default_public` is true.
    #[serde(default = "default_private_endpoints")]
    pub private_endpoints: Vec<EndpointRule>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            default_public: false,
            public_endpoints: default_public_endpoints(),
            private_endpoints: default_private_endpoints(),
        }
    }
}

impl AccessConfig {
    /// Validates both rule tables.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_rules("access.public_endpoints", &self.public_endpoints)?;
        validate_rules("access.private_endpoints", &self.private_endpoints)
    }
}

/// One path-pattern rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointRule {
    /// Regular expression matched against the prefix-stripped path.
    pub pattern: String,
    /// HTTP methods the rule applies to.
    pub methods: Vec<String>,
    /// Scopes a token must carry for private endpoints.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl EndpointRule {
    /// Builds a rule without scopes.
    #[must_use]
    pub fn new(pattern: &str, methods: &[&str]) -> Self {
        Self {
            pattern: pattern.to_string(),
            methods: methods.iter().map(|method| (*method).to_string()).collect(),
            scopes: Vec::new(),
        }
    }

    /// Returns the rule with required scopes attached.
    #[must_use]
    pub fn with_scopes(mut self, scopes: &[&str]) -> Self {
        self.scopes = scopes.iter().map(|scope| (*scope).to_string()).collect();
        self
    }

    /// Validates the pattern and method list.
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        Regex::new(&self.pattern).map_err(|err| {
            ConfigError::Invalid(format!("{field} pattern `{}` is invalid: {err}", self.pattern))
        })?;
        if self.methods.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{field} pattern `{}` has no methods",
                self.pattern
            )));
        }
        for method in &self.methods {
            let upper = method.trim().to_ascii_uppercase();
            if !KNOWN_METHODS.contains(&upper.as_str()) {
                return Err(ConfigError::Invalid(format!("{field} method `{method}` is unknown")));
            }
        }
        Ok(())
    }
}

/// OpenAPI description augmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenApiConfig {
    /// Path of the upstream API description; augmentation is off when unset.
    #[serde(default)]
    pub spec_endpoint: Option<String>,
    /// Name of the injected security scheme.
    #[serde(default = "default_openapi_scheme_name")]
    pub auth_scheme_name: String,
    /// Replacement security scheme object.
    #[serde(default)]
    pub auth_scheme_override: Option<Value>,
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            spec_endpoint: None,
            auth_scheme_name: default_openapi_scheme_name(),
            auth_scheme_override: None,
        }
    }
}

impl OpenApiConfig {
    /// Validates OpenAPI settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(endpoint) = &self.spec_endpoint {
            validate_prefix("openapi.spec_endpoint", endpoint, false)?;
        }
        if self.auth_scheme_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "openapi.auth_scheme_name must be non-empty".to_string(),
            ));
        }
        if let Some(scheme) = &self.auth_scheme_override
            && !scheme.is_object()
        {
            return Err(ConfigError::Invalid(
                "openapi.auth_scheme_override must be an object".to_string(),
            ));
        }
        Ok(())
    }
}

/// STAC authentication extension settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthExtensionConfig {
    /// Advertise the authentication extension on STAC responses.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Scheme key used under `auth:schemes`.
    #[serde(default = "default_auth_extension_scheme")]
    pub scheme_name: String,
}

impl Default for AuthExtensionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scheme_name: default_auth_extension_scheme(),
        }
    }
}

impl AuthExtensionConfig {
    /// Validates extension settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.scheme_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "auth_extension.scheme_name must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Filter generator binding for one resource kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterBinding {
    /// Registered generator identifier (`template`, `opa`, ...).
    #[serde(alias = "cls")]
    pub generator: String,
    /// Positional constructor arguments.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword constructor arguments.
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

/// Handling of mutating requests on filtered routes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPolicy {
    /// Reject with 501 Not Implemented.
    #[default]
    Reject,
    /// Fetch the current record and validate it against the predicate.
    Validate,
}

/// Row-level filtering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FiltersConfig {
    /// Item-level filter binding.
    #[serde(default)]
    pub items: Option<FilterBinding>,
    /// Collection-level filter binding.
    #[serde(default)]
    pub collections: Option<FilterBinding>,
    /// Per-call generator timeout in milliseconds.
    #[serde(default = "default_filter_timeout_ms")]
    pub timeout_ms: u64,
    /// Mutating-request policy.
    #[serde(default)]
    pub mutation_policy: MutationPolicy,
    /// Endpoints whose mutations are rejected even under `validate`.
    #[serde(default)]
    pub mutation_disabled_endpoints: Vec<EndpointRule>,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            items: None,
            collections: None,
            timeout_ms: default_filter_timeout_ms(),
            mutation_policy: MutationPolicy::Reject,
            mutation_disabled_endpoints: Vec::new(),
        }
    }
}

impl FiltersConfig {
    /// Returns true when any binding is configured.
    #[must_use]
    pub const fn any_bound(&self) -> bool {
        self.items.is_some() || self.collections.is_some()
    }

    /// Validates filter settings.
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, binding) in [("filters.items", &self.items), ("filters.collections", &self.collections)]
        {
            if let Some(binding) = binding
                && binding.generator.trim().is_empty()
            {
                return Err(ConfigError::Invalid(format!("{field}.generator must be non-empty")));
            }
        }
        validate_non_zero("filters.timeout_ms", self.timeout_ms)?;
        validate_rules("filters.mutation_disabled_endpoints", &self.mutation_disabled_endpoints)
    }
}

/// Startup pre-flight check configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartupConfig {
    /// Wait for the upstream and identity provider before serving.
    #[serde(default = "default_true")]
    pub wait_for_upstream: bool,
    /// Verify upstream conformance classes needed by bound filters.
    #[serde(default = "default_true")]
    pub check_conformance: bool,
    /// Maximum attempts per pre-flight probe.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry delay in milliseconds; doubles per attempt.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Retry delay ceiling in milliseconds.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            wait_for_upstream: true,
            check_conformance: true,
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            attempt_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl StartupConfig {
    /// Validates startup settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("startup.max_retries must be > 0".to_string()));
        }
        validate_non_zero("startup.attempt_timeout_ms", self.attempt_timeout_ms)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML or JSON parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config file path from CLI or environment.
fn resolve_path(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = path {
        return Ok(Some(path.to_path_buf()));
    }
    if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        if !env_path.trim().is_empty() {
            return Ok(Some(PathBuf::from(env_path)));
        }
    }
    Ok(None)
}

/// Validates an absolute http(s) URL.
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|err| ConfigError::Invalid(format!("{field} is not a valid url: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!("{field} must use http:// or https://")));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::Invalid(format!("{field} must include a host")));
    }
    Ok(())
}

/// Validates a path prefix: `/`-leading and without a trailing `/`.
fn validate_prefix(field: &str, value: &str, allow_empty: bool) -> Result<(), ConfigError> {
    if value.is_empty() {
        return if allow_empty {
            Ok(())
        } else {
            Err(ConfigError::Invalid(format!("{field} must be non-empty")))
        };
    }
    if !value.starts_with('/') {
        return Err(ConfigError::Invalid(format!("{field} must start with `/`")));
    }
    if value.len() > 1 && value.ends_with('/') {
        return Err(ConfigError::Invalid(format!("{field} must not end with `/`")));
    }
    Ok(())
}

/// Validates an ordered rule table.
fn validate_rules(field: &str, rules: &[EndpointRule]) -> Result<(), ConfigError> {
    if rules.len() > MAX_ENDPOINT_RULES {
        return Err(ConfigError::Invalid(format!("{field} exceeds {MAX_ENDPOINT_RULES} rules")));
    }
    rules.iter().try_for_each(|rule| rule.validate(field))
}

/// Rejects zero-valued durations and limits.
fn validate_non_zero(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid(format!("{field} must be > 0")));
    }
    Ok(())
}

/// Default listener address.
fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

/// Default health endpoint prefix.
fn default_healthz_prefix() -> String {
    "/healthz".to_string()
}

/// Serde helper for `true` defaults.
const fn default_true() -> bool {
    true
}

/// Default maximum request body size in bytes.
const fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Default upstream forward timeout in milliseconds.
const fn default_upstream_timeout_ms() -> u64 {
    15_000
}

/// Default connect/probe timeout in milliseconds.
const fn default_connect_timeout_ms() -> u64 {
    5_000
}

/// Default accepted JWS algorithms.
fn default_algorithms() -> Vec<String> {
    vec!["RS256".to_string()]
}

/// Default signing-key refresh spacing in milliseconds.
const fn default_jwks_refresh_cooldown_ms() -> u64 {
    5_000
}

/// Default OpenAPI security scheme name.
fn default_openapi_scheme_name() -> String {
    "oidcAuth".to_string()
}

/// Default authentication extension scheme key.
fn default_auth_extension_scheme() -> String {
    "oidc".to_string()
}

/// Default filter generator timeout in milliseconds.
const fn default_filter_timeout_ms() -> u64 {
    5_000
}

/// Default startup probe attempts.
const fn default_max_retries() -> u32 {
    10
}

/// Default first retry delay in milliseconds.
const fn default_retry_base_delay_ms() -> u64 {
    1_000
}

/// Default retry delay ceiling in milliseconds.
const fn default_retry_max_delay_ms() -> u64 {
    5_000
}

/// Default public endpoint table.
#[must_use]
pub fn default_public_endpoints() -> Vec<EndpointRule> {
    vec![
        EndpointRule::new(r"^/api.html$", &["GET"]),
        EndpointRule::new(r"^/api$", &["GET"]),
        EndpointRule::new(r"^/docs/oauth2-redirect", &["GET"]),
        EndpointRule::new(r"^/healthz", &["GET"]),
    ]
}

/// Default private endpoint table (transaction routes).
#[must_use]
pub fn default_private_endpoints() -> Vec<EndpointRule> {
    vec![
        EndpointRule::new(r"^/collections$", &["POST"]),
        EndpointRule::new(r"^/collections/([^/]+)$", &["PUT", "PATCH", "DELETE"]),
        EndpointRule::new(r"^/collections/([^/]+)/items$", &["POST"]),
        EndpointRule::new(r"^/collections/([^/]+)/items/([^/]+)$", &["PUT", "PATCH", "DELETE"]),
        EndpointRule::new(r"^/collections/([^/]+)/bulk_items$", &["POST"]),
    ]
}
