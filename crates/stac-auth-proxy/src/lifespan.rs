// crates/stac-auth-proxy/src/lifespan.rs
// ============================================================================
// Module: Startup Checks
// Description: Pre-flight upstream, identity provider, and conformance probes.
// Purpose: Refuse to serve until dependencies are reachable and compatible.
// Dependencies: regex, tokio, tracing, crate::{oidc, upstream}
// ============================================================================

//! ## Overview
//! Before the listener binds, the server can wait for the upstream and the
//! identity provider with bounded exponential backoff
//! (`min(base * 2^attempt, max)`, each attempt under its own timeout) and
//! verify that `/conformance` declares the classes the bound filters rely
//! on. Conformance requirements are regular expressions matched at the start
//! of each declared class. Any failure aborts startup.

use std::future::Future;
use std::time::Duration;

use axum::http::Method;
use regex::Regex;
use serde_json::Value;
use stac_auth_proxy_config::FiltersConfig;
use stac_auth_proxy_config::StartupConfig;
use thiserror::Error;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::exchange::ClientInfo;
use crate::exchange::ProxyRequest;
use crate::oidc::KeyStore;
use crate::upstream::Upstream;

// ============================================================================
// SECTION: Conformance Classes
// ============================================================================

/// Endpoint listing the upstream conformance classes.
pub const CONFORMANCE_ENDPOINT: &str = "/conformance";

/// CQL2 classes needed whenever any filter is bound.
const CQL2_CLASSES: [&str; 3] = [
    r"http://www.opengis.net/spec/cql2/1.0/conf/basic-cql2",
    r"http://www.opengis.net/spec/cql2/1.0/conf/cql2-text",
    r"http://www.opengis.net/spec/cql2/1.0/conf/cql2-json",
];

/// Classes needed by the items filter.
const ITEMS_FILTER_CLASSES: [&str; 3] = [
    r"http://www.opengis.net/spec/ogcapi-features-3/1.0/conf/filter",
    r"http://www.opengis.net/spec/ogcapi-features-3/1.0/conf/features-filter",
    r"https://api.stacspec.org/v1\.0\.0(?:-[\w\.]+)?/item-search#filter",
];

/// Classes needed by the collections filter.
const COLLECTIONS_FILTER_CLASSES: [&str; 4] = [
    r"https://api.stacspec.org/v1\.0\.0/core",
    r"https://api.stacspec.org/v1\.0\.0(?:-[\w\.]+)?/collection-search",
    r"https://api.stacspec.org/v1\.0\.0(?:-[\w\.]+)?/collection-search#filter",
    r"http://www.opengis.net/spec/ogcapi-common-2/1.0/conf/simple-query",
];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Startup check failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartupError {
    /// A dependency never became healthy.
    #[error("{0}")]
    Unhealthy(String),
    /// The upstream lacks required conformance classes.
    #[error("upstream is missing conformance classes: {0}")]
    Conformance(String),
}

// ============================================================================
// SECTION: Retry Policy
// ============================================================================

/// Bounded exponential backoff for pre-flight probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts.
    pub max_retries: u32,
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Delay ceiling.
    pub max_delay: Duration,
    /// Deadline for one attempt.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Builds the policy from startup settings.
    #[must_use]
    pub const fn from_config(config: &StartupConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
        }
    }

    /// Returns the delay after failed attempt `attempt` (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Runs `probe` until it succeeds or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::Unhealthy`] after the last failed attempt.
    pub async fn run<F, Fut>(&self, label: &str, mut probe: F) -> Result<(), StartupError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        let mut last_error = String::from("no attempts made");
        for attempt in 0..self.max_retries {
            match tokio::time::timeout(self.attempt_timeout, probe()).await {
                Ok(Ok(())) => {
                    info!(dependency = label, attempt = attempt + 1, "dependency healthy");
                    return Ok(());
                }
                Ok(Err(err)) => last_error = err,
                Err(_) => last_error = "attempt timed out".to_string(),
            }
            if attempt + 1 < self.max_retries {
                let delay = self.delay_for(attempt);
                warn!(
                    dependency = label,
                    attempt = attempt + 1,
                    max_retries = self.max_retries,
                    retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %last_error,
                    "dependency not healthy; retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
        error!(dependency = label, error = %last_error, "dependency failed pre-flight");
        Err(StartupError::Unhealthy(format!(
            "{label} failed to respond after {} attempts: {last_error}",
            self.max_retries
        )))
    }
}

// ============================================================================
// SECTION: Probes
// ============================================================================

/// Issues `GET path` upstream and returns the body on success.
async fn probe_upstream(upstream: &dyn Upstream, path: &str) -> Result<Vec<u8>, String> {
    let response = upstream
        .forward(&ProxyRequest::new(Method::GET, path), &ClientInfo::default())
        .await
        .map_err(|err| err.to_string())?;
    if !response.status.is_success() {
        return Err(format!("{path} returned {}", response.status.as_u16()));
    }
    Ok(response.body.to_vec())
}

/// Waits for the upstream root to answer successfully.
///
/// # Errors
///
/// Returns [`StartupError::Unhealthy`] when retries are exhausted.
pub async fn wait_for_upstream(upstream: &dyn Upstream, policy: &RetryPolicy) -> Result<(), StartupError> {
    policy.run("upstream", move || async move { probe_upstream(upstream, "/").await.map(|_| ()) }).await
}

/// Loads the signing keys, retrying discovery failures.
///
/// # Errors
///
/// Returns [`StartupError::Unhealthy`] when retries are exhausted.
pub async fn wait_for_signing_keys(keys: &KeyStore, policy: &RetryPolicy) -> Result<(), StartupError> {
    policy
        .run("identity provider", move || async move { keys.load().await.map_err(|err| err.to_string()) })
        .await
}

/// Returns the conformance patterns the bound filters require.
#[must_use]
pub fn required_conformances(filters: &FiltersConfig) -> Vec<&'static str> {
    let mut required = Vec::new();
    if filters.any_bound() {
        required.extend(CQL2_CLASSES);
    }
    if filters.items.is_some() {
        required.extend(ITEMS_FILTER_CLASSES);
    }
    if filters.collections.is_some() {
        required.extend(COLLECTIONS_FILTER_CLASSES);
    }
    required
}

/// Returns the patterns in `required` that no declared class satisfies.
///
/// # Errors
///
/// Returns [`StartupError::Conformance`] when a pattern does not compile.
pub fn missing_conformances(
    required: &[&str],
    conforms_to: &[String],
) -> Result<Vec<String>, StartupError> {
    let mut missing = Vec::new();
    for pattern in required {
        let regex = Regex::new(&format!("^(?:{pattern})"))
            .map_err(|err| StartupError::Conformance(format!("bad pattern {pattern}: {err}")))?;
        if !conforms_to.iter().any(|class| regex.is_match(class)) {
            missing.push((*pattern).to_string());
        }
    }
    Ok(missing)
}

/// Verifies the upstream declares every class the bound filters need.
///
/// # Errors
///
/// Returns [`StartupError::Conformance`] when classes are missing or the
/// conformance document cannot be read.
pub async fn check_conformance(upstream: &dyn Upstream, filters: &FiltersConfig) -> Result<(), StartupError> {
    let required = required_conformances(filters);
    if required.is_empty() {
        return Ok(());
    }
    let body = probe_upstream(upstream, CONFORMANCE_ENDPOINT)
        .await
        .map_err(StartupError::Conformance)?;
    let document: Value = serde_json::from_slice(&body)
        .map_err(|err| StartupError::Conformance(format!("conformance is not JSON: {err}")))?;
    let conforms_to: Vec<String> = document
        .get("conformsTo")
        .and_then(Value::as_array)
        .map(|classes| classes.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let missing = missing_conformances(&required, &conforms_to)?;
    if !missing.is_empty() {
        return Err(StartupError::Conformance(missing.join(", ")));
    }
    info!(classes = required.len(), "upstream conformance verified");
    Ok(())
}

/// Runs every configured pre-flight check.
///
/// # Errors
///
/// Returns the first [`StartupError`] encountered.
pub async fn run_startup_checks(
    startup: &StartupConfig,
    filters: &FiltersConfig,
    upstream: &dyn Upstream,
    keys: &KeyStore,
) -> Result<(), StartupError> {
    let policy = RetryPolicy::from_config(startup);
    if startup.wait_for_upstream {
        wait_for_upstream(upstream, &policy).await?;
        wait_for_signing_keys(keys, &policy).await?;
    } else if let Err(err) = keys.load().await {
        warn!(error = %err, "signing keys not loaded at startup; requests will retry");
    }
    if startup.check_conformance {
        check_conformance(upstream, filters).await?;
    }
    Ok(())
}
