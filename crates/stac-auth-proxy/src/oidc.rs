// crates/stac-auth-proxy/src/oidc.rs
// ============================================================================
// Module: OIDC Key Store
// Description: Discovery-document lookup and the shared signing-key cache.
// Purpose: Supply verification keys that survive identity-provider rotation.
// Dependencies: arc-swap, jsonwebtoken, reqwest, tokio, url
// ============================================================================

//! ## Overview
//! [`HttpKeySetSource`] resolves `jwks_uri` from the discovery document
//! once, rewriting its origin to the internal discovery URL when one is
//! configured, and fetches the key set on demand. [`KeyStore`] holds the
//! active set behind an [`ArcSwap`] so verification never blocks on a
//! refresh. Refreshes are coalesced: callers that observed the same
//! generation share a single fetch, and request-triggered refreshes are
//! rate-limited by a cooldown.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use reqwest::Client;
use serde::Deserialize;
use stac_auth_proxy_config::OidcConfig;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::sync::OnceCell;
use tracing::info;
use tracing::warn;
use url::Url;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identity-provider interaction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OidcError {
    /// Discovery document could not be fetched or parsed.
    #[error("oidc discovery failed: {0}")]
    Discovery(String),
    /// Key set could not be fetched or parsed.
    #[error("jwks fetch failed: {0}")]
    KeySet(String),
    /// Invalid provider settings.
    #[error("oidc config error: {0}")]
    Config(String),
}

// ============================================================================
// SECTION: Discovery
// ============================================================================

/// Fields of the discovery document the proxy relies on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiscoveryDocument {
    /// Issuer identifier.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Key set location.
    pub jwks_uri: String,
}

/// Replaces the scheme, host, and port of `jwks_uri` with those of `origin`.
///
/// # Errors
///
/// Returns [`OidcError::Discovery`] when either URL cannot be parsed.
pub fn rewrite_origin(jwks_uri: &str, origin: &str) -> Result<String, OidcError> {
    let mut target = Url::parse(jwks_uri)
        .map_err(|err| OidcError::Discovery(format!("invalid jwks_uri `{jwks_uri}`: {err}")))?;
    let origin = Url::parse(origin)
        .map_err(|err| OidcError::Discovery(format!("invalid internal url: {err}")))?;
    target
        .set_scheme(origin.scheme())
        .map_err(|()| OidcError::Discovery("cannot rewrite jwks_uri scheme".to_string()))?;
    target
        .set_host(origin.host_str())
        .map_err(|err| OidcError::Discovery(format!("cannot rewrite jwks_uri host: {err}")))?;
    target
        .set_port(origin.port())
        .map_err(|()| OidcError::Discovery("cannot rewrite jwks_uri port".to_string()))?;
    Ok(target.to_string())
}

// ============================================================================
// SECTION: Key Set Source
// ============================================================================

/// Supplier of the identity provider's current key set.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Fetches the current key set.
    async fn fetch(&self) -> Result<JwkSet, OidcError>;
}

/// Key set source backed by OIDC discovery over HTTP.
pub struct HttpKeySetSource {
    /// HTTP client with the provider timeout applied.
    client: Client,
    /// URL the discovery document is fetched from.
    discovery_url: String,
    /// Origin used to rewrite `jwks_uri`, when configured.
    internal_origin: Option<String>,
    /// Resolved key set URL.
    jwks_uri: OnceCell<String>,
}

impl HttpKeySetSource {
    /// Builds the source from provider settings.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::Config`] when the HTTP client cannot be built.
    pub fn from_config(config: &OidcConfig) -> Result<Self, OidcError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|err| OidcError::Config(format!("oidc client: {err}")))?;
        Ok(Self {
            client,
            discovery_url: config.fetch_url().to_string(),
            internal_origin: config.discovery_internal_url.clone(),
            jwks_uri: OnceCell::new(),
        })
    }

    /// Fetches and parses the discovery document.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::Discovery`] on transport, status, or parse failure.
    pub async fn discover(&self) -> Result<DiscoveryDocument, OidcError> {
        let response = self
            .client
            .get(&self.discovery_url)
            .send()
            .await
            .map_err(|err| OidcError::Discovery(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(OidcError::Discovery(format!("status {}", status.as_u16())));
        }
        response.json().await.map_err(|err| OidcError::Discovery(err.to_string()))
    }

    /// Returns the key set URL, discovering it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::Discovery`] when discovery fails.
    pub async fn jwks_uri(&self) -> Result<&str, OidcError> {
        self.jwks_uri
            .get_or_try_init(|| async {
                let document = self.discover().await?;
                match &self.internal_origin {
                    Some(origin) => {
                        let rewritten = rewrite_origin(&document.jwks_uri, origin)?;
                        if rewritten != document.jwks_uri {
                            info!(
                                from = %document.jwks_uri,
                                to = %rewritten,
                                "jwks_uri rewritten to internal origin"
                            );
                        }
                        Ok(rewritten)
                    }
                    None => Ok(document.jwks_uri),
                }
            })
            .await
            .map(String::as_str)
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> Result<JwkSet, OidcError> {
        let uri = self.jwks_uri().await?;
        let response = self
            .client
            .get(uri)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| OidcError::KeySet(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(OidcError::KeySet(format!("status {}", status.as_u16())));
        }
        response.json().await.map_err(|err| OidcError::KeySet(err.to_string()))
    }
}

// ============================================================================
// SECTION: Key Store
// ============================================================================

/// Result of a refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This caller fetched a new key set.
    Refreshed,
    /// Another caller refreshed while this one waited.
    AlreadyRefreshed,
    /// The last request-triggered refresh is too recent.
    CoolingDown,
}

/// Shared, atomically replaced signing-key cache.
pub struct KeyStore {
    /// Key set supplier.
    source: Arc<dyn KeySetSource>,
    /// Active key set.
    keys: ArcSwap<JwkSet>,
    /// Incremented on every successful replacement.
    generation: AtomicU64,
    /// Serializes fetches; holds the last request-triggered refresh time.
    refresh_gate: Mutex<Option<Instant>>,
    /// Minimum spacing between request-triggered refreshes.
    cooldown: Duration,
}

impl KeyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(source: Arc<dyn KeySetSource>, cooldown: Duration) -> Self {
        Self {
            source,
            keys: ArcSwap::from_pointee(JwkSet {
                keys: Vec::new(),
            }),
            generation: AtomicU64::new(0),
            refresh_gate: Mutex::new(None),
            cooldown,
        }
    }

    /// Returns the current generation and key set.
    #[must_use]
    pub fn snapshot(&self) -> (u64, Arc<JwkSet>) {
        (self.generation.load(Ordering::Acquire), self.keys.load_full())
    }

    /// Returns the number of keys in the active set.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keys.load().keys.len()
    }

    /// Fetches the key set unconditionally. Used at startup.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError`] when the fetch fails; the active set is kept.
    pub async fn load(&self) -> Result<(), OidcError> {
        let _gate = self.refresh_gate.lock().await;
        self.replace().await
    }

    /// Refreshes the key set after a verification miss at `observed`
    /// generation.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError`] when a fetch was attempted and failed.
    pub async fn refresh_after(&self, observed: u64) -> Result<RefreshOutcome, OidcError> {
        let mut last = self.refresh_gate.lock().await;
        if self.generation.load(Ordering::Acquire) != observed {
            return Ok(RefreshOutcome::AlreadyRefreshed);
        }
        if last.is_some_and(|at| at.elapsed() < self.cooldown) {
            return Ok(RefreshOutcome::CoolingDown);
        }
        *last = Some(Instant::now());
        self.replace().await?;
        Ok(RefreshOutcome::Refreshed)
    }

    /// Fetches and swaps in a new key set. Callers hold the refresh gate.
    async fn replace(&self) -> Result<(), OidcError> {
        match self.source.fetch().await {
            Ok(keys) => {
                let count = keys.keys.len();
                self.keys.store(Arc::new(keys));
                let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
                info!(keys = count, generation, "signing keys loaded");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "signing key refresh failed");
                Err(err)
            }
        }
    }
}
