// crates/stac-auth-proxy/src/upstream.rs
// ============================================================================
// Module: Upstream Client
// Description: Forwards mediated requests to the upstream STAC API.
// Purpose: Provide the single network seam between the pipeline and upstream.
// Dependencies: reqwest, url, tracing, crate::exchange
// ============================================================================

//! ## Overview
//! [`Upstream`] is the forwarding capability the pipeline calls once per
//! request. [`HttpUpstream`] implements it with `reqwest`: redirects are not
//! followed, hop-by-hop headers are dropped in both directions, `Via` and
//! `Forwarded` are added when absent, and the upstream body is read fully
//! (decoded) so response stages can inspect it. Transport failures map to
//! `upstream_unavailable`, deadline overruns to `upstream_timeout`.

use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::header;
use reqwest::Client;
use reqwest::redirect::Policy;
use stac_auth_proxy_config::UpstreamConfig;
use thiserror::Error;
use tracing::debug;
use url::Position;
use url::Url;

use crate::error::ProxyError;
use crate::error::ReasonCode;
use crate::exchange::ClientInfo;
use crate::exchange::ProxyRequest;
use crate::exchange::ProxyResponse;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Name advertised in `Via`.
const PROXY_NAME: &str = "stac-auth-proxy";

/// Header reporting upstream latency in seconds.
pub const UPSTREAM_TIME_HEADER: &str = "x-upstream-time";

/// Connection-scoped headers never forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Upstream forwarding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Connection or transport failure.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    /// Forward call exceeded its deadline.
    #[error("upstream timed out: {0}")]
    Timeout(String),
    /// Client could not be constructed.
    #[error("upstream config error: {0}")]
    Config(String),
}

impl From<UpstreamError> for ProxyError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Timeout(detail) => Self::new(ReasonCode::UpstreamTimeout, detail),
            UpstreamError::Unavailable(detail) | UpstreamError::Config(detail) => {
                Self::new(ReasonCode::UpstreamUnavailable, detail)
            }
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { Self::Timeout(err.to_string()) } else { Self::Unavailable(err.to_string()) }
    }
}

// ============================================================================
// SECTION: Capability
// ============================================================================

/// Forwarding capability used by the pipeline.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Sends `request` upstream on behalf of `client`.
    async fn forward(
        &self,
        request: &ProxyRequest,
        client: &ClientInfo,
    ) -> Result<ProxyResponse, UpstreamError>;
}

// ============================================================================
// SECTION: HTTP Upstream
// ============================================================================

/// `reqwest`-backed upstream.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    /// HTTP client with timeouts and redirects disabled.
    client: Client,
    /// Upstream base URL.
    base: Url,
    /// Upstream `host[:port]`.
    authority: String,
    /// Replace `Host` with the upstream authority.
    override_host: bool,
    /// External root prefix reported in `Forwarded`.
    root_path: String,
}

impl HttpUpstream {
    /// Builds the upstream from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Config`] when the URL or client is invalid.
    pub fn from_config(config: &UpstreamConfig, root_path: &str) -> Result<Self, UpstreamError> {
        let base = Url::parse(&config.url)
            .map_err(|err| UpstreamError::Config(format!("upstream.url: {err}")))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .redirect(Policy::none())
            .build()
            .map_err(|err| UpstreamError::Config(format!("upstream client: {err}")))?;
        let authority = base[Position::BeforeHost..Position::AfterPort].to_string();
        Ok(Self {
            client,
            base,
            authority,
            override_host: config.override_host,
            root_path: root_path.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the upstream base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolves `request` against the upstream base URL.
    #[must_use]
    pub fn url_for(&self, request: &ProxyRequest) -> String {
        let base = &self.base[..Position::AfterPath];
        let mut url = format!("{}{}", base.trim_end_matches('/'), request.path);
        if let Some(query) = request.query_string() {
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    /// Builds the outbound header set for `request`.
    fn outbound_headers(&self, request: &ProxyRequest, client: &ClientInfo) -> HeaderMap {
        let mut headers = strip_hop_by_hop(&request.headers);
        headers.remove(header::ACCEPT_ENCODING);
        headers.remove(header::CONTENT_LENGTH);
        if !headers.contains_key(header::VIA) {
            if let Ok(value) = HeaderValue::from_str(&format!("1.1 {PROXY_NAME}")) {
                headers.insert(header::VIA, value);
            }
        }
        if !headers.contains_key(header::FORWARDED) {
            let peer = client.peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string());
            let host = client.host.as_deref().unwrap_or("unknown");
            let forwarded = format!(
                "for={peer};host={host};proto={};path={}/",
                client.scheme, self.root_path
            );
            if let Ok(value) = HeaderValue::from_str(&forwarded) {
                headers.insert(header::FORWARDED, value);
            }
        }
        if self.override_host {
            if let Ok(value) = HeaderValue::from_str(&self.authority) {
                headers.insert(header::HOST, value);
            }
        }
        headers
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward(
        &self,
        request: &ProxyRequest,
        client: &ClientInfo,
    ) -> Result<ProxyResponse, UpstreamError> {
        let url = self.url_for(request);
        debug!(method = %request.method, url = %url, "forwarding upstream");
        let started = Instant::now();
        let response = self
            .client
            .request(request.method.clone(), &url)
            .headers(self.outbound_headers(request, client))
            .body(request.body.clone())
            .send()
            .await?;
        let status = response.status();
        let mut headers = strip_hop_by_hop(response.headers());
        let body = response.bytes().await?;
        let elapsed = started.elapsed().as_secs_f64();
        debug!(status = status.as_u16(), url = %url, elapsed, "upstream responded");
        headers.remove(header::CONTENT_ENCODING);
        headers.remove(header::CONTENT_LENGTH);
        if let Ok(value) = HeaderValue::from_str(&format!("{elapsed:.3}")) {
            headers.insert(HeaderName::from_static(UPSTREAM_TIME_HEADER), value);
        }
        let mut proxied = ProxyResponse::new(status, body);
        proxied.headers = headers;
        Ok(proxied)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Copies `headers` without hop-by-hop and `Connection`-listed entries.
fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let lowered = name.as_str();
        if HOP_BY_HOP.contains(&lowered) || listed.iter().any(|token| token == lowered) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}
