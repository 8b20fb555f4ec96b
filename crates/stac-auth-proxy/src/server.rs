// crates/stac-auth-proxy/src/server.rs
// ============================================================================
// Module: Proxy Server
// Description: axum front end for the mediation pipeline.
// Purpose: Bind the listener, serve health probes, and hand everything else
//          to the pipeline.
// Dependencies: axum, tokio, tower-http, crate::*
// ============================================================================

//! ## Overview
//! [`ProxyServer`] wires configuration into the shared services (key store,
//! credential validator, filter generators, upstream client, pipeline),
//! runs the startup checks, and serves an axum router. Health probes live at
//! `{root}{healthz}` and `{root}{healthz}/upstream`; every other request is
//! buffered (bounded by `max_body_bytes`) and run through the pipeline.
//! Responses carry `X-Process-Time` and are optionally gzip-compressed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::body::to_bytes;
use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use serde_json::json;
use stac_auth_proxy_config::ProxyConfig;
use stac_auth_proxy_filters::FilterRegistry;
use thiserror::Error;
use tower_http::compression::CompressionLayer;
use tracing::info;

use crate::auth::CredentialValidator;
use crate::auth::TokenVerifier;
use crate::auth::TracingAuditSink;
use crate::error::ProxyError;
use crate::error::ReasonCode;
use crate::exchange::ClientInfo;
use crate::exchange::ProxyRequest;
use crate::exchange::ProxyResponse;
use crate::lifespan::run_startup_checks;
use crate::oidc::HttpKeySetSource;
use crate::oidc::KeyStore;
use crate::pipeline::Pipeline;
use crate::upstream::HttpUpstream;
use crate::upstream::Upstream;

/// Header reporting total handling time in seconds.
pub const PROCESS_TIME_HEADER: &str = "x-process-time";

// ============================================================================
// SECTION: Proxy Server
// ============================================================================

/// Proxy server instance.
pub struct ProxyServer {
    /// Validated configuration.
    config: ProxyConfig,
    /// Shared mediation pipeline.
    pipeline: Arc<Pipeline>,
    /// Upstream used for forwarding, health probes, and startup checks.
    upstream: Arc<dyn Upstream>,
    /// Signing-key cache.
    keys: Arc<KeyStore>,
}

impl ProxyServer {
    /// Builds the server and its services from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyServerError`] when validation or initialization fails.
    pub fn from_config(config: ProxyConfig) -> Result<Self, ProxyServerError> {
        Self::with_registry(config, &FilterRegistry::with_builtin_generators())
    }

    /// Builds the server with a caller-supplied generator registry.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyServerError`] when validation or initialization fails.
    pub fn with_registry(
        config: ProxyConfig,
        registry: &FilterRegistry,
    ) -> Result<Self, ProxyServerError> {
        config.validate().map_err(|err| ProxyServerError::Config(err.to_string()))?;
        let source = HttpKeySetSource::from_config(&config.oidc)
            .map_err(|err| ProxyServerError::Init(err.to_string()))?;
        let keys = Arc::new(KeyStore::new(
            Arc::new(source),
            Duration::from_millis(config.oidc.jwks_refresh_cooldown_ms),
        ));
        let verifier = TokenVerifier::from_config(&config.oidc, Arc::clone(&keys))
            .map_err(|err| ProxyServerError::Init(err.to_string()))?;
        let validator = CredentialValidator::new(verifier, Arc::new(TracingAuditSink));
        let upstream: Arc<dyn Upstream> = Arc::new(
            HttpUpstream::from_config(&config.upstream, &config.server.root_path)
                .map_err(|err| ProxyServerError::Init(err.to_string()))?,
        );
        let pipeline =
            Pipeline::from_config(&config, validator, Arc::clone(&upstream), registry)
                .map_err(|err| ProxyServerError::Init(err.to_string()))?;
        Ok(Self::from_parts(config, pipeline, upstream, keys))
    }

    /// Assembles a server from prebuilt services.
    #[must_use]
    pub fn from_parts(
        config: ProxyConfig,
        pipeline: Pipeline,
        upstream: Arc<dyn Upstream>,
        keys: Arc<KeyStore>,
    ) -> Self {
        Self {
            config,
            pipeline: Arc::new(pipeline),
            upstream,
            keys,
        }
    }

    /// Builds the server and runs the configured startup checks.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyServerError::Startup`] when a pre-flight check fails.
    pub async fn bootstrap(config: ProxyConfig) -> Result<Self, ProxyServerError> {
        let server = Self::from_config(config)?;
        server.run_startup_checks().await?;
        Ok(server)
    }

    /// Runs the configured startup checks.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyServerError::Startup`] when a pre-flight check fails.
    pub async fn run_startup_checks(&self) -> Result<(), ProxyServerError> {
        run_startup_checks(
            &self.config.startup,
            &self.config.filters,
            self.upstream.as_ref(),
            &self.keys,
        )
        .await
        .map_err(|err| ProxyServerError::Startup(err.to_string()))
    }

    /// Builds the axum router.
    #[must_use]
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            pipeline: Arc::clone(&self.pipeline),
            upstream: Arc::clone(&self.upstream),
            max_body_bytes: self.config.server.max_body_bytes,
        });
        let healthz = format!("{}{}", self.config.server.root_path, self.config.server.healthz_prefix);
        let router = Router::new()
            .route(&healthz, get(handle_healthz))
            .route(&format!("{healthz}/upstream"), get(handle_upstream_health))
            .fallback(handle_proxy)
            .with_state(state)
            .layer(middleware::from_fn(add_process_time));
        if self.config.server.enable_compression {
            router.layer(CompressionLayer::new())
        } else {
            router
        }
    }

    /// Binds the listener and serves until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ProxyServerError> {
        let addr =
            self.config.server.bind_addr().map_err(|err| ProxyServerError::Config(err.to_string()))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| ProxyServerError::Transport(format!("bind {addr} failed: {err}")))?;
        info!(
            addr = %addr,
            upstream = %self.config.upstream.url,
            root_path = %self.config.server.root_path,
            "stac auth proxy listening"
        );
        axum::serve(listener, self.router().into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|err| ProxyServerError::Transport(format!("http server failed: {err}")))
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Shared state for request handlers.
struct ServerState {
    /// Mediation pipeline.
    pipeline: Arc<Pipeline>,
    /// Upstream probed by the upstream health check.
    upstream: Arc<dyn Upstream>,
    /// Maximum buffered request body size.
    max_body_bytes: usize,
}

/// Reports proxy liveness.
async fn handle_healthz() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Reports upstream health.
async fn handle_upstream_health(State(state): State<Arc<ServerState>>) -> Response {
    let probe = ProxyRequest::new(Method::GET, "/");
    match state.upstream.forward(&probe, &ClientInfo::default()).await {
        Ok(response) if response.status.is_success() => {
            Json(json!({"status": "ok", "code": response.status.as_u16()})).into_response()
        }
        Ok(response) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "error", "code": response.status.as_u16()})),
        )
            .into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "error", "code": null, "detail": err.to_string()})),
        )
            .into_response(),
    }
}

/// Buffers the request and runs it through the pipeline.
async fn handle_proxy(State(state): State<Arc<ServerState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let peer = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| *addr);
    let Ok(body) = to_bytes(body, state.max_body_bytes).await else {
        let rejection = ProxyError::new(
            ReasonCode::InvalidRequest,
            format!("request body exceeds {} bytes", state.max_body_bytes),
        );
        return IntoResponse::into_response(ProxyError::into_response(rejection));
    };
    let client = ClientInfo::from_headers(peer, &parts.headers);
    let request = ProxyRequest::new(parts.method, parts.uri.path())
        .with_raw_query(parts.uri.query())
        .with_headers(parts.headers)
        .with_body(body);
    state.pipeline.handle(request, client).await.into_response()
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Adds `X-Process-Time` to every response.
async fn add_process_time(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(request).await;
    let elapsed = started.elapsed().as_secs_f64();
    if let Ok(value) = HeaderValue::from_str(&format!("{elapsed:.3}")) {
        response.headers_mut().insert(HeaderName::from_static(PROCESS_TIME_HEADER), value);
    }
    response
}

/// Resolves when the process receives Ctrl-C.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Proxy server errors.
#[derive(Debug, Error)]
pub enum ProxyServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Startup check failures.
    #[error("startup check failed: {0}")]
    Startup(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
