// crates/stac-auth-proxy/src/lib.rs
// ============================================================================
// Module: STAC Auth Proxy
// Description: Authenticating, filtering reverse proxy for STAC APIs.
// Purpose: Mediate every request between clients and an upstream STAC API.
// Dependencies: axum, jsonwebtoken, reqwest, tokio, cql2-logic,
//               stac-auth-proxy-config, stac-auth-proxy-filters
// ============================================================================

//! ## Overview
//! The proxy classifies each request as public or private, validates bearer
//! tokens against the identity provider's signing keys, injects row-level
//! CQL2 predicates into listings and guards single-record reads and writes,
//! forwards to the upstream, then rewrites links and advertises
//! authentication requirements in catalog and `OpenAPI` documents.
//! [`ProxyServer`] is the entry point; [`Pipeline`] holds the per-request
//! stages.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod access;
pub mod auth;
pub mod auth_extension;
pub mod error;
pub mod exchange;
pub mod filter_apply;
pub mod lifespan;
pub mod oidc;
pub mod openapi;
pub mod paths;
pub mod pipeline;
pub mod routing;
pub mod server;
pub mod upstream;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use access::AccessRuleTable;
pub use access::Classification;
pub use access::RuleSet;
pub use auth::AuthAuditSink;
pub use auth::AuthContext;
pub use auth::AuthError;
pub use auth::CredentialValidator;
pub use auth::NoopAuditSink;
pub use auth::TokenVerifier;
pub use auth::TracingAuditSink;
pub use auth_extension::AuthExtension;
pub use error::ProxyError;
pub use error::ReasonCode;
pub use exchange::ClientInfo;
pub use exchange::ProxyRequest;
pub use exchange::ProxyResponse;
pub use lifespan::RetryPolicy;
pub use lifespan::StartupError;
pub use oidc::HttpKeySetSource;
pub use oidc::KeySetSource;
pub use oidc::KeyStore;
pub use oidc::OidcError;
pub use openapi::SpecAugmenter;
pub use paths::PathRewriter;
pub use pipeline::Pipeline;
pub use pipeline::PipelineError;
pub use pipeline::Stage;
pub use routing::StacRoute;
pub use server::ProxyServer;
pub use server::ProxyServerError;
pub use upstream::HttpUpstream;
pub use upstream::Upstream;
pub use upstream::UpstreamError;
