// crates/stac-auth-proxy/src/error.rs
// ============================================================================
// Module: Proxy Errors
// Description: Reason codes and the single error type surfaced to clients.
// Purpose: Map every pipeline failure to a stable status and reason code.
// Dependencies: axum, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every stage of the mediation pipeline fails with a [`ProxyError`]. The
//! [`ReasonCode`] owns the HTTP status so causes sharing a status (several
//! 404 sources, several 502 sources) stay distinguishable for clients.
//! Error bodies are `{"code": "<reason>", "description": "<detail>"}`.

use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::http::header::WWW_AUTHENTICATE;
use bytes::Bytes;
use serde_json::json;
use thiserror::Error;

use crate::exchange::ProxyResponse;

// ============================================================================
// SECTION: Reason Codes
// ============================================================================

/// Machine-readable failure cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonCode {
    /// Request path is outside the external root prefix.
    RootPathMismatch,
    /// Record hidden by the predicate or missing upstream.
    RecordNotFound,
    /// Private route without a usable bearer token.
    MissingToken,
    /// Token failed verification.
    InvalidToken,
    /// Token lacks required scopes.
    InsufficientScope,
    /// Mutation body would violate the predicate.
    PredicateDenied,
    /// Client payload or filter is malformed.
    InvalidRequest,
    /// Mutation on a filtered route is disabled.
    MutationNotSupported,
    /// Filter generator raised.
    FilterGeneratorFailed,
    /// Filter generator produced an unparsable predicate.
    InvalidGeneratedFilter,
    /// Filter generator exceeded its deadline.
    FilterGeneratorTimeout,
    /// Upstream could not be reached.
    UpstreamUnavailable,
    /// Upstream body could not be inspected.
    UpstreamInvalidResponse,
    /// Upstream call exceeded its deadline.
    UpstreamTimeout,
    /// Signing keys could not be obtained.
    SigningKeysUnavailable,
}

impl ReasonCode {
    /// Returns the stable snake_case code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RootPathMismatch => "root_path_mismatch",
            Self::RecordNotFound => "record_not_found",
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
            Self::InsufficientScope => "insufficient_scope",
            Self::PredicateDenied => "predicate_denied",
            Self::InvalidRequest => "invalid_request",
            Self::MutationNotSupported => "mutation_not_supported",
            Self::FilterGeneratorFailed => "filter_generator_failed",
            Self::InvalidGeneratedFilter => "invalid_generated_filter",
            Self::FilterGeneratorTimeout => "filter_generator_timeout",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::UpstreamInvalidResponse => "upstream_invalid_response",
            Self::UpstreamTimeout => "upstream_timeout",
            Self::SigningKeysUnavailable => "signing_keys_unavailable",
        }
    }

    /// Returns the HTTP status for this code.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::RootPathMismatch | Self::RecordNotFound => StatusCode::NOT_FOUND,
            Self::MissingToken | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::InsufficientScope | Self::PredicateDenied => StatusCode::FORBIDDEN,
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::MutationNotSupported => StatusCode::NOT_IMPLEMENTED,
            Self::FilterGeneratorFailed => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidGeneratedFilter
            | Self::UpstreamUnavailable
            | Self::UpstreamInvalidResponse => StatusCode::BAD_GATEWAY,
            Self::FilterGeneratorTimeout | Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::SigningKeysUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

// ============================================================================
// SECTION: Proxy Error
// ============================================================================

/// Pipeline failure surfaced to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {detail}", .reason.as_str())]
pub struct ProxyError {
    /// Failure cause.
    pub reason: ReasonCode,
    /// Human-readable description.
    pub detail: String,
    /// Scopes to advertise on `insufficient_scope` challenges.
    pub required_scopes: Vec<String>,
}

impl ProxyError {
    /// Builds an error with `reason` and `detail`.
    #[must_use]
    pub fn new(reason: ReasonCode, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
            required_scopes: Vec::new(),
        }
    }

    /// Builds the `insufficient_scope` error for `required`.
    #[must_use]
    pub fn insufficient_scope(required: &[String]) -> Self {
        Self {
            reason: ReasonCode::InsufficientScope,
            detail: format!("token lacks required scopes: {}", required.join(" ")),
            required_scopes: required.to_vec(),
        }
    }

    /// Builds the `record_not_found` error.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(ReasonCode::RecordNotFound, "Record not found.")
    }

    /// Returns the HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.reason.status()
    }

    /// Renders the error as a client response.
    #[must_use]
    pub fn into_response(self) -> ProxyResponse {
        let status = self.status();
        let challenge = self.challenge();
        let body = json!({
            "code": self.reason.as_str(),
            "description": self.detail,
        });
        let mut response = ProxyResponse::new(status, Bytes::from(body.to_string()));
        response.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(challenge) = challenge {
            response.headers.insert(WWW_AUTHENTICATE, challenge);
        }
        response
    }

    /// Returns the `WWW-Authenticate` challenge for auth failures.
    fn challenge(&self) -> Option<HeaderValue> {
        match self.reason {
            ReasonCode::MissingToken | ReasonCode::InvalidToken => {
                Some(HeaderValue::from_static("Bearer"))
            }
            ReasonCode::InsufficientScope => HeaderValue::from_str(&format!(
                "Bearer error=\"insufficient_scope\", scope=\"{}\"",
                self.required_scopes.join(" ")
            ))
            .ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests;
