// crates/stac-auth-proxy/src/auth.rs
// ============================================================================
// Module: Credential Validator
// Description: Bearer-token verification, scope checks, and auth auditing.
// Purpose: Provide strict, fail-closed authentication for private routes.
// Dependencies: jsonwebtoken, serde, tracing, crate::{access, oidc}
// ============================================================================

//! ## Overview
//! [`CredentialValidator`] turns a classification and an `Authorization`
//! header into an [`AuthContext`]. Private routes require a bearer token;
//! public routes verify a token when one is presented so filter generators
//! can widen access for signed-in callers. A verification miss refreshes the
//! signing keys once and retries; a second failure rejects the request.
//! Every decision is emitted to an [`AuthAuditSink`] with a token
//! fingerprint, never the token.
//! Security posture: tokens are untrusted input; see `DESIGN.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::JwkSet;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use stac_auth_proxy_config::OidcConfig;
use stac_auth_proxy_filters::fingerprint;
use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::access::Classification;
use crate::error::ProxyError;
use crate::error::ReasonCode;
use crate::oidc::KeyStore;
use crate::oidc::RefreshOutcome;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Largest `Authorization` header accepted.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Auth Context
// ============================================================================

/// Caller identity for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthContext {
    /// True when a token was verified.
    pub authenticated: bool,
    /// Verified token claims.
    pub claims: Map<String, Value>,
    /// Scopes granted by the token.
    pub scopes: BTreeSet<String>,
    /// SHA-256 fingerprint of the verified token.
    pub token_fingerprint: Option<String>,
}

impl AuthContext {
    /// Returns the unauthenticated context.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Builds an authenticated context from verified claims.
    #[must_use]
    pub fn from_claims(claims: Map<String, Value>, token: &str) -> Self {
        let scopes = scopes_from_claims(&claims);
        Self {
            authenticated: true,
            claims,
            scopes,
            token_fingerprint: Some(fingerprint(token.as_bytes())),
        }
    }

    /// Returns the `sub` claim.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(Value::as_str)
    }

    /// Returns the claims as a JSON object, or `null` when anonymous.
    #[must_use]
    pub fn payload(&self) -> Option<Value> {
        self.authenticated.then(|| Value::Object(self.claims.clone()))
    }

    /// Returns the required scopes this context lacks.
    #[must_use]
    pub fn missing_scopes(&self, required: &[String]) -> Vec<String> {
        required.iter().filter(|scope| !self.scopes.contains(*scope)).cloned().collect()
    }
}

/// Collects scopes from `scope` (space-delimited) and `scp` (array or string).
#[must_use]
pub fn scopes_from_claims(claims: &Map<String, Value>) -> BTreeSet<String> {
    let mut scopes = BTreeSet::new();
    for key in ["scope", "scp"] {
        match claims.get(key) {
            Some(Value::String(raw)) => {
                scopes.extend(raw.split_whitespace().map(str::to_string));
            }
            Some(Value::Array(items)) => {
                scopes.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
            }
            _ => {}
        }
    }
    scopes
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication or authorization errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No usable bearer token on a private route.
    #[error("missing token: {0}")]
    MissingToken(String),
    /// Token failed verification.
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// Token lacks required scopes.
    #[error("insufficient scope: requires {}", .0.join(" "))]
    InsufficientScope(Vec<String>),
    /// Signing keys could not be obtained.
    #[error("signing keys unavailable: {0}")]
    KeysUnavailable(String),
}

impl AuthError {
    /// Returns a short label for audit events.
    const fn label(&self) -> &'static str {
        match self {
            Self::MissingToken(_) => "missing_token",
            Self::InvalidToken(_) => "invalid_token",
            Self::InsufficientScope(_) => "insufficient_scope",
            Self::KeysUnavailable(_) => "signing_keys_unavailable",
        }
    }
}

impl From<AuthError> for ProxyError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken(detail) => Self::new(ReasonCode::MissingToken, detail),
            AuthError::InvalidToken(detail) => Self::new(ReasonCode::InvalidToken, detail),
            AuthError::InsufficientScope(required) => Self::insufficient_scope(&required),
            AuthError::KeysUnavailable(detail) => {
                Self::new(ReasonCode::SigningKeysUnavailable, detail)
            }
        }
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink for auth decisions.
pub trait AuthAuditSink: Send + Sync {
    /// Records an auth audit event.
    fn record(&self, event: &AuthAuditEvent);
}

/// Auth audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Decision outcome.
    pub decision: &'static str,
    /// Request method.
    pub method: String,
    /// Prefix-stripped request path.
    pub path: String,
    /// Token subject when verified.
    pub subject: Option<String>,
    /// Token fingerprint (sha256) when verified.
    pub token_fingerprint: Option<String>,
    /// Failure reason for deny events.
    pub reason: Option<String>,
}

impl AuthAuditEvent {
    /// Builds an allow event.
    #[must_use]
    pub fn allowed(method: &str, path: &str, auth: &AuthContext) -> Self {
        Self {
            event: "stac_auth",
            decision: "allow",
            method: method.to_string(),
            path: path.to_string(),
            subject: auth.subject().map(str::to_string),
            token_fingerprint: auth.token_fingerprint.clone(),
            reason: None,
        }
    }

    /// Builds a deny event.
    #[must_use]
    pub fn denied(method: &str, path: &str, error: &AuthError) -> Self {
        Self {
            event: "stac_auth",
            decision: "deny",
            method: method.to_string(),
            path: path.to_string(),
            subject: None,
            token_fingerprint: None,
            reason: Some(error.label().to_string()),
        }
    }
}

/// Audit sink that emits JSON events through `tracing`.
pub struct TracingAuditSink;

impl AuthAuditSink for TracingAuditSink {
    fn record(&self, event: &AuthAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            if event.decision == "deny" {
                warn!(target: "stac_auth_proxy::audit", event = %payload, "auth decision");
            } else {
                info!(target: "stac_auth_proxy::audit", event = %payload, "auth decision");
            }
        }
    }
}

/// No-op audit sink for tests.
pub struct NoopAuditSink;

impl AuthAuditSink for NoopAuditSink {
    fn record(&self, _event: &AuthAuditEvent) {}
}

// ============================================================================
// SECTION: Token Verification
// ============================================================================

/// Outcome of one verification attempt against a key set.
enum Attempt {
    /// Key missing or signature mismatch; a refreshed key set may help.
    Retry(String),
    /// Token is invalid regardless of keys.
    Reject(String),
}

/// JWT verifier backed by the shared [`KeyStore`].
pub struct TokenVerifier {
    /// Signing-key cache.
    keys: Arc<KeyStore>,
    /// Accepted algorithms.
    algorithms: Vec<Algorithm>,
    /// Accepted audiences (empty disables the configured check).
    audiences: Vec<String>,
}

impl TokenVerifier {
    /// Builds a verifier from provider settings.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] naming an unknown algorithm.
    pub fn from_config(config: &OidcConfig, keys: Arc<KeyStore>) -> Result<Self, AuthError> {
        let algorithms = config
            .algorithms
            .iter()
            .map(|name| {
                Algorithm::from_str(name)
                    .map_err(|_| AuthError::InvalidToken(format!("unsupported algorithm `{name}`")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            keys,
            algorithms,
            audiences: config.allowed_audiences.clone(),
        })
    }

    /// Verifies `token` and returns its claims, refreshing keys once on a
    /// key miss.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] or [`AuthError::KeysUnavailable`].
    pub async fn verify(&self, token: &str) -> Result<Map<String, Value>, AuthError> {
        let header = decode_header(token)
            .map_err(|err| AuthError::InvalidToken(format!("malformed token: {err}")))?;
        if !self.algorithms.contains(&header.alg) {
            return Err(AuthError::InvalidToken("token algorithm not allowed".to_string()));
        }
        let (generation, keys) = self.keys.snapshot();
        match self.verify_with(&keys, &header, token) {
            Ok(claims) => return Ok(claims),
            Err(Attempt::Reject(reason)) => return Err(AuthError::InvalidToken(reason)),
            Err(Attempt::Retry(_)) => {}
        }
        let outcome = self
            .keys
            .refresh_after(generation)
            .await
            .map_err(|err| AuthError::KeysUnavailable(err.to_string()))?;
        let (_, keys) = self.keys.snapshot();
        if keys.keys.is_empty() && outcome == RefreshOutcome::CoolingDown {
            return Err(AuthError::KeysUnavailable("no signing keys loaded".to_string()));
        }
        self.verify_with(&keys, &header, token).map_err(|attempt| match attempt {
            Attempt::Retry(reason) | Attempt::Reject(reason) => AuthError::InvalidToken(reason),
        })
    }

    /// Verifies `token` against one key set.
    fn verify_with(
        &self,
        keys: &JwkSet,
        header: &Header,
        token: &str,
    ) -> Result<Map<String, Value>, Attempt> {
        let jwk = match header.kid.as_deref() {
            Some(kid) => keys.find(kid),
            None if keys.keys.len() == 1 => keys.keys.first(),
            None => None,
        }
        .ok_or_else(|| Attempt::Retry("no matching signing key".to_string()))?;
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|err| Attempt::Reject(format!("unusable signing key: {err}")))?;
        let mut validation = Validation::new(header.alg);
        validation.algorithms.clone_from(&self.algorithms);
        if !self.audiences.is_empty() {
            validation.set_audience(&self.audiences);
        }
        decode::<Map<String, Value>>(token, &key, &validation).map(|data| data.claims).map_err(
            |err| match err.kind() {
                ErrorKind::InvalidSignature => Attempt::Retry("signature mismatch".to_string()),
                ErrorKind::ExpiredSignature => Attempt::Reject("token expired".to_string()),
                ErrorKind::InvalidAudience => Attempt::Reject("audience not allowed".to_string()),
                _ => Attempt::Reject(err.to_string()),
            },
        )
    }
}

// ============================================================================
// SECTION: Credential Validator
// ============================================================================

/// EnforceAuth stage implementation.
pub struct CredentialValidator {
    /// Token verifier.
    verifier: TokenVerifier,
    /// Audit sink for decisions.
    audit: Arc<dyn AuthAuditSink>,
}

impl CredentialValidator {
    /// Creates the validator.
    #[must_use]
    pub fn new(verifier: TokenVerifier, audit: Arc<dyn AuthAuditSink>) -> Self {
        Self {
            verifier,
            audit,
        }
    }

    /// Authenticates a request classified as `classification`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when a private route lacks a valid token, a
    /// presented token is invalid, or required scopes are missing.
    pub async fn authenticate(
        &self,
        classification: &Classification,
        method: &str,
        path: &str,
        auth_header: Option<&str>,
    ) -> Result<AuthContext, AuthError> {
        let result = self.evaluate(classification, auth_header).await;
        match &result {
            Ok(auth) if auth.authenticated || classification.is_private() => {
                self.audit.record(&AuthAuditEvent::allowed(method, path, auth));
            }
            Ok(_) => {}
            Err(err) => self.audit.record(&AuthAuditEvent::denied(method, path, err)),
        }
        result
    }

    /// Applies the auth rules without auditing.
    async fn evaluate(
        &self,
        classification: &Classification,
        auth_header: Option<&str>,
    ) -> Result<AuthContext, AuthError> {
        let Some(header) = auth_header else {
            if classification.is_private() {
                return Err(AuthError::MissingToken("authorization required".to_string()));
            }
            return Ok(AuthContext::anonymous());
        };
        let token = match parse_bearer_token(header) {
            Ok(token) => token,
            Err(err) if classification.is_private() => return Err(err),
            Err(AuthError::MissingToken(reason)) => return Err(AuthError::InvalidToken(reason)),
            Err(err) => return Err(err),
        };
        let claims = self.verifier.verify(token).await?;
        let auth = AuthContext::from_claims(claims, token);
        let missing = auth.missing_scopes(classification.required_scopes());
        if !missing.is_empty() {
            return Err(AuthError::InsufficientScope(classification.required_scopes().to_vec()));
        }
        Ok(auth)
    }
}

/// Extracts the token from a `Bearer` authorization header.
///
/// # Errors
///
/// Returns [`AuthError::MissingToken`] for oversized or non-bearer headers.
pub fn parse_bearer_token(header: &str) -> Result<&str, AuthError> {
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::MissingToken("authorization header too large".to_string()));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MissingToken("invalid authorization header".to_string()));
    }
    Ok(token)
}
