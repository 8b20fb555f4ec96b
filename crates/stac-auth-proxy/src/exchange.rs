// crates/stac-auth-proxy/src/exchange.rs
// ============================================================================
// Module: HTTP Exchange
// Description: Mutable working representation of one request/response pair.
// Purpose: Give pipeline stages a transport-neutral view of the exchange.
// Dependencies: axum (http types), bytes, serde_json, url
// ============================================================================

//! ## Overview
//! [`ProxyRequest`] and [`ProxyResponse`] are owned by a single pipeline run
//! and never shared across requests. Query parameters keep their order and
//! may repeat. Bodies are buffered so stages can inspect and rewrite JSON.

use std::net::SocketAddr;

use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use bytes::Bytes;
use serde_json::Value;
use url::form_urlencoded;

// ============================================================================
// SECTION: Request
// ============================================================================

/// In-flight request as seen by the pipeline.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Request method.
    pub method: Method,
    /// Path relative to the external root prefix once ingress ran.
    pub path: String,
    /// Decoded query parameters in order.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Buffered request body.
    pub body: Bytes,
}

impl ProxyRequest {
    /// Builds an empty-bodied request.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Returns the request with `raw_query` decoded into parameters.
    #[must_use]
    pub fn with_raw_query(mut self, raw_query: Option<&str>) -> Self {
        self.query = raw_query
            .map(|raw| {
                form_urlencoded::parse(raw.as_bytes())
                    .map(|(key, value)| (key.into_owned(), value.into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        self
    }

    /// Returns the request with `headers` attached.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Returns the request with `body` attached.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the encoded query string, or `None` when empty.
    #[must_use]
    pub fn query_string(&self) -> Option<String> {
        if self.query.is_empty() {
            return None;
        }
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.query {
            serializer.append_pair(key, value);
        }
        Some(serializer.finish())
    }

    /// Returns every value of `key` in order.
    pub fn query_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.query.iter().filter(move |(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    /// Returns the first value of `key`.
    #[must_use]
    pub fn query_value<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        self.query_values(key).next()
    }

    /// Replaces every `key` parameter with one `value`, keeping the position
    /// of the first occurrence.
    pub fn set_query(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.query.iter().position(|(name, _)| name == key) {
            Some(index) => {
                self.query[index].1 = value;
                let mut seen = 0_usize;
                self.query.retain(|(name, _)| {
                    if name != key {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.query.push((key.to_string(), value)),
        }
    }

    /// Returns a header as a string when it is valid visible ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Replaces the body with serialized `value`.
    pub fn set_json_body(&mut self, value: &Value) {
        self.body = Bytes::from(value.to_string());
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
}

// ============================================================================
// SECTION: Response
// ============================================================================

/// Response as seen by the pipeline.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Buffered, decoded body.
    pub body: Bytes,
}

impl ProxyResponse {
    /// Builds a response without headers.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Builds a JSON response.
    #[must_use]
    pub fn json(status: StatusCode, value: &Value) -> Self {
        let mut response = Self::new(status, value.to_string());
        response.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }

    /// Returns the lowercase media type without parameters.
    #[must_use]
    pub fn media_type(&self) -> Option<String> {
        media_type(&self.headers)
    }

    /// Returns true for JSON and GeoJSON bodies.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.media_type()
            .is_some_and(|media| media == "application/json" || media == "application/geo+json")
    }

    /// Parses the body as JSON.
    #[must_use]
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Replaces the body with serialized `value`, keeping the content type.
    pub fn set_json_body(&mut self, value: &Value) {
        self.body = Bytes::from(value.to_string());
    }
}

// ============================================================================
// SECTION: Client Info
// ============================================================================

/// Facts about the downstream connection used for forwarding headers.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    /// Peer socket address when known.
    pub peer: Option<SocketAddr>,
    /// Scheme the client used (`http` unless a proxy said otherwise).
    pub scheme: String,
    /// Host the client addressed.
    pub host: Option<String>,
}

impl ClientInfo {
    /// Builds client facts from the peer address and request headers.
    #[must_use]
    pub fn from_headers(peer: Option<SocketAddr>, headers: &HeaderMap) -> Self {
        let host = headers
            .get(axum::http::header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
            .filter(|proto| matches!(*proto, "http" | "https"))
            .unwrap_or("http")
            .to_string();
        Self {
            peer,
            scheme,
            host,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the lowercase media type of `headers` without parameters.
#[must_use]
pub fn media_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.split(';').next())
        .map(|media| media.trim().to_ascii_lowercase())
}
