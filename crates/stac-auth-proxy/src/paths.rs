// crates/stac-auth-proxy/src/paths.rs
// ============================================================================
// Module: Path Rewriter
// Description: Root-prefix stripping on ingress and link rewriting on egress.
// Purpose: Let the proxy live under a different prefix than the upstream.
// Dependencies: serde_json, url, crate::error
// ============================================================================

//! ## Overview
//! Ingress strips the external root prefix (segment-aligned) and rejects
//! paths outside it with `root_path_mismatch`. Egress rewrites absolute
//! `href`s in `links`, `features[].links`, and `collections[].links` whose
//! authority is the client-facing host or the upstream itself: the upstream
//! path prefix is removed and the root prefix added. Links to other hosts
//! are left untouched.

use serde_json::Value;
use url::Position;
use url::Url;

use crate::error::ProxyError;
use crate::error::ReasonCode;
use crate::exchange::ClientInfo;

// ============================================================================
// SECTION: Rewriter
// ============================================================================

/// Prefix translation between the proxy and the upstream.
#[derive(Debug, Clone)]
pub struct PathRewriter {
    /// External root prefix (empty or `/`-leading without trailing `/`).
    root_path: String,
    /// Upstream `host[:port]`.
    upstream_authority: String,
    /// Upstream path prefix without trailing `/` (empty at the root).
    upstream_prefix: String,
}

impl PathRewriter {
    /// Builds the rewriter.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] when `upstream_url` is not absolute.
    pub fn new(root_path: &str, upstream_url: &str) -> Result<Self, url::ParseError> {
        let upstream = Url::parse(upstream_url)?;
        Ok(Self {
            root_path: root_path.trim_end_matches('/').to_string(),
            upstream_authority: upstream[Position::BeforeHost..Position::AfterPort].to_string(),
            upstream_prefix: upstream.path().trim_end_matches('/').to_string(),
        })
    }

    /// Returns the external root prefix.
    #[must_use]
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// Strips the root prefix from an inbound `path`.
    ///
    /// # Errors
    ///
    /// Returns `root_path_mismatch` when `path` is outside the prefix.
    pub fn strip(&self, path: &str) -> Result<String, ProxyError> {
        strip_prefix(path, &self.root_path).ok_or_else(|| {
            ProxyError::new(ReasonCode::RootPathMismatch, format!("path `{path}` not found"))
        })
    }

    /// Rewrites proxy-bound links in a STAC document. Returns true when any
    /// link changed.
    pub fn rewrite_links(&self, document: &mut Value, client: &ClientInfo) -> bool {
        let mut changed = false;
        for link in links_mut(document) {
            let Some(href) = link.get("href").and_then(Value::as_str) else {
                continue;
            };
            if let Some(rewritten) = self.rewrite_href(href, client) {
                link.insert("href".to_string(), Value::String(rewritten));
                changed = true;
            }
        }
        changed
    }

    /// Rewrites one `href`, or returns `None` to leave it untouched.
    ///
    /// Links that name the upstream directly are re-pointed at the host and
    /// scheme the client used.
    #[must_use]
    pub fn rewrite_href(&self, href: &str, client: &ClientInfo) -> Option<String> {
        let url = Url::parse(href).ok()?;
        let authority = &url[Position::BeforeHost..Position::AfterPort];
        let request_host = client.host.as_deref();
        let for_proxy = request_host == Some(authority);
        if !for_proxy && authority != self.upstream_authority {
            return None;
        }
        let relative = strip_prefix(url.path(), &self.upstream_prefix)
            .unwrap_or_else(|| url.path().to_string());
        let already_rooted = strip_prefix(&relative, &self.root_path).is_some();
        let path = if self.root_path.is_empty() || already_rooted {
            relative
        } else {
            format!("{}{relative}", self.root_path)
        };
        let (scheme, host) = match request_host {
            Some(host) if !for_proxy => (client.scheme.as_str(), host),
            _ => (url.scheme(), authority),
        };
        let mut out = format!("{scheme}://{host}{path}");
        if let Some(query) = url.query() {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = url.fragment() {
            out.push('#');
            out.push_str(fragment);
        }
        (out != href).then_some(out)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Removes `prefix` from `path` at a segment boundary; `prefix` itself maps
/// to `/`.
fn strip_prefix(path: &str, prefix: &str) -> Option<String> {
    if prefix.is_empty() {
        return Some(path.to_string());
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        return Some("/".to_string());
    }
    rest.starts_with('/').then(|| rest.to_string())
}

/// Collects link objects from a STAC document.
pub fn links_mut(document: &mut Value) -> Vec<&mut serde_json::Map<String, Value>> {
    let Value::Object(root) = document else {
        return Vec::new();
    };
    let mut links = Vec::new();
    for (key, value) in root.iter_mut() {
        match (key.as_str(), value) {
            ("links", Value::Array(items)) => {
                links.extend(items.iter_mut().filter_map(Value::as_object_mut));
            }
            ("features" | "collections", Value::Array(children)) => {
                for child in children {
                    if let Some(Value::Array(items)) = child.get_mut("links") {
                        links.extend(items.iter_mut().filter_map(Value::as_object_mut));
                    }
                }
            }
            _ => {}
        }
    }
    links
}

#[cfg(test)]
mod tests;
