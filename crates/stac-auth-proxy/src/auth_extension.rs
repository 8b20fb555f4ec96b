// crates/stac-auth-proxy/src/auth_extension.rs
// ============================================================================
// Module: Authentication Extension Augmenter
// Description: Declares the OIDC scheme on STAC documents and tags links.
// Purpose: Tell STAC clients which links need credentials.
// Dependencies: serde_json, url, crate::{access, paths}
// ============================================================================

//! ## Overview
//! Catalog, collection, item, and search documents gain the STAC
//! authentication extension: the schema URL in `stac_extensions`, an
//! `auth:schemes` entry (inside `properties` for items), and
//! `auth:refs: [<scheme>]` on every link whose target is a private `GET`
//! route. The augmenter is additive and idempotent.

use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use url::Url;

use crate::access::AccessRuleTable;
use crate::paths::links_mut;

/// Authentication extension schema URL.
pub const AUTH_EXTENSION_URL: &str =
    "https://stac-extensions.github.io/authentication/v1.1.0/schema.json";

/// Adds the authentication extension to STAC documents.
#[derive(Debug, Clone)]
pub struct AuthExtension {
    /// Scheme name used in `auth:schemes` and `auth:refs`.
    scheme_name: String,
    /// Externally reachable discovery URL.
    discovery_url: String,
    /// Access rules used to classify link targets.
    rules: Arc<AccessRuleTable>,
    /// Upstream path prefix removed before classifying link targets.
    upstream_prefix: String,
}

impl AuthExtension {
    /// Creates the augmenter.
    #[must_use]
    pub fn new(
        scheme_name: impl Into<String>,
        discovery_url: impl Into<String>,
        rules: Arc<AccessRuleTable>,
        upstream_prefix: impl Into<String>,
    ) -> Self {
        Self {
            scheme_name: scheme_name.into(),
            discovery_url: discovery_url.into(),
            rules,
            upstream_prefix: upstream_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Augments `document` in place.
    pub fn augment(&self, document: &mut Value) {
        let Value::Object(root) = document else {
            return;
        };
        let extensions = root.entry("stac_extensions").or_insert_with(|| json!([]));
        if let Value::Array(list) = extensions {
            if !list.iter().any(|entry| entry == AUTH_EXTENSION_URL) {
                list.push(Value::String(AUTH_EXTENSION_URL.to_string()));
            }
        }
        if let Some(Value::Object(properties)) = root.get_mut("properties") {
            self.declare_scheme(properties);
        } else {
            self.declare_scheme(root);
        }
        for link in links_mut(document) {
            let Some(href) = link.get("href").and_then(Value::as_str) else {
                continue;
            };
            if !self.targets_private(href) {
                continue;
            }
            let refs = link.entry("auth:refs").or_insert_with(|| json!([]));
            if let Value::Array(refs) = refs {
                if !refs.iter().any(|name| name == self.scheme_name.as_str()) {
                    refs.push(Value::String(self.scheme_name.clone()));
                }
            }
        }
    }

    /// Writes the scheme declaration into `home["auth:schemes"]`.
    fn declare_scheme(&self, home: &mut Map<String, Value>) {
        let schemes = home.entry("auth:schemes").or_insert_with(|| json!({}));
        if !schemes.is_object() {
            *schemes = json!({});
        }
        if let Value::Object(schemes) = schemes {
            schemes.insert(
                self.scheme_name.clone(),
                json!({
                    "type": "openIdConnect",
                    "openIdConnectUrl": self.discovery_url,
                }),
            );
        }
    }

    /// Returns true when `href` points at a private `GET` route.
    fn targets_private(&self, href: &str) -> bool {
        let path = match Url::parse(href) {
            Ok(url) => url.path().to_string(),
            Err(_) if href.starts_with('/') => {
                href.split(['?', '#']).next().unwrap_or_default().to_string()
            }
            Err(_) => return false,
        };
        let relative = match path.strip_prefix(&self.upstream_prefix) {
            Some(rest) if !self.upstream_prefix.is_empty() && rest.is_empty() => "/",
            Some(rest) if !self.upstream_prefix.is_empty() && rest.starts_with('/') => rest,
            _ => path.as_str(),
        };
        self.rules.classify(relative, "GET").is_private()
    }
}
