// crates/stac-auth-proxy/src/openapi.rs
// ============================================================================
// Module: Spec Augmenter
// Description: Advertises the enforced security scheme in the OpenAPI spec.
// Purpose: Keep generated API documentation consistent with access rules.
// Dependencies: serde_json, tracing, crate::access
// ============================================================================

//! ## Overview
//! When a spec endpoint is configured, its JSON response gains a security
//! scheme under `components.securitySchemes` and every operation whose path
//! and method classify as private gets `{<scheme>: [scopes]}` appended to
//! `security`. Public operations are left undecorated. When a root path is
//! set, `servers` is replaced with `[{"url": <root>}]`. Other security
//! schemes are kept; a same-named upstream scheme is replaced and logged.

use std::sync::Arc;

use serde_json::Value;
use serde_json::json;
use tracing::debug;

use crate::access::AccessRuleTable;
use crate::exchange::ProxyResponse;

/// Operation keys of an OpenAPI path item.
const OPERATION_KEYS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// OpenAPI response augmenter.
#[derive(Debug, Clone)]
pub struct SpecAugmenter {
    /// Path of the spec endpoint, relative to the root prefix.
    spec_endpoint: String,
    /// Security scheme name.
    scheme_name: String,
    /// Security scheme body.
    scheme: Value,
    /// External root prefix (empty for none).
    root_path: String,
    /// Access rules deciding which operations are private.
    rules: Arc<AccessRuleTable>,
}

impl SpecAugmenter {
    /// Creates the augmenter. `scheme_override` replaces the default
    /// `openIdConnect` scheme body.
    #[must_use]
    pub fn new(
        spec_endpoint: impl Into<String>,
        scheme_name: impl Into<String>,
        discovery_url: &str,
        scheme_override: Option<Value>,
        root_path: impl Into<String>,
        rules: Arc<AccessRuleTable>,
    ) -> Self {
        let scheme = scheme_override.unwrap_or_else(|| {
            json!({
                "type": "openIdConnect",
                "openIdConnectUrl": discovery_url,
            })
        });
        Self {
            spec_endpoint: spec_endpoint.into(),
            scheme_name: scheme_name.into(),
            scheme,
            root_path: root_path.into(),
            rules,
        }
    }

    /// Returns true when `response` to `path` is the spec document.
    #[must_use]
    pub fn applies(&self, path: &str, response: &ProxyResponse) -> bool {
        path == self.spec_endpoint
            && response.status.is_success()
            && response.media_type().is_some_and(|media| {
                media == "application/json" || media == "application/vnd.oai.openapi+json"
            })
    }

    /// Augments the spec document in place.
    pub fn augment(&self, spec: &mut Value) {
        let Value::Object(root) = spec else {
            return;
        };
        if !self.root_path.is_empty() {
            root.insert("servers".to_string(), json!([{ "url": self.root_path }]));
        }
        let components = root.entry("components").or_insert_with(|| json!({}));
        if let Some(components) = components.as_object_mut() {
            let schemes = components.entry("securitySchemes").or_insert_with(|| json!({}));
            if let Some(schemes) = schemes.as_object_mut() {
                let previous = schemes.insert(self.scheme_name.clone(), self.scheme.clone());
                if previous.is_some_and(|previous| previous != self.scheme) {
                    debug!(
                        scheme = %self.scheme_name,
                        "replaced upstream security scheme of the same name"
                    );
                }
            }
        }
        let Some(Value::Object(paths)) = root.get_mut("paths") else {
            return;
        };
        for (path, item) in paths.iter_mut() {
            let Some(item) = item.as_object_mut() else {
                continue;
            };
            for (method, operation) in item.iter_mut() {
                if !OPERATION_KEYS.contains(&method.as_str()) {
                    continue;
                }
                let classification = self.rules.classify(path, method);
                if !classification.is_private() {
                    continue;
                }
                let Some(operation) = operation.as_object_mut() else {
                    continue;
                };
                let requirement = json!({ self.scheme_name.clone(): classification.required_scopes() });
                let security = operation.entry("security").or_insert_with(|| json!([]));
                if let Value::Array(security) = security {
                    if !security.contains(&requirement) {
                        security.push(requirement);
                    }
                }
            }
        }
    }
}
