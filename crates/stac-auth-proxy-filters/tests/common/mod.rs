// crates/stac-auth-proxy-filters/tests/common/mod.rs
// ============================================================================
// Module: Filter Test Support
// Description: Shared context and binding builders for generator tests.
// Purpose: Keep generator tests focused on behavior.
// ============================================================================

#![allow(dead_code, reason = "Helpers are shared across test binaries.")]

use std::error::Error;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use stac_auth_proxy_config::FilterBinding;
use stac_auth_proxy_filters::FilterContext;

/// Result alias for tests.
pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

/// Fails with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition {
        Ok(())
    } else {
        let message: String = message.into();
        Err(message.into())
    }
}

/// Context for an anonymous item search.
pub fn anonymous_search() -> FilterContext {
    let mut ctx = FilterContext::default();
    ctx.req.path = "/search".to_string();
    ctx.req.method = "GET".to_string();
    ctx
}

/// Context for an authenticated user with the given subject and token.
pub fn authenticated(sub: &str, token: &str) -> FilterContext {
    let mut ctx = anonymous_search();
    ctx.authenticated = true;
    ctx.payload = Some(json!({ "sub": sub, "scope": "stac:read" }));
    ctx.scopes = vec!["stac:read".to_string()];
    ctx.req.headers.insert("authorization".to_string(), format!("Bearer {token}"));
    ctx
}

/// Builds a binding from positional args and keyword args.
pub fn binding(generator: &str, args: Vec<Value>, kwargs: Value) -> FilterBinding {
    let kwargs = match kwargs {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    FilterBinding {
        generator: generator.to_string(),
        args,
        kwargs,
    }
}
