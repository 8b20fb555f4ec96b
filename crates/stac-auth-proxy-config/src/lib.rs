// crates/stac-auth-proxy-config/src/lib.rs
// ============================================================================
// Module: STAC Auth Proxy Config
// Description: Canonical proxy configuration model and loaders.
// Purpose: Single source of truth for proxy settings and their validation.
// Dependencies: crate::{config, env}
// ============================================================================

//! ## Overview
//! [`ProxyConfig`] is loaded from TOML (explicit path or
//! `STAC_AUTH_PROXY_CONFIG`) or from environment keys, then validated. All
//! failures are [`ConfigError`] values; the proxy refuses to start on any of
//! them.

pub mod config;
pub mod env;

pub use config::*;
pub use env::ENV_KEYS;
