// crates/stac-auth-proxy-filters/src/lib.rs
// ============================================================================
// Module: STAC Auth Proxy Filters
// Description: Filter generator capability and built-in generators.
// Purpose: Produce row-level CQL2 predicates from request context.
// Dependencies: crate::{cache, generator, opa, registry, template}
// ============================================================================

//! ## Overview
//! This crate defines [`FilterGenerator`], the [`FilterContext`] it receives,
//! the built-in `template` and `opa` generators, and the [`FilterRegistry`]
//! that builds generators from configuration.
//! Security posture: generator output is parsed and validated before the
//! pipeline applies it.

pub mod cache;
pub mod generator;
pub mod opa;
pub mod registry;
pub mod template;

pub use cache::TtlCache;
pub use cache::fingerprint;
pub use generator::FilterContext;
pub use generator::FilterError;
pub use generator::FilterGenerator;
pub use generator::RequestInfo;
pub use generator::generate_with_timeout;
pub use generator::parse_generated;
pub use opa::OpaConfig;
pub use opa::OpaGenerator;
pub use registry::FilterRegistry;
pub use registry::GeneratorFactory;
pub use registry::SharedGenerator;
pub use template::TemplateGenerator;
