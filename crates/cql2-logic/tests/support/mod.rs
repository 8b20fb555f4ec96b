// crates/cql2-logic/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Shared result helpers and fixtures for CQL2 integration tests.
// ============================================================================
//! ## Overview
//! Shared test helpers for consistent Result-based assertions.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::error::Error;
use std::fmt;

use serde_json::Value;
use serde_json::json;

// ========================================================================
// Test Result Helpers
// ========================================================================

/// Standard result type used across CQL2 integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

/// Lightweight error type for test assertions.
#[derive(Debug)]
struct TestError {
    /// Human-readable failure message.
    message: String,
}

impl fmt::Display for TestError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl Error for TestError {}

/// Returns an error when a test condition fails.
///
/// # Errors
/// Returns a `TestError` when the condition is false.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition {
        Ok(())
    } else {
        Err(Box::new(TestError {
            message: message.into(),
        }))
    }
}

// ========================================================================
// Fixtures
// ========================================================================

/// Sample STAC item used by evaluation tests.
pub fn sample_item() -> Value {
    json!({
        "type": "Feature",
        "id": "scene-1",
        "collection": "landsat",
        "properties": {
            "eo:cloud_cover": 5,
            "owner": "Alice",
            "datetime": "2020-06-01T00:00:00Z",
            "tags": ["optical", "public"],
            "private": false
        }
    })
}

/// Sample STAC collection used by evaluation tests.
pub fn sample_collection() -> Value {
    json!({
        "type": "Collection",
        "id": "restricted-collection",
        "title": "Restricted",
        "license": "proprietary"
    })
}
