// crates/cql2-logic/tests/evaluation.rs
// ============================================================================
// Module: Predicate Evaluation Tests
// Description: Evaluation of predicates against STAC records.
// Purpose: Ensure property resolution and operator semantics fail closed.
// Dependencies: cql2_logic, serde_json
// ============================================================================
//! ## Overview
//! Evaluates predicates against sample items and collections, including
//! missing properties and operators without an in-process evaluator.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod support;

use cql2_logic::EvalError;
use cql2_logic::Expr;
use support::TestResult;
use support::ensure;
use support::sample_collection;
use support::sample_item;

/// Parses `filter` and evaluates it against the sample item.
fn item_matches(filter: &str) -> Result<bool, Box<dyn std::error::Error>> {
    Ok(Expr::parse_text(filter)?.matches(&sample_item())?)
}

#[test]
fn top_level_and_nested_properties_resolve() -> TestResult {
    ensure(item_matches("collection = 'landsat'")?, "top-level collection")?;
    ensure(item_matches("\"eo:cloud_cover\" < 10")?, "nested property")?;
    ensure(!item_matches("\"eo:cloud_cover\" > 10")?, "nested property negative")?;
    ensure(item_matches("properties.owner = 'Alice'")?, "dotted path")
}

#[test]
fn missing_properties_never_match_comparisons() -> TestResult {
    ensure(!item_matches("missing = 'x'")?, "equality on missing")?;
    ensure(!item_matches("missing <> 'x'")?, "inequality on missing")?;
    ensure(item_matches("missing IS NULL")?, "null test on missing")?;
    ensure(!item_matches("owner IS NULL")?, "null test on present")
}

#[test]
fn string_operators() -> TestResult {
    ensure(item_matches("owner LIKE 'Al%'")?, "prefix like")?;
    ensure(item_matches("owner LIKE 'Al_ce'")?, "single char wildcard")?;
    ensure(!item_matches("owner LIKE 'al%'")?, "like is case sensitive")?;
    ensure(item_matches("CASEI(owner) = 'alice'")?, "casei")?;
    ensure(item_matches("collection IN ('sentinel', 'landsat')")?, "in list")?;
    ensure(!item_matches("collection NOT IN ('sentinel', 'landsat')")?, "not in list")
}

#[test]
fn ranges_and_temporal_literals() -> TestResult {
    ensure(item_matches("\"eo:cloud_cover\" BETWEEN 0 AND 5")?, "inclusive between")?;
    ensure(!item_matches("\"eo:cloud_cover\" BETWEEN 6 AND 9")?, "outside between")?;
    ensure(
        item_matches("datetime > TIMESTAMP('2019-01-01T00:00:00Z')")?,
        "timestamp comparison",
    )
}

#[test]
fn array_relations() -> TestResult {
    ensure(item_matches("A_CONTAINS(tags, ('optical', 'public'))")?, "contains")?;
    ensure(item_matches("A_OVERLAPS(tags, ('radar', 'public'))")?, "overlaps")?;
    ensure(!item_matches("A_EQUALS(tags, ('radar', 'public'))")?, "equals")
}

#[test]
fn boolean_properties_and_literals() -> TestResult {
    ensure(item_matches("private = FALSE")?, "boolean equality")?;
    ensure(item_matches("NOT private")?, "boolean property")?;
    ensure(Expr::TRUE.matches(&sample_item())?, "TRUE matches")?;
    ensure(!Expr::FALSE.matches(&sample_item())?, "FALSE never matches")
}

#[test]
fn collections_evaluate_against_top_level_fields() -> TestResult {
    let expr = Expr::parse_text("id <> 'restricted-collection'")?;
    ensure(!expr.matches(&sample_collection())?, "restricted collection is hidden")?;
    let expr = Expr::parse_text("license = 'proprietary' OR id = 'other'")?;
    ensure(expr.matches(&sample_collection())?, "disjunction")
}

#[test]
fn unsupported_and_mismatched_operands_error() {
    let spatial = Expr::parse_text("S_INTERSECTS(geometry, POINT(1 2))").unwrap();
    assert!(matches!(spatial.matches(&sample_item()), Err(EvalError::Unsupported(_))));
    let mismatch = Expr::parse_text("owner < 5").unwrap();
    assert!(matches!(mismatch.matches(&sample_item()), Err(EvalError::TypeMismatch(_))));
}
