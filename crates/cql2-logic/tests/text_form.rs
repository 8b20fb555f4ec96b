// crates/cql2-logic/tests/text_form.rs
// ============================================================================
// Module: CQL2 Text Form Tests
// Description: Parser and serializer coverage for cql2-text.
// Purpose: Ensure precedence, literals, and diagnostics behave predictably.
// Dependencies: cql2_logic
// ============================================================================
//! ## Overview
//! Exercises the text parser against client-style filters and checks the
//! canonical, fully parenthesized serializer output.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod support;

use cql2_logic::Cql2Error;
use cql2_logic::Expr;
use cql2_logic::Op;
use support::TestResult;
use support::ensure;

/// Parses then serializes a filter.
fn canonical(input: &str) -> Result<String, Cql2Error> {
    Expr::parse_text(input).map(|expr| expr.to_text())
}

#[test]
fn comparison_is_parenthesized() -> TestResult {
    ensure(canonical("collection = 'landsat'")? == "(collection = 'landsat')", "comparison")?;
    ensure(canonical("cloud <> 3")? == "(cloud <> 3)", "not equal")?;
    ensure(canonical("cloud>=-1.5")? == "(cloud >= -1.5)", "negative float")
}

#[test]
fn and_binds_tighter_than_or() -> TestResult {
    let text = canonical("a = 1 OR b = 2 AND c = 3")?;
    ensure(text == "((a = 1) OR ((b = 2) AND (c = 3)))", format!("precedence: {text}"))
}

#[test]
fn keywords_are_case_insensitive() -> TestResult {
    let upper = Expr::parse_text("a = 1 AND NOT b = 2")?;
    let lower = Expr::parse_text("a = 1 and not b = 2")?;
    ensure(upper == lower, "keyword case must not matter")
}

#[test]
fn between_consumes_its_own_and() -> TestResult {
    let text = canonical("cloud BETWEEN 0 AND 10 AND collection = 'a'")?;
    ensure(
        text == "((cloud BETWEEN 0 AND 10) AND (collection = 'a'))",
        format!("between: {text}"),
    )
}

#[test]
fn negated_suffix_predicates() -> TestResult {
    let like = Expr::parse_text("owner NOT LIKE 'bo%'")?;
    ensure(
        like == Expr::negate(Expr::op(Op::Like, vec![Expr::property("owner"), Expr::string("bo%")])),
        "NOT LIKE builds a negated like",
    )?;
    let null = Expr::parse_text("datetime IS NOT NULL")?;
    ensure(
        null == Expr::negate(Expr::op(Op::IsNull, vec![Expr::property("datetime")])),
        "IS NOT NULL builds a negated null test",
    )?;
    ensure(
        canonical("datetime IS NULL")? == "(datetime IS NULL)",
        "IS NULL serializes as a suffix",
    )
}

#[test]
fn in_list_round_trips() -> TestResult {
    ensure(
        canonical("collection IN ('a', 'b')")? == "(collection IN ('a', 'b'))",
        "IN list",
    )?;
    let single = Expr::parse_text("collection IN ('a')")?;
    ensure(
        single
            == Expr::op(
                Op::In,
                vec![Expr::property("collection"), Expr::Array(vec![Expr::string("a")])],
            ),
        "single-element IN list stays a list",
    )
}

#[test]
fn short_arrays_keep_their_shape() -> TestResult {
    let empty_in = Expr::op(Op::In, vec![Expr::property("collection"), Expr::Array(Vec::new())]);
    ensure(empty_in.to_text() == "(collection IN ())", "empty IN list text")?;
    ensure(Expr::parse_text(&empty_in.to_text())? == empty_in, "empty IN list parses back")?;

    let contains = Expr::op(
        Op::Function("a_contains".to_string()),
        vec![Expr::property("tags"), Expr::Array(vec![Expr::string("optical")])],
    );
    ensure(Expr::parse_text(&contains.to_text())? == contains, "one-element array argument")?;

    let overlaps = Expr::op(
        Op::Function("a_overlaps".to_string()),
        vec![Expr::property("tags"), Expr::Array(Vec::new())],
    );
    ensure(Expr::parse_text(&overlaps.to_text())? == overlaps, "empty array argument")?;
    ensure(Expr::parse_text("()")? == Expr::Array(Vec::new()), "bare empty list")
}

#[test]
fn quoting_is_preserved() -> TestResult {
    ensure(
        canonical("\"eo:cloud_cover\" <= 20")? == "(\"eo:cloud_cover\" <= 20)",
        "quoted identifier",
    )?;
    ensure(canonical("eo:cloud_cover <= 20")? == "(\"eo:cloud_cover\" <= 20)", "bare colon")?;
    ensure(canonical("owner = 'O''Brien'")? == "(owner = 'O''Brien')", "escaped quote")?;
    let expr = Expr::parse_text("owner = 'O''Brien'")?;
    ensure(
        expr == Expr::compare(Op::Eq, Expr::property("owner"), Expr::string("O'Brien")),
        "escape resolves to one quote",
    )
}

#[test]
fn temporal_literals() -> TestResult {
    ensure(
        canonical("datetime > timestamp('2020-01-01T00:00:00Z')")?
            == "(datetime > TIMESTAMP('2020-01-01T00:00:00Z'))",
        "timestamp",
    )?;
    ensure(
        canonical("T_INTERSECTS(datetime, INTERVAL('2020-01-01', '..'))")?
            == "t_intersects(datetime, INTERVAL('2020-01-01', '..'))",
        "interval inside a function",
    )
}

#[test]
fn wkt_geometries_become_geojson() -> TestResult {
    let expr = Expr::parse_text("S_INTERSECTS(geometry, POINT(1 2))")?;
    ensure(
        expr.to_json()
            == serde_json::json!({
                "op": "s_intersects",
                "args": [{"property": "geometry"}, {"type": "Point", "coordinates": [1, 2]}]
            }),
        "point converts to GeoJSON",
    )?;
    ensure(
        canonical("s_within(geometry, POLYGON((0 0, 1 0, 1 1, 0 0)))")?
            == "s_within(geometry, POLYGON((0 0, 1 0, 1 1, 0 0)))",
        "polygon round trips",
    )?;
    ensure(
        canonical("s_intersects(geometry, MULTIPOINT((1 2), (3 4)))")?
            == "s_intersects(geometry, MULTIPOINT((1 2), (3 4)))",
        "multipoint round trips",
    )?;
    ensure(
        canonical("s_intersects(geometry, BBOX(-10, -5, 10, 5))")?
            == "s_intersects(geometry, BBOX(-10, -5, 10, 5))",
        "bbox round trips",
    )
}

#[test]
fn boolean_literals() -> TestResult {
    ensure(Expr::parse_text("TRUE")? == Expr::TRUE, "TRUE")?;
    ensure(Expr::parse_text("false")? == Expr::FALSE, "FALSE")?;
    ensure(canonical("private = false")? == "(private = FALSE)", "boolean comparison")
}

#[test]
fn diagnostics_carry_positions() {
    assert_eq!(Expr::parse_text("   "), Err(Cql2Error::EmptyInput));
    assert!(matches!(
        Expr::parse_text("collection ="),
        Err(Cql2Error::UnexpectedToken { position: 12, .. })
    ));
    assert!(matches!(
        Expr::parse_text("owner = 'open"),
        Err(Cql2Error::UnterminatedLiteral { position: 8 })
    ));
    assert!(matches!(
        Expr::parse_text("a = 1 b"),
        Err(Cql2Error::TrailingInput { position: 6 })
    ));
    assert!(matches!(Expr::parse_text("a = 1 ; b"), Err(Cql2Error::UnexpectedToken { .. })));
}

#[test]
fn nesting_limit_is_enforced() {
    let deep = format!("{}a = 1{}", "(".repeat(100), ")".repeat(100));
    assert!(matches!(Expr::parse_text(&deep), Err(Cql2Error::NestingTooDeep { .. })));
}

#[test]
fn reserved_words_are_not_properties() {
    assert!(Expr::parse_text("and = 1").is_err());
    assert!(Expr::parse_text("\"and\" = 1").is_ok());
}
