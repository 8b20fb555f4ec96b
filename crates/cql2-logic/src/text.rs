// crates/cql2-logic/src/text.rs
// ============================================================================
// Module: CQL2 Text Form
// Description: Lexer, recursive-descent parser, and serializer for cql2-text.
// Purpose: Read client filters from query strings and emit proxy predicates.
// Dependencies: serde_json, crate::expr, crate::error
// ============================================================================

//! ## Overview
//! The text form is the infix syntax carried in `filter` query parameters.
//! The serializer fully parenthesizes every comparison and logical group so a
//! parsed expression has exactly the tree that was serialized.
//! Security posture: filter text is client-controlled; size and depth limits
//! are enforced before any tree is built.
//!
//! ### Grammar (informal)
//! - Logical: `a AND b`, `a OR b`, `NOT a`
//! - Comparison: `=`, `<>`, `<`, `<=`, `>`, `>=`
//! - Predicates: `x [NOT] LIKE 'p%'`, `x [NOT] BETWEEN a AND b`,
//!   `x [NOT] IN (a, b)`, `x IS [NOT] NULL`
//! - Literals: `'text'`, numbers, `TRUE`/`FALSE`, `TIMESTAMP('...')`,
//!   `DATE('...')`, `INTERVAL(a, b)`, WKT geometries, `BBOX(...)`, arrays `(a, b)`
//! - Properties: bare identifiers or `"quoted identifiers"`
//! - Functions: `name(arg, ...)`

use serde_json::Map;
use serde_json::Number;
use serde_json::Value;

use crate::error::Cql2Error;
use crate::expr::Expr;
use crate::expr::MAX_EXPR_DEPTH;
use crate::expr::Op;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted text input size in bytes.
const MAX_TEXT_INPUT_BYTES: usize = 256 * 1024;

/// WKT geometry keywords mapped to their GeoJSON type names.
const WKT_TYPES: [(&str, &str); 7] = [
    ("POINT", "Point"),
    ("LINESTRING", "LineString"),
    ("POLYGON", "Polygon"),
    ("MULTIPOINT", "MultiPoint"),
    ("MULTILINESTRING", "MultiLineString"),
    ("MULTIPOLYGON", "MultiPolygon"),
    ("GEOMETRYCOLLECTION", "GeometryCollection"),
];

// ============================================================================
// SECTION: Public API
// ============================================================================

impl Expr {
    /// Parses a cql2-text expression.
    ///
    /// # Errors
    ///
    /// Returns [`Cql2Error`] for syntax errors, limit violations, or invalid
    /// operator arity.
    pub fn parse_text(input: &str) -> Result<Self, Cql2Error> {
        if input.len() > MAX_TEXT_INPUT_BYTES {
            return Err(Cql2Error::InputTooLarge {
                max_bytes: MAX_TEXT_INPUT_BYTES,
                actual_bytes: input.len(),
            });
        }
        let tokens = Lexer::new(input).lex()?;
        let mut parser = Parser::new(tokens);
        let expr = parser.parse_expression()?;
        parser.expect_eof()?;
        expr.validate()?;
        Ok(expr)
    }

    /// Serializes the expression to cql2-text.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        write_expr(&mut out, self);
        out
    }
}

// ============================================================================
// SECTION: Lexer
// ============================================================================

/// Lexer token produced from the text input.
#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    /// Bare word: keyword, function name, or property.
    Word(&'a str),
    /// Double-quoted identifier with escapes resolved.
    Quoted(String),
    /// Single-quoted string with escapes resolved.
    Str(String),
    /// Numeric literal.
    Number(&'a str),
    /// Comparison operator.
    Compare(Op),
    /// Left parenthesis.
    LParen,
    /// Right parenthesis.
    RParen,
    /// Comma separator.
    Comma,
    /// End-of-input marker.
    Eof,
}

/// Token paired with its byte offset.
#[derive(Debug, Clone)]
struct SpannedToken<'a> {
    /// Token value.
    token: Token<'a>,
    /// Byte offset into the input.
    position: usize,
}

/// Lexer for cql2-text.
struct Lexer<'a> {
    /// Source input being tokenized.
    input: &'a str,
    /// Current byte offset into the input.
    offset: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    const fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
        }
    }

    /// Lexes the input into a sequence of tokens.
    fn lex(mut self) -> Result<Vec<SpannedToken<'a>>, Cql2Error> {
        let mut tokens = Vec::new();
        let bytes = self.input.as_bytes();

        while let Some(&ch) = bytes.get(self.offset) {
            let start = self.offset;
            let token = match ch {
                b' ' | b'\t' | b'\n' | b'\r' => {
                    self.offset += 1;
                    continue;
                }
                b'(' => {
                    self.offset += 1;
                    Token::LParen
                }
                b')' => {
                    self.offset += 1;
                    Token::RParen
                }
                b',' => {
                    self.offset += 1;
                    Token::Comma
                }
                b'=' => {
                    self.offset += 1;
                    Token::Compare(Op::Eq)
                }
                b'<' => self.lex_less(bytes),
                b'>' => {
                    if bytes.get(self.offset + 1) == Some(&b'=') {
                        self.offset += 2;
                        Token::Compare(Op::Ge)
                    } else {
                        self.offset += 1;
                        Token::Compare(Op::Gt)
                    }
                }
                b'\'' => Token::Str(self.lex_quoted(b'\'')?),
                b'"' => Token::Quoted(self.lex_quoted(b'"')?),
                b'-' | b'0' ..= b'9' => Token::Number(self.lex_number(bytes)?),
                b'a' ..= b'z' | b'A' ..= b'Z' | b'_' => {
                    self.consume_while(bytes, |b| {
                        b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b':')
                    });
                    Token::Word(&self.input[start .. self.offset])
                }
                _ => {
                    let found = self.input[start ..].chars().next().unwrap_or('?').to_string();
                    return Err(Cql2Error::UnexpectedToken {
                        expected: "literal, identifier, or operator",
                        found,
                        position: start,
                    });
                }
            };
            tokens.push(SpannedToken {
                token,
                position: start,
            });
        }

        if tokens.is_empty() {
            return Err(Cql2Error::EmptyInput);
        }
        tokens.push(SpannedToken {
            token: Token::Eof,
            position: self.offset,
        });
        Ok(tokens)
    }

    /// Lexes `<`, `<=`, or `<>`.
    fn lex_less(&mut self, bytes: &[u8]) -> Token<'a> {
        match bytes.get(self.offset + 1) {
            Some(b'=') => {
                self.offset += 2;
                Token::Compare(Op::Le)
            }
            Some(b'>') => {
                self.offset += 2;
                Token::Compare(Op::Ne)
            }
            _ => {
                self.offset += 1;
                Token::Compare(Op::Lt)
            }
        }
    }

    /// Lexes a quoted literal where a doubled quote escapes itself.
    fn lex_quoted(&mut self, quote: u8) -> Result<String, Cql2Error> {
        let start = self.offset;
        self.offset += 1;
        let mut value = String::new();
        loop {
            let rest = &self.input[self.offset ..];
            let Some(end) = rest.find(char::from(quote)) else {
                return Err(Cql2Error::UnterminatedLiteral {
                    position: start,
                });
            };
            value.push_str(&rest[.. end]);
            self.offset += end + 1;
            if self.input.as_bytes().get(self.offset) == Some(&quote) {
                value.push(char::from(quote));
                self.offset += 1;
            } else {
                return Ok(value);
            }
        }
    }

    /// Lexes a signed decimal number with optional fraction and exponent.
    fn lex_number(&mut self, bytes: &[u8]) -> Result<&'a str, Cql2Error> {
        let start = self.offset;
        if bytes.get(self.offset) == Some(&b'-') {
            self.offset += 1;
        }
        self.consume_while(bytes, |b| b.is_ascii_digit());
        if bytes.get(self.offset) == Some(&b'.') {
            self.offset += 1;
            self.consume_while(bytes, |b| b.is_ascii_digit());
        }
        if matches!(bytes.get(self.offset), Some(b'e' | b'E')) {
            self.offset += 1;
            if matches!(bytes.get(self.offset), Some(b'+' | b'-')) {
                self.offset += 1;
            }
            self.consume_while(bytes, |b| b.is_ascii_digit());
        }
        let raw = &self.input[start .. self.offset];
        if raw == "-" {
            return Err(Cql2Error::InvalidNumber {
                raw: raw.to_string(),
                position: start,
            });
        }
        Ok(raw)
    }

    /// Advances while the condition matches the current byte.
    fn consume_while<F>(&mut self, bytes: &[u8], condition: F)
    where
        F: Fn(u8) -> bool,
    {
        while let Some(&b) = bytes.get(self.offset) {
            if condition(b) {
                self.offset += 1;
            } else {
                break;
            }
        }
    }
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Recursive-descent parser for cql2-text.
struct Parser<'a> {
    /// Token stream with source positions.
    tokens: Vec<SpannedToken<'a>>,
    /// Current token index.
    index: usize,
    /// Current nesting depth.
    nesting: usize,
}

impl<'a> Parser<'a> {
    /// Creates a parser over the token stream.
    const fn new(tokens: Vec<SpannedToken<'a>>) -> Self {
        Self {
            tokens,
            index: 0,
            nesting: 0,
        }
    }

    /// Parses a full boolean expression.
    fn parse_expression(&mut self) -> Result<Expr, Cql2Error> {
        self.parse_or()
    }

    /// Parses OR chains.
    fn parse_or(&mut self) -> Result<Expr, Cql2Error> {
        let mut parts = vec![self.parse_and()?];
        while self.matches_keyword("OR") {
            parts.push(self.parse_and()?);
        }
        Ok(if parts.len() == 1 { parts.remove(0) } else { Expr::op(Op::Or, parts) })
    }

    /// Parses AND chains.
    fn parse_and(&mut self) -> Result<Expr, Cql2Error> {
        let mut parts = vec![self.parse_not()?];
        while self.matches_keyword("AND") {
            parts.push(self.parse_not()?);
        }
        Ok(if parts.len() == 1 { parts.remove(0) } else { Expr::op(Op::And, parts) })
    }

    /// Parses prefix NOT.
    fn parse_not(&mut self) -> Result<Expr, Cql2Error> {
        if self.matches_keyword("NOT") {
            let inner = self.with_nesting(Self::parse_not)?;
            return Ok(Expr::negate(inner));
        }
        self.parse_predicate()
    }

    /// Parses a scalar optionally followed by a comparison or predicate suffix.
    fn parse_predicate(&mut self) -> Result<Expr, Cql2Error> {
        let left = self.parse_primary()?;

        if let Token::Compare(op) = &self.current().token {
            let op = op.clone();
            self.advance();
            let right = self.parse_primary()?;
            return Ok(Expr::compare(op, left, right));
        }

        if self.matches_keyword("IS") {
            let negated = self.matches_keyword("NOT");
            self.expect_keyword("NULL")?;
            let test = Expr::op(Op::IsNull, vec![left]);
            return Ok(if negated { Expr::negate(test) } else { test });
        }

        let negated = self.peek_keyword("NOT")
            && matches!(self.peek_word(1), Some(word) if is_suffix_keyword(word));
        if negated {
            self.advance();
        }
        let expr = if self.matches_keyword("LIKE") {
            let pattern = self.parse_primary()?;
            Expr::op(Op::Like, vec![left, pattern])
        } else if self.matches_keyword("BETWEEN") {
            let low = self.parse_primary()?;
            self.expect_keyword("AND")?;
            let high = self.parse_primary()?;
            Expr::op(Op::Between, vec![left, low, high])
        } else if self.matches_keyword("IN") {
            self.expect(&Token::LParen, "`(` after IN")?;
            let items = self.with_nesting(Self::parse_args_tail)?;
            Expr::op(Op::In, vec![left, Expr::Array(items)])
        } else {
            return Ok(left);
        };
        Ok(if negated { Expr::negate(expr) } else { expr })
    }

    /// Parses a literal, property, function call, or parenthesized group.
    fn parse_primary(&mut self) -> Result<Expr, Cql2Error> {
        let SpannedToken {
            token,
            position,
        } = self.current().clone();
        match token {
            Token::Str(value) => {
                self.advance();
                Ok(Expr::String(value))
            }
            Token::Number(raw) => {
                self.advance();
                parse_number(raw, position).map(Expr::Number)
            }
            Token::Quoted(name) => {
                self.advance();
                Ok(Expr::Property(name))
            }
            Token::Word(word) => {
                self.advance();
                self.parse_word(word, position)
            }
            Token::LParen => {
                self.advance();
                self.with_nesting(|parser| {
                    if parser.matches(&Token::RParen) {
                        return Ok(Expr::Array(Vec::new()));
                    }
                    let first = parser.parse_expression()?;
                    if parser.matches(&Token::Comma) {
                        let mut items = vec![first];
                        items.extend(parser.parse_list_tail()?);
                        return Ok(Expr::Array(items));
                    }
                    parser.expect(&Token::RParen, "`)`")?;
                    Ok(first)
                })
            }
            Token::Compare(_) | Token::RParen | Token::Comma | Token::Eof => {
                Err(Cql2Error::UnexpectedToken {
                    expected: "literal, property, or `(`",
                    found: self.describe_current(),
                    position,
                })
            }
        }
    }

    /// Resolves a bare word into a keyword literal, function call, or property.
    fn parse_word(&mut self, word: &'a str, position: usize) -> Result<Expr, Cql2Error> {
        let upper = word.to_ascii_uppercase();
        match upper.as_str() {
            "TRUE" => return Ok(Expr::TRUE),
            "FALSE" => return Ok(Expr::FALSE),
            _ => {}
        }
        if !self.matches(&Token::LParen) {
            if is_reserved(&upper) {
                return Err(Cql2Error::UnexpectedToken {
                    expected: "literal or property",
                    found: word.to_string(),
                    position,
                });
            }
            return Ok(Expr::Property(word.to_string()));
        }
        self.with_nesting(|parser| match upper.as_str() {
            "TIMESTAMP" => parser.parse_temporal_tail().map(Expr::Timestamp),
            "DATE" => parser.parse_temporal_tail().map(Expr::Date),
            "INTERVAL" => {
                let bounds = parser.parse_list_tail()?;
                if bounds.len() != 2 {
                    return Err(Cql2Error::InvalidArity {
                        op: "interval".to_string(),
                        found: bounds.len(),
                    });
                }
                Ok(Expr::Interval(bounds))
            }
            "BBOX" => {
                let values = parser.parse_list_tail()?;
                let numbers = values
                    .into_iter()
                    .map(|value| match value {
                        Expr::Number(number) => Ok(Value::Number(number)),
                        other => Err(Cql2Error::UnexpectedToken {
                            expected: "numeric bbox coordinate",
                            found: other.to_text(),
                            position,
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let mut bbox = Map::new();
                bbox.insert("bbox".to_string(), Value::Array(numbers));
                Ok(Expr::Geometry(Value::Object(bbox)))
            }
            _ => {
                if let Some(geometry_type) = wkt_type(&upper) {
                    return parser.parse_wkt_tail(geometry_type).map(Expr::Geometry);
                }
                let args = if is_array_function(&upper) {
                    parser.parse_array_args_tail()?
                } else {
                    parser.parse_args_tail()?
                };
                let op = Op::from_name(word);
                op.check_arity(args.len())?;
                Ok(Expr::op(op, args))
            }
        })
    }

    /// Parses `'literal')` after a temporal keyword.
    fn parse_temporal_tail(&mut self) -> Result<String, Cql2Error> {
        let SpannedToken {
            token,
            position,
        } = self.current().clone();
        let Token::Str(value) = token else {
            return Err(Cql2Error::UnexpectedToken {
                expected: "quoted temporal literal",
                found: self.describe_current(),
                position,
            });
        };
        self.advance();
        self.expect(&Token::RParen, "`)` after temporal literal")?;
        Ok(value)
    }

    /// Parses `a, b, ...)` after an opening parenthesis that is already consumed.
    fn parse_list_tail(&mut self) -> Result<Vec<Expr>, Cql2Error> {
        let mut items = Vec::new();
        loop {
            items.push(self.parse_expression()?);
            if self.matches(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RParen, "`,` or `)` in list")?;
            return Ok(items);
        }
    }

    /// Parses function arguments, allowing an empty list.
    fn parse_args_tail(&mut self) -> Result<Vec<Expr>, Cql2Error> {
        if self.matches(&Token::RParen) {
            return Ok(Vec::new());
        }
        self.parse_list_tail()
    }

    /// Parses array-function arguments, reading every parenthesized argument
    /// as an array literal so `('x')` and `()` keep their array shape.
    fn parse_array_args_tail(&mut self) -> Result<Vec<Expr>, Cql2Error> {
        if self.matches(&Token::RParen) {
            return Ok(Vec::new());
        }
        let mut args = Vec::new();
        loop {
            if self.matches(&Token::LParen) {
                let items = self.with_nesting(Self::parse_args_tail)?;
                args.push(Expr::Array(items));
            } else {
                args.push(self.parse_expression()?);
            }
            if self.matches(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RParen, "`,` or `)` in arguments")?;
            return Ok(args);
        }
    }

    /// Parses a WKT body after the geometry keyword and opening parenthesis.
    fn parse_wkt_tail(&mut self, geometry_type: &str) -> Result<Value, Cql2Error> {
        let mut geometry = Map::new();
        geometry.insert("type".to_string(), Value::String(geometry_type.to_string()));
        if geometry_type == "GeometryCollection" {
            let mut members = Vec::new();
            loop {
                let position = self.current().position;
                match self.parse_primary()? {
                    Expr::Geometry(member) => members.push(member),
                    other => {
                        return Err(Cql2Error::UnexpectedToken {
                            expected: "geometry in collection",
                            found: other.to_text(),
                            position,
                        });
                    }
                }
                if !self.matches(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RParen, "`)` after geometry collection")?;
            geometry.insert("geometries".to_string(), Value::Array(members));
            return Ok(Value::Object(geometry));
        }
        let items = self.parse_coordinate_items()?;
        let coordinates = match geometry_type {
            "Point" => items.into_iter().next().unwrap_or(Value::Null),
            "MultiPoint" => {
                Value::Array(items.into_iter().map(unwrap_single_position).collect())
            }
            _ => Value::Array(items),
        };
        geometry.insert("coordinates".to_string(), coordinates);
        Ok(Value::Object(geometry))
    }

    /// Parses comma-separated positions or nested coordinate lists up to `)`.
    fn parse_coordinate_items(&mut self) -> Result<Vec<Value>, Cql2Error> {
        let mut items = Vec::new();
        loop {
            if self.matches(&Token::LParen) {
                let nested = self.with_nesting(Self::parse_coordinate_items)?;
                items.push(Value::Array(nested));
            } else {
                items.push(self.parse_position()?);
            }
            if self.matches(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RParen, "`,` or `)` in coordinates")?;
            return Ok(items);
        }
    }

    /// Parses a whitespace-separated coordinate tuple.
    fn parse_position(&mut self) -> Result<Value, Cql2Error> {
        let mut position = Vec::new();
        while let Token::Number(raw) = self.current().token {
            let offset = self.current().position;
            position.push(Value::Number(parse_number(raw, offset)?));
            self.advance();
        }
        if position.is_empty() {
            return Err(Cql2Error::UnexpectedToken {
                expected: "coordinate",
                found: self.describe_current(),
                position: self.current().position,
            });
        }
        Ok(Value::Array(position))
    }

    /// Runs a parser step while enforcing the nesting limit.
    fn with_nesting<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, Cql2Error>,
    ) -> Result<T, Cql2Error> {
        let next_depth = self.nesting + 1;
        if next_depth > MAX_EXPR_DEPTH {
            return Err(Cql2Error::NestingTooDeep {
                max_depth: MAX_EXPR_DEPTH,
                actual_depth: next_depth,
            });
        }
        self.nesting = next_depth;
        let result = f(self);
        self.nesting = self.nesting.saturating_sub(1);
        result
    }

    /// Consumes the keyword if it is the current token.
    fn matches_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Returns true when the current token is the keyword.
    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.current().token, Token::Word(word) if word.eq_ignore_ascii_case(keyword))
    }

    /// Returns the bare word `distance` tokens ahead, if any.
    fn peek_word(&self, distance: usize) -> Option<&'a str> {
        match self.tokens.get(self.index + distance).map(|spanned| &spanned.token) {
            Some(Token::Word(word)) => Some(word),
            _ => None,
        }
    }

    /// Consumes the expected keyword or returns an error.
    fn expect_keyword(&mut self, keyword: &'static str) -> Result<(), Cql2Error> {
        if self.matches_keyword(keyword) {
            Ok(())
        } else {
            Err(Cql2Error::UnexpectedToken {
                expected: keyword,
                found: self.describe_current(),
                position: self.current().position,
            })
        }
    }

    /// Consumes the expected token or returns an error.
    fn expect(&mut self, token: &Token<'_>, expected: &'static str) -> Result<(), Cql2Error> {
        if self.matches(token) {
            Ok(())
        } else {
            Err(Cql2Error::UnexpectedToken {
                expected,
                found: self.describe_current(),
                position: self.current().position,
            })
        }
    }

    /// Ensures the parser is at end-of-input.
    fn expect_eof(&self) -> Result<(), Cql2Error> {
        if matches!(self.current().token, Token::Eof) {
            Ok(())
        } else {
            Err(Cql2Error::TrailingInput {
                position: self.current().position,
            })
        }
    }

    /// Consumes the token if it has the same kind as `kind`.
    fn matches(&mut self, kind: &Token<'_>) -> bool {
        if std::mem::discriminant(&self.current().token) == std::mem::discriminant(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Returns the current token.
    fn current(&self) -> &SpannedToken<'a> {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.index.min(last)]
    }

    /// Advances to the next token, stopping at end-of-input.
    const fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }

    /// Formats the current token for diagnostics.
    fn describe_current(&self) -> String {
        match &self.current().token {
            Token::Word(word) | Token::Number(word) => (*word).to_string(),
            Token::Quoted(name) => format!("\"{name}\""),
            Token::Str(value) => format!("'{value}'"),
            Token::Compare(op) => op.as_str().to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Comma => ",".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Parser Helpers
// ============================================================================

/// Parses a numeric literal into a JSON number.
fn parse_number(raw: &str, position: usize) -> Result<Number, Cql2Error> {
    raw.parse::<Number>().map_err(|_| Cql2Error::InvalidNumber {
        raw: raw.to_string(),
        position,
    })
}

/// Returns true for keywords that may follow a scalar after `NOT`.
fn is_suffix_keyword(word: &str) -> bool {
    ["LIKE", "BETWEEN", "IN"].iter().any(|keyword| word.eq_ignore_ascii_case(keyword))
}

/// Returns true for the array comparison functions, whose operands are arrays.
fn is_array_function(upper: &str) -> bool {
    matches!(upper, "A_EQUALS" | "A_CONTAINS" | "A_CONTAINEDBY" | "A_OVERLAPS")
}

/// Returns true for words that can never be bare property names.
fn is_reserved(upper: &str) -> bool {
    matches!(upper, "AND" | "OR" | "NOT" | "LIKE" | "BETWEEN" | "IN" | "IS" | "NULL")
}

/// Maps an uppercase WKT keyword to its GeoJSON type.
fn wkt_type(upper: &str) -> Option<&'static str> {
    WKT_TYPES.iter().find(|(keyword, _)| *keyword == upper).map(|(_, kind)| *kind)
}

/// Unwraps `[[x, y]]` to `[x, y]` for parenthesized multipoint members.
fn unwrap_single_position(item: Value) -> Value {
    match item {
        Value::Array(mut inner) if inner.len() == 1 && inner[0].is_array() => inner.remove(0),
        other => other,
    }
}

// ============================================================================
// SECTION: Serializer
// ============================================================================

/// Writes an expression in cql2-text form.
fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Bool(true) => out.push_str("TRUE"),
        Expr::Bool(false) => out.push_str("FALSE"),
        Expr::String(value) => write_quoted(out, value, '\''),
        Expr::Number(number) => out.push_str(&number.to_string()),
        Expr::Property(name) => write_property(out, name),
        Expr::Timestamp(value) => {
            out.push_str("TIMESTAMP(");
            write_quoted(out, value, '\'');
            out.push(')');
        }
        Expr::Date(value) => {
            out.push_str("DATE(");
            write_quoted(out, value, '\'');
            out.push(')');
        }
        Expr::Interval(bounds) => {
            out.push_str("INTERVAL");
            write_list(out, bounds);
        }
        Expr::Geometry(geometry) => write_geometry(out, geometry),
        Expr::Array(items) => write_list(out, items),
        Expr::Op {
            op,
            args,
        } => write_op(out, op, args),
    }
}

/// Writes an operator node.
fn write_op(out: &mut String, op: &Op, args: &[Expr]) {
    match (op, args) {
        (Op::And | Op::Or, _) if args.len() >= 2 => {
            let joiner = if matches!(op, Op::And) { " AND " } else { " OR " };
            out.push('(');
            for (index, arg) in args.iter().enumerate() {
                if index > 0 {
                    out.push_str(joiner);
                }
                write_expr(out, arg);
            }
            out.push(')');
        }
        (Op::Not, [inner]) => {
            out.push_str("NOT (");
            write_expr(out, inner);
            out.push(')');
        }
        (Op::IsNull, [inner]) => {
            out.push('(');
            write_expr(out, inner);
            out.push_str(" IS NULL)");
        }
        (Op::Between, [value, low, high]) => {
            out.push('(');
            write_expr(out, value);
            out.push_str(" BETWEEN ");
            write_expr(out, low);
            out.push_str(" AND ");
            write_expr(out, high);
            out.push(')');
        }
        (Op::In, [value, Expr::Array(items)]) => {
            out.push('(');
            write_expr(out, value);
            out.push_str(" IN ");
            write_list(out, items);
            out.push(')');
        }
        (Op::Like, [value, pattern]) => {
            out.push('(');
            write_expr(out, value);
            out.push_str(" LIKE ");
            write_expr(out, pattern);
            out.push(')');
        }
        (_, [left, right]) if op.is_comparison() => {
            out.push('(');
            write_expr(out, left);
            out.push(' ');
            out.push_str(op.as_str());
            out.push(' ');
            write_expr(out, right);
            out.push(')');
        }
        _ => {
            out.push_str(op.as_str());
            write_list(out, args);
        }
    }
}

/// Writes `(a, b, ...)`.
fn write_list(out: &mut String, items: &[Expr]) {
    out.push('(');
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        write_expr(out, item);
    }
    out.push(')');
}

/// Writes a quoted literal, doubling embedded quote characters.
fn write_quoted(out: &mut String, value: &str, quote: char) {
    out.push(quote);
    for ch in value.chars() {
        if ch == quote {
            out.push(quote);
        }
        out.push(ch);
    }
    out.push(quote);
}

/// Writes a property name, quoting it unless it is a plain identifier.
fn write_property(out: &mut String, name: &str) {
    let mut chars = name.chars();
    let plain = chars.next().is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    let upper = name.to_ascii_uppercase();
    let keyword = is_reserved(&upper)
        || matches!(upper.as_str(), "TRUE" | "FALSE")
        || wkt_type(&upper).is_some();
    if plain && !keyword {
        out.push_str(name);
    } else {
        write_quoted(out, name, '"');
    }
}

/// Writes a GeoJSON geometry (or bbox object) as WKT.
fn write_geometry(out: &mut String, geometry: &Value) {
    if let Some(Value::Array(bbox)) = geometry.get("bbox")
        && geometry.get("type").is_none()
    {
        out.push_str("BBOX(");
        write_numbers(out, bbox, ", ");
        out.push(')');
        return;
    }
    let kind = geometry.get("type").and_then(Value::as_str).unwrap_or_default();
    let keyword = WKT_TYPES.iter().find(|(_, name)| *name == kind).map_or("GEOMETRY", |(k, _)| *k);
    out.push_str(keyword);
    if kind == "GeometryCollection" {
        out.push('(');
        let members = geometry.get("geometries").and_then(Value::as_array);
        for (index, member) in members.into_iter().flatten().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            write_geometry(out, member);
        }
        out.push(')');
        return;
    }
    let coordinates = geometry.get("coordinates").unwrap_or(&Value::Null);
    match kind {
        "Point" => {
            out.push('(');
            write_coordinates(out, coordinates);
            out.push(')');
        }
        "MultiPoint" => {
            out.push('(');
            for (index, point) in coordinates.as_array().into_iter().flatten().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                out.push('(');
                write_coordinates(out, point);
                out.push(')');
            }
            out.push(')');
        }
        _ => write_coordinates(out, coordinates),
    }
}

/// Writes nested coordinate arrays; innermost arrays are space-separated tuples.
fn write_coordinates(out: &mut String, coordinates: &Value) {
    let Some(items) = coordinates.as_array() else {
        return;
    };
    if items.iter().all(Value::is_number) {
        write_numbers(out, items, " ");
        return;
    }
    out.push('(');
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        write_coordinates(out, item);
    }
    out.push(')');
}

/// Writes numeric values joined by `separator`.
fn write_numbers(out: &mut String, numbers: &[Value], separator: &str) {
    for (index, number) in numbers.iter().enumerate() {
        if index > 0 {
            out.push_str(separator);
        }
        out.push_str(&number.to_string());
    }
}
