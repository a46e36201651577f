//! Parser for the query-string grammar.
//!
//! Grammar (in rough EBNF):
//!
//! criteria   = criterion ("&" criterion)*
//! criterion  = property "=" expression
//! property   = ident ("." ident)*
//! expression = and_expr ("|" and_expr)*
//! and_expr   = unary ("," unary)*
//! unary      = "!" unary | primary
//! primary    = "(" expression ")" | interval | term
//! interval   = "[" bound WS+ "TO" WS+ bound "]"
//! bound      = "*" | constant | date | time | datetime
//! term       = (text | "*" | class | quoted)+
//! class      = "[" (char | char "-" char)+ "]"
//!
//! Every rule is a function from a token position to `(node, next position)`.
//! Nothing is mutated while parsing, so alternation backtracks by simply
//! retrying from the same position.

use std::cmp::Ordering;

use super::ast::{Boundary, Criteria, Criterion, Expression, PropertyPath};
use super::lexer::{Token, TokenKind, check_lexical, tokenize};
use super::literals::{parse_date, parse_date_time, parse_time};
use crate::error::{QueryError, Result};

/// Why a rule did not match at `pos`.
#[derive(Debug, Clone)]
struct Failure {
    pos: usize,
    expected: Vec<String>,
    found: Option<String>,
    /// Committed failures stop alternation instead of trying the next rule.
    cut: bool,
}

impl Failure {
    /// Keep the failure that got furthest; merge expectations on a tie.
    fn merge(self, other: Failure) -> Failure {
        match self.pos.cmp(&other.pos) {
            Ordering::Greater => self,
            Ordering::Less => other,
            Ordering::Equal => {
                let mut expected = self.expected;
                for label in other.expected {
                    if !expected.contains(&label) {
                        expected.push(label);
                    }
                }
                Failure { expected, ..self }
            }
        }
    }
}

type Step<T> = std::result::Result<(T, usize), Failure>;
type Rule<'t, T> = fn(&Parser<'t>, usize) -> Step<T>;

/// A run of text inside a term; classes are expanded after the term's
/// wildcard layout is known.
#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Class(Vec<char>),
}

#[derive(Debug)]
enum Piece {
    Star,
    Text(Vec<Segment>),
}

/// Parser state: only the token slice, never a cursor.
struct Parser<'t> {
    tokens: &'t [Token],
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Parser { tokens }
    }

    fn peek(&self, pos: usize) -> Option<&'t Token> {
        self.tokens.get(pos)
    }

    fn at(&self, pos: usize, kind: TokenKind) -> bool {
        self.peek(pos).is_some_and(|t| t.is(kind))
    }

    fn fail(&self, pos: usize, expected: &str) -> Failure {
        Failure {
            pos,
            expected: vec![expected.to_string()],
            found: None,
            cut: false,
        }
    }

    fn cut(&self, pos: usize, expected: &str, found: String) -> Failure {
        Failure {
            pos,
            expected: vec![expected.to_string()],
            found: Some(found),
            cut: true,
        }
    }

    fn expect(&self, pos: usize, kind: TokenKind, label: &str) -> Step<&'t Token> {
        match self.peek(pos) {
            Some(token) if token.is(kind) => Ok((token, pos + 1)),
            _ => Err(self.fail(pos, label)),
        }
    }

    /// Try each rule from `pos`; the first success wins.
    fn alt<T>(&self, pos: usize, rules: &[Rule<'t, T>]) -> Step<T> {
        let mut furthest: Option<Failure> = None;
        for rule in rules {
            match rule(self, pos) {
                Ok(done) => return Ok(done),
                Err(failure) if failure.cut => return Err(failure),
                Err(failure) => {
                    furthest = Some(match furthest {
                        Some(previous) => previous.merge(failure),
                        None => failure,
                    });
                }
            }
        }
        Err(furthest.unwrap_or_else(|| self.fail(pos, "expression")))
    }

    /// Run `rule` from the first token and require it to consume everything.
    fn complete<T>(&self, rule: Rule<'t, T>, trailing: &str) -> Result<T> {
        let (value, pos) = rule(self, 0).map_err(|f| self.to_error(f))?;
        if pos < self.tokens.len() {
            return Err(self.to_error(self.fail(pos, trailing)));
        }
        Ok(value)
    }

    fn end_position(&self) -> (usize, usize) {
        match self.tokens.last() {
            Some(last) if last.text == "\n" => (last.line + 1, 1),
            Some(last) => (last.line, last.column + last.text.chars().count()),
            None => (1, 1),
        }
    }

    fn to_error(&self, failure: Failure) -> QueryError {
        let token = self.peek(failure.pos);
        let (line, column) = match token {
            Some(t) => (t.line, t.column),
            None => self.end_position(),
        };
        let found = failure.found.unwrap_or_else(|| match token {
            Some(t) => format!("'{}'", t.text),
            None => "end of input".to_string(),
        });
        QueryError::Syntax {
            line,
            column,
            expected: failure.expected.join(" or "),
            found,
        }
    }

    fn criteria(&self, start: usize) -> Step<Criteria> {
        let (first, mut pos) = self.criterion(start)?;
        let mut criteria = vec![first];
        while self.at(pos, TokenKind::Ampersand) {
            let (next, after) = self.criterion(pos + 1)?;
            criteria.push(next);
            pos = after;
        }
        Ok((criteria, pos))
    }

    fn criterion(&self, start: usize) -> Step<Criterion> {
        let (property, pos) = self.property(start)?;
        let (_, pos) = self.expect(pos, TokenKind::Equal, "'='")?;
        let (expression, pos) = self.expression(pos)?;
        Ok((
            Criterion {
                property,
                expression,
            },
            pos,
        ))
    }

    fn property(&self, start: usize) -> Step<PropertyPath> {
        let (first, mut pos) = self.identifier(start)?;
        let mut segments = vec![first];
        while self.at(pos, TokenKind::Dot) {
            let (segment, after) = self.identifier(pos + 1)?;
            segments.push(segment);
            pos = after;
        }
        Ok((PropertyPath(segments), pos))
    }

    fn identifier(&self, start: usize) -> Step<String> {
        match self.peek(start) {
            Some(t) if t.is(TokenKind::Letter) || t.is(TokenKind::Underscore) => {}
            _ => return Err(self.fail(start, "property name")),
        }
        let mut pos = start;
        let mut name = String::new();
        while let Some(token) = self.peek(pos) {
            match token.kind {
                TokenKind::Letter | TokenKind::Digit | TokenKind::Underscore => {
                    name.push_str(&token.text);
                    pos += 1;
                }
                _ => break,
            }
        }
        Ok((name, pos))
    }

    fn expression(&self, start: usize) -> Step<Expression> {
        let (mut left, mut pos) = self.and_expr(start)?;
        while self.at(pos, TokenKind::Or) {
            let (right, after) = self.and_expr(pos + 1)?;
            left = Expression::or(left, right);
            pos = after;
        }
        Ok((left, pos))
    }

    fn and_expr(&self, start: usize) -> Step<Expression> {
        let (mut left, mut pos) = self.unary(start)?;
        while self.at(pos, TokenKind::And) {
            let (right, after) = self.unary(pos + 1)?;
            left = Expression::and(left, right);
            pos = after;
        }
        Ok((left, pos))
    }

    fn unary(&self, start: usize) -> Step<Expression> {
        if self.at(start, TokenKind::Bang) {
            let (inner, pos) = self.unary(start + 1)?;
            return Ok((Expression::not(inner), pos));
        }
        self.primary(start)
    }

    fn primary(&self, start: usize) -> Step<Expression> {
        match self.peek(start).map(|t| t.kind) {
            Some(TokenKind::LeftParenthesis) => self.group(start),
            Some(TokenKind::LeftBracket) => {
                let rules: [Rule<'t, Expression>; 2] = [Self::interval, Self::term];
                self.alt(start, &rules)
            }
            _ => self.term(start),
        }
    }

    fn group(&self, start: usize) -> Step<Expression> {
        let (_, pos) = self.expect(start, TokenKind::LeftParenthesis, "'('")?;
        let (inner, pos) = self.expression(pos)?;
        let (_, pos) = self.expect(pos, TokenKind::RightParenthesis, "')'")?;
        Ok((Expression::group(inner), pos))
    }

    fn interval(&self, start: usize) -> Step<Expression> {
        let (_, min_start) = self.expect(start, TokenKind::LeftBracket, "'['")?;
        let (min, pos) = self.bound(min_start)?;
        let pos = self.whitespace(pos)?;
        let pos = self.keyword_to(pos)?;
        let max_start = self.whitespace(pos)?;
        let (max, pos) = self.bound(max_start)?;
        let (_, pos) = self.expect(pos, TokenKind::RightBracket, "']'")?;
        // typed only once the whole interval has matched, so `[9:99]`
        // still falls back to a bracket class
        let min = self.classify_bound(min_start, min.as_deref())?;
        let max = self.classify_bound(max_start, max.as_deref())?;
        Ok((Expression::interval(min, max), pos))
    }

    fn whitespace(&self, start: usize) -> std::result::Result<usize, Failure> {
        let mut pos = start;
        while self.at(pos, TokenKind::Whitespace) {
            pos += 1;
        }
        if pos == start {
            return Err(self.fail(start, "whitespace"));
        }
        Ok(pos)
    }

    fn keyword_to(&self, pos: usize) -> std::result::Result<usize, Failure> {
        let letter = |p: usize, c: &str| {
            self.peek(p)
                .is_some_and(|t| t.is(TokenKind::Letter) && t.text == c)
        };
        if letter(pos, "T") && letter(pos + 1, "O") {
            Ok(pos + 2)
        } else {
            Err(self.fail(pos, "'TO'"))
        }
    }

    /// Raw bound text; `None` for `*`.
    fn bound(&self, start: usize) -> Step<Option<String>> {
        if self.at(start, TokenKind::Asterisk) {
            let pos = start + 1;
            return if self.at(pos, TokenKind::Whitespace) || self.at(pos, TokenKind::RightBracket) {
                Ok((None, pos))
            } else {
                Err(self.fail(pos, "whitespace or ']'"))
            };
        }

        let mut pos = start;
        let mut text = String::new();
        while let Some(token) = self.peek(pos) {
            if token.is(TokenKind::Whitespace) || token.is(TokenKind::RightBracket) {
                break;
            }
            if !is_class_member(token.kind) {
                return Err(self.fail(pos, "interval bound"));
            }
            text.push(token.literal());
            pos += 1;
        }
        if text.is_empty() {
            return Err(self.fail(start, "interval bound"));
        }

        Ok((Some(text), pos))
    }

    /// Typed bound alternatives, tried in order: word/number, date, time,
    /// date-time.
    fn classify_bound(
        &self,
        start: usize,
        text: Option<&str>,
    ) -> std::result::Result<Boundary, Failure> {
        let Some(text) = text else {
            return Ok(Boundary::Unbounded);
        };
        if is_word_constant(text) {
            return Ok(Boundary::Constant(text.to_string()));
        }
        match parse_date(text) {
            Ok(Some(date)) => return Ok(Boundary::Date(date)),
            Ok(None) => {}
            Err(message) => return Err(self.cut(start, "valid date literal", message)),
        }
        match parse_time(text) {
            Ok(Some(time)) => return Ok(Boundary::Time(time)),
            Ok(None) => {}
            Err(message) => return Err(self.cut(start, "valid time literal", message)),
        }
        match parse_date_time(text) {
            Ok(Some((date, time))) => Ok(Boundary::DateTime(date, time)),
            Ok(None) => Err(self.fail(start, "interval bound")),
            Err(message) => Err(self.cut(start, "valid date-time literal", message)),
        }
    }

    fn term(&self, start: usize) -> Step<Expression> {
        let mut pieces: Vec<Piece> = Vec::new();
        let mut text: Option<Vec<Segment>> = None;
        let mut pos = start;

        while let Some(token) = self.peek(pos) {
            match token.kind {
                TokenKind::Asterisk => {
                    if let Some(segments) = text.take() {
                        pieces.push(Piece::Text(segments));
                    }
                    pieces.push(Piece::Star);
                    pos += 1;
                }
                TokenKind::LeftBracket => {
                    let (chars, after) = self.class(pos)?;
                    text.get_or_insert_with(Vec::new).push(Segment::Class(chars));
                    pos = after;
                }
                TokenKind::DoubleQuote => {
                    let (quoted, after) = self.quoted(pos)?;
                    push_text(text.get_or_insert_with(Vec::new), &quoted);
                    pos = after;
                }
                kind if kind.is_literal() => {
                    push_text(
                        text.get_or_insert_with(Vec::new),
                        &token.literal().to_string(),
                    );
                    pos += 1;
                }
                _ => break,
            }
        }
        if let Some(segments) = text {
            pieces.push(Piece::Text(segments));
        }

        let expression = match pieces.as_slice() {
            [] => return Err(self.fail(start, "value")),
            [Piece::Star] => Expression::Asterisk,
            [Piece::Text(text)] => expand(text, &Expression::Constant),
            [Piece::Text(text), Piece::Star] => expand(text, &Expression::StartsWith),
            [Piece::Star, Piece::Text(text)] => expand(text, &Expression::EndsWith),
            [Piece::Star, Piece::Text(text), Piece::Star] => expand(text, &Expression::Contains),
            [Piece::Text(prefix), Piece::Star, Piece::Text(suffix)] => Expression::and(
                expand(prefix, &Expression::StartsWith),
                expand(suffix, &Expression::EndsWith),
            ),
            _ => return Err(self.fail(start, "wildcard pattern")),
        };

        Ok((expression, pos))
    }

    /// `"..."`: everything up to the closing quote is literal text.
    fn quoted(&self, start: usize) -> Step<String> {
        let (_, mut pos) = self.expect(start, TokenKind::DoubleQuote, "'\"'")?;
        let mut text = String::new();
        loop {
            match self.peek(pos) {
                None => return Err(self.fail(pos, "closing '\"'")),
                Some(token) if token.is(TokenKind::DoubleQuote) => return Ok((text, pos + 1)),
                Some(token) => {
                    text.push(token.literal());
                    pos += 1;
                }
            }
        }
    }

    /// `[abc]`, `[a-f]`: distinct characters in first-seen order.
    fn class(&self, start: usize) -> Step<Vec<char>> {
        let (_, mut pos) = self.expect(start, TokenKind::LeftBracket, "'['")?;
        let mut chars: Vec<char> = Vec::new();
        let add = |c: char, chars: &mut Vec<char>| {
            if !chars.contains(&c) {
                chars.push(c);
            }
        };

        loop {
            let Some(token) = self.peek(pos) else {
                return Err(self.fail(pos, "']'"));
            };
            match token.kind {
                TokenKind::RightBracket if chars.is_empty() => {
                    return Err(self.fail(pos, "character class member"));
                }
                TokenKind::RightBracket => return Ok((chars, pos + 1)),
                kind if is_class_member(kind) => {
                    let first = token.literal();
                    let range_end = match (self.peek(pos + 1), self.peek(pos + 2)) {
                        (Some(dash), Some(last))
                            if dash.is(TokenKind::Dash) && is_class_member(last.kind) =>
                        {
                            Some(last.literal())
                        }
                        _ => None,
                    };
                    match range_end {
                        Some(last) if first > last => {
                            return Err(self.cut(
                                pos,
                                "ascending character range",
                                format!("'{first}-{last}'"),
                            ));
                        }
                        Some(last) => {
                            for c in first..=last {
                                add(c, &mut chars);
                            }
                            pos += 3;
                        }
                        None => {
                            add(first, &mut chars);
                            pos += 1;
                        }
                    }
                }
                _ => return Err(self.fail(pos, "']'")),
            }
        }
    }
}

fn is_class_member(kind: TokenKind) -> bool {
    kind.is_literal() && kind != TokenKind::Whitespace
}

/// Integer, decimal or word: `42`, `-3.5`, `Wayne`.
fn is_word_constant(text: &str) -> bool {
    let body = text.strip_prefix('-').unwrap_or(text);
    !body.is_empty()
        && body
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    match segments.last_mut() {
        Some(Segment::Literal(literal)) => literal.push_str(text),
        _ => segments.push(Segment::Literal(text.to_string())),
    }
}

/// Substitute-at-point expansion: the leftmost class becomes a `OneOf` whose
/// variants rebuild the enclosing node with each class character in turn.
fn expand(segments: &[Segment], build: &dyn Fn(String) -> Expression) -> Expression {
    let class = segments.iter().enumerate().find_map(|(i, s)| match s {
        Segment::Class(chars) => Some((i, chars)),
        Segment::Literal(_) => None,
    });

    match class {
        None => build(
            segments
                .iter()
                .map(|s| match s {
                    Segment::Literal(text) => text.as_str(),
                    Segment::Class(_) => "",
                })
                .collect(),
        ),
        Some((index, chars)) => Expression::OneOf(
            chars
                .iter()
                .map(|c| {
                    let mut substituted = segments.to_vec();
                    substituted[index] = Segment::Literal(c.to_string());
                    expand(&merge_literals(substituted), build)
                })
                .collect(),
        ),
    }
}

fn merge_literals(segments: Vec<Segment>) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        match (merged.last_mut(), segment) {
            (Some(Segment::Literal(previous)), Segment::Literal(text)) => previous.push_str(&text),
            (_, segment) => merged.push(segment),
        }
    }
    merged
}

fn tokens_for(input: &str) -> Result<Vec<Token>> {
    let tokens = tokenize(input);
    check_lexical(&tokens)?;
    Ok(tokens)
}

/// Parse `field=expression&field2=expression2` into criteria.
pub fn parse_criteria(input: &str) -> Result<Criteria> {
    let tokens = tokens_for(input)?;
    let criteria = Parser::new(&tokens).complete(Parser::criteria, "'&' or end of input")?;
    tracing::trace!(input, count = criteria.len(), "parsed criteria");
    Ok(criteria)
}

/// Parse a single value expression (the right-hand side of a criterion).
pub fn parse_expression(input: &str) -> Result<Expression> {
    let tokens = tokens_for(input)?;
    Parser::new(&tokens).complete(Parser::expression, "end of input")
}

/// Parse a dotted property path such as `Address.City`.
pub fn parse_property(input: &str) -> Result<PropertyPath> {
    let tokens = tokens_for(input)?;
    Parser::new(&tokens).complete(Parser::property, "'.' or end of input")
}
