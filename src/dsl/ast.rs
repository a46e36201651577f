//! AST types for the query-string grammar.

use serde::Serialize;
use std::fmt;

/// Parsed value expression (right-hand side of `field=expression`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Expression {
    /// Exact match: `Bruce`
    Constant(String),

    /// Match-any: `*`
    Asterisk,

    /// Prefix match: `Bru*`
    StartsWith(String),

    /// Suffix match: `*ce`
    EndsWith(String),

    /// Substring match: `*ruc*`
    Contains(String),

    /// Bracket-class expansion, one variant per substituted character.
    OneOf(Vec<Expression>),

    /// Inclusive range: `[10 TO 20]`, `[* TO 2010-06-25]`
    Interval { min: Boundary, max: Boundary },

    /// Parenthesized expression: `(expr)`
    Group(Box<Expression>),

    /// Conjunction: `expr1,expr2`
    And(Box<Expression>, Box<Expression>),

    /// Disjunction: `expr1|expr2`
    Or(Box<Expression>, Box<Expression>),

    /// Negation: `!expr`
    Not(Box<Expression>),

    /// Property access path: `Address.City`
    PropertyPath(PropertyPath),

    Date(DateLiteral),
    Time(TimeLiteral),
    DateTime(DateLiteral, TimeLiteral),
}

impl Expression {
    pub fn constant(value: impl Into<String>) -> Self {
        Expression::Constant(value.into())
    }

    pub fn starts_with(value: impl Into<String>) -> Self {
        Expression::StartsWith(value.into())
    }

    pub fn ends_with(value: impl Into<String>) -> Self {
        Expression::EndsWith(value.into())
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Expression::Contains(value.into())
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Or(Box::new(left), Box::new(right))
    }

    pub fn not(inner: Expression) -> Self {
        Expression::Not(Box::new(inner))
    }

    pub fn group(inner: Expression) -> Self {
        Expression::Group(Box::new(inner))
    }

    pub fn interval(min: Boundary, max: Boundary) -> Self {
        Expression::Interval { min, max }
    }
}

/// One side of an interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Boundary {
    /// `*`: the interval is open on this side.
    Unbounded,
    Constant(String),
    Date(DateLiteral),
    Time(TimeLiteral),
    DateTime(DateLiteral, TimeLiteral),
}

/// Calendar date literal `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DateLiteral {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

impl fmt::Display for DateLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Clock time literal `HH:MM:SS[.mmm]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TimeLiteral {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub milliseconds: u16,
}

impl fmt::Display for TimeLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds
        )?;
        if self.milliseconds > 0 {
            write!(f, ".{:03}", self.milliseconds)?;
        }
        Ok(())
    }
}

/// Dotted property path: `Address.City` -> `["Address", "City"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PropertyPath(pub Vec<String>);

impl PropertyPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PropertyPath(segments.into_iter().map(Into::into).collect())
    }

    /// Field name as consumers see it: segments joined by `.`.
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

/// One `property=expression` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Criterion {
    pub property: PropertyPath,
    pub expression: Expression,
}

/// `&`-joined criteria, in source order.
pub type Criteria = Vec<Criterion>;
