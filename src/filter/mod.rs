//! Domain filter tree: the operator-tagged output of lowering.
//!
//! A tree is either a single [`Filter`] on one field or a [`MultiFilter`]
//! combining at least two subtrees with the same logic. `True` is the
//! unconstrained filter produced by `*`; `Not` marks a negated composite that
//! consumers must interpret themselves.

mod codec;
mod eval;
mod lower;

use std::fmt;
use std::str::FromStr;

use crate::dsl::{DateLiteral, TimeLiteral};
use crate::error::QueryError;

pub use codec::{decode, encode, from_json, to_json};
pub use eval::matches;
pub use lower::{lower, lower_criteria, lower_criterion};

/// Comparison applied by a leaf filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    EqualTo,
    NotEqualTo,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqualTo,
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 16] = [
        FilterOperator::EqualTo,
        FilterOperator::NotEqualTo,
        FilterOperator::Contains,
        FilterOperator::NotContains,
        FilterOperator::StartsWith,
        FilterOperator::NotStartsWith,
        FilterOperator::EndsWith,
        FilterOperator::NotEndsWith,
        FilterOperator::GreaterThan,
        FilterOperator::GreaterThanOrEqual,
        FilterOperator::LessThan,
        FilterOperator::LessThanOrEqualTo,
        FilterOperator::IsNull,
        FilterOperator::IsNotNull,
        FilterOperator::IsEmpty,
        FilterOperator::IsNotEmpty,
    ];

    /// Unary operators never carry a value.
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            FilterOperator::IsNull
                | FilterOperator::IsNotNull
                | FilterOperator::IsEmpty
                | FilterOperator::IsNotEmpty
        )
    }

    /// The operator matching exactly the values this one rejects.
    pub fn negate(self) -> Self {
        use FilterOperator::*;
        match self {
            EqualTo => NotEqualTo,
            NotEqualTo => EqualTo,
            Contains => NotContains,
            NotContains => Contains,
            StartsWith => NotStartsWith,
            NotStartsWith => StartsWith,
            EndsWith => NotEndsWith,
            NotEndsWith => EndsWith,
            GreaterThan => LessThanOrEqualTo,
            GreaterThanOrEqual => LessThan,
            LessThan => GreaterThanOrEqual,
            LessThanOrEqualTo => GreaterThan,
            IsNull => IsNotNull,
            IsNotNull => IsNull,
            IsEmpty => IsNotEmpty,
            IsNotEmpty => IsEmpty,
        }
    }

    /// Wire name.
    pub fn code(self) -> &'static str {
        use FilterOperator::*;
        match self {
            EqualTo => "eq",
            NotEqualTo => "neq",
            Contains => "contains",
            NotContains => "ncontains",
            StartsWith => "startswith",
            NotStartsWith => "nstartswith",
            EndsWith => "endswith",
            NotEndsWith => "nendswith",
            GreaterThan => "gt",
            GreaterThanOrEqual => "gte",
            LessThan => "lt",
            LessThanOrEqualTo => "lte",
            IsNull => "isnull",
            IsNotNull => "isnotnull",
            IsEmpty => "isempty",
            IsNotEmpty => "isnotempty",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for FilterOperator {
    type Err = QueryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        FilterOperator::ALL
            .into_iter()
            .find(|op| op.code() == value)
            .ok_or_else(|| QueryError::UnknownOperator(value.to_string()))
    }
}

/// Typed scalar compared by a leaf filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(DateLiteral),
    Time(TimeLiteral),
    DateTime(DateLiteral, TimeLiteral),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::String(s) => f.write_str(s),
            FilterValue::Integer(i) => write!(f, "{i}"),
            FilterValue::Float(x) => write!(f, "{x}"),
            FilterValue::Boolean(b) => write!(f, "{b}"),
            FilterValue::Date(date) => write!(f, "{date}"),
            FilterValue::Time(time) => write!(f, "{time}"),
            FilterValue::DateTime(date, time) => write!(f, "{date}T{time}"),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::String(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::String(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Boolean(value)
    }
}

/// Leaf filter on one (possibly dotted) field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Option<FilterValue>,
}

impl Filter {
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Filter {
            field: field.into(),
            operator,
            value: Some(value.into()),
        }
    }

    /// Leaf for a unary operator (`IsNull`, `IsEmpty`, ...).
    pub fn unary(field: impl Into<String>, operator: FilterOperator) -> Self {
        Filter {
            field: field.into(),
            operator,
            value: None,
        }
    }

    pub fn negate(self) -> Self {
        Filter {
            operator: self.operator.negate(),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterLogic {
    And,
    Or,
}

impl FilterLogic {
    pub fn code(self) -> &'static str {
        match self {
            FilterLogic::And => "and",
            FilterLogic::Or => "or",
        }
    }
}

/// Two or more subtrees joined by the same logic.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiFilter {
    pub logic: FilterLogic,
    pub filters: Vec<FilterNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// Matches everything.
    True,
    Filter(Filter),
    Multi(MultiFilter),
    /// Negated composite, kept as-is rather than distributed.
    Not(Box<FilterNode>),
}

impl FilterNode {
    /// Join nodes with `logic`, flattening nested composites of the same
    /// logic. `True` is dropped from conjunctions and absorbs disjunctions,
    /// and a single survivor is returned unwrapped.
    pub fn combine<I>(logic: FilterLogic, nodes: I) -> FilterNode
    where
        I: IntoIterator<Item = FilterNode>,
    {
        let mut flat = Vec::new();
        for node in nodes {
            match node {
                FilterNode::Multi(multi) if multi.logic == logic => flat.extend(multi.filters),
                FilterNode::True => match logic {
                    FilterLogic::And => {} // skip
                    FilterLogic::Or => return FilterNode::True,
                },
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => FilterNode::True,
            1 => flat.remove(0),
            _ => FilterNode::Multi(MultiFilter {
                logic,
                filters: flat,
            }),
        }
    }

    pub fn and<I>(nodes: I) -> FilterNode
    where
        I: IntoIterator<Item = FilterNode>,
    {
        FilterNode::combine(FilterLogic::And, nodes)
    }

    pub fn or<I>(nodes: I) -> FilterNode
    where
        I: IntoIterator<Item = FilterNode>,
    {
        FilterNode::combine(FilterLogic::Or, nodes)
    }

    /// Leaves flip their operator; composites get wrapped in `Not`, and a
    /// wrapped node is unwrapped again.
    pub fn negate(self) -> FilterNode {
        match self {
            FilterNode::Filter(filter) => FilterNode::Filter(filter.negate()),
            FilterNode::Not(inner) => *inner,
            other => FilterNode::Not(Box::new(other)),
        }
    }
}

impl From<Filter> for FilterNode {
    fn from(filter: Filter) -> Self {
        FilterNode::Filter(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(field: &str, value: &str) -> FilterNode {
        Filter::new(field, FilterOperator::EqualTo, value).into()
    }

    #[test]
    fn test_negate_is_an_involution() {
        for op in FilterOperator::ALL {
            assert_eq!(op.negate().negate(), op);
            assert_ne!(op.negate(), op);
            assert_eq!(op.negate().is_unary(), op.is_unary());
        }
    }

    #[test]
    fn test_operator_codes_round_trip() {
        for op in FilterOperator::ALL {
            assert_eq!(op.code().parse::<FilterOperator>().unwrap(), op);
        }
        assert_eq!(
            "like".parse::<FilterOperator>(),
            Err(QueryError::UnknownOperator("like".into()))
        );
    }

    #[test]
    fn test_combine_flattens_same_logic() {
        let inner = FilterNode::and([eq("a", "1"), eq("b", "2")]);
        let outer = FilterNode::and([inner, eq("c", "3")]);
        let FilterNode::Multi(multi) = outer else {
            panic!("expected MultiFilter");
        };
        assert_eq!(multi.filters.len(), 3);
    }

    #[test]
    fn test_combine_keeps_other_logic_nested() {
        let inner = FilterNode::or([eq("a", "1"), eq("b", "2")]);
        let outer = FilterNode::and([inner.clone(), eq("c", "3")]);
        assert_eq!(
            outer,
            FilterNode::Multi(MultiFilter {
                logic: FilterLogic::And,
                filters: vec![inner, eq("c", "3")],
            })
        );
    }

    #[test]
    fn test_combine_absorbs_true() {
        assert_eq!(FilterNode::and([FilterNode::True, eq("a", "1")]), eq("a", "1"));
        assert_eq!(FilterNode::or([FilterNode::True, eq("a", "1")]), FilterNode::True);
        assert_eq!(FilterNode::and([]), FilterNode::True);
    }

    #[test]
    fn test_negate_composite_is_structural() {
        let either = FilterNode::or([eq("a", "1"), eq("a", "2")]);
        let negated = either.clone().negate();
        assert_eq!(negated, FilterNode::Not(Box::new(either.clone())));
        assert_eq!(negated.negate(), either);
    }
}
