//! Lowering: AST -> domain filter tree.

use super::{Filter, FilterNode, FilterOperator, FilterValue};
use crate::dsl::{Boundary, Criterion, Expression};

/// Lower a value expression scoped to `field`.
///
/// Total and deterministic: equal expressions always give equal trees.
/// Groups disappear, leaf negations flip their operator, and negated
/// composites are kept as a [`FilterNode::Not`] marker.
pub fn lower(field: &str, expression: &Expression) -> FilterNode {
    match expression {
        Expression::Constant(value) => leaf(field, FilterOperator::EqualTo, value.as_str()),
        Expression::StartsWith(value) => leaf(field, FilterOperator::StartsWith, value.as_str()),
        Expression::EndsWith(value) => leaf(field, FilterOperator::EndsWith, value.as_str()),
        Expression::Contains(value) => leaf(field, FilterOperator::Contains, value.as_str()),
        Expression::Asterisk => FilterNode::True,
        Expression::Interval { min, max } => FilterNode::and(
            [
                bound(field, FilterOperator::GreaterThanOrEqual, min),
                bound(field, FilterOperator::LessThanOrEqualTo, max),
            ]
            .into_iter()
            .flatten(),
        ),
        Expression::And(left, right) => {
            FilterNode::and([lower(field, left), lower(field, right)])
        }
        Expression::Or(left, right) => FilterNode::or([lower(field, left), lower(field, right)]),
        Expression::Not(inner) => lower(field, inner).negate(),
        Expression::Group(inner) => lower(field, inner),
        Expression::OneOf(variants) => {
            FilterNode::or(variants.iter().map(|variant| lower(field, variant)))
        }
        Expression::PropertyPath(path) => leaf(field, FilterOperator::EqualTo, path.dotted()),
        Expression::Date(date) => leaf(field, FilterOperator::EqualTo, FilterValue::Date(*date)),
        Expression::Time(time) => leaf(field, FilterOperator::EqualTo, FilterValue::Time(*time)),
        Expression::DateTime(date, time) => leaf(
            field,
            FilterOperator::EqualTo,
            FilterValue::DateTime(*date, *time),
        ),
    }
}

/// Lower one criterion; nested property paths become dotted field names.
pub fn lower_criterion(criterion: &Criterion) -> FilterNode {
    lower(&criterion.property.dotted(), &criterion.expression)
}

/// Lower every criterion and join them with `And`.
pub fn lower_criteria(criteria: &[Criterion]) -> FilterNode {
    FilterNode::and(criteria.iter().map(lower_criterion))
}

fn leaf(field: &str, operator: FilterOperator, value: impl Into<FilterValue>) -> FilterNode {
    Filter::new(field, operator, value).into()
}

fn bound(field: &str, operator: FilterOperator, boundary: &Boundary) -> Option<FilterNode> {
    let value = match boundary {
        Boundary::Unbounded => return None,
        Boundary::Constant(value) => FilterValue::String(value.clone()),
        Boundary::Date(date) => FilterValue::Date(*date),
        Boundary::Time(time) => FilterValue::Time(*time),
        Boundary::DateTime(date, time) => FilterValue::DateTime(*date, *time),
    };
    Some(leaf(field, operator, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::{DateLiteral, parse_criteria, parse_expression};
    use crate::filter::{FilterLogic, MultiFilter};

    fn lowered(text: &str) -> FilterNode {
        lower("Nickname", &parse_expression(text).unwrap())
    }

    fn filter(op: FilterOperator, value: &str) -> FilterNode {
        Filter::new("Nickname", op, value).into()
    }

    fn multi(logic: FilterLogic, filters: Vec<FilterNode>) -> FilterNode {
        FilterNode::Multi(MultiFilter { logic, filters })
    }

    #[test]
    fn test_constant() {
        let criteria = parse_criteria("Firstname=Bruce").unwrap();
        assert_eq!(
            lower_criteria(&criteria),
            Filter::new("Firstname", FilterOperator::EqualTo, "Bruce").into()
        );
    }

    #[test]
    fn test_match_operators() {
        assert_eq!(lowered("Bat*"), filter(FilterOperator::StartsWith, "Bat"));
        assert_eq!(lowered("*man"), filter(FilterOperator::EndsWith, "man"));
        assert_eq!(lowered("*atma*"), filter(FilterOperator::Contains, "atma"));
    }

    #[test]
    fn test_asterisk_is_always_true() {
        assert_eq!(lowered("*"), FilterNode::True);
    }

    #[test]
    fn test_bracket_class_lowers_to_or() {
        assert_eq!(
            lowered("[Bb]ruce"),
            multi(
                FilterLogic::Or,
                vec![
                    filter(FilterOperator::EqualTo, "Bruce"),
                    filter(FilterOperator::EqualTo, "bruce"),
                ]
            )
        );
    }

    #[test]
    fn test_interval_is_inclusive() {
        assert_eq!(
            lowered("[10 TO 20]"),
            multi(
                FilterLogic::And,
                vec![
                    filter(FilterOperator::GreaterThanOrEqual, "10"),
                    filter(FilterOperator::LessThanOrEqualTo, "20"),
                ]
            )
        );
    }

    #[test]
    fn test_half_open_intervals() {
        assert_eq!(
            lowered("[* TO 20]"),
            filter(FilterOperator::LessThanOrEqualTo, "20")
        );
        assert_eq!(
            lowered("[10 TO *]"),
            filter(FilterOperator::GreaterThanOrEqual, "10")
        );
        assert_eq!(lowered("[* TO *]"), FilterNode::True);
    }

    #[test]
    fn test_date_interval_values_are_typed() {
        let date = DateLiteral {
            year: 2010,
            month: 6,
            day: 25,
        };
        let node = lower("Birthday", &parse_expression("[2010-06-25 TO *]").unwrap());
        assert_eq!(
            node,
            Filter::new(
                "Birthday",
                FilterOperator::GreaterThanOrEqual,
                FilterValue::Date(date)
            )
            .into()
        );
    }

    #[test]
    fn test_chains_flatten() {
        assert_eq!(
            lowered("a|b|c"),
            multi(
                FilterLogic::Or,
                vec![
                    filter(FilterOperator::EqualTo, "a"),
                    filter(FilterOperator::EqualTo, "b"),
                    filter(FilterOperator::EqualTo, "c"),
                ]
            )
        );
    }

    #[test]
    fn test_prefix_suffix_idiom() {
        assert_eq!(
            lowered("Bat*man"),
            multi(
                FilterLogic::And,
                vec![
                    filter(FilterOperator::StartsWith, "Bat"),
                    filter(FilterOperator::EndsWith, "man"),
                ]
            )
        );
    }

    #[test]
    fn test_leaf_negation_flips_operator() {
        assert_eq!(lowered("!*man"), filter(FilterOperator::NotEndsWith, "man"));
        assert_eq!(lowered("!Bruce"), filter(FilterOperator::NotEqualTo, "Bruce"));
        assert_eq!(lowered("!(Bruce)"), filter(FilterOperator::NotEqualTo, "Bruce"));
        assert_eq!(lowered("!!Bruce"), filter(FilterOperator::EqualTo, "Bruce"));
    }

    #[test]
    fn test_negated_group_is_not_distributed() {
        let node = lowered("!(Bat*|Sup*)|!*man");
        assert_eq!(
            node,
            multi(
                FilterLogic::Or,
                vec![
                    FilterNode::Not(Box::new(multi(
                        FilterLogic::Or,
                        vec![
                            filter(FilterOperator::StartsWith, "Bat"),
                            filter(FilterOperator::StartsWith, "Sup"),
                        ]
                    ))),
                    filter(FilterOperator::NotEndsWith, "man"),
                ]
            )
        );
    }

    #[test]
    fn test_group_is_transparent() {
        for text in ["a|b", "Bat*,*man", "[Bb]ruce", "!(a|b)", "[1 TO 2]"] {
            let expression = parse_expression(text).unwrap();
            assert_eq!(
                lower("f", &Expression::group(expression.clone())),
                lower("f", &expression),
                "{text}"
            );
        }
    }

    #[test]
    fn test_lowering_is_deterministic() {
        let text = "(Bat*|Sup*),![Bb]ruce|[* TO 2010-06-25]";
        let first = lower("f", &parse_expression(text).unwrap());
        let second = lower("f", &parse_expression(text).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_nested_property_becomes_dotted_field() {
        let criteria = parse_criteria("Address.City=Gotham").unwrap();
        assert_eq!(
            lower_criteria(&criteria),
            Filter::new("Address.City", FilterOperator::EqualTo, "Gotham").into()
        );
    }

    #[test]
    fn test_criteria_join_with_and() {
        let criteria = parse_criteria("Firstname=Bruce&Lastname=Wa*").unwrap();
        assert_eq!(
            lower_criteria(&criteria),
            FilterNode::and([
                Filter::new("Firstname", FilterOperator::EqualTo, "Bruce").into(),
                Filter::new("Lastname", FilterOperator::StartsWith, "Wa").into(),
            ])
        );
    }
}
