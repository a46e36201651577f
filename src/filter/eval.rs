//! Evaluator for domain filter trees over JSON documents.

use std::cmp::Ordering;

use serde_json::Value;

use super::{Filter, FilterLogic, FilterNode, FilterOperator, FilterValue};

/// Evaluate a filter tree against a document.
///
/// Fields are dotted paths; stepping through an array visits every element.
/// Value comparisons against an array field succeed when any element
/// matches. Missing fields behave like `null`: only `IsNull` matches them
/// (and negated operators, which are the complement of their positive form).
pub fn matches(node: &FilterNode, document: &Value) -> bool {
    match node {
        FilterNode::True => true,
        FilterNode::Filter(filter) => matches_filter(filter, document),
        FilterNode::Multi(multi) => match multi.logic {
            FilterLogic::And => multi.filters.iter().all(|f| matches(f, document)),
            FilterLogic::Or => multi.filters.iter().any(|f| matches(f, document)),
        },
        FilterNode::Not(inner) => !matches(inner, document),
    }
}

static NULL: Value = Value::Null;

fn matches_filter(filter: &Filter, document: &Value) -> bool {
    let mut candidates = resolve(document, &filter.field);
    if candidates.is_empty() {
        candidates.push(&NULL);
    }
    let op = filter.operator;

    if op.is_unary() {
        return candidates.iter().any(|value| unary(op, value));
    }

    let Some(expected) = &filter.value else {
        return false;
    };

    let positive = match op {
        FilterOperator::NotEqualTo
        | FilterOperator::NotContains
        | FilterOperator::NotStartsWith
        | FilterOperator::NotEndsWith => op.negate(),
        other => other,
    };
    let hit = candidates
        .iter()
        .flat_map(|value| elements(value))
        .any(|value| binary(positive, value, expected));

    if positive == op { hit } else { !hit }
}

/// Walk a dotted path, fanning out over arrays along the way.
fn resolve<'a>(document: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![document];
    for segment in path.split('.') {
        current = current
            .into_iter()
            .flat_map(|value| match value {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            })
            .filter_map(|value| value.get(segment))
            .collect();
    }
    current
}

fn elements(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn unary(op: FilterOperator, value: &Value) -> bool {
    match op {
        FilterOperator::IsNull => value.is_null(),
        FilterOperator::IsNotNull => !value.is_null(),
        FilterOperator::IsEmpty => is_empty(value) == Some(true),
        FilterOperator::IsNotEmpty => is_empty(value) == Some(false),
        _ => false,
    }
}

fn is_empty(value: &Value) -> Option<bool> {
    match value {
        Value::String(s) => Some(s.is_empty()),
        Value::Array(items) => Some(items.is_empty()),
        Value::Object(map) => Some(map.is_empty()),
        _ => None,
    }
}

fn binary(op: FilterOperator, actual: &Value, expected: &FilterValue) -> bool {
    match op {
        FilterOperator::EqualTo => compare(actual, expected) == Some(Ordering::Equal),
        FilterOperator::GreaterThan => compare(actual, expected) == Some(Ordering::Greater),
        FilterOperator::GreaterThanOrEqual => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        FilterOperator::LessThan => compare(actual, expected) == Some(Ordering::Less),
        FilterOperator::LessThanOrEqualTo => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        FilterOperator::Contains => text_of(actual)
            .is_some_and(|text| text.contains(expected.to_string().as_str())),
        FilterOperator::StartsWith => text_of(actual)
            .is_some_and(|text| text.starts_with(expected.to_string().as_str())),
        FilterOperator::EndsWith => text_of(actual)
            .is_some_and(|text| text.ends_with(expected.to_string().as_str())),
        _ => false,
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Order `actual` relative to `expected`. Numbers compare numerically
/// (numeric strings included), dates and times as ISO text.
fn compare(actual: &Value, expected: &FilterValue) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Null, _) => None,
        (Value::Bool(a), FilterValue::Boolean(b)) => Some(a.cmp(b)),
        (Value::Bool(a), FilterValue::String(b)) => b.parse::<bool>().ok().map(|b| a.cmp(&b)),
        (Value::Number(a), expected) => {
            let a = a.as_f64()?;
            let b = match expected {
                FilterValue::Integer(i) => *i as f64,
                FilterValue::Float(x) => *x,
                FilterValue::String(s) => s.trim().parse::<f64>().ok()?,
                _ => return None,
            };
            a.partial_cmp(&b)
        }
        (Value::String(a), FilterValue::Integer(_) | FilterValue::Float(_)) => {
            let a = a.trim().parse::<f64>().ok()?;
            compare(&Value::from(a), expected)
        }
        (Value::String(a), FilterValue::Boolean(b)) => a.parse::<bool>().ok().map(|a| a.cmp(b)),
        (Value::String(a), expected) => Some(a.as_str().cmp(expected.to_string().as_str())),
        _ => None,
    }
}
