//! JSON wire codec for domain filter trees.
//!
//! Leaf:      `{ "field": "Name", "op": "eq", "value": "Bruce" }`
//! Composite: `{ "logic": "and" | "or", "filters": [ ... ] }`
//! Negation:  `{ "not": { ... } }`
//! Anything:  `{ "logic": "and", "filters": [] }`
//!
//! Unary operators omit `value`. Dates and times travel as ISO strings and
//! decode back as plain strings.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::{Filter, FilterLogic, FilterNode, FilterOperator, FilterValue, MultiFilter};
use crate::error::{QueryError, Result};

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum WireNode {
    Not {
        not: Box<WireNode>,
    },
    Composite {
        logic: String,
        filters: Vec<WireNode>,
    },
    Leaf {
        field: String,
        op: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
}

fn value_to_wire(value: &FilterValue) -> Value {
    match value {
        FilterValue::String(s) => Value::String(s.clone()),
        FilterValue::Integer(i) => Value::from(*i),
        FilterValue::Float(x) => Value::from(*x),
        FilterValue::Boolean(b) => Value::Bool(*b),
        other => Value::String(other.to_string()),
    }
}

fn value_from_wire(value: Value) -> Result<FilterValue> {
    match value {
        Value::String(s) => Ok(FilterValue::String(s)),
        Value::Bool(b) => Ok(FilterValue::Boolean(b)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(FilterValue::Integer(i)),
            (None, Some(x)) => Ok(FilterValue::Float(x)),
            (None, None) => Err(QueryError::UnsupportedValueType(n.to_string())),
        },
        other => Err(QueryError::UnsupportedValueType(other.to_string())),
    }
}

fn node_to_wire(node: &FilterNode) -> WireNode {
    match node {
        FilterNode::True => WireNode::Composite {
            logic: FilterLogic::And.code().to_string(),
            filters: Vec::new(),
        },
        FilterNode::Filter(filter) => WireNode::Leaf {
            field: filter.field.clone(),
            op: filter.operator.code().to_string(),
            value: filter.value.as_ref().map(value_to_wire),
        },
        FilterNode::Multi(multi) => WireNode::Composite {
            logic: multi.logic.code().to_string(),
            filters: multi.filters.iter().map(node_to_wire).collect(),
        },
        FilterNode::Not(inner) => WireNode::Not {
            not: Box::new(node_to_wire(inner)),
        },
    }
}

fn node_from_wire(wire: WireNode) -> Result<FilterNode> {
    match wire {
        WireNode::Not { not } => Ok(FilterNode::Not(Box::new(node_from_wire(*not)?))),
        WireNode::Composite { logic, filters } => {
            let logic = match logic.as_str() {
                "and" => FilterLogic::And,
                "or" => FilterLogic::Or,
                other => {
                    return Err(QueryError::MalformedFilter(format!(
                        "unknown logic '{other}'"
                    )));
                }
            };
            match (logic, filters.len()) {
                (FilterLogic::And, 0) => Ok(FilterNode::True),
                (_, 0) | (_, 1) => Err(QueryError::MalformedFilter(format!(
                    "'{}' needs at least two filters",
                    logic.code()
                ))),
                _ => Ok(FilterNode::Multi(MultiFilter {
                    logic,
                    filters: filters
                        .into_iter()
                        .map(node_from_wire)
                        .collect::<Result<Vec<_>>>()?,
                })),
            }
        }
        WireNode::Leaf { field, op, value } => {
            let operator: FilterOperator = op.parse()?;
            let value = match (operator.is_unary(), value) {
                (true, None) | (true, Some(Value::Null)) => None,
                (true, Some(_)) => {
                    return Err(QueryError::MalformedFilter(format!(
                        "operator '{op}' does not take a value"
                    )));
                }
                (false, None) => {
                    return Err(QueryError::MalformedFilter(format!(
                        "operator '{op}' requires a value"
                    )));
                }
                (false, Some(value)) => Some(value_from_wire(value)?),
            };
            Ok(FilterNode::Filter(Filter {
                field,
                operator,
                value,
            }))
        }
    }
}

/// Encode a filter tree as a JSON value.
pub fn to_json(node: &FilterNode) -> Value {
    // WireNode only holds strings, vectors and JSON values
    serde_json::to_value(node_to_wire(node)).unwrap_or(Value::Null)
}

/// Decode a filter tree from a JSON value.
pub fn from_json(value: Value) -> Result<FilterNode> {
    let wire: WireNode = serde_json::from_value(value)
        .map_err(|e| QueryError::MalformedFilter(e.to_string()))?;
    node_from_wire(wire)
}

/// Encode a filter tree as a JSON string.
pub fn encode(node: &FilterNode) -> String {
    to_json(node).to_string()
}

/// Decode a filter tree from a JSON string.
pub fn decode(json: &str) -> Result<FilterNode> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| QueryError::MalformedFilter(e.to_string()))?;
    from_json(value)
}

impl Serialize for FilterNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        node_to_wire(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FilterNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let wire = WireNode::deserialize(deserializer)?;
        node_from_wire(wire).map_err(D::Error::custom)
    }
}
