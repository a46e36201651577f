//! Property-sort grammar: `[+|-]prop(,[+|-]prop)*`.
//!
//! `+` or no sign sorts ascending, `-` descending. Properties may be dotted
//! (`Address.City`). [`validate_sort`] is a cheap pre-check that reports
//! every rule the text breaks; [`parse_sort`] runs it before parsing.

use std::fmt;

use serde::Serialize;
use winnow::combinator::{alt, opt, separated};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

use crate::dsl::PropertyPath;
use crate::error::{QueryError, Result};

type PResult<T> = std::result::Result<T, winnow::error::ErrMode<winnow::error::ContextError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Sort {
    pub property: PropertyPath,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(property: PropertyPath, direction: SortDirection) -> Self {
        Sort {
            property,
            direction,
        }
    }
}

/// Sort tree. In a `MultiSort` the first entry is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SortNode {
    Sort(Sort),
    MultiSort(Vec<Sort>),
}

impl SortNode {
    pub fn sorts(&self) -> &[Sort] {
        match self {
            SortNode::Sort(sort) => std::slice::from_ref(sort),
            SortNode::MultiSort(sorts) => sorts,
        }
    }

    fn from_sorts(mut sorts: Vec<Sort>) -> SortNode {
        if sorts.len() == 1 {
            SortNode::Sort(sorts.remove(0))
        } else {
            SortNode::MultiSort(sorts)
        }
    }
}

/// Outcome of [`validate_sort`]; valid when no rule was broken.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SortValidation {
    pub errors: Vec<String>,
}

impl SortValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for SortValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.errors.join("; "))
    }
}

fn direction(input: &mut &str) -> PResult<SortDirection> {
    alt((
        '+'.value(SortDirection::Ascending),
        '-'.value(SortDirection::Descending),
    ))
    .parse_next(input)
}

fn identifier<'i>(input: &mut &'i str) -> PResult<&'i str> {
    (
        one_of(|c: char| c.is_alphabetic() || c == '_'),
        take_while(0.., |c: char| {
            c.is_alphabetic() || c.is_ascii_digit() || c == '_'
        }),
    )
        .take()
        .parse_next(input)
}

fn property_path(input: &mut &str) -> PResult<PropertyPath> {
    separated(1.., identifier, '.')
        .map(|segments: Vec<&str>| PropertyPath::new(segments))
        .parse_next(input)
}

fn segment(input: &mut &str) -> PResult<Sort> {
    (opt(direction), property_path)
        .map(|(direction, property)| Sort::new(property, direction.unwrap_or_default()))
        .parse_next(input)
}

fn is_sign(c: char) -> bool {
    c == '+' || c == '-'
}

/// Check sort text against every rule without building a tree.
pub fn validate_sort(text: &str) -> SortValidation {
    let mut validation = SortValidation::default();
    if text.trim().is_empty() {
        validation.errors.push("sort expression is empty".to_string());
        return validation;
    }

    let segments: Vec<&str> = text.split(',').collect();
    let last = segments.len() - 1;
    for (index, raw) in segments.iter().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            let message = match index {
                0 => "leading ','".to_string(),
                i if i == last => "trailing ','".to_string(),
                i => format!("empty segment at position {}", i + 1),
            };
            validation.errors.push(message);
            continue;
        }

        let signs = trimmed.chars().take_while(|c| is_sign(*c)).count();
        // signs are ASCII, so the count is also a byte offset
        let rest = &trimmed[signs..];
        if signs > 1 {
            validation
                .errors
                .push(format!("repeated sign in '{trimmed}'"));
        } else if signs == 1 && rest.trim().is_empty() {
            validation
                .errors
                .push(format!("sign without property in '{trimmed}'"));
        } else if rest.starts_with(char::is_whitespace) {
            validation
                .errors
                .push(format!("whitespace between sign and property in '{trimmed}'"));
        } else if rest.split_whitespace().count() > 1 {
            validation
                .errors
                .push(format!("missing ',' between properties in '{trimmed}'"));
        } else if property_path.parse(rest).is_err() {
            validation
                .errors
                .push(format!("invalid property name '{rest}'"));
        }
    }
    validation
}

/// Parse sort text into a sort tree, validating it first.
pub fn parse_sort(text: &str) -> Result<SortNode> {
    let validation = validate_sort(text);
    if !validation.is_valid() {
        return Err(QueryError::InvalidSort(validation));
    }
    let sorts = text
        .split(',')
        .map(|raw| {
            // same whitespace class as the validator
            segment
                .parse(raw.trim())
                .map_err(|e| QueryError::InvalidSort(SortValidation {
                    errors: vec![format!("invalid sort segment '{}': {e}", raw.trim())],
                }))
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::trace!(text, count = sorts.len(), "parsed sort");
    Ok(SortNode::from_sorts(sorts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asc(name: &str) -> Sort {
        Sort::new(PropertyPath::new(name.split('.')), SortDirection::Ascending)
    }

    fn desc(name: &str) -> Sort {
        Sort::new(PropertyPath::new(name.split('.')), SortDirection::Descending)
    }

    #[test]
    fn test_single_property() {
        assert_eq!(parse_sort("Name").unwrap(), SortNode::Sort(asc("Name")));
        assert_eq!(parse_sort("+Name").unwrap(), SortNode::Sort(asc("Name")));
        assert_eq!(parse_sort("-Name").unwrap(), SortNode::Sort(desc("Name")));
    }

    #[test]
    fn test_multiple_properties_keep_order() {
        assert_eq!(
            parse_sort("prop1, prop2").unwrap(),
            SortNode::MultiSort(vec![asc("prop1"), asc("prop2")])
        );
        assert_eq!(
            parse_sort("-Age,+Lastname,Firstname").unwrap(),
            SortNode::MultiSort(vec![desc("Age"), asc("Lastname"), asc("Firstname")])
        );
    }

    #[test]
    fn test_dotted_property() {
        assert_eq!(
            parse_sort("-Address.City").unwrap(),
            SortNode::Sort(desc("Address.City"))
        );
    }

    #[test]
    fn test_repeated_signs_rejected() {
        for text in ["--prop", "++prop", "+-prop", "-+prop"] {
            let validation = validate_sort(text);
            assert!(!validation.is_valid(), "{text}");
            assert!(validation.errors[0].contains("repeated sign"), "{text}");
        }
    }

    #[test]
    fn test_sign_without_property() {
        assert!(!validate_sort("-").is_valid());
        assert!(!validate_sort("Name, + ").is_valid());
    }

    #[test]
    fn test_blank_segments_rejected() {
        assert_eq!(validate_sort("").errors, vec!["sort expression is empty"]);
        assert_eq!(validate_sort("   ").errors, vec!["sort expression is empty"]);
        assert_eq!(validate_sort(",Name").errors, vec!["leading ','"]);
        assert_eq!(validate_sort("Name,").errors, vec!["trailing ','"]);
        assert_eq!(
            validate_sort("a, ,b").errors,
            vec!["empty segment at position 2"]
        );
    }

    #[test]
    fn test_whitespace_rules() {
        assert!(
            validate_sort("- Name").errors[0].contains("whitespace between sign and property")
        );
        assert!(validate_sort("Name Age").errors[0].contains("missing ','"));
        assert!(validate_sort("  Name ,  -Age  ").is_valid());
    }

    #[test]
    fn test_validated_text_always_parses() {
        for text in ["Name\n", "Name,\nAge", "\t-Age ,\r\n+Name", "Name\u{a0}"] {
            assert!(validate_sort(text).is_valid(), "{text:?}");
            assert!(parse_sort(text).is_ok(), "{text:?}");
        }
        assert_eq!(
            parse_sort("Name,\nAge").unwrap(),
            SortNode::MultiSort(vec![asc("Name"), asc("Age")])
        );
    }

    #[test]
    fn test_invalid_property_names() {
        assert!(!validate_sort("1abc").is_valid());
        assert!(!validate_sort("Name.").is_valid());
        assert!(!validate_sort("Na*me").is_valid());
    }

    #[test]
    fn test_validator_collects_every_error() {
        let validation = validate_sort("--a,,b c");
        assert_eq!(validation.errors.len(), 3);
    }

    #[test]
    fn test_parse_reports_validation() {
        let err = parse_sort("--prop").unwrap_err();
        let QueryError::InvalidSort(validation) = err else {
            panic!("expected InvalidSort");
        };
        assert_eq!(validation.errors, vec!["repeated sign in '--prop'"]);
    }

    #[test]
    fn test_sorts_accessor() {
        assert_eq!(parse_sort("a").unwrap().sorts(), &[asc("a")]);
        assert_eq!(parse_sort("a,-b").unwrap().sorts().len(), 2);
    }
}
