//! Typed entry points: compile query text against a target type's
//! property set.

use crate::dsl::{PropertyPath, parse_criteria};
use crate::error::{QueryError, Result};
use crate::filter::{FilterNode, lower_criteria};
use crate::sort::{Sort, SortNode, parse_sort};

/// A type whose properties may be filtered and sorted on.
pub trait Filterable: 'static {
    /// Canonical (dotted) property names.
    const PROPERTIES: &'static [&'static str];

    /// Map a path written by a user to its canonical name, ignoring case.
    fn resolve_property(path: &PropertyPath) -> Option<String> {
        let dotted = path.dotted();
        Self::PROPERTIES
            .iter()
            .find(|name| name.eq_ignore_ascii_case(&dotted))
            .map(|name| name.to_string())
    }
}

/// Target that accepts every property path as written.
pub struct AnyProperty;

impl Filterable for AnyProperty {
    const PROPERTIES: &'static [&'static str] = &[];

    fn resolve_property(path: &PropertyPath) -> Option<String> {
        Some(path.dotted())
    }
}

fn resolve<T: Filterable>(path: &PropertyPath) -> Result<PropertyPath> {
    T::resolve_property(path)
        .map(|name| PropertyPath::new(name.split('.')))
        .ok_or_else(|| QueryError::UnknownProperty(path.dotted()))
}

/// Compile filter text for `T`. Blank text matches everything.
pub fn string_to_filter<T: Filterable>(text: &str) -> Result<FilterNode> {
    if text.trim().is_empty() {
        return Ok(FilterNode::True);
    }
    let mut criteria = parse_criteria(text)?;
    for criterion in &mut criteria {
        criterion.property = resolve::<T>(&criterion.property)?;
    }
    Ok(lower_criteria(&criteria))
}

/// Compile sort text for `T`, resolving property names to canonical form.
pub fn string_to_sort<T: Filterable>(text: &str) -> Result<SortNode> {
    let node = parse_sort(text)?;
    let resolved = |sort: &Sort| -> Result<Sort> {
        Ok(Sort::new(resolve::<T>(&sort.property)?, sort.direction))
    };
    Ok(match node {
        SortNode::Sort(sort) => SortNode::Sort(resolved(&sort)?),
        SortNode::MultiSort(sorts) => {
            SortNode::MultiSort(sorts.iter().map(resolved).collect::<Result<_>>()?)
        }
    })
}
