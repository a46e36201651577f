//! Query-string filter and sort compiler.
//!
//! `Firstname=Bru*&Age=[18 TO *]` is tokenized, parsed into an AST, and
//! lowered into a [`FilterNode`] tree that storage layers can translate.
//! `-Age,Lastname` parses into a [`SortNode`].

pub mod cache;
pub mod config;
pub mod dsl;
pub mod error;
pub mod filter;
pub mod sort;
pub mod target;

pub use cache::{CacheStats, FilterCache};
pub use config::{CacheSettings, Settings};
pub use error::{QueryError, Result};
pub use filter::{Filter, FilterLogic, FilterNode, FilterOperator, FilterValue, MultiFilter};
pub use sort::{Sort, SortDirection, SortNode, SortValidation, parse_sort, validate_sort};
pub use target::{AnyProperty, Filterable, string_to_filter, string_to_sort};
