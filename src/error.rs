use thiserror::Error;

use crate::sort::SortValidation;

/// Errors raised while compiling query-string filters and sorts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Lexical error at {line}:{column}: {message}")]
    LexicalAmbiguity {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Syntax error at {line}:{column}: expected {expected}, found {found}")]
    Syntax {
        line: usize,
        column: usize,
        expected: String,
        found: String,
    },

    #[error("Invalid sort expression: {0}")]
    InvalidSort(SortValidation),

    #[error("Unsupported value type: {0}")]
    UnsupportedValueType(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    #[error("Malformed filter: {0}")]
    MalformedFilter(String),
}

/// Result type alias for query compilation.
pub type Result<T> = std::result::Result<T, QueryError>;

impl QueryError {
    /// Source position (line, column) for errors raised by the grammar.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            QueryError::LexicalAmbiguity { line, column, .. }
            | QueryError::Syntax { line, column, .. } => Some((*line, *column)),
            _ => None,
        }
    }
}
