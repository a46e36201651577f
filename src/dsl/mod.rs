//! Query-string filter grammar.
//!
//! Syntax (right-hand side of `field=expression`):
//!
//! ```text
//!   Bruce                   - exact match
//!   Bru*, *ce, *ruc*        - starts with, ends with, contains
//!   Bat*man                 - starts with AND ends with
//!   *                       - any value
//!   [Bb]ruce, Br[a-f]       - one of, per bracket character
//!   [10 TO 20], [* TO 20]   - inclusive interval (numbers, words, dates, times)
//!   expr1,expr2             - AND
//!   expr1|expr2             - OR (note: lower precedence than ,)
//!   !expr                   - NOT
//!   (expr)                  - grouping
//!   "a|b", a\|b             - literal text
//! ```
//!
//! Criteria are joined with `&`: `Firstname=Bruce&Lastname=Wa*`.

mod ast;
mod lexer;
mod literals;
mod parser;

pub use ast::*;
pub use lexer::{RESERVED, Token, TokenKind, check_lexical, tokenize};
pub use literals::{parse_date, parse_date_time, parse_time};
pub use parser::{parse_criteria, parse_expression, parse_property};
