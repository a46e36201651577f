//! Lexer/tokenizer for the query-string grammar.
//!
//! Every input character becomes exactly one token, except a backslash
//! escape which folds `\x` into a single `Escaped` token. Tokenizing never
//! fails; unbalanced quotes and dangling escapes are reported separately by
//! [`check_lexical`] so the token stream stays usable for diagnostics.

use serde::Serialize;
use winnow::combinator::{alt, preceded};
use winnow::prelude::*;
use winnow::token::{any, one_of};

use crate::error::{QueryError, Result};

/// Characters that keep a structural meaning unless escaped.
pub const RESERVED: [char; 10] = ['*', '|', ',', '!', '[', ']', '(', ')', '"', '\\'];

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    Letter,
    Digit,
    Dash,
    Colon,
    Underscore,
    Whitespace,
    Equal,
    Asterisk,
    Bang,
    Or,  // |
    And, // ,
    LeftBracket,
    RightBracket,
    LeftParenthesis,
    RightParenthesis,
    Ampersand,
    Dot,
    DoubleQuote,
    Escaped,
    None,
}

impl TokenKind {
    /// Kinds that carry their character verbatim into a literal.
    pub fn is_literal(self) -> bool {
        matches!(
            self,
            TokenKind::Letter
                | TokenKind::Digit
                | TokenKind::Dash
                | TokenKind::Colon
                | TokenKind::Underscore
                | TokenKind::Whitespace
                | TokenKind::Dot
                | TokenKind::Escaped
                | TokenKind::None
        )
    }

    /// Structural kinds lose their meaning between double quotes.
    fn is_structural(self) -> bool {
        matches!(
            self,
            TokenKind::Equal
                | TokenKind::Asterisk
                | TokenKind::Bang
                | TokenKind::Or
                | TokenKind::And
                | TokenKind::LeftBracket
                | TokenKind::RightBracket
                | TokenKind::LeftParenthesis
                | TokenKind::RightParenthesis
                | TokenKind::Ampersand
        )
    }
}

/// A classified, position-tagged token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw source text: one character, or `\x` for an escape sequence.
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    /// The character this token contributes to a literal.
    pub fn literal(&self) -> char {
        self.text.chars().last().unwrap_or_default()
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

// Manually define PResult for resilience against winnow version changes
type PResult<T> = std::result::Result<T, winnow::error::ErrMode<winnow::error::ContextError>>;

fn classify(c: char, quoted: bool) -> TokenKind {
    let kind = match c {
        '*' => TokenKind::Asterisk,
        '!' => TokenKind::Bang,
        '|' => TokenKind::Or,
        ',' => TokenKind::And,
        '[' => TokenKind::LeftBracket,
        ']' => TokenKind::RightBracket,
        '(' => TokenKind::LeftParenthesis,
        ')' => TokenKind::RightParenthesis,
        '"' => TokenKind::DoubleQuote,
        '=' => TokenKind::Equal,
        '&' => TokenKind::Ampersand,
        '-' => TokenKind::Dash,
        ':' => TokenKind::Colon,
        '_' => TokenKind::Underscore,
        '.' => TokenKind::Dot,
        c if c.is_whitespace() => TokenKind::Whitespace,
        c if c.is_ascii_digit() => TokenKind::Digit,
        c if c.is_alphabetic() => TokenKind::Letter,
        _ => TokenKind::None,
    };

    if quoted && kind.is_structural() {
        TokenKind::Escaped
    } else {
        kind
    }
}

/// Lex a backslash escape: `\` followed by a reserved character.
fn lex_escaped(input: &mut &str) -> PResult<TokenKind> {
    preceded('\\', one_of(RESERVED))
        .value(TokenKind::Escaped)
        .parse_next(input)
}

/// Lex a single token.
fn lex_token(input: &mut &str, quoted: bool) -> PResult<TokenKind> {
    alt((lex_escaped, any.map(move |c| classify(c, quoted)))).parse_next(input)
}

/// Tokenize the entire input.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut remaining = input;
    let mut tokens = Vec::with_capacity(input.len());
    let mut line = 1;
    let mut column = 1;
    let mut quoted = false;

    while !remaining.is_empty() {
        let start = remaining;
        let kind = match lex_token(&mut remaining, quoted) {
            Ok(kind) => kind,
            Err(_) => {
                let width = start.chars().next().map(char::len_utf8).unwrap_or(1);
                remaining = &start[width..];
                TokenKind::None
            }
        };
        let text = &start[..start.len() - remaining.len()];

        if kind == TokenKind::DoubleQuote {
            quoted = !quoted;
        }

        tokens.push(Token {
            kind,
            text: text.to_string(),
            line,
            column,
        });

        for c in text.chars() {
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
    }

    tokens
}

/// Reject token streams that cannot be read unambiguously: an unterminated
/// quoted region or a backslash with nothing left to escape.
pub fn check_lexical(tokens: &[Token]) -> Result<()> {
    let mut open_quote: Option<&Token> = None;

    for token in tokens {
        if token.is(TokenKind::DoubleQuote) {
            open_quote = match open_quote {
                Some(_) => None,
                None => Some(token),
            };
        }
    }

    if let Some(quote) = open_quote {
        return Err(QueryError::LexicalAmbiguity {
            line: quote.line,
            column: quote.column,
            message: "unterminated quoted string".into(),
        });
    }

    if let Some(last) = tokens.last() {
        if last.is(TokenKind::None) && last.text == "\\" {
            return Err(QueryError::LexicalAmbiguity {
                line: last.line,
                column: last.column,
                message: "dangling escape at end of input".into(),
            });
        }
    }

    Ok(())
}
