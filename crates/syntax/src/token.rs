//! Token and source-position types emitted by the tokenizer.

use serde::Serialize;
use std::fmt;

/// Lexical kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum TokenKind {
    Identifier,
    Str,
    Integer,
    Float,
    Hexadecimal,
    Punctuation,
    Comment,
    EndOfInput,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Str => "string",
            TokenKind::Integer => "integer",
            TokenKind::Float => "float",
            TokenKind::Hexadecimal => "hexadecimal",
            TokenKind::Punctuation => "punctuation",
            TokenKind::Comment => "comment",
            TokenKind::EndOfInput => "end-of-input",
        };
        f.write_str(name)
    }
}

/// Byte range plus 1-based line/column of a token's first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

/// One lexical unit. Immutable once emitted.
///
/// `text` is the cooked value: string tokens carry their content with
/// the delimiters stripped and escapes resolved; every other kind
/// carries the raw source slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Token {
            kind,
            text: text.into(),
            span,
        }
    }

    /// Synthetic end-of-input marker positioned after the last character.
    pub fn end_of_input(span: Span) -> Self {
        Token::new(TokenKind::EndOfInput, "", span)
    }
}
