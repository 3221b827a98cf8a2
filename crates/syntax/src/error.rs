//! Error types for the grammar engine, one per phase.
//!
//! Every phase fails fast: the tokenizer stops at the first bad
//! character, table construction reports conflicts instead of picking a
//! production, and the parse engines abort on the first missing table
//! entry. Callers render these; the engine never prints.

use crate::token::{Token, TokenKind};

/// A lexical failure at an exact source position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("unexpected character '{ch}' at line {line}, column {column}")]
    UnexpectedChar { ch: char, line: u32, column: u32 },

    #[error("unterminated string literal starting at line {line}, column {column}")]
    UnterminatedString { line: u32, column: u32 },

    #[error("unterminated block comment starting at line {line}, column {column}")]
    UnterminatedComment { line: u32, column: u32 },
}

/// A malformed or ambiguous grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    /// Non-terminal name is empty, contains whitespace, or is the epsilon glyph.
    #[error("invalid non-terminal name '{name}': {reason}")]
    InvalidSymbol { name: String, reason: String },

    /// A macro symbol survived to a computation that requires plain BNF.
    #[error("unexpanded {kind} macro in productions of '{head}'")]
    UnexpandedMacro { head: String, kind: String },

    /// A body references a non-terminal with no productions.
    #[error("non-terminal '{name}' is referenced but has no productions")]
    UndefinedNonTerminal { name: String },

    /// FIRST/FIRST or FIRST/FOLLOW conflict: the grammar is not LL(1).
    #[error("LL(1) conflict on '{head}' with lookahead {lookahead}: {first:?} vs {second:?}")]
    Ll1Conflict {
        head: String,
        lookahead: String,
        first: String,
        second: String,
    },

    /// Shift/reduce or reduce/reduce collision in the ACTION table.
    #[error("LR(1) conflict in state {state} on {symbol}: {first} vs {second}")]
    Lr1Conflict {
        state: usize,
        symbol: String,
        first: String,
        second: String,
    },

    /// The grammar-definition source itself failed to parse.
    #[error("malformed grammar definition: {message}")]
    Malformed { message: String },
}

/// A parse-time failure: the table has no entry for the current
/// (state, lookahead) pair, or the reduction stack is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected {kind:?} token '{text}' at line {line}, column {column} (expanding '{context}')")]
    UnexpectedToken {
        kind: TokenKind,
        text: String,
        line: u32,
        column: u32,
        /// Non-terminal being expanded (LL) or state id (LR).
        context: String,
    },

    #[error("input ended before the parse completed (expanding '{context}')")]
    UnexpectedEnd { context: String },

    /// `CstBuilder::build` found zero or more than one pending subtree.
    #[error("incomplete concrete syntax tree: {pending} subtrees remain")]
    IncompleteTree { pending: usize },

    /// A reduction asked for more children than the stack holds.
    #[error("reduction of '{name}' needs {wanted} nodes but only {available} are stacked")]
    StackUnderflow {
        name: String,
        wanted: usize,
        available: usize,
    },
}

impl ParseError {
    pub(crate) fn unexpected(token: &Token, context: impl Into<String>) -> Self {
        ParseError::UnexpectedToken {
            kind: token.kind,
            text: token.text.clone(),
            line: token.span.line,
            column: token.span.column,
            context: context.into(),
        }
    }
}
