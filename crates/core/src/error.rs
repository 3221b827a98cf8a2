//! Compiler error taxonomy.
//!
//! One enum per phase; every phase fails fast and propagates with `?`.
//! [`CompileError`] is the top-level wrapper the orchestrator returns.

use thiserror::Error;
use webql_syntax::{GrammarError, LexError, ParseError};

/// Analysis-time failure. Variants carry the rendered scope chain
/// (innermost first) where a scope was in play.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticError {
    #[error("unknown operator '{key}'")]
    UnknownOperator { key: String },

    #[error("{operator} expects {expected} operand(s), got {actual} (in {scope_chain})")]
    WrongArity {
        operator: String,
        expected: String,
        actual: usize,
        scope_chain: String,
    },

    #[error("{operator}: expected {expected}, got {actual} (in {scope_chain})")]
    TypeMismatch {
        operator: String,
        expected: String,
        actual: String,
        scope_chain: String,
    },

    #[error("unresolved identifier '{identifier}' (in {scope_chain})")]
    UnresolvedIdentifier {
        identifier: String,
        scope_chain: String,
    },

    #[error("'{identifier}' is bound read-only (in {scope_chain})")]
    ReadOnlyBinding {
        identifier: String,
        scope_chain: String,
    },

    #[error("{operator} requires a collection source, got {actual} (in {scope_chain})")]
    NotACollection {
        operator: String,
        actual: String,
        scope_chain: String,
    },

    #[error("{operator} requires boolean operands, got {actual} (in {scope_chain})")]
    NotABoolean {
        operator: String,
        actual: String,
        scope_chain: String,
    },
}

/// Synthesis-time failure. Carries a one-line description of the AST
/// subtree being translated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslationError {
    #[error("backend does not support {operator} (while translating {subtree})")]
    MissingCapability { operator: String, subtree: String },

    #[error("parameter '{identifier}' is not bound (while translating {subtree})")]
    UnboundParameter { identifier: String, subtree: String },

    #[error("field '{field}' is missing from the synthesized record (while translating {subtree})")]
    InconsistentRecord { field: String, subtree: String },

    #[error("cannot translate {subtree}: {message}")]
    UnsupportedShape { subtree: String, message: String },
}

/// Top-level compilation error: any phase's failure, unmodified.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("lexical error: {0}")]
    Lex(#[from] LexError),

    #[error("grammar error: {0}")]
    Grammar(#[from] GrammarError),

    #[error("syntax error: {0}")]
    Parse(#[from] ParseError),

    #[error("semantic error: {0}")]
    Semantic(#[from] SemanticError),

    #[error("translation error: {0}")]
    Translation(#[from] TranslationError),
}
