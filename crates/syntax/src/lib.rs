//! webql-syntax: the reusable grammar/parsing engine.
//!
//! Provides the pieces a table-driven compiler front-end needs:
//!
//! - [`tokenize()`] -- finite-state tokenizer over a character stream
//! - [`Grammar`] -- terminals, non-terminals, EBNF macros, productions
//! - [`Ll1Table`] -- FIRST/FOLLOW sets and the LL(1) parsing table
//! - [`Lr1Table`] -- canonical LR(1) collection and ACTION/GOTO tables
//! - [`CstBuilder`] -- reduction-driven concrete syntax tree assembly
//! - [`ll1_parse()`] / [`lr1_parse()`] -- the two parse engines
//! - [`parse_grammar()`] -- self-hosted BNF grammar-definition front-end
//!
//! The engine knows nothing about WebQL; the query compiler in
//! `webql-core` is one client, the BNF front-end in [`bnf`] is another.

pub mod bnf;
pub mod chars;
pub mod cst;
pub mod engine;
pub mod error;
pub mod grammar;
pub mod ll1;
pub mod lr1;
pub mod token;
pub mod tokenizer;

// ── Convenience re-exports: key types ────────────────────────────────

pub use cst::{CstBuilder, CstNode};
pub use error::{GrammarError, LexError, ParseError};
pub use grammar::{Grammar, MacroKind, Production, Sentence, Symbol};
pub use token::{Span, Token, TokenKind};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use bnf::parse_grammar;
pub use engine::{ll1_parse, lr1_parse, ParseOptions};
pub use ll1::{compute_first_sets, compute_follow_sets, Ll1Table};
pub use lr1::{canonical_collection, Lr1Automaton, Lr1Table};
pub use tokenizer::{tokenize, Tokenizer};
