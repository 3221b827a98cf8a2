//! webql-core: the WebQL query compiler.
//!
//! Takes a JSON-shaped query document through the full pipeline:
//! parse (via `webql-syntax`), AST construction, desugar pre-passes,
//! semantic analysis, and translation into a backend-neutral query
//! plan. The backend is abstracted behind [`QueryProvider`].

pub mod ast;
pub mod build;
pub mod compile;
pub mod desugar;
pub mod error;
pub mod grammar_def;
pub mod operators;
pub mod plan;
pub mod scope;
pub mod semantic;
pub mod translate;
pub mod types;

pub use ast::{Ast, LiteralKind, Node, NodeId};
pub use compile::{compile, CompileOptions, CompiledQuery, ParserKind};
pub use error::{CompileError, SemanticError, TranslationError};
pub use operators::{Arity, Category, Operator};
pub use plan::{AggregateKind, BinaryOp, Expr, Function, Plan, PlanValue, Projection, UnaryOp};
pub use semantic::{analyze, Analysis, ELEMENT_BINDING};
pub use translate::{translate, QueryProvider};
pub use types::{RecordHandle, RecordShape, TypeRegistry, WebqlType};
