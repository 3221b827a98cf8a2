//! webql-eval: the reference in-memory backend.
//!
//! Executes translated plans eagerly against a slice of
//! `serde_json::Value` records. Exists so the compiler's round-trip
//! behavior is testable without a real storage backend; semantics here
//! define what any backend must produce.

pub mod error;
pub mod exec;
pub mod provider;

pub use error::EvalError;
pub use exec::{run, QueryOutput};
pub use provider::MemoryProvider;
