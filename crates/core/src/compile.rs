//! The compilation pipeline, end to end.
//!
//! Thin orchestrator: tokenize -> table-driven parse -> CST -> AST ->
//! desugar -> analyze -> translate. Grammar tables are process-wide;
//! everything per-compilation is freshly allocated, so concurrent
//! compilations share nothing mutable.

use crate::build::build_ast;
use crate::desugar::desugar;
use crate::error::CompileError;
use crate::grammar_def;
use crate::plan::Plan;
use crate::semantic::{analyze, Analysis};
use crate::translate::{translate, QueryProvider};
use crate::types::{TypeRegistry, WebqlType};
use webql_syntax::{ll1_parse, lr1_parse, tokenize, ParseOptions};

/// Which parse engine drives the front half. Both produce the same
/// tree; LL(1) is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserKind {
    #[default]
    Ll1,
    Lr1,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub parser: ParserKind,
}

/// A fully compiled query.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub plan: Plan,
    pub result_type: WebqlType,
    pub registry: TypeRegistry,
}

pub fn compile<P: QueryProvider>(
    source: &str,
    provider: &P,
    options: CompileOptions,
) -> Result<CompiledQuery, CompileError> {
    let tokens = tokenize(source)?;
    let cst = match options.parser {
        ParserKind::Ll1 => ll1_parse(
            grammar_def::ll1_table(),
            grammar_def::START,
            &tokens,
            ParseOptions::default(),
        )?,
        ParserKind::Lr1 => lr1_parse(grammar_def::lr1_table(), &tokens, ParseOptions::default())?,
    };
    let mut ast = build_ast(&cst)?;
    desugar(&mut ast);
    let analysis: Analysis = analyze(&ast)?;
    let plan = translate(&ast, &analysis, provider)?;
    let result_type = analysis.type_of(ast.root()).clone();
    Ok(CompiledQuery {
        plan,
        result_type,
        registry: analysis.registry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::Operator;
    use crate::plan::{BinaryOp, Expr};

    struct FullProvider;

    impl QueryProvider for FullProvider {
        fn supports(&self, _operator: Operator) -> bool {
            true
        }
        fn parse_identifier(&self, _raw: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn both_engines_compile_to_the_same_plan() {
        let src = r#"{"age": {"$greater": 18}, "name": {"$like": "ann"}}"#;
        let ll = compile(src, &FullProvider, CompileOptions::default()).unwrap();
        let lr = compile(
            src,
            &FullProvider,
            CompileOptions {
                parser: ParserKind::Lr1,
            },
        )
        .unwrap();
        assert_eq!(ll.plan, lr.plan);
    }

    #[test]
    fn empty_query_compiles_to_a_bare_source_scan() {
        let compiled = compile("", &FullProvider, CompileOptions::default()).unwrap();
        assert_eq!(compiled.plan, Plan::Source);
    }

    #[test]
    fn lexical_errors_surface_with_positions() {
        let err = compile(
            "{\"a\": \u{1}}",
            &FullProvider,
            CompileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Lex(_)), "got {:?}", err);
    }

    #[test]
    fn syntax_errors_surface_as_parse_errors() {
        let err = compile(r#"{"a": }"#, &FullProvider, CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)), "got {:?}", err);
    }

    #[test]
    fn semantic_errors_surface_from_analysis() {
        let err = compile(
            r#"{"$and": [1, 2]}"#,
            &FullProvider,
            CompileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Semantic(_)), "got {:?}", err);
    }

    #[test]
    fn compiled_plan_carries_the_predicate() {
        let compiled = compile(
            r#"{"age": 30}"#,
            &FullProvider,
            CompileOptions::default(),
        )
        .unwrap();
        let Plan::Filter { predicate, .. } = compiled.plan else {
            panic!();
        };
        assert!(matches!(
            predicate,
            Expr::Binary {
                op: BinaryOp::Equals,
                ..
            }
        ));
    }
}
