//! Desugar pre-passes, applied between AST construction and semantic
//! analysis. All rewrites are idempotent: running the pass twice
//! yields the tree the first run produced.
//!
//! Passes, in order:
//! 1. *pipeline split*: root-level collection operators chain onto the
//!    implicit `$source` leaf in canonical order (filter, select,
//!    skip, limit, aggregate); remaining root members fold into the
//!    filter predicate.
//! 2. *implicit equals*: `{"field": literal}` wraps the literal in
//!    `$equals`,
//! 3. *implicit and*: several sibling members in predicate position
//!    become an explicit `$and`,
//! 4. *array-any*: `{"field": [a, b]}` in predicate position becomes a
//!    disjunction of per-element equalities.
//!
//! Object groupings inside a `$select` projection are record
//! constructors, exempt from 2-4 (the context flag threads through
//! the walk).

use crate::ast::{Ast, Node, NodeId};
use crate::operators::{Category, Operator};

/// Rewrite context. `Construct` positions (projection shapes, operand
/// values of scalar operators) are exempt from predicate rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctx {
    Predicate,
    Construct,
}

pub fn desugar(ast: &mut Ast) {
    split_pipeline(ast);
    if let Node::Query {
        expression: Some(expr),
    } = ast.node(ast.root())
    {
        walk(ast, *expr, Ctx::Predicate);
    }
}

// ──────────────────────────────────────────────
// Pass 1: pipeline split
// ──────────────────────────────────────────────

fn split_pipeline(ast: &mut Ast) {
    let Node::Query {
        expression: Some(expr),
    } = ast.node(ast.root())
    else {
        return;
    };
    let expr = *expr;

    // Already anchored onto a source: nothing to do. This is what
    // makes the pass idempotent.
    if is_anchored(ast, expr) {
        return;
    }

    let members: Vec<NodeId> = match ast.node(expr) {
        Node::Operation {
            operator: Operator::ObjectScope,
            operands,
        } => operands.clone(),
        _ => vec![expr],
    };

    let mut filter: Option<NodeId> = None;
    let mut select: Option<NodeId> = None;
    let mut skip: Option<NodeId> = None;
    let mut limit: Option<NodeId> = None;
    let mut aggregate: Option<NodeId> = None;
    let mut predicates: Vec<NodeId> = Vec::new();
    for member in members {
        match ast.node(member) {
            Node::Operation { operator, .. } => match operator {
                Operator::Filter => filter = Some(member),
                Operator::Select => select = Some(member),
                Operator::Skip => skip = Some(member),
                Operator::Limit => limit = Some(member),
                op if op.category() == Category::CollectionAggregation => {
                    aggregate = aggregate.or(Some(member));
                }
                _ => predicates.push(member),
            },
            _ => predicates.push(member),
        }
    }

    let mut chain = ast.push(Node::Operation {
        operator: Operator::Source,
        operands: Vec::new(),
    });

    // Fold loose predicate members into the filter stage.
    let predicate = match (filter, predicates.len()) {
        (Some(f), 0) => operand_of(ast, f),
        (Some(f), _) => {
            if let Some(existing) = operand_of(ast, f) {
                predicates.push(existing);
            }
            Some(ast.push(Node::Operation {
                operator: Operator::And,
                operands: predicates,
            }))
        }
        (None, 0) => None,
        (None, 1) => Some(predicates[0]),
        (None, _) => Some(ast.push(Node::Operation {
            operator: Operator::And,
            operands: predicates,
        })),
    };
    if let Some(p) = predicate {
        chain = ast.push(Node::Operation {
            operator: Operator::Filter,
            operands: vec![chain, p],
        });
    }
    for (stage, op) in [
        (select, Operator::Select),
        (skip, Operator::Skip),
        (limit, Operator::Limit),
    ] {
        if let Some(s) = stage {
            let mut operands = vec![chain];
            operands.extend(operands_of(ast, s));
            chain = ast.push(Node::Operation {
                operator: op,
                operands,
            });
        }
    }
    if let Some(a) = aggregate {
        let (op, existing) = match ast.node(a) {
            Node::Operation { operator, operands } => (*operator, operands.clone()),
            _ => unreachable!(),
        };
        // An aggregate that already names its own source is left
        // standing on it; otherwise it consumes the chain.
        let want = if op == Operator::Count { 1 } else { 2 };
        let operands = if existing.len() < want {
            let mut v = vec![chain];
            v.extend(existing);
            v
        } else {
            existing
        };
        chain = ast.push(Node::Operation {
            operator: op,
            operands,
        });
    }

    let root = ast.root();
    ast.replace(
        root,
        Node::Query {
            expression: Some(chain),
        },
    );
}

/// Whether the expression is already a pipeline standing on `$source`.
fn is_anchored(ast: &Ast, id: NodeId) -> bool {
    match ast.node(id) {
        Node::Operation {
            operator: Operator::Source,
            ..
        } => true,
        Node::Operation { operator, operands } => {
            let piped = matches!(
                operator.category(),
                Category::CollectionManipulation | Category::CollectionAggregation
            );
            piped
                && operands
                    .first()
                    .is_some_and(|first| is_anchored(ast, *first))
        }
        _ => false,
    }
}

fn operand_of(ast: &Ast, id: NodeId) -> Option<NodeId> {
    match ast.node(id) {
        Node::Operation { operands, .. } => operands.first().copied(),
        _ => None,
    }
}

fn operands_of(ast: &Ast, id: NodeId) -> Vec<NodeId> {
    match ast.node(id) {
        Node::Operation { operands, .. } => operands.clone(),
        _ => Vec::new(),
    }
}

// ──────────────────────────────────────────────
// Passes 2-4: predicate rewrites
// ──────────────────────────────────────────────

fn walk(ast: &mut Ast, id: NodeId, ctx: Ctx) {
    match ast.node(id).clone() {
        Node::ScopeAccess { inner, .. } => {
            if ctx == Ctx::Predicate {
                rewrite_member(ast, inner);
            }
            walk(ast, inner, ctx);
        }
        Node::Operation { operator, operands } => {
            if operator == Operator::ObjectScope && ctx == Ctx::Predicate {
                if operands.len() == 1 {
                    // A single-member grouping collapses to its member.
                    let child = ast.node(operands[0]).clone();
                    ast.replace(id, child);
                    walk(ast, id, ctx);
                    return;
                }
                ast.replace(
                    id,
                    Node::Operation {
                        operator: Operator::And,
                        operands: operands.clone(),
                    },
                );
                for operand in operands {
                    walk(ast, operand, Ctx::Predicate);
                }
                return;
            }
            for (i, operand) in operands.iter().enumerate() {
                walk(ast, *operand, operand_ctx(operator, i, operands.len(), ctx));
            }
        }
        Node::Block { expressions } => {
            for e in expressions {
                walk(ast, e, ctx);
            }
        }
        Node::TemporaryDeclaration { value, .. } => walk(ast, value, ctx),
        Node::Query { .. } | Node::Literal { .. } | Node::Reference { .. } => {}
    }
}

/// Context each operand of an operation is walked in.
fn operand_ctx(operator: Operator, index: usize, count: usize, current: Ctx) -> Ctx {
    use Operator::*;
    match operator {
        // Projection shapes are record constructors.
        Select if index + 1 == count => Ctx::Construct,
        // Sources and lambdas of the pipeline stay predicates.
        Select | Filter | Any | All | And | Or | Not => Ctx::Predicate,
        // A grouping that survived (record constructor) keeps its
        // surrounding context for its members.
        ObjectScope => current,
        // Scalar operand positions are plain values.
        _ => Ctx::Construct,
    }
}

/// The member-level rewrites: implicit equals and array-any.
fn rewrite_member(ast: &mut Ast, inner: NodeId) {
    match ast.node(inner).clone() {
        Node::Literal { .. } | Node::Reference { .. } => {
            let value = ast.push(ast.node(inner).clone());
            ast.replace(
                inner,
                Node::Operation {
                    operator: Operator::Equals,
                    operands: vec![value],
                },
            );
        }
        Node::Block { expressions } => {
            let alternatives: Vec<NodeId> = expressions
                .iter()
                .map(|e| {
                    ast.push(Node::Operation {
                        operator: Operator::Equals,
                        operands: vec![*e],
                    })
                })
                .collect();
            let replacement = if alternatives.len() == 1 {
                ast.node(alternatives[0]).clone()
            } else {
                Node::Operation {
                    operator: Operator::Or,
                    operands: alternatives,
                }
            };
            ast.replace(inner, replacement);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::build_ast;
    use crate::grammar_def;
    use webql_syntax::{ll1_parse, tokenize, ParseOptions};

    fn desugared(src: &str) -> Ast {
        let tokens = tokenize(src).unwrap();
        let cst = ll1_parse(
            grammar_def::ll1_table(),
            grammar_def::START,
            &tokens,
            ParseOptions::default(),
        )
        .unwrap();
        let mut ast = build_ast(&cst).unwrap();
        desugar(&mut ast);
        ast
    }

    fn root_expression(ast: &Ast) -> NodeId {
        match ast.node(ast.root()) {
            Node::Query {
                expression: Some(e),
            } => *e,
            other => panic!("unexpected root {:?}", other),
        }
    }

    /// Renders operator structure for tree comparisons.
    fn shape(ast: &Ast, id: NodeId) -> String {
        match ast.node(id) {
            Node::Literal { raw, .. } => raw.clone(),
            Node::Reference { identifier } => format!("${}", identifier),
            Node::ScopeAccess { identifier, inner } => {
                format!("{}({})", identifier, shape(ast, *inner))
            }
            Node::Block { expressions } => {
                let inner: Vec<_> = expressions.iter().map(|e| shape(ast, *e)).collect();
                format!("[{}]", inner.join(","))
            }
            Node::Operation { operator, operands } => {
                let inner: Vec<_> = operands.iter().map(|o| shape(ast, *o)).collect();
                format!("{}({})", operator, inner.join(","))
            }
            Node::TemporaryDeclaration {
                identifier, value, ..
            } => format!("as[{}]({})", identifier, shape(ast, *value)),
            Node::Query { .. } => unreachable!(),
        }
    }

    #[test]
    fn bare_predicate_anchors_on_filtered_source() {
        let ast = desugared(r#"{"age": {"$greater": 18}}"#);
        assert_eq!(
            shape(&ast, root_expression(&ast)),
            "$filter($source(),age($greater(18)))"
        );
    }

    #[test]
    fn implicit_equals_wraps_bare_literals() {
        let ast = desugared(r#"{"name": "bob"}"#);
        assert_eq!(
            shape(&ast, root_expression(&ast)),
            "$filter($source(),name($equals(bob)))"
        );
    }

    #[test]
    fn sibling_members_become_an_and() {
        let ast = desugared(r#"{"a": 1, "b": 2}"#);
        assert_eq!(
            shape(&ast, root_expression(&ast)),
            "$filter($source(),$and(a($equals(1)),b($equals(2))))"
        );
    }

    #[test]
    fn array_member_becomes_disjunction_of_equalities() {
        let ast = desugared(r#"{"tag": ["a", "b"]}"#);
        assert_eq!(
            shape(&ast, root_expression(&ast)),
            "$filter($source(),tag($or($equals(a),$equals(b))))"
        );
    }

    #[test]
    fn single_element_array_collapses_to_equals() {
        let ast = desugared(r#"{"tag": ["a"]}"#);
        assert_eq!(
            shape(&ast, root_expression(&ast)),
            "$filter($source(),tag($equals(a)))"
        );
    }

    #[test]
    fn pipeline_stages_chain_in_canonical_order() {
        let ast = desugared(
            r#"{"$limit": 10, "$skip": 2, "$select": {"n": "$item.n"}, "age": {"$less": 30}}"#,
        );
        assert_eq!(
            shape(&ast, root_expression(&ast)),
            "$limit($skip($select($filter($source(),age($less(30))),{}(n($item.n))),2),10)"
        );
    }

    #[test]
    fn projection_objects_are_exempt_from_predicate_rewrites() {
        let ast = desugared(r#"{"$select": {"n": "$item.n", "a": "$item.a"}}"#);
        // The two-member grouping stays an ObjectScope constructor and
        // its members keep their raw values.
        assert_eq!(
            shape(&ast, root_expression(&ast)),
            "$select($source(),{}(n($item.n),a($item.a)))"
        );
    }

    #[test]
    fn aggregate_at_root_consumes_the_chain() {
        let ast = desugared(r#"{"age": {"$greater": 18}, "$sum": "$item.salary"}"#);
        assert_eq!(
            shape(&ast, root_expression(&ast)),
            "$sum($filter($source(),age($greater(18))),$item.salary)"
        );
    }

    #[test]
    fn explicit_filter_absorbs_loose_predicate_members() {
        let ast = desugared(r#"{"$filter": {"a": 1}, "b": 2}"#);
        assert_eq!(
            shape(&ast, root_expression(&ast)),
            "$filter($source(),$and(b($equals(2)),a($equals(1))))"
        );
    }

    #[test]
    fn desugar_twice_equals_desugar_once() {
        for src in [
            r#"{"age": {"$greater": 18}}"#,
            r#"{"a": 1, "b": 2}"#,
            r#"{"tag": ["a", "b"]}"#,
            r#"{"$select": {"n": "$item.n"}, "x": 1}"#,
            r#"{"$limit": 5}"#,
            r#"{"age": {"$greater": 18}, "$sum": "$item.salary"}"#,
        ] {
            let once = desugared(src);
            let mut twice = once.clone();
            desugar(&mut twice);
            assert_eq!(
                shape(&once, root_expression(&once)),
                shape(&twice, root_expression(&twice)),
                "desugar not idempotent for {}",
                src
            );
        }
    }

    #[test]
    fn nested_any_lambda_is_still_a_predicate() {
        let ast = desugared(r#"{"$any": [{"a": 1}]}"#);
        // Inside $any's lambda the member rewrites still apply.
        let rendered = shape(&ast, root_expression(&ast));
        assert!(rendered.contains("$equals(1)"), "got {}", rendered);
    }
}
