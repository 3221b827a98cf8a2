//! CST -> AST construction.
//!
//! Walks the parse tree by node name (`query`, `expression`, `object`,
//! `member`, `block`, `literal`), transparent to the synthesized heads
//! macro expansion introduces (`members@rep1` and the like): member
//! and element lists are collected by a bounded descent that stops at
//! each match, so nested objects keep their own members.

use crate::ast::{Ast, LiteralKind, Node, NodeId};
use crate::error::SemanticError;
use crate::operators::Operator;
use webql_syntax::{CstNode, TokenKind};

/// Build the AST for a parsed query document.
pub fn build_ast(cst: &CstNode) -> Result<Ast, SemanticError> {
    let mut ast = Ast::new();
    let expression = match find_child(cst, "expression") {
        Some(expr) => Some(build_expression(expr, &mut ast)?),
        None => None,
    };
    let root = ast.push(Node::Query { expression });
    ast.set_root(root);
    Ok(ast)
}

fn build_expression(node: &CstNode, ast: &mut Ast) -> Result<NodeId, SemanticError> {
    let inner = &node.children()[0];
    match inner.name() {
        Some("object") => build_object(inner, ast),
        Some("block") => build_block(inner, ast),
        Some("literal") => build_literal(inner, ast),
        other => unreachable!("expression wraps object/block/literal, got {:?}", other),
    }
}

// ──────────────────────────────────────────────
// Objects and members
// ──────────────────────────────────────────────

fn build_object(node: &CstNode, ast: &mut Ast) -> Result<NodeId, SemanticError> {
    let mut member_nodes = Vec::new();
    for child in node.children() {
        collect_named(child, "member", &mut member_nodes);
    }

    let mut built: Vec<NodeId> = Vec::new();
    let mut as_name: Option<String> = None;
    let mut writable = false;
    for m in member_nodes {
        let children = m.children();
        let key = leaf_text(&children[0]);
        match key.as_str() {
            // Declaration markers attach to the enclosing entry and
            // are consumed here, not built.
            "$as" => match raw_member_value(&children[2]) {
                Some(name) => as_name = Some(name),
                None => {
                    return Err(SemanticError::UnknownOperator {
                        key: "$as (expects a string name)".to_string(),
                    })
                }
            },
            "$writable" => {
                writable = raw_member_value(&children[2]).as_deref() == Some("true");
            }
            _ => built.push(build_member_value(&key, &children[2], ast)?),
        }
    }

    let body = match built.len() {
        1 => built[0],
        _ => ast.push(Node::Operation {
            operator: Operator::ObjectScope,
            operands: built,
        }),
    };

    match as_name {
        Some(identifier) => Ok(ast.push(Node::TemporaryDeclaration {
            identifier,
            type_hint: None,
            value: body,
            writable,
        })),
        None => Ok(body),
    }
}

/// One key/value pair as an AST node: operator keys become operations
/// (an array value supplies the operand list), plain keys become scope
/// accesses.
fn build_member_value(
    key: &str,
    value: &CstNode,
    ast: &mut Ast,
) -> Result<NodeId, SemanticError> {
    if key.starts_with('$') && !key.starts_with("$$") {
        let operator = Operator::from_key(key).ok_or_else(|| SemanticError::UnknownOperator {
            key: key.to_string(),
        })?;
        let operands = match operator_operand_list(value) {
            Some(elements) => elements
                .iter()
                .map(|e| build_expression(e, ast))
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![build_expression(value, ast)?],
        };
        return Ok(ast.push(Node::Operation { operator, operands }));
    }
    // `$$` escapes a literal leading dollar in a key.
    let identifier = key.strip_prefix('$').unwrap_or(key).to_string();
    let inner = build_expression(value, ast)?;
    Ok(ast.push(Node::ScopeAccess {
        identifier,
        inner,
    }))
}

/// An operator whose value is an array takes the array's elements as
/// its operand list.
fn operator_operand_list(value: &CstNode) -> Option<Vec<&CstNode>> {
    let inner = &value.children()[0];
    if inner.name() != Some("block") {
        return None;
    }
    let mut elements = Vec::new();
    for child in inner.children() {
        collect_named(child, "expression", &mut elements);
    }
    Some(elements)
}

/// The string a keyword member carries, if its value is a plain
/// literal. Used for `$as` / `$writable`.
fn raw_member_value(value: &CstNode) -> Option<String> {
    let inner = &value.children()[0];
    if inner.name() != Some("literal") {
        return None;
    }
    Some(leaf_text(&inner.children()[0]))
}

// ──────────────────────────────────────────────
// Blocks and literals
// ──────────────────────────────────────────────

fn build_block(node: &CstNode, ast: &mut Ast) -> Result<NodeId, SemanticError> {
    let mut element_nodes = Vec::new();
    for child in node.children() {
        collect_named(child, "expression", &mut element_nodes);
    }
    let expressions = element_nodes
        .iter()
        .map(|e| build_expression(e, ast))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ast.push(Node::Block { expressions }))
}

fn build_literal(node: &CstNode, ast: &mut Ast) -> Result<NodeId, SemanticError> {
    let CstNode::Leaf { token } = &node.children()[0] else {
        unreachable!("literal wraps a single token");
    };
    let node = match token.kind {
        TokenKind::Integer => Node::Literal {
            kind: LiteralKind::Int,
            raw: token.text.clone(),
        },
        TokenKind::Float => Node::Literal {
            kind: LiteralKind::Float,
            raw: token.text.clone(),
        },
        TokenKind::Hexadecimal => Node::Literal {
            kind: LiteralKind::Hex,
            raw: token.text.clone(),
        },
        TokenKind::Identifier => match token.text.as_str() {
            "true" | "false" => Node::Literal {
                kind: LiteralKind::Bool,
                raw: token.text.clone(),
            },
            "null" => Node::Literal {
                kind: LiteralKind::Null,
                raw: token.text.clone(),
            },
            other => unreachable!("keyword literal {:?}", other),
        },
        TokenKind::Str => string_node(&token.text),
        other => unreachable!("literal token kind {:?}", other),
    };
    Ok(ast.push(node))
}

/// A string starting with `$` is a reference; `$$` escapes a literal
/// leading dollar. Dotted references stay whole and are split into
/// member accesses at translation.
fn string_node(text: &str) -> Node {
    if let Some(rest) = text.strip_prefix("$$") {
        return Node::Literal {
            kind: LiteralKind::Str,
            raw: format!("${}", rest),
        };
    }
    if let Some(identifier) = text.strip_prefix('$') {
        if !identifier.is_empty() {
            return Node::Reference {
                identifier: identifier.to_string(),
            };
        }
    }
    Node::Literal {
        kind: LiteralKind::Str,
        raw: text.to_string(),
    }
}

// ──────────────────────────────────────────────
// CST helpers
// ──────────────────────────────────────────────

/// First direct-or-nested child with the given name, not descending
/// into matches.
fn find_child<'a>(node: &'a CstNode, name: &str) -> Option<&'a CstNode> {
    for child in node.children() {
        if child.name() == Some(name) {
            return Some(child);
        }
        if let Some(found) = find_child(child, name) {
            return Some(found);
        }
    }
    None
}

/// Collect nodes named `name`, stopping at each match so nested
/// structures keep their own descendants.
fn collect_named<'a>(node: &'a CstNode, name: &str, out: &mut Vec<&'a CstNode>) {
    if node.name() == Some(name) {
        out.push(node);
        return;
    }
    for child in node.children() {
        collect_named(child, name, out);
    }
}

fn leaf_text(node: &CstNode) -> String {
    match node {
        CstNode::Leaf { token } => token.text.clone(),
        other => unreachable!("expected leaf, got {:?}", other.name()),
    }
}
