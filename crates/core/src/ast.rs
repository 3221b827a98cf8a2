//! Arena-allocated WebQL AST.
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`].
//! Semantic annotations (inferred types) are kept in side tables keyed
//! by id, never inside the nodes, so node equality stays structural
//! and the desugar passes can rewrite freely.

use crate::operators::Operator;

/// Index into the AST arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Str,
    Int,
    Float,
    Hex,
    Bool,
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Document root. `None` for an empty query.
    Query { expression: Option<NodeId> },
    /// A literal carrying its raw token text.
    Literal { kind: LiteralKind, raw: String },
    /// A `$`-prefixed string resolved through the scope chain.
    Reference { identifier: String },
    /// One object member: `"name": inner`.
    ScopeAccess { identifier: String, inner: NodeId },
    /// An array of expressions, ordered.
    Block { expressions: Vec<NodeId> },
    Operation {
        operator: Operator,
        operands: Vec<NodeId>,
    },
    /// A named destination introduced by `$as`. Write-once unless
    /// `writable`.
    TemporaryDeclaration {
        identifier: String,
        type_hint: Option<String>,
        value: NodeId,
        writable: bool,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId(0)
    }
}

impl Ast {
    pub fn new() -> Self {
        Ast::default()
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Replace a node in place, returning the previous value. The
    /// desugar passes rewrite by substitution so ids held elsewhere
    /// stay valid.
    pub fn replace(&mut self, id: NodeId, node: Node) -> Node {
        std::mem::replace(&mut self.nodes[id.0], node)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = id;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Human-readable one-line rendering of a subtree, used by error
    /// values to describe what was being processed.
    pub fn describe(&self, id: NodeId) -> String {
        match self.node(id) {
            Node::Query { expression: None } => "empty query".to_string(),
            Node::Query {
                expression: Some(e),
            } => format!("query({})", self.describe(*e)),
            Node::Literal { raw, .. } => raw.clone(),
            Node::Reference { identifier } => format!("${}", identifier),
            Node::ScopeAccess { identifier, inner } => {
                format!("{}: {}", identifier, self.describe(*inner))
            }
            Node::Block { expressions } => format!("[{} elements]", expressions.len()),
            Node::Operation { operator, operands } => {
                format!("{}/{}", operator, operands.len())
            }
            Node::TemporaryDeclaration { identifier, .. } => {
                format!("$as {}", identifier)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_ids_are_stable_across_replace() {
        let mut ast = Ast::new();
        let lit = ast.push(Node::Literal {
            kind: LiteralKind::Int,
            raw: "1".into(),
        });
        let access = ast.push(Node::ScopeAccess {
            identifier: "age".into(),
            inner: lit,
        });
        ast.replace(
            lit,
            Node::Literal {
                kind: LiteralKind::Int,
                raw: "2".into(),
            },
        );
        match ast.node(access) {
            Node::ScopeAccess { inner, .. } => {
                assert!(matches!(ast.node(*inner), Node::Literal { raw, .. } if raw == "2"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn describe_renders_operations_compactly() {
        let mut ast = Ast::new();
        let a = ast.push(Node::Literal {
            kind: LiteralKind::Int,
            raw: "18".into(),
        });
        let op = ast.push(Node::Operation {
            operator: Operator::Greater,
            operands: vec![a],
        });
        assert_eq!(ast.describe(op), "$greater/1");
    }
}
