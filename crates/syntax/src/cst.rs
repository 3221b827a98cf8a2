//! Concrete syntax tree assembly.
//!
//! The builder is a stack of pending subtrees driven by a parse
//! engine's shift/reduce stream. It is per-parse state: allocate a
//! fresh builder for every compilation, never share one.

use crate::error::ParseError;
use crate::token::Token;

/// A concrete syntax tree node, mirroring grammar structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CstNode {
    Leaf {
        token: Token,
    },
    Internal {
        name: String,
        children: Vec<CstNode>,
        /// True when this node came from an epsilon reduction.
        epsilon: bool,
    },
    Root {
        name: String,
        children: Vec<CstNode>,
    },
}

impl CstNode {
    /// Grammar-symbol name of an internal or root node; `None` for leaves.
    pub fn name(&self) -> Option<&str> {
        match self {
            CstNode::Leaf { .. } => None,
            CstNode::Internal { name, .. } | CstNode::Root { name, .. } => Some(name),
        }
    }

    pub fn children(&self) -> &[CstNode] {
        match self {
            CstNode::Leaf { .. } => &[],
            CstNode::Internal { children, .. } | CstNode::Root { children, .. } => children,
        }
    }

    pub fn is_epsilon(&self) -> bool {
        matches!(self, CstNode::Internal { epsilon: true, .. })
    }

    /// Promote an internal node to a root, for engines that finish the
    /// parse without an explicit root reduction (the LR accept).
    pub fn into_root(self) -> CstNode {
        match self {
            CstNode::Internal { name, children, .. } => CstNode::Root { name, children },
            other => other,
        }
    }
}

/// Reduction-driven CST accumulator.
#[derive(Debug)]
pub struct CstBuilder {
    stack: Vec<CstNode>,
    keep_epsilon: bool,
}

impl Default for CstBuilder {
    fn default() -> Self {
        CstBuilder::new()
    }
}

impl CstBuilder {
    /// A builder that filters epsilon placeholders out of reductions.
    pub fn new() -> Self {
        CstBuilder {
            stack: Vec::new(),
            keep_epsilon: false,
        }
    }

    /// Keep epsilon placeholder nodes instead of filtering them.
    pub fn keep_epsilon(mut self, keep: bool) -> Self {
        self.keep_epsilon = keep;
        self
    }

    /// Shift: push a leaf for a matched terminal.
    pub fn add_terminal(&mut self, token: Token) {
        self.stack.push(CstNode::Leaf { token });
    }

    /// Reduce: pop the last `len` subtrees and wrap them in an internal
    /// (or root) node named after the producing non-terminal.
    pub fn reduce(
        &mut self,
        name: impl Into<String>,
        len: usize,
        is_root: bool,
    ) -> Result<(), ParseError> {
        let name = name.into();
        if self.stack.len() < len {
            return Err(ParseError::StackUnderflow {
                name,
                wanted: len,
                available: self.stack.len(),
            });
        }
        let mut children: Vec<CstNode> = self.stack.split_off(self.stack.len() - len);
        if !self.keep_epsilon {
            children.retain(|c| !c.is_epsilon());
        }
        let node = if is_root {
            CstNode::Root { name, children }
        } else {
            CstNode::Internal {
                name,
                children,
                epsilon: false,
            }
        };
        self.stack.push(node);
        Ok(())
    }

    /// Reduce an empty alternative: push a zero-child epsilon marker.
    pub fn reduce_epsilon(&mut self, name: impl Into<String>) {
        self.stack.push(CstNode::Internal {
            name: name.into(),
            children: Vec::new(),
            epsilon: true,
        });
    }

    /// The parse is well-formed only if exactly one node remains.
    pub fn build(mut self) -> Result<CstNode, ParseError> {
        if self.stack.len() != 1 {
            return Err(ParseError::IncompleteTree {
                pending: self.stack.len(),
            });
        }
        Ok(self.stack.pop().expect("one pending subtree"))
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
