//! Chained lexical scopes for semantic analysis.

use crate::error::SemanticError;
use crate::types::WebqlType;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: WebqlType,
    pub writable: bool,
}

/// One lexical scope with a parent pointer. Lookup shadows outward;
/// mutation stays local, so a child never perturbs its parent.
#[derive(Debug, Clone, Default)]
pub struct SemanticContext {
    bindings: BTreeMap<String, Binding>,
    parent: Option<Box<SemanticContext>>,
    /// Label rendered in diagnostics, e.g. the operator that opened
    /// this scope.
    label: String,
}

impl SemanticContext {
    pub fn root() -> Self {
        SemanticContext {
            label: "query".to_string(),
            ..Default::default()
        }
    }

    /// A child scope; the receiver is cloned as the parent, so the
    /// caller's context is untouched by anything bound in the child.
    pub fn child(&self, label: impl Into<String>) -> Self {
        SemanticContext {
            bindings: BTreeMap::new(),
            parent: Some(Box::new(self.clone())),
            label: label.into(),
        }
    }

    pub fn lookup(&self, identifier: &str) -> Option<&Binding> {
        match self.bindings.get(identifier) {
            Some(b) => Some(b),
            None => self.parent.as_deref().and_then(|p| p.lookup(identifier)),
        }
    }

    /// Bind a name in this scope. Shadowing a parent binding is
    /// allowed; rebinding a non-writable name in the same scope is
    /// not.
    pub fn bind(
        &mut self,
        identifier: &str,
        ty: WebqlType,
        writable: bool,
    ) -> Result<(), SemanticError> {
        if let Some(existing) = self.bindings.get(identifier) {
            if !existing.writable {
                return Err(SemanticError::ReadOnlyBinding {
                    identifier: identifier.to_string(),
                    scope_chain: self.render_chain(),
                });
            }
        }
        self.bindings
            .insert(identifier.to_string(), Binding { ty, writable });
        Ok(())
    }

    /// The scope chain innermost-first, one label per scope with its
    /// bound names. Feeds semantic error diagnostics.
    pub fn render_chain(&self) -> String {
        let mut parts = Vec::new();
        let mut scope = Some(self);
        while let Some(s) = scope {
            let names: Vec<&str> = s.bindings.keys().map(String::as_str).collect();
            parts.push(format!("{}[{}]", s.label, names.join(", ")));
            scope = s.parent.as_deref();
        }
        parts.join(" -> ")
    }
}
