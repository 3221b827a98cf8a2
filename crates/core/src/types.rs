//! WebQL's inferred type lattice and the anonymous-record registry.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Stable handle into a [`TypeRegistry`]. Two structurally identical
/// record shapes intern to the same handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RecordHandle(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WebqlType {
    Bool,
    Int,
    Float,
    Str,
    Null,
    /// Not yet inferable; unifies with anything.
    Unknown,
    Collection(Box<WebqlType>),
    Record(RecordHandle),
}

impl WebqlType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, WebqlType::Int | WebqlType::Float | WebqlType::Unknown)
    }

    /// Numeric unification: mixed Int/Float widens to Float; Unknown
    /// defers to the other side.
    pub fn unify_numeric(&self, other: &WebqlType) -> WebqlType {
        match (self, other) {
            (WebqlType::Unknown, t) | (t, WebqlType::Unknown) => t.clone(),
            (WebqlType::Int, WebqlType::Int) => WebqlType::Int,
            _ => WebqlType::Float,
        }
    }

    /// Whether a value of `self` is acceptable where `other` is
    /// expected. Unknown is accepted everywhere (and accepts
    /// everything); otherwise types must match, with Int accepted as
    /// Float.
    pub fn accepts(&self, other: &WebqlType) -> bool {
        match (self, other) {
            (WebqlType::Unknown, _) | (_, WebqlType::Unknown) => true,
            (WebqlType::Float, WebqlType::Int) => true,
            (a, b) => a == b,
        }
    }

    pub fn element_type(&self) -> Option<&WebqlType> {
        match self {
            WebqlType::Collection(inner) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for WebqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebqlType::Bool => write!(f, "bool"),
            WebqlType::Int => write!(f, "int"),
            WebqlType::Float => write!(f, "float"),
            WebqlType::Str => write!(f, "string"),
            WebqlType::Null => write!(f, "null"),
            WebqlType::Unknown => write!(f, "unknown"),
            WebqlType::Collection(inner) => write!(f, "collection<{}>", inner),
            WebqlType::Record(h) => write!(f, "record#{}", h.0),
        }
    }
}

/// One anonymous record shape: field names with their types, in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordShape {
    pub fields: Vec<(String, WebqlType)>,
}

impl RecordShape {
    pub fn field(&self, name: &str) -> Option<&WebqlType> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }
}

/// Interns anonymous record shapes, keyed by the ordered field list.
/// Registration is the analyzer's only side effect beyond annotation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeRegistry {
    shapes: Vec<RecordShape>,
    #[serde(skip)]
    interned: BTreeMap<Vec<(String, WebqlType)>, RecordHandle>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    pub fn register(&mut self, fields: Vec<(String, WebqlType)>) -> RecordHandle {
        if let Some(&handle) = self.interned.get(&fields) {
            return handle;
        }
        let handle = RecordHandle(self.shapes.len());
        self.shapes.push(RecordShape {
            fields: fields.clone(),
        });
        self.interned.insert(fields, handle);
        handle
    }

    pub fn shape(&self, handle: RecordHandle) -> &RecordShape {
        &self.shapes[handle.0]
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

// WebqlType has no Ord derive (Box chains make the ordering
// surprising), but the registry key needs one.
impl PartialOrd for WebqlType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WebqlType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_shapes_intern_to_one_handle() {
        let mut reg = TypeRegistry::new();
        let a = reg.register(vec![
            ("name".into(), WebqlType::Str),
            ("age".into(), WebqlType::Int),
        ]);
        let b = reg.register(vec![
            ("name".into(), WebqlType::Str),
            ("age".into(), WebqlType::Int),
        ]);
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn field_order_distinguishes_shapes() {
        let mut reg = TypeRegistry::new();
        let a = reg.register(vec![
            ("a".into(), WebqlType::Int),
            ("b".into(), WebqlType::Str),
        ]);
        let b = reg.register(vec![
            ("b".into(), WebqlType::Str),
            ("a".into(), WebqlType::Int),
        ]);
        assert_ne!(a, b);
    }

    #[test]
    fn numeric_unification_widens_to_float() {
        assert_eq!(
            WebqlType::Int.unify_numeric(&WebqlType::Float),
            WebqlType::Float
        );
        assert_eq!(
            WebqlType::Int.unify_numeric(&WebqlType::Int),
            WebqlType::Int
        );
        assert_eq!(
            WebqlType::Unknown.unify_numeric(&WebqlType::Int),
            WebqlType::Int
        );
    }

    #[test]
    fn unknown_accepts_everything() {
        assert!(WebqlType::Unknown.accepts(&WebqlType::Str));
        assert!(WebqlType::Bool.accepts(&WebqlType::Unknown));
        assert!(!WebqlType::Bool.accepts(&WebqlType::Str));
        assert!(WebqlType::Float.accepts(&WebqlType::Int));
    }
}
