//! The translation target: a composable query plan.
//!
//! Everything serializes so the CLI can emit plans as JSON and a
//! backend can ship them over a wire.

use crate::types::RecordHandle;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Plan {
    /// The backend's record stream.
    Source,
    Filter {
        source: Box<Plan>,
        param: String,
        predicate: Expr,
    },
    Project {
        source: Box<Plan>,
        param: String,
        shape: Projection,
    },
    Limit {
        source: Box<Plan>,
        count: Expr,
    },
    Skip {
        source: Box<Plan>,
        count: Expr,
    },
    Aggregate {
        kind: AggregateKind,
        source: Box<Plan>,
        param: String,
        selector: Option<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Count,
    Sum,
    Min,
    Max,
    Average,
    Any,
    All,
}

/// What a projection produces per element: a single expression or an
/// anonymous record built field by field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Projection {
    Expression(Expr),
    Construct {
        record: RecordHandle,
        fields: Vec<(String, Expr)>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum Expr {
    Literal {
        value: PlanValue,
    },
    /// A bound lambda parameter or named destination.
    Parameter {
        name: String,
    },
    Member {
        base: Box<Expr>,
        name: String,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
    /// Anonymous record construction inside a projection.
    Construct {
        record: RecordHandle,
        fields: Vec<(String, Expr)>,
    },
    /// Nested pipeline used as a scalar (an aggregate inside a
    /// predicate, for instance).
    Subquery {
        plan: Box<Plan>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PlanValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Equals,
    NotEquals,
    Greater,
    GreaterEquals,
    Less,
    LessEquals,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
}

impl Expr {
    pub fn literal(value: PlanValue) -> Expr {
        Expr::Literal { value }
    }

    pub fn parameter(name: impl Into<String>) -> Expr {
        Expr::Parameter { name: name.into() }
    }

    pub fn member(base: Expr, name: impl Into<String>) -> Expr {
        Expr::Member {
            base: Box::new(base),
            name: name.into(),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(function: Function, args: Vec<Expr>) -> Expr {
        Expr::Call { function, args }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Function {
    Lower,
    Contains,
    StartsWith,
    EndsWith,
}
