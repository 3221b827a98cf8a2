use std::fmt;

/// Errors that can occur while executing a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Operand value shape does not fit the operator.
    TypeError { message: String },
    /// A parameter name with no binding in the environment.
    UnknownParameter { name: String },
    DivisionByZero,
    /// min/max/average over an empty collection has no defined value.
    EmptyAggregate { kind: String },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::TypeError { message } => write!(f, "type error: {}", message),
            EvalError::UnknownParameter { name } => {
                write!(f, "unknown parameter '{}'", name)
            }
            EvalError::DivisionByZero => write!(f, "division by zero"),
            EvalError::EmptyAggregate { kind } => {
                write!(f, "{} over an empty collection is undefined", kind)
            }
        }
    }
}

impl std::error::Error for EvalError {}
