//! Eager plan interpreter over `serde_json::Value` records.
//!
//! Comparison follows JSON value shape: numbers compare numerically
//! across int/float, strings lexically, and `null` equals only
//! `null`. Missing members evaluate to null.

use crate::error::EvalError;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use webql_core::{AggregateKind, BinaryOp, Expr, Function, Plan, PlanValue, Projection, UnaryOp};

/// What a query produces: a record stream or one scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Rows(Vec<Value>),
    Scalar(Value),
}

type Env = BTreeMap<String, Value>;

/// Execute a plan against a slice of records.
pub fn run(plan: &Plan, records: &[Value]) -> Result<QueryOutput, EvalError> {
    let exec = Executor { records };
    match plan {
        Plan::Aggregate { .. } => Ok(QueryOutput::Scalar(exec.scalar(plan)?)),
        _ => Ok(QueryOutput::Rows(exec.rows(plan)?)),
    }
}

struct Executor<'a> {
    records: &'a [Value],
}

impl Executor<'_> {
    fn rows(&self, plan: &Plan) -> Result<Vec<Value>, EvalError> {
        match plan {
            Plan::Source => Ok(self.records.to_vec()),
            Plan::Filter {
                source,
                param,
                predicate,
            } => {
                let mut kept = Vec::new();
                for row in self.rows(source)? {
                    let mut env = Env::new();
                    env.insert(param.clone(), row.clone());
                    if as_bool(&self.expr(predicate, &env)?)? {
                        kept.push(row);
                    }
                }
                Ok(kept)
            }
            Plan::Project {
                source,
                param,
                shape,
            } => {
                let mut projected = Vec::new();
                for row in self.rows(source)? {
                    let mut env = Env::new();
                    env.insert(param.clone(), row);
                    projected.push(self.project(shape, &env)?);
                }
                Ok(projected)
            }
            Plan::Skip { source, count } => {
                let n = self.count(count)?;
                Ok(self.rows(source)?.into_iter().skip(n).collect())
            }
            Plan::Limit { source, count } => {
                let n = self.count(count)?;
                Ok(self.rows(source)?.into_iter().take(n).collect())
            }
            Plan::Aggregate { .. } => {
                // An aggregate in row position yields its scalar as a
                // single row.
                Ok(vec![self.scalar(plan)?])
            }
        }
    }

    fn scalar(&self, plan: &Plan) -> Result<Value, EvalError> {
        let Plan::Aggregate {
            kind,
            source,
            param,
            selector,
        } = plan
        else {
            return Err(EvalError::TypeError {
                message: "expected an aggregate stage".to_string(),
            });
        };
        let rows = self.rows(source)?;
        let mut values = Vec::with_capacity(rows.len());
        if let Some(selector) = selector {
            for row in &rows {
                let mut env = Env::new();
                env.insert(param.clone(), row.clone());
                values.push(self.expr(selector, &env)?);
            }
        }
        match kind {
            AggregateKind::Count => Ok(json!(rows.len())),
            AggregateKind::Any => {
                for v in &values {
                    if as_bool(v)? {
                        return Ok(json!(true));
                    }
                }
                Ok(json!(false))
            }
            AggregateKind::All => {
                for v in &values {
                    if !as_bool(v)? {
                        return Ok(json!(false));
                    }
                }
                Ok(json!(true))
            }
            AggregateKind::Sum => {
                let mut sum = 0.0;
                let mut integral = true;
                for v in &values {
                    sum += as_number(v)?;
                    integral &= v.is_i64();
                }
                Ok(render_number(sum, integral))
            }
            AggregateKind::Min | AggregateKind::Max => {
                if values.is_empty() {
                    return Err(EvalError::EmptyAggregate {
                        kind: if *kind == AggregateKind::Min {
                            "min".to_string()
                        } else {
                            "max".to_string()
                        },
                    });
                }
                let mut best = values[0].clone();
                for v in &values[1..] {
                    let ord = compare(v, &best)?;
                    let better = if *kind == AggregateKind::Min {
                        ord == std::cmp::Ordering::Less
                    } else {
                        ord == std::cmp::Ordering::Greater
                    };
                    if better {
                        best = v.clone();
                    }
                }
                Ok(best)
            }
            AggregateKind::Average => {
                if values.is_empty() {
                    return Err(EvalError::EmptyAggregate {
                        kind: "average".to_string(),
                    });
                }
                let mut sum = 0.0;
                for v in &values {
                    sum += as_number(v)?;
                }
                Ok(json!(sum / values.len() as f64))
            }
        }
    }

    fn project(&self, shape: &Projection, env: &Env) -> Result<Value, EvalError> {
        match shape {
            Projection::Expression(expr) => self.expr(expr, env),
            Projection::Construct { fields, .. } => {
                let mut object = Map::new();
                for (name, expr) in fields {
                    object.insert(name.clone(), self.expr(expr, env)?);
                }
                Ok(Value::Object(object))
            }
        }
    }

    fn count(&self, expr: &Expr) -> Result<usize, EvalError> {
        let value = self.expr(expr, &Env::new())?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| EvalError::TypeError {
                message: format!("count must be a non-negative integer, got {}", value),
            })
    }

    fn expr(&self, expr: &Expr, env: &Env) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal { value } => Ok(plan_value(value)),
            Expr::Parameter { name } => {
                env.get(name)
                    .cloned()
                    .ok_or_else(|| EvalError::UnknownParameter { name: name.clone() })
            }
            Expr::Member { base, name } => {
                let base = self.expr(base, env)?;
                Ok(base.get(name).cloned().unwrap_or(Value::Null))
            }
            Expr::Unary { op, operand } => {
                let v = self.expr(operand, env)?;
                match op {
                    UnaryOp::Not => Ok(json!(!as_bool(&v)?)),
                    UnaryOp::Negate => {
                        if let Some(n) = v.as_i64() {
                            Ok(json!(-n))
                        } else {
                            Ok(json!(-as_number(&v)?))
                        }
                    }
                }
            }
            Expr::Binary { op, left, right } => {
                let l = self.expr(left, env)?;
                let r = self.expr(right, env)?;
                self.binary(*op, &l, &r)
            }
            Expr::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|a| self.expr(a, env))
                    .collect::<Result<Vec<_>, _>>()?;
                call(*function, &args)
            }
            Expr::Construct { fields, .. } => {
                let mut object = Map::new();
                for (name, expr) in fields {
                    object.insert(name.clone(), self.expr(expr, env)?);
                }
                Ok(Value::Object(object))
            }
            Expr::Subquery { plan } => match run(plan, self.records)? {
                QueryOutput::Scalar(v) => Ok(v),
                QueryOutput::Rows(rows) => Ok(Value::Array(rows)),
            },
        }
    }

    fn binary(&self, op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
        use BinaryOp::*;
        match op {
            Equals => Ok(json!(equals(l, r))),
            NotEquals => Ok(json!(!equals(l, r))),
            Greater => Ok(json!(compare(l, r)? == std::cmp::Ordering::Greater)),
            GreaterEquals => Ok(json!(compare(l, r)? != std::cmp::Ordering::Less)),
            Less => Ok(json!(compare(l, r)? == std::cmp::Ordering::Less)),
            LessEquals => Ok(json!(compare(l, r)? != std::cmp::Ordering::Greater)),
            And => Ok(json!(as_bool(l)? && as_bool(r)?)),
            Or => Ok(json!(as_bool(l)? || as_bool(r)?)),
            Add | Subtract | Multiply | Modulo => {
                let integral = l.is_i64() && r.is_i64();
                let (a, b) = (as_number(l)?, as_number(r)?);
                if op == Modulo && b == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                let result = match op {
                    Add => a + b,
                    Subtract => a - b,
                    Multiply => a * b,
                    _ => a % b,
                };
                Ok(render_number(result, integral))
            }
            Divide => {
                let (a, b) = (as_number(l)?, as_number(r)?);
                if b == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                Ok(json!(a / b))
            }
        }
    }
}

// ──────────────────────────────────────────────
// Value helpers
// ──────────────────────────────────────────────

fn plan_value(v: &PlanValue) -> Value {
    match v {
        PlanValue::Null => Value::Null,
        PlanValue::Bool(b) => json!(b),
        PlanValue::Int(n) => json!(n),
        PlanValue::Float(n) => json!(n),
        PlanValue::Str(s) => json!(s),
    }
}

fn as_bool(v: &Value) -> Result<bool, EvalError> {
    v.as_bool().ok_or_else(|| EvalError::TypeError {
        message: format!("expected a boolean, got {}", v),
    })
}

fn as_number(v: &Value) -> Result<f64, EvalError> {
    v.as_f64().ok_or_else(|| EvalError::TypeError {
        message: format!("expected a number, got {}", v),
    })
}

fn as_str(v: &Value) -> Result<&str, EvalError> {
    v.as_str().ok_or_else(|| EvalError::TypeError {
        message: format!("expected a string, got {}", v),
    })
}

/// A whole-valued result of integer inputs renders as an integer.
fn render_number(n: f64, integral: bool) -> Value {
    if integral && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

/// Shape-directed equality: numbers numerically, null only to null.
fn equals(l: &Value, r: &Value) -> bool {
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => l == r,
    }
}

/// Ordering for numbers and strings; anything else is a type error.
fn compare(l: &Value, r: &Value) -> Result<std::cmp::Ordering, EvalError> {
    if let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) {
        return a.partial_cmp(&b).ok_or_else(|| EvalError::TypeError {
            message: "NaN is not comparable".to_string(),
        });
    }
    if let (Some(a), Some(b)) = (l.as_str(), r.as_str()) {
        return Ok(a.cmp(b));
    }
    Err(EvalError::TypeError {
        message: format!("cannot order {} against {}", l, r),
    })
}

fn call(function: Function, args: &[Value]) -> Result<Value, EvalError> {
    match function {
        Function::Lower => {
            let [s] = args else {
                return Err(EvalError::TypeError {
                    message: "lower takes one argument".to_string(),
                });
            };
            // Lowering null keeps null so missing members stay inert
            // in string predicates.
            if s.is_null() {
                return Ok(Value::Null);
            }
            Ok(json!(as_str(s)?.to_lowercase()))
        }
        Function::Contains | Function::StartsWith | Function::EndsWith => {
            let [haystack, needle] = args else {
                return Err(EvalError::TypeError {
                    message: "string predicate takes two arguments".to_string(),
                });
            };
            if haystack.is_null() || needle.is_null() {
                return Ok(json!(false));
            }
            let (h, n) = (as_str(haystack)?, as_str(needle)?);
            let result = match function {
                Function::Contains => h.contains(n),
                Function::StartsWith => h.starts_with(n),
                _ => h.ends_with(n),
            };
            Ok(json!(result))
        }
    }
}
