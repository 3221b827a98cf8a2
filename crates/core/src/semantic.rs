//! Bottom-up semantic analysis over the desugared AST.
//!
//! Annotates every node with its inferred [`WebqlType`] in a side
//! table and interns anonymous record shapes for projections. The
//! registry write is the analyzer's only effect beyond annotation.

use crate::ast::{Ast, LiteralKind, Node, NodeId};
use crate::error::SemanticError;
use crate::operators::{Category, Operator};
use crate::scope::SemanticContext;
use crate::types::{TypeRegistry, WebqlType};
use std::collections::BTreeMap;

/// The lambda parameter every iterator operator introduces.
pub const ELEMENT_BINDING: &str = "item";

#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub types: BTreeMap<NodeId, WebqlType>,
    pub registry: TypeRegistry,
}

impl Analysis {
    pub fn type_of(&self, id: NodeId) -> &WebqlType {
        self.types.get(&id).unwrap_or(&WebqlType::Unknown)
    }
}

pub fn analyze(ast: &Ast) -> Result<Analysis, SemanticError> {
    let mut analysis = Analysis::default();
    let mut ctx = SemanticContext::root();
    let root = ast.root();
    let ty = match ast.node(root) {
        Node::Query {
            expression: Some(e),
        } => analyze_node(ast, *e, &mut ctx, &mut analysis)?,
        Node::Query { expression: None } => WebqlType::Collection(Box::new(WebqlType::Unknown)),
        _ => unreachable!("root is always a query node"),
    };
    analysis.types.insert(root, ty);
    Ok(analysis)
}

fn analyze_node(
    ast: &Ast,
    id: NodeId,
    ctx: &mut SemanticContext,
    out: &mut Analysis,
) -> Result<WebqlType, SemanticError> {
    let ty = match ast.node(id) {
        Node::Literal { kind, .. } => match kind {
            LiteralKind::Str => WebqlType::Str,
            LiteralKind::Int | LiteralKind::Hex => WebqlType::Int,
            LiteralKind::Float => WebqlType::Float,
            LiteralKind::Bool => WebqlType::Bool,
            LiteralKind::Null => WebqlType::Null,
        },
        Node::Reference { identifier } => resolve_reference(identifier, ctx, out)?,
        Node::ScopeAccess { identifier, inner } => {
            let mut child = ctx.child(identifier.clone());
            analyze_node(ast, *inner, &mut child, out)?
        }
        Node::Block { expressions } => {
            let mut child = ctx.child("block");
            let mut last = WebqlType::Null;
            for e in expressions {
                last = analyze_node(ast, *e, &mut child, out)?;
            }
            last
        }
        Node::TemporaryDeclaration {
            identifier,
            value,
            writable,
            ..
        } => {
            let ty = analyze_node(ast, *value, ctx, out)?;
            // Bound in the enclosing scope so later siblings see it.
            ctx.bind(identifier, ty.clone(), *writable)?;
            ty
        }
        Node::Operation { operator, operands } => {
            analyze_operation(ast, id, *operator, operands, ctx, out)?
        }
        Node::Query { .. } => unreachable!("queries never nest"),
    };
    out.types.insert(id, ty.clone());
    Ok(ty)
}

/// Scope-chain resolution for a (possibly dotted) reference. The first
/// segment resolves through the chain, falling back to member lookup
/// on the element binding; later segments descend through known
/// record shapes and degrade to Unknown otherwise.
fn resolve_reference(
    identifier: &str,
    ctx: &SemanticContext,
    out: &Analysis,
) -> Result<WebqlType, SemanticError> {
    let mut segments = identifier.split('.');
    let first = segments.next().unwrap_or_default();
    let mut ty = match ctx.lookup(first) {
        Some(binding) => binding.ty.clone(),
        None => match ctx.lookup(ELEMENT_BINDING) {
            // `$name` inside a lambda reads as `$item.name`.
            Some(binding) => member_type(&binding.ty, first, out),
            None => {
                return Err(SemanticError::UnresolvedIdentifier {
                    identifier: identifier.to_string(),
                    scope_chain: ctx.render_chain(),
                })
            }
        },
    };
    for segment in segments {
        ty = member_type(&ty, segment, out);
    }
    Ok(ty)
}

fn member_type(base: &WebqlType, field: &str, out: &Analysis) -> WebqlType {
    match base {
        WebqlType::Record(handle) => out
            .registry
            .shape(*handle)
            .field(field)
            .cloned()
            .unwrap_or(WebqlType::Unknown),
        _ => WebqlType::Unknown,
    }
}

fn analyze_operation(
    ast: &Ast,
    id: NodeId,
    operator: Operator,
    operands: &[NodeId],
    ctx: &mut SemanticContext,
    out: &mut Analysis,
) -> Result<WebqlType, SemanticError> {
    match operator.category() {
        Category::Relational => {
            let types = check_scalar_operands(ast, operator, operands, 2, ctx, out)?;
            if let [left, right] = types.as_slice() {
                if !left.accepts(right) && !right.accepts(left) {
                    return Err(type_mismatch(operator, left, right, ctx));
                }
            }
            Ok(WebqlType::Bool)
        }
        Category::StringRelational => {
            let types = check_scalar_operands(ast, operator, operands, 2, ctx, out)?;
            for ty in &types {
                if !WebqlType::Str.accepts(ty) {
                    return Err(SemanticError::TypeMismatch {
                        operator: operator.to_string(),
                        expected: "string".to_string(),
                        actual: ty.to_string(),
                        scope_chain: ctx.render_chain(),
                    });
                }
            }
            Ok(WebqlType::Bool)
        }
        Category::Arithmetic => {
            let want = if operator == Operator::Negate { 1 } else { 2 };
            let types = check_scalar_operands(ast, operator, operands, want, ctx, out)?;
            let mut result = WebqlType::Unknown;
            for ty in &types {
                if !ty.is_numeric() {
                    return Err(SemanticError::TypeMismatch {
                        operator: operator.to_string(),
                        expected: "numeric".to_string(),
                        actual: ty.to_string(),
                        scope_chain: ctx.render_chain(),
                    });
                }
                result = result.unify_numeric(ty);
            }
            Ok(result)
        }
        Category::Logical => {
            let min = if operator == Operator::Not { 1 } else { 2 };
            if operands.is_empty() || (operator == Operator::Not && operands.len() != 1) {
                return Err(wrong_arity(operator, min, operands.len(), ctx));
            }
            for operand in operands {
                let ty = analyze_node(ast, *operand, ctx, out)?;
                if !WebqlType::Bool.accepts(&ty) {
                    return Err(SemanticError::NotABoolean {
                        operator: operator.to_string(),
                        actual: ty.to_string(),
                        scope_chain: ctx.render_chain(),
                    });
                }
            }
            Ok(WebqlType::Bool)
        }
        Category::CollectionManipulation => {
            analyze_pipeline(ast, operator, operands, ctx, out)
        }
        Category::CollectionAggregation => {
            analyze_aggregation(ast, operator, operands, ctx, out)
        }
        Category::Semantic => match operator {
            Operator::Source => Ok(WebqlType::Collection(Box::new(WebqlType::Unknown))),
            Operator::ObjectScope => synthesize_record(ast, id, operands, ctx, out),
            // `$as` is consumed during AST construction; one reaching
            // analysis is a bare passthrough of its value.
            Operator::As => match operands {
                [value] => analyze_node(ast, *value, ctx, out),
                _ => Err(wrong_arity(operator, 1, operands.len(), ctx)),
            },
            _ => unreachable!(),
        },
    }
}

/// Scalar operator operands. An implicit left operand inside a scope
/// access satisfies a missing binary operand, so `want - 1` operands
/// are accepted for binary operators.
fn check_scalar_operands(
    ast: &Ast,
    operator: Operator,
    operands: &[NodeId],
    want: usize,
    ctx: &mut SemanticContext,
    out: &mut Analysis,
) -> Result<Vec<WebqlType>, SemanticError> {
    let acceptable = operands.len() == want || (want == 2 && operands.len() == 1);
    if !acceptable {
        return Err(wrong_arity(operator, want, operands.len(), ctx));
    }
    operands
        .iter()
        .map(|o| analyze_node(ast, *o, ctx, out))
        .collect()
}

fn analyze_pipeline(
    ast: &Ast,
    operator: Operator,
    operands: &[NodeId],
    ctx: &mut SemanticContext,
    out: &mut Analysis,
) -> Result<WebqlType, SemanticError> {
    let [source, argument] = operands else {
        return Err(wrong_arity(operator, 2, operands.len(), ctx));
    };
    let source_ty = analyze_node(ast, *source, ctx, out)?;
    let element = require_collection(operator, &source_ty, ctx)?;
    match operator {
        Operator::Filter => {
            let mut lambda = ctx.child(operator.key());
            lambda.bind(ELEMENT_BINDING, element, false)?;
            let predicate = analyze_node(ast, *argument, &mut lambda, out)?;
            if !WebqlType::Bool.accepts(&predicate) {
                return Err(SemanticError::NotABoolean {
                    operator: operator.to_string(),
                    actual: predicate.to_string(),
                    scope_chain: lambda.render_chain(),
                });
            }
            Ok(source_ty)
        }
        Operator::Select => {
            let mut lambda = ctx.child(operator.key());
            lambda.bind(ELEMENT_BINDING, element, false)?;
            let projected = analyze_node(ast, *argument, &mut lambda, out)?;
            Ok(WebqlType::Collection(Box::new(projected)))
        }
        Operator::Limit | Operator::Skip => {
            let count = analyze_node(ast, *argument, ctx, out)?;
            if !WebqlType::Int.accepts(&count) {
                return Err(SemanticError::TypeMismatch {
                    operator: operator.to_string(),
                    expected: "int".to_string(),
                    actual: count.to_string(),
                    scope_chain: ctx.render_chain(),
                });
            }
            Ok(source_ty)
        }
        _ => unreachable!(),
    }
}

fn analyze_aggregation(
    ast: &Ast,
    operator: Operator,
    operands: &[NodeId],
    ctx: &mut SemanticContext,
    out: &mut Analysis,
) -> Result<WebqlType, SemanticError> {
    if operator == Operator::Count {
        let [source] = operands else {
            return Err(wrong_arity(operator, 1, operands.len(), ctx));
        };
        let source_ty = analyze_node(ast, *source, ctx, out)?;
        require_collection(operator, &source_ty, ctx)?;
        return Ok(WebqlType::Int);
    }

    let [source, argument] = operands else {
        return Err(wrong_arity(operator, 2, operands.len(), ctx));
    };
    let source_ty = analyze_node(ast, *source, ctx, out)?;
    let element = require_collection(operator, &source_ty, ctx)?;
    let mut lambda = ctx.child(operator.key());
    lambda.bind(ELEMENT_BINDING, element, false)?;
    let argument_ty = analyze_node(ast, *argument, &mut lambda, out)?;
    match operator {
        Operator::Any | Operator::All => {
            if !WebqlType::Bool.accepts(&argument_ty) {
                return Err(SemanticError::NotABoolean {
                    operator: operator.to_string(),
                    actual: argument_ty.to_string(),
                    scope_chain: lambda.render_chain(),
                });
            }
            Ok(WebqlType::Bool)
        }
        Operator::Sum | Operator::Min | Operator::Max => {
            if !argument_ty.is_numeric() {
                return Err(SemanticError::TypeMismatch {
                    operator: operator.to_string(),
                    expected: "numeric".to_string(),
                    actual: argument_ty.to_string(),
                    scope_chain: lambda.render_chain(),
                });
            }
            Ok(argument_ty)
        }
        Operator::Average => {
            if !argument_ty.is_numeric() {
                return Err(SemanticError::TypeMismatch {
                    operator: operator.to_string(),
                    expected: "numeric".to_string(),
                    actual: argument_ty.to_string(),
                    scope_chain: lambda.render_chain(),
                });
            }
            Ok(WebqlType::Float)
        }
        _ => unreachable!(),
    }
}

/// Anonymous record synthesis for a surviving object grouping: every
/// member contributes one named field, recursively through nested
/// groupings.
fn synthesize_record(
    ast: &Ast,
    id: NodeId,
    operands: &[NodeId],
    ctx: &mut SemanticContext,
    out: &mut Analysis,
) -> Result<WebqlType, SemanticError> {
    let mut fields = Vec::with_capacity(operands.len());
    for operand in operands {
        match ast.node(*operand) {
            Node::ScopeAccess { identifier, inner } => {
                let mut child = ctx.child(identifier.clone());
                let ty = analyze_node(ast, *inner, &mut child, out)?;
                out.types.insert(*operand, ty.clone());
                fields.push((identifier.clone(), ty));
            }
            _ => {
                return Err(SemanticError::TypeMismatch {
                    operator: Operator::ObjectScope.to_string(),
                    expected: "named members".to_string(),
                    actual: ast.describe(id),
                    scope_chain: ctx.render_chain(),
                })
            }
        }
    }
    let handle = out.registry.register(fields);
    Ok(WebqlType::Record(handle))
}

fn require_collection(
    operator: Operator,
    ty: &WebqlType,
    ctx: &SemanticContext,
) -> Result<WebqlType, SemanticError> {
    match ty {
        WebqlType::Collection(element) => Ok((**element).clone()),
        WebqlType::Unknown => Ok(WebqlType::Unknown),
        other => Err(SemanticError::NotACollection {
            operator: operator.to_string(),
            actual: other.to_string(),
            scope_chain: ctx.render_chain(),
        }),
    }
}

fn wrong_arity(
    operator: Operator,
    expected: usize,
    actual: usize,
    ctx: &SemanticContext,
) -> SemanticError {
    SemanticError::WrongArity {
        operator: operator.to_string(),
        expected: expected.to_string(),
        actual,
        scope_chain: ctx.render_chain(),
    }
}

fn type_mismatch(
    operator: Operator,
    expected: &WebqlType,
    actual: &WebqlType,
    ctx: &SemanticContext,
) -> SemanticError {
    SemanticError::TypeMismatch {
        operator: operator.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
        scope_chain: ctx.render_chain(),
    }
}
