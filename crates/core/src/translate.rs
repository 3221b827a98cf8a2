//! AST -> plan synthesis, mirroring the analyzer's bottom-up shape.
//!
//! The translator is parameterized by a [`QueryProvider`]: the
//! backend's capability surface. Lambda parameters and `$as`
//! destinations live in a binding table scoped to the lambda or block
//! that introduced them.

use crate::ast::{Ast, LiteralKind, Node, NodeId};
use crate::error::TranslationError;
use crate::operators::{Category, Operator};
use crate::plan::{
    AggregateKind, BinaryOp, Expr, Function, Plan, PlanValue, Projection, UnaryOp,
};
use crate::semantic::{Analysis, ELEMENT_BINDING};
use crate::types::WebqlType;
use std::collections::BTreeMap;

/// What a query-executing backend can do.
pub trait QueryProvider {
    /// Whether the backend implements this operator.
    fn supports(&self, operator: Operator) -> bool;

    /// The equality-on-identifier hook: given the text of a literal
    /// compared against a key-like member, return the backend's
    /// canonical key form if the text parses as one.
    fn parse_identifier(&self, raw: &str) -> Option<String>;
}

/// Translate the analyzed, desugared AST into a plan.
pub fn translate<P: QueryProvider>(
    ast: &Ast,
    analysis: &Analysis,
    provider: &P,
) -> Result<Plan, TranslationError> {
    let translator = Translator {
        ast,
        analysis,
        provider,
    };
    match ast.node(ast.root()) {
        Node::Query { expression: None } => Ok(Plan::Source),
        Node::Query {
            expression: Some(e),
        } => translator.plan(*e),
        _ => unreachable!("root is always a query node"),
    }
}

/// Scoped binding environment: name -> (bound expression, writable).
#[derive(Debug, Clone, Default)]
struct Env {
    bindings: BTreeMap<String, (Expr, bool)>,
    /// Implicit left operand for binary operators inside a scope
    /// access, as a member chain on the lambda parameter.
    base: Option<Expr>,
}

impl Env {
    fn lambda() -> Env {
        Env {
            bindings: BTreeMap::from([(
                ELEMENT_BINDING.to_string(),
                (Expr::parameter(ELEMENT_BINDING), false),
            )]),
            base: None,
        }
    }

    fn bind(
        &mut self,
        name: &str,
        expr: Expr,
        writable: bool,
        subtree: String,
    ) -> Result<(), TranslationError> {
        if let Some((_, false)) = self.bindings.get(name) {
            return Err(TranslationError::UnsupportedShape {
                subtree,
                message: format!("'{}' is already bound read-only", name),
            });
        }
        self.bindings.insert(name.to_string(), (expr, writable));
        Ok(())
    }
}

struct Translator<'a, P> {
    ast: &'a Ast,
    analysis: &'a Analysis,
    provider: &'a P,
}

impl<'a, P: QueryProvider> Translator<'a, P> {
    fn describe(&self, id: NodeId) -> String {
        self.ast.describe(id)
    }

    fn require(&self, operator: Operator, at: NodeId) -> Result<(), TranslationError> {
        if self.provider.supports(operator) {
            Ok(())
        } else {
            Err(TranslationError::MissingCapability {
                operator: operator.to_string(),
                subtree: self.describe(at),
            })
        }
    }

    // ── Pipeline stages ──────────────────────────────────────────────

    fn plan(&self, id: NodeId) -> Result<Plan, TranslationError> {
        let Node::Operation { operator, operands } = self.ast.node(id) else {
            return Err(TranslationError::UnsupportedShape {
                subtree: self.describe(id),
                message: "expected a pipeline operation".to_string(),
            });
        };
        self.require(*operator, id)?;
        match operator {
            Operator::Source => Ok(Plan::Source),
            Operator::Filter => {
                let [source, predicate] = operands.as_slice() else {
                    return self.shape_err(id, "filter takes a source and a predicate");
                };
                let mut env = Env::lambda();
                Ok(Plan::Filter {
                    source: Box::new(self.plan(*source)?),
                    param: ELEMENT_BINDING.to_string(),
                    predicate: self.expr(*predicate, &mut env)?,
                })
            }
            Operator::Select => {
                let [source, projection] = operands.as_slice() else {
                    return self.shape_err(id, "select takes a source and a projection");
                };
                let mut env = Env::lambda();
                Ok(Plan::Project {
                    source: Box::new(self.plan(*source)?),
                    param: ELEMENT_BINDING.to_string(),
                    shape: self.projection(*projection, &mut env)?,
                })
            }
            Operator::Limit | Operator::Skip => {
                let [source, count] = operands.as_slice() else {
                    return self.shape_err(id, "limit/skip take a source and a count");
                };
                let source = Box::new(self.plan(*source)?);
                let count = self.expr(*count, &mut Env::default())?;
                Ok(match operator {
                    Operator::Limit => Plan::Limit { source, count },
                    _ => Plan::Skip { source, count },
                })
            }
            op if op.category() == Category::CollectionAggregation => {
                let (source, selector) = match operands.as_slice() {
                    [source] => (*source, None),
                    [source, selector] => (*source, Some(*selector)),
                    _ => return self.shape_err(id, "aggregate takes a source and a selector"),
                };
                let selector = match selector {
                    Some(s) => Some(self.expr(s, &mut Env::lambda())?),
                    None => None,
                };
                Ok(Plan::Aggregate {
                    kind: aggregate_kind(*op),
                    source: Box::new(self.plan(source)?),
                    param: ELEMENT_BINDING.to_string(),
                    selector,
                })
            }
            _ => Err(TranslationError::UnsupportedShape {
                subtree: self.describe(id),
                message: format!("{} is not a pipeline stage", operator),
            }),
        }
    }

    fn shape_err<T>(&self, id: NodeId, message: &str) -> Result<T, TranslationError> {
        Err(TranslationError::UnsupportedShape {
            subtree: self.describe(id),
            message: message.to_string(),
        })
    }

    /// Projection shapes: an object grouping becomes a record
    /// constructor matching the analyzer's synthesized type
    /// field-for-field; anything else projects a single expression.
    fn projection(
        &self,
        id: NodeId,
        env: &mut Env,
    ) -> Result<Projection, TranslationError> {
        match self.ast.node(id) {
            Node::Operation {
                operator: Operator::ObjectScope,
                operands,
            } => {
                let WebqlType::Record(handle) = self.analysis.type_of(id) else {
                    return self.shape_err(id, "projection grouping has no record type");
                };
                let shape = self.analysis.registry.shape(*handle);
                let mut fields = Vec::with_capacity(operands.len());
                for operand in operands {
                    let Node::ScopeAccess { identifier, inner } = self.ast.node(*operand)
                    else {
                        return self.shape_err(*operand, "projection members must be named");
                    };
                    if shape.field(identifier).is_none() {
                        return Err(TranslationError::InconsistentRecord {
                            field: identifier.clone(),
                            subtree: self.describe(id),
                        });
                    }
                    let value = match self.ast.node(*inner) {
                        // Nested groupings construct nested records.
                        Node::Operation {
                            operator: Operator::ObjectScope,
                            ..
                        } => match self.projection(*inner, env)? {
                            Projection::Construct { record, fields } => {
                                Expr::Construct { record, fields }
                            }
                            Projection::Expression(e) => e,
                        },
                        _ => self.expr(*inner, env)?,
                    };
                    fields.push((identifier.clone(), value));
                }
                Ok(Projection::Construct {
                    record: *handle,
                    fields,
                })
            }
            _ => Ok(Projection::Expression(self.expr(id, env)?)),
        }
    }

    // ── Scalar expressions ───────────────────────────────────────────

    fn expr(&self, id: NodeId, env: &mut Env) -> Result<Expr, TranslationError> {
        match self.ast.node(id) {
            Node::Literal { kind, raw } => self.literal(id, *kind, raw),
            Node::Reference { identifier } => self.reference(id, identifier, env),
            Node::ScopeAccess { identifier, inner } => {
                let parent = env.base.clone();
                let base = match parent.clone() {
                    Some(b) => Expr::member(b, identifier.clone()),
                    None => Expr::member(
                        Expr::parameter(ELEMENT_BINDING),
                        identifier.clone(),
                    ),
                };
                env.base = Some(base);
                let result = self.expr(*inner, env);
                env.base = parent;
                result
            }
            Node::Block { expressions } => {
                // Declarations bind for later siblings; the block's
                // value is its last expression.
                let mut scope = env.clone();
                let mut last = Expr::literal(PlanValue::Null);
                for e in expressions {
                    last = self.expr(*e, &mut scope)?;
                }
                Ok(last)
            }
            Node::TemporaryDeclaration {
                identifier,
                value,
                writable,
                ..
            } => {
                let bound = self.expr(*value, env)?;
                env.bind(identifier, bound.clone(), *writable, self.describe(id))?;
                Ok(bound)
            }
            Node::Operation { operator, operands } => {
                self.operation(id, *operator, operands, env)
            }
            Node::Query { .. } => unreachable!("queries never nest"),
        }
    }

    fn literal(
        &self,
        id: NodeId,
        kind: LiteralKind,
        raw: &str,
    ) -> Result<Expr, TranslationError> {
        let value = match kind {
            LiteralKind::Str => PlanValue::Str(raw.to_string()),
            LiteralKind::Bool => PlanValue::Bool(raw == "true"),
            LiteralKind::Null => PlanValue::Null,
            LiteralKind::Int => PlanValue::Int(raw.parse().map_err(|_| {
                TranslationError::UnsupportedShape {
                    subtree: self.describe(id),
                    message: "integer literal out of range".to_string(),
                }
            })?),
            LiteralKind::Hex => {
                let digits = raw.trim_start_matches("0x").trim_start_matches("0X");
                PlanValue::Int(i64::from_str_radix(digits, 16).map_err(|_| {
                    TranslationError::UnsupportedShape {
                        subtree: self.describe(id),
                        message: "hexadecimal literal out of range".to_string(),
                    }
                })?)
            }
            LiteralKind::Float => PlanValue::Float(raw.parse().map_err(|_| {
                TranslationError::UnsupportedShape {
                    subtree: self.describe(id),
                    message: "malformed float literal".to_string(),
                }
            })?),
        };
        Ok(Expr::literal(value))
    }

    fn reference(
        &self,
        id: NodeId,
        identifier: &str,
        env: &Env,
    ) -> Result<Expr, TranslationError> {
        let mut segments = identifier.split('.');
        let first = segments.next().unwrap_or_default();
        let mut expr = match env.bindings.get(first) {
            Some((bound, _)) => bound.clone(),
            None => match env.bindings.get(ELEMENT_BINDING) {
                // `$name` inside a lambda reads as `$item.name`.
                Some((item, _)) => Expr::member(item.clone(), first),
                None => {
                    return Err(TranslationError::UnboundParameter {
                        identifier: identifier.to_string(),
                        subtree: self.describe(id),
                    })
                }
            },
        };
        for segment in segments {
            expr = Expr::member(expr, segment);
        }
        Ok(expr)
    }

    fn operation(
        &self,
        id: NodeId,
        operator: Operator,
        operands: &[NodeId],
        env: &mut Env,
    ) -> Result<Expr, TranslationError> {
        self.require(operator, id)?;
        match operator.category() {
            Category::CollectionManipulation | Category::CollectionAggregation => {
                // A pipeline used in scalar position nests as a
                // subquery.
                Ok(Expr::Subquery {
                    plan: Box::new(self.plan(id)?),
                })
            }
            Category::Logical => match operator {
                Operator::Not => {
                    let [operand] = operands else {
                        return self.shape_err(id, "$not takes one operand");
                    };
                    Ok(Expr::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(self.expr(*operand, env)?),
                    })
                }
                _ => {
                    let op = if operator == Operator::And {
                        BinaryOp::And
                    } else {
                        BinaryOp::Or
                    };
                    let mut exprs = operands.iter().map(|o| self.expr(*o, env));
                    let first = exprs.next().transpose()?.ok_or_else(|| {
                        TranslationError::UnsupportedShape {
                            subtree: self.describe(id),
                            message: format!("{} needs at least one operand", operator),
                        }
                    })?;
                    exprs.try_fold(first, |acc, next| Ok(Expr::binary(op, acc, next?)))
                }
            },
            Category::Relational => {
                let (left, right) = self.binary_operands(id, operands, env)?;
                let right = self.apply_identifier_hook(operator, &left, right);
                Ok(Expr::binary(relational_op(operator), left, right))
            }
            Category::StringRelational => {
                let (left, right) = self.binary_operands(id, operands, env)?;
                let function = match operator {
                    Operator::Like => Function::Contains,
                    Operator::StartsWith => Function::StartsWith,
                    _ => Function::EndsWith,
                };
                // Case-insensitive by construction.
                Ok(Expr::call(
                    function,
                    vec![
                        Expr::call(Function::Lower, vec![left]),
                        Expr::call(Function::Lower, vec![right]),
                    ],
                ))
            }
            Category::Arithmetic => match operator {
                Operator::Negate => {
                    let [operand] = operands else {
                        return self.shape_err(id, "$negate takes one operand");
                    };
                    Ok(Expr::Unary {
                        op: UnaryOp::Negate,
                        operand: Box::new(self.expr(*operand, env)?),
                    })
                }
                _ => {
                    let (left, right) = self.binary_operands(id, operands, env)?;
                    Ok(Expr::binary(arithmetic_op(operator), left, right))
                }
            },
            Category::Semantic => match operator {
                Operator::As => match operands {
                    [value] => self.expr(*value, env),
                    _ => self.shape_err(id, "$as takes one operand"),
                },
                _ => self.shape_err(id, "grouping outside a projection"),
            },
        }
    }

    /// Resolve a binary operator's operands; a single operand takes
    /// the enclosing scope access's member chain as the implicit left
    /// side.
    fn binary_operands(
        &self,
        id: NodeId,
        operands: &[NodeId],
        env: &mut Env,
    ) -> Result<(Expr, Expr), TranslationError> {
        match operands {
            [right] => {
                let left = env.base.clone().ok_or_else(|| {
                    TranslationError::UnsupportedShape {
                        subtree: self.describe(id),
                        message: "no implicit left operand in this position".to_string(),
                    }
                })?;
                // The member chain belongs to the left side only.
                let saved = env.base.take();
                let right = self.expr(*right, env);
                env.base = saved;
                Ok((left, right?))
            }
            [left, right] => {
                let saved = env.base.take();
                let result = self
                    .expr(*left, env)
                    .and_then(|l| Ok((l, self.expr(*right, env)?)));
                env.base = saved;
                result
            }
            _ => self.shape_err(id, "binary operator takes one or two operands"),
        }
    }

    /// Equality against a key-named member: if the backend can parse
    /// the literal as an identifier, substitute the parsed form.
    fn apply_identifier_hook(&self, operator: Operator, left: &Expr, right: Expr) -> Expr {
        if operator != Operator::Equals && operator != Operator::NotEquals {
            return right;
        }
        let Expr::Member { name, .. } = left else {
            return right;
        };
        if !name.to_ascii_lowercase().ends_with("id") {
            return right;
        }
        match &right {
            Expr::Literal {
                value: PlanValue::Str(raw),
            } => match self.provider.parse_identifier(raw) {
                Some(parsed) => Expr::literal(PlanValue::Str(parsed)),
                None => right,
            },
            _ => right,
        }
    }
}

fn aggregate_kind(operator: Operator) -> AggregateKind {
    match operator {
        Operator::Count => AggregateKind::Count,
        Operator::Sum => AggregateKind::Sum,
        Operator::Min => AggregateKind::Min,
        Operator::Max => AggregateKind::Max,
        Operator::Average => AggregateKind::Average,
        Operator::Any => AggregateKind::Any,
        Operator::All => AggregateKind::All,
        _ => unreachable!("not an aggregation"),
    }
}

fn relational_op(operator: Operator) -> BinaryOp {
    match operator {
        Operator::Equals => BinaryOp::Equals,
        Operator::NotEquals => BinaryOp::NotEquals,
        Operator::Greater => BinaryOp::Greater,
        Operator::GreaterEquals => BinaryOp::GreaterEquals,
        Operator::Less => BinaryOp::Less,
        _ => BinaryOp::LessEquals,
    }
}

fn arithmetic_op(operator: Operator) -> BinaryOp {
    match operator {
        Operator::Add => BinaryOp::Add,
        Operator::Subtract => BinaryOp::Subtract,
        Operator::Multiply => BinaryOp::Multiply,
        Operator::Divide => BinaryOp::Divide,
        _ => BinaryOp::Modulo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::build_ast;
    use crate::desugar::desugar;
    use crate::grammar_def;
    use crate::semantic::analyze;
    use webql_syntax::{ll1_parse, tokenize, ParseOptions};

    struct FullProvider;

    impl QueryProvider for FullProvider {
        fn supports(&self, _operator: Operator) -> bool {
            true
        }
        fn parse_identifier(&self, raw: &str) -> Option<String> {
            raw.strip_prefix("0x").map(str::to_ascii_lowercase)
        }
    }

    struct NoAggregates;

    impl QueryProvider for NoAggregates {
        fn supports(&self, operator: Operator) -> bool {
            operator.category() != Category::CollectionAggregation
        }
        fn parse_identifier(&self, _raw: &str) -> Option<String> {
            None
        }
    }

    fn plan_for<P: QueryProvider>(src: &str, provider: &P) -> Result<Plan, TranslationError> {
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
        let analysis = analyze(&ast).unwrap();
        translate(&ast, &analysis, provider)
    }

    #[test]
    fn bare_predicate_translates_to_a_filter_over_source() {
        let plan = plan_for(r#"{"age": {"$greater": 18}}"#, &FullProvider).unwrap();
        let Plan::Filter {
            source, predicate, ..
        } = plan
        else {
            panic!();
        };
        assert_eq!(*source, Plan::Source);
        assert_eq!(
            predicate,
            Expr::binary(
                BinaryOp::Greater,
                Expr::member(Expr::parameter("item"), "age"),
                Expr::literal(PlanValue::Int(18)),
            )
        );
    }

    #[test]
    fn like_lowers_both_sides_into_contains() {
        let plan = plan_for(r#"{"name": {"$like": "ann"}}"#, &FullProvider).unwrap();
        let Plan::Filter { predicate, .. } = plan else {
            panic!();
        };
        let Expr::Call { function, args } = predicate else {
            panic!("expected call, got {:?}", predicate);
        };
        assert_eq!(function, Function::Contains);
        assert!(matches!(
            &args[0],
            Expr::Call {
                function: Function::Lower,
                ..
            }
        ));
        assert!(matches!(
            &args[1],
            Expr::Call {
                function: Function::Lower,
                ..
            }
        ));
    }

    #[test]
    fn projection_constructs_the_synthesized_record() {
        let plan =
            plan_for(r#"{"$select": {"n": "$item.name", "a": 1}}"#, &FullProvider).unwrap();
        let Plan::Project { shape, .. } = plan else {
            panic!();
        };
        let Projection::Construct { fields, .. } = shape else {
            panic!();
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].0, "n");
        assert_eq!(
            fields[0].1,
            Expr::member(Expr::parameter("item"), "name")
        );
        assert_eq!(fields[1].1, Expr::literal(PlanValue::Int(1)));
    }

    #[test]
    fn missing_capability_names_the_operator() {
        let err = plan_for(r#"{"$sum": "$item.n"}"#, &NoAggregates).unwrap_err();
        match err {
            TranslationError::MissingCapability { operator, .. } => {
                assert_eq!(operator, "$sum");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn identifier_hook_rewrites_key_equality_literals() {
        let plan = plan_for(r#"{"userId": "0xAB12"}"#, &FullProvider).unwrap();
        let Plan::Filter { predicate, .. } = plan else {
            panic!();
        };
        let Expr::Binary { right, .. } = predicate else {
            panic!();
        };
        assert_eq!(*right, Expr::literal(PlanValue::Str("ab12".into())));
    }

    #[test]
    fn non_key_members_keep_their_literals() {
        let plan = plan_for(r#"{"name": "0xAB12"}"#, &FullProvider).unwrap();
        let Plan::Filter { predicate, .. } = plan else {
            panic!();
        };
        let Expr::Binary { right, .. } = predicate else {
            panic!();
        };
        assert_eq!(*right, Expr::literal(PlanValue::Str("0xAB12".into())));
    }

    #[test]
    fn declarations_bind_for_translation_too() {
        let plan = plan_for(
            r#"[{"$multiply": [2, 3], "$as": "bound"}, {"$greater": ["$bound", 5]}]"#,
            &FullProvider,
        )
        .unwrap();
        let Plan::Filter { predicate, .. } = plan else {
            panic!();
        };
        let Expr::Binary { op, left, .. } = predicate else {
            panic!();
        };
        assert_eq!(op, BinaryOp::Greater);
        assert!(matches!(
            *left,
            Expr::Binary {
                op: BinaryOp::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn pipeline_stages_nest_in_canonical_order() {
        let plan = plan_for(
            r#"{"$limit": 10, "$skip": 2, "age": {"$less": 30}}"#,
            &FullProvider,
        )
        .unwrap();
        let Plan::Limit { source, .. } = plan else {
            panic!();
        };
        let Plan::Skip { source, .. } = *source else {
            panic!();
        };
        assert!(matches!(*source, Plan::Filter { .. }));
    }
}
