//! Table-driven parse engines.
//!
//! Both engines consume a token slice and drive a [`CstBuilder`]
//! through shift/reduce events, so a parse produces the same tree
//! shape regardless of which engine ran it. Comment tokens are
//! transparent. A missing table entry aborts the parse immediately --
//! there is no recovery.

use crate::cst::{CstBuilder, CstNode};
use crate::error::ParseError;
use crate::ll1::Ll1Table;
use crate::lr1::{Lr1Action, Lr1Table};
use crate::token::{Token, TokenKind};

/// Tree-shape options shared by both engines.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Keep epsilon placeholder nodes in the tree.
    pub keep_epsilon: bool,
}

// ──────────────────────────────────────────────
// LL(1) engine
// ──────────────────────────────────────────────

/// Work stack entry: a grammar symbol still to match/expand, or a
/// pending reduction for an already-expanded production.
enum Work {
    Terminal {
        kind: TokenKind,
        value: Option<String>,
    },
    NonTerminal(String),
    Reduce {
        name: String,
        len: usize,
        is_root: bool,
    },
}

/// Predictive table-driven parse from `start`.
pub fn ll1_parse(
    table: &Ll1Table,
    start: &str,
    tokens: &[Token],
    options: ParseOptions,
) -> Result<CstNode, ParseError> {
    use crate::grammar::Symbol;

    let mut builder = CstBuilder::new().keep_epsilon(options.keep_epsilon);
    let mut input = tokens.iter().filter(|t| t.kind != TokenKind::Comment);
    let mut lookahead = input.next();

    let mut stack: Vec<Work> = vec![Work::NonTerminal(start.to_string())];

    while let Some(work) = stack.pop() {
        match work {
            Work::Terminal { kind, value } => {
                let token = lookahead.ok_or_else(|| ParseError::UnexpectedEnd {
                    context: kind.to_string(),
                })?;
                let matches =
                    token.kind == kind && value.as_deref().is_none_or(|v| v == token.text);
                if !matches {
                    return Err(ParseError::unexpected(
                        token,
                        value.unwrap_or_else(|| kind.to_string()),
                    ));
                }
                builder.add_terminal(token.clone());
                lookahead = input.next();
            }
            Work::NonTerminal(name) => {
                let token = lookahead.ok_or_else(|| ParseError::UnexpectedEnd {
                    context: name.clone(),
                })?;
                let production = table
                    .lookup(&name, token)
                    .ok_or_else(|| ParseError::unexpected(token, &name))?;
                if production.is_epsilon() {
                    builder.reduce_epsilon(&name);
                    continue;
                }
                // The reduction fires after every body symbol has
                // produced its subtree; stack order makes that so.
                let is_root = stack.is_empty();
                stack.push(Work::Reduce {
                    name: name.clone(),
                    len: production.body.len(),
                    is_root,
                });
                for symbol in production.body.iter().rev() {
                    match symbol {
                        Symbol::Terminal { kind, value } => stack.push(Work::Terminal {
                            kind: *kind,
                            value: value.clone(),
                        }),
                        Symbol::NonTerminal(n) => stack.push(Work::NonTerminal(n.clone())),
                        Symbol::Epsilon => {
                            // Normalized grammars keep epsilon alone in
                            // a body; a mixed one contributes nothing.
                        }
                        Symbol::EndOfInput => stack.push(Work::Terminal {
                            kind: TokenKind::EndOfInput,
                            value: None,
                        }),
                        Symbol::Macro { .. } => {
                            unreachable!("macro symbol survived table construction")
                        }
                    }
                }
            }
            Work::Reduce { name, len, is_root } => {
                builder.reduce(name, len, is_root)?;
            }
        }
    }

    match lookahead {
        Some(t) if t.kind != TokenKind::EndOfInput => {
            Err(ParseError::unexpected(t, "end of input"))
        }
        _ => builder.build(),
    }
}

// ──────────────────────────────────────────────
// LR(1) engine
// ──────────────────────────────────────────────

/// Classic LR driver over the ACTION/GOTO tables.
pub fn lr1_parse(
    table: &Lr1Table,
    tokens: &[Token],
    options: ParseOptions,
) -> Result<CstNode, ParseError> {
    let mut builder = CstBuilder::new().keep_epsilon(options.keep_epsilon);
    let mut input = tokens
        .iter()
        .filter(|t| t.kind != TokenKind::Comment)
        .peekable();
    let mut states: Vec<usize> = vec![0];

    loop {
        let state = *states.last().expect("state stack is never empty");
        let token = match input.peek() {
            Some(t) => *t,
            None => {
                return Err(ParseError::UnexpectedEnd {
                    context: format!("state {}", state),
                })
            }
        };
        match table.action(state, token) {
            Some(Lr1Action::Shift(target)) => {
                builder.add_terminal(token.clone());
                states.push(target);
                input.next();
            }
            Some(Lr1Action::Reduce(pi)) => {
                let production = &table.productions[pi];
                let len = if production.is_epsilon() {
                    0
                } else {
                    production.body.len()
                };
                if len == 0 {
                    builder.reduce_epsilon(&production.head);
                } else {
                    builder.reduce(&production.head, len, false)?;
                }
                states.truncate(states.len() - len);
                let top = *states.last().expect("state stack is never empty");
                let target = table.goto(top, &production.head).ok_or_else(|| {
                    ParseError::UnexpectedToken {
                        kind: token.kind,
                        text: token.text.clone(),
                        line: token.span.line,
                        column: token.span.column,
                        context: format!("goto({}, {})", top, production.head),
                    }
                })?;
                states.push(target);
            }
            Some(Lr1Action::Accept) => {
                return Ok(builder.build()?.into_root());
            }
            None => {
                return Err(ParseError::unexpected(token, format!("state {}", state)));
            }
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Grammar, Production, Symbol};
    use crate::tokenizer::tokenize;

    fn nt(name: &str) -> Symbol {
        Symbol::non_terminal(name).unwrap()
    }

    fn punct(text: &str) -> Symbol {
        Symbol::literal(TokenKind::Punctuation, text)
    }

    fn expression_grammar() -> Grammar {
        Grammar::new(
            "E",
            vec![
                Production::new("E", vec![nt("T"), nt("E'")]),
                Production::new("E'", vec![punct("+"), nt("T"), nt("E'")]),
                Production::new("E'", vec![Symbol::Epsilon]),
                Production::new("T", vec![nt("F"), nt("T'")]),
                Production::new("T'", vec![punct("*"), nt("F"), nt("T'")]),
                Production::new("T'", vec![Symbol::Epsilon]),
                Production::new(
                    "F",
                    vec![punct("("), nt("E"), punct(")")],
                ),
                Production::new("F", vec![Symbol::terminal(TokenKind::Identifier)]),
            ],
        )
    }

    /// Every leaf text, left to right.
    fn leaves(node: &CstNode, out: &mut Vec<String>) {
        match node {
            CstNode::Leaf { token } => out.push(token.text.clone()),
            _ => {
                for c in node.children() {
                    leaves(c, out);
                }
            }
        }
    }

    #[test]
    fn ll1_parses_expression() {
        let g = expression_grammar();
        let table = Ll1Table::build(&g).unwrap();
        let tokens = tokenize("a + b * (c + d)").unwrap();
        let cst = ll1_parse(&table, "E", &tokens, ParseOptions::default()).unwrap();
        assert!(matches!(cst, CstNode::Root { ref name, .. } if name == "E"));
        let mut texts = Vec::new();
        leaves(&cst, &mut texts);
        assert_eq!(texts, vec!["a", "+", "b", "*", "(", "c", "+", "d", ")"]);
    }

    #[test]
    fn lr1_parses_expression_with_same_leaves() {
        let g = expression_grammar();
        let ll = Ll1Table::build(&g).unwrap();
        let lr = Lr1Table::build(&g).unwrap();
        let tokens = tokenize("x * y + z").unwrap();
        let from_ll = ll1_parse(&ll, "E", &tokens, ParseOptions::default()).unwrap();
        let from_lr = lr1_parse(&lr, &tokens, ParseOptions::default()).unwrap();
        let (mut a, mut b) = (Vec::new(), Vec::new());
        leaves(&from_ll, &mut a);
        leaves(&from_lr, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn ll1_rejects_token_without_table_entry() {
        let g = expression_grammar();
        let table = Ll1Table::build(&g).unwrap();
        let tokens = tokenize("a + + b").unwrap();
        let err = ll1_parse(&table, "E", &tokens, ParseOptions::default()).unwrap_err();
        match err {
            ParseError::UnexpectedToken { text, column, .. } => {
                assert_eq!(text, "+");
                assert_eq!(column, 5);
            }
            other => panic!("expected UnexpectedToken, got {:?}", other),
        }
    }

    #[test]
    fn lr1_rejects_token_without_action() {
        let g = expression_grammar();
        let table = Lr1Table::build(&g).unwrap();
        let tokens = tokenize("a b").unwrap();
        assert!(matches!(
            lr1_parse(&table, &tokens, ParseOptions::default()),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn ll1_rejects_trailing_input() {
        let g = expression_grammar();
        let table = Ll1Table::build(&g).unwrap();
        let tokens = tokenize("a ) b").unwrap();
        assert!(ll1_parse(&table, "E", &tokens, ParseOptions::default()).is_err());
    }

    #[test]
    fn epsilon_placeholders_appear_when_kept() {
        let g = expression_grammar();
        let table = Ll1Table::build(&g).unwrap();
        let tokens = tokenize("a").unwrap();
        let kept = ll1_parse(
            &table,
            "E",
            &tokens,
            ParseOptions { keep_epsilon: true },
        )
        .unwrap();
        fn count_epsilon(n: &CstNode) -> usize {
            n.is_epsilon() as usize + n.children().iter().map(count_epsilon).sum::<usize>()
        }
        // `a` alone leaves both E' and T' empty.
        assert_eq!(count_epsilon(&kept), 2);

        let filtered = ll1_parse(&table, "E", &tokens, ParseOptions::default()).unwrap();
        assert_eq!(count_epsilon(&filtered), 0);
    }

    #[test]
    fn lr1_handles_epsilon_reductions() {
        // s → a "x"; a → ε | "y"
        let g = Grammar::new(
            "s",
            vec![
                Production::new(
                    "s",
                    vec![nt("a"), Symbol::literal(TokenKind::Identifier, "x")],
                ),
                Production::new("a", vec![Symbol::Epsilon]),
                Production::new("a", vec![Symbol::literal(TokenKind::Identifier, "y")]),
            ],
        );
        let table = Lr1Table::build(&g).unwrap();
        let cst = lr1_parse(&table, &tokenize("x").unwrap(), ParseOptions::default()).unwrap();
        // The epsilon `a` is filtered; only the leaf remains.
        assert_eq!(cst.children().len(), 1);

        let cst = lr1_parse(&table, &tokenize("y x").unwrap(), ParseOptions::default()).unwrap();
        assert_eq!(cst.children().len(), 2);
    }

    #[test]
    fn engines_are_deterministic() {
        let g = expression_grammar();
        let table = Ll1Table::build(&g).unwrap();
        let tokens = tokenize("a + b").unwrap();
        let one = ll1_parse(&table, "E", &tokens, ParseOptions::default()).unwrap();
        let two = ll1_parse(&table, "E", &tokens, ParseOptions::default()).unwrap();
        assert_eq!(one, two);
    }
}
