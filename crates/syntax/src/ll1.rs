//! LL(1) table tool: FIRST/FOLLOW sets and the parsing table.
//!
//! Both set computations run to a fixed point over the whole grammar
//! rather than recursing per symbol, which sidesteps FOLLOW cycles.
//! Table construction never overwrites: colliding entries are collected
//! and reported as FIRST/FIRST or FIRST/FOLLOW conflicts.

use crate::error::GrammarError;
use crate::grammar::{Grammar, Production, Symbol};
use crate::token::{Token, TokenKind};
use std::collections::{BTreeMap, BTreeSet};

/// A deduplicated set of symbols (terminals, epsilon, end-of-input).
pub type SymbolSet = BTreeSet<Symbol>;

/// FIRST sets keyed by non-terminal name.
pub type FirstSets = BTreeMap<String, SymbolSet>;

/// FOLLOW sets keyed by non-terminal name.
pub type FollowSets = BTreeMap<String, SymbolSet>;

// ──────────────────────────────────────────────
// FIRST
// ──────────────────────────────────────────────

/// FIRST of a sentence under the given per-non-terminal FIRST sets:
/// union each symbol's FIRST minus epsilon, continuing right only while
/// the symbol is nullable; epsilon is included when the whole sentence
/// derives it.
pub fn first_of_sentence(sentence: &[Symbol], firsts: &FirstSets) -> SymbolSet {
    let mut out = SymbolSet::new();
    for symbol in sentence {
        match symbol {
            Symbol::Terminal { .. } | Symbol::EndOfInput => {
                out.insert(symbol.clone());
                return out;
            }
            Symbol::Epsilon => continue,
            Symbol::NonTerminal(name) => {
                let f = firsts.get(name).cloned().unwrap_or_default();
                let nullable = f.contains(&Symbol::Epsilon);
                out.extend(f.into_iter().filter(|s| *s != Symbol::Epsilon));
                if !nullable {
                    return out;
                }
            }
            Symbol::Macro { .. } => {
                // Guarded against by require_macro_free in the entry points.
                unreachable!("macro symbol in FIRST computation")
            }
        }
    }
    out.insert(Symbol::Epsilon);
    out
}

/// Compute FIRST for every non-terminal by fixpoint iteration.
pub fn compute_first_sets(grammar: &Grammar) -> Result<FirstSets, GrammarError> {
    grammar.require_macro_free()?;
    let mut firsts: FirstSets = grammar
        .heads()
        .map(|h| (h.to_string(), SymbolSet::new()))
        .collect();
    loop {
        let mut changed = false;
        for p in grammar.productions() {
            let add = first_of_sentence(&p.body, &firsts);
            let set = firsts.entry(p.head.clone()).or_default();
            for s in add {
                changed |= set.insert(s);
            }
        }
        if !changed {
            return Ok(firsts);
        }
    }
}

// ──────────────────────────────────────────────
// FOLLOW
// ──────────────────────────────────────────────

/// Compute FOLLOW for every non-terminal by fixpoint iteration. The
/// start symbol's FOLLOW always contains end-of-input.
pub fn compute_follow_sets(
    grammar: &Grammar,
    firsts: &FirstSets,
) -> Result<FollowSets, GrammarError> {
    grammar.require_macro_free()?;
    let mut follows: FollowSets = grammar
        .heads()
        .map(|h| (h.to_string(), SymbolSet::new()))
        .collect();
    follows
        .entry(grammar.start().to_string())
        .or_default()
        .insert(Symbol::EndOfInput);
    loop {
        let mut changed = false;
        for p in grammar.productions() {
            for (i, symbol) in p.body.iter().enumerate() {
                let Symbol::NonTerminal(name) = symbol else {
                    continue;
                };
                let rest = first_of_sentence(&p.body[i + 1..], firsts);
                let nullable_rest = rest.contains(&Symbol::Epsilon);
                let set = follows.entry(name.clone()).or_default();
                for s in rest {
                    if s != Symbol::Epsilon {
                        changed |= set.insert(s);
                    }
                }
                if nullable_rest {
                    let head_follow = follows.get(&p.head).cloned().unwrap_or_default();
                    let set = follows.entry(name.clone()).or_default();
                    for s in head_follow {
                        changed |= set.insert(s);
                    }
                }
            }
        }
        if !changed {
            return Ok(follows);
        }
    }
}

// ──────────────────────────────────────────────
// Parsing table
// ──────────────────────────────────────────────

/// Table key: head plus the lookahead's kind and optional exact text.
type Key = (String, TokenKind, Option<String>);

/// One table collision: two productions claiming the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ll1Conflict {
    pub head: String,
    pub lookahead: Symbol,
    pub existing: Production,
    pub incoming: Production,
}

impl Ll1Conflict {
    fn into_error(self) -> GrammarError {
        GrammarError::Ll1Conflict {
            head: self.head,
            lookahead: self.lookahead.to_string(),
            first: self.existing.to_string(),
            second: self.incoming.to_string(),
        }
    }
}

/// The deterministic (head, lookahead) → production table.
///
/// Value-specific keys take precedence at lookup: a keyword or literal
/// entry beats the generic entry for the same token kind.
#[derive(Debug, Clone)]
pub struct Ll1Table {
    entries: BTreeMap<Key, Production>,
}

impl Ll1Table {
    /// Build the table, failing on the first conflict (after the full
    /// sweep -- conflicts are detected by a grouping pass, never by
    /// silent overwrite).
    pub fn build(grammar: &Grammar) -> Result<Self, GrammarError> {
        let (table, conflicts) = Self::build_with_conflicts(grammar)?;
        if let Some(c) = conflicts.into_iter().next() {
            return Err(c.into_error());
        }
        Ok(table)
    }

    /// Build the table and report every conflict, grouped by head. The
    /// returned table keeps the first claimant of each contested key so
    /// diagnostics tooling can still inspect it.
    pub fn build_with_conflicts(
        grammar: &Grammar,
    ) -> Result<(Self, Vec<Ll1Conflict>), GrammarError> {
        grammar.require_macro_free()?;
        grammar.check_defined()?;
        let firsts = compute_first_sets(grammar)?;
        let follows = compute_follow_sets(grammar, &firsts)?;

        let mut entries: BTreeMap<Key, Production> = BTreeMap::new();
        let mut conflicts: Vec<Ll1Conflict> = Vec::new();
        for p in grammar.productions() {
            let first = first_of_sentence(&p.body, &firsts);
            let nullable = first.contains(&Symbol::Epsilon);
            let mut lookaheads: Vec<Symbol> =
                first.into_iter().filter(|s| *s != Symbol::Epsilon).collect();
            if nullable {
                if let Some(follow) = follows.get(&p.head) {
                    lookaheads.extend(follow.iter().cloned());
                }
            }
            for la in lookaheads {
                let key = match &la {
                    Symbol::Terminal { kind, value } => (p.head.clone(), *kind, value.clone()),
                    Symbol::EndOfInput => (p.head.clone(), TokenKind::EndOfInput, None),
                    _ => continue,
                };
                match entries.get(&key) {
                    Some(existing) if existing != p => conflicts.push(Ll1Conflict {
                        head: p.head.clone(),
                        lookahead: la,
                        existing: existing.clone(),
                        incoming: p.clone(),
                    }),
                    Some(_) => {}
                    None => {
                        entries.insert(key, p.clone());
                    }
                }
            }
        }
        // Group clashes by head so a grammar author sees one head's
        // problems together.
        conflicts.sort_by(|a, b| (&a.head, &a.lookahead).cmp(&(&b.head, &b.lookahead)));
        Ok((Ll1Table { entries }, conflicts))
    }

    /// Production for (head, token), value-specific entry first.
    pub fn lookup(&self, head: &str, token: &Token) -> Option<&Production> {
        let exact = (head.to_string(), token.kind, Some(token.text.clone()));
        if let Some(p) = self.entries.get(&exact) {
            return Some(p);
        }
        self.entries.get(&(head.to_string(), token.kind, None))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Span;

    fn nt(name: &str) -> Symbol {
        Symbol::non_terminal(name).unwrap()
    }

    fn punct(text: &str) -> Symbol {
        Symbol::literal(TokenKind::Punctuation, text)
    }

    fn id() -> Symbol {
        Symbol::terminal(TokenKind::Identifier)
    }

    /// The textbook expression grammar:
    /// E → T E'; E' → + T E' | ε; T → F T'; T' → * F T' | ε; F → ( E ) | id
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
                Production::new("F", vec![punct("("), nt("E"), punct(")")]),
                Production::new("F", vec![id()]),
            ],
        )
    }

    fn set(symbols: &[Symbol]) -> SymbolSet {
        symbols.iter().cloned().collect()
    }

    #[test]
    fn first_sets_match_hand_computation() {
        let g = expression_grammar();
        let firsts = compute_first_sets(&g).unwrap();
        let leading = set(&[punct("("), id()]);
        assert_eq!(firsts["E"], leading);
        assert_eq!(firsts["T"], leading);
        assert_eq!(firsts["F"], leading);
        assert_eq!(firsts["E'"], set(&[punct("+"), Symbol::Epsilon]));
        assert_eq!(firsts["T'"], set(&[punct("*"), Symbol::Epsilon]));
    }

    #[test]
    fn follow_sets_match_hand_computation() {
        let g = expression_grammar();
        let firsts = compute_first_sets(&g).unwrap();
        let follows = compute_follow_sets(&g, &firsts).unwrap();
        assert_eq!(follows["E"], set(&[punct(")"), Symbol::EndOfInput]));
        assert_eq!(follows["E'"], set(&[punct(")"), Symbol::EndOfInput]));
        assert_eq!(
            follows["T"],
            set(&[punct("+"), punct(")"), Symbol::EndOfInput])
        );
        assert_eq!(
            follows["T'"],
            set(&[punct("+"), punct(")"), Symbol::EndOfInput])
        );
        assert_eq!(
            follows["F"],
            set(&[punct("+"), punct("*"), punct(")"), Symbol::EndOfInput])
        );
    }

    #[test]
    fn epsilon_propagates_across_nullable_prefix() {
        // s → a b "x"; a → ε; b → ε | "y"
        // FIRST(s) must include both "y" (through nullable a) and "x"
        // (through nullable a b).
        let g = Grammar::new(
            "s",
            vec![
                Production::new("s", vec![nt("a"), nt("b"), punct("x")]),
                Production::new("a", vec![Symbol::Epsilon]),
                Production::new("b", vec![Symbol::Epsilon]),
                Production::new("b", vec![punct("y")]),
            ],
        );
        let firsts = compute_first_sets(&g).unwrap();
        assert_eq!(firsts["s"], set(&[punct("x"), punct("y")]));
    }

    fn token(kind: TokenKind, text: &str) -> Token {
        Token::new(
            kind,
            text,
            Span {
                start: 0,
                end: 0,
                line: 1,
                column: 1,
            },
        )
    }

    #[test]
    fn table_is_total_and_unambiguous_for_ll1_grammar() {
        let g = expression_grammar();
        let (table, conflicts) = Ll1Table::build_with_conflicts(&g).unwrap();
        assert!(conflicts.is_empty());
        // Every (head, reachable lookahead) pair resolves to exactly one
        // production; spot-check the interesting ones.
        let plus = token(TokenKind::Punctuation, "+");
        let rp = token(TokenKind::Punctuation, ")");
        let eoi = token(TokenKind::EndOfInput, "");
        assert!(table.lookup("E'", &plus).unwrap().body.len() == 3);
        assert!(table.lookup("E'", &rp).unwrap().is_epsilon());
        assert!(table.lookup("E'", &eoi).unwrap().is_epsilon());
        assert!(table
            .lookup("F", &token(TokenKind::Identifier, "x"))
            .is_some());
        assert!(table.lookup("F", &plus).is_none());
    }

    #[test]
    fn value_specific_entry_beats_kind_entry() {
        // s → "if" | identifier -- the keyword row must win for "if".
        let g = Grammar::new(
            "s",
            vec![
                Production::new("s", vec![Symbol::literal(TokenKind::Identifier, "if")]),
                Production::new("s", vec![id()]),
            ],
        );
        let table = Ll1Table::build(&g).unwrap();
        let kw = table.lookup("s", &token(TokenKind::Identifier, "if")).unwrap();
        assert_eq!(
            kw.body[0],
            Symbol::literal(TokenKind::Identifier, "if")
        );
        let generic = table
            .lookup("s", &token(TokenKind::Identifier, "other"))
            .unwrap();
        assert_eq!(generic.body[0], id());
    }

    #[test]
    fn dangling_else_grammar_reports_conflict() {
        // s → "i" e "t" s opt | "a"; opt → "e" s | ε; e → "b"
        // FIRST(opt) and FOLLOW(opt) both contain "e".
        let g = Grammar::new(
            "s",
            vec![
                Production::new(
                    "s",
                    vec![
                        Symbol::literal(TokenKind::Identifier, "i"),
                        nt("e"),
                        Symbol::literal(TokenKind::Identifier, "t"),
                        nt("s"),
                        nt("opt"),
                    ],
                ),
                Production::new("s", vec![Symbol::literal(TokenKind::Identifier, "a")]),
                Production::new(
                    "opt",
                    vec![Symbol::literal(TokenKind::Identifier, "e"), nt("s")],
                ),
                Production::new("opt", vec![Symbol::Epsilon]),
                Production::new("e", vec![Symbol::literal(TokenKind::Identifier, "b")]),
            ],
        );
        let err = Ll1Table::build(&g).unwrap_err();
        assert!(matches!(err, GrammarError::Ll1Conflict { ref head, .. } if head == "opt"));
        let (_, conflicts) = Ll1Table::build_with_conflicts(&g).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].head, "opt");
    }

    #[test]
    fn first_first_conflict_detected() {
        // s → a | b; a → "x"; b → "x"
        let g = Grammar::new(
            "s",
            vec![
                Production::new("s", vec![nt("a")]),
                Production::new("s", vec![nt("b")]),
                Production::new("a", vec![punct("x")]),
                Production::new("b", vec![punct("x")]),
            ],
        );
        let (_, conflicts) = Ll1Table::build_with_conflicts(&g).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].head, "s");
    }

    #[test]
    fn macro_grammar_is_rejected() {
        use crate::grammar::MacroKind;
        let g = Grammar::new(
            "s",
            vec![Production::new(
                "s",
                vec![Symbol::Macro {
                    kind: MacroKind::Option,
                    inner: vec![punct("x")],
                }],
            )],
        );
        assert!(matches!(
            compute_first_sets(&g),
            Err(GrammarError::UnexpandedMacro { .. })
        ));
    }
}
