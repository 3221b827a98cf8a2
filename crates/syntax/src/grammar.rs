//! Grammar model: symbols, sentences, productions, and macro expansion.
//!
//! A [`Grammar`] is a start symbol plus a multimap from non-terminal
//! heads to their productions. EBNF macros (grouping, option,
//! repetition) are rewritten to plain BNF by [`Grammar::expand_macros`];
//! FIRST/FOLLOW and LR(1) computation require a macro-free grammar and
//! fail with [`GrammarError::UnexpandedMacro`] otherwise.

use crate::error::GrammarError;
use crate::token::TokenKind;
use std::collections::BTreeMap;
use std::fmt;

/// The epsilon glyph, reserved: no non-terminal may use it as a name.
pub const EPSILON_GLYPH: &str = "ε";

/// EBNF macro kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MacroKind {
    /// `( seq )` -- a synthesized non-terminal deriving exactly `seq`.
    Grouping,
    /// `[ seq ]` -- `seq` or epsilon.
    Option,
    /// `{ seq }` -- zero or more `seq`, right-recursive.
    Repetition,
    /// `|` -- production-rule boundary, consumed when splitting a body.
    Alternative,
}

impl fmt::Display for MacroKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MacroKind::Grouping => "grouping",
            MacroKind::Option => "option",
            MacroKind::Repetition => "repetition",
            MacroKind::Alternative => "alternative",
        };
        f.write_str(name)
    }
}

/// A grammar symbol. Equality and ordering are structural: a terminal
/// is its kind plus optional literal value, a non-terminal its name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    /// `value: Some` matches only a token with exactly that text;
    /// `None` matches any token of the kind.
    Terminal {
        kind: TokenKind,
        value: Option<String>,
    },
    NonTerminal(String),
    Epsilon,
    EndOfInput,
    Macro {
        kind: MacroKind,
        inner: Sentence,
    },
}

impl Symbol {
    pub fn terminal(kind: TokenKind) -> Self {
        Symbol::Terminal { kind, value: None }
    }

    pub fn literal(kind: TokenKind, value: impl Into<String>) -> Self {
        Symbol::Terminal {
            kind,
            value: Some(value.into()),
        }
    }

    /// A validated non-terminal: non-empty, no whitespace, not `ε`.
    pub fn non_terminal(name: impl Into<String>) -> Result<Self, GrammarError> {
        let name = name.into();
        if name.is_empty() {
            return Err(GrammarError::InvalidSymbol {
                name,
                reason: "empty name".into(),
            });
        }
        if name.chars().any(char::is_whitespace) {
            return Err(GrammarError::InvalidSymbol {
                name,
                reason: "name contains whitespace".into(),
            });
        }
        if name == EPSILON_GLYPH {
            return Err(GrammarError::InvalidSymbol {
                name,
                reason: "name is the epsilon glyph".into(),
            });
        }
        Ok(Symbol::NonTerminal(name))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Terminal { .. })
    }

    pub fn is_macro(&self) -> bool {
        matches!(self, Symbol::Macro { .. })
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Terminal {
                kind,
                value: Some(v),
            } => write!(f, "\"{}\"({})", v, kind),
            Symbol::Terminal { kind, value: None } => write!(f, "{}", kind),
            Symbol::NonTerminal(name) => write!(f, "<{}>", name),
            Symbol::Epsilon => f.write_str(EPSILON_GLYPH),
            Symbol::EndOfInput => f.write_str("$"),
            Symbol::Macro { kind, inner } => {
                write!(f, "{}(", kind)?;
                for (i, s) in inner.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", s)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// An ordered right-hand side.
pub type Sentence = Vec<Symbol>;

/// One production rule: `head → body`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Production {
    pub head: String,
    pub body: Sentence,
}

impl Production {
    pub fn new(head: impl Into<String>, body: Sentence) -> Self {
        Production {
            head: head.into(),
            body,
        }
    }

    /// True when the body is exactly epsilon.
    pub fn is_epsilon(&self) -> bool {
        self.body.len() == 1 && self.body[0] == Symbol::Epsilon
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> ::=", self.head)?;
        for s in &self.body {
            write!(f, " {}", s)?;
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Grammar
// ──────────────────────────────────────────────

/// Head name used by [`Grammar::augment`].
pub const AUGMENTED_START: &str = "__start";

/// A production set with a designated start symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    start: String,
    productions: BTreeMap<String, Vec<Production>>,
}

impl Grammar {
    pub fn new(start: impl Into<String>, productions: Vec<Production>) -> Self {
        let mut map: BTreeMap<String, Vec<Production>> = BTreeMap::new();
        for p in productions {
            map.entry(p.head.clone()).or_default().push(p);
        }
        Grammar {
            start: start.into(),
            productions: map,
        }
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    /// Productions for a head, in declaration order. Empty when undefined.
    pub fn lookup(&self, head: &str) -> &[Production] {
        self.productions
            .get(head)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All productions, grouped by head in head order.
    pub fn productions(&self) -> impl Iterator<Item = &Production> {
        self.productions.values().flatten()
    }

    pub fn heads(&self) -> impl Iterator<Item = &str> {
        self.productions.keys().map(String::as_str)
    }

    pub fn add(&mut self, production: Production) {
        self.productions
            .entry(production.head.clone())
            .or_default()
            .push(production);
    }

    pub fn remove(&mut self, production: &Production) -> bool {
        if let Some(list) = self.productions.get_mut(&production.head) {
            if let Some(i) = list.iter().position(|p| p == production) {
                list.remove(i);
                if list.is_empty() {
                    self.productions.remove(&production.head);
                }
                return true;
            }
        }
        false
    }

    /// Replace every occurrence of `old` in every body (recursing into
    /// macro sentences). When both symbols are non-terminals the heads
    /// and start symbol are renamed too.
    pub fn replace_symbol(&mut self, old: &Symbol, new: &Symbol) {
        fn replace_in(sentence: &mut Sentence, old: &Symbol, new: &Symbol) {
            for s in sentence.iter_mut() {
                if s == old {
                    *s = new.clone();
                } else if let Symbol::Macro { inner, .. } = s {
                    replace_in(inner, old, new);
                }
            }
        }
        for list in self.productions.values_mut() {
            for p in list.iter_mut() {
                replace_in(&mut p.body, old, new);
            }
        }
        if let (Symbol::NonTerminal(old_name), Symbol::NonTerminal(new_name)) = (old, new) {
            if let Some(list) = self.productions.remove(old_name) {
                let renamed: Vec<Production> = list
                    .into_iter()
                    .map(|p| Production::new(new_name.clone(), p.body))
                    .collect();
                self.productions
                    .entry(new_name.clone())
                    .or_default()
                    .extend(renamed);
            }
            if self.start == *old_name {
                self.start = new_name.clone();
            }
        }
    }

    /// A fresh grammar with `__start → start` prepended, for LR(1)
    /// construction.
    pub fn augment(&self) -> Grammar {
        let mut g = self.clone();
        g.add(Production::new(
            AUGMENTED_START,
            vec![Symbol::NonTerminal(self.start.clone())],
        ));
        g.start = AUGMENTED_START.to_string();
        g
    }

    /// True when no production body contains a macro symbol.
    pub fn is_macro_free(&self) -> bool {
        self.productions().all(|p| !p.body.iter().any(Symbol::is_macro))
    }

    /// Fail unless the grammar is plain BNF. Table tools call this as a
    /// precondition.
    pub fn require_macro_free(&self) -> Result<(), GrammarError> {
        for p in self.productions() {
            if let Some(Symbol::Macro { kind, .. }) = p.body.iter().find(|s| s.is_macro()) {
                return Err(GrammarError::UnexpandedMacro {
                    head: p.head.clone(),
                    kind: kind.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Every non-terminal referenced in a body must have productions.
    pub fn check_defined(&self) -> Result<(), GrammarError> {
        fn check(sentence: &Sentence, g: &Grammar) -> Result<(), GrammarError> {
            for s in sentence {
                match s {
                    Symbol::NonTerminal(name) if g.lookup(name).is_empty() => {
                        return Err(GrammarError::UndefinedNonTerminal { name: name.clone() })
                    }
                    Symbol::Macro { inner, .. } => check(inner, g)?,
                    _ => {}
                }
            }
            Ok(())
        }
        for p in self.productions() {
            check(&p.body, self)?;
        }
        if self.lookup(&self.start).is_empty() {
            return Err(GrammarError::UndefinedNonTerminal {
                name: self.start.clone(),
            });
        }
        Ok(())
    }

    // ── Macro expansion ──────────────────────────────────────────────

    /// Rewrite EBNF macros to plain BNF, to a fixed point (a macro's
    /// inner sentence may itself contain macros). Synthesized heads are
    /// named `head@grpN` / `head@optN` / `head@repN`; the counter is
    /// per-grammar so names never collide. Alternative macros must have
    /// been consumed by the front-end already.
    pub fn expand_macros(&mut self) -> Result<(), GrammarError> {
        let mut counter = 0usize;
        loop {
            let mut synthesized: Vec<Production> = Vec::new();
            for list in self.productions.values_mut() {
                for p in list.iter_mut() {
                    expand_sentence(&p.head, &mut p.body, &mut synthesized, &mut counter)?;
                }
            }
            if synthesized.is_empty() {
                break;
            }
            for p in synthesized {
                self.add(p);
            }
        }
        self.require_macro_free()?;
        self.check_defined()
    }
}

/// Split a sentence on Alternative macro separators. A sentence with
/// no separators is one alternative; an empty segment becomes epsilon.
pub fn split_alternatives(sentence: &[Symbol]) -> Vec<Sentence> {
    let mut alternatives: Vec<Sentence> = Vec::new();
    let mut current: Sentence = Vec::new();
    for symbol in sentence {
        if matches!(
            symbol,
            Symbol::Macro {
                kind: MacroKind::Alternative,
                ..
            }
        ) {
            alternatives.push(std::mem::take(&mut current));
        } else {
            current.push(symbol.clone());
        }
    }
    alternatives.push(current);
    for alt in alternatives.iter_mut() {
        if alt.is_empty() {
            alt.push(Symbol::Epsilon);
        }
    }
    alternatives
}

/// Expand the first level of macros in one sentence, queueing the
/// synthesized productions. Deeper macro nests are handled by the
/// caller's fixed-point loop. Alternative separators inside a macro's
/// inner sentence split it into one synthesized production per
/// alternative; a bare Alternative at production top level is a
/// front-end bug and fails.
fn expand_sentence(
    head: &str,
    body: &mut Sentence,
    synthesized: &mut Vec<Production>,
    counter: &mut usize,
) -> Result<(), GrammarError> {
    for slot in body.iter_mut() {
        let (kind, inner) = match slot {
            Symbol::Macro { kind, inner } => (*kind, std::mem::take(inner)),
            _ => continue,
        };
        *counter += 1;
        let name = match kind {
            MacroKind::Grouping => format!("{}@grp{}", head, counter),
            MacroKind::Option => format!("{}@opt{}", head, counter),
            MacroKind::Repetition => format!("{}@rep{}", head, counter),
            MacroKind::Alternative => {
                return Err(GrammarError::UnexpandedMacro {
                    head: head.to_string(),
                    kind: kind.to_string(),
                })
            }
        };
        let alternatives = split_alternatives(&inner);
        match kind {
            MacroKind::Grouping => {
                for alt in alternatives {
                    synthesized.push(Production::new(name.clone(), alt));
                }
            }
            MacroKind::Option => {
                for alt in alternatives {
                    if alt != vec![Symbol::Epsilon] {
                        synthesized.push(Production::new(name.clone(), alt));
                    }
                }
                synthesized.push(Production::new(name.clone(), vec![Symbol::Epsilon]));
            }
            MacroKind::Repetition => {
                for alt in alternatives {
                    if alt != vec![Symbol::Epsilon] {
                        let mut rec = alt;
                        rec.push(Symbol::NonTerminal(name.clone()));
                        synthesized.push(Production::new(name.clone(), rec));
                    }
                }
                synthesized.push(Production::new(name.clone(), vec![Symbol::Epsilon]));
            }
            MacroKind::Alternative => unreachable!(),
        }
        *slot = Symbol::NonTerminal(name);
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
