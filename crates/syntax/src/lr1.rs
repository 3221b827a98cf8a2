//! Canonical LR(1) construction: item sets, closure, goto, and the
//! ACTION/GOTO tables.
//!
//! The collection is computed as a fixpoint over goto, not by naive
//! recursion: a kernel → state-index map carries the already-discovered
//! kernels between iterations so no state is closed twice. Omitting the
//! map would change no result, only the amount of recomputation.
//!
//! Items sharing a production and dot position within one closure are
//! merged by unioning their lookahead sets; this merge is required for
//! LR(1) correctness, not an optimization.

use crate::error::GrammarError;
use crate::grammar::{Grammar, Production, Symbol, AUGMENTED_START};
use crate::ll1::{compute_first_sets, first_of_sentence, FirstSets, SymbolSet};
use crate::token::{Token, TokenKind};
use std::collections::BTreeMap;

/// Item core: (production index, dot position). Lookaheads live in the
/// item-set map so same-core items union automatically.
type Core = (usize, usize);

/// An item set: core → lookahead set. Used for both kernels and
/// closures; `BTreeMap` keeps identity structural so a kernel can key
/// the discovered-state map directly.
pub type ItemSet = BTreeMap<Core, SymbolSet>;

/// One parser state: its defining kernel and the closure over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lr1State {
    pub kernel: ItemSet,
    pub closure: ItemSet,
}

/// The canonical collection plus its goto graph.
#[derive(Debug, Clone)]
pub struct Lr1Automaton {
    pub states: Vec<Lr1State>,
    pub transitions: BTreeMap<(usize, Symbol), usize>,
    /// Flattened productions; item cores index into this.
    pub productions: Vec<Production>,
    /// Index of `__start → start` in `productions`.
    pub start_production: usize,
}

/// Body symbols of a production, with an epsilon body normalized to an
/// empty slice so its item is complete at dot 0.
fn body_symbols(p: &Production) -> &[Symbol] {
    if p.is_epsilon() {
        &[]
    } else {
        &p.body
    }
}

// ──────────────────────────────────────────────
// Closure and goto
// ──────────────────────────────────────────────

fn closure(
    kernel: &ItemSet,
    productions: &[Production],
    by_head: &BTreeMap<&str, Vec<usize>>,
    firsts: &FirstSets,
) -> ItemSet {
    let mut closed = kernel.clone();
    let mut work: Vec<Core> = closed.keys().copied().collect();
    while let Some((pi, dot)) = work.pop() {
        let lookaheads = closed.get(&(pi, dot)).cloned().unwrap_or_default();
        let body = body_symbols(&productions[pi]);
        let Some(Symbol::NonTerminal(next)) = body.get(dot) else {
            continue;
        };
        // Lookaheads for B's productions: FIRST(β L) where β is the
        // remainder after B. Each symbol of β contributes while the
        // prefix stays nullable; L applies only when all of β is.
        let beta = &body[dot + 1..];
        let beta_first = first_of_sentence(beta, firsts);
        let mut new_las: SymbolSet = beta_first
            .iter()
            .filter(|s| **s != Symbol::Epsilon)
            .cloned()
            .collect();
        if beta_first.contains(&Symbol::Epsilon) {
            new_las.extend(lookaheads.iter().cloned());
        }
        for &qi in by_head.get(next.as_str()).into_iter().flatten() {
            let entry = closed.entry((qi, 0)).or_default();
            let before = entry.len();
            entry.extend(new_las.iter().cloned());
            if entry.len() != before {
                work.push((qi, 0));
            }
        }
    }
    closed
}

fn goto_kernel(closure: &ItemSet, symbol: &Symbol, productions: &[Production]) -> ItemSet {
    let mut kernel = ItemSet::new();
    for (&(pi, dot), las) in closure {
        if body_symbols(&productions[pi]).get(dot) == Some(symbol) {
            kernel
                .entry((pi, dot + 1))
                .or_default()
                .extend(las.iter().cloned());
        }
    }
    kernel
}

// ──────────────────────────────────────────────
// Canonical collection
// ──────────────────────────────────────────────

/// Compute the canonical LR(1) collection for a macro-free grammar.
pub fn canonical_collection(grammar: &Grammar) -> Result<Lr1Automaton, GrammarError> {
    grammar.require_macro_free()?;
    grammar.check_defined()?;
    let augmented = grammar.augment();
    let firsts = compute_first_sets(&augmented)?;

    let productions: Vec<Production> = augmented.productions().cloned().collect();
    let mut by_head: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, p) in productions.iter().enumerate() {
        by_head.entry(p.head.as_str()).or_default().push(i);
    }
    let start_production = productions
        .iter()
        .position(|p| p.head == AUGMENTED_START)
        .expect("augmented start production");

    let mut initial = ItemSet::new();
    initial.insert(
        (start_production, 0),
        std::iter::once(Symbol::EndOfInput).collect(),
    );

    let mut states: Vec<Lr1State> = Vec::new();
    let mut transitions: BTreeMap<(usize, Symbol), usize> = BTreeMap::new();
    // Already-discovered kernels; bounds recomputation only.
    let mut discovered: BTreeMap<ItemSet, usize> = BTreeMap::new();

    let first_closure = closure(&initial, &productions, &by_head, &firsts);
    discovered.insert(initial.clone(), 0);
    states.push(Lr1State {
        kernel: initial,
        closure: first_closure,
    });

    let mut next_state = 0usize;
    while next_state < states.len() {
        let index = next_state;
        next_state += 1;

        // Symbols appearing after a dot anywhere in this closure, in
        // stable order so state numbering is deterministic.
        let mut symbols: Vec<Symbol> = Vec::new();
        for (&(pi, dot), _) in &states[index].closure {
            if let Some(s) = body_symbols(&productions[pi]).get(dot) {
                if !symbols.contains(s) {
                    symbols.push(s.clone());
                }
            }
        }

        for symbol in symbols {
            let kernel = goto_kernel(&states[index].closure, &symbol, &productions);
            if kernel.is_empty() {
                continue;
            }
            let target = match discovered.get(&kernel) {
                Some(&existing) => existing,
                None => {
                    let closed = closure(&kernel, &productions, &by_head, &firsts);
                    let id = states.len();
                    discovered.insert(kernel.clone(), id);
                    states.push(Lr1State {
                        kernel,
                        closure: closed,
                    });
                    id
                }
            };
            transitions.insert((index, symbol), target);
        }
    }

    Ok(Lr1Automaton {
        states,
        transitions,
        productions,
        start_production,
    })
}

// ──────────────────────────────────────────────
// ACTION/GOTO tables
// ──────────────────────────────────────────────

/// One parse action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lr1Action {
    Shift(usize),
    /// Reduce by the indexed production.
    Reduce(usize),
    Accept,
}

type ActionKey = (usize, TokenKind, Option<String>);

/// The deterministic ACTION/GOTO tables built from the automaton.
#[derive(Debug, Clone)]
pub struct Lr1Table {
    actions: BTreeMap<ActionKey, Lr1Action>,
    gotos: BTreeMap<(usize, String), usize>,
    pub productions: Vec<Production>,
}

impl Lr1Table {
    pub fn build(grammar: &Grammar) -> Result<Self, GrammarError> {
        let automaton = canonical_collection(grammar)?;
        Self::from_automaton(&automaton)
    }

    pub fn from_automaton(automaton: &Lr1Automaton) -> Result<Self, GrammarError> {
        let mut actions: BTreeMap<ActionKey, Lr1Action> = BTreeMap::new();
        let mut gotos: BTreeMap<(usize, String), usize> = BTreeMap::new();

        let mut insert = |key: ActionKey,
                          action: Lr1Action,
                          state: usize,
                          symbol: String|
         -> Result<(), GrammarError> {
            match actions.get(&key) {
                Some(existing) if *existing != action => Err(GrammarError::Lr1Conflict {
                    state,
                    symbol,
                    first: format!("{:?}", existing),
                    second: format!("{:?}", action),
                }),
                _ => {
                    actions.insert(key, action);
                    Ok(())
                }
            }
        };

        for ((state, symbol), &target) in &automaton.transitions {
            match symbol {
                Symbol::Terminal { kind, value } => insert(
                    (*state, *kind, value.clone()),
                    Lr1Action::Shift(target),
                    *state,
                    symbol.to_string(),
                )?,
                Symbol::NonTerminal(name) => {
                    gotos.insert((*state, name.clone()), target);
                }
                _ => {}
            }
        }

        for (si, state) in automaton.states.iter().enumerate() {
            for (&(pi, dot), lookaheads) in &state.closure {
                let body = body_symbols(&automaton.productions[pi]);
                if dot != body.len() {
                    continue;
                }
                for la in lookaheads {
                    let (kind, value) = match la {
                        Symbol::Terminal { kind, value } => (*kind, value.clone()),
                        Symbol::EndOfInput => (TokenKind::EndOfInput, None),
                        _ => continue,
                    };
                    let action = if pi == automaton.start_production {
                        Lr1Action::Accept
                    } else {
                        Lr1Action::Reduce(pi)
                    };
                    insert((si, kind, value), action, si, la.to_string())?;
                }
            }
        }

        Ok(Lr1Table {
            actions,
            gotos,
            productions: automaton.productions.clone(),
        })
    }

    /// Action for (state, token), value-specific entry first.
    pub fn action(&self, state: usize, token: &Token) -> Option<Lr1Action> {
        let exact = (state, token.kind, Some(token.text.clone()));
        if let Some(a) = self.actions.get(&exact) {
            return Some(*a);
        }
        self.actions.get(&(state, token.kind, None)).copied()
    }

    pub fn goto(&self, state: usize, head: &str) -> Option<usize> {
        self.gotos.get(&(state, head.to_string())).copied()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
