//! Self-hosted grammar-definition front-end.
//!
//! Grammars are written in a small BNF dialect and parsed with the
//! engine itself: the meta-grammar below is built programmatically,
//! macro-expanded, tabled once per process, and LL(1)-parsed.
//!
//! ```text
//! <object>  ::= "{" [ <members> ] "}" ;
//! <members> ::= <member> { "," <member> } ;
//! <member>  ::= string ":" <value> ;
//! <value>   ::= <object> | string | integer | ε ;
//! ```
//!
//! Non-terminals are written `<name>`, alternatives split on `|`, and
//! every rule ends with `;`. A quoted literal becomes a value-specific
//! terminal whose kind is inferred by tokenizing the literal text; the
//! bare names `identifier`, `string`, `integer`, `float` and
//! `hexadecimal` are kind-only terminals; `ε` (or `epsilon`) is the
//! empty sentence. `( )`, `[ ]` and `{ }` are the EBNF grouping,
//! option and repetition macros.
//!
//! The returned grammar still contains macros: callers expand before
//! building tables.

use crate::cst::CstNode;
use crate::engine::{ll1_parse, ParseOptions};
use crate::error::GrammarError;
use crate::grammar::{Grammar, MacroKind, Production, Sentence, Symbol};
use crate::ll1::Ll1Table;
use crate::token::TokenKind;
use crate::tokenizer::tokenize;
use std::sync::OnceLock;

// ──────────────────────────────────────────────
// The meta-grammar
// ──────────────────────────────────────────────

fn meta_punct(text: &str) -> Symbol {
    Symbol::literal(TokenKind::Punctuation, text)
}

fn meta_nt(name: &str) -> Symbol {
    Symbol::NonTerminal(name.to_string())
}

/// Plain-BNF meta-grammar for the definition language itself. Written
/// without macros so it can bootstrap the expander.
fn meta_grammar() -> Grammar {
    let rules = vec![
        // grammar → rule rules'
        Production::new("grammar", vec![meta_nt("rule"), meta_nt("rules'")]),
        Production::new("rules'", vec![meta_nt("rule"), meta_nt("rules'")]),
        Production::new("rules'", vec![Symbol::Epsilon]),
        // rule → nonterm "::=" alts ";"
        Production::new(
            "rule",
            vec![
                meta_nt("nonterm"),
                meta_punct("::="),
                meta_nt("alts"),
                meta_punct(";"),
            ],
        ),
        // nonterm → "<" identifier ">"
        Production::new(
            "nonterm",
            vec![
                meta_punct("<"),
                Symbol::terminal(TokenKind::Identifier),
                meta_punct(">"),
            ],
        ),
        // alts → sentence alts' ; alts' → "|" sentence alts' | ε
        Production::new("alts", vec![meta_nt("sentence"), meta_nt("alts'")]),
        Production::new(
            "alts'",
            vec![meta_punct("|"), meta_nt("sentence"), meta_nt("alts'")],
        ),
        Production::new("alts'", vec![Symbol::Epsilon]),
        // sentence → term terms' | ε ; terms' → term terms' | ε
        Production::new("sentence", vec![meta_nt("term"), meta_nt("terms'")]),
        Production::new("sentence", vec![Symbol::Epsilon]),
        Production::new("terms'", vec![meta_nt("term"), meta_nt("terms'")]),
        Production::new("terms'", vec![Symbol::Epsilon]),
        // term → nonterm | string-literal | kind-name | macros
        Production::new("term", vec![meta_nt("nonterm")]),
        Production::new("term", vec![Symbol::terminal(TokenKind::Str)]),
        Production::new("term", vec![Symbol::terminal(TokenKind::Identifier)]),
        Production::new(
            "term",
            vec![meta_punct("("), meta_nt("alts"), meta_punct(")")],
        ),
        Production::new(
            "term",
            vec![meta_punct("["), meta_nt("alts"), meta_punct("]")],
        ),
        Production::new(
            "term",
            vec![meta_punct("{"), meta_nt("alts"), meta_punct("}")],
        ),
    ];
    Grammar::new("grammar", rules)
}

fn meta_table() -> &'static Ll1Table {
    static TABLE: OnceLock<Ll1Table> = OnceLock::new();
    TABLE.get_or_init(|| {
        Ll1Table::build(&meta_grammar()).expect("meta-grammar is LL(1) by construction")
    })
}

// ──────────────────────────────────────────────
// CST → Grammar
// ──────────────────────────────────────────────

fn malformed(message: impl Into<String>) -> GrammarError {
    GrammarError::Malformed {
        message: message.into(),
    }
}

/// Parse a grammar definition. `start` names the start symbol, which
/// must be defined by the source. Macros in the result are NOT yet
/// expanded.
pub fn parse_grammar(src: &str, start: &str) -> Result<Grammar, GrammarError> {
    let tokens = tokenize(src).map_err(|e| malformed(e.to_string()))?;
    // Epsilon placeholders are kept so empty alternatives stay visible
    // in the walk below.
    let cst = ll1_parse(
        meta_table(),
        "grammar",
        &tokens,
        ParseOptions { keep_epsilon: true },
    )
    .map_err(|e| malformed(e.to_string()))?;

    let mut productions: Vec<Production> = Vec::new();
    let mut rules = Vec::new();
    collect_named(&cst, "rule", &mut rules);
    for rule in rules {
        walk_rule(rule, &mut productions)?;
    }

    let grammar = Grammar::new(start, productions);
    if grammar.lookup(start).is_empty() {
        return Err(malformed(format!(
            "start symbol '{}' has no productions",
            start
        )));
    }
    Ok(grammar)
}

/// Collect every node with the given name, depth-first, without
/// descending into matches (rules do not nest).
fn collect_named<'a>(node: &'a CstNode, name: &str, out: &mut Vec<&'a CstNode>) {
    if node.name() == Some(name) && matches!(node, CstNode::Internal { .. }) {
        out.push(node);
        return;
    }
    for child in node.children() {
        collect_named(child, name, out);
    }
}

fn walk_rule(rule: &CstNode, productions: &mut Vec<Production>) -> Result<(), GrammarError> {
    let children = rule.children();
    // nonterm "::=" alts ";"
    let head = nonterm_name(&children[0])?;
    let head_symbol = Symbol::non_terminal(&head)?;
    let Symbol::NonTerminal(head) = head_symbol else {
        unreachable!()
    };
    for sentence in walk_alts(&children[2])? {
        productions.push(Production::new(head.clone(), sentence));
    }
    Ok(())
}

fn nonterm_name(node: &CstNode) -> Result<String, GrammarError> {
    // "<" identifier ">"
    match &node.children()[1] {
        CstNode::Leaf { token } => Ok(token.text.clone()),
        other => Err(malformed(format!(
            "expected identifier inside <...>, got {:?}",
            other.name()
        ))),
    }
}

/// An `alts` node: one sentence per alternative.
fn walk_alts(node: &CstNode) -> Result<Vec<Sentence>, GrammarError> {
    let mut sentences = Vec::new();
    let children = node.children();
    sentences.push(walk_sentence(&children[0])?);
    let mut tail = &children[1];
    loop {
        if tail.is_epsilon() {
            break;
        }
        // "|" sentence alts'
        let parts = tail.children();
        sentences.push(walk_sentence(&parts[1])?);
        tail = &parts[2];
    }
    Ok(sentences)
}

fn walk_sentence(node: &CstNode) -> Result<Sentence, GrammarError> {
    if node.is_epsilon() {
        return Ok(vec![Symbol::Epsilon]);
    }
    let mut symbols = Vec::new();
    let children = node.children();
    symbols.push(walk_term(&children[0])?);
    let mut tail = &children[1];
    while !tail.is_epsilon() {
        let parts = tail.children();
        symbols.push(walk_term(&parts[0])?);
        tail = &parts[1];
    }
    // An explicit ε term alongside other symbols collapses away.
    if symbols.len() > 1 {
        symbols.retain(|s| *s != Symbol::Epsilon);
    }
    Ok(symbols)
}

fn walk_term(node: &CstNode) -> Result<Symbol, GrammarError> {
    let children = node.children();
    match &children[0] {
        CstNode::Internal { name, .. } if name == "nonterm" => {
            Symbol::non_terminal(nonterm_name(&children[0])?)
        }
        CstNode::Leaf { token } => match token.kind {
            TokenKind::Str => literal_terminal(&token.text),
            TokenKind::Identifier => kind_terminal(&token.text),
            TokenKind::Punctuation => {
                let macro_kind = match token.text.as_str() {
                    "(" => MacroKind::Grouping,
                    "[" => MacroKind::Option,
                    "{" => MacroKind::Repetition,
                    other => return Err(malformed(format!("unexpected '{}' in term", other))),
                };
                let mut inner = Sentence::new();
                for (i, sentence) in walk_alts(&children[1])?.into_iter().enumerate() {
                    if i > 0 {
                        inner.push(Symbol::Macro {
                            kind: MacroKind::Alternative,
                            inner: Vec::new(),
                        });
                    }
                    // A lone epsilon alternative contributes an empty
                    // segment, restored by split_alternatives later.
                    if sentence != vec![Symbol::Epsilon] {
                        inner.extend(sentence);
                    }
                }
                Ok(Symbol::Macro {
                    kind: macro_kind,
                    inner,
                })
            }
            other => Err(malformed(format!("unexpected {} in term", other))),
        },
        other => Err(malformed(format!("unexpected node {:?} in term", other.name()))),
    }
}

/// Infer a value-specific terminal from a quoted literal by tokenizing
/// its text: `"true"` is an identifier-kind keyword, `","` punctuation.
fn literal_terminal(text: &str) -> Result<Symbol, GrammarError> {
    let mut tokens = tokenize(text).map_err(|e| {
        malformed(format!("literal '{}' does not tokenize: {}", text, e))
    })?;
    // Drop the synthetic end-of-input.
    tokens.pop();
    match tokens.as_slice() {
        [only] => Ok(Symbol::literal(only.kind, only.text.clone())),
        _ => Err(malformed(format!(
            "literal '{}' is not a single token",
            text
        ))),
    }
}

fn kind_terminal(name: &str) -> Result<Symbol, GrammarError> {
    let kind = match name {
        "identifier" => TokenKind::Identifier,
        "string" => TokenKind::Str,
        "integer" => TokenKind::Integer,
        "float" => TokenKind::Float,
        "hexadecimal" => TokenKind::Hexadecimal,
        "ε" | "epsilon" => return Ok(Symbol::Epsilon),
        other => {
            return Err(malformed(format!("unknown token kind '{}'", other)));
        }
    };
    Ok(Symbol::terminal(kind))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::lr1_parse;
    use crate::lr1::Lr1Table;

    #[test]
    fn meta_grammar_is_ll1() {
        let (_, conflicts) = Ll1Table::build_with_conflicts(&meta_grammar()).unwrap();
        assert!(conflicts.is_empty(), "conflicts: {:?}", conflicts);
    }

    #[test]
    fn parses_single_rule() {
        let g = parse_grammar(r#"<s> ::= "x" <t> integer ; <t> ::= "y" ;"#, "s").unwrap();
        assert_eq!(g.start(), "s");
        let p = &g.lookup("s")[0];
        assert_eq!(p.body.len(), 3);
        assert_eq!(p.body[0], Symbol::literal(TokenKind::Identifier, "x"));
        assert_eq!(p.body[1], Symbol::NonTerminal("t".into()));
        assert_eq!(p.body[2], Symbol::terminal(TokenKind::Integer));
    }

    #[test]
    fn splits_alternatives_into_productions() {
        let g = parse_grammar(r#"<v> ::= string | integer | float ;"#, "v").unwrap();
        assert_eq!(g.lookup("v").len(), 3);
    }

    #[test]
    fn empty_alternative_is_epsilon() {
        let g = parse_grammar(r#"<opt> ::= string | ;"#, "opt").unwrap();
        let bodies = g.lookup("opt");
        assert_eq!(bodies.len(), 2);
        assert!(bodies.iter().any(|p| p.is_epsilon()));
    }

    #[test]
    fn explicit_epsilon_glyph() {
        let g = parse_grammar("<opt> ::= string | ε ;", "opt").unwrap();
        assert!(g.lookup("opt").iter().any(|p| p.is_epsilon()));
    }

    #[test]
    fn macros_parse_and_expand() {
        let g = parse_grammar(
            r#"<list> ::= "[" [ <items> ] "]" ;
               <items> ::= integer { "," integer } ;"#,
            "list",
        );
        let mut g = g.unwrap();
        assert!(!g.is_macro_free());
        g.expand_macros().unwrap();
        assert!(g.is_macro_free());
        assert!(g.heads().any(|h| h.contains("@opt")));
        assert!(g.heads().any(|h| h.contains("@rep")));
    }

    #[test]
    fn alternatives_inside_group_macro() {
        let mut g = parse_grammar(r#"<s> ::= ( "a" | "b" ) "c" ;"#, "s").unwrap();
        g.expand_macros().unwrap();
        let grp = g
            .heads()
            .find(|h| h.contains("@grp"))
            .unwrap()
            .to_string();
        assert_eq!(g.lookup(&grp).len(), 2);
    }

    #[test]
    fn punctuation_literals_infer_kind() {
        let g = parse_grammar(r#"<p> ::= "{" "}" "true" ;"#, "p").unwrap();
        let body = &g.lookup("p")[0].body;
        assert_eq!(body[0], Symbol::literal(TokenKind::Punctuation, "{"));
        assert_eq!(body[2], Symbol::literal(TokenKind::Identifier, "true"));
    }

    #[test]
    fn ebnf_comments_ignored_in_definitions() {
        let g = parse_grammar(
            "(* a value *) <v> ::= integer ; // trailing\n",
            "v",
        )
        .unwrap();
        assert_eq!(g.lookup("v").len(), 1);
    }

    #[test]
    fn missing_start_symbol_is_malformed() {
        assert!(matches!(
            parse_grammar("<a> ::= integer ;", "zzz"),
            Err(GrammarError::Malformed { .. })
        ));
    }

    #[test]
    fn garbage_definition_is_malformed() {
        assert!(matches!(
            parse_grammar("<a> := integer ;", "a"),
            Err(GrammarError::Malformed { .. })
        ));
    }

    #[test]
    fn unknown_kind_name_is_malformed() {
        assert!(matches!(
            parse_grammar("<a> ::= number ;", "a"),
            Err(GrammarError::Malformed { .. })
        ));
    }

    /// The definition language round-trips through both engines: a
    /// grammar defined in BNF parses input identically under LL(1)
    /// and LR(1) tables.
    #[test]
    fn defined_grammar_drives_both_engines() {
        let mut g = parse_grammar(
            r#"<pair> ::= "(" integer "," integer ")" ;"#,
            "pair",
        )
        .unwrap();
        g.expand_macros().unwrap();
        let tokens = tokenize("(1, 2)").unwrap();
        let ll = Ll1Table::build(&g).unwrap();
        let lr = Lr1Table::build(&g).unwrap();
        let a = ll1_parse(&ll, "pair", &tokens, ParseOptions::default()).unwrap();
        let b = lr1_parse(&lr, &tokens, ParseOptions::default()).unwrap();
        assert_eq!(a.children().len(), b.children().len());
    }
}
