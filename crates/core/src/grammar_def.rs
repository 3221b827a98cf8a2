//! The WebQL concrete grammar.
//!
//! Written in the `webql-syntax` BNF definition language and tabled
//! once per process. The tables are read-only after construction, so
//! concurrent compilations share them freely.

use std::sync::OnceLock;
use webql_syntax::{parse_grammar, Grammar, Ll1Table, Lr1Table};

pub const START: &str = "query";

/// JSON-shaped concrete syntax. Keywords `true`/`false`/`null` are
/// value-specific identifier terminals, so the table tool's
/// keyword-over-kind precedence keeps `literal` unambiguous.
const GRAMMAR_TEXT: &str = r#"
    <query>      ::= <expression> | ε ;
    <expression> ::= <object> | <block> | <literal> ;
    <object>     ::= "{" <members> "}" ;
    <members>    ::= <member> { "," <member> } | ε ;
    <member>     ::= string ":" <expression> ;
    <block>      ::= "[" <elements> "]" ;
    <elements>   ::= <expression> { "," <expression> } | ε ;
    <literal>    ::= string | integer | float | hexadecimal
                   | "true" | "false" | "null" ;
"#;

pub fn grammar() -> &'static Grammar {
    static GRAMMAR: OnceLock<Grammar> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        let mut g = parse_grammar(GRAMMAR_TEXT, START).expect("the WebQL grammar is well-formed");
        g.expand_macros().expect("the WebQL grammar expands");
        g
    })
}

pub fn ll1_table() -> &'static Ll1Table {
    static TABLE: OnceLock<Ll1Table> = OnceLock::new();
    TABLE.get_or_init(|| Ll1Table::build(grammar()).expect("the WebQL grammar is LL(1)"))
}

pub fn lr1_table() -> &'static Lr1Table {
    static TABLE: OnceLock<Lr1Table> = OnceLock::new();
    TABLE.get_or_init(|| Lr1Table::build(grammar()).expect("the WebQL grammar is LR(1)"))
}
