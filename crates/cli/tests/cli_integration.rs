//! CLI integration tests for all implemented subcommands.
//!
//! Uses `assert_cmd` to spawn the `webql` binary and verify
//! exit codes, stdout content, and stderr content. Fixture files
//! are written into a fresh temp directory per test.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn webql() -> Command {
    cargo_bin_cmd!("webql")
}

fn write_fixture(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

fn people_json() -> &'static str {
    r#"[
        {"name": "Ann", "age": 34, "city": "Oslo"},
        {"name": "Ben", "age": 17, "city": "Turku"},
        {"name": "Cleo", "age": 25, "city": "Oslo"}
    ]"#
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    webql()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("WebQL query language toolchain"));
}

#[test]
fn version_exits_0() {
    webql()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("webql"));
}

// ──────────────────────────────────────────────
// 2. compile
// ──────────────────────────────────────────────

#[test]
fn compile_prints_plan_and_result_type() {
    let dir = TempDir::new().unwrap();
    let query = write_fixture(&dir, "q.webql", r#"{"age": {"$greater": 18}}"#);

    webql()
        .arg("compile")
        .arg(&query)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"stage\": \"filter\""))
        .stdout(predicate::str::contains("result type:"));
}

#[test]
fn compile_json_output_wraps_plan() {
    let dir = TempDir::new().unwrap();
    let query = write_fixture(&dir, "q.webql", r#"{"city": "Oslo"}"#);

    webql()
        .arg("--output")
        .arg("json")
        .arg("compile")
        .arg(&query)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"plan\""))
        .stdout(predicate::str::contains("\"result_type\""));
}

#[test]
fn compile_with_lr1_parser_agrees() {
    let dir = TempDir::new().unwrap();
    let query = write_fixture(&dir, "q.webql", r#"{"age": {"$greater": 18}}"#);

    let ll1 = webql().arg("compile").arg(&query).output().unwrap();
    let lr1 = webql()
        .arg("compile")
        .arg(&query)
        .arg("--parser")
        .arg("lr1")
        .output()
        .unwrap();

    assert!(ll1.status.success());
    assert!(lr1.status.success());
    assert_eq!(ll1.stdout, lr1.stdout);
}

#[test]
fn compile_rejects_malformed_query() {
    let dir = TempDir::new().unwrap();
    let query = write_fixture(&dir, "q.webql", r#"{"age": }"#);

    webql()
        .arg("compile")
        .arg(&query)
        .assert()
        .failure()
        .stderr(predicate::str::contains("compile error"));
}

#[test]
fn compile_missing_file_exits_1() {
    webql()
        .arg("compile")
        .arg("no-such-query.webql")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error reading"));
}

// ──────────────────────────────────────────────
// 3. run
// ──────────────────────────────────────────────

#[test]
fn run_filters_rows() {
    let dir = TempDir::new().unwrap();
    let query = write_fixture(&dir, "q.webql", r#"{"age": {"$greater": 18}}"#);
    let data = write_fixture(&dir, "people.json", people_json());

    webql()
        .arg("run")
        .arg(&query)
        .arg("--data")
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("Ann"))
        .stdout(predicate::str::contains("Cleo"))
        .stdout(predicate::str::contains("Ben").not());
}

#[test]
fn run_prints_scalar_for_aggregates() {
    let dir = TempDir::new().unwrap();
    let query = write_fixture(&dir, "q.webql", r#"{"city": "Oslo", "$count": []}"#);
    let data = write_fixture(&dir, "people.json", people_json());

    webql()
        .arg("run")
        .arg(&query)
        .arg("--data")
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::diff("2\n"));
}

#[test]
fn run_json_output_wraps_rows() {
    let dir = TempDir::new().unwrap();
    let query = write_fixture(
        &dir,
        "q.webql",
        r#"{"$select": {"who": "$item.name", "old": "$item.age"}}"#,
    );
    let data = write_fixture(&dir, "people.json", people_json());

    webql()
        .arg("--output")
        .arg("json")
        .arg("run")
        .arg(&query)
        .arg("--data")
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rows\""))
        .stdout(predicate::str::contains("\"who\""));
}

#[test]
fn run_rejects_non_array_data() {
    let dir = TempDir::new().unwrap();
    let query = write_fixture(&dir, "q.webql", r#"{}"#);
    let data = write_fixture(&dir, "people.json", r#"{"name": "Ann"}"#);

    webql()
        .arg("run")
        .arg(&query)
        .arg("--data")
        .arg(&data)
        .assert()
        .failure()
        .stderr(predicate::str::contains("array of records"));
}

// ──────────────────────────────────────────────
// 4. tokens
// ──────────────────────────────────────────────

#[test]
fn tokens_dumps_the_stream() {
    let dir = TempDir::new().unwrap();
    let file = write_fixture(&dir, "q.webql", r#"{"age": 42}"#);

    webql()
        .arg("tokens")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("string"))
        .stdout(predicate::str::contains("integer"))
        .stdout(predicate::str::contains("end-of-input"));
}

#[test]
fn tokens_json_output_carries_positions() {
    let dir = TempDir::new().unwrap();
    let file = write_fixture(&dir, "q.webql", "0x2a");

    webql()
        .arg("--output")
        .arg("json")
        .arg("tokens")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"kind\": \"hexadecimal\""))
        .stdout(predicate::str::contains("\"line\": 1"));
}

#[test]
fn tokens_reports_lex_errors() {
    let dir = TempDir::new().unwrap();
    let file = write_fixture(&dir, "q.webql", "\u{1}");

    webql()
        .arg("tokens")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("lex error"));
}

// ──────────────────────────────────────────────
// 5. grammar
// ──────────────────────────────────────────────

const LIST_GRAMMAR: &str = r#"
<list> ::= "[" <items> "]" ;
<items> ::= <item> { "," <item> } | ε ;
<item> ::= integer ;
"#;

#[test]
fn grammar_builds_a_conflict_free_ll1_table() {
    let dir = TempDir::new().unwrap();
    let file = write_fixture(&dir, "list.bnf", LIST_GRAMMAR);

    webql()
        .arg("grammar")
        .arg(&file)
        .arg("--start")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("no conflicts"));
}

#[test]
fn grammar_builds_an_lr1_table() {
    let dir = TempDir::new().unwrap();
    let file = write_fixture(&dir, "list.bnf", LIST_GRAMMAR);

    webql()
        .arg("grammar")
        .arg(&file)
        .arg("--start")
        .arg("list")
        .arg("--table")
        .arg("lr1")
        .assert()
        .success()
        .stdout(predicate::str::contains("LR(1)"));
}

#[test]
fn grammar_reports_ll1_conflicts() {
    // Classic common-prefix grammar: both alternatives start with "a".
    let src = r#"
<s> ::= "a" "b" | "a" "c" ;
"#;
    let dir = TempDir::new().unwrap();
    let file = write_fixture(&dir, "bad.bnf", src);

    webql()
        .arg("grammar")
        .arg(&file)
        .arg("--start")
        .arg("s")
        .assert()
        .failure()
        .stderr(predicate::str::contains("conflict"));
}

#[test]
fn grammar_rejects_undefined_nonterminals() {
    let src = r#"
<s> ::= <missing> ;
"#;
    let dir = TempDir::new().unwrap();
    let file = write_fixture(&dir, "bad.bnf", src);

    webql()
        .arg("grammar")
        .arg(&file)
        .arg("--start")
        .arg("s")
        .assert()
        .failure()
        .stderr(predicate::str::contains("grammar error"));
}

// ──────────────────────────────────────────────
// 6. quiet flag
// ──────────────────────────────────────────────

#[test]
fn quiet_suppresses_output_but_keeps_exit_code() {
    let dir = TempDir::new().unwrap();
    let query = write_fixture(&dir, "q.webql", r#"{"age": }"#);

    webql()
        .arg("--quiet")
        .arg("compile")
        .arg(&query)
        .assert()
        .failure()
        .stderr(predicate::str::is_empty());
}

#[test]
fn unknown_subcommand_exits_nonzero() {
    webql().arg("frobnicate").assert().failure();
}
