use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use webql_core::{compile, CompileOptions, ParserKind};
use webql_eval::{run, MemoryProvider, QueryOutput};
use webql_syntax::{parse_grammar, tokenize, Ll1Table, Lr1Table};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Which parse engine drives the front half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ParserChoice {
    Ll1,
    Lr1,
}

impl From<ParserChoice> for ParserKind {
    fn from(choice: ParserChoice) -> Self {
        match choice {
            ParserChoice::Ll1 => ParserKind::Ll1,
            ParserChoice::Lr1 => ParserKind::Lr1,
        }
    }
}

/// Table kind for the grammar subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TableChoice {
    Ll1,
    Lr1,
}

/// WebQL query language toolchain.
#[derive(Parser)]
#[command(name = "webql", version, about = "WebQL query language toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .webql query to its execution plan
    Compile {
        /// Path to the .webql query file
        file: PathBuf,
        /// Parse engine to use (ll1 or lr1)
        #[arg(long, default_value = "ll1", value_enum)]
        parser: ParserChoice,
    },

    /// Compile a query and execute it against a JSON record file
    Run {
        /// Path to the .webql query file
        file: PathBuf,
        /// Path to a JSON file holding an array of records
        #[arg(long)]
        data: PathBuf,
        /// Parse engine to use (ll1 or lr1)
        #[arg(long, default_value = "ll1", value_enum)]
        parser: ParserChoice,
    },

    /// Dump the token stream of a source file
    Tokens {
        /// Path to the source file
        file: PathBuf,
    },

    /// Check a grammar definition and build its parse table
    Grammar {
        /// Path to the grammar definition file
        file: PathBuf,
        /// Start symbol of the grammar
        #[arg(long)]
        start: String,
        /// Which table to build (ll1 or lr1)
        #[arg(long, default_value = "ll1", value_enum)]
        table: TableChoice,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { file, parser } => {
            cmd_compile(&file, parser, cli.output, cli.quiet);
        }
        Commands::Run { file, data, parser } => {
            cmd_run(&file, &data, parser, cli.output, cli.quiet);
        }
        Commands::Tokens { file } => {
            cmd_tokens(&file, cli.output, cli.quiet);
        }
        Commands::Grammar { file, start, table } => {
            cmd_grammar(&file, &start, table, cli.output, cli.quiet);
        }
    }
}

fn cmd_compile(file: &Path, parser: ParserChoice, output: OutputFormat, quiet: bool) {
    let source = read_source(file, output, quiet);
    let options = CompileOptions {
        parser: parser.into(),
    };

    match compile(&source, &MemoryProvider, options) {
        Ok(compiled) => {
            if quiet {
                return;
            }
            let plan_json = serde_json::to_value(&compiled.plan)
                .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }));
            match output {
                OutputFormat::Json => {
                    let body = serde_json::json!({
                        "plan": plan_json,
                        "result_type": compiled.result_type.to_string(),
                    });
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&body).unwrap_or_default()
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&plan_json).unwrap_or_default()
                    );
                    println!("result type: {}", compiled.result_type);
                }
            }
        }
        Err(e) => {
            report_error(&format!("compile error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_run(file: &Path, data: &Path, parser: ParserChoice, output: OutputFormat, quiet: bool) {
    let source = read_source(file, output, quiet);
    let options = CompileOptions {
        parser: parser.into(),
    };

    let compiled = match compile(&source, &MemoryProvider, options) {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("compile error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    let data_str = match std::fs::read_to_string(data) {
        Ok(s) => s,
        Err(e) => {
            report_error(
                &format!("error reading '{}': {}", data.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    };
    let records: Vec<serde_json::Value> = match serde_json::from_str(&data_str) {
        Ok(serde_json::Value::Array(rows)) => rows,
        Ok(_) => {
            report_error(
                &format!("error: '{}' must hold a JSON array of records", data.display()),
                output,
                quiet,
            );
            process::exit(1);
        }
        Err(e) => {
            report_error(
                &format!("error parsing JSON in '{}': {}", data.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    };

    match run(&compiled.plan, &records) {
        Ok(result) => {
            if quiet {
                return;
            }
            match (output, result) {
                (OutputFormat::Json, QueryOutput::Rows(rows)) => {
                    let body = serde_json::json!({ "rows": rows });
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&body).unwrap_or_default()
                    );
                }
                (OutputFormat::Json, QueryOutput::Scalar(value)) => {
                    let body = serde_json::json!({ "scalar": value });
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&body).unwrap_or_default()
                    );
                }
                (OutputFormat::Text, QueryOutput::Rows(rows)) => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&serde_json::Value::Array(rows))
                            .unwrap_or_default()
                    );
                }
                (OutputFormat::Text, QueryOutput::Scalar(value)) => {
                    println!("{}", value);
                }
            }
        }
        Err(e) => {
            report_error(&format!("evaluation error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_tokens(file: &Path, output: OutputFormat, quiet: bool) {
    let source = read_source(file, output, quiet);

    match tokenize(&source) {
        Ok(tokens) => {
            if quiet {
                return;
            }
            match output {
                OutputFormat::Json => {
                    let body: Vec<serde_json::Value> = tokens
                        .iter()
                        .map(|t| {
                            serde_json::json!({
                                "kind": t.kind.to_string(),
                                "text": t.text,
                                "line": t.span.line,
                                "column": t.span.column,
                            })
                        })
                        .collect();
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&serde_json::Value::Array(body))
                            .unwrap_or_default()
                    );
                }
                OutputFormat::Text => {
                    for t in &tokens {
                        println!("{}:{}\t{}\t{:?}", t.span.line, t.span.column, t.kind, t.text);
                    }
                }
            }
        }
        Err(e) => {
            report_error(&format!("lex error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_grammar(file: &Path, start: &str, table: TableChoice, output: OutputFormat, quiet: bool) {
    let source = read_source(file, output, quiet);

    let mut grammar = match parse_grammar(&source, start) {
        Ok(g) => g,
        Err(e) => {
            report_error(&format!("grammar error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    if let Err(e) = grammar.expand_macros() {
        report_error(&format!("grammar error: {}", e), output, quiet);
        process::exit(1);
    }

    let rule_count = grammar.productions().count();

    match table {
        TableChoice::Ll1 => match Ll1Table::build_with_conflicts(&grammar) {
            Ok((built, conflicts)) if conflicts.is_empty() => {
                if quiet {
                    return;
                }
                match output {
                    OutputFormat::Json => {
                        let body = serde_json::json!({
                            "table": "ll1",
                            "productions": rule_count,
                            "entries": built.len(),
                        });
                        println!(
                            "{}",
                            serde_json::to_string_pretty(&body).unwrap_or_default()
                        );
                    }
                    OutputFormat::Text => {
                        println!(
                            "LL(1): {} production(s), {} table entries, no conflicts",
                            rule_count,
                            built.len()
                        );
                    }
                }
            }
            Ok((_, conflicts)) => {
                match output {
                    OutputFormat::Json => {
                        let body: Vec<serde_json::Value> = conflicts
                            .iter()
                            .map(|c| {
                                serde_json::json!({
                                    "head": c.head,
                                    "lookahead": c.lookahead.to_string(),
                                    "first": c.existing.to_string(),
                                    "second": c.incoming.to_string(),
                                })
                            })
                            .collect();
                        eprintln!(
                            "{}",
                            serde_json::to_string_pretty(&serde_json::json!({
                                "conflicts": body
                            }))
                            .unwrap_or_default()
                        );
                    }
                    OutputFormat::Text => {
                        if !quiet {
                            eprintln!("{} LL(1) conflict(s):", conflicts.len());
                            for c in &conflicts {
                                eprintln!(
                                    "  {} on {}: {} vs {}",
                                    c.head, c.lookahead, c.existing, c.incoming
                                );
                            }
                        }
                    }
                }
                process::exit(1);
            }
            Err(e) => {
                report_error(&format!("grammar error: {}", e), output, quiet);
                process::exit(1);
            }
        },
        TableChoice::Lr1 => match Lr1Table::build(&grammar) {
            Ok(built) => {
                if quiet {
                    return;
                }
                match output {
                    OutputFormat::Json => {
                        let body = serde_json::json!({
                            "table": "lr1",
                            "productions": rule_count,
                            "actions": built.action_count(),
                        });
                        println!(
                            "{}",
                            serde_json::to_string_pretty(&body).unwrap_or_default()
                        );
                    }
                    OutputFormat::Text => {
                        println!(
                            "LR(1): {} production(s), {} actions, no conflicts",
                            rule_count,
                            built.action_count()
                        );
                    }
                }
            }
            Err(e) => {
                report_error(&format!("grammar error: {}", e), output, quiet);
                process::exit(1);
            }
        },
    }
}

fn read_source(file: &Path, output: OutputFormat, quiet: bool) -> String {
    match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            report_error(
                &format!("error reading '{}': {}", file.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    }
}

fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{{\"error\": \"{}\"}}", msg.replace('"', "\\\""));
        }
    }
}
