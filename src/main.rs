use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser as ClapParser, ValueEnum};
use lisp::{Environment, EvalConfig, Evaluator, Parser, standard_builtins, tokenize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Print the token stream
    Tokens,
    /// Print the parsed top-level forms
    Ast,
    /// Print the value of the last form
    Value,
}

/// Runs a program file through the tokenizer, parser and evaluator.
#[derive(ClapParser, Debug)]
#[command(name = "lisp", version)]
struct Args {
    /// Source file to run
    file: PathBuf,

    /// Maximum number of nested procedure calls
    #[arg(long, default_value_t = EvalConfig::default().max_depth)]
    max_depth: usize,

    /// Which stage's output to print
    #[arg(long, value_enum, default_value_t = Emit::Value)]
    emit: Emit,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> ExitCode {
    let source = match std::fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Could not read {}: {}", args.file.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let name = args.file.display().to_string();

    let tokens = tokenize(&source);
    tracing::debug!(count = tokens.len(), "tokenized {}", name);
    if args.emit == Emit::Tokens {
        for token in &tokens {
            println!("{}", token);
        }
        return ExitCode::SUCCESS;
    }

    let forms = match Parser::with_source(tokens, &source, Some(&name)).parse() {
        Ok(forms) => forms,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if args.emit == Emit::Ast {
        for form in &forms {
            println!("{}", form);
        }
        return ExitCode::SUCCESS;
    }

    let config = EvalConfig {
        max_depth: args.max_depth,
    };
    let env = Environment::with_bindings(standard_builtins());
    match Evaluator::with_config(config).evaluate_program(&forms, &env) {
        Ok(value) => {
            println!("{}", value);
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let Err(io_err) = e.pretty_print(&name, &source) {
                tracing::warn!(%io_err, "could not render error report");
                eprintln!("{}: {}", e.category(), e);
            }
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();
    run(args)
}
