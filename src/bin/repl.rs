use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use lisp::{Environment, Evaluator, Keyword, TokenKind, parse, standard_builtins, tokenize};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};
use tracing_subscriber::EnvFilter;

const HISTORY_FILE: &str = "lisp_history.txt";
const SOURCE_NAME: &str = "<repl>";

struct LispCompleter {
    env: Rc<RefCell<Environment>>,
}

impl LispCompleter {
    fn new(env: Rc<RefCell<Environment>>) -> Self {
        LispCompleter { env }
    }

    fn candidates(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .env
            .borrow()
            .get_identifiers()
            .into_iter()
            .chain(Keyword::ALL.iter().map(|k| k.as_str().to_string()))
            .filter(|id| id.starts_with(prefix) && id.len() > prefix.len())
            .map(|id| id[prefix.len()..].to_string())
            .collect();
        names.sort();
        names
    }
}

impl rustyline::completion::Completer for LispCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        // Only complete a word that is still being typed
        if line[..pos].ends_with(|c: char| c.is_whitespace() || c == '(' || c == ')') {
            return Ok((pos, vec![]));
        }
        let candidates = match tokenize(&line[..pos]).pop().map(|t| t.kind) {
            Some(TokenKind::Identifier(prefix)) => self.candidates(&prefix),
            Some(TokenKind::Keyword(keyword)) => self.candidates(keyword.as_str()),
            _ => vec![],
        };
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputHelper {
    #[rustyline(Validator)]
    validator: LispValidator,
    #[rustyline(Highlighter)]
    highlighter: LispHighlighter,
    #[rustyline(Completer)]
    completer: LispCompleter,
}

// Characters that take part in paren matching, with comments blanked out.
fn code_chars(input: &str) -> impl Iterator<Item = (usize, char)> + '_ {
    let mut in_comment = false;
    input.chars().enumerate().filter(move |&(_, c)| {
        match c {
            '\n' => in_comment = false,
            ';' => in_comment = true,
            _ => {}
        }
        !in_comment
    })
}

struct LispValidator;

impl Validator for LispValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let mut depth = 0usize;
        for (i, c) in code_chars(ctx.input()) {
            match c {
                '(' => depth += 1,
                ')' if depth == 0 => {
                    return Ok(ValidationResult::Invalid(Some(format!(
                        "  - Unmatched ')' at position {}",
                        i
                    ))));
                }
                ')' => depth -= 1,
                _ => {}
            }
        }
        if depth > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct LispHighlighter;

impl Highlighter for LispHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        let mut stack: Vec<usize> = Vec::new();
        let mut highlighted = String::new();
        let mut in_comment = false;

        for (i, c) in line.chars().enumerate() {
            if in_comment || c == ';' {
                in_comment = c != '\n';
                highlighted.push_str(&format!("\x1b[90m{}\x1b[0m", c)); // Grey for comments
                continue;
            }
            match c {
                '(' => {
                    stack.push(highlighted.len());
                    highlighted.push(c);
                }
                ')' => match stack.pop() {
                    Some(matching_pos) if matching_pos + 1 == pos || i + 1 == pos => {
                        // Blue for matching parens
                        highlighted.push_str(&format!("\x1b[34m{}\x1b[0m", c));
                        highlighted
                            .replace_range(matching_pos..=matching_pos, "\x1b[1;34m(\x1b[0m");
                    }
                    Some(_) => highlighted.push(c),
                    // Red for unmatched
                    None => highlighted.push_str(&format!("\x1b[31m{}\x1b[0m", c)),
                },
                _ => highlighted.push(c),
            }
        }

        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn eval_line(input: &str, evaluator: &mut Evaluator, env: &Rc<RefCell<Environment>>) {
    let forms = match parse(input, Some(SOURCE_NAME)) {
        Ok(forms) => forms,
        Err(e) => {
            if e.pretty_print(SOURCE_NAME, input).is_err() {
                eprintln!("{}", e);
            }
            return;
        }
    };
    match evaluator.evaluate_program(&forms, env) {
        Ok(result) => println!("{}", result),
        Err(e) => {
            if e.pretty_print(SOURCE_NAME, input).is_err() {
                eprintln!("{}: {}", e.category(), e);
            }
        }
    }
}

fn repl() -> rustyline::Result<()> {
    println!("lisp REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let global_env = Environment::with_bindings(standard_builtins());
    let mut evaluator = Evaluator::new();
    let h = InputHelper {
        highlighter: LispHighlighter,
        validator: LispValidator,
        completer: LispCompleter::new(global_env.clone()),
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(rustyline::EditMode::Vi)
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(HISTORY_FILE).is_err() {
        println!("No previous history.");
    }

    loop {
        match rl.readline("lisp> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let trimmed_input = line.trim();
                if trimmed_input.is_empty() {
                    continue;
                }
                if trimmed_input.eq_ignore_ascii_case("exit") {
                    break;
                }
                eval_line(&line, &mut evaluator, &global_env);
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(HISTORY_FILE)
}

fn main() -> rustyline::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    repl()
}
