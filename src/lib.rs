// Declare modules publicly so they are part of the library interface
pub mod environment;
pub mod evaluator;
pub mod grammar;
pub mod lexer;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod source;
pub mod types;

pub use environment::{EnvError, Environment};
pub use evaluator::{EvalConfig, EvalError, EvalResult, Evaluator, evaluate};
pub use grammar::{Node, NodeKind, Number};
pub use lexer::{Keyword, Paren, Token, TokenKind, tokenize};
pub use parser::{ParseError, ParseErrorKind, Parser, parse, parse_str};
pub use primitives::standard_builtins;
pub use source::{Position, Span};
pub use types::{Primitive, PrimitiveFunc, Procedure, Value};

use thiserror::Error;

/// Anything that can go wrong between source text and a final value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl Error {
    pub fn category(&self) -> &'static str {
        match self {
            Error::Parse(e) => e.kind.category(),
            Error::Eval(e) => e.category(),
        }
    }
}

/// Parses and evaluates `source` in a fresh global environment seeded from
/// `builtins`. `source_name` is quoted in parse errors.
pub fn run<I>(source: &str, source_name: Option<&str>, builtins: I) -> Result<Value, Error>
where
    I: IntoIterator<Item = (String, Value)>,
{
    let forms = parse(source, source_name)?;
    Ok(evaluate(&forms, builtins)?)
}
