use crate::{EnvError, EvalError, ParseError, ParseErrorKind};
use ariadne::{Label, Report, ReportKind, Source};
use std::io;
use std::ops::Range;

type ReportSpan<'a> = (&'a str, Range<usize>);

impl EvalError {
    /// Builds an annotated report pointing at the node that failed.
    pub fn report<'a>(&self, name: &'a str) -> Report<'a, ReportSpan<'a>> {
        let span = self.position().span.to_range();
        let builder = Report::build(ReportKind::Error, (name, span.clone()))
            .with_code(self.category());
        let builder = match self {
            EvalError::EnvError(EnvError::UndefinedVariable(symbol, _)) => builder
                .with_message(format!("Undefined variable `{}`", symbol))
                .with_label(
                    Label::new((name, span))
                        .with_message("This name is not bound in any enclosing scope"),
                ),
            EvalError::NotCallable(type_name, _) => builder
                .with_message(format!("'{}' object is not callable", type_name))
                .with_label(
                    Label::new((name, span))
                        .with_message("This expression cannot be called as a function"),
                ),
            EvalError::InvalidArguments(message, _) => builder
                .with_message("Invalid arguments:")
                .with_label(Label::new((name, span)).with_message(message)),
            EvalError::NotImplemented(feature, _) => builder
                .with_message(format!("{} are not implemented", feature))
                .with_label(Label::new((name, span)).with_message("Found here")),
            EvalError::RecursionLimit(limit, _) => builder
                .with_message(format!("maximum recursion depth of {} exceeded", limit))
                .with_label(
                    Label::new((name, span))
                        .with_message("The innermost call was made here"),
                ),
        };
        builder.finish()
    }

    pub fn pretty_print(&self, name: &str, input: &str) -> io::Result<()> {
        self.report(name).eprint((name, Source::from(input)))
    }
}

impl ParseError {
    pub fn report<'a>(&self, name: &'a str, input: &str) -> Report<'a, ReportSpan<'a>> {
        let span = match &self.token {
            Some(token) => token.span.to_range(),
            None => input.len()..input.len(),
        };
        let label = match (self.kind, &self.token) {
            (ParseErrorKind::UnexpectedEof, Some(_)) => "This form is never closed".to_string(),
            (ParseErrorKind::UnexpectedEof, None) => "The input ended here".to_string(),
            _ => match self.details.first() {
                Some(detail) => detail.clone(),
                None => self.message.clone(),
            },
        };
        Report::build(ReportKind::Error, (name, span.clone()))
            .with_code(self.kind.category())
            .with_message(format!("{}: {}", self.kind, self.message))
            .with_label(Label::new((name, span)).with_message(label))
            .finish()
    }

    pub fn pretty_print(&self, name: &str, input: &str) -> io::Result<()> {
        self.report(name, input).eprint((name, Source::from(input)))
    }
}

impl crate::Error {
    pub fn pretty_print(&self, name: &str, input: &str) -> io::Result<()> {
        match self {
            crate::Error::Parse(e) => e.pretty_print(name, input),
            crate::Error::Eval(e) => e.pretty_print(name, input),
        }
    }
}
