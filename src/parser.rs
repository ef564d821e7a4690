use crate::grammar::{Node, NodeKind};
use crate::lexer::{Keyword, Paren, Token, TokenKind};
use crate::source::Position;
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("Type error")]
    Type,
    #[error("Unexpected EOF")]
    UnexpectedEof,
    #[error("Unexpected token")]
    UnexpectedToken,
    #[error("Not implemented")]
    NotImplemented,
}

impl ParseErrorKind {
    /// The error category this kind belongs to.
    pub fn category(self) -> &'static str {
        match self {
            ParseErrorKind::Type => "TypeError",
            ParseErrorKind::UnexpectedEof | ParseErrorKind::UnexpectedToken => "SyntaxError",
            ParseErrorKind::NotImplemented => "NotImplementedError",
        }
    }
}

/// The source line an error points at, with the caret offset in characters.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    pub name: String,
    pub text: String,
    pub caret: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub details: Vec<String>,
    /// The offending token, `None` when the stream ran dry.
    pub token: Option<Token>,
    /// At most the next two tokens left in the stream when the error was raised.
    pub upcoming: Vec<Token>,
    pub location: Option<SourceLine>,
}

impl ParseError {
    pub fn position(&self) -> Option<Position> {
        self.token.as_ref().map(Token::position)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(location), Some(token)) = (&self.location, &self.token) {
            writeln!(f, "File {}, line {}", location.name, token.row)?;
            writeln!(f, "  {}: {}", self.kind, self.message)?;
            writeln!(f, "\t{}", location.text)?;
            writeln!(f, "\t{}^^^", " ".repeat(location.caret))?;
        } else {
            writeln!(f, "{}: {}", self.kind, self.message)?;
        }
        for detail in &self.details {
            writeln!(f, "    {}", detail)?;
        }
        match &self.token {
            Some(token) => writeln!(f, "  Token: {}", token)?,
            None => writeln!(f, "  Token: <EOF>")?,
        }
        write!(f, "  Next 2 tokens: [")?;
        for (i, token) in self.upcoming.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", token)?;
        }
        write!(f, "]")
    }
}

impl std::error::Error for ParseError {}

// Result type alias for convenience
pub type ParseResult<T> = Result<T, ParseError>;

fn join_nodes(nodes: &[Node]) -> String {
    nodes
        .iter()
        .map(Node::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Recursive-descent parser state. Tokens are consumed strictly left to right
/// with one token of lookahead.
pub struct Parser<'src> {
    tokens: VecDeque<Token>,
    source: Option<&'src str>,
    source_name: Option<String>,
}

impl<'src> Parser<'src> {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens.into(),
            source: None,
            source_name: None,
        }
    }

    /// A parser whose errors can quote the offending source line.
    pub fn with_source(tokens: Vec<Token>, source: &'src str, source_name: Option<&str>) -> Self {
        Parser {
            tokens: tokens.into(),
            source: Some(source),
            source_name: source_name.map(str::to_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    // Consumes the next token if available.
    fn next_token(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    fn peek_token(&self) -> Option<&Token> {
        self.tokens.front()
    }

    fn locate(&self, token: &Token) -> Option<SourceLine> {
        let source = self.source?;
        let name = self.source_name.as_ref()?;
        let before = source.get(..token.span.start)?;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let text = source[line_start..].split('\n').next().unwrap_or_default();
        Some(SourceLine {
            name: name.clone(),
            text: text.trim_end_matches('\r').to_string(),
            caret: before[line_start..].chars().count(),
        })
    }

    fn error(
        &self,
        kind: ParseErrorKind,
        token: Option<&Token>,
        message: impl Into<String>,
        details: Vec<String>,
    ) -> ParseError {
        ParseError {
            kind,
            message: message.into(),
            details,
            token: token.cloned(),
            upcoming: self.tokens.iter().take(2).cloned().collect(),
            location: token.and_then(|t| self.locate(t)),
        }
    }

    fn unexpected_eof(&self, opener: Option<&Token>) -> ParseError {
        self.error(
            ParseErrorKind::UnexpectedEof,
            opener,
            "ran out of tokens",
            vec![],
        )
    }

    // Checks the lookahead token. Running out of tokens while a form is
    // still open is an error attributed to the token that opened it.
    fn next_is(&self, paren: Paren, opener: &Token) -> ParseResult<bool> {
        match self.peek_token() {
            Some(token) => Ok(token.is_paren(paren)),
            None => Err(self.unexpected_eof(Some(opener))),
        }
    }

    /// Parses a single form from the token stream.
    pub fn parse_tree(&mut self) -> ParseResult<Node> {
        let Some(token) = self.next_token() else {
            return Err(self.unexpected_eof(None));
        };
        match token.kind {
            TokenKind::Parenthesis(Paren::Open) => self.parse_group(token),
            TokenKind::Parenthesis(Paren::Close) => Err(self.error(
                ParseErrorKind::UnexpectedToken,
                Some(&token),
                "')' without a matching '('",
                vec![],
            )),
            TokenKind::Constant(n) => Ok(Node::new_const(n, token.position())),
            TokenKind::Identifier(ref name) => Ok(Node::new_ident(name.clone(), token.position())),
            TokenKind::Keyword(keyword) => self.parse_keyword(keyword, token),
            TokenKind::Symbol(_) => Err(self.error(
                ParseErrorKind::UnexpectedToken,
                Some(&token),
                format!("Unknown token: {}", token.kind.type_name()),
                vec![],
            )),
        }
    }

    /// Parses a parenthesized form. A leading identifier makes it a call,
    /// otherwise the children form a `Vector`.
    fn parse_group(&mut self, open: Token) -> ParseResult<Node> {
        let head = match self.peek_token() {
            Some(token) => match &token.kind {
                TokenKind::Identifier(name) => {
                    Some(Node::new_ident(name.clone(), token.position()))
                }
                _ => None,
            },
            None => return Err(self.unexpected_eof(Some(&open))),
        };
        if head.is_some() {
            self.next_token();
        }

        let mut children = Vec::new();
        while !self.next_is(Paren::Close, &open)? {
            children.push(self.parse_tree()?);
        }
        let close = self
            .next_token()
            .ok_or_else(|| self.unexpected_eof(Some(&open)))?;

        let pos = Position::new(open.row, open.col, open.span.merge(close.span));
        let kind = match head {
            Some(callee) => NodeKind::Call {
                callee: Box::new(callee),
                args: children,
            },
            None => NodeKind::Vector(children),
        };
        Ok(Node::new(kind, pos))
    }

    fn parse_keyword(&mut self, keyword: Keyword, token: Token) -> ParseResult<Node> {
        match keyword {
            Keyword::Macro => Err(self.error(
                ParseErrorKind::NotImplemented,
                Some(&token),
                format!("Macros are not yet supported '{}'", keyword),
                vec![],
            )),
            Keyword::Arrow => {
                // Parameters are every form before the next '(' and the body
                // runs until the ')' of the enclosing form.
                let mut args = Vec::new();
                while !self.next_is(Paren::Open, &token)? {
                    args.push(self.parse_tree()?);
                }
                let mut body = Vec::new();
                while !self.next_is(Paren::Close, &token)? {
                    body.push(self.parse_tree()?);
                }
                let params: Option<Vec<String>> = args
                    .iter()
                    .map(|arg| arg.as_ident().map(str::to_string))
                    .collect();
                let Some(params) = params else {
                    return Err(self.error(
                        ParseErrorKind::Type,
                        Some(&token),
                        "Invalid argument signature - expected a single identifier or a block of identifiers",
                        vec![
                            format!("args: [{}]", join_nodes(&args)),
                            format!("body: [{}]", join_nodes(&body)),
                        ],
                    ));
                };
                let span = body
                    .last()
                    .map_or(token.span, |last| token.span.merge(last.pos.span));
                Ok(Node::new(
                    NodeKind::Function { params, body },
                    Position::new(token.row, token.col, span),
                ))
            }
            Keyword::Def => {
                let callee = self.parse_tree()?;
                let mut args = Vec::new();
                while !self.next_is(Paren::Close, &token)? {
                    args.push(self.parse_tree()?);
                }
                let end = args.last().unwrap_or(&callee).pos.span;
                Ok(Node::new(
                    NodeKind::Call {
                        callee: Box::new(callee),
                        args,
                    },
                    Position::new(token.row, token.col, token.span.merge(end)),
                ))
            }
            Keyword::Let => {
                let target = self.parse_tree()?;
                let body = self.parse_tree()?;
                let Some(name) = target.as_ident().map(str::to_string) else {
                    return Err(self.error(
                        ParseErrorKind::Type,
                        Some(&token),
                        format!("Invalid identifier for let binding: {}, expected 'ident'", target),
                        vec![],
                    ));
                };
                let span = token.span.merge(body.pos.span);
                Ok(Node::new(
                    NodeKind::Let {
                        target: name,
                        body: Box::new(body),
                    },
                    Position::new(token.row, token.col, span),
                ))
            }
            Keyword::If => {
                let clause = self.parse_tree()?;
                let action = self.parse_tree()?;
                let has_else = self
                    .peek_token()
                    .is_some_and(|next| !next.is_paren(Paren::Close));
                let orelse = if has_else {
                    Some(Box::new(self.parse_tree()?))
                } else {
                    None
                };
                let end = orelse.as_ref().map_or(action.pos.span, |o| o.pos.span);
                Ok(Node::new(
                    NodeKind::If {
                        clause: Box::new(clause),
                        action: Box::new(action),
                        orelse,
                    },
                    Position::new(token.row, token.col, token.span.merge(end)),
                ))
            }
            // `else` only separates the branches of an `if`
            Keyword::Else => self.parse_tree(),
            Keyword::And | Keyword::Or => {
                let left = self.parse_tree()?;
                let right = self.parse_tree()?;
                let span = token.span.merge(right.pos.span);
                Ok(Node::new(
                    NodeKind::BinOp {
                        op: Box::new(Node::new_ident(keyword.as_str(), token.position())),
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    Position::new(token.row, token.col, span),
                ))
            }
        }
    }

    /// Parses every remaining token into a sequence of top-level forms.
    pub fn parse(mut self) -> ParseResult<Vec<Node>> {
        let mut forms = Vec::new();
        while !self.is_empty() {
            let form = self.parse_tree()?;
            tracing::debug!(form = %form, "parsed top-level form");
            forms.push(form);
        }
        Ok(forms)
    }
}

/// Tokenizes and parses `source`. When `source_name` is given, errors quote
/// the offending line of `source`.
pub fn parse(source: &str, source_name: Option<&str>) -> ParseResult<Vec<Node>> {
    let tokens = crate::lexer::tokenize(source);
    Parser::with_source(tokens, source, source_name).parse()
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Vec<Node>> {
    parse(input, None)
}
