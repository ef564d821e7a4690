use logos::Logos;
use std::fmt;
use std::str::FromStr;

use crate::grammar::Number;
use crate::source::{Position, Span};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Paren {
    Open,
    Close,
}

impl Paren {
    pub fn as_char(self) -> char {
        match self {
            Paren::Open => '(',
            Paren::Close => ')',
        }
    }
}

/// The reserved words. Each one has bespoke parsing rules.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Keyword {
    Macro,
    Arrow,
    Def,
    Let,
    If,
    Else,
    And,
    Or,
}

impl Keyword {
    pub const ALL: [Keyword; 8] = [
        Keyword::Macro,
        Keyword::Arrow,
        Keyword::Def,
        Keyword::Let,
        Keyword::If,
        Keyword::Else,
        Keyword::And,
        Keyword::Or,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Macro => "@macro",
            Keyword::Arrow => "=>",
            Keyword::Def => "def",
            Keyword::Let => "let",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::And => "and",
            Keyword::Or => "or",
        }
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Keyword::ALL
            .into_iter()
            .find(|keyword| keyword.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw pieces of a single source line. Whitespace is kept so that it
/// still advances the column counter.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r";[^\n]*")] // Skip comments
enum Fragment {
    #[token("(", |_| Paren::Open)]
    #[token(")", |_| Paren::Close)]
    Paren(Paren),
    #[token("@macro", |_| Keyword::Macro)]
    #[token("=>", |_| Keyword::Arrow)]
    #[token("def", |_| Keyword::Def)]
    #[token("let", |_| Keyword::Let)]
    #[token("if", |_| Keyword::If)]
    #[token("else", |_| Keyword::Else)]
    #[token("and", |_| Keyword::And)]
    #[token("or", |_| Keyword::Or)]
    Keyword(Keyword),
    #[regex(r"\s")]
    Space,
    #[regex(r"[^()\s;]+", |lex| lex.slice().to_string())]
    Word(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Parenthesis(Paren),
    Constant(Number),
    Keyword(Keyword),
    Identifier(String),
    Symbol(String),
}

impl TokenKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            TokenKind::Parenthesis(_) => "Parenthesis",
            TokenKind::Constant(_) => "Constant",
            TokenKind::Keyword(_) => "Keyword",
            TokenKind::Identifier(_) => "Identifier",
            TokenKind::Symbol(_) => "Symbol",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Parenthesis(p) => write!(f, "{}", p.as_char()),
            TokenKind::Constant(n) => write!(f, "{}", n),
            TokenKind::Keyword(k) => write!(f, "{}", k),
            TokenKind::Identifier(s) | TokenKind::Symbol(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub row: usize,
    pub col: usize,
    pub span: Span,
}

impl Token {
    pub fn position(&self) -> Position {
        Position::new(self.row, self.col, self.span)
    }

    pub fn is_paren(&self, paren: Paren) -> bool {
        self.kind == TokenKind::Parenthesis(paren)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token('{}', {}, row={}, col={})",
            self.kind,
            self.kind.type_name(),
            self.row,
            self.col
        )
    }
}

// Mirrors the identifier pattern `([+-.*/<=>!?:$%_&~|a-zA-Z^]+)([0-9]|\1)*`,
// which only has to match a prefix of the word.
fn is_identifier(word: &str) -> bool {
    word.chars().next().is_some_and(|c| {
        c.is_ascii_alphabetic()
            || matches!(
                c,
                '+' | ',' | '-' | '.' | '*' | '/' | '<' | '=' | '>' | '!' | '?' | ':' | '$'
                    | '%' | '_' | '&' | '~' | '|' | '^'
            )
    })
}

fn classify(word: String) -> TokenKind {
    if let Ok(n) = word.parse::<i64>() {
        TokenKind::Constant(Number::Int(n))
    } else if let Ok(n) = word.parse::<f64>() {
        TokenKind::Constant(Number::Float(n))
    } else if is_identifier(&word) {
        TokenKind::Identifier(word)
    } else {
        TokenKind::Symbol(word)
    }
}

fn tokenize_line(line: &str, row: usize, offset: usize, tokens: &mut Vec<Token>) {
    for (col, (result, range)) in Fragment::lexer(line).spanned().enumerate() {
        let kind = match result {
            Ok(Fragment::Space) => continue,
            Ok(Fragment::Paren(paren)) => TokenKind::Parenthesis(paren),
            Ok(Fragment::Keyword(keyword)) => TokenKind::Keyword(keyword),
            Ok(Fragment::Word(word)) => classify(word),
            // Every character is covered by some fragment, keep anything odd as a symbol
            Err(()) => TokenKind::Symbol(line[range.clone()].to_string()),
        };
        tokens.push(Token {
            kind,
            row,
            col,
            span: Span::new(offset + range.start, offset + range.end),
        });
    }
}

/// Splits `source` into classified tokens, line by line. Blank lines are skipped
/// and `;` starts a comment that runs to the end of the line.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut offset = 0;
    for (index, line) in source.split('\n').enumerate() {
        if !line.trim().is_empty() {
            tokenize_line(line, index + 1, offset, &mut tokens);
        }
        offset += line.len() + 1;
    }
    tracing::trace!(count = tokens.len(), "tokenized source");
    tokens
}
