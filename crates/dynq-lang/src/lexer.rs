//! Lexer for condition expressions using logos.

use crate::error::ParseError;
use crate::span::Span;
use logos::Logos;

/// Token types for the condition-expression language.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // Placeholders
    #[regex(r"#[A-Za-z0-9_]+", |lex| lex.slice().to_string())]
    NamePlaceholder(String),
    #[regex(r":[A-Za-z0-9_]+", |lex| lex.slice().to_string())]
    ValuePlaceholder(String),

    // Keywords and function names are matched case-insensitively by the parser
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // List index inside a document path
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<usize>().ok())]
    Index(usize),

    // Comparators
    #[token("=")]
    Eq,
    #[token("<>")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    // Punctuation
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
}

impl Token {
    /// Whether this token is the given keyword, ignoring ASCII case.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident(name) if name.eq_ignore_ascii_case(keyword))
    }
}

/// A token with its span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Tokenize an expression.
///
/// Unlike a lenient lexer this fails on the first unrecognised character, since a
/// malformed expression must never be partially evaluated.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span: Span = lexer.span().into();
        match result {
            Ok(token) => tokens.push(SpannedToken { token, span }),
            Err(()) => {
                return Err(ParseError::new(
                    format!("unexpected character '{}'", lexer.slice()),
                    span,
                ))
            }
        }
    }

    Ok(tokens)
}
