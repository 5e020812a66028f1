//! Tokenizer for `where` filter strings.
//!
//! The lexer only understands as much of the filter grammar as relation detection
//! needs. Every token keeps the byte span it was read from, so later stages can
//! replace clauses by offset instead of re-matching text.

use std::iter::Peekable;
use std::str::CharIndices;

use serde::Serialize;
use thiserror::Error;

/// Byte range `[start, end)` of a token or clause in the filter string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns the spanned text of `source`, if the span fits.
    pub fn slice<'a>(&self, source: &'a str) -> Option<&'a str> {
        source.get(self.start..self.end)
    }
}

/// Quote character used by a string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStyle {
    Double,
    Single,
}

/// Comparison symbols. `like` is lexed as an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Number(String),
    Str { value: String, quote: QuoteStyle },
    Symbol(Symbol),
    Dot,
    Comma,
    LParen,
    RParen,
    Other(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("Unterminated string literal starting at byte {0}")]
    UnterminatedString(usize),
}

/// Splits `input` into tokens, skipping whitespace.
///
/// Literals are first read with backslash escapes. If that leaves a literal
/// unterminated (e.g. `path="C:\"`), the input is read again with backslashes
/// taken literally; the first error is returned when both readings fail.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    tokenize_with(input, true).or_else(|escaped_err| tokenize_with(input, false).map_err(|_| escaped_err))
}

fn tokenize_with(input: &str, escapes: bool) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        input,
        chars: input.char_indices().peekable(),
        escapes,
    };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    escapes: bool,
}

impl Lexer<'_> {
    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((start, c)) = self.chars.next() else {
            return Ok(None);
        };

        let kind = match c {
            '"' => self.string(start, '"', QuoteStyle::Double)?,
            '\'' => self.string(start, '\'', QuoteStyle::Single)?,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '=' => TokenKind::Symbol(Symbol::Eq),
            '!' if self.eat('=') => TokenKind::Symbol(Symbol::Ne),
            '<' if self.eat('=') => TokenKind::Symbol(Symbol::Le),
            '<' => TokenKind::Symbol(Symbol::Lt),
            '>' if self.eat('=') => TokenKind::Symbol(Symbol::Ge),
            '>' => TokenKind::Symbol(Symbol::Gt),
            c if c.is_alphabetic() || c == '_' => {
                TokenKind::Ident(self.take_while(start, |c| c.is_alphanumeric() || c == '_').to_string())
            }
            c if c.is_ascii_digit() => {
                TokenKind::Number(self.take_while(start, |c| c.is_ascii_alphanumeric() || c == '.').to_string())
            }
            other => TokenKind::Other(other),
        };

        Ok(Some(Token {
            kind,
            span: Span::new(start, self.offset()),
        }))
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |(i, _)| *i)
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|(_, c)| *c == expected).is_some()
    }

    fn take_while(&mut self, start: usize, pred: impl Fn(char) -> bool) -> &str {
        while self.chars.next_if(|(_, c)| pred(*c)).is_some() {}
        let end = self.offset();
        &self.input[start..end]
    }

    /// Reads a quoted literal. In escape mode a backslash escapes the following character.
    fn string(&mut self, start: usize, close: char, quote: QuoteStyle) -> Result<TokenKind, LexError> {
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\\')) if self.escapes => match self.chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => return Err(LexError::UnterminatedString(start)),
                },
                Some((_, c)) if c == close => return Ok(TokenKind::Str { value, quote }),
                Some((_, c)) => value.push(c),
                None => return Err(LexError::UnterminatedString(start)),
            }
        }
    }
}
