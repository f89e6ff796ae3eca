//! Token types for the block fixture format.

use std::fmt;

use crate::diagnostics::Span;

/// Words that read as values rather than names.
pub const KEYWORDS: [&str; 3] = ["true", "false", "null"];

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LBracket,
    RBracket,
    Equals,
    /// Bare word: entity names, field names, `true`/`false`/`null`
    Word(String),
    Int(i64),
    Float(f64),
    Str(String),
    Newline,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LBracket => f.write_str("'['"),
            TokenKind::RBracket => f.write_str("']'"),
            TokenKind::Equals => f.write_str("'='"),
            TokenKind::Word(w) => write!(f, "'{w}'"),
            TokenKind::Int(i) => write!(f, "integer {i}"),
            TokenKind::Float(x) => write!(f, "float {x}"),
            TokenKind::Str(_) => f.write_str("string"),
            TokenKind::Newline => f.write_str("end of line"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

pub fn is_word_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// True when `s` can be written without quotes and still lex back as the same word.
pub fn is_bare_word(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if is_word_start(c) => {}
        _ => return false,
    }
    chars.all(is_word_char) && !KEYWORDS.contains(&s)
}
