//! Lexer for the block fixture format
//!
//! Handles tokenization including:
//! - Brackets and `=`
//! - Bare words (entity names, field names, `true`/`false`/`null`)
//! - Integer, float and double-quoted string literals
//! - `#` comments and significant newlines
//!
//! ## Module Structure
//!
//! - `tokens` - Token types (TokenKind, Token)
//! - `strings` - String literal scanning
//! - `numbers` - Numeric literal scanning

mod numbers;
mod strings;
pub mod tokens;

pub use tokens::{Token, TokenKind, is_bare_word};

use crate::diagnostics::{ParseError, Span};
use tokens::{is_word_char, is_word_start};

/// Lexer for block fixture text.
///
/// Stops at the first error; fixture files are small and one precise error beats a cascade.
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source text.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            tokens: Vec::new(),
        }
    }

    /// Tokenize the entire source. The token stream always ends with an `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        while !self.is_at_end() {
            self.scan_token()?;
        }
        self.tokens
            .push(Token::new(TokenKind::Eof, Span::new(self.current_pos, self.current_pos)));
        Ok(self.tokens)
    }

    // ========================================================================
    // Core character handling
    // ========================================================================

    fn is_at_end(&mut self) -> bool {
        self.chars.peek().is_none()
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.source[self.current_pos..].chars();
        iter.next();
        iter.next()
    }

    fn advance(&mut self) -> Option<char> {
        if let Some((pos, c)) = self.chars.next() {
            self.current_pos = pos + c.len_utf8();
            Some(c)
        } else {
            None
        }
    }

    fn error(&self, message: impl Into<String>, start: usize) -> ParseError {
        ParseError::new(message, self.source, Span::new(start, self.current_pos.max(start)))
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token::new(kind, Span::new(start, self.current_pos)));
    }

    // ========================================================================
    // Main scanning dispatch
    // ========================================================================

    fn scan_token(&mut self) -> Result<(), ParseError> {
        let start = self.current_pos;
        let Some(c) = self.peek() else {
            return Ok(());
        };

        match c {
            ' ' | '\t' | '\r' => {
                self.advance();
            }
            '#' => {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            }
            '\n' => {
                self.advance();
                self.push(TokenKind::Newline, start);
            }
            '[' => {
                self.advance();
                self.push(TokenKind::LBracket, start);
            }
            ']' => {
                self.advance();
                self.push(TokenKind::RBracket, start);
            }
            '=' => {
                self.advance();
                self.push(TokenKind::Equals, start);
            }
            '"' => {
                let value = self.scan_string()?;
                self.push(TokenKind::Str(value), start);
            }
            c if c.is_ascii_digit() => {
                let kind = self.scan_number()?;
                self.push(kind, start);
            }
            '-' | '+' if self.peek_next().is_some_and(|n| n.is_ascii_digit()) => {
                let kind = self.scan_number()?;
                self.push(kind, start);
            }
            c if is_word_start(c) => {
                while self.peek().is_some_and(is_word_char) {
                    self.advance();
                }
                let word = self.source[start..self.current_pos].to_string();
                self.push(TokenKind::Word(word), start);
            }
            other => {
                self.advance();
                return Err(self.error(format!("unexpected character '{}'", other.escape_debug()), start));
            }
        }
        Ok(())
    }
}

/// Tokenize block fixture text.
#[tracing::instrument(skip_all, fields(source_len = source.len()))]
pub fn lex(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source).tokenize()
}
