//! Numeric literal scanning.

use super::Lexer;
use super::tokens::{TokenKind, is_word_char};
use crate::diagnostics::ParseError;

impl Lexer<'_> {
    /// Scan `[+-]digits[.digits][(e|E)[+-]digits]`.
    ///
    /// A fraction or exponent makes the literal a float; otherwise it is an `i64`.
    pub(super) fn scan_number(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.current_pos;
        let mut is_float = false;

        if matches!(self.peek(), Some('-' | '+')) {
            self.advance();
        }
        self.consume_digits();

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            self.consume_digits();
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let exponent_start = self.current_pos;
            self.advance();
            if matches!(self.peek(), Some('-' | '+')) {
                self.advance();
            }
            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                return Err(self.error("malformed exponent", exponent_start));
            }
            is_float = true;
            self.consume_digits();
        }

        if self.peek().is_some_and(is_word_char) {
            while self.peek().is_some_and(is_word_char) {
                self.advance();
            }
            return Err(self.error(
                format!("invalid numeric literal '{}'", &self.source[start..self.current_pos]),
                start,
            ));
        }

        let text = &self.source[start..self.current_pos];
        if is_float {
            let value = text
                .parse::<f64>()
                .map_err(|e| self.error(format!("invalid float literal '{text}': {e}"), start))?;
            if !value.is_finite() {
                return Err(self.error(format!("float literal '{text}' is out of range"), start));
            }
            Ok(TokenKind::Float(value))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| self.error(format!("integer literal '{text}' is out of range"), start))
        }
    }

    fn consume_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }
}
