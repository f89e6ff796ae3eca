//! Block fixture format.
//!
//! ```text
//! # Two polls and a choice.
//! [polls.poll 1]
//! question = "What's up?"
//! votes = 0
//!
//! [polls.choice "c-1"]
//! poll = 1
//! text = "Not much"
//! ```
//!
//! A header `[<entity> <pk>]` opens a record; `name = value` lines fill it. Entity and field names are bare words or
//! double-quoted strings. The primary key is an integer or a string. Values are `null`, `true`, `false`, integers,
//! floats (with a `.` or exponent) and strings.

use testbed_core::{PrimaryKey, Record, Value};

use crate::diagnostics::{ParseError, Span};
use crate::format::WriteError;
use crate::lexer::{Token, TokenKind, is_bare_word, lex};

/// Parse block fixture text into records, in declaration order.
#[tracing::instrument(skip_all, fields(source_len = source.len()))]
pub fn parse(source: &str) -> Result<Vec<Record>, ParseError> {
    let tokens = lex(source)?;
    Parser::new(source, &tokens).parse()
}

/// Parse a single scalar value (`1`, `2.5`, `"text"`, `true`, `null`).
pub fn parse_scalar(text: &str) -> Result<Value, ParseError> {
    let tokens = lex(text)?;
    let mut parser = Parser::new(text, &tokens);
    let value = parser.value()?;
    parser.expect_end_of_input()?;
    Ok(value)
}

/// Parse a single primary key (`1` or `"key"`).
pub fn parse_key(text: &str) -> Result<PrimaryKey, ParseError> {
    let tokens = lex(text)?;
    let mut parser = Parser::new(text, &tokens);
    let key = parser.key()?;
    parser.expect_end_of_input()?;
    Ok(key)
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: &'a [Token]) -> Self {
        Self { source, tokens, pos: 0 }
    }

    fn parse(mut self) -> Result<Vec<Record>, ParseError> {
        let mut records: Vec<Record> = Vec::new();

        loop {
            match &self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.bump();
                }
                TokenKind::LBracket => {
                    records.push(self.header()?);
                }
                TokenKind::Word(_) | TokenKind::Str(_) => {
                    let name_token = self.peek().clone();
                    let Some(record) = records.last_mut() else {
                        return Err(self.error_at("field assignment before any [entity pk] header", name_token.span));
                    };
                    let (name, value) = self.assignment()?;
                    if record.fields.contains_key(&name) {
                        return Err(self.error_at(
                            format!("field '{name}' is assigned twice in {}({})", record.entity, record.key),
                            name_token.span,
                        ));
                    }
                    record.fields.insert(name, value);
                }
                other => {
                    let message = format!("expected '[' or a field name, found {other}");
                    return Err(self.error_here(message));
                }
            }
        }

        tracing::debug!(records = records.len(), "parsed block fixture");
        Ok(records)
    }

    // ========================================================================
    // Productions
    // ========================================================================

    fn header(&mut self) -> Result<Record, ParseError> {
        self.bump(); // '['
        let entity = self.name("an entity name")?;
        let key = self.key()?;
        self.expect(&TokenKind::RBracket, "']'")?;
        self.expect_end_of_line()?;
        Ok(Record::new(entity, key))
    }

    fn assignment(&mut self) -> Result<(String, Value), ParseError> {
        let name = self.name("a field name")?;
        self.expect(&TokenKind::Equals, "'='")?;
        let value = self.value()?;
        self.expect_end_of_line()?;
        Ok((name, value))
    }

    fn name(&mut self, what: &str) -> Result<String, ParseError> {
        match &self.peek().kind {
            TokenKind::Word(w) => {
                let w = w.clone();
                self.bump();
                Ok(w)
            }
            TokenKind::Str(s) => {
                let s = s.clone();
                self.bump();
                Ok(s)
            }
            other => {
                let message = format!("expected {what}, found {other}");
                Err(self.error_here(message))
            }
        }
    }

    fn key(&mut self) -> Result<PrimaryKey, ParseError> {
        match &self.peek().kind {
            TokenKind::Int(i) => {
                let key = PrimaryKey::Int(*i);
                self.bump();
                Ok(key)
            }
            TokenKind::Str(s) => {
                let key = PrimaryKey::Str(s.clone());
                self.bump();
                Ok(key)
            }
            other => {
                let message = format!("expected a primary key (integer or string), found {other}");
                Err(self.error_here(message))
            }
        }
    }

    fn value(&mut self) -> Result<Value, ParseError> {
        let value = match &self.peek().kind {
            TokenKind::Int(i) => Value::Int(*i),
            TokenKind::Float(x) => Value::Float(*x),
            TokenKind::Str(s) => Value::Str(s.clone()),
            TokenKind::Word(w) if w == "true" => Value::Bool(true),
            TokenKind::Word(w) if w == "false" => Value::Bool(false),
            TokenKind::Word(w) if w == "null" => Value::Null,
            TokenKind::Word(w) => {
                let message = format!("expected a value, found bare word '{w}' (strings must be quoted)");
                return Err(self.error_here(message));
            }
            other => {
                let message = format!("expected a value, found {other}");
                return Err(self.error_here(message));
            }
        };
        self.bump();
        Ok(value)
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn peek(&self) -> &'a Token {
        // The lexer always terminates the stream with Eof, and `bump` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), ParseError> {
        if &self.peek().kind == kind {
            self.bump();
            Ok(())
        } else {
            let message = format!("expected {what}, found {}", self.peek().kind);
            Err(self.error_here(message))
        }
    }

    fn expect_end_of_line(&mut self) -> Result<(), ParseError> {
        match self.peek().kind {
            TokenKind::Newline => {
                self.bump();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            ref other => {
                let message = format!("expected end of line, found {other}");
                Err(self.error_here(message))
            }
        }
    }

    fn expect_end_of_input(&mut self) -> Result<(), ParseError> {
        while self.peek().kind == TokenKind::Newline {
            self.bump();
        }
        match self.peek().kind {
            TokenKind::Eof => Ok(()),
            ref other => {
                let message = format!("unexpected {other} after value");
                Err(self.error_here(message))
            }
        }
    }

    fn error_here(&self, message: String) -> ParseError {
        self.error_at(message, self.peek().span)
    }

    fn error_at(&self, message: impl Into<String>, span: Span) -> ParseError {
        ParseError::new(message, self.source, span)
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Write records as block fixture text. Fields are written in name order; records are separated by a blank line.
pub fn write(records: &[Record]) -> Result<String, WriteError> {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push('[');
        out.push_str(&write_name(&record.entity));
        out.push(' ');
        out.push_str(&record.key.to_string());
        out.push_str("]\n");
        for (name, value) in &record.fields {
            if value.is_non_finite() {
                return Err(WriteError::NonFiniteFloat {
                    entity: record.entity.clone(),
                    key: record.key.to_string(),
                    field: name.clone(),
                });
            }
            out.push_str(&write_name(name));
            out.push_str(" = ");
            out.push_str(&value.to_string());
            out.push('\n');
        }
    }
    Ok(out)
}

fn write_name(name: &str) -> String {
    if is_bare_word(name) {
        name.to_string()
    } else {
        testbed_core::quote_str(name)
    }
}
