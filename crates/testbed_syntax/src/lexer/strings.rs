//! String literal scanning.

use super::Lexer;
use crate::diagnostics::ParseError;

impl Lexer<'_> {
    /// Scan a double-quoted string, returning its unescaped contents.
    ///
    /// Supported escapes: `\" \\ \n \t \r \u{XXXX}`. Strings end on the same line they start.
    pub(super) fn scan_string(&mut self) -> Result<String, ParseError> {
        let start = self.current_pos;
        self.advance(); // opening quote

        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => return Err(self.error("unterminated string literal", start)),
                Some('"') => {
                    self.advance();
                    return Ok(value);
                }
                Some('\\') => {
                    let escape_start = self.current_pos;
                    self.advance();
                    match self.advance() {
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('u') => value.push(self.scan_unicode_escape(escape_start)?),
                        Some(other) => {
                            return Err(self.error(
                                format!("unknown escape '\\{}'", other.escape_debug()),
                                escape_start,
                            ));
                        }
                        None => return Err(self.error("unterminated string literal", start)),
                    }
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }
    }

    fn scan_unicode_escape(&mut self, escape_start: usize) -> Result<char, ParseError> {
        if self.advance() != Some('{') {
            return Err(self.error("expected '{' after '\\u'", escape_start));
        }
        let digits_start = self.current_pos;
        while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            self.advance();
        }
        let source = self.source;
        let digits = &source[digits_start..self.current_pos];
        if self.advance() != Some('}') || digits.is_empty() || digits.len() > 6 {
            return Err(self.error("malformed unicode escape", escape_start));
        }
        u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(format!("invalid unicode scalar value '{digits}'"), escape_start))
    }
}

#[cfg(test)]
mod tests {
    use crate::lexer::{TokenKind, lex};

    fn string(source: &str) -> String {
        match lex(source).unwrap().remove(0).kind {
            TokenKind::Str(s) => s,
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn test_escapes() {
        assert_eq!(string(r#""say \"hi\"""#), "say \"hi\"");
        assert_eq!(string(r#""a\\b""#), "a\\b");
        assert_eq!(string(r#""\u{e9}t\u{e9}""#), "été");
    }

    #[test]
    fn test_non_ascii_passthrough() {
        assert_eq!(string("\"naïve ☃\""), "naïve ☃");
    }

    #[test]
    fn test_bad_escapes() {
        assert!(lex(r#""\q""#).is_err());
        assert!(lex(r#""\u{}""#).is_err());
        assert!(lex(r#""\u{d800}""#).is_err());
        assert!(lex(r#""\u41""#).is_err());
    }
}
