//! Parse errors with source locations.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Source location span (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Malformed fixture or transcript text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    /// 1-based line
    pub line: usize,
    /// 1-based column (in chars)
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, source: &str, span: Span) -> Self {
        let (line, column) = line_col(source, span.start);
        Self {
            message: message.into(),
            span,
            line,
            column,
        }
    }

    /// Error at the start of a 1-based line.
    pub fn at_line(message: impl Into<String>, source: &str, line: usize) -> Self {
        let start = line_offset(source, line);
        let end = source[start..].find('\n').map_or(source.len(), |i| start + i);
        Self::new(message, source, Span::new(start, end))
    }

    /// Attach the source text for rich rendering.
    pub fn to_diagnostic(&self, origin: &str, source: &str) -> SourceDiagnostic {
        let start = self.span.start.min(source.len());
        let len = self.span.len().min(source.len() - start);
        SourceDiagnostic {
            message: self.to_string(),
            src: NamedSource::new(origin, source.to_string()),
            span: SourceSpan::new(start.into(), len),
        }
    }
}

/// A parse error bundled with its source, for `miette` reports.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(testbed::parse))]
pub struct SourceDiagnostic {
    message: String,
    #[source_code]
    src: NamedSource<String>,
    #[label("here")]
    span: SourceSpan,
}

/// 1-based (line, column) of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Byte offset where a 1-based line starts. Lines past the end map to `source.len()`.
pub fn line_offset(source: &str, line: usize) -> usize {
    if line <= 1 {
        return 0;
    }
    source
        .match_indices('\n')
        .nth(line - 2)
        .map_or(source.len(), |(i, _)| i + 1)
}
