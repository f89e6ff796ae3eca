//! Transcript documents.
//!
//! A transcript records a session: input directives and the literal output each one must produce.
//!
//! ```text
//! @unit poll_counts
//! @fixtures polls, choices
//! Prose between steps is ignored.
//! >>> count polls.poll
//! 2
//! >>> get polls.poll 1
//! {"question": "What's up?"}
//! ```
//!
//! - `@unit <name>` starts a unit; `@fixtures a, b` and `@skip <reason>` annotate it.
//! - `>>> <directive>` is one step. The lines after it, up to a blank line, the next `>>>` or the next `@` header, are
//!   the expected output, joined with `\n`. `<BLANKLINE>` stands for an empty expected line.
//! - Expected text is kept verbatim: no trimming, no quote or whitespace normalization.
//! - Lines end in `\n` or `\r\n`. The `\r` of a CRLF ending is part of the line ending, so a transcript saved with
//!   Windows line endings expects the same output as one saved with Unix endings. Any other `\r` is kept.

use crate::diagnostics::ParseError;

const DIRECTIVE_PREFIX: &str = ">>>";
const BLANKLINE_MARKER: &str = "<BLANKLINE>";

/// One directive and the output it must produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub directive: String,
    pub expected: String,
    /// 1-based line of the `>>>` directive
    pub line: usize,
}

/// A unit declared with `@unit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptUnit {
    pub name: String,
    pub fixtures: Vec<String>,
    pub skip: Option<String>,
    pub steps: Vec<Step>,
    /// 1-based line of the `@unit` header
    pub line: usize,
}

/// A parsed transcript file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptDocument {
    pub name: String,
    pub units: Vec<TranscriptUnit>,
}

struct PendingStep {
    directive: String,
    line: usize,
    expected: Vec<String>,
}

impl PendingStep {
    fn finish(self) -> Step {
        Step {
            directive: self.directive,
            expected: self.expected.join("\n"),
            line: self.line,
        }
    }
}

/// Parse transcript text. `name` identifies the document (usually the file stem).
#[tracing::instrument(skip_all, fields(document = name, source_len = source.len()))]
pub fn parse(name: &str, source: &str) -> Result<TranscriptDocument, ParseError> {
    let mut units: Vec<TranscriptUnit> = Vec::new();
    let mut pending: Option<PendingStep> = None;

    for (index, raw_line) in source.split('\n').enumerate() {
        let line_no = index + 1;
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        if let Some(step) = pending.as_mut() {
            let ends_block = line.trim().is_empty() || line.starts_with(DIRECTIVE_PREFIX) || line.starts_with('@');
            if !ends_block {
                let text = if line == BLANKLINE_MARKER { "" } else { line };
                step.expected.push(text.to_string());
                continue;
            }
            if let (Some(step), Some(unit)) = (pending.take(), units.last_mut()) {
                unit.steps.push(step.finish());
            }
        }

        if let Some(header) = line.strip_prefix('@') {
            header_line(header, line_no, source, &mut units)?;
        } else if let Some(rest) = line.strip_prefix(DIRECTIVE_PREFIX) {
            if units.is_empty() {
                return Err(ParseError::at_line("directive before any @unit header", source, line_no));
            }
            let directive = match rest.strip_prefix(' ') {
                Some(d) if !d.trim().is_empty() => d,
                _ => return Err(ParseError::at_line("expected '>>> <directive>'", source, line_no)),
            };
            pending = Some(PendingStep {
                directive: directive.to_string(),
                line: line_no,
                expected: Vec::new(),
            });
        }
        // Anything else is prose.
    }

    if let (Some(step), Some(unit)) = (pending.take(), units.last_mut()) {
        unit.steps.push(step.finish());
    }

    tracing::debug!(units = units.len(), "parsed transcript");
    Ok(TranscriptDocument {
        name: name.to_string(),
        units,
    })
}

fn header_line(
    header: &str,
    line_no: usize,
    source: &str,
    units: &mut Vec<TranscriptUnit>,
) -> Result<(), ParseError> {
    let (keyword, argument) = header.split_once(char::is_whitespace).unwrap_or((header, ""));
    let argument = argument.trim();

    match keyword {
        "unit" => {
            if argument.is_empty() || argument.contains(char::is_whitespace) {
                return Err(ParseError::at_line(
                    "expected '@unit <name>' with a name without spaces",
                    source,
                    line_no,
                ));
            }
            units.push(TranscriptUnit {
                name: argument.to_string(),
                fixtures: Vec::new(),
                skip: None,
                steps: Vec::new(),
                line: line_no,
            });
        }
        "fixtures" => {
            let Some(unit) = units.last_mut() else {
                return Err(ParseError::at_line("@fixtures before any @unit header", source, line_no));
            };
            let names: Vec<String> = argument
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect();
            if names.is_empty() {
                return Err(ParseError::at_line("@fixtures needs at least one fixture name", source, line_no));
            }
            unit.fixtures.extend(names);
        }
        "skip" => {
            let Some(unit) = units.last_mut() else {
                return Err(ParseError::at_line("@skip before any @unit header", source, line_no));
            };
            unit.skip = Some(argument.to_string());
        }
        other => {
            return Err(ParseError::at_line(
                format!("unknown header '@{other}' (expected @unit, @fixtures or @skip)"),
                source,
                line_no,
            ));
        }
    }
    Ok(())
}
