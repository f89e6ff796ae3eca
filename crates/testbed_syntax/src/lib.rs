#![forbid(unsafe_code)]
//! Text formats for the testbed harness: fixture files and transcripts.
//!
//! ## Modules
//!
//! - `diagnostics` - `Span`, `ParseError` and the miette-backed `SourceDiagnostic`
//! - `format` - the fixture serialization formats (`json`, `block`)
//! - `lexer` - tokenizer for the block format and for scalar literals
//! - `block` - block format parser and writer
//! - `json` - JSON fixture codec (serde_json)
//! - `transcript` - transcript documents (`@unit`, `>>>` directives, literal expected text)
//!
//! ## Notes
//! - This crate is syntax-only: it turns text into [`testbed_core::Record`]s and back. Whether an entity type exists
//!   or two records collide is decided by the store.
//!
//! ## Examples
//! ```rust
//! use testbed_syntax::{Format, read_fixture};
//!
//! let records = read_fixture("[polls.poll 1]\nquestion = \"Hi?\"\n", Format::Block).unwrap();
//! assert_eq!(records.len(), 1);
//! ```

pub mod block;
pub mod diagnostics;
pub mod format;
pub mod json;
pub mod lexer;
pub mod transcript;

pub use diagnostics::{ParseError, SourceDiagnostic, Span};
pub use format::{Format, WriteError};
pub use transcript::{Step, TranscriptDocument, TranscriptUnit};

use testbed_core::Record;

/// Parse fixture text in the given format into records, in declaration order.
pub fn read_fixture(source: &str, format: Format) -> Result<Vec<Record>, ParseError> {
    match format {
        Format::Json => json::parse(source),
        Format::Block => block::parse(source),
    }
}

/// Serialize records into fixture text.
pub fn write_fixture(records: &[Record], format: Format) -> Result<String, WriteError> {
    match format {
        Format::Json => json::write(records),
        Format::Block => block::write(records),
    }
}
