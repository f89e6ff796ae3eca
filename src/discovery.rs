//! Transcript file discovery.
//!
//! The filesystem side of discovery sits behind [`TranscriptDiscovery`] so the CLI can be pointed at other sources
//! (or a fake in tests). [`FsTranscriptDiscovery`] walks directories for `*.transcript` files.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use testbed_syntax::{ParseError, SourceDiagnostic, TranscriptDocument, transcript};

use crate::registry::{DuplicateNameError, Registry};

/// Extension of transcript files.
pub const TRANSCRIPT_EXTENSION: &str = "transcript";

/// Errors raised while collecting units from files.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("path does not exist: {0}")]
    MissingPath(String),

    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },

    #[error("{path}: {error}")]
    Parse {
        path: String,
        source_text: String,
        error: ParseError,
    },

    #[error("{path}: {error}")]
    Duplicate { path: String, error: DuplicateNameError },
}

impl DiscoveryError {
    /// A source-annotated diagnostic, for parse errors.
    pub fn diagnostic(&self) -> Option<SourceDiagnostic> {
        match self {
            DiscoveryError::Parse {
                path,
                source_text,
                error,
            } => Some(error.to_diagnostic(path, source_text)),
            _ => None,
        }
    }
}

/// Finds and parses transcript documents.
pub trait TranscriptDiscovery {
    /// Every transcript file under `path` (or `path` itself), sorted.
    fn discover_files(&self, path: &Path) -> Result<Vec<PathBuf>, DiscoveryError>;

    /// Parse one transcript file. The document is named after the file stem.
    fn read_document(&self, path: &Path) -> Result<TranscriptDocument, DiscoveryError>;
}

/// Filesystem discovery.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsTranscriptDiscovery;

impl TranscriptDiscovery for FsTranscriptDiscovery {
    fn discover_files(&self, path: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
        if !path.exists() {
            return Err(DiscoveryError::MissingPath(path.display().to_string()));
        }
        Ok(discover_transcript_files(path))
    }

    fn read_document(&self, path: &Path) -> Result<TranscriptDocument, DiscoveryError> {
        let source = fs::read_to_string(path).map_err(|e| DiscoveryError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("transcript");
        transcript::parse(name, &source).map_err(|error| DiscoveryError::Parse {
            path: path.display().to_string(),
            source_text: source.clone(),
            error,
        })
    }
}

/// Collect `*.transcript` files under `path`, skipping hidden directories and `target`.
pub fn discover_transcript_files(path: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    if path.is_file() {
        if is_transcript(path) {
            files.push(path.to_path_buf());
        }
    } else if path.is_dir() {
        if let Ok(entries) = fs::read_dir(path) {
            for entry in entries.flatten() {
                let entry_path = entry.path();
                if entry_path.is_dir() {
                    let name = entry_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                    if !name.starts_with('.') && name != "target" {
                        files.extend(discover_transcript_files(&entry_path));
                    }
                } else if is_transcript(&entry_path) {
                    files.push(entry_path);
                }
            }
        }
    }

    files.sort();
    files
}

fn is_transcript(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(TRANSCRIPT_EXTENSION)
}

/// What [`register_transcripts`] found.
#[derive(Debug, Default)]
pub struct DiscoverySummary {
    /// Files whose units were registered
    pub files: usize,
    /// Files that could not be read, parsed or registered
    pub errors: Vec<DiscoveryError>,
}

/// Discover, parse and register every transcript under `path`.
///
/// A bad file is recorded in the summary and the remaining files are still registered.
pub fn register_transcripts(
    discovery: &dyn TranscriptDiscovery,
    path: &Path,
    registry: &mut Registry,
) -> Result<DiscoverySummary, DiscoveryError> {
    let mut summary = DiscoverySummary::default();
    for file in discovery.discover_files(path)? {
        let registered = discovery.read_document(&file).and_then(|document| {
            tracing::debug!(path = %file.display(), units = document.units.len(), "transcript discovered");
            registry
                .register_source(document)
                .map_err(|error| DiscoveryError::Duplicate {
                    path: file.display().to_string(),
                    error,
                })
        });
        match registered {
            Ok(_) => summary.files += 1,
            Err(err) => summary.errors.push(err),
        }
    }
    Ok(summary)
}
