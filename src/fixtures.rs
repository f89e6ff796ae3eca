//! Fixture lookup.
//!
//! A fixture is requested by name. `polls.json` or `polls.fixture` pins the format; a bare `polls` matches every
//! supported format, and more than one match is an error rather than an arbitrary pick.
//!
//! Lookup goes through the [`FixtureSource`] trait so the loader does not care whether fixtures live on disk
//! ([`DirectorySource`]) or in memory ([`MemorySource`]).

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use testbed_core::Record;
use testbed_syntax::Format;

use crate::loader::LoadError;

/// A fixture's raw text and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureText {
    /// Path or pseudo-path, for messages
    pub origin: String,
    pub format: Format,
    pub text: String,
}

/// A named, ordered collection of records.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub name: String,
    pub records: Vec<Record>,
}

impl Fixture {
    pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }
}

/// Where fixture texts are found.
pub trait FixtureSource {
    /// Every fixture named `base` in one of `formats`.
    ///
    /// Sources with several locations return the matches of the first location that has any.
    fn find(&self, base: &str, formats: &[Format]) -> Result<Vec<FixtureText>, LoadError>;

    /// Human-readable list of searched locations.
    fn describe(&self) -> String;
}

/// Fixtures in an ordered list of directories. The first directory holding a match wins.
#[derive(Debug, Clone, Default)]
pub struct DirectorySource {
    dirs: Vec<PathBuf>,
}

impl DirectorySource {
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl FixtureSource for DirectorySource {
    fn find(&self, base: &str, formats: &[Format]) -> Result<Vec<FixtureText>, LoadError> {
        for dir in &self.dirs {
            let mut found = Vec::new();
            for &format in formats {
                let path = dir.join(format!("{base}.{}", format.extension()));
                if !path.is_file() {
                    continue;
                }
                let text = fs::read_to_string(&path).map_err(|e| LoadError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                found.push(FixtureText {
                    origin: path.display().to_string(),
                    format,
                    text,
                });
            }
            if !found.is_empty() {
                tracing::debug!(dir = %dir.display(), base, matches = found.len(), "fixture located");
                return Ok(found);
            }
        }
        Ok(Vec::new())
    }

    fn describe(&self) -> String {
        if self.dirs.is_empty() {
            return "no fixture directories configured".to_string();
        }
        let dirs: Vec<String> = self.dirs.iter().map(|d| d.display().to_string()).collect();
        format!("searched {}", dirs.join(", "))
    }
}

/// Fixtures held in memory, keyed by file name (`polls.json`).
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, file_name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(file_name, text);
        self
    }

    pub fn insert(&mut self, file_name: impl Into<String>, text: impl Into<String>) {
        self.files.insert(file_name.into(), text.into());
    }
}

impl FixtureSource for MemorySource {
    fn find(&self, base: &str, formats: &[Format]) -> Result<Vec<FixtureText>, LoadError> {
        Ok(formats
            .iter()
            .filter_map(|&format| {
                let file_name = format!("{base}.{}", format.extension());
                self.files.get(&file_name).map(|text| FixtureText {
                    origin: format!("memory:{file_name}"),
                    format,
                    text: text.clone(),
                })
            })
            .collect())
    }

    fn describe(&self) -> String {
        let names: Vec<&str> = self.files.keys().map(String::as_str).collect();
        format!("in-memory fixtures [{}]", names.join(", "))
    }
}

/// Resolve a fixture name to exactly one text.
///
/// A known suffix on `name` pins the format; otherwise `explicit` does; otherwise every format is tried.
pub fn resolve(source: &dyn FixtureSource, name: &str, explicit: Option<Format>) -> Result<FixtureText, LoadError> {
    let (base, suffix) = Format::split_name(name);
    let formats: Vec<Format> = match suffix.or(explicit) {
        Some(format) => vec![format],
        None => Format::ALL.to_vec(),
    };

    let mut found = source.find(base, &formats)?;
    match found.len() {
        0 => Err(LoadError::NotFound {
            name: name.to_string(),
            searched: source.describe(),
        }),
        1 => Ok(found.remove(0)),
        _ => Err(LoadError::Ambiguous {
            name: name.to_string(),
            candidates: found.into_iter().map(|f| f.origin).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"[{"model": "polls.poll", "pk": 1}]"#;
    const BLOCK: &str = "[polls.poll 1]\n";

    #[test]
    fn test_bare_name_matches_single_format() {
        let source = MemorySource::new().with_file("polls.json", JSON);
        let text = resolve(&source, "polls", None).unwrap();
        assert_eq!(text.format, Format::Json);
        assert_eq!(text.origin, "memory:polls.json");
    }

    #[test]
    fn test_bare_name_with_two_formats_is_ambiguous() {
        let source = MemorySource::new()
            .with_file("polls.json", JSON)
            .with_file("polls.fixture", BLOCK);
        let err = resolve(&source, "polls", None).unwrap_err();
        match err {
            LoadError::Ambiguous { name, candidates } => {
                assert_eq!(name, "polls");
                assert_eq!(candidates, ["memory:polls.json", "memory:polls.fixture"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_suffix_or_explicit_format_disambiguates() {
        let source = MemorySource::new()
            .with_file("polls.json", JSON)
            .with_file("polls.fixture", BLOCK);
        assert_eq!(resolve(&source, "polls.fixture", None).unwrap().format, Format::Block);
        assert_eq!(resolve(&source, "polls", Some(Format::Json)).unwrap().format, Format::Json);
    }

    #[test]
    fn test_missing_fixture() {
        let source = MemorySource::new();
        assert!(matches!(resolve(&source, "nope", None), Err(LoadError::NotFound { .. })));
    }

    #[test]
    fn test_directory_precedence() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join("polls.fixture"), BLOCK).unwrap();
        fs::write(second.path().join("polls.json"), JSON).unwrap();
        fs::write(second.path().join("votes.json"), JSON).unwrap();

        let source = DirectorySource::new([first.path(), second.path()]);
        // The first directory wins, so the second directory's json does not make `polls` ambiguous.
        assert_eq!(resolve(&source, "polls", None).unwrap().format, Format::Block);
        assert_eq!(resolve(&source, "votes", None).unwrap().format, Format::Json);
    }

    #[test]
    fn test_directory_ambiguity() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("polls.fixture"), BLOCK).unwrap();
        fs::write(dir.path().join("polls.json"), JSON).unwrap();

        let source = DirectorySource::new([dir.path()]);
        assert!(matches!(resolve(&source, "polls", None), Err(LoadError::Ambiguous { .. })));
        let text = resolve(&source, "polls.json", None).unwrap();
        assert_eq!(text.text, JSON);
    }
}
