//! Fixture serialization formats.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A fixture serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Format {
    /// Array of `{"model", "pk", "fields"}` objects.
    Json,
    /// Human-editable `[entity pk]` / `key = value` blocks.
    Block,
}

impl Format {
    /// Every supported format, in lookup order.
    pub const ALL: [Format; 2] = [Format::Json, Format::Block];

    /// File extension (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Block => "fixture",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.extension() == ext)
    }

    /// Split `name.ext` into the base name and its format, when `ext` is a known extension.
    pub fn split_name(name: &str) -> (&str, Option<Format>) {
        if let Some((base, ext)) = name.rsplit_once('.') {
            if let Some(format) = Self::from_extension(ext) {
                if !base.is_empty() {
                    return (base, Some(format));
                }
            }
        }
        (name, None)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Json => "json",
            Format::Block => "block",
        })
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Format::Json),
            "block" | "fixture" => Ok(Format::Block),
            other => Err(format!("unknown fixture format '{other}' (expected 'json' or 'block')")),
        }
    }
}

/// Records that cannot be written in the requested format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("field '{field}' of {entity}({key}) is a non-finite float and cannot be serialized")]
    NonFiniteFloat { entity: String, key: String, field: String },

    #[error("JSON serialization failed: {0}")]
    Json(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        assert_eq!(Format::split_name("polls.json"), ("polls", Some(Format::Json)));
        assert_eq!(Format::split_name("polls.fixture"), ("polls", Some(Format::Block)));
        assert_eq!(Format::split_name("polls"), ("polls", None));
        // Unknown extensions stay part of the name.
        assert_eq!(Format::split_name("polls.v2"), ("polls.v2", None));
        assert_eq!(Format::split_name(".json"), (".json", None));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("json".parse::<Format>(), Ok(Format::Json));
        assert_eq!("block".parse::<Format>(), Ok(Format::Block));
        assert_eq!("fixture".parse::<Format>(), Ok(Format::Block));
        assert!("yaml".parse::<Format>().is_err());
    }
}
