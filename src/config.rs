//! Harness configuration.
//!
//! Values come from, lowest precedence first: built-in defaults, a JSON config file (`testbed.json` in the working
//! directory, or `--config`), the `TESTBED_FIXTURE_DIRS` environment variable (appended search dirs), and finally CLI
//! flags applied through the `with_*` builders.
//!
//! ```json
//! {
//!   "fixture_dirs": ["fixtures", "shared/fixtures"],
//!   "entities": ["polls.choice", {"name": "polls.poll", "fields": ["question", "votes"]}],
//!   "exit_first": true
//! }
//! ```

use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use testbed_core::{EntityType, Schema};

use crate::fixtures::DirectorySource;

/// Config file picked up from the working directory when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "testbed.json";

/// Environment variable holding extra fixture directories (platform path-list syntax).
pub const FIXTURE_DIRS_ENV: &str = "TESTBED_FIXTURE_DIRS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("invalid config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid schema in config: {0}")]
    Schema(String),
}

/// An entity type declaration: either a bare name or a name with a closed field list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EntityConfig {
    Name(String),
    Declared {
        name: String,
        #[serde(default)]
        fields: Option<Vec<String>>,
    },
}

impl EntityConfig {
    pub fn name(&self) -> &str {
        match self {
            EntityConfig::Name(name) | EntityConfig::Declared { name, .. } => name,
        }
    }

    fn to_entity_type(&self) -> EntityType {
        match self {
            EntityConfig::Name(name) | EntityConfig::Declared { name, fields: None } => EntityType::new(name.clone()),
            EntityConfig::Declared {
                name,
                fields: Some(fields),
            } => EntityType::new(name.clone()).with_fields(fields.iter().cloned()),
        }
    }
}

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Fixture search directories, in precedence order
    pub fixture_dirs: Vec<PathBuf>,
    /// Declared entity types
    pub entities: Vec<EntityConfig>,
    /// Per-unit timings in console output
    pub verbose: bool,
    /// Stop after the first failed or errored unit
    pub exit_first: bool,
    /// Keyword filter on unit names
    pub filter: Option<String>,
    /// ANSI colors in console output
    pub color: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            fixture_dirs: vec![PathBuf::from("fixtures")],
            entities: Vec::new(),
            verbose: false,
            exit_first: false,
            filter: None,
            color: true,
        }
    }
}

impl HarnessConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON config. Relative fixture dirs are resolved against `base_dir`.
    pub fn from_json(text: &str, origin: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: HarnessConfig = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        for dir in &mut config.fixture_dirs {
            if dir.is_relative() {
                *dir = base_dir.join(&*dir);
            }
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json(&text, &path.display().to_string(), base_dir)
    }

    /// Resolve the effective configuration: `explicit` file, else `testbed.json` under `cwd`, else defaults; then the
    /// environment.
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Result<Self, ConfigError> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let candidate = cwd.join(CONFIG_FILE_NAME);
                if candidate.is_file() {
                    tracing::debug!(path = %candidate.display(), "using config file");
                    Self::from_file(&candidate)?
                } else {
                    Self::default()
                }
            }
        };
        Ok(match env::var_os(FIXTURE_DIRS_ENV) {
            Some(value) => config.with_env_fixture_dirs(&value),
            None => config,
        })
    }

    /// Append the directories listed in a `TESTBED_FIXTURE_DIRS` value.
    pub fn with_env_fixture_dirs(mut self, value: &OsStr) -> Self {
        for dir in env::split_paths(value) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            if !dir.is_dir() {
                tracing::warn!(dir = %dir.display(), "{FIXTURE_DIRS_ENV} entry is not a directory");
            }
            self.fixture_dirs.push(dir);
        }
        self
    }

    /// Replace the fixture search directories
    pub fn with_fixture_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.fixture_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Add a fixture search directory with the highest precedence
    pub fn with_fixture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixture_dirs.insert(0, dir.into());
        self
    }

    /// Declare an entity type with an open field list
    pub fn with_entity(mut self, name: impl Into<String>) -> Self {
        self.entities.push(EntityConfig::Name(name.into()));
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_exit_first(mut self, exit_first: bool) -> Self {
        self.exit_first = exit_first;
        self
    }

    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        if filter.is_some() {
            self.filter = filter;
        }
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Build the store schema from the declared entity types.
    pub fn schema(&self) -> Result<Schema, ConfigError> {
        Schema::from_entities(self.entities.iter().map(EntityConfig::to_entity_type))
            .map_err(|e| ConfigError::Schema(e.to_string()))
    }

    pub fn fixture_source(&self) -> DirectorySource {
        DirectorySource::new(self.fixture_dirs.iter().cloned())
    }
}
