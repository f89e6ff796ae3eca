//! Fixture loader: named fixtures into the store, atomically, and the store back out as fixture text.
//!
//! Loading stages every record of every requested fixture, validates the whole batch against the schema and against
//! itself, and only then commits. A failure anywhere leaves the store as it was.

use std::collections::HashSet;

use thiserror::Error;

use testbed_core::{Record, Store, StoreError};
use testbed_syntax::{Format, ParseError, SourceDiagnostic, WriteError, read_fixture, write_fixture};

use crate::fixtures::{Fixture, FixtureSource, FixtureText, resolve};

/// Why a fixture could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("failed to parse fixture {origin}: {error}")]
    Parse {
        origin: String,
        text: String,
        error: ParseError,
    },

    #[error("fixture '{fixture}' references unknown entity type '{entity}'")]
    UnknownEntity { fixture: String, entity: String },

    #[error("fixture '{fixture}' sets field '{field}' not declared by entity type '{entity}'")]
    UnknownField {
        fixture: String,
        entity: String,
        field: String,
    },

    #[error("duplicate primary key {key} for entity type '{entity}' while loading fixtures [{fixtures}]")]
    DuplicateKey {
        fixtures: String,
        entity: String,
        key: String,
    },

    #[error("fixture '{name}' not found ({searched})")]
    NotFound { name: String, searched: String },

    #[error("fixture name '{name}' is ambiguous: {}", candidates.join(", "))]
    Ambiguous { name: String, candidates: Vec<String> },

    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },
}

impl LoadError {
    /// A source-annotated diagnostic, for parse errors.
    pub fn diagnostic(&self) -> Option<SourceDiagnostic> {
        match self {
            LoadError::Parse { origin, text, error } => Some(error.to_diagnostic(origin, text)),
            _ => None,
        }
    }
}

/// The store could not be serialized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DumpError {
    #[error("field '{field}' of {entity}({key}) is a non-finite float and cannot be dumped")]
    NonFiniteFloat { entity: String, key: String, field: String },

    #[error("unknown entity type '{entity}'")]
    UnknownEntity { entity: String },

    #[error("{0}")]
    Write(String),
}

impl From<WriteError> for DumpError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::NonFiniteFloat { entity, key, field } => DumpError::NonFiniteFloat { entity, key, field },
            other => DumpError::Write(other.to_string()),
        }
    }
}

/// Finds, parses and commits fixtures.
pub struct Loader {
    source: Box<dyn FixtureSource>,
}

impl Loader {
    pub fn new(source: impl FixtureSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    pub fn source(&self) -> &dyn FixtureSource {
        self.source.as_ref()
    }

    /// Locate and parse one fixture.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn read(&self, name: &str, format: Option<Format>) -> Result<Fixture, LoadError> {
        let FixtureText { origin, format, text } = resolve(self.source.as_ref(), name, format)?;
        match read_fixture(&text, format) {
            Ok(records) => Ok(Fixture::new(name, records)),
            Err(error) => Err(LoadError::Parse { origin, text, error }),
        }
    }

    /// Load the named fixtures, in order, as one atomic batch. Returns the number of records committed.
    #[tracing::instrument(skip_all, fields(fixtures = names.len()))]
    pub fn load<S: AsRef<str>>(&self, store: &mut Store, names: &[S]) -> Result<usize, LoadError> {
        let fixtures = names
            .iter()
            .map(|name| self.read(name.as_ref(), None))
            .collect::<Result<Vec<_>, _>>()?;
        load_fixtures(store, &fixtures)
    }
}

/// Commit already-parsed fixtures as one atomic batch.
pub fn load_fixtures(store: &mut Store, fixtures: &[Fixture]) -> Result<usize, LoadError> {
    // Per-fixture schema checks first, so the error names the offending fixture.
    for fixture in fixtures {
        for record in &fixture.records {
            validate(store, &fixture.name, record)?;
        }
    }

    let batch: Vec<Record> = fixtures.iter().flat_map(|f| f.records.iter().cloned()).collect();
    let count = store.apply_batch(batch).map_err(|err| {
        let names: Vec<&str> = fixtures.iter().map(|f| f.name.as_str()).collect();
        match err {
            StoreError::DuplicateKey { entity, key } => LoadError::DuplicateKey {
                fixtures: names.join(", "),
                entity,
                key,
            },
            StoreError::UnknownField { entity, field } => LoadError::UnknownField {
                fixture: names.join(", "),
                entity,
                field,
            },
            StoreError::UnknownEntity { entity }
            | StoreError::MissingRecord { entity, .. }
            | StoreError::DuplicateEntity { entity } => LoadError::UnknownEntity {
                fixture: names.join(", "),
                entity,
            },
        }
    })?;
    tracing::debug!(count, "fixtures committed");
    Ok(count)
}

fn validate(store: &Store, fixture: &str, record: &Record) -> Result<(), LoadError> {
    let Some(entity) = store.schema().get(&record.entity) else {
        return Err(LoadError::UnknownEntity {
            fixture: fixture.to_string(),
            entity: record.entity.clone(),
        });
    };
    if let Some(field) = record.fields.keys().find(|f| !entity.allows_field(f)) {
        return Err(LoadError::UnknownField {
            fixture: fixture.to_string(),
            entity: record.entity.clone(),
            field: field.clone(),
        });
    }
    Ok(())
}

/// Serialize the store. `entities` restricts the output to those entity types; empty means all of them.
///
/// Records come out in schema order, then key order, with fields sorted by name.
pub fn dump(store: &Store, format: Format, entities: &[String]) -> Result<String, DumpError> {
    let records = if entities.is_empty() {
        store.records()
    } else {
        let mut records = Vec::new();
        let mut seen = HashSet::with_capacity(entities.len());
        for entity in entities {
            // A repeated entity is dumped once; twice would not load back.
            if !seen.insert(entity.as_str()) {
                continue;
            }
            let found = store.records_of(entity).map_err(|_| DumpError::UnknownEntity {
                entity: entity.clone(),
            })?;
            records.extend(found);
        }
        records
    };
    Ok(write_fixture(&records, format)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::MemorySource;
    use testbed_core::{EntityType, PrimaryKey, Schema, Value};

    fn store() -> Store {
        Store::new(
            Schema::from_entities([
                EntityType::new("polls.poll").with_fields(["question", "votes"]),
                EntityType::new("polls.choice"),
            ])
            .unwrap(),
        )
    }

    fn loader() -> Loader {
        Loader::new(
            MemorySource::new()
                .with_file(
                    "polls.json",
                    r#"[{"model": "polls.poll", "pk": 1, "fields": {"question": "Hi?", "votes": 2}}]"#,
                )
                .with_file("choices.fixture", "[polls.choice 1]\ntext = \"yes\"\n[polls.choice 2]\ntext = \"no\"\n")
                .with_file("clash.fixture", "[polls.poll 1]\nquestion = \"again\"\n")
                .with_file("ghosts.fixture", "[ghosts.ghost 1]\n")
                .with_file("extra.fixture", "[polls.poll 9]\ncolour = \"red\"\n")
                .with_file("broken.json", "[{\"model\": }]"),
        )
    }

    #[test]
    fn test_load_multiple_fixtures() {
        let mut store = store();
        let count = loader().load(&mut store, &["polls", "choices"]).unwrap();
        assert_eq!(count, 3);
        assert_eq!(store.count("polls.choice").unwrap(), 2);
        assert_eq!(
            store.get("polls.poll", &PrimaryKey::Int(1)).unwrap().get("votes"),
            Some(&Value::Int(2))
        );
    }

    #[test]
    fn test_duplicate_key_across_fixtures_leaves_store_unchanged() {
        let mut store = store();
        store
            .upsert(Record::new("polls.choice", 7).with_field("text", "kept"))
            .unwrap();
        let before = store.records();

        let err = loader().load(&mut store, &["polls", "clash"]).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateKey { ref entity, ref key, .. } if entity == "polls.poll" && key == "1"));
        assert_eq!(store.records(), before);
    }

    #[test]
    fn test_existing_records_are_replaced() {
        let mut store = store();
        let loader = loader();
        loader.load(&mut store, &["polls"]).unwrap();
        loader.load(&mut store, &["clash"]).unwrap();
        let poll = store.get("polls.poll", &PrimaryKey::Int(1)).unwrap();
        assert_eq!(poll.get("question"), Some(&Value::from("again")));
        assert_eq!(poll.get("votes"), None);
    }

    #[test]
    fn test_unknown_entity_and_field() {
        let mut store = store();
        let err = loader().load(&mut store, &["polls", "ghosts"]).unwrap_err();
        assert_eq!(
            err,
            LoadError::UnknownEntity {
                fixture: "ghosts".to_string(),
                entity: "ghosts.ghost".to_string()
            }
        );
        let err = loader().load(&mut store, &["extra"]).unwrap_err();
        assert!(matches!(err, LoadError::UnknownField { ref field, .. } if field == "colour"));
        assert!(store.is_baseline());
    }

    #[test]
    fn test_parse_error_carries_diagnostic() {
        let mut store = store();
        let err = loader().load(&mut store, &["broken"]).unwrap_err();
        assert!(matches!(err, LoadError::Parse { ref origin, .. } if origin == "memory:broken.json"));
        assert!(err.diagnostic().is_some());
        assert!(store.is_baseline());
    }

    #[test]
    fn test_dump_then_load_restores_store() {
        let mut original = store();
        loader().load(&mut original, &["polls", "choices"]).unwrap();

        for format in Format::ALL {
            let text = dump(&original, format, &[]).unwrap();
            let mut restored = store();
            let fixture = Fixture::new("dumped", read_fixture(&text, format).unwrap());
            load_fixtures(&mut restored, &[fixture]).unwrap();
            assert_eq!(restored.records(), original.records(), "format {format}");
        }
    }

    #[test]
    fn test_dump_filters_entities() {
        let mut store = store();
        loader().load(&mut store, &["polls", "choices"]).unwrap();
        let text = dump(&store, Format::Block, &["polls.poll".to_string()]).unwrap();
        assert_eq!(text, "[polls.poll 1]\nquestion = \"Hi?\"\nvotes = 2\n");
        assert!(matches!(
            dump(&store, Format::Json, &["nope".to_string()]),
            Err(DumpError::UnknownEntity { .. })
        ));
    }

    #[test]
    fn test_dump_repeated_entity_once() {
        let mut original = store();
        loader().load(&mut original, &["polls", "choices"]).unwrap();
        let entities = ["polls.poll".to_string(), "polls.choice".to_string(), "polls.poll".to_string()];
        let text = dump(&original, Format::Json, &entities).unwrap();

        let records = read_fixture(&text, Format::Json).unwrap();
        assert_eq!(records.len(), original.len());
        let mut restored = store();
        load_fixtures(&mut restored, &[Fixture::new("dumped", records)]).unwrap();
        assert_eq!(restored.records(), original.records());
    }

    #[test]
    fn test_dump_rejects_non_finite_floats() {
        let mut store = store();
        store
            .upsert(Record::new("polls.choice", 1).with_field("weight", f64::NAN))
            .unwrap();
        for format in Format::ALL {
            assert!(matches!(
                dump(&store, format, &[]),
                Err(DumpError::NonFiniteFloat { ref field, .. }) if field == "weight"
            ));
        }
    }
}
