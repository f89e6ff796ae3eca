//! The persistent store.
//!
//! A stand-in for a database: one table per registered entity type, each table keyed by primary key. The baseline
//! state is "schema registered, every table empty"; [`Store::reset`] returns to it.

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::record::{Fields, Record};
use crate::schema::{EntityType, Schema};
use crate::value::PrimaryKey;

/// Errors raised by store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("unknown entity type '{entity}'")]
    UnknownEntity { entity: String },

    #[error("entity type '{entity}' has no field '{field}'")]
    UnknownField { entity: String, field: String },

    #[error("duplicate primary key {key} for entity type '{entity}'")]
    DuplicateKey { entity: String, key: String },

    #[error("no '{entity}' record with primary key {key}")]
    MissingRecord { entity: String, key: String },

    #[error("entity type '{entity}' is already registered")]
    DuplicateEntity { entity: String },
}

type Table = BTreeMap<PrimaryKey, Fields>;

/// In-memory persistent store.
#[derive(Debug, Clone)]
pub struct Store {
    schema: Schema,
    tables: BTreeMap<String, Table>,
}

impl Store {
    pub fn new(schema: Schema) -> Self {
        let tables = schema.entities().map(|e| (e.name.clone(), Table::new())).collect();
        Self { schema, tables }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Drop every record, keeping the schema.
    pub fn reset(&mut self) {
        let dropped = self.len();
        for table in self.tables.values_mut() {
            table.clear();
        }
        tracing::trace!(dropped, "store reset to baseline");
    }

    /// True when no table holds a record.
    pub fn is_baseline(&self) -> bool {
        self.tables.values().all(|t| t.is_empty())
    }

    /// Total number of records across all tables.
    pub fn len(&self) -> usize {
        self.tables.values().map(|t| t.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.is_baseline()
    }

    pub fn get(&self, entity: &str, key: &PrimaryKey) -> Option<&Fields> {
        self.tables.get(entity).and_then(|t| t.get(key))
    }

    /// Fetch a record, failing if the entity is unknown or the key is absent.
    pub fn fetch(&self, entity: &str, key: &PrimaryKey) -> Result<&Fields, StoreError> {
        self.table(entity)?.get(key).ok_or_else(|| StoreError::MissingRecord {
            entity: entity.to_string(),
            key: key.to_string(),
        })
    }

    /// Insert a new record. Fails if the key is taken.
    pub fn create(&mut self, entity: &str, key: PrimaryKey, fields: Fields) -> Result<(), StoreError> {
        self.check_fields(entity, &fields)?;
        let table = self.table_mut(entity)?;
        if table.contains_key(&key) {
            return Err(StoreError::DuplicateKey {
                entity: entity.to_string(),
                key: key.to_string(),
            });
        }
        table.insert(key, fields);
        Ok(())
    }

    /// Insert or replace a record, returning the replaced fields.
    pub fn upsert(&mut self, record: Record) -> Result<Option<Fields>, StoreError> {
        self.check_fields(&record.entity, &record.fields)?;
        let table = self.table_mut(&record.entity)?;
        Ok(table.insert(record.key, record.fields))
    }

    /// Merge `changes` into an existing record.
    pub fn update(&mut self, entity: &str, key: &PrimaryKey, changes: Fields) -> Result<(), StoreError> {
        self.check_fields(entity, &changes)?;
        let table = self.table_mut(entity)?;
        let Some(fields) = table.get_mut(key) else {
            return Err(StoreError::MissingRecord {
                entity: entity.to_string(),
                key: key.to_string(),
            });
        };
        fields.extend(changes);
        Ok(())
    }

    pub fn delete(&mut self, entity: &str, key: &PrimaryKey) -> Result<Fields, StoreError> {
        self.table_mut(entity)?.remove(key).ok_or_else(|| StoreError::MissingRecord {
            entity: entity.to_string(),
            key: key.to_string(),
        })
    }

    pub fn count(&self, entity: &str) -> Result<usize, StoreError> {
        Ok(self.table(entity)?.len())
    }

    /// Primary keys of one entity type, in key order.
    pub fn keys(&self, entity: &str) -> Result<Vec<PrimaryKey>, StoreError> {
        Ok(self.table(entity)?.keys().cloned().collect())
    }

    /// All records of one entity type, in key order.
    pub fn records_of(&self, entity: &str) -> Result<Vec<Record>, StoreError> {
        let table = self.table(entity)?;
        Ok(table
            .iter()
            .map(|(key, fields)| Record {
                entity: entity.to_string(),
                key: key.clone(),
                fields: fields.clone(),
            })
            .collect())
    }

    /// Every record: schema order, then key order.
    pub fn records(&self) -> Vec<Record> {
        let mut out = Vec::with_capacity(self.len());
        for entity in self.schema.entities() {
            if let Ok(records) = self.records_of(&entity.name) {
                out.extend(records);
            }
        }
        out
    }

    /// Validate a batch and commit all of it, or none of it.
    ///
    /// Existing records with the same entity and key are replaced. Two records in the batch sharing an entity and key
    /// are a [`StoreError::DuplicateKey`].
    pub fn apply_batch(&mut self, records: Vec<Record>) -> Result<usize, StoreError> {
        {
            let mut seen: HashSet<(&str, &PrimaryKey)> = HashSet::with_capacity(records.len());
            for record in &records {
                self.check_fields(&record.entity, &record.fields)?;
                if !seen.insert((record.entity.as_str(), &record.key)) {
                    return Err(StoreError::DuplicateKey {
                        entity: record.entity.clone(),
                        key: record.key.to_string(),
                    });
                }
            }
        }

        let count = records.len();
        for record in records {
            // Entity existence was checked above.
            if let Some(table) = self.tables.get_mut(&record.entity) {
                table.insert(record.key, record.fields);
            }
        }
        tracing::trace!(count, "batch committed");
        Ok(count)
    }

    fn entity(&self, entity: &str) -> Result<&EntityType, StoreError> {
        self.schema.get(entity).ok_or_else(|| StoreError::UnknownEntity {
            entity: entity.to_string(),
        })
    }

    fn check_fields(&self, entity: &str, fields: &Fields) -> Result<(), StoreError> {
        let ty = self.entity(entity)?;
        if let Some(field) = fields.keys().find(|f| !ty.allows_field(f)) {
            return Err(StoreError::UnknownField {
                entity: entity.to_string(),
                field: field.clone(),
            });
        }
        Ok(())
    }

    fn table(&self, entity: &str) -> Result<&Table, StoreError> {
        self.tables.get(entity).ok_or_else(|| StoreError::UnknownEntity {
            entity: entity.to_string(),
        })
    }

    fn table_mut(&mut self, entity: &str) -> Result<&mut Table, StoreError> {
        self.tables.get_mut(entity).ok_or_else(|| StoreError::UnknownEntity {
            entity: entity.to_string(),
        })
    }
}
