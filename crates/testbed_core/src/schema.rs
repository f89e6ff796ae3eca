//! Registered entity types.

use crate::store::StoreError;

/// An entity type the store accepts records for.
///
/// When `fields` is `Some`, records may only use the listed field names. `None` accepts any field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    pub name: String,
    pub fields: Option<Vec<String>>,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: None,
        }
    }

    /// Restrict the entity to a closed set of field names.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn allows_field(&self, field: &str) -> bool {
        match &self.fields {
            Some(list) => list.iter().any(|f| f == field),
            None => true,
        }
    }
}

/// The ordered set of entity types known to a store.
///
/// Registration order is kept; dumps walk entities in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    entities: Vec<EntityType>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities<I>(entities: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = EntityType>,
    {
        let mut schema = Self::new();
        for entity in entities {
            schema.register(entity)?;
        }
        Ok(schema)
    }

    /// Register an entity type. Names must be unique.
    pub fn register(&mut self, entity: EntityType) -> Result<(), StoreError> {
        if self.get(&entity.name).is_some() {
            return Err(StoreError::DuplicateEntity { entity: entity.name });
        }
        self.entities.push(entity);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&EntityType> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityType> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
