//! A single stored record.

use std::collections::BTreeMap;
use std::fmt;

use crate::value::{PrimaryKey, Value, render_fields};

/// Field name to value. Ordered by name, so two records compare equal regardless of the order their fields were
/// declared in.
pub type Fields = BTreeMap<String, Value>;

/// One record: entity type, primary key and field values.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub entity: String,
    pub key: PrimaryKey,
    pub fields: Fields,
}

impl Record {
    pub fn new(entity: impl Into<String>, key: impl Into<PrimaryKey>) -> Self {
        Self {
            entity: entity.into(),
            key: key.into(),
            fields: Fields::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) {}", self.entity, self.key, render_fields(&self.fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_field_declaration_order() {
        let a = Record::new("polls.poll", 1).with_field("question", "Hi?").with_field("votes", 3);
        let b = Record::new("polls.poll", 1).with_field("votes", 3).with_field("question", "Hi?");
        assert_eq!(a, b);
    }

    #[test]
    fn test_display() {
        let r = Record::new("polls.choice", "c1").with_field("text", "yes");
        assert_eq!(r.to_string(), r#"polls.choice("c1") {"text": "yes"}"#);
    }
}
