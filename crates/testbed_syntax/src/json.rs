//! JSON fixture codec.
//!
//! ```json
//! [
//!   {"model": "polls.poll", "pk": 1, "fields": {"question": "What's up?", "votes": 0}}
//! ]
//! ```

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number};

use testbed_core::{Fields, PrimaryKey, Record, Value};

use crate::diagnostics::{ParseError, Span, line_offset};
use crate::format::WriteError;

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonRecord {
    model: String,
    pk: serde_json::Value,
    #[serde(default, deserialize_with = "unique_fields")]
    fields: Map<String, serde_json::Value>,
}

/// Deserialize `"fields"`, rejecting a name that appears twice instead of keeping the last value.
fn unique_fields<'de, D>(deserializer: D) -> Result<Map<String, serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    struct UniqueFields;

    impl<'de> Visitor<'de> for UniqueFields {
        type Value = Map<String, serde_json::Value>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object of field values")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut fields = Map::new();
            while let Some((name, value)) = access.next_entry::<String, serde_json::Value>()? {
                if fields.contains_key(&name) {
                    return Err(de::Error::custom(format_args!("field '{name}' is assigned twice")));
                }
                fields.insert(name, value);
            }
            Ok(fields)
        }
    }

    deserializer.deserialize_map(UniqueFields)
}

/// Parse a JSON fixture into records, in array order.
#[tracing::instrument(skip_all, fields(source_len = source.len()))]
pub fn parse(source: &str) -> Result<Vec<Record>, ParseError> {
    let raw: Vec<JsonRecord> = serde_json::from_str(source).map_err(|e| {
        let start = line_offset(source, e.line()) + e.column().saturating_sub(1);
        let start = start.min(source.len());
        ParseError::new(format!("invalid JSON fixture: {e}"), source, Span::new(start, start))
    })?;

    let mut records = Vec::with_capacity(raw.len());
    for (index, item) in raw.into_iter().enumerate() {
        let key = match &item.pk {
            serde_json::Value::Number(n) => n.as_i64().map(PrimaryKey::Int),
            serde_json::Value::String(s) => Some(PrimaryKey::Str(s.clone())),
            _ => None,
        }
        .ok_or_else(|| {
            entry_error(
                source,
                index,
                format!("\"pk\" must be an integer or a string, found {}", item.pk),
            )
        })?;

        let mut fields = Fields::new();
        for (name, value) in item.fields {
            let value = scalar(&value).ok_or_else(|| {
                entry_error(
                    source,
                    index,
                    format!("field '{name}' must be a scalar (null, bool, number or string), found {value}"),
                )
            })?;
            fields.insert(name, value);
        }

        records.push(Record {
            entity: item.model,
            key,
            fields,
        });
    }

    tracing::debug!(records = records.len(), "parsed JSON fixture");
    Ok(records)
}

/// Write records as a pretty-printed JSON fixture.
pub fn write(records: &[Record]) -> Result<String, WriteError> {
    let mut raw = Vec::with_capacity(records.len());
    for record in records {
        let mut fields = Map::new();
        for (name, value) in &record.fields {
            let json = match value {
                Value::Null => serde_json::Value::Null,
                Value::Bool(b) => serde_json::Value::Bool(*b),
                Value::Int(i) => serde_json::Value::from(*i),
                Value::Float(x) => Number::from_f64(*x).map(serde_json::Value::Number).ok_or_else(|| {
                    WriteError::NonFiniteFloat {
                        entity: record.entity.clone(),
                        key: record.key.to_string(),
                        field: name.clone(),
                    }
                })?,
                Value::Str(s) => serde_json::Value::String(s.clone()),
            };
            fields.insert(name.clone(), json);
        }
        raw.push(JsonRecord {
            model: record.entity.clone(),
            pk: match &record.key {
                PrimaryKey::Int(i) => serde_json::Value::from(*i),
                PrimaryKey::Str(s) => serde_json::Value::String(s.clone()),
            },
            fields,
        });
    }

    let mut out = serde_json::to_string_pretty(&raw).map_err(|e| WriteError::Json(e.to_string()))?;
    out.push('\n');
    Ok(out)
}

fn scalar(value: &serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::Null => Some(Value::Null),
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => {
            if n.is_f64() {
                n.as_f64().map(Value::Float)
            } else {
                // u64 values above i64::MAX are not representable.
                n.as_i64().map(Value::Int)
            }
        }
        serde_json::Value::String(s) => Some(Value::Str(s.clone())),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

fn entry_error(source: &str, index: usize, message: String) -> ParseError {
    ParseError::new(format!("fixture entry {index}: {message}"), source, Span::new(0, 0))
}
