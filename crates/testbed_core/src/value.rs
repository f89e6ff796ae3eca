//! Scalar values and primary keys.
//!
//! Rendering here is canonical: the block fixture writer, the store interpreter and assertion messages all go through
//! [`Value`]'s `Display`, so a value printed by one can be read back by the block parser.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

/// A scalar field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// True for floats that cannot be written to any fixture format.
    pub fn is_non_finite(&self) -> bool {
        matches!(self, Value::Float(f) if !f.is_finite())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Str(s) => f.write_str(&quote_str(s)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A record's primary key.
///
/// Integer keys sort before string keys; within a kind the natural order applies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrimaryKey {
    Int(i64),
    Str(String),
}

impl PrimaryKey {
    /// Convert a field value into a key. Only ints and strings qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(PrimaryKey::Int(*i)),
            Value::Str(s) => Some(PrimaryKey::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            PrimaryKey::Int(i) => Value::Int(*i),
            PrimaryKey::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Int(i) => write!(f, "{i}"),
            PrimaryKey::Str(s) => f.write_str(&quote_str(s)),
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(i: i64) -> Self {
        PrimaryKey::Int(i)
    }
}

impl From<i32> for PrimaryKey {
    fn from(i: i32) -> Self {
        PrimaryKey::Int(i64::from(i))
    }
}

impl From<&str> for PrimaryKey {
    fn from(s: &str) -> Self {
        PrimaryKey::Str(s.to_string())
    }
}

/// Format a float so it always reads back as a float.
///
/// Rust's `Display` for `f64` is already shortest-round-trip; integral values get a trailing `.0` so `1.0` is not
/// mistaken for the integer `1`.
pub fn format_float(x: f64) -> String {
    if !x.is_finite() {
        return if x.is_nan() {
            "nan".to_string()
        } else if x > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }
    let s = format!("{x}");
    if s.contains(['.', 'e', 'E']) { s } else { format!("{s}.0") }
}

/// Double-quote a string, escaping quotes, backslashes and control characters.
pub fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => {
                // Writing to String cannot fail.
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a field map as `{"name": value, ...}` with keys in sorted order.
pub fn render_fields(fields: &BTreeMap<String, Value>) -> String {
    let mut out = String::from("{");
    for (i, (name, value)) in fields.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&quote_str(name));
        out.push_str(": ");
        out.push_str(&value.to_string());
    }
    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_float_keeps_decimal_point() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(-3.0), "-3.0");
        assert_eq!(format_float(0.25), "0.25");
    }

    #[test]
    fn test_float_round_trips_through_text() {
        for x in [0.1, 1.0 / 3.0, 1e300, -2.5e-8, f64::MAX, f64::MIN_POSITIVE] {
            let parsed: f64 = format_float(x).parse().unwrap();
            assert_eq!(parsed, x);
        }
    }

    #[test]
    fn test_quote_str_escapes() {
        assert_eq!(quote_str("a\"b"), r#""a\"b""#);
        assert_eq!(quote_str("back\\slash"), r#""back\\slash""#);
        assert_eq!(quote_str("line\nbreak"), r#""line\nbreak""#);
        assert_eq!(quote_str("\u{1}"), r#""\u{1}""#);
    }

    #[test]
    fn test_render_fields_sorted_and_double_quoted() {
        let mut fields = BTreeMap::new();
        fields.insert("def".to_string(), Value::Int(2));
        fields.insert("abc".to_string(), Value::Int(1));
        assert_eq!(render_fields(&fields), r#"{"abc": 1, "def": 2}"#);
    }

    #[test]
    fn test_primary_key_order_ints_before_strings() {
        let mut keys = vec![PrimaryKey::from("a"), PrimaryKey::Int(10), PrimaryKey::Int(2)];
        keys.sort();
        assert_eq!(keys, vec![PrimaryKey::Int(2), PrimaryKey::Int(10), PrimaryKey::from("a")]);
    }

    #[test]
    fn test_primary_key_from_value_rejects_floats() {
        assert_eq!(PrimaryKey::from_value(&Value::Int(3)), Some(PrimaryKey::Int(3)));
        assert_eq!(PrimaryKey::from_value(&Value::Float(3.0)), None);
        assert_eq!(PrimaryKey::from_value(&Value::Null), None);
    }
}
