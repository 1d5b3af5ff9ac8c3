//! Conversions between the record model and `serde_json` values.
//!
//! JSON is the currency at the engine's edges: the CLI reads NDJSON, the
//! table writer emits JSON lines, and defensive coercion renders mismatched
//! subtrees back to JSON text. ISO-8601 date and datetime strings are
//! recognized and tagged as timestamps on the way in.

use super::{Record, Scalar, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

static ISO_DATETIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?$").unwrap()
});

static ISO_DATE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Check a string against the timestamp formats the scalar model recognizes.
fn is_timestamp(s: &str) -> bool {
    let bytes = s.as_bytes();
    // Cheap shape checks before the regexes.
    if s.len() == 10 && bytes[4] == b'-' && bytes[7] == b'-' {
        return ISO_DATE_REGEX.is_match(s);
    }
    if s.len() >= 19 && bytes[10] == b'T' {
        return ISO_DATETIME_REGEX.is_match(s);
    }
    false
}

impl Value {
    pub fn from_json(json: &JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Scalar(Scalar::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Scalar(Scalar::Int(i))
                } else {
                    Value::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            JsonValue::String(s) => {
                if is_timestamp(s) {
                    Value::Scalar(Scalar::Timestamp(s.clone()))
                } else {
                    Value::Scalar(Scalar::Text(s.clone()))
                }
            }
            JsonValue::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            JsonValue::Object(fields) => Value::Struct(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Scalar(scalar) => scalar.to_json(),
            Value::Struct(record) => JsonValue::Object(
                record
                    .fields()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
            Value::Array(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

impl Scalar {
    pub fn to_json(&self) -> JsonValue {
        match self {
            Scalar::Bool(b) => JsonValue::Bool(*b),
            Scalar::Int(i) => JsonValue::from(*i),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Scalar::Timestamp(t) => JsonValue::String(t.clone()),
            Scalar::Binary(_) | Scalar::Text(_) => JsonValue::String(self.render()),
        }
    }
}

impl Record {
    /// Build a record from a JSON object. Returns `None` for any other JSON
    /// value; top-level scalars and arrays are not records.
    pub fn from_json(json: &JsonValue) -> Option<Record> {
        match Value::from_json(json) {
            Value::Struct(record) => Some(record),
            _ => None,
        }
    }
}
