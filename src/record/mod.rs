//! In-memory record model
//!
//! A [`Record`] is one semi-structured input record: an ordered mapping from
//! field name to [`Value`], where a value is null, a scalar, a nested struct,
//! or an array. Records are the input currency of every other module and are
//! never mutated by the engine.

pub mod json;

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// The scalar type of a value, without its literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Boolean,
    Integer,
    Float,
    Timestamp,
    Binary,
    String,
}

impl ScalarKind {
    /// Combine two observed kinds at the same field path.
    ///
    /// `Integer` widens to `Float`; every other disagreement widens to
    /// `String`, which can represent any scalar as text. The result is a join
    /// in a lattice, so widening is associative and commutative and partial
    /// schemas can be merged in any order.
    pub fn widen(self, other: ScalarKind) -> ScalarKind {
        use ScalarKind::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            _ => String,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Boolean => "boolean",
            ScalarKind::Integer => "integer",
            ScalarKind::Float => "float",
            ScalarKind::Timestamp => "timestamp",
            ScalarKind::Binary => "binary",
            ScalarKind::String => "string",
        };
        f.write_str(name)
    }
}

/// A scalar literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// ISO-8601 date or datetime, kept as its original text.
    Timestamp(String),
    Binary(Vec<u8>),
    Text(String),
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Bool(_) => ScalarKind::Boolean,
            Scalar::Int(_) => ScalarKind::Integer,
            Scalar::Float(_) => ScalarKind::Float,
            Scalar::Timestamp(_) => ScalarKind::Timestamp,
            Scalar::Binary(_) => ScalarKind::Binary,
            Scalar::Text(_) => ScalarKind::String,
        }
    }

    /// Lossless textual representation, used when a value lands in a column
    /// that was widened to `String`.
    pub fn render(&self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Timestamp(t) => t.clone(),
            Scalar::Binary(bytes) => {
                let mut out = String::with_capacity(bytes.len() * 2);
                for b in bytes {
                    out.push_str(&format!("{:02x}", b));
                }
                out
            }
            Scalar::Text(s) => s.clone(),
        }
    }
}

/// One node of a record tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Scalar(Scalar),
    Struct(Record),
    Array(Vec<Value>),
}

/// An ordered mapping from field name to [`Value`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolve a path against this record. Returns `None` when any
    /// intermediate segment is absent or not a struct; `Element` segments are
    /// not addressable here, only in schemas.
    pub fn lookup(&self, path: &FieldPath) -> Option<&Value> {
        let mut segments = path.segments().iter();
        let first = match segments.next()? {
            Segment::Field(name) => name,
            Segment::Element => return None,
        };
        let mut current = self.get(first)?;
        for segment in segments {
            let Segment::Field(name) = segment else {
                return None;
            };
            let Value::Struct(record) = current else {
                return None;
            };
            current = record.get(name)?;
        }
        Some(current)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Record {
            fields: iter.into_iter().collect(),
        }
    }
}

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// A named struct field.
    Field(String),
    /// The elements of the array at the preceding path. Only schemas use
    /// this; records address fields by name alone.
    Element,
}

/// An ordered sequence of segments identifying a location in the record tree,
/// e.g. `contact_details` or `address.city`.
///
/// The empty path is used internally as the root scope when planning; paths
/// stored in a schema are always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn empty() -> Self {
        FieldPath::default()
    }

    pub fn field(name: impl Into<String>) -> Self {
        FieldPath {
            segments: vec![Segment::Field(name.into())],
        }
    }

    /// Parse a dotted path such as `address.city`.
    pub fn parse(dotted: &str) -> Self {
        FieldPath {
            segments: dotted
                .split('.')
                .filter(|s| !s.is_empty())
                .map(|s| Segment::Field(s.to_string()))
                .collect(),
        }
    }

    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        FieldPath { segments }
    }

    pub fn child_field(&self, name: impl Into<String>) -> Self {
        self.child(Segment::Field(name.into()))
    }

    /// The path of the elements of the array at this path.
    pub fn element(&self) -> Self {
        self.child(Segment::Element)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                Segment::Element => out.push_str("[]"),
            }
        }
        f.write_str(&out)
    }
}
