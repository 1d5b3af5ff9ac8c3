//! Streaming schema accumulator.
//!
//! Instead of building one schema per record and merging trees, the builder
//! accumulates a flat map of field path to observed shapes while records
//! stream past, and freezes it once at the end. Memory is proportional to the
//! number of distinct field paths, not the number of records.

use crate::record::{FieldPath, Record, ScalarKind, Value};
use std::collections::BTreeMap;

/// Every shape observed for one field path across the input collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShapeSet {
    pub saw_null: bool,
    pub saw_struct: bool,
    pub saw_array: bool,
    /// Widened kind of all scalar occurrences, if any.
    pub scalar: Option<ScalarKind>,
}

impl ShapeSet {
    fn note_scalar(&mut self, kind: ScalarKind) {
        self.scalar = Some(match self.scalar {
            Some(existing) => existing.widen(kind),
            None => kind,
        });
    }

    fn absorb(&mut self, other: &ShapeSet) {
        self.saw_null |= other.saw_null;
        self.saw_struct |= other.saw_struct;
        self.saw_array |= other.saw_array;
        self.scalar = match (self.scalar, other.scalar) {
            (Some(a), Some(b)) => Some(a.widen(b)),
            (a, b) => a.or(b),
        };
    }
}

/// The unified schema of a record collection: a sorted, read-only map from
/// field path to [`ShapeSet`]. Element schemas of arrays live under the
/// path's `Element` segment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    paths: BTreeMap<FieldPath, ShapeSet>,
}

impl Schema {
    pub fn shape(&self, path: &FieldPath) -> Option<&ShapeSet> {
        self.paths.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &ShapeSet)> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// The immediate children of `prefix`, in path order. Intermediate paths
    /// always have their own entry, so one level of extra length is enough.
    pub(crate) fn children_of<'a>(
        &'a self,
        prefix: &'a FieldPath,
    ) -> impl Iterator<Item = (&'a FieldPath, &'a ShapeSet)> {
        self.paths
            .range(prefix.clone()..)
            .take_while(move |(path, _)| path.starts_with(prefix))
            .filter(move |(path, _)| path.len() == prefix.len() + 1)
    }
}

/// Single-pass accumulator behind [`Schema`]. `observe` each record (or run
/// one builder per partition and `merge` them), then `finish`.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    paths: BTreeMap<FieldPath, ShapeSet>,
    records: usize,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        SchemaBuilder::default()
    }

    /// Number of records observed so far.
    pub fn records(&self) -> usize {
        self.records
    }

    pub fn observe(&mut self, record: &Record) {
        self.records += 1;
        for (name, value) in record.fields() {
            self.observe_value(&FieldPath::field(name), value);
        }
    }

    fn observe_value(&mut self, path: &FieldPath, value: &Value) {
        match value {
            Value::Null => {
                self.shape_mut(path).saw_null = true;
            }
            Value::Scalar(scalar) => {
                let kind = scalar.kind();
                self.shape_mut(path).note_scalar(kind);
            }
            Value::Struct(record) => {
                self.shape_mut(path).saw_struct = true;
                for (name, child) in record.fields() {
                    self.observe_value(&path.child_field(name), child);
                }
            }
            Value::Array(items) => {
                self.shape_mut(path).saw_array = true;
                let element = path.element();
                for item in items {
                    self.observe_value(&element, item);
                }
            }
        }
    }

    fn shape_mut(&mut self, path: &FieldPath) -> &mut ShapeSet {
        self.paths.entry(path.clone()).or_default()
    }

    /// Fold another builder into this one. Widening is associative and
    /// commutative, so partitions may be merged in any order.
    pub fn merge(&mut self, other: SchemaBuilder) {
        self.records += other.records;
        for (path, shape) in other.paths {
            self.paths.entry(path).or_default().absorb(&shape);
        }
    }

    pub fn finish(self) -> Schema {
        Schema { paths: self.paths }
    }
}

/// Infer the unified schema of a record collection in one forward pass.
pub fn infer_schema<'a, I>(records: I) -> Schema
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut builder = SchemaBuilder::new();
    for record in records {
        builder.observe(record);
    }
    builder.finish()
}
