//! The core transform: one record in, one root row plus zero or more
//! auxiliary rows out, all shapes decided by the pre-computed [`TablePlan`].
//!
//! A record either flattens completely or not at all: rows are staged
//! locally and only handed to the assembler once the whole record has been
//! walked, so a mid-record `SchemaMismatch` leaves no partial output.

use crate::error::RelationalizeError;
use crate::flatten::assemble::{Cell, Row, TableAssembler};
use crate::flatten::config::{KeySource, RelationalizeConfig};
use crate::flatten::keys::{KeyAllocator, SurrogateKey};
use crate::flatten::plan::{
    ArraySpec, TablePlan, TableSpec, INDEX_COLUMN, OWNER_KEY_COLUMN, ROW_KEY_COLUMN,
};
use crate::record::{FieldPath, Record, Scalar, ScalarKind, Value};
use std::cell::RefCell;

/// Cap on the offending-path samples kept in a [`FlattenReport`].
pub const MISMATCH_SAMPLE_LIMIT: usize = 10;

/// Where a lookup starts: the root record, or one array element.
#[derive(Clone, Copy)]
enum Scope<'a> {
    Record(&'a Record),
    Element(&'a Value),
}

impl<'a> Scope<'a> {
    /// An empty path addresses the element itself; anything else descends
    /// through struct fields and yields `None` on any shape disagreement.
    fn lookup(&self, path: &FieldPath) -> Option<&'a Value> {
        match *self {
            Scope::Record(record) => record.lookup(path),
            Scope::Element(value) => {
                if path.is_empty() {
                    Some(value)
                } else if let Value::Struct(record) = value {
                    record.lookup(path)
                } else {
                    None
                }
            }
        }
    }
}

/// Flattens records against a fixed plan.
pub struct Flattener {
    plan: TablePlan,
    config: RelationalizeConfig,
    keys: RefCell<KeyAllocator>,
}

impl Flattener {
    pub fn new(plan: TablePlan, config: RelationalizeConfig) -> Self {
        Flattener::with_allocator(plan, config, KeyAllocator::new())
    }

    /// Use a pre-positioned allocator, e.g. a disjoint offset/stride range
    /// per parallel worker.
    pub fn with_allocator(
        plan: TablePlan,
        config: RelationalizeConfig,
        keys: KeyAllocator,
    ) -> Self {
        Flattener {
            plan,
            config,
            keys: RefCell::new(keys),
        }
    }

    pub fn plan(&self) -> &TablePlan {
        &self.plan
    }

    /// An assembler with every planned table pre-created.
    pub fn assembler(&self) -> TableAssembler {
        TableAssembler::for_plan(&self.plan)
    }

    /// Flatten one record into the assembler. Returns the record's surrogate
    /// key on success; on `SchemaMismatch` the assembler is untouched.
    pub fn flatten(
        &self,
        record: &Record,
        out: &mut TableAssembler,
    ) -> Result<SurrogateKey, RelationalizeError> {
        let (key, fell_back) = self.record_key(record);
        // A fallback key must still surface in the root row, or auxiliary
        // `id` values would resolve to nothing; it overwrites the key
        // field's own column.
        let key_column = match (&self.config.key_source, fell_back) {
            (KeySource::Field(field), true) => Some(field.as_str()),
            _ => None,
        };
        let mut staged: Vec<(String, Row)> = Vec::new();
        self.emit(
            &self.plan.root,
            Scope::Record(record),
            key,
            None,
            key,
            key_column,
            &mut staged,
        )?;
        for (table, row) in staged {
            out.push(&table, row);
        }
        Ok(key)
    }

    /// The record's surrogate key, and whether the allocator had to stand in
    /// for the configured key field.
    fn record_key(&self, record: &Record) -> (SurrogateKey, bool) {
        match &self.config.key_source {
            KeySource::Generated => (self.keys.borrow_mut().next_key(), false),
            KeySource::Field(field) => match record.get(field) {
                Some(Value::Scalar(Scalar::Int(i))) => (*i, false),
                Some(Value::Scalar(Scalar::Text(s))) => match s.trim().parse() {
                    Ok(key) => (key, false),
                    Err(_) => (self.keys.borrow_mut().next_key(), true),
                },
                _ => (self.keys.borrow_mut().next_key(), true),
            },
        }
    }

    /// Emit one row for `spec` plus, recursively, the element rows of every
    /// planned array reachable from `scope`.
    fn emit<'a>(
        &self,
        spec: &TableSpec,
        scope: Scope<'a>,
        self_key: SurrogateKey,
        owner: Option<(SurrogateKey, i64)>,
        root_key: SurrogateKey,
        key_column: Option<&str>,
        staged: &mut Vec<(String, Row)>,
    ) -> Result<(), RelationalizeError> {
        let mut row =
            Row::with_capacity(spec.reserved.len() + spec.columns.len() + spec.arrays.len());
        if let Some((owner_key, index)) = owner {
            row.insert(OWNER_KEY_COLUMN.to_string(), Cell::Int(owner_key));
            row.insert(INDEX_COLUMN.to_string(), Cell::Int(index));
        }
        if spec.carries_row_key {
            row.insert(ROW_KEY_COLUMN.to_string(), Cell::Int(self_key));
        }

        for column in &spec.columns {
            let cell = if key_column == Some(column.name.as_str()) {
                Cell::Int(self_key)
            } else {
                match scope.lookup(&column.path) {
                    None | Some(Value::Null) => Cell::Null,
                    Some(value) => coerce(value, column.kind),
                }
            };
            row.insert(column.name.clone(), cell);
        }

        let mut pending: Vec<(&ArraySpec, &'a [Value])> = Vec::new();
        for array in &spec.arrays {
            match scope.lookup(&array.field) {
                None | Some(Value::Null) => {
                    if let Some(count) = &array.count_column {
                        row.insert(count.clone(), Cell::Null);
                    }
                }
                Some(Value::Array(items)) => {
                    if let Some(count) = &array.count_column {
                        row.insert(count.clone(), Cell::Int(items.len() as i64));
                    }
                    pending.push((array, items));
                }
                // A non-array shape seen during inference demotes to a
                // single element; an unseen shape is a mismatch.
                Some(value) if array.tolerates_scalar => {
                    if let Some(count) = &array.count_column {
                        row.insert(count.clone(), Cell::Int(1));
                    }
                    pending.push((array, std::slice::from_ref(value)));
                }
                Some(_) => {
                    return Err(RelationalizeError::SchemaMismatch {
                        path: array.path.clone(),
                        key: Some(root_key),
                    });
                }
            }
        }

        staged.push((spec.name.clone(), row));

        for (array, items) in pending {
            for (index, item) in items.iter().enumerate() {
                // Intermediate keys exist only where a grandchild table
                // needs to reference this element's row.
                let child_key = if array.table.carries_row_key {
                    self.keys.borrow_mut().next_key()
                } else {
                    self_key
                };
                self.emit(
                    &array.table,
                    Scope::Element(item),
                    child_key,
                    Some((self_key, index as i64)),
                    root_key,
                    None,
                    staged,
                )?;
            }
        }
        Ok(())
    }
}

/// Fit a value into a column of the planned kind. Shape disagreements render
/// to text instead of failing the record.
fn coerce(value: &Value, kind: ScalarKind) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Scalar(scalar) => coerce_scalar(scalar, kind),
        other => Cell::Text(other.to_json().to_string()),
    }
}

fn coerce_scalar(scalar: &Scalar, kind: ScalarKind) -> Cell {
    match (kind, scalar) {
        (ScalarKind::Integer, Scalar::Int(i)) => Cell::Int(*i),
        (ScalarKind::Float, Scalar::Float(f)) => Cell::Float(*f),
        (ScalarKind::Float, Scalar::Int(i)) => Cell::Float(*i as f64),
        (ScalarKind::Boolean, Scalar::Bool(b)) => Cell::Bool(*b),
        _ => Cell::Text(scalar.render()),
    }
}

/// Aggregate accounting for one flatten pass: every record is either
/// flattened or counted as mismatched, never silently dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenReport {
    pub records_in: usize,
    pub records_out: usize,
    pub mismatched: usize,
    /// First few offending paths, capped at [`MISMATCH_SAMPLE_LIMIT`].
    pub samples: Vec<MismatchSample>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MismatchSample {
    pub path: FieldPath,
    pub key: Option<SurrogateKey>,
}

impl FlattenReport {
    pub fn note_ok(&mut self) {
        self.records_in += 1;
        self.records_out += 1;
    }

    pub fn note_mismatch(&mut self, path: FieldPath, key: Option<SurrogateKey>) {
        self.records_in += 1;
        self.mismatched += 1;
        if self.samples.len() < MISMATCH_SAMPLE_LIMIT {
            self.samples.push(MismatchSample { path, key });
        }
    }
}
