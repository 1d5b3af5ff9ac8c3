//! # Strata - relationalize nested records into flat tables
//!
//! A library for flattening collections of semi-structured records (trees of
//! scalars, nested structs, and arrays) into a root table plus one auxiliary
//! table per array-typed field path, linked by surrogate keys and array
//! positions, with one consistent column schema inferred across the whole
//! collection.
//!
//! ## Modules
//!
//! - **record**: the typed record tree and JSON conversions
//! - **schema**: single-pass, mergeable schema inference
//! - **flatten**: table planning, key allocation, flattening, row assembly
//!
//! ## Quick start
//!
//! ```rust
//! use strata::{relationalize, RelationalizeConfig};
//! use strata::record::Record;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), strata::RelationalizeError> {
//! let records: Vec<Record> = [
//!     json!({"id": 1, "name": "Alice", "posts": [{"title": "First"}, {"title": "Second"}]}),
//!     json!({"id": 2, "name": "Bob", "posts": [{"title": "Only"}]}),
//! ]
//! .iter()
//! .map(|v| Record::from_json(v).unwrap())
//! .collect();
//!
//! let output = relationalize(&records, RelationalizeConfig::new("users"))?;
//!
//! // output.tables["users"]       -> one row per record
//! // output.tables["users_posts"] -> one row per post, with `id` and `index`
//! assert_eq!(output.tables["users_posts"].rows.len(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! For streaming or partition-parallel use, drive the pieces directly:
//! [`SchemaBuilder`] per partition, `merge`, [`TablePlan::build`], then one
//! [`Flattener`] per worker with a disjoint [`KeyAllocator`] range.

use anyhow::Context;
use indexmap::IndexMap;
use std::io::BufRead;

pub mod error;
pub mod flatten;
pub mod record;
pub mod schema;

// Re-export the common surface for convenience
pub use error::RelationalizeError;
pub use flatten::{
    ArrayPolicy, Cell, FlatTable, FlattenReport, Flattener, KeyAllocator, KeySource,
    RelationalizeConfig, Row, SurrogateKey, TableAssembler, TablePlan, TableWriter,
};
pub use record::{FieldPath, Record, Scalar, ScalarKind, Value};
pub use schema::{infer_schema, Schema, SchemaBuilder};

/// The result of one relationalize run: the named table collection plus the
/// accounting for records that did not fit the plan.
#[derive(Debug)]
pub struct RelationalizeOutput {
    pub tables: IndexMap<String, FlatTable>,
    pub report: FlattenReport,
}

/// Main entry point: infer a schema over `records`, plan the tables, and
/// flatten every record.
///
/// Plan-time failures (`SchemaConflict`, `EmptySchema`) abort the run.
/// Per-record `SchemaMismatch` failures exclude that record and are counted
/// in the returned report; they never fail the batch.
pub fn relationalize(
    records: &[Record],
    config: RelationalizeConfig,
) -> Result<RelationalizeOutput, RelationalizeError> {
    let schema = infer_schema(records);
    let plan = TablePlan::build(&schema, &config)?;
    let flattener = Flattener::new(plan, config);
    let mut assembler = flattener.assembler();
    let mut report = FlattenReport::default();

    for record in records {
        match flattener.flatten(record, &mut assembler) {
            Ok(_) => report.note_ok(),
            Err(RelationalizeError::SchemaMismatch { path, key }) => {
                report.note_mismatch(path, key);
            }
            Err(fatal) => return Err(fatal),
        }
    }

    Ok(RelationalizeOutput {
        tables: assembler.into_tables(),
        report,
    })
}

/// Relationalize a stream of newline-delimited JSON objects.
///
/// The transform is two-pass, so the stream is collected before inference;
/// non-object lines are rejected.
pub fn relationalize_json<R: BufRead>(
    reader: R,
    config: RelationalizeConfig,
) -> anyhow::Result<RelationalizeOutput> {
    let mut records = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value =
            serde_json::from_str(line).context("Failed to parse JSON")?;
        let record = Record::from_json(&value)
            .with_context(|| format!("Line {} is not a JSON object", number + 1))?;
        records.push(record);
    }
    Ok(relationalize(&records, config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(values: &[serde_json::Value]) -> Vec<Record> {
        values.iter().map(|v| Record::from_json(v).unwrap()).collect()
    }

    #[test]
    fn round_trip_linkage() {
        let records = records(&[
            json!({"name": "a", "tags": ["x", "y"]}),
            json!({"name": "b", "tags": ["z"]}),
            json!({"name": "c"}),
        ]);
        let output = relationalize(&records, RelationalizeConfig::new("root")).unwrap();

        let root = &output.tables["root"];
        let tags = &output.tables["root_tags"];

        // Every auxiliary id resolves to exactly one root row, and the count
        // of auxiliary rows per id matches the source array length.
        for row in &tags.rows {
            let owners = root
                .rows
                .iter()
                .filter(|r| r["_id"] == row["id"])
                .count();
            assert_eq!(owners, 1);
        }
        for (root_row, expected) in root.rows.iter().zip([2i64, 1, 0]) {
            let aux_count = tags
                .rows
                .iter()
                .filter(|r| r["id"] == root_row["_id"])
                .count();
            assert_eq!(aux_count as i64, expected);
        }
    }

    #[test]
    fn surrogate_keys_are_unique() {
        let records = records(&[json!({"a": 1}), json!({"a": 2}), json!({"a": 3})]);
        let output = relationalize(&records, RelationalizeConfig::new("root")).unwrap();
        let mut keys: Vec<Cell> = output.tables["root"]
            .rows
            .iter()
            .map(|r| r["_id"].clone())
            .collect();
        let before = keys.len();
        keys.dedup();
        assert_eq!(keys.len(), before);
    }

    #[test]
    fn same_input_flattens_to_identical_tables() {
        let values = [
            json!({"id": 1, "tags": ["a"], "meta": {"k": "v"}}),
            json!({"id": 2, "tags": ["b", "c"]}),
        ];
        let records = records(&values);
        let first = relationalize(&records, RelationalizeConfig::new("root")).unwrap();
        let second = relationalize(&records, RelationalizeConfig::new("root")).unwrap();
        assert_eq!(first.tables, second.tables);
    }

    #[test]
    fn mismatched_records_are_skipped_and_counted() {
        // Build the plan from a clean sample, then flatten a batch that
        // contains one record whose array path holds a scalar.
        let sample = records(&[json!({"tags": ["a"]})]);
        let config = RelationalizeConfig::new("root");
        let plan = TablePlan::build(&infer_schema(&sample), &config).unwrap();
        let flattener = Flattener::new(plan, config);
        let mut assembler = flattener.assembler();
        let mut report = FlattenReport::default();

        let batch = records(&[
            json!({"tags": ["a", "b"]}),
            json!({"tags": "oops"}),
            json!({"tags": ["c"]}),
        ]);
        for record in &batch {
            match flattener.flatten(record, &mut assembler) {
                Ok(_) => report.note_ok(),
                Err(RelationalizeError::SchemaMismatch { path, key }) => {
                    report.note_mismatch(path, key)
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(report.records_in, 3);
        assert_eq!(report.records_out, 2);
        assert_eq!(report.mismatched, 1);
        assert_eq!(report.samples.len(), 1);
        assert_eq!(report.samples[0].path.to_string(), "tags");
        assert_eq!(assembler.tables()["root_tags"].rows.len(), 3);
    }

    #[test]
    fn zero_row_tables_still_exist() {
        // Plan from a sample that carries tags, then flatten a batch that
        // never does: the auxiliary table must still be present, empty.
        let sample = records(&[json!({"id": 1, "tags": ["a"]})]);
        let config = RelationalizeConfig::new("root");
        let plan = TablePlan::build(&infer_schema(&sample), &config).unwrap();
        let flattener = Flattener::new(plan, config);
        let mut assembler = flattener.assembler();
        let batch = records(&[json!({"id": 2})]);
        for record in &batch {
            flattener.flatten(record, &mut assembler).unwrap();
        }
        let tables = assembler.into_tables();
        assert!(tables["root_tags"].rows.is_empty());
        assert_eq!(tables["root_tags"].columns, vec!["id", "index", "value"]);
    }

    #[test]
    fn an_empty_collection_has_no_plannable_schema() {
        let empty: &[Record] = &[];
        let result = relationalize(empty, RelationalizeConfig::new("root"));
        assert!(matches!(result, Err(RelationalizeError::EmptySchema { .. })));
    }

    #[test]
    fn ndjson_helper_reads_and_flattens() {
        let input = "{\"id\": 1, \"tags\": [\"a\"]}\n\n{\"id\": 2, \"tags\": [\"b\"]}\n";
        let output =
            relationalize_json(input.as_bytes(), RelationalizeConfig::new("root")).unwrap();
        assert_eq!(output.tables["root"].rows.len(), 2);
        assert_eq!(output.tables["root_tags"].rows.len(), 2);
        assert_eq!(output.report.records_out, 2);
    }
}
