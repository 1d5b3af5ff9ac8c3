use crate::record::FieldPath;
use thiserror::Error;

/// Errors raised while planning or flattening.
///
/// `SchemaConflict` and `EmptySchema` are fatal for the run: the table plan
/// is unusable. `SchemaMismatch` is scoped to a single record; the driver
/// skips the record, counts it in the [`FlattenReport`](crate::FlattenReport),
/// and keeps going.
#[derive(Debug, Error)]
pub enum RelationalizeError {
    #[error("schema conflict at `{path}`: {reason}")]
    SchemaConflict { path: FieldPath, reason: String },

    #[error("record shape at `{path}` matches nothing in the inferred schema (record key: {key:?})")]
    SchemaMismatch {
        path: FieldPath,
        key: Option<i64>,
    },

    #[error("table `{table}` would have no columns")]
    EmptySchema { table: String },
}
