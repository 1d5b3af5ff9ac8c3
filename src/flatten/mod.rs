//! Relationalization: turn nested, array-bearing records into flat tables.
//!
//! This module holds everything downstream of schema inference: the table
//! plan derived from a schema, surrogate key allocation, the per-record
//! flattener, row assembly, and the JSONL table writer.
//!
//! The transform is two-pass by design: infer a schema over the whole
//! collection first, then flatten every record against the frozen plan, so
//! column sets are deterministic rather than an accident of field order.

pub mod assemble;
pub mod config;
pub mod flattener;
pub mod keys;
pub mod plan;
pub mod writer;

pub use assemble::{Cell, FlatTable, Row, TableAssembler};
pub use config::{ArrayPolicy, KeySource, RelationalizeConfig};
pub use flattener::{FlattenReport, Flattener, MismatchSample};
pub use keys::{KeyAllocator, SurrogateKey};
pub use plan::{ArraySpec, ColumnSpec, TablePlan, TableSpec};
pub use writer::TableWriter;
