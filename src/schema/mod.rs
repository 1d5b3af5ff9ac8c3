//! Unified schema inference
//!
//! Walks a record collection in a single forward pass and produces a
//! [`Schema`]: for every field path, the set of shapes observed across the
//! whole collection plus a widened scalar kind. Partial schemas built from
//! disjoint partitions merge in any order to the same result.

pub mod builder;

pub use builder::{infer_schema, Schema, SchemaBuilder, ShapeSet};
