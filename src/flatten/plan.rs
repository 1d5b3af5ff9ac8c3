//! Table planning.
//!
//! Derives a [`TablePlan`] from an inferred [`Schema`]: every array-typed
//! path becomes an auxiliary table (recursively, so arrays nested inside
//! struct elements yield further tables chained to their immediate parent),
//! and every scalar or struct-of-scalars path becomes a column of whichever
//! table contains it. The plan fixes every table's name and column set up
//! front; flattening makes no naming or typing decisions of its own.

use crate::error::RelationalizeError;
use crate::flatten::config::{ArrayPolicy, KeySource, RelationalizeConfig};
use crate::record::{FieldPath, ScalarKind, Segment};
use crate::schema::Schema;
use std::collections::HashMap;

/// Reserved auxiliary column: the owning row's key.
pub const OWNER_KEY_COLUMN: &str = "id";
/// Reserved auxiliary column: 0-based position within the source array.
pub const INDEX_COLUMN: &str = "index";
/// Reserved column carrying a row's own generated key, present only where a
/// child table needs to reference it.
pub const ROW_KEY_COLUMN: &str = "_id";
/// Payload column for arrays of scalars and for nested-array counts.
pub const ELEMENT_VALUE_COLUMN: &str = "value";

/// One planned payload column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Column name: the dotted path relative to the table's scope.
    pub name: String,
    /// Lookup path relative to the table's scope; empty when the scope's
    /// value itself is the column (scalar array elements).
    pub path: FieldPath,
    /// Widened kind cells are coerced toward.
    pub kind: ScalarKind,
}

/// One planned auxiliary table hanging off an owning table.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySpec {
    /// Lookup path of the array relative to the owning table's scope; empty
    /// when the scope's element is itself the array.
    pub field: FieldPath,
    /// Absolute path, for diagnostics.
    pub path: FieldPath,
    /// Owning-row column carrying the element count; `None` under
    /// [`ArrayPolicy::Omit`].
    pub count_column: Option<String>,
    /// Scalars were also observed at this path during inference. The array
    /// shape wins; scalar occurrences demote to a single element at runtime
    /// instead of a mismatch.
    pub tolerates_scalar: bool,
    pub table: TableSpec,
}

/// The fixed shape of one destination table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub name: String,
    /// Reserved columns, in emission order.
    pub reserved: Vec<String>,
    /// Whether rows carry their own generated key in `_id`.
    pub carries_row_key: bool,
    pub columns: Vec<ColumnSpec>,
    pub arrays: Vec<ArraySpec>,
}

impl TableSpec {
    /// The complete, fixed column set every row of this table has.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = self.reserved.clone();
        names.extend(self.columns.iter().map(|c| c.name.clone()));
        names.extend(self.arrays.iter().filter_map(|a| a.count_column.clone()));
        names
    }

    fn payload_is_empty(&self) -> bool {
        self.columns.is_empty() && self.arrays.iter().all(|a| a.count_column.is_none())
    }

    fn validate_column_names(&self) -> Result<(), RelationalizeError> {
        for column in &self.columns {
            if self.reserved.iter().any(|r| r == &column.name) {
                return Err(RelationalizeError::SchemaConflict {
                    path: column.path.clone(),
                    reason: format!(
                        "column `{}` collides with a reserved column of table `{}`",
                        column.name, self.name
                    ),
                });
            }
        }
        for array in &self.arrays {
            if let Some(count) = &array.count_column {
                if self.reserved.iter().any(|r| r == count) {
                    return Err(RelationalizeError::SchemaConflict {
                        path: array.path.clone(),
                        reason: format!(
                            "count column `{}` collides with a reserved column of table `{}`",
                            count, self.name
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The complete plan: the root table plus its tree of auxiliary tables.
#[derive(Debug, Clone, PartialEq)]
pub struct TablePlan {
    pub root: TableSpec,
}

impl TablePlan {
    /// Plan every destination table for `schema`. Fails with
    /// `SchemaConflict` on irreconcilable shapes or table-name collisions
    /// and with `EmptySchema` when any planned table would have no payload
    /// columns.
    pub fn build(
        schema: &Schema,
        config: &RelationalizeConfig,
    ) -> Result<TablePlan, RelationalizeError> {
        let root_name = sanitize(&config.root_name);
        let mut names: HashMap<String, FieldPath> = HashMap::new();
        names.insert(root_name.clone(), FieldPath::empty());

        let mut columns = Vec::new();
        let mut arrays = Vec::new();
        collect_fields(
            schema,
            &FieldPath::empty(),
            &FieldPath::empty(),
            config,
            &mut names,
            &mut columns,
            &mut arrays,
        )?;

        // A key field can only stand in for `_id` if it actually has a
        // column for fallback keys to land in.
        let carries_row_key = match &config.key_source {
            KeySource::Generated => true,
            KeySource::Field(field) => !columns.iter().any(|c| &c.name == field),
        };
        let reserved = if carries_row_key {
            vec![ROW_KEY_COLUMN.to_string()]
        } else {
            Vec::new()
        };

        let root = TableSpec {
            name: root_name,
            reserved,
            carries_row_key,
            columns,
            arrays,
        };
        root.validate_column_names()?;
        if root.payload_is_empty() {
            return Err(RelationalizeError::EmptySchema { table: root.name });
        }
        Ok(TablePlan { root })
    }

    /// All planned tables, root first, in depth-first order.
    pub fn tables(&self) -> Vec<&TableSpec> {
        fn walk<'a>(spec: &'a TableSpec, out: &mut Vec<&'a TableSpec>) {
            out.push(spec);
            for array in &spec.arrays {
                walk(&array.table, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out
    }
}

/// Plan the fields of a struct scope (the root record, or a struct array
/// element) into columns and child tables of the owning table.
fn collect_fields(
    schema: &Schema,
    abs_prefix: &FieldPath,
    rel_prefix: &FieldPath,
    config: &RelationalizeConfig,
    names: &mut HashMap<String, FieldPath>,
    columns: &mut Vec<ColumnSpec>,
    arrays: &mut Vec<ArraySpec>,
) -> Result<(), RelationalizeError> {
    let children: Vec<(FieldPath, crate::schema::ShapeSet)> = schema
        .children_of(abs_prefix)
        .map(|(path, shape)| (path.clone(), *shape))
        .collect();

    for (abs, shape) in children {
        let Some(Segment::Field(field_name)) = abs.segments().last() else {
            continue;
        };
        let rel = rel_prefix.child_field(field_name.clone());

        if shape.saw_array && shape.saw_struct {
            return Err(RelationalizeError::SchemaConflict {
                path: abs,
                reason: "observed as both array and struct across records".into(),
            });
        }
        if shape.saw_array {
            let table_name = table_name_for(&abs, config);
            claim_name(names, table_name.clone(), &abs)?;
            let count_column = match config.array_policy {
                ArrayPolicy::Count => Some(rel.to_string()),
                ArrayPolicy::Omit => None,
            };
            let table = plan_element(schema, &abs.element(), table_name, config, names)?;
            arrays.push(ArraySpec {
                field: rel,
                path: abs,
                count_column,
                tolerates_scalar: shape.scalar.is_some(),
                table,
            });
        } else if shape.saw_struct {
            // Struct-of-scalars flattens into the owning table under dotted
            // names; scalar occurrences at the same path coerce at runtime.
            collect_fields(schema, &abs, &rel, config, names, columns, arrays)?;
        } else {
            columns.push(ColumnSpec {
                name: rel.to_string(),
                path: rel,
                kind: shape.scalar.unwrap_or(ScalarKind::String),
            });
        }
    }
    Ok(())
}

/// Plan the auxiliary table holding the elements of the array at `scope`'s
/// parent path. `scope` is the array path plus an `Element` segment.
fn plan_element(
    schema: &Schema,
    scope: &FieldPath,
    name: String,
    config: &RelationalizeConfig,
    names: &mut HashMap<String, FieldPath>,
) -> Result<TableSpec, RelationalizeError> {
    let shape = schema.shape(scope).copied();
    let mut columns = Vec::new();
    let mut arrays = Vec::new();

    match shape {
        // Array empty in every record: no element shape, no payload; the
        // empty-payload check below reports it.
        None => {}
        Some(s) if s.saw_array && s.saw_struct => {
            return Err(RelationalizeError::SchemaConflict {
                path: scope.clone(),
                reason: "observed as both array and struct across records".into(),
            });
        }
        Some(s) if s.saw_array => {
            // Array of arrays: the inner elements get their own table keyed
            // by this table's generated row key.
            let inner_name = table_name_for(scope, config);
            claim_name(names, inner_name.clone(), scope)?;
            let count_column = match config.array_policy {
                ArrayPolicy::Count => Some(ELEMENT_VALUE_COLUMN.to_string()),
                ArrayPolicy::Omit => None,
            };
            let table = plan_element(schema, &scope.element(), inner_name, config, names)?;
            arrays.push(ArraySpec {
                field: FieldPath::empty(),
                path: scope.clone(),
                count_column,
                tolerates_scalar: s.scalar.is_some(),
                table,
            });
        }
        Some(s) if s.saw_struct => {
            collect_fields(
                schema,
                scope,
                &FieldPath::empty(),
                config,
                names,
                &mut columns,
                &mut arrays,
            )?;
        }
        Some(s) => {
            columns.push(ColumnSpec {
                name: ELEMENT_VALUE_COLUMN.to_string(),
                path: FieldPath::empty(),
                kind: s.scalar.unwrap_or(ScalarKind::String),
            });
        }
    }

    let carries_row_key = !arrays.is_empty();
    let mut reserved = vec![OWNER_KEY_COLUMN.to_string(), INDEX_COLUMN.to_string()];
    if carries_row_key {
        reserved.push(ROW_KEY_COLUMN.to_string());
    }

    let spec = TableSpec {
        name,
        reserved,
        carries_row_key,
        columns,
        arrays,
    };
    spec.validate_column_names()?;
    if spec.payload_is_empty() {
        return Err(RelationalizeError::EmptySchema { table: spec.name });
    }
    Ok(spec)
}

/// `<rootName><sep><path segments joined by sep>`, every segment sanitized.
///
/// `Element` segments followed by a field are table hops, not name parts:
/// `posts[].comments` names `root_posts_comments`. Only trailing `Element`
/// segments are rendered, as `val`, so an array of arrays gets a distinct
/// inner-value table (`root_grid_val`).
fn table_name_for(path: &FieldPath, config: &RelationalizeConfig) -> String {
    let segments = path.segments();
    let last_field = segments
        .iter()
        .rposition(|s| matches!(s, Segment::Field(_)));
    let mut name = sanitize(&config.root_name);
    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Field(field) => {
                name.push_str(&config.separator);
                name.push_str(&sanitize(field));
            }
            Segment::Element => {
                if last_field.map_or(true, |f| i > f) {
                    name.push_str(&config.separator);
                    name.push_str("val");
                }
            }
        }
    }
    name
}

fn claim_name(
    names: &mut HashMap<String, FieldPath>,
    name: String,
    path: &FieldPath,
) -> Result<(), RelationalizeError> {
    if let Some(previous) = names.insert(name.clone(), path.clone()) {
        return Err(RelationalizeError::SchemaConflict {
            path: path.clone(),
            reason: format!("table name `{}` already produced by path `{}`", name, previous),
        });
    }
    Ok(())
}

/// Restrict a name segment to `[A-Za-z0-9_]`, the portable identifier set of
/// downstream row-stores.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::schema::infer_schema;
    use serde_json::json;

    fn plan_for(values: &[serde_json::Value], config: RelationalizeConfig) -> TablePlan {
        try_plan(values, config).unwrap()
    }

    fn try_plan(
        values: &[serde_json::Value],
        config: RelationalizeConfig,
    ) -> Result<TablePlan, RelationalizeError> {
        let records: Vec<Record> = values.iter().map(|v| Record::from_json(v).unwrap()).collect();
        TablePlan::build(&infer_schema(&records), &config)
    }

    #[test]
    fn arrays_become_tables_and_structs_become_dotted_columns() {
        let plan = plan_for(
            &[json!({
                "id": "10",
                "address": {"city": "Rota", "zip": "11520"},
                "contact_details": [{"type": "fax", "value": "202-228-3027"}]
            })],
            RelationalizeConfig::new("hist_root"),
        );

        assert_eq!(
            plan.root.column_names(),
            vec!["_id", "address.city", "address.zip", "id", "contact_details"]
        );

        let aux = &plan.root.arrays[0].table;
        assert_eq!(aux.name, "hist_root_contact_details");
        assert_eq!(aux.column_names(), vec!["id", "index", "type", "value"]);
        assert!(!aux.carries_row_key);
    }

    #[test]
    fn nested_arrays_chain_through_generated_keys() {
        let plan = plan_for(
            &[json!({
                "name": "a",
                "posts": [{"title": "t", "comments": [{"who": "b"}]}]
            })],
            RelationalizeConfig::new("root"),
        );

        let posts = &plan.root.arrays[0].table;
        assert_eq!(posts.name, "root_posts");
        assert!(posts.carries_row_key);
        assert_eq!(
            posts.column_names(),
            vec!["id", "index", "_id", "title", "comments"]
        );

        let comments = &posts.arrays[0].table;
        assert_eq!(comments.name, "root_posts_comments");
        assert_eq!(comments.column_names(), vec!["id", "index", "who"]);
    }

    #[test]
    fn scalar_elements_get_a_value_column() {
        let plan = plan_for(
            &[json!({"id": 1, "tags": ["x", "y"]})],
            RelationalizeConfig::new("root"),
        );
        let tags = &plan.root.arrays[0].table;
        assert_eq!(tags.column_names(), vec!["id", "index", "value"]);
        assert_eq!(tags.columns[0].kind, ScalarKind::String);
        assert!(tags.columns[0].path.is_empty());
    }

    #[test]
    fn array_of_arrays_gets_a_val_table() {
        let plan = plan_for(
            &[json!({"id": 1, "grid": [[1, 2], [3]]})],
            RelationalizeConfig::new("root"),
        );
        let grid = &plan.root.arrays[0].table;
        assert_eq!(grid.name, "root_grid");
        assert!(grid.carries_row_key);
        assert_eq!(grid.column_names(), vec!["id", "index", "_id", "value"]);

        let inner = &grid.arrays[0].table;
        assert_eq!(inner.name, "root_grid_val");
        assert_eq!(inner.column_names(), vec!["id", "index", "value"]);
        assert_eq!(inner.columns[0].kind, ScalarKind::Integer);
    }

    #[test]
    fn element_segments_never_leak_into_struct_nested_names() {
        let plan = plan_for(
            &[json!({
                "posts": [{"meta": {"links": ["l"]}, "comments": [{"who": "b"}]}]
            })],
            RelationalizeConfig::new("root"),
        );
        let posts = &plan.root.arrays[0].table;
        let names: Vec<&str> = posts.arrays.iter().map(|a| a.table.name.as_str()).collect();
        assert_eq!(names, vec!["root_posts_comments", "root_posts_meta_links"]);
    }

    #[test]
    fn triple_nested_arrays_get_one_val_per_level() {
        let plan = plan_for(
            &[json!({"cube": [[[1]]]})],
            RelationalizeConfig::new("root"),
        );
        let outer = &plan.root.arrays[0].table;
        assert_eq!(outer.name, "root_cube");
        let mid = &outer.arrays[0].table;
        assert_eq!(mid.name, "root_cube_val");
        let inner = &mid.arrays[0].table;
        assert_eq!(inner.name, "root_cube_val_val");
        assert_eq!(inner.columns[0].kind, ScalarKind::Integer);
    }

    #[test]
    fn omit_policy_drops_count_columns() {
        let plan = plan_for(
            &[json!({"id": 1, "tags": ["x"]})],
            RelationalizeConfig::new("root").with_array_policy(ArrayPolicy::Omit),
        );
        assert_eq!(plan.root.column_names(), vec!["_id", "id"]);
        assert!(plan.root.arrays[0].count_column.is_none());
    }

    #[test]
    fn key_field_removes_the_synthetic_root_column() {
        let plan = plan_for(
            &[json!({"id": 1, "name": "x"})],
            RelationalizeConfig::new("root").with_key_field("id"),
        );
        assert_eq!(plan.root.column_names(), vec!["id", "name"]);
        assert!(!plan.root.carries_row_key);
    }

    #[test]
    fn key_field_missing_from_the_schema_keeps_the_synthetic_column() {
        let plan = plan_for(
            &[json!({"name": "x"})],
            RelationalizeConfig::new("root").with_key_field("id"),
        );
        assert!(plan.root.carries_row_key);
        assert_eq!(plan.root.column_names(), vec!["_id", "name"]);
    }

    #[test]
    fn scalar_observations_at_an_array_path_are_tolerated() {
        let plan = plan_for(
            &[json!({"x": [1]}), json!({"x": 2})],
            RelationalizeConfig::new("root"),
        );
        assert!(plan.root.arrays[0].tolerates_scalar);

        let strict = plan_for(&[json!({"x": [1]})], RelationalizeConfig::new("root"));
        assert!(!strict.root.arrays[0].tolerates_scalar);
    }

    #[test]
    fn sanitized_name_collision_is_an_error() {
        let err = try_plan(
            &[json!({"a-b": [1], "a_b": [2]})],
            RelationalizeConfig::new("root"),
        )
        .unwrap_err();
        assert!(matches!(err, RelationalizeError::SchemaConflict { .. }));
    }

    #[test]
    fn array_versus_struct_is_an_unresolvable_conflict() {
        let err = try_plan(
            &[json!({"x": [1]}), json!({"x": {"y": 1}})],
            RelationalizeConfig::new("root"),
        )
        .unwrap_err();
        assert!(matches!(err, RelationalizeError::SchemaConflict { .. }));
    }

    #[test]
    fn struct_wins_over_scalar() {
        let plan = plan_for(
            &[json!({"x": {"y": 1}}), json!({"x": "plain"})],
            RelationalizeConfig::new("root"),
        );
        assert_eq!(plan.root.column_names(), vec!["_id", "x.y"]);
    }

    #[test]
    fn always_empty_array_makes_an_empty_table() {
        let err = try_plan(&[json!({"id": 1, "tags": []})], RelationalizeConfig::new("root"))
            .unwrap_err();
        assert!(matches!(
            err,
            RelationalizeError::EmptySchema { table } if table == "root_tags"
        ));
    }

    #[test]
    fn root_with_no_columns_is_an_error() {
        let err = try_plan(&[json!({})], RelationalizeConfig::new("root")).unwrap_err();
        assert!(matches!(err, RelationalizeError::EmptySchema { .. }));
    }

    #[test]
    fn reserved_collision_in_aux_table_is_an_error() {
        let err = try_plan(
            &[json!({"items": [{"id": 1, "index": 0}]})],
            RelationalizeConfig::new("root"),
        )
        .unwrap_err();
        assert!(matches!(err, RelationalizeError::SchemaConflict { .. }));
    }
}
