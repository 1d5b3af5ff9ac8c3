//! Row collection.
//!
//! The assembler gathers flattened rows by destination table name. It is
//! purely additive: each row has exactly one destination determined by the
//! plan, so there is no merge or conflict logic, and per-table input order is
//! preserved.

use crate::flatten::plan::TablePlan;
use indexmap::IndexMap;
use serde::Serialize;

/// One cell of a flat row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Bool(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

/// One flat row: column name to cell, in the table's column order.
pub type Row = IndexMap<String, Cell>;

/// A named, independently writable table of flat rows with a fixed column
/// set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl FlatTable {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        FlatTable {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Accumulates rows keyed by destination table name.
#[derive(Debug, Clone, Default)]
pub struct TableAssembler {
    tables: IndexMap<String, FlatTable>,
}

impl TableAssembler {
    /// Pre-create every planned table so zero-row tables still exist with
    /// their fixed column sets.
    pub fn for_plan(plan: &TablePlan) -> Self {
        let mut tables = IndexMap::new();
        for spec in plan.tables() {
            tables.insert(
                spec.name.clone(),
                FlatTable::new(spec.name.clone(), spec.column_names()),
            );
        }
        TableAssembler { tables }
    }

    pub fn push(&mut self, table: &str, row: Row) {
        match self.tables.get_mut(table) {
            Some(flat) => flat.rows.push(row),
            None => {
                let columns = row.keys().cloned().collect();
                let mut flat = FlatTable::new(table, columns);
                flat.rows.push(row);
                self.tables.insert(table.to_string(), flat);
            }
        }
    }

    pub fn tables(&self) -> &IndexMap<String, FlatTable> {
        &self.tables
    }

    /// Destination table names, root first, in plan order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn into_tables(self) -> IndexMap<String, FlatTable> {
        self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, Cell)]) -> Row {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn rows_accumulate_in_input_order() {
        let mut assembler = TableAssembler::default();
        assembler.push("t", row(&[("a", Cell::Int(1))]));
        assembler.push("t", row(&[("a", Cell::Int(2))]));
        assembler.push("u", row(&[("b", "x".into())]));

        assert_eq!(assembler.table_names(), vec!["t", "u"]);
        let t = &assembler.tables()["t"];
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0]["a"], Cell::Int(1));
        assert_eq!(t.rows[1]["a"], Cell::Int(2));
    }

    #[test]
    fn null_cell_serializes_as_json_null() {
        let serialized = serde_json::to_string(&row(&[
            ("a", Cell::Null),
            ("b", Cell::Float(1.5)),
            ("c", Cell::Bool(true)),
        ]))
        .unwrap();
        assert_eq!(serialized, r#"{"a":null,"b":1.5,"c":true}"#);
    }
}
