use crate::flatten::assemble::FlatTable;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes each flat table to its own JSON Lines file, one row per line.
///
/// This is the stand-in for the external writer collaborator; columnar
/// formats and warehouse loaders plug in at the same boundary.
pub struct TableWriter {
    dir: PathBuf,
}

impl TableWriter {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        std::fs::create_dir_all(&dir).context("Failed to create output directory")?;
        Ok(TableWriter {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    /// Write one table to `<dir>/<name>.jsonl` and return the path.
    pub fn write(&self, table: &FlatTable) -> Result<PathBuf> {
        let path = self.dir.join(format!("{}.jsonl", table.name));
        let file = File::create(&path)
            .with_context(|| format!("Failed to create file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for row in &table.rows {
            let line = serde_json::to_string(row).context("Failed to serialize row")?;
            writeln!(writer, "{}", line).context("Failed to write row")?;
        }
        writer.flush().context("Failed to flush table file")?;
        Ok(path)
    }

    pub fn write_all(&self, tables: &IndexMap<String, FlatTable>) -> Result<()> {
        for table in tables.values() {
            self.write(table)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::assemble::{Cell, Row};

    #[test]
    fn writes_one_line_per_row() {
        let dir = std::env::temp_dir().join("strata-writer-test");
        let writer = TableWriter::new(&dir).unwrap();

        let mut table = FlatTable::new("t", vec!["a".into()]);
        let mut row = Row::new();
        row.insert("a".into(), Cell::Int(1));
        table.rows.push(row);
        let mut row = Row::new();
        row.insert("a".into(), Cell::Null);
        table.rows.push(row);

        let path = writer.write(&table).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "{\"a\":1}\n{\"a\":null}\n");
        std::fs::remove_dir_all(&dir).ok();
    }
}
