//! strata-flatten: relationalize nested JSON into flat tables
//!
//! Reads a JSON array or newline-delimited JSON objects, infers one schema
//! over the whole input, then flattens every record into a root table plus
//! one table per array-typed field path.
//!
//! Usage:
//!   # Read a JSON array, write one .jsonl file per table
//!   strata-flatten --root-name users data.json --output-dir ./tables
//!
//!   # NDJSON from stdin, tables to stdout with a _table marker column
//!   cat events.jsonl | strata-flatten --root-name events --ndjson
//!
//!   # Reuse a source id field as the surrogate key, drop array counts
//!   strata-flatten --root-name hist --key-field id --omit-arrays data.json

// MiMalloc pairs well with simd-json's allocation pattern
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value as JsonValue;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use strata::{
    relationalize, ArrayPolicy, Record, RelationalizeConfig, RelationalizeOutput, TableWriter,
};

#[derive(Parser, Debug)]
#[command(name = "strata-flatten")]
#[command(about = "Relationalize nested JSON into flat tables", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Name of the root table; auxiliary table names derive from it
    #[arg(long, short = 'r')]
    root_name: String,

    /// Treat input as newline-delimited JSON instead of one JSON value
    #[arg(long)]
    ndjson: bool,

    /// Output directory for one .jsonl file per table
    /// If omitted, all rows go to stdout with a _table marker column
    #[arg(long, short = 'o')]
    output_dir: Option<String>,

    /// Separator for derived table names (default: "_")
    #[arg(long)]
    separator: Option<String>,

    /// Drop array fields from owning rows instead of emitting counts
    #[arg(long)]
    omit_arrays: bool,

    /// Reuse this integer-valued source field as the surrogate key
    #[arg(long)]
    key_field: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = RelationalizeConfig::new(&args.root_name);
    if let Some(sep) = &args.separator {
        config = config.with_separator(sep);
    }
    if args.omit_arrays {
        config = config.with_array_policy(ArrayPolicy::Omit);
    }
    if let Some(field) = &args.key_field {
        config = config.with_key_field(field);
    }

    let records = read_records(args.input.as_deref(), args.ndjson)?;
    if records.is_empty() {
        eprintln!("Warning: no JSON objects found in input");
        return Ok(());
    }

    let output = relationalize(&records, config)?;
    report_to_stderr(&output);

    if let Some(dir) = &args.output_dir {
        let writer = TableWriter::new(dir)?;
        writer.write_all(&output.tables)?;
    } else {
        write_tables_to_stdout(&output)?;
    }

    Ok(())
}

/// Read the whole input and parse it as a JSON array of objects, a single
/// object, or NDJSON. The buffer is parsed with simd-json first and falls
/// back to serde_json line parsing.
fn read_records(input: Option<&str>, ndjson: bool) -> Result<Vec<Record>> {
    let mut content = Vec::new();
    let mut reader: Box<dyn Read> = if let Some(path) = input {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path))?,
        ))
    } else {
        Box::new(std::io::stdin())
    };
    reader.read_to_end(&mut content)?;

    let mut records = Vec::new();

    if !ndjson {
        // Whole-buffer SIMD parse for array or single-object inputs;
        // simd-json mutates its buffer, so parse a scratch copy
        let mut scratch = content.clone();
        if let Ok(parsed) = simd_json::to_owned_value(&mut scratch) {
            let json: JsonValue = serde_json::from_str(&simd_json::to_string(&parsed)?)?;
            match json {
                JsonValue::Array(items) => {
                    for (i, item) in items.iter().enumerate() {
                        records.push(
                            Record::from_json(item)
                                .with_context(|| format!("Element {} is not an object", i))?,
                        );
                    }
                }
                other => {
                    records
                        .push(Record::from_json(&other).context("Input is not a JSON object")?);
                }
            }
            return Ok(records);
        }
    }

    // NDJSON (or fallback for inputs simd-json rejects)
    let text = String::from_utf8_lossy(&content);
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: JsonValue = serde_json::from_str(line)
            .with_context(|| format!("Failed to parse line {}", number + 1))?;
        records.push(
            Record::from_json(&value)
                .with_context(|| format!("Line {} is not a JSON object", number + 1))?,
        );
    }
    Ok(records)
}

fn report_to_stderr(output: &RelationalizeOutput) {
    let report = &output.report;
    eprintln!(
        "{} records in, {} flattened, {} mismatched, {} tables",
        report.records_in,
        report.records_out,
        report.mismatched,
        output.tables.len()
    );
    for sample in &report.samples {
        eprintln!("  mismatch at `{}` (key: {:?})", sample.path, sample.key);
    }
}

/// Single-stream mode: every row as one JSON line tagged with its table.
fn write_tables_to_stdout(output: &RelationalizeOutput) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    for table in output.tables.values() {
        for row in &table.rows {
            let mut tagged = serde_json::Map::new();
            tagged.insert(
                "_table".to_string(),
                JsonValue::String(table.name.clone()),
            );
            let cells = serde_json::to_value(row).context("Failed to serialize row")?;
            if let JsonValue::Object(cells) = cells {
                tagged.extend(cells);
            }
            writeln!(handle, "{}", JsonValue::Object(tagged))?;
        }
    }
    Ok(())
}
