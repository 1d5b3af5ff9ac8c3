//! strata-infer: print the unified schema of a record collection
//!
//! Runs only the inference pass and prints one entry per field path: the
//! shapes observed across the input and the widened scalar kind. Useful for
//! inspecting what strata-flatten would plan before running it.
//!
//! Usage:
//!   # Read from file, output to stdout
//!   strata-infer data.json
//!
//!   # Process NDJSON from stdin
//!   cat events.jsonl | strata-infer --ndjson

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{json, Value as JsonValue};
use std::fs::File;
use std::io::{stdin, BufRead, BufReader, Read};
use strata::{Record, Schema, SchemaBuilder};

#[derive(Parser, Debug)]
#[command(name = "strata-infer")]
#[command(about = "Infer the unified schema of semi-structured records", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Process newline-delimited JSON (one JSON object per line)
    #[arg(long)]
    ndjson: bool,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut reader: Box<dyn BufRead> = if let Some(path) = &args.input {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path))?,
        ))
    } else {
        Box::new(BufReader::new(stdin()))
    };

    let mut builder = SchemaBuilder::new();
    if args.ndjson {
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: JsonValue = serde_json::from_str(line)
                .with_context(|| format!("Failed to parse line {}", number + 1))?;
            if let Some(record) = Record::from_json(&value) {
                builder.observe(&record);
            }
        }
    } else {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        let value: JsonValue = serde_json::from_str(&content).context("Failed to parse JSON")?;
        match value {
            JsonValue::Array(items) => {
                for item in &items {
                    if let Some(record) = Record::from_json(item) {
                        builder.observe(&record);
                    }
                }
            }
            other => {
                if let Some(record) = Record::from_json(&other) {
                    builder.observe(&record);
                }
            }
        }
    }

    if builder.records() == 0 {
        eprintln!("Warning: no JSON objects found in input");
    }

    let schema = builder.finish();
    let listing = schema_listing(&schema);

    let output = if args.compact {
        serde_json::to_string(&listing)?
    } else {
        serde_json::to_string_pretty(&listing)?
    };
    println!("{}", output);

    Ok(())
}

/// One JSON entry per field path: observed shapes and the widened kind.
fn schema_listing(schema: &Schema) -> JsonValue {
    let entries: Vec<JsonValue> = schema
        .iter()
        .map(|(path, shape)| {
            let mut shapes = Vec::new();
            if shape.saw_array {
                shapes.push("array");
            }
            if shape.saw_struct {
                shapes.push("struct");
            }
            if shape.scalar.is_some() {
                shapes.push("scalar");
            }
            if shape.saw_null {
                shapes.push("null");
            }
            json!({
                "path": path.to_string(),
                "shapes": shapes,
                "kind": shape.scalar.map(|k| k.to_string()),
            })
        })
        .collect();
    json!(entries)
}
