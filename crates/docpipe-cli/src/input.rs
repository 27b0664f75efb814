//! Loading tables from CSV and JSON files.
//!
//! CSV cells are trimmed and typed per column: a column whose non-empty
//! cells all parse as integers becomes an integer column, then float, bool
//! and RFC 3339 timestamp are tried in that order, and anything else stays a
//! string. Empty cells leave the field absent.
//!
//! JSON input is either an array of flat objects (key order is the order
//! keys are first seen) or a serialized table with an explicit schema.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use docpipe_model::{Field, FieldType, Record, Schema, TableContent, Value, ValueKind};
use serde::de::{Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use tracing::{debug, warn};

/// Load a table, choosing the reader by file extension.
pub fn load_table(path: &Path) -> Result<TableContent> {
    let id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("table")
        .to_string();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let table = match extension.as_deref() {
        Some("csv") => {
            let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            read_csv(&id, file).with_context(|| format!("read csv: {}", path.display()))?
        }
        Some("json") => {
            let text =
                fs::read_to_string(path).with_context(|| format!("open {}", path.display()))?;
            read_json(&id, &text).with_context(|| format!("read json: {}", path.display()))?
        }
        _ => bail!(
            "unsupported input file {} (expected .csv or .json)",
            path.display()
        ),
    };
    debug!(
        path = %path.display(),
        table_id = %table.id,
        rows = table.record_count(),
        columns = table.schema.field_count(),
        "table loaded"
    );
    Ok(table)
}

fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_cell(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_timestamp(cell: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(cell)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Narrowest type every non-empty cell parses as.
fn infer_type<'a>(cells: impl Iterator<Item = &'a str>) -> FieldType {
    let mut seen = false;
    let (mut int, mut float, mut boolean, mut timestamp) = (true, true, true, true);
    for cell in cells.filter(|cell| !cell.is_empty()) {
        seen = true;
        int &= cell.parse::<i64>().is_ok();
        float &= cell.parse::<f64>().is_ok();
        boolean &= parse_bool(cell).is_some();
        timestamp &= parse_timestamp(cell).is_some();
    }
    match (seen, int, float, boolean, timestamp) {
        (false, ..) => FieldType::String,
        (_, true, ..) => FieldType::Integer,
        (_, _, true, ..) => FieldType::Float,
        (_, _, _, true, _) => FieldType::Bool,
        (_, _, _, _, true) => FieldType::Timestamp,
        _ => FieldType::String,
    }
}

fn parse_cell(cell: &str, field_type: FieldType) -> Value {
    let parsed = match field_type {
        FieldType::Integer => cell.parse::<i64>().ok().map(Value::Int),
        FieldType::Float => cell.parse::<f64>().ok().map(Value::Float),
        FieldType::Bool => parse_bool(cell).map(Value::Bool),
        FieldType::Timestamp => parse_timestamp(cell).map(Value::Timestamp),
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::from(cell))
}

/// Read CSV with a header row. Blank rows are skipped; short rows leave the
/// trailing fields absent, and cells past the last header are dropped with a
/// warning.
pub fn read_csv<R: Read>(id: &str, reader: R) -> Result<TableContent> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = reader
        .headers()
        .context("read header row")?
        .iter()
        .map(normalize_header)
        .collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("read record {}", line + 1))?;
        if record.len() > headers.len() {
            warn!(
                record = line + 1,
                cells = record.len(),
                columns = headers.len(),
                "cells beyond the header row ignored"
            );
        }
        let row: Vec<String> = record.iter().map(normalize_cell).collect();
        if row.iter().all(String::is_empty) {
            continue;
        }
        rows.push(row);
    }

    let types: Vec<FieldType> = (0..headers.len())
        .map(|idx| infer_type(rows.iter().map(|row| row.get(idx).map_or("", String::as_str))))
        .collect();
    let schema = Schema::from_fields(
        headers
            .iter()
            .zip(&types)
            .map(|(name, field_type)| Field::new(name.as_str()).with_type(*field_type)),
    )
    .context("build schema from header row")?;

    let records = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .zip(&types)
                .zip(row)
                .filter(|(_, cell)| !cell.is_empty())
                .map(|((name, field_type), cell)| (name.as_str(), parse_cell(cell, *field_type)))
                .collect::<Record>()
        })
        .collect();
    Ok(TableContent::new(id, schema, records))
}

/// Read a JSON array of objects, or a serialized table.
pub fn read_json(id: &str, text: &str) -> Result<TableContent> {
    if !text.trim_start().starts_with('[') {
        let mut table: TableContent =
            serde_json::from_str(text).context("parse table object")?;
        restore_timestamps(&mut table);
        return Ok(table);
    }
    let rows: OrderedRows = serde_json::from_str(text).context("parse array of rows")?;
    let schema = Schema::from_fields(rows.keys.iter().map(|key| {
        Field::new(key.as_str()).with_type(json_field_type(&rows.records, key))
    }))
    .context("build schema from row keys")?;
    Ok(TableContent::new(id, schema, rows.records))
}

/// Timestamps serialize as RFC 3339 strings; turn them back into timestamps
/// for fields the schema declares as such.
fn restore_timestamps(table: &mut TableContent) {
    let names: Vec<String> = table
        .schema
        .fields()
        .iter()
        .filter(|field| field.field_type == FieldType::Timestamp)
        .map(|field| field.name.clone())
        .collect();
    for record in &mut table.records {
        for name in &names {
            if let Some(ts) = record
                .get(name)
                .and_then(Value::as_str)
                .and_then(parse_timestamp)
            {
                record.insert(name.as_str(), ts);
            }
        }
    }
}

fn json_field_type(records: &[Record], key: &str) -> FieldType {
    let mut kinds = records
        .iter()
        .filter_map(|record| record.get(key))
        .filter(|value| !value.is_null())
        .map(|value| match value {
            Value::Int(_) => FieldType::Integer,
            Value::Float(_) => FieldType::Float,
            other => match other.kind() {
                ValueKind::Bool => FieldType::Bool,
                ValueKind::String => FieldType::String,
                ValueKind::List => FieldType::List,
                _ => FieldType::Any,
            },
        });
    let Some(first) = kinds.next() else {
        return FieldType::Any;
    };
    kinds.fold(first, |acc, kind| match (acc, kind) {
        (a, b) if a == b => a,
        (FieldType::Integer, FieldType::Float) | (FieldType::Float, FieldType::Integer) => {
            FieldType::Float
        }
        _ => FieldType::Any,
    })
}

/// Rows plus the order their keys were first seen in.
struct OrderedRows {
    keys: Vec<String>,
    records: Vec<Record>,
}

impl<'de> Deserialize<'de> for OrderedRows {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(RowsVisitor)
    }
}

struct RowsVisitor;

impl<'de> Visitor<'de> for RowsVisitor {
    type Value = OrderedRows;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of objects")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<OrderedRows, A::Error> {
        let mut rows = OrderedRows {
            keys: Vec::new(),
            records: Vec::new(),
        };
        let mut seen = HashSet::new();
        while let Some(row) = seq.next_element::<OrderedRow>()? {
            for key in row.keys {
                if seen.insert(key.clone()) {
                    rows.keys.push(key);
                }
            }
            rows.records.push(row.record);
        }
        Ok(rows)
    }
}

struct OrderedRow {
    keys: Vec<String>,
    record: Record,
}

impl<'de> Deserialize<'de> for OrderedRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RowVisitor)
    }
}

struct RowVisitor;

impl<'de> Visitor<'de> for RowVisitor {
    type Value = OrderedRow;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object of field values")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<OrderedRow, M::Error> {
        let mut keys = Vec::new();
        let mut record = Record::new();
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            if record.insert(key.as_str(), value).is_none() {
                keys.push(key);
            }
        }
        Ok(OrderedRow { keys, record })
    }
}
