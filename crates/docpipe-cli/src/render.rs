//! Terminal and JSON output for tables.
//!
//! Both renderers walk the schema's key order, so hidden fields never show
//! up and column order matches what the pipeline produced.

use anyhow::Result;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use docpipe_model::{FieldType, TableContent, TransformStep, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};

pub fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

/// Build a terminal table. Values go through each field's formatter; nulls
/// and absent fields print as a dimmed `-`.
pub fn table_view(content: &TableContent) -> Table {
    let mut table = Table::new();
    let keys = content.key_order();
    table.set_header(keys.iter().map(|key| header_cell(key)).collect::<Vec<_>>());
    apply_table_style(&mut table);

    for row in content.rows_in_key_order() {
        table.add_row(
            row.into_iter()
                .map(|(key, value)| {
                    if value.is_null() {
                        return dim_cell("-");
                    }
                    match content.schema.find_field(key) {
                        Some(field) => Cell::new(field.display(value)),
                        None => Cell::new(value),
                    }
                })
                .collect::<Vec<_>>(),
        );
    }

    for (index, key) in keys.iter().enumerate() {
        let numeric = content
            .schema
            .find_field(key)
            .is_some_and(|field| matches!(field.field_type, FieldType::Integer | FieldType::Float));
        if numeric {
            align_column(&mut table, index, CellAlignment::Right);
        }
    }
    table
}

/// One-line summary of the transformations applied to a table.
pub fn transformation_summary(steps: &[TransformStep]) -> String {
    if steps.is_empty() {
        return "no transformations".to_string();
    }
    steps
        .iter()
        .map(|step| match &step.detail {
            Some(detail) => format!("{}({detail})", step.operation),
            None => step.operation.clone(),
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A record serialized with its keys in schema key order.
struct OrderedRecord<'a>(Vec<(&'a str, &'a Value)>);

impl Serialize for OrderedRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn ordered_rows(content: &TableContent) -> Vec<OrderedRecord<'_>> {
    content.rows_in_key_order().map(OrderedRecord).collect()
}

/// Pretty JSON array of records, keys in key order.
pub fn rows_json(content: &TableContent) -> Result<String> {
    Ok(serde_json::to_string_pretty(&ordered_rows(content))?)
}

/// Compact single-line variant of [`rows_json`].
pub fn rows_json_compact(content: &TableContent) -> Result<String> {
    Ok(serde_json::to_string(&ordered_rows(content))?)
}
