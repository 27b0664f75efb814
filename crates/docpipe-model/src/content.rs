//! Typed content blocks that make up a [`Document`](crate::Document).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Record, Schema, Value};

/// A transformation that has been applied to a table.
///
/// Pipelines append one step per operation they run, so a transformed table
/// carries the list of operations that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformStep {
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TransformStep {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Tabular content: ordered records described by a schema.
///
/// Treated as immutable: transformations consume a table by value and hand
/// back a new one, so a table borrowed from a document is never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableContent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub schema: Schema,
    pub records: Vec<Record>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformations: Vec<TransformStep>,
}

impl TableContent {
    pub fn new(id: impl Into<String>, schema: Schema, records: Vec<Record>) -> Self {
        Self {
            id: id.into(),
            title: None,
            schema,
            records,
            transformations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Same table identity and schema, different rows.
    #[must_use]
    pub fn with_records(self, records: Vec<Record>) -> Self {
        Self { records, ..self }
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn key_order(&self) -> &[String] {
        self.schema.key_order()
    }

    /// Rows as `(key, value)` pairs in key order. Absent fields read as `Null`.
    pub fn rows_in_key_order(&self) -> impl Iterator<Item = Vec<(&str, &Value)>> + '_ {
        const NULL: &Value = &Value::Null;
        let keys = self.schema.key_order();
        self.records.iter().map(move |record| {
            keys.iter()
                .map(|key| (key.as_str(), record.get(key).unwrap_or(NULL)))
                .collect()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartContent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub chart_type: String,
    #[serde(default)]
    pub data: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionContent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub contents: Vec<Content>,
}

/// Kind of a content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Table,
    Text,
    Chart,
    Section,
}

impl ContentKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Text => "text",
            Self::Chart => "chart",
            Self::Section => "section",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed block inside a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Content {
    Table(TableContent),
    Text(TextContent),
    Chart(ChartContent),
    Section(SectionContent),
}

impl Content {
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Table(_) => ContentKind::Table,
            Self::Text(_) => ContentKind::Text,
            Self::Chart(_) => ContentKind::Chart,
            Self::Section(_) => ContentKind::Section,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Table(c) => &c.id,
            Self::Text(c) => &c.id,
            Self::Chart(c) => &c.id,
            Self::Section(c) => &c.id,
        }
    }

    pub fn as_table(&self) -> Option<&TableContent> {
        match self {
            Self::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table(_))
    }
}

impl From<TableContent> for Content {
    fn from(table: TableContent) -> Self {
        Self::Table(table)
    }
}

impl From<TextContent> for Content {
    fn from(text: TextContent) -> Self {
        Self::Text(text)
    }
}

impl From<ChartContent> for Content {
    fn from(chart: ChartContent) -> Self {
        Self::Chart(chart)
    }
}

impl From<SectionContent> for Content {
    fn from(section: SectionContent) -> Self {
        Self::Section(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableContent {
        TableContent::new(
            "t1",
            Schema::from_keys(["id", "name"]).unwrap(),
            vec![
                Record::new().with("id", 1).with("name", "Ann"),
                Record::new().with("id", 2),
            ],
        )
    }

    #[test]
    fn rows_follow_key_order_and_fill_absent() {
        let table = table();
        let rows: Vec<_> = table.rows_in_key_order().collect();
        assert_eq!(rows[0], vec![("id", &Value::Int(1)), ("name", &Value::from("Ann"))]);
        assert_eq!(rows[1], vec![("id", &Value::Int(2)), ("name", &Value::Null)]);
    }

    #[test]
    fn content_serializes_with_kind_tag() {
        let content = Content::Text(TextContent {
            id: "intro".into(),
            text: "hello".into(),
        });
        let json = serde_json::to_string(&content).unwrap();
        assert_eq!(json, r#"{"kind":"text","id":"intro","text":"hello"}"#);
        assert_eq!(content.kind().to_string(), "text");
    }

    #[test]
    fn with_records_keeps_schema() {
        let table = table();
        let emptied = table.clone().with_records(Vec::new());
        assert_eq!(emptied.schema, table.schema);
        assert_eq!(emptied.record_count(), 0);
        assert_eq!(table.record_count(), 2);
    }
}
