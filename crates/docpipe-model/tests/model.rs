//! Document assembly and serialization.

use std::any::Any;
use std::cmp::Ordering;

use chrono::{TimeZone, Utc};
use docpipe_model::{
    Content, CustomValue, Document, Field, FieldType, Record, Schema, SectionContent,
    TableContent, Value,
};

#[derive(Debug)]
struct Version(u32, u32);

impl CustomValue for Version {
    fn type_name(&self) -> &'static str {
        "version"
    }

    fn render(&self) -> String {
        format!("v{}.{}", self.0, self.1)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn compare(&self, other: &dyn CustomValue) -> Option<Ordering> {
        let other = other.as_any().downcast_ref::<Version>()?;
        Some((self.0, self.1).cmp(&(other.0, other.1)))
    }
}

fn releases() -> TableContent {
    let schema = Schema::from_fields([
        Field::new("name").with_type(FieldType::String),
        Field::new("internal_id").hidden(),
        Field::new("released").with_type(FieldType::Timestamp),
        Field::new("version"),
    ])
    .unwrap();
    let records = vec![
        Record::new()
            .with("name", "first")
            .with("internal_id", 17)
            .with("released", Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
            .with("version", Value::custom(Version(1, 0))),
        Record::new().with("name", "second"),
    ];
    TableContent::new("releases", schema, records).with_title("Releases")
}

#[test]
fn builder_assembles_contents_in_order() {
    let doc = Document::builder("changelog")
        .title("Changelog")
        .metadata("author", "ops")
        .text("intro", "All releases")
        .section(SectionContent {
            id: "details".into(),
            title: Some("Details".into()),
            contents: vec![Content::Table(releases())],
        })
        .table(releases())
        .build();

    let kinds: Vec<_> = doc.contents().iter().map(|c| c.kind().as_str()).collect();
    assert_eq!(kinds, ["text", "section", "table"]);
    let (slot, table) = doc.first_table().unwrap();
    assert_eq!(slot, 2);
    assert_eq!(table.key_order(), ["name", "released", "version"]);
    assert_eq!(doc.tables().count(), 1);
}

#[test]
fn rows_render_in_key_order_without_hidden_fields() {
    let table = releases();
    let rows: Vec<Vec<String>> = table
        .rows_in_key_order()
        .map(|row| row.into_iter().map(|(_, value)| value.to_string()).collect())
        .collect();
    assert_eq!(
        rows,
        [
            vec!["first", "2024-03-01T12:00:00Z", "v1.0"],
            vec!["second", "", ""],
        ]
    );
}

#[test]
fn document_json_shape() {
    let doc = Document::builder("d")
        .text("t", "hi")
        .table(TableContent::new(
            "n",
            Schema::from_keys(["a"]).unwrap(),
            vec![Record::new().with("a", 1.5)],
        ))
        .build();
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "id": "d",
            "contents": [
                {"kind": "text", "id": "t", "text": "hi"},
                {"kind": "table", "id": "n", "schema": {"fields": [{"name": "a", "type": "any"}]}, "records": [{"a": 1.5}]}
            ]
        })
    );
    let back: Document = serde_json::from_value(json).unwrap();
    assert_eq!(back, doc);
}

#[test]
fn custom_values_order_through_their_own_compare() {
    let a = Value::custom(Version(1, 2));
    let b = Value::custom(Version(1, 10));
    let (Value::Custom(a), Value::Custom(b)) = (&a, &b) else {
        unreachable!()
    };
    assert_eq!(a.compare(b.as_ref()), Some(Ordering::Less));
    assert!(!a.equals(b.as_ref()));
}

#[test]
fn with_content_at_leaves_original_untouched() {
    let doc = Document::builder("d").table(releases()).build();
    let replaced = doc
        .with_content_at(0, Content::Table(releases().with_records(Vec::new())))
        .unwrap();
    assert_eq!(doc.first_table().unwrap().1.record_count(), 2);
    assert_eq!(replaced.first_table().unwrap().1.record_count(), 0);
    assert!(doc.with_content_at(5, Content::Table(releases())).is_none());
}
