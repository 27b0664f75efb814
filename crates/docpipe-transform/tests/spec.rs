//! Pipelines built from JSON definitions.

use std::time::Duration;

use docpipe_model::{Document, FieldType, Record, Schema, TableContent, Value};
use docpipe_transform::{
    AggregateRegistry, DocumentPipelineExt, PipelineError, PipelineOptions, PipelineSpec,
};

fn orders() -> Document {
    let records = [
        (1, "north", 120.0, true),
        (2, "south", 80.0, false),
        (3, "north", 40.0, true),
        (4, "east", 300.0, true),
        (5, "south", 60.0, true),
    ]
    .into_iter()
    .map(|(id, region, amount, paid)| {
        Record::new()
            .with("id", id)
            .with("region", region)
            .with("amount", amount)
            .with("paid", paid)
    })
    .collect();
    Document::builder("orders")
        .table(TableContent::new(
            "orders",
            Schema::from_keys(["id", "region", "amount", "paid"]).unwrap(),
            records,
        ))
        .build()
}

#[test]
fn json_pipeline_groups_paid_orders() {
    let spec = PipelineSpec::from_json(
        r#"{
            "options": {"max_operations": 5, "max_execution_time_ms": 60000},
            "steps": [
                {"op": "filter", "column": "paid", "cmp": "eq", "value": true},
                {"op": "group_by", "columns": ["region"], "aggregates": [
                    {"alias": "revenue", "function": "sum", "field": "amount"},
                    {"alias": "orders", "function": "count"}
                ]},
                {"op": "sort", "keys": [{"column": "revenue", "direction": "descending"}]}
            ]
        }"#,
    )
    .unwrap();
    assert_eq!(
        spec.options,
        PipelineOptions::new()
            .with_max_operations(5)
            .with_max_execution_time(Duration::from_secs(60))
    );

    let doc = orders();
    let registry = AggregateRegistry::builtin();
    let out = spec
        .apply_to(doc.pipeline(), &registry)
        .unwrap()
        .execute()
        .unwrap();
    let (_, table) = out.first_table().unwrap();
    assert_eq!(table.key_order(), ["region", "revenue", "orders"]);
    assert_eq!(
        table.schema.find_field("orders").map(|f| f.field_type),
        Some(FieldType::Integer)
    );
    let rows: Vec<_> = table
        .rows_in_key_order()
        .map(|row| row.iter().map(|(_, v)| v.to_string()).collect::<Vec<_>>().join("|"))
        .collect();
    assert_eq!(rows, ["east|300|1", "north|160|2", "south|60|1"]);
}

#[test]
fn custom_aggregate_from_registry() {
    let registry = AggregateRegistry::builtin().with(
        "distinct",
        |records: &[Record], field: Option<&str>| {
            let mut seen: Vec<String> = records
                .iter()
                .filter_map(|r| field.and_then(|f| r.get(f)).map(ToString::to_string))
                .collect();
            seen.sort();
            seen.dedup();
            Value::List(seen)
        },
        FieldType::List,
    );
    let spec = PipelineSpec::from_json(
        r#"{"steps": [
            {"op": "group_by", "columns": ["paid"], "aggregates": [
                {"alias": "regions", "function": "DISTINCT", "field": "region"}
            ]}
        ]}"#,
    )
    .unwrap();
    let doc = orders();
    let out = spec
        .apply_to(doc.pipeline(), &registry)
        .unwrap()
        .execute()
        .unwrap();
    let (_, table) = out.first_table().unwrap();
    assert_eq!(
        table.records[0].get("regions"),
        Some(&Value::List(vec!["east".into(), "north".into(), "south".into()]))
    );
    assert_eq!(
        table.records[1].get("regions"),
        Some(&Value::List(vec!["south".into()]))
    );
}

#[test]
fn add_column_copy_and_constant() {
    let spec = PipelineSpec::from_json(
        r#"{"steps": [
            {"op": "add_column", "name": "source", "value": "import", "position": 0},
            {"op": "add_column", "name": "ref", "copy_of": "id"},
            {"op": "limit", "count": 1}
        ]}"#,
    )
    .unwrap();
    let doc = orders();
    let out = spec
        .apply_to(doc.pipeline(), &AggregateRegistry::builtin())
        .unwrap()
        .execute()
        .unwrap();
    let (_, table) = out.first_table().unwrap();
    assert_eq!(
        table.key_order(),
        ["source", "id", "region", "amount", "paid", "ref"]
    );
    assert_eq!(table.records[0].get("source"), Some(&Value::from("import")));
    assert_eq!(table.records[0].get("ref"), Some(&Value::Int(1)));
}

#[test]
fn invalid_step_is_reported_at_execution() {
    let spec = PipelineSpec::from_json(r#"{"steps": [{"op": "limit", "count": -3}]}"#).unwrap();
    let doc = orders();
    let err = spec
        .apply_to(doc.pipeline(), &AggregateRegistry::builtin())
        .unwrap()
        .execute()
        .unwrap_err();
    assert_eq!(err.operation(), Some((0, "limit")));
}

#[test]
fn malformed_json_is_a_spec_error() {
    let err = PipelineSpec::from_json("{\"steps\": [").unwrap_err();
    assert!(matches!(err, PipelineError::Spec(_)));
}

#[test]
fn spec_survives_serialization() {
    let json = r#"{"steps":[{"op":"sort","keys":[{"column":"amount","direction":"descending"}]},{"op":"limit","count":2}]}"#;
    let spec = PipelineSpec::from_json(json).unwrap();
    let again = PipelineSpec::from_json(&spec.to_json().unwrap()).unwrap();
    assert_eq!(again, spec);
}

#[test]
fn validate_reports_the_same_first_error_as_execution() {
    let spec = PipelineSpec::from_json(
        r#"{"options": {"max_operations": 1},
            "steps": [{"op": "limit", "count": -1}, {"op": "limit", "count": 2}]}"#,
    )
    .unwrap();
    let registry = AggregateRegistry::builtin();
    let checked = spec.validate(&registry).unwrap_err();
    let doc = orders();
    let executed = spec
        .apply_to(doc.pipeline(), &registry)
        .unwrap()
        .execute()
        .unwrap_err();
    assert!(matches!(
        checked,
        PipelineError::TooManyOperations { actual: 2, max: 1 }
    ));
    assert_eq!(checked.to_string(), executed.to_string());

    let single = PipelineSpec::from_json(r#"{"steps": [{"op": "limit", "count": 3}]}"#).unwrap();
    assert_eq!(single.validate(&registry).unwrap().len(), 1);
}
