use std::collections::HashMap;
use std::collections::HashSet;

use docpipe_model::{Field, Record, Schema, TableContent};

use crate::aggregate::Aggregate;
use crate::compare::GroupKey;
use crate::error::{OperationError, ValidationError};

/// Partitions records by the values of `group_by` and reduces each group to
/// one record.
///
/// Groups are emitted in the order their first record appears. Each output
/// record holds the group-by values followed by one field per aggregate
/// alias, with aliases kept in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct GroupByOp {
    group_by: Vec<String>,
    aggregates: Vec<(String, Aggregate)>,
}

impl GroupByOp {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group_by: columns.into_iter().map(Into::into).collect(),
            aggregates: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_aggregate(mut self, alias: impl Into<String>, aggregate: Aggregate) -> Self {
        self.aggregates.push((alias.into(), aggregate));
        self
    }

    #[must_use]
    pub fn with_aggregates<I, S>(mut self, aggregates: I) -> Self
    where
        I: IntoIterator<Item = (S, Aggregate)>,
        S: Into<String>,
    {
        self.aggregates
            .extend(aggregates.into_iter().map(|(alias, agg)| (alias.into(), agg)));
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.group_by
    }

    pub fn aggregates(&self) -> &[(String, Aggregate)] {
        &self.aggregates
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.group_by.is_empty() {
            return Err(ValidationError::GroupColumnsRequired);
        }
        if self.aggregates.is_empty() {
            return Err(ValidationError::AggregatesRequired);
        }
        let mut outputs = HashSet::new();
        let names = self
            .group_by
            .iter()
            .chain(self.aggregates.iter().map(|(alias, _)| alias));
        for name in names {
            if name.trim().is_empty() {
                return Err(ValidationError::EmptyGroupColumn);
            }
            if !outputs.insert(name.as_str()) {
                return Err(ValidationError::DuplicateGroupOutput(name.clone()));
            }
        }
        Ok(())
    }

    pub fn apply(&self, table: TableContent) -> Result<TableContent, OperationError> {
        self.validate()?;
        let schema = self.output_schema(&table.schema)?;

        let mut slots: HashMap<GroupKey, usize> = HashMap::new();
        let mut groups: Vec<(GroupKey, Vec<Record>)> = Vec::new();
        for record in table.records {
            let key = GroupKey::from_record(&record, &self.group_by);
            match slots.get(&key) {
                Some(&slot) => groups[slot].1.push(record),
                None => {
                    slots.insert(key.clone(), groups.len());
                    groups.push((key, vec![record]));
                }
            }
        }

        let records = groups
            .into_iter()
            .map(|(key, members)| {
                let mut out: Record = self.group_by.iter().cloned().zip(key.into_values()).collect();
                for (alias, aggregate) in &self.aggregates {
                    out.insert(alias.clone(), aggregate.apply(&members));
                }
                out
            })
            .collect();

        Ok(TableContent {
            schema,
            records,
            ..table
        })
    }

    /// Group-by fields keep their input metadata but are always visible;
    /// alias fields carry the aggregate's output type.
    fn output_schema(&self, input: &Schema) -> Result<Schema, OperationError> {
        let group_fields = self.group_by.iter().map(|column| {
            let mut field = input
                .find_field(column)
                .cloned()
                .unwrap_or_else(|| Field::new(column.as_str()));
            field.hidden = false;
            field
        });
        let alias_fields = self
            .aggregates
            .iter()
            .map(|(alias, aggregate)| Field::new(alias.as_str()).with_type(aggregate.output_type()));
        Ok(Schema::from_fields(group_fields.chain(alias_fields))?)
    }
}

#[cfg(test)]
mod tests {
    use docpipe_model::{FieldType, Value};

    use super::*;

    fn staff() -> TableContent {
        let records = [("HR", 50_000), ("IT", 75_000), ("HR", 60_000)]
            .into_iter()
            .map(|(dept, salary)| Record::new().with("dept", dept).with("salary", salary))
            .collect();
        let schema = Schema::from_fields([
            Field::new("dept").with_type(FieldType::String),
            Field::new("salary").with_type(FieldType::Integer),
        ])
        .unwrap();
        TableContent::new("staff", schema, records)
    }

    #[test]
    fn sums_and_counts_per_group() {
        let op = GroupByOp::new(["dept"])
            .with_aggregate("total", Aggregate::sum("salary"))
            .with_aggregate("headcount", Aggregate::count());
        let out = op.apply(staff()).unwrap();

        assert_eq!(out.key_order(), ["dept", "total", "headcount"]);
        assert_eq!(out.record_count(), 2);
        let hr = &out.records[0];
        assert_eq!(hr.get("dept"), Some(&Value::from("HR")));
        assert_eq!(hr.get("total"), Some(&Value::Float(110_000.0)));
        assert_eq!(hr.get("headcount"), Some(&Value::Int(2)));
        let it = &out.records[1];
        assert_eq!(it.get("dept"), Some(&Value::from("IT")));
        assert_eq!(it.get("total"), Some(&Value::Float(75_000.0)));
        assert_eq!(it.get("headcount"), Some(&Value::Int(1)));
    }

    #[test]
    fn output_schema_types_follow_inputs_and_aggregates() {
        let op = GroupByOp::new(["dept"]).with_aggregate("n", Aggregate::count());
        let out = op.apply(staff()).unwrap();
        let types: Vec<_> = out.schema.fields().iter().map(|f| f.field_type).collect();
        assert_eq!(types, [FieldType::String, FieldType::Integer]);
    }

    #[test]
    fn alias_order_is_insertion_order() {
        let op = GroupByOp::new(["dept"]).with_aggregates([
            ("z_max", Aggregate::max("salary")),
            ("a_min", Aggregate::min("salary")),
        ]);
        let out = op.apply(staff()).unwrap();
        assert_eq!(out.key_order(), ["dept", "z_max", "a_min"]);
    }

    #[test]
    fn signed_zeroes_share_a_group() {
        let records = vec![Record::new().with("k", 0.0), Record::new().with("k", -0.0)];
        let table = TableContent::new("t", Schema::from_keys(["k"]).unwrap(), records);
        let out = GroupByOp::new(["k"])
            .with_aggregate("n", Aggregate::count())
            .apply(table)
            .unwrap();
        assert_eq!(out.record_count(), 1);
        assert_eq!(out.records[0].get("n"), Some(&Value::Int(2)));
    }

    #[test]
    fn missing_group_value_forms_null_group() {
        let mut table = staff();
        table.records.push(Record::new().with("salary", 1));
        let op = GroupByOp::new(["dept"]).with_aggregate("n", Aggregate::count());
        let out = op.apply(table).unwrap();
        assert_eq!(out.record_count(), 3);
        assert_eq!(out.records[2].get("dept"), Some(&Value::Null));
    }

    #[test]
    fn validation_messages() {
        assert_eq!(
            GroupByOp::new(Vec::<String>::new())
                .with_aggregate("n", Aggregate::count())
                .validate(),
            Err(ValidationError::GroupColumnsRequired)
        );
        let err = GroupByOp::new(["dept"]).validate().unwrap_err();
        assert_eq!(err.to_string(), "group by requires at least one aggregate function");
        assert_eq!(
            GroupByOp::new(["dept"])
                .with_aggregate("dept", Aggregate::count())
                .validate(),
            Err(ValidationError::DuplicateGroupOutput("dept".into()))
        );
    }
}
