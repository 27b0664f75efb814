use std::fmt;
use std::sync::Arc;

use docpipe_model::{Field, FieldType, Record, TableContent, Value};

use crate::error::{BoxError, CallbackError, OperationError, ValidationError};

/// Computes the new column's value for one record.
pub type ColumnFn = Arc<dyn Fn(&Record) -> Result<Value, CallbackError> + Send + Sync>;

/// Adds a computed column to every record.
///
/// The field is inserted into the key order at `position` (clamped to the
/// end) or appended. When the column already exists its values are
/// replaced and its field metadata kept; a visible existing column is
/// moved to `position` if one is given. Reusing the name of a hidden field
/// fails with [`OperationError::HiddenColumn`].
#[derive(Clone, Default)]
pub struct AddColumnOp {
    name: String,
    compute: Option<ColumnFn>,
    position: Option<i64>,
    field_type: FieldType,
}

impl AddColumnOp {
    pub fn new(
        name: impl Into<String>,
        compute: impl Fn(&Record) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self::named(name).computed_by(compute)
    }

    pub fn try_new<E>(
        name: impl Into<String>,
        compute: impl Fn(&Record) -> Result<Value, E> + Send + Sync + 'static,
    ) -> Self
    where
        E: Into<BoxError>,
    {
        Self::named(name).try_computed_by(compute)
    }

    /// A column with no calculation yet. Fails validation until one is set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn computed_by(mut self, compute: impl Fn(&Record) -> Value + Send + Sync + 'static) -> Self {
        self.compute = Some(Arc::new(
            move |record: &Record| -> Result<Value, CallbackError> { Ok(compute(record)) },
        ));
        self
    }

    #[must_use]
    pub fn try_computed_by<E>(
        mut self,
        compute: impl Fn(&Record) -> Result<Value, E> + Send + Sync + 'static,
    ) -> Self
    where
        E: Into<BoxError>,
    {
        self.compute = Some(Arc::new(move |record: &Record| {
            compute(record).map_err(CallbackError::new)
        }));
        self
    }

    #[must_use]
    pub fn at(mut self, position: i64) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Option<i64> {
        self.position
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::ColumnNameRequired);
        }
        if self.compute.is_none() {
            return Err(ValidationError::CalculationRequired);
        }
        if let Some(position) = self.position
            && position < 0
        {
            return Err(ValidationError::NegativePosition(position));
        }
        Ok(())
    }

    pub fn apply(&self, mut table: TableContent) -> Result<TableContent, OperationError> {
        self.validate()?;
        let Some(compute) = &self.compute else {
            return Err(ValidationError::CalculationRequired.into());
        };
        let existing_visible = table.schema.find_field(&self.name).map(|f| !f.hidden);
        if existing_visible == Some(false) {
            return Err(OperationError::HiddenColumn(self.name.clone()));
        }
        for record in &mut table.records {
            let value = compute(record)?;
            record.insert(self.name.as_str(), value);
        }

        let position = self
            .position
            .map(|p| usize::try_from(p).unwrap_or(usize::MAX));
        match (existing_visible, position) {
            (Some(_), Some(position)) => table.schema.move_key(&self.name, position)?,
            (Some(_), None) => {}
            (None, position) => {
                let field = Field::new(self.name.as_str()).with_type(self.field_type);
                table.schema.insert_field(field, position)?;
            }
        }
        Ok(table)
    }
}

impl fmt::Debug for AddColumnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddColumnOp")
            .field("name", &self.name)
            .field("compute", &self.compute.as_ref().map(|_| "<fn>"))
            .field("position", &self.position)
            .field("field_type", &self.field_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use docpipe_model::Schema;

    use super::*;

    fn prices() -> TableContent {
        let records = [("pen", 2.0, 3), ("ink", 7.5, 2)]
            .into_iter()
            .map(|(item, price, qty)| {
                Record::new()
                    .with("item", item)
                    .with("price", price)
                    .with("qty", qty)
            })
            .collect();
        TableContent::new(
            "prices",
            Schema::from_keys(["item", "price", "qty"]).unwrap(),
            records,
        )
    }

    fn total(record: &Record) -> Value {
        match (
            record.get("price").and_then(Value::as_f64),
            record.get("qty").and_then(Value::as_f64),
        ) {
            (Some(price), Some(qty)) => Value::Float(price * qty),
            _ => Value::Null,
        }
    }

    #[test]
    fn appends_by_default() {
        let out = AddColumnOp::new("total", total).apply(prices()).unwrap();
        assert_eq!(out.key_order(), ["item", "price", "qty", "total"]);
        assert_eq!(out.schema.field_count(), 4);
        assert_eq!(out.records[1].get("total"), Some(&Value::Float(15.0)));
    }

    #[test]
    fn inserts_at_position() {
        let out = AddColumnOp::new("total", total)
            .at(1)
            .apply(prices())
            .unwrap();
        assert_eq!(out.key_order(), ["item", "total", "price", "qty"]);
    }

    #[test]
    fn position_past_end_is_clamped() {
        let out = AddColumnOp::new("total", total)
            .at(42)
            .apply(prices())
            .unwrap();
        assert_eq!(out.key_order().last().map(String::as_str), Some("total"));
    }

    #[test]
    fn existing_column_is_replaced_not_duplicated() {
        let out = AddColumnOp::new("qty", |_| Value::Int(0))
            .at(0)
            .apply(prices())
            .unwrap();
        assert_eq!(out.schema.field_count(), 3);
        assert_eq!(out.key_order(), ["qty", "item", "price"]);
        assert!(out.records.iter().all(|r| r.get("qty") == Some(&Value::Int(0))));
    }

    #[test]
    fn hidden_name_collision_is_rejected() {
        let schema = Schema::from_fields([Field::new("a"), Field::new("h").hidden()]).unwrap();
        let table = TableContent::new("t", schema, vec![Record::new().with("a", 1)]);
        let err = AddColumnOp::new("h", |_| Value::Int(9))
            .at(0)
            .apply(table)
            .unwrap_err();
        assert!(matches!(&err, OperationError::HiddenColumn(name) if name == "h"));
        assert_eq!(err.to_string(), "column h already exists as a hidden field");
    }

    #[test]
    fn validation_messages() {
        assert_eq!(
            AddColumnOp::new(" ", total).validate(),
            Err(ValidationError::ColumnNameRequired)
        );
        assert_eq!(
            AddColumnOp::named("total").validate(),
            Err(ValidationError::CalculationRequired)
        );
        let err = AddColumnOp::new("total", total).at(-2).validate().unwrap_err();
        assert_eq!(err.to_string(), "add column position must be non-negative (got -2)");
    }
}
