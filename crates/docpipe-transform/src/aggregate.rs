//! Aggregate functions for group-by.
//!
//! Built-in reducers read numbers through [`Value::as_f64`], so `Int` and
//! `Float` mix freely while strings, booleans, nulls and absent fields are
//! skipped. Every built-in returns zero for an empty input.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use docpipe_model::{FieldType, Record, Value};

/// Reduces the records of one group to a single value.
///
/// The second argument is the field the aggregate was configured with, if any.
pub type Reducer = Arc<dyn Fn(&[Record], Option<&str>) -> Value + Send + Sync>;

/// A reducer bound to the field it reads.
#[derive(Clone)]
pub struct Aggregate {
    field: Option<String>,
    reducer: Reducer,
    output_type: FieldType,
}

impl Aggregate {
    /// Custom aggregate over `field`.
    pub fn new(
        field: impl Into<String>,
        reducer: impl Fn(&[Record], Option<&str>) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            field: Some(field.into()),
            reducer: Arc::new(reducer),
            output_type: FieldType::Any,
        }
    }

    fn builtin(field: Option<String>, reducer: Reducer, output_type: FieldType) -> Self {
        Self {
            field,
            reducer,
            output_type,
        }
    }

    /// Number of records in the group.
    pub fn count() -> Self {
        Self::builtin(None, Arc::new(count), FieldType::Integer)
    }

    /// Number of records where `field` is present and not null.
    pub fn count_field(field: impl Into<String>) -> Self {
        Self::builtin(Some(field.into()), Arc::new(count), FieldType::Integer)
    }

    pub fn sum(field: impl Into<String>) -> Self {
        Self::builtin(Some(field.into()), Arc::new(sum), FieldType::Float)
    }

    pub fn average(field: impl Into<String>) -> Self {
        Self::builtin(Some(field.into()), Arc::new(average), FieldType::Float)
    }

    pub fn min(field: impl Into<String>) -> Self {
        Self::builtin(Some(field.into()), Arc::new(min), FieldType::Float)
    }

    pub fn max(field: impl Into<String>) -> Self {
        Self::builtin(Some(field.into()), Arc::new(max), FieldType::Float)
    }

    /// Declared type of the output column.
    #[must_use]
    pub fn with_output_type(mut self, output_type: FieldType) -> Self {
        self.output_type = output_type;
        self
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn output_type(&self) -> FieldType {
        self.output_type
    }

    pub fn apply(&self, records: &[Record]) -> Value {
        (self.reducer)(records, self.field.as_deref())
    }
}

impl fmt::Debug for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregate")
            .field("field", &self.field)
            .field("output_type", &self.output_type)
            .finish_non_exhaustive()
    }
}

fn numbers<'a>(records: &'a [Record], field: Option<&'a str>) -> impl Iterator<Item = f64> + 'a {
    records
        .iter()
        .filter_map(move |record| field.and_then(|name| record.get(name)))
        .filter_map(Value::as_f64)
        .filter(|n| !n.is_nan())
}

pub fn count(records: &[Record], field: Option<&str>) -> Value {
    let n = match field {
        None => records.len(),
        Some(name) => records
            .iter()
            .filter(|record| record.get(name).is_some_and(|v| !v.is_null()))
            .count(),
    };
    Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

pub fn sum(records: &[Record], field: Option<&str>) -> Value {
    Value::Float(numbers(records, field).sum())
}

pub fn average(records: &[Record], field: Option<&str>) -> Value {
    let (total, n) = numbers(records, field).fold((0.0, 0usize), |(total, n), x| (total + x, n + 1));
    if n == 0 {
        return Value::Float(0.0);
    }
    Value::Float(total / n as f64)
}

pub fn min(records: &[Record], field: Option<&str>) -> Value {
    Value::Float(numbers(records, field).reduce(f64::min).unwrap_or(0.0))
}

pub fn max(records: &[Record], field: Option<&str>) -> Value {
    Value::Float(numbers(records, field).reduce(f64::max).unwrap_or(0.0))
}

#[derive(Clone)]
struct Entry {
    reducer: Reducer,
    output_type: FieldType,
}

/// Named reducers available to declarative group-by steps.
///
/// Names are matched case-insensitively. There is no process-wide registry;
/// callers build one and pass it where names must be resolved.
#[derive(Clone, Default)]
pub struct AggregateRegistry {
    entries: BTreeMap<String, Entry>,
}

impl AggregateRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// `count`, `sum`, `average` (alias `avg`), `min` and `max`.
    pub fn builtin() -> Self {
        Self::new()
            .with("count", count, FieldType::Integer)
            .with("sum", sum, FieldType::Float)
            .with("average", average, FieldType::Float)
            .with("avg", average, FieldType::Float)
            .with("min", min, FieldType::Float)
            .with("max", max, FieldType::Float)
    }

    /// Add or replace a reducer.
    pub fn register(
        &mut self,
        name: impl AsRef<str>,
        reducer: impl Fn(&[Record], Option<&str>) -> Value + Send + Sync + 'static,
        output_type: FieldType,
    ) {
        self.entries.insert(
            name.as_ref().to_ascii_lowercase(),
            Entry {
                reducer: Arc::new(reducer),
                output_type,
            },
        );
    }

    #[must_use]
    pub fn with(
        mut self,
        name: impl AsRef<str>,
        reducer: impl Fn(&[Record], Option<&str>) -> Value + Send + Sync + 'static,
        output_type: FieldType,
    ) -> Self {
        self.register(name, reducer, output_type);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Bind the named reducer to `field`.
    pub fn resolve(&self, name: &str, field: Option<&str>) -> Option<Aggregate> {
        let entry = self.entries.get(&name.to_ascii_lowercase())?;
        Some(Aggregate::builtin(
            field.map(str::to_string),
            Arc::clone(&entry.reducer),
            entry.output_type,
        ))
    }
}

impl fmt::Debug for AggregateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
