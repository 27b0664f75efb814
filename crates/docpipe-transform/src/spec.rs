//! Declarative pipelines loaded from JSON.
//!
//! ```json
//! {
//!   "options": { "max_operations": 10, "max_execution_time_ms": 500 },
//!   "steps": [
//!     { "op": "filter", "column": "active", "cmp": "eq", "value": true },
//!     { "op": "sort", "keys": [{ "column": "score", "direction": "descending" }] },
//!     { "op": "limit", "count": 10 }
//!   ]
//! }
//! ```

use std::cmp::Ordering;

use docpipe_model::{Record, Value};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateRegistry;
use crate::compare::compare_values;
use crate::error::{PipelineError, ValidationError};
use crate::ops::{AddColumnOp, FilterOp, GroupByOp, LimitOp, Operation, SortKey, SortOp};
use crate::pipeline::{Pipeline, PipelineOptions, validate_operations};

const NULL: &Value = &Value::Null;

/// A pipeline described as data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    #[serde(default)]
    pub options: PipelineOptions,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

/// Comparison used by declarative filters.
///
/// Ordering comparisons only match values of the same kind, so a `lt`
/// filter never matches nulls or strings in a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Substring for strings, element for lists.
    Contains,
    /// Field present and not null.
    Present,
    /// Field absent or null.
    Absent,
}

impl Comparison {
    pub fn matches(self, actual: Option<&Value>, expected: &Value) -> bool {
        let actual = actual.unwrap_or(NULL);
        match self {
            Self::Eq => compare_values(actual, expected).is_eq(),
            Self::Ne => compare_values(actual, expected).is_ne(),
            Self::Lt => self.ordered(actual, expected, Ordering::is_lt),
            Self::Le => self.ordered(actual, expected, Ordering::is_le),
            Self::Gt => self.ordered(actual, expected, Ordering::is_gt),
            Self::Ge => self.ordered(actual, expected, Ordering::is_ge),
            Self::Contains => match (actual, expected.as_str()) {
                (Value::String(text), Some(needle)) => text.contains(needle),
                (Value::List(items), Some(needle)) => items.iter().any(|item| item == needle),
                _ => false,
            },
            Self::Present => !actual.is_null(),
            Self::Absent => actual.is_null(),
        }
    }

    fn ordered(self, actual: &Value, expected: &Value, test: fn(Ordering) -> bool) -> bool {
        actual.kind() == expected.kind() && !actual.is_null() && test(compare_values(actual, expected))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSpec {
    pub alias: String,
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// One step, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StepSpec {
    Filter {
        column: String,
        cmp: Comparison,
        #[serde(default)]
        value: Value,
    },
    Sort {
        keys: Vec<SortKey>,
    },
    Limit {
        count: i64,
    },
    GroupBy {
        columns: Vec<String>,
        aggregates: Vec<AggregateSpec>,
    },
    AddColumn {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<i64>,
        /// Constant value for every record.
        #[serde(default)]
        value: Value,
        /// Copy another column instead of a constant.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        copy_of: Option<String>,
    },
}

impl StepSpec {
    pub fn to_operation(&self, registry: &AggregateRegistry) -> Result<Operation, String> {
        let operation = match self {
            Self::Filter { column, cmp, value } => {
                let (column, cmp, value) = (column.clone(), *cmp, value.clone());
                FilterOp::new(move |record: &Record| cmp.matches(record.get(&column), &value)).into()
            }
            Self::Sort { keys } => SortOp::new(keys.iter().cloned()).into(),
            Self::Limit { count } => LimitOp::new(*count).into(),
            Self::GroupBy {
                columns,
                aggregates,
            } => {
                let mut op = GroupByOp::new(columns.iter().cloned());
                for spec in aggregates {
                    let aggregate = registry
                        .resolve(&spec.function, spec.field.as_deref())
                        .ok_or_else(|| {
                            ValidationError::UnknownAggregate(spec.function.clone()).to_string()
                        })?;
                    op = op.with_aggregate(spec.alias.as_str(), aggregate);
                }
                op.into()
            }
            Self::AddColumn {
                name,
                position,
                value,
                copy_of,
            } => {
                let op = match copy_of {
                    Some(_) if !value.is_null() => {
                        return Err(format!("add_column {name}: set either value or copy_of, not both"));
                    }
                    Some(source) => {
                        let source = source.clone();
                        AddColumnOp::new(name.as_str(), move |record: &Record| {
                            record.get(&source).cloned().unwrap_or_default()
                        })
                    }
                    None => {
                        let value = value.clone();
                        AddColumnOp::new(name.as_str(), move |_: &Record| value.clone())
                    }
                };
                match position {
                    Some(position) => op.at(*position).into(),
                    None => op.into(),
                }
            }
        };
        Ok(operation)
    }
}

impl PipelineSpec {
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(json).map_err(|err| PipelineError::Spec(err.to_string()))
    }

    pub fn to_json(&self) -> Result<String, PipelineError> {
        serde_json::to_string_pretty(self).map_err(|err| PipelineError::Spec(err.to_string()))
    }

    /// Build every step. Errors name the step index.
    pub fn to_operations(&self, registry: &AggregateRegistry) -> Result<Vec<Operation>, PipelineError> {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                step.to_operation(registry)
                    .map_err(|message| PipelineError::Spec(format!("step {index}: {message}")))
            })
            .collect()
    }

    /// Resolve and validate every step without running anything. Checks run
    /// in the same order as [`Pipeline::validate`].
    pub fn validate(&self, registry: &AggregateRegistry) -> Result<Vec<Operation>, PipelineError> {
        let operations = self.to_operations(registry)?;
        validate_operations(&operations, &self.options)?;
        Ok(operations)
    }

    /// Replace the pipeline's options with this spec's and append its steps.
    pub fn apply_to<'a>(
        &self,
        pipeline: Pipeline<'a>,
        registry: &AggregateRegistry,
    ) -> Result<Pipeline<'a>, PipelineError> {
        let operations = self.to_operations(registry)?;
        Ok(operations
            .into_iter()
            .fold(pipeline.with_options(self.options.clone()), |pipeline, operation| {
                pipeline.push(operation)
            }))
    }
}
