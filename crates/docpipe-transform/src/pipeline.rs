//! Pipeline orchestration.
//!
//! A [`Pipeline`] borrows a document, collects operations through fluent
//! calls, and on [`execute`](Pipeline::execute) runs them against a clone of
//! the document's first table:
//!
//! 1. validate: table content present, operation count within
//!    `max_operations`, then every operation's own `validate` in order;
//! 2. plan: optionally fuse runs of adjacent filters;
//! 3. apply: check cancellation and elapsed time before each step, wrap any
//!    failure with the operation's index and name;
//! 4. return a new document with the transformed table in the original
//!    table's slot.
//!
//! The borrowed document is never modified, and `execute` can be called any
//! number of times; every call starts again from the original table.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use docpipe_model::{Content, Document, Record, TableContent, TransformStep, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::aggregate::Aggregate;
use crate::cancel::CancellationToken;
use crate::error::{BoxError, CancelReason, PipelineError};
use crate::ops::{AddColumnOp, FilterOp, GroupByOp, LimitOp, Operation, SortDirection, SortKey, SortOp};

/// Execution limits and optimizer switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Maximum number of operations. Zero means unlimited.
    pub max_operations: usize,
    /// Wall-clock budget for one execution. `None` means unlimited.
    #[serde(
        rename = "max_execution_time_ms",
        with = "duration_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_execution_time: Option<Duration>,
    /// Merge runs of adjacent filters into a single pass.
    pub fuse_filters: bool,
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_operations(mut self, max: usize) -> Self {
        self.max_operations = max;
        self
    }

    /// A zero duration means unlimited.
    #[must_use]
    pub fn with_max_execution_time(mut self, limit: Duration) -> Self {
        self.max_execution_time = (!limit.is_zero()).then_some(limit);
        self
    }

    #[must_use]
    pub fn with_fuse_filters(mut self, fuse: bool) -> Self {
        self.fuse_filters = fuse;
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        value
            .map(|limit| u64::try_from(limit.as_millis()).unwrap_or(u64::MAX))
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis))
    }
}

/// Builder and executor for a chain of operations over one document.
#[derive(Debug, Clone)]
pub struct Pipeline<'a> {
    document: &'a Document,
    operations: Vec<Operation>,
    options: PipelineOptions,
}

/// `document.pipeline()` entry point.
pub trait DocumentPipelineExt {
    fn pipeline(&self) -> Pipeline<'_>;
}

impl DocumentPipelineExt for Document {
    fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(self)
    }
}

/// One unit of work after planning. A fused filter covers several
/// consecutive operations and is attributed to the first of them.
struct PlannedStep {
    index: usize,
    covers: usize,
    operation: Operation,
}

impl<'a> Pipeline<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self {
            document,
            operations: Vec::new(),
            options: PipelineOptions::default(),
        }
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn push(mut self, operation: impl Into<Operation>) -> Self {
        self.operations.push(operation.into());
        self
    }

    #[must_use]
    pub fn filter(self, predicate: impl Fn(&Record) -> bool + Send + Sync + 'static) -> Self {
        self.push(FilterOp::new(predicate))
    }

    #[must_use]
    pub fn try_filter<E>(
        self,
        predicate: impl Fn(&Record) -> Result<bool, E> + Send + Sync + 'static,
    ) -> Self
    where
        E: Into<BoxError>,
    {
        self.push(FilterOp::try_new(predicate))
    }

    /// Multi-key sort; the first key is primary.
    #[must_use]
    pub fn sort(self, keys: impl IntoIterator<Item = SortKey>) -> Self {
        self.push(SortOp::new(keys))
    }

    #[must_use]
    pub fn sort_by(self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.push(SortOp::new([SortKey::new(column, direction)]))
    }

    #[must_use]
    pub fn sort_with(
        self,
        comparator: impl Fn(&Record, &Record) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.push(SortOp::with_comparator(comparator))
    }

    #[must_use]
    pub fn try_sort_with<E>(
        self,
        comparator: impl Fn(&Record, &Record) -> Result<Ordering, E> + Send + Sync + 'static,
    ) -> Self
    where
        E: Into<BoxError>,
    {
        self.push(SortOp::try_with_comparator(comparator))
    }

    #[must_use]
    pub fn limit(self, count: i64) -> Self {
        self.push(LimitOp::new(count))
    }

    /// Group by `columns`, producing one output field per `(alias, aggregate)`
    /// pair in the order given.
    #[must_use]
    pub fn group_by<C, S, A, N>(self, columns: C, aggregates: A) -> Self
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
        A: IntoIterator<Item = (N, Aggregate)>,
        N: Into<String>,
    {
        self.push(GroupByOp::new(columns).with_aggregates(aggregates))
    }

    #[must_use]
    pub fn add_column(
        self,
        name: impl Into<String>,
        compute: impl Fn(&Record) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.push(AddColumnOp::new(name, compute))
    }

    #[must_use]
    pub fn add_column_at(
        self,
        name: impl Into<String>,
        position: i64,
        compute: impl Fn(&Record) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.push(AddColumnOp::new(name, compute).at(position))
    }

    /// Check the whole chain without touching any data.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.document.first_table().is_none() {
            return Err(PipelineError::NoTableContent);
        }
        validate_operations(&self.operations, &self.options)
    }

    pub fn execute(&self) -> Result<Document, PipelineError> {
        self.execute_with(&CancellationToken::new())
    }

    /// Run the pipeline, stopping early if `token` is cancelled or its
    /// deadline passes.
    pub fn execute_with(&self, token: &CancellationToken) -> Result<Document, PipelineError> {
        let Some((slot, source)) = self.document.first_table() else {
            return Err(PipelineError::NoTableContent);
        };
        let span = info_span!(
            "pipeline",
            document_id = %self.document.id,
            table_id = %source.id,
            operations = self.operations.len()
        );
        let _guard = span.enter();
        let start = Instant::now();

        self.validate()?;
        let plan = self.plan();
        let mut table = source.clone();
        let rows_before = table.record_count();

        for step in &plan {
            if let Some(reason) = self.stop_reason(token, start) {
                warn!(
                    index = step.index,
                    operation = step.operation.name(),
                    reason = %reason,
                    elapsed_ms = start.elapsed().as_millis(),
                    "pipeline stopped"
                );
                return Err(PipelineError::Cancelled {
                    index: step.index,
                    reason,
                });
            }
            table = self.run_step(step, table)?;
        }

        info!(
            operations = self.operations.len(),
            steps = plan.len(),
            rows_in = rows_before,
            rows_out = table.record_count(),
            duration_ms = start.elapsed().as_millis(),
            "pipeline complete"
        );
        self.document
            .with_content_at(slot, Content::Table(table))
            .ok_or(PipelineError::NoTableContent)
    }

    fn run_step(&self, step: &PlannedStep, table: TableContent) -> Result<TableContent, PipelineError> {
        let rows_in = table.record_count();
        let step_start = Instant::now();
        let mut table =
            step.operation
                .apply_table(table)
                .map_err(|source| PipelineError::OperationFailed {
                    index: step.index,
                    name: step.operation.name(),
                    source,
                })?;
        debug!(
            index = step.index,
            operation = step.operation.name(),
            fused = step.covers,
            rows_in,
            rows_out = table.record_count(),
            duration_ms = step_start.elapsed().as_millis(),
            "operation applied"
        );
        let covered = &self.operations[step.index..step.index + step.covers];
        table.transformations.extend(covered.iter().map(|operation| {
            let entry = TransformStep::new(operation.name());
            match operation.describe() {
                Some(detail) => entry.with_detail(detail),
                None => entry,
            }
        }));
        Ok(table)
    }

    fn stop_reason(&self, token: &CancellationToken, start: Instant) -> Option<CancelReason> {
        if let Some(reason) = token.check() {
            return Some(reason);
        }
        match self.options.max_execution_time {
            Some(limit) if start.elapsed() >= limit => Some(CancelReason::Timeout(limit)),
            _ => None,
        }
    }

    fn plan(&self) -> Vec<PlannedStep> {
        let mut plan: Vec<PlannedStep> = Vec::with_capacity(self.operations.len());
        for (index, operation) in self.operations.iter().enumerate() {
            if self.options.fuse_filters
                && let Some(last) = plan.last_mut()
                && last.operation.can_optimize(operation)
                && let (Operation::Filter(first), Operation::Filter(next)) = (&last.operation, operation)
            {
                last.operation = Operation::Filter(first.clone().and(next.clone()));
                last.covers += 1;
                continue;
            }
            plan.push(PlannedStep {
                index,
                covers: 1,
                operation: operation.clone(),
            });
        }
        plan
    }
}

/// Operation-count limit first, then each operation in order.
pub(crate) fn validate_operations(
    operations: &[Operation],
    options: &PipelineOptions,
) -> Result<(), PipelineError> {
    let max = options.max_operations;
    if max > 0 && operations.len() > max {
        return Err(PipelineError::TooManyOperations {
            actual: operations.len(),
            max,
        });
    }
    for (index, operation) in operations.iter().enumerate() {
        operation
            .validate()
            .map_err(|err| PipelineError::InvalidOperation {
                index,
                name: operation.name(),
                source: err.into(),
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use docpipe_model::Schema;

    use super::*;
    use crate::error::ErrorKind;

    fn document() -> Document {
        let records = (1..=4)
            .map(|n| Record::new().with("n", n).with("even", n % 2 == 0))
            .collect();
        let table = TableContent::new("numbers", Schema::from_keys(["n", "even"]).unwrap(), records);
        Document::builder("doc")
            .text("intro", "numbers below")
            .table(table)
            .build()
    }

    #[test]
    fn fused_filters_run_as_one_step() {
        let doc = document();
        let plain = doc
            .pipeline()
            .filter(|r| r.get("even") == Some(&Value::Bool(true)))
            .filter(|r| r.get("n").and_then(Value::as_i64) != Some(2))
            .limit(5);
        let fused = plain
            .clone()
            .with_options(PipelineOptions::new().with_fuse_filters(true));
        assert_eq!(plain.plan().len(), 3);
        assert_eq!(fused.plan().len(), 2);

        let a = plain.execute().unwrap();
        let b = fused.execute().unwrap();
        assert_eq!(a, b);
        let (_, table) = b.first_table().unwrap();
        assert_eq!(table.record_count(), 1);
        assert_eq!(table.transformations.len(), 3);
    }

    #[test]
    fn result_replaces_table_slot_only() {
        let doc = document();
        let out = doc.pipeline().limit(1).execute().unwrap();
        assert_eq!(out.contents.len(), 2);
        assert_eq!(out.contents[0], doc.contents[0]);
        let (slot, table) = out.first_table().unwrap();
        assert_eq!(slot, 1);
        assert_eq!(table.record_count(), 1);
        assert_eq!(
            table.transformations,
            [TransformStep::new("limit").with_detail("1")]
        );
    }

    #[test]
    fn validate_reports_first_invalid_operation() {
        let doc = document();
        let err = doc
            .pipeline()
            .limit(1)
            .push(SortOp::default())
            .limit(-1)
            .validate()
            .unwrap_err();
        assert_eq!(err.operation(), Some((1, "sort")));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn zero_max_operations_is_unlimited() {
        let doc = document();
        let pipeline = (0..50).fold(doc.pipeline(), |p, _| p.limit(10));
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn options_round_trip_in_milliseconds() {
        let options = PipelineOptions::new()
            .with_max_operations(3)
            .with_max_execution_time(Duration::from_millis(250));
        let json = serde_json::to_string(&options).unwrap();
        assert_eq!(
            json,
            r#"{"max_operations":3,"max_execution_time_ms":250,"fuse_filters":false}"#
        );
        let back: PipelineOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);

        let unlimited: PipelineOptions =
            serde_json::from_str(r#"{"max_execution_time_ms":0}"#).unwrap();
        assert_eq!(unlimited.max_execution_time, None);
        assert_eq!(
            PipelineOptions::new().with_max_execution_time(Duration::ZERO),
            PipelineOptions::default()
        );
    }
}
