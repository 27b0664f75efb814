//! Transformation pipelines over docpipe tables.
//!
//! ```ignore
//! use docpipe_transform::{DocumentPipelineExt, SortDirection};
//!
//! let report = document
//!     .pipeline()
//!     .filter(|r| r.get("active").and_then(|v| v.as_bool()) == Some(true))
//!     .sort_by("score", SortDirection::Descending)
//!     .limit(10)
//!     .execute()?;
//! ```
//!
//! - **ops**: the [`Operation`] variants and their validation
//! - **pipeline**: [`Pipeline`] builder/executor and [`PipelineOptions`]
//! - **aggregate**: built-in reducers and the [`AggregateRegistry`]
//! - **compare**: cross-type value ordering and group keys
//! - **cancel**: [`CancellationToken`]
//! - **spec**: JSON pipeline definitions ([`PipelineSpec`])

pub mod aggregate;
pub mod cancel;
pub mod compare;
pub mod error;
pub mod ops;
pub mod pipeline;
pub mod spec;

pub use aggregate::{Aggregate, AggregateRegistry, Reducer};
pub use cancel::CancellationToken;
pub use compare::{GroupKey, compare_field, compare_values};
pub use error::{
    BoxError, CallbackError, CancelReason, ErrorKind, OperationError, PipelineError,
    ValidationError,
};
pub use ops::{
    AddColumnOp, ColumnFn, Comparator, FilterOp, GroupByOp, LimitOp, Operation, Predicate,
    SortDirection, SortKey, SortOp,
};
pub use pipeline::{DocumentPipelineExt, Pipeline, PipelineOptions};
pub use spec::{AggregateSpec, Comparison, PipelineSpec, StepSpec};
