//! Error types for operations and pipeline execution.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use docpipe_model::{ContentKind, ModelError};
use thiserror::Error;

/// Boxed error returned by caller-supplied callbacks.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Broad classification of a failure, for callers that branch on kind
/// rather than on a concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An operation is misconfigured. Raised before any data is touched.
    Validation,
    /// An operation was given content it cannot handle.
    TypeMismatch,
    /// The run was cancelled or ran out of time.
    Cancellation,
    /// The pipeline holds more operations than allowed.
    LimitExceeded,
    /// A predicate, comparator or column function failed.
    Execution,
}

/// Configuration problems detected by `validate`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("filter predicate required")]
    PredicateRequired,
    #[error("sort requires either sort keys or a custom comparator")]
    SortKeysRequired,
    #[error("sort key column must not be empty")]
    EmptySortColumn,
    #[error("limit count must be non-negative (got {0})")]
    NegativeLimit(i64),
    #[error("group by requires at least one grouping column")]
    GroupColumnsRequired,
    #[error("group by requires at least one aggregate function")]
    AggregatesRequired,
    #[error("group by column name must not be empty")]
    EmptyGroupColumn,
    #[error("group by output column defined twice: {0}")]
    DuplicateGroupOutput(String),
    #[error("unknown aggregate function: {0}")]
    UnknownAggregate(String),
    #[error("add column requires a non-empty column name")]
    ColumnNameRequired,
    #[error("add column requires a calculation function")]
    CalculationRequired,
    #[error("add column position must be non-negative (got {0})")]
    NegativePosition(i64),
}

/// An error raised by a caller-supplied predicate, comparator or column
/// function. The original error is kept as the `source()`.
#[derive(Debug, Error)]
#[error("callback failed: {source}")]
pub struct CallbackError {
    #[source]
    source: BoxError,
}

impl CallbackError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }

    /// Downcast the original callback error.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.downcast_ref::<E>()
    }

    pub fn into_inner(self) -> BoxError {
        self.source
    }
}

/// Failure of a single operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OperationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{operation} requires table content, got {found} content")]
    RequiresTable {
        operation: &'static str,
        found: ContentKind,
    },
    #[error(transparent)]
    Callback(#[from] CallbackError),
    #[error("column {0} already exists as a hidden field")]
    HiddenColumn(String),
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl OperationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::HiddenColumn(_) => ErrorKind::Validation,
            Self::RequiresTable { .. } => ErrorKind::TypeMismatch,
            Self::Callback(_) | Self::Model(_) => ErrorKind::Execution,
        }
    }
}

/// Why a run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The cancellation token was triggered.
    Cancelled,
    /// The token's own deadline passed.
    DeadlineExceeded,
    /// The pipeline's `max_execution_time` elapsed.
    Timeout(Duration),
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
            Self::Timeout(limit) => write!(
                f,
                "maximum execution time of {}ms exceeded",
                limit.as_millis()
            ),
        }
    }
}

/// Errors returned by pipeline execution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("pipeline operations require table content")]
    NoTableContent,

    #[error("pipeline has {actual} operations, exceeding the configured maximum of {max}")]
    TooManyOperations { actual: usize, max: usize },

    #[error("operation {index} ({name}) is invalid: {source}")]
    InvalidOperation {
        index: usize,
        name: &'static str,
        #[source]
        source: OperationError,
    },

    #[error("operation {index} ({name}) failed: {source}")]
    OperationFailed {
        index: usize,
        name: &'static str,
        #[source]
        source: OperationError,
    },

    #[error("pipeline stopped before operation {index}: {reason}")]
    Cancelled { index: usize, reason: CancelReason },

    #[error("invalid pipeline spec: {0}")]
    Spec(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoTableContent => ErrorKind::TypeMismatch,
            Self::TooManyOperations { .. } => ErrorKind::LimitExceeded,
            Self::InvalidOperation { source, .. } | Self::OperationFailed { source, .. } => {
                source.kind()
            }
            Self::Cancelled { .. } => ErrorKind::Cancellation,
            Self::Spec(_) => ErrorKind::Validation,
        }
    }

    /// Index and name of the operation the error is attributed to.
    pub fn operation(&self) -> Option<(usize, &'static str)> {
        match self {
            Self::InvalidOperation { index, name, .. }
            | Self::OperationFailed { index, name, .. } => Some((*index, name)),
            _ => None,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        self.kind() == ErrorKind::Cancellation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl StdError for Boom {}

    #[test]
    fn callback_error_keeps_original() {
        let err = CallbackError::new(Boom);
        assert!(err.downcast_ref::<Boom>().is_some());
        assert_eq!(err.to_string(), "callback failed: boom");
        assert_eq!(err.source().map(ToString::to_string), Some("boom".to_string()));
    }

    #[test]
    fn kinds_follow_source() {
        let err = PipelineError::InvalidOperation {
            index: 1,
            name: "limit",
            source: ValidationError::NegativeLimit(-1).into(),
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.operation(), Some((1, "limit")));
        assert!(err.to_string().contains("limit count must be non-negative"));

        let err = PipelineError::OperationFailed {
            index: 0,
            name: "sort",
            source: OperationError::RequiresTable {
                operation: "sort",
                found: ContentKind::Text,
            },
        };
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.to_string().contains("requires table content"));
    }

    #[test]
    fn timeout_is_cancellation_with_distinct_message() {
        let cancelled = PipelineError::Cancelled {
            index: 2,
            reason: CancelReason::Cancelled,
        };
        let timed_out = PipelineError::Cancelled {
            index: 2,
            reason: CancelReason::Timeout(Duration::from_millis(50)),
        };
        assert!(cancelled.is_cancellation());
        assert!(timed_out.is_cancellation());
        assert_ne!(cancelled.to_string(), timed_out.to_string());
        assert!(timed_out.to_string().contains("50ms"));
    }
}
