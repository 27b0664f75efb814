use std::fmt;
use std::sync::Arc;

use docpipe_model::{Record, TableContent};

use crate::error::{BoxError, CallbackError, OperationError, ValidationError};

/// Row predicate. Infallible predicates are wrapped to always return `Ok`.
pub type Predicate = Arc<dyn Fn(&Record) -> Result<bool, CallbackError> + Send + Sync>;

/// Keeps the records a predicate accepts, in their original order.
#[derive(Clone, Default)]
pub struct FilterOp {
    predicate: Option<Predicate>,
}

impl FilterOp {
    pub fn new(predicate: impl Fn(&Record) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Some(Arc::new(move |record: &Record| -> Result<bool, CallbackError> {
                Ok(predicate(record))
            })),
        }
    }

    /// A filter whose predicate may fail. The first failure aborts the filter.
    pub fn try_new<E>(predicate: impl Fn(&Record) -> Result<bool, E> + Send + Sync + 'static) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            predicate: Some(Arc::new(move |record: &Record| {
                predicate(record).map_err(CallbackError::new)
            })),
        }
    }

    pub fn has_predicate(&self) -> bool {
        self.predicate.is_some()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.predicate.is_none() {
            return Err(ValidationError::PredicateRequired);
        }
        Ok(())
    }

    /// Both predicates in one pass. `other` is only consulted for records
    /// `self` accepts, matching the order the two filters would run in.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        let predicate = match (self.predicate, other.predicate) {
            (Some(first), Some(second)) => {
                let fused: Predicate =
                    Arc::new(move |record: &Record| -> Result<bool, CallbackError> {
                        Ok(first(record)? && second(record)?)
                    });
                Some(fused)
            }
            _ => None,
        };
        Self { predicate }
    }

    pub fn apply(&self, mut table: TableContent) -> Result<TableContent, OperationError> {
        let Some(predicate) = &self.predicate else {
            return Err(ValidationError::PredicateRequired.into());
        };
        let mut kept = Vec::with_capacity(table.records.len());
        for record in std::mem::take(&mut table.records) {
            if predicate(&record)? {
                kept.push(record);
            }
        }
        table.records = kept;
        Ok(table)
    }
}

impl fmt::Debug for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterOp")
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
