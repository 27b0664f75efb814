use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use docpipe_model::{Record, TableContent};
use serde::{Deserialize, Serialize};

use crate::compare::compare_field;
use crate::error::{BoxError, CallbackError, OperationError, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// One column of a multi-key sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Ascending)
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Descending)
    }

    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ord = compare_field(a, b, &self.column);
        match self.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.direction.as_str())
    }
}

/// Record comparator. Infallible comparators are wrapped to always return `Ok`.
pub type Comparator =
    Arc<dyn Fn(&Record, &Record) -> Result<Ordering, CallbackError> + Send + Sync>;

/// Stable sort by column keys, a custom comparator, or both.
///
/// With both set, the keys decide first and the comparator breaks ties.
#[derive(Clone, Default)]
pub struct SortOp {
    keys: Vec<SortKey>,
    comparator: Option<Comparator>,
}

impl SortOp {
    pub fn new(keys: impl IntoIterator<Item = SortKey>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
            comparator: None,
        }
    }

    pub fn with_comparator(
        comparator: impl Fn(&Record, &Record) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        Self::default().then_with(comparator)
    }

    pub fn try_with_comparator<E>(
        comparator: impl Fn(&Record, &Record) -> Result<Ordering, E> + Send + Sync + 'static,
    ) -> Self
    where
        E: Into<BoxError>,
    {
        Self::default().try_then_with(comparator)
    }

    /// Use `comparator` for records the keys consider equal.
    #[must_use]
    pub fn then_with(
        mut self,
        comparator: impl Fn(&Record, &Record) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.comparator = Some(Arc::new(
            move |a: &Record, b: &Record| -> Result<Ordering, CallbackError> { Ok(comparator(a, b)) },
        ));
        self
    }

    #[must_use]
    pub fn try_then_with<E>(
        mut self,
        comparator: impl Fn(&Record, &Record) -> Result<Ordering, E> + Send + Sync + 'static,
    ) -> Self
    where
        E: Into<BoxError>,
    {
        self.comparator = Some(Arc::new(move |a: &Record, b: &Record| {
            comparator(a, b).map_err(CallbackError::new)
        }));
        self
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn has_comparator(&self) -> bool {
        self.comparator.is_some()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.keys.is_empty() && self.comparator.is_none() {
            return Err(ValidationError::SortKeysRequired);
        }
        if self.keys.iter().any(|key| key.column.is_empty()) {
            return Err(ValidationError::EmptySortColumn);
        }
        Ok(())
    }

    fn compare(&self, a: &Record, b: &Record) -> Result<Ordering, CallbackError> {
        let ord = self
            .keys
            .iter()
            .map(|key| key.compare(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal);
        match (&self.comparator, ord) {
            (Some(comparator), Ordering::Equal) => comparator(a, b),
            _ => Ok(ord),
        }
    }

    pub fn apply(&self, mut table: TableContent) -> Result<TableContent, OperationError> {
        self.validate()?;
        let records = std::mem::take(&mut table.records);
        table.records = stable_sort(records, |a, b| self.compare(a, b))?;
        Ok(table)
    }
}

impl fmt::Debug for SortOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortOp")
            .field("keys", &self.keys)
            .field("comparator", &self.comparator.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Stable merge sort that stops at the first comparator error.
///
/// Sorts a permutation of indices, then moves the items into place once.
/// Never panics on comparators that are not a total order.
fn stable_sort<T, E, F>(items: Vec<T>, mut cmp: F) -> Result<Vec<T>, E>
where
    F: FnMut(&T, &T) -> Result<Ordering, E>,
{
    if items.len() < 2 {
        return Ok(items);
    }
    let mut order: Vec<usize> = (0..items.len()).collect();
    let mut scratch = order.clone();
    merge_sort(&mut order, &mut scratch, &items, &mut cmp)?;

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|idx| slots[idx].take()).collect())
}

fn merge_sort<T, E, F>(
    order: &mut [usize],
    scratch: &mut [usize],
    items: &[T],
    cmp: &mut F,
) -> Result<(), E>
where
    F: FnMut(&T, &T) -> Result<Ordering, E>,
{
    let len = order.len();
    if len < 2 {
        return Ok(());
    }
    let mid = len / 2;
    {
        let (left, right) = order.split_at_mut(mid);
        let (scratch_left, scratch_right) = scratch.split_at_mut(mid);
        merge_sort(left, scratch_left, items, cmp)?;
        merge_sort(right, scratch_right, items, cmp)?;
    }

    scratch.copy_from_slice(order);
    let (left, right) = scratch.split_at(mid);
    let (mut i, mut j, mut k) = (0, 0, 0);
    while i < left.len() && j < right.len() {
        // Take from the right run only when strictly smaller, so ties keep input order.
        if cmp(&items[right[j]], &items[left[i]])?.is_lt() {
            order[k] = right[j];
            j += 1;
        } else {
            order[k] = left[i];
            i += 1;
        }
        k += 1;
    }
    let rest_left = &left[i..];
    order[k..k + rest_left.len()].copy_from_slice(rest_left);
    k += rest_left.len();
    order[k..].copy_from_slice(&right[j..]);
    Ok(())
}
