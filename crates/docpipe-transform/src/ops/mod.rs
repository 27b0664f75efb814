//! Table operations.
//!
//! Every operation follows the same contract: `validate` checks the
//! configuration without touching data, and `apply` consumes a table and
//! returns a new one. Nothing is mutated in place that the caller can still
//! observe.

mod add_column;
mod filter;
mod group_by;
mod limit;
mod sort;

pub use add_column::{AddColumnOp, ColumnFn};
pub use filter::{FilterOp, Predicate};
pub use group_by::GroupByOp;
pub use limit::LimitOp;
pub use sort::{Comparator, SortDirection, SortKey, SortOp};

use docpipe_model::{Content, TableContent};

use crate::error::{OperationError, ValidationError};

/// The closed set of table operations a pipeline can run.
#[derive(Debug, Clone)]
pub enum Operation {
    Filter(FilterOp),
    Sort(SortOp),
    Limit(LimitOp),
    GroupBy(GroupByOp),
    AddColumn(AddColumnOp),
}

impl Operation {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Filter(_) => "filter",
            Self::Sort(_) => "sort",
            Self::Limit(_) => "limit",
            Self::GroupBy(_) => "group_by",
            Self::AddColumn(_) => "add_column",
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Filter(op) => op.validate(),
            Self::Sort(op) => op.validate(),
            Self::Limit(op) => op.validate(),
            Self::GroupBy(op) => op.validate(),
            Self::AddColumn(op) => op.validate(),
        }
    }

    /// Apply to any content block. Only tables are accepted.
    pub fn apply(&self, content: Content) -> Result<Content, OperationError> {
        match content {
            Content::Table(table) => self.apply_table(table).map(Content::Table),
            other => Err(OperationError::RequiresTable {
                operation: self.name(),
                found: other.kind(),
            }),
        }
    }

    pub fn apply_table(&self, table: TableContent) -> Result<TableContent, OperationError> {
        match self {
            Self::Filter(op) => op.apply(table),
            Self::Sort(op) => op.apply(table),
            Self::Limit(op) => op.apply(table),
            Self::GroupBy(op) => op.apply(table),
            Self::AddColumn(op) => op.apply(table),
        }
    }

    /// Whether this operation can be merged with `next` when they run back to back.
    ///
    /// Only adjacent filters merge: their predicates combine into one pass.
    pub fn can_optimize(&self, next: &Self) -> bool {
        matches!((self, next), (Self::Filter(_), Self::Filter(_)))
    }

    /// Short human-readable summary of the configuration, recorded in the
    /// table's transformation log.
    pub fn describe(&self) -> Option<String> {
        match self {
            Self::Filter(_) => None,
            Self::Sort(op) => {
                let mut parts: Vec<String> = op.keys().iter().map(ToString::to_string).collect();
                if op.has_comparator() {
                    parts.push("custom comparator".to_string());
                }
                Some(parts.join(", "))
            }
            Self::Limit(op) => Some(op.count.to_string()),
            Self::GroupBy(op) => {
                let aliases: Vec<&str> = op.aggregates().iter().map(|(alias, _)| alias.as_str()).collect();
                Some(format!(
                    "by {} -> {}",
                    op.columns().join(", "),
                    aliases.join(", ")
                ))
            }
            Self::AddColumn(op) => Some(match op.position() {
                Some(position) => format!("{} at {position}", op.name()),
                None => op.name().to_string(),
            }),
        }
    }
}

impl From<FilterOp> for Operation {
    fn from(op: FilterOp) -> Self {
        Self::Filter(op)
    }
}

impl From<SortOp> for Operation {
    fn from(op: SortOp) -> Self {
        Self::Sort(op)
    }
}

impl From<LimitOp> for Operation {
    fn from(op: LimitOp) -> Self {
        Self::Limit(op)
    }
}

impl From<GroupByOp> for Operation {
    fn from(op: GroupByOp) -> Self {
        Self::GroupBy(op)
    }
}

impl From<AddColumnOp> for Operation {
    fn from(op: AddColumnOp) -> Self {
        Self::AddColumn(op)
    }
}

#[cfg(test)]
mod tests {
    use docpipe_model::{ContentKind, Record, Schema, TextContent};

    use super::*;
    use crate::aggregate::Aggregate;
    use crate::error::ErrorKind;

    fn all_ops() -> Vec<Operation> {
        vec![
            FilterOp::new(|_| true).into(),
            SortOp::new([SortKey::asc("a")]).into(),
            LimitOp::new(1).into(),
            GroupByOp::new(["a"]).with_aggregate("n", Aggregate::count()).into(),
            AddColumnOp::new("b", |_| 1.into()).into(),
        ]
    }

    #[test]
    fn non_table_content_is_rejected_by_every_operation() {
        let text = Content::Text(TextContent {
            id: "intro".into(),
            text: "hello".into(),
        });
        for op in all_ops() {
            let err = op.apply(text.clone()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::TypeMismatch);
            match err {
                OperationError::RequiresTable { operation, found } => {
                    assert_eq!(operation, op.name());
                    assert_eq!(found, ContentKind::Text);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn only_adjacent_filters_optimize() {
        let ops = all_ops();
        let filter = &ops[0];
        assert!(filter.can_optimize(&FilterOp::new(|_| false).into()));
        for other in &ops[1..] {
            assert!(!filter.can_optimize(other));
            assert!(!other.can_optimize(filter));
            assert!(!other.can_optimize(other));
        }
    }

    #[test]
    fn apply_accepts_tables() {
        let table = TableContent::new(
            "t",
            Schema::from_keys(["a"]).unwrap(),
            vec![Record::new().with("a", 2), Record::new().with("a", 1)],
        );
        let out = Operation::from(SortOp::new([SortKey::asc("a")]))
            .apply(Content::Table(table))
            .unwrap();
        let table = out.as_table().unwrap();
        assert_eq!(table.records[0].get("a").and_then(|v| v.as_i64()), Some(1));
    }

    #[test]
    fn descriptions() {
        let names: Vec<_> = all_ops().iter().map(Operation::name).collect();
        assert_eq!(names, ["filter", "sort", "limit", "group_by", "add_column"]);
        let described: Vec<_> = all_ops().iter().map(Operation::describe).collect();
        assert_eq!(
            described,
            [
                None,
                Some("a asc".to_string()),
                Some("1".to_string()),
                Some("by a -> n".to_string()),
                Some("b".to_string()),
            ]
        );
    }
}
