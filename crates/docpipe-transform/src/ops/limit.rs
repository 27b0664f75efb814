use docpipe_model::TableContent;

use crate::error::{OperationError, ValidationError};

/// Keeps the first `count` records.
///
/// `count` is signed so a negative value from a caller or config file is
/// reported by `validate` instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitOp {
    pub count: i64,
}

impl LimitOp {
    pub fn new(count: i64) -> Self {
        Self { count }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.count < 0 {
            return Err(ValidationError::NegativeLimit(self.count));
        }
        Ok(())
    }

    pub fn apply(&self, mut table: TableContent) -> Result<TableContent, OperationError> {
        self.validate()?;
        let keep = usize::try_from(self.count).unwrap_or(usize::MAX);
        table.records.truncate(keep);
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use docpipe_model::{Record, Schema};

    use super::*;

    fn rows(n: i64) -> TableContent {
        TableContent::new(
            "rows",
            Schema::from_keys(["n"]).unwrap(),
            (0..n).map(|i| Record::new().with("n", i)).collect(),
        )
    }

    #[test]
    fn keeps_prefix() {
        let out = LimitOp::new(2).apply(rows(5)).unwrap();
        assert_eq!(out.record_count(), 2);
        assert_eq!(out.records[1].get("n").and_then(|v| v.as_i64()), Some(1));
    }

    #[test]
    fn larger_than_table_keeps_everything() {
        assert_eq!(LimitOp::new(10).apply(rows(2)).unwrap().record_count(), 2);
    }

    #[test]
    fn zero_keeps_schema() {
        let out = LimitOp::new(0).apply(rows(3)).unwrap();
        assert_eq!(out.record_count(), 0);
        assert_eq!(out.key_order(), ["n"]);
    }

    #[test]
    fn negative_is_invalid() {
        let err = LimitOp::new(-1).validate().unwrap_err();
        assert_eq!(err, ValidationError::NegativeLimit(-1));
        assert_eq!(err.to_string(), "limit count must be non-negative (got -1)");
    }
}
