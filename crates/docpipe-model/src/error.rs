use thiserror::Error;

/// Errors raised while building schemas and tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ModelError {
    #[error("field name must not be empty")]
    EmptyFieldName,
    #[error("duplicate field: {0}")]
    DuplicateField(String),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("hidden field cannot appear in key order: {0}")]
    HiddenField(String),
    #[error("key order must name every visible field exactly once (expected {expected}, got {actual})")]
    KeyOrderMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, ModelError>;
