#![forbid(unsafe_code)]

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the store.
///
/// Configuration errors (unknown names, type mismatches, malformed grouping
/// arguments) fail before any row is touched; bounds and I/O errors are fatal
/// to the call that raised them. Nothing is swallowed or retried internally.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown field `{0}` in record shape")]
    UnknownField(String),

    #[error("duplicate field `{0}` in record shape")]
    DuplicateField(String),

    #[error("field `{name}`: expected {expected}, got {actual}")]
    FieldTypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("unknown column `{0}`")]
    UnknownColumn(String),

    #[error("column `{name}`: expected {expected}, got {actual}")]
    ColumnTypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("position {position} out of range for column `{column}` ({len} rows)")]
    OutOfRange {
        column: String,
        position: usize,
        len: usize,
    },

    #[error("nested grouping requires at least two columns, got {0}")]
    InvalidGrouping(usize),

    #[error("block plan must contain at least one positive increment")]
    InvalidPlan,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("corrupt column file: {0}")]
    Corrupt(String),
}
