use thiserror::Error;

use crate::schema::ColumnType;

/// Result type for dataset, join, harmonize and merge operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("Row {row} has {found} value(s) but the schema expects {expected}")]
    RowArity {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Row {row} column '{column}' holds a {found} value but is declared {expected}")]
    TypeMismatch {
        row: usize,
        column: String,
        expected: ColumnType,
        found: &'static str,
    },

    #[error("Column '{column}': {reason}")]
    Cast { column: String, reason: String },

    #[error("Join requires at least one key column")]
    NoKeys,

    #[error("Join key '{left}' ({left_type}) is not comparable with '{right}' ({right_type})")]
    KeyType {
        left: String,
        right: String,
        left_type: ColumnType,
        right_type: ColumnType,
    },

    #[error("Update dataset has no column '{0}'; harmonize the schemas before merging")]
    MissingUpdateColumn(String),

    /// Schema validation failure, carrying the full context chain.
    #[error(transparent)]
    Schema(#[from] anyhow::Error),
}
