//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The SQLite engine rejected or failed a statement.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A row accessor asked for a column the row does not have.
    #[error("column {index} out of range for a row of {len} columns")]
    ColumnOutOfRange {
        /// The requested column.
        index: usize,
        /// Number of columns in the row.
        len: usize,
    },

    /// A column held a value of an unexpected type.
    #[error("column {index}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The column index.
        index: usize,
        /// The requested type.
        expected: &'static str,
        /// The type actually stored.
        found: &'static str,
    },

    /// No identifier has been generated on this connection.
    #[error("no generated identifier available on this connection")]
    NoGeneratedId,

    /// The store refused the statement.
    #[error("statement rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Creates a rejected-statement error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}
