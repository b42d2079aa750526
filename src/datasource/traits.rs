//! Datasource trait definitions

use crate::value::{RecordId, Row};
use std::path::Path;
use thiserror::Error;

/// Errors raised by a datasource
///
/// These pass through the bus unmodified; nothing above the datasource
/// interprets or retries them.
#[derive(Debug, Error)]
pub enum DatasourceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("No row in {table} with id {id}")]
    RowNotFound { table: String, id: RecordId },

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Constraint violation on {table}: {reason}")]
    Constraint { table: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Datasource lock poisoned")]
    LockPoisoned,
}

/// Result type for datasource operations
pub type DatasourceResult<T> = Result<T, DatasourceError>;

/// Storage the fixtures are written to
///
/// Implementations remember every row they insert so that `reset` can remove
/// them again. Rows that existed before, or were written by other means, are
/// left alone.
pub trait Datasource: Send + Sync {
    /// Insert a row and return the value of its `key_column`
    ///
    /// The key must be an integer. A row whose key is anything else is not
    /// kept and fails with `Constraint`.
    fn insert(&self, table: &str, key_column: &str, row: &Row) -> DatasourceResult<RecordId>;

    /// Update the row whose `key_column` equals `id`
    ///
    /// Fails with `RowNotFound` if no such row exists.
    fn update(&self, table: &str, key_column: &str, id: RecordId, row: &Row) -> DatasourceResult<()>;

    /// Delete every row inserted since the last reset, newest first
    fn reset(&self) -> DatasourceResult<()>;
}

/// Extension trait for opening datasources from paths
pub trait OpenDatasource: Datasource + Sized {
    /// Open or create a datasource at the given path
    fn open(path: impl AsRef<Path>) -> DatasourceResult<Self>;

    /// Create an in-memory datasource (useful for testing)
    fn open_in_memory() -> DatasourceResult<Self>;
}

/// Check that `name` is a plain SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`
pub fn validate_identifier(name: &str) -> DatasourceResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DatasourceError::InvalidIdentifier(name.to_string()))
    }
}
