//! Persistence error shared by every repository adapter.

use thiserror::Error;

/// Repository operation error.
///
/// These are **infrastructure errors** (storage, serialization) as opposed to
/// domain errors (validation, invariants).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        Self::Storage("in-memory store lock poisoned".to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Conflict(db.message().to_string())
            }
            e @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) => {
                StoreError::CorruptRow(e.to_string())
            }
            other => StoreError::Storage(other.to_string()),
        }
    }
}
