//! Store error types.

use thiserror::Error;

use circadia_core::{AlarmId, TimeError};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error creating the database directory.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Hour or minute out of range.
    #[error("invalid alarm time: {0}")]
    InvalidTime(#[from] TimeError),

    /// No alarm row with this id.
    #[error("alarm {0} not found")]
    AlarmNotFound(AlarmId),

    /// A sleep session must end after it starts.
    #[error("sleep session ends before it starts ({start} >= {end})")]
    InvalidSession { start: i64, end: i64 },

    /// A stored value does not parse as its setting's type.
    #[error("invalid value for setting {key:?}: {value:?}")]
    InvalidValue { key: String, value: String },
}

impl StoreError {
    /// Creates an invalid value error.
    pub fn invalid_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }
}
