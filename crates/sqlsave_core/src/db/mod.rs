//! Statement execution against a relational backend.
//!
//! # Responsibility
//! - Open and configure SQLite connections.
//! - Define the narrow `Backend` capability used by every execution path.
//! - Run statement batches under all-or-nothing or gate transaction policy.
//!
//! # Invariants
//! - Every failure inside a transaction rolls back before it is returned.
//! - Backend failures reach callers as `SqlError`, classified once, with
//!   primary-key violations tagged as duplicates.

use crate::model::metadata::SchemaError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod backend;
mod batch;
mod open;

pub use backend::{Backend, SqliteBackend};
pub use batch::{exec_statement, run_batch, BatchMode};
pub use open::{open_db, open_db_in_memory};

/// Message prefix some backends use for primary-key violations.
pub const PRIMARY_KEY_VIOLATION: &str = "Violation of PRIMARY KEY constraint";

pub type DbResult<T> = Result<T, DbError>;
pub type SqlResult<T> = Result<T, SqlError>;

/// Transport-level backend failure.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Failure reported by a non-SQLite backend, as its message text.
    Backend(String),
    /// Parameter value the backend cannot bind. `index` is 1-based.
    UnsupportedParam {
        index: usize,
        kind: &'static str,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Backend(message) => write!(f, "{message}"),
            Self::UnsupportedParam { index, kind } => {
                write!(f, "parameter {index} has unsupported {kind} value")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Backend(_) | Self::UnsupportedParam { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl DbError {
    /// Whether this failure is a primary-key uniqueness violation.
    pub fn is_primary_key_violation(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(failure, message)) => {
                failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || message
                        .as_deref()
                        .is_some_and(|text| text.starts_with(PRIMARY_KEY_VIOLATION))
            }
            Self::Backend(message) => message.starts_with(PRIMARY_KEY_VIOLATION),
            _ => false,
        }
    }
}

/// Error surfaced by the manager facade and batch executor.
#[derive(Debug)]
pub enum SqlError {
    /// Backend rejected a statement.
    Execution(DbError),
    /// Backend rejected a statement because the primary key already exists.
    Duplicate(DbError),
    Schema(SchemaError),
    /// Query result or entity could not be decoded into the requested shape.
    InvalidData(String),
}

impl SqlError {
    /// Portable duplicate-key marker.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

impl Display for SqlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Execution(err) => write!(f, "{err}"),
            Self::Duplicate(err) => write!(f, "duplicate key: {err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid data: {message}"),
        }
    }
}

impl Error for SqlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Execution(err) | Self::Duplicate(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for SqlError {
    fn from(value: DbError) -> Self {
        if value.is_primary_key_violation() {
            Self::Duplicate(value)
        } else {
            Self::Execution(value)
        }
    }
}

impl From<rusqlite::Error> for SqlError {
    fn from(value: rusqlite::Error) -> Self {
        DbError::Sqlite(value).into()
    }
}

impl From<SchemaError> for SqlError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{DbError, SqlError};
    use rusqlite::ffi;

    fn sqlite_failure(extended_code: i32, message: &str) -> DbError {
        DbError::Sqlite(rusqlite::Error::SqliteFailure(
            ffi::Error::new(extended_code),
            Some(message.to_string()),
        ))
    }

    #[test]
    fn primary_key_failures_are_tagged_duplicate() {
        let err: SqlError = sqlite_failure(
            ffi::SQLITE_CONSTRAINT_PRIMARYKEY,
            "UNIQUE constraint failed: users.userId",
        )
        .into();
        assert!(err.is_duplicate());

        let err: SqlError = DbError::Backend(
            "Violation of PRIMARY KEY constraint 'PK_users'. Cannot insert duplicate key."
                .to_string(),
        )
        .into();
        assert!(err.is_duplicate());
    }

    #[test]
    fn other_failures_are_not_duplicates() {
        let err: SqlError =
            sqlite_failure(ffi::SQLITE_CONSTRAINT_UNIQUE, "UNIQUE constraint failed: users.email")
                .into();
        assert!(!err.is_duplicate());

        let err: SqlError = DbError::Backend("syntax error near 'form'".to_string()).into();
        assert!(!err.is_duplicate());
        assert!(matches!(err, SqlError::Execution(_)));
    }
}
