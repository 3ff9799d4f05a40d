//! Database driver boundary
//!
//! The access layer only needs three primitives from a driver: prepare a SQL
//! text into a reusable handle, execute a handle with bound parameters, and
//! report the last generated auto-increment id. [`MySqlDriver`] implements
//! them on top of `sqlx`.

pub mod mysql;

use std::future::Future;

use crate::error::DbError;
use crate::statement::StatementKind;
use crate::types::{Parameters, Row};

pub use mysql::{MySqlDriver, MySqlHandle};

/// SQLSTATE used when the driver has no more specific code
pub const GENERAL_ERROR: &str = "HY000";

/// SQLSTATE for a parameter that has no bound value
pub const INVALID_PARAMETER: &str = "HY093";

/// Raw output of an executed statement
#[derive(Debug, Clone, PartialEq)]
pub enum DriverOutput {
    Rows(Vec<Row>),
    Done { rows_affected: u64 },
}

/// Error reported by a driver: an engine error code and its message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    pub code: String,
    pub message: String,
}

impl DriverError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<DriverError> for DbError {
    fn from(err: DriverError) -> Self {
        DbError::Execution {
            code: err.code,
            message: err.message,
        }
    }
}

impl From<sqlx::Error> for DriverError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => DriverError::new(
                db.code()
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|| GENERAL_ERROR.to_string()),
                db.message(),
            ),
            other => DriverError::new(GENERAL_ERROR, other.to_string()),
        }
    }
}

/// Prepare/execute primitives consumed by [`crate::Connection`]
pub trait Driver {
    /// A prepared statement, cheap to clone
    type Handle: Clone + Send + Sync;

    fn prepare(
        &mut self,
        sql: &str,
    ) -> impl Future<Output = Result<Self::Handle, DriverError>> + Send;

    /// Execute a prepared statement; `kind` tells whether rows are fetched
    fn execute(
        &mut self,
        handle: &Self::Handle,
        params: &Parameters,
        kind: StatementKind,
    ) -> impl Future<Output = Result<DriverOutput, DriverError>> + Send;

    /// Auto-increment id generated by the last executed statement
    fn last_insert_id(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::new("42S02", "Table 'db.missing' doesn't exist");
        assert_eq!(err.to_string(), "42S02: Table 'db.missing' doesn't exist");
    }

    #[test]
    fn test_driver_error_into_db_error() {
        let err: DbError = DriverError::new("23000", "Duplicate entry").into();
        assert!(matches!(err, DbError::Execution { ref code, .. } if code == "23000"));
        assert_eq!(err.to_string(), "23000: Duplicate entry");
    }

    #[test]
    fn test_non_database_sqlx_error_uses_general_code() {
        let err: DriverError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.code, GENERAL_ERROR);
        assert!(!err.message.is_empty());
    }
}
