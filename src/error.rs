//! Error types for database access operations

use thiserror::Error;

/// Errors that can occur while building or executing statements
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Malformed condition: {0}")]
    MalformedCondition(String),

    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    #[error("Missing arguments: {0}")]
    MissingArguments(String),

    #[error("No usable columns for table {0}")]
    NoColumns(String),

    /// Failure reported by the driver while preparing or executing a statement
    #[error("{code}: {message}")]
    Execution { code: String, message: String },

    #[error("Cipher key is not configured")]
    MissingCipherKey,

    #[error("Cipher error: {0}")]
    Cipher(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl DbError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedCondition(msg.into())
    }

    pub fn missing_arguments(msg: impl Into<String>) -> Self {
        Self::MissingArguments(msg.into())
    }

    pub fn cipher(msg: impl Into<String>) -> Self {
        Self::Cipher(msg.into())
    }

    pub fn execution(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
