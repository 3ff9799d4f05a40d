//! # runtara-mysql-access
//!
//! A MySQL access layer built around structured conditions and cached
//! prepared statements.
//!
//! ## Features
//!
//! - **Condition Compiler**: JSON array conditions or typed [`ConditionExpression`]s
//!   compile to parameterized WHERE fragments with uniquely named parameters
//! - **Statement Builders**: SELECT, INSERT, REPLACE, INSERT .. ON DUPLICATE KEY UPDATE,
//!   UPDATE and DELETE from structured input
//! - **Statement Cache**: prepared handles are reused per SQL text
//! - **AES Compatibility**: encrypt and decrypt exactly like MySQL's
//!   `AES_ENCRYPT` / `AES_DECRYPT`
//! - **SQL Injection Prevention**: identifiers are backtick-quoted, values are always bound
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use runtara_mysql_access::{
//!     ConditionExpression, Connection, ConnectionConfig, InsertMode, OrderBy, ParameterMap,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::builder("mysql://localhost/mydb")
//!         .cipher_key("secret key material")
//!         .build();
//!     let mut conn = Connection::connect(config).await?;
//!
//!     // Insert a row
//!     let mut values = ParameterMap::new();
//!     values.insert("name", "Blue Widget");
//!     values.insert("price", 29.99);
//!     let id = conn.insert("products", &values, InsertMode::Simple).await?;
//!
//!     // Select with a JSON condition
//!     let condition = ConditionExpression::parse(&serde_json::json!([
//!         "AND",
//!         ["price", ">", 10],
//!         ["name", "LIKE", "Blue%"]
//!     ]))?;
//!     let rows = conn
//!         .select("products", &condition, Some(&OrderBy::desc("price")), 10, 0)
//!         .await?;
//!
//!     // Update by primary key
//!     values.insert("price", 24.99);
//!     conn.update("products", &values, &ConditionExpression::id(id), 1).await?;
//!
//!     // Encrypt a value the way AES_ENCRYPT would
//!     let sealed = conn.encrypt(Some("4111 1111 1111 1111"))?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Condition Grammar
//!
//! | JSON                               | SQL                                   |
//! |------------------------------------|---------------------------------------|
//! | `5`                                | `` `id` = :_where_param_0 ``          |
//! | `["status", "open"]`               | `` `status` = :_where_param_0 ``      |
//! | `["id", [1, 2]]`                   | `` `id` IN (:_where_param_0, ..) ``   |
//! | `["age", "BETWEEN", 18, 65]`       | `` `age` BETWEEN .. AND .. ``         |
//! | `["deleted_at", "IS NULL"]`        | `` `deleted_at` IS NULL ``            |
//! | `["OR", [..], [..]]`               | `(..) OR (..)`                        |
//! | `"raw SQL"`                        | passed through verbatim               |
//!
//! ## Sharing Connections
//!
//! A [`Connection`] is used through `&mut self`. To share one between tasks,
//! register its configuration in a [`ConnectionRegistry`] and fetch the
//! `Arc<Mutex<Connection>>` it hands out.

pub mod cipher;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod registry;
pub mod sql;
pub mod statement;
pub mod types;

// Re-export main types for convenience
pub use cipher::{CipherCompat, PaddingMode};
pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use connection::Connection;
pub use driver::{Driver, DriverError, DriverOutput, MySqlDriver};
pub use error::{DbError, Result};
pub use registry::{ConnectionRegistry, DEFAULT_CONNECTION, SharedConnection};
pub use statement::StatementKind;
pub use types::{CompiledStatement, ParameterMap, Parameters, QueryResult, Row, Value};

// Re-export SQL utilities for advanced users
pub use sql::{
    ComparisonOperator, ConditionExpression, InsertMode, LogicalOperator, OrderBy,
    build_condition_clause, compile_where, quote_identifier, sanitize_identifier,
};
