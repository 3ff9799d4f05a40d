//! Connection - main entry point for statement execution
//!
//! A `Connection` owns a driver, its prepared statement cache, the derived
//! cipher key and the last recorded error. Mutating calls take `&mut self`;
//! share a connection between tasks through
//! [`ConnectionRegistry`](crate::registry::ConnectionRegistry).

use tracing::{debug, warn};

use crate::cipher::CipherCompat;
use crate::config::ConnectionConfig;
use crate::driver::{Driver, DriverError, MySqlDriver};
use crate::error::{DbError, Result};
use crate::sql::builder::{
    InsertMode, OrderBy, build_delete, build_insert, build_select, build_update,
};
use crate::sql::condition::ConditionExpression;
use crate::statement::{StatementCache, StatementKind};
use crate::types::{CompiledStatement, ParameterMap, Parameters, QueryResult, Row};

/// A single logical database connection
pub struct Connection<D: Driver> {
    driver: D,
    config: ConnectionConfig,
    statements: StatementCache<D::Handle>,
    cipher: Option<CipherCompat>,
    last_error: Option<String>,
}

impl Connection<MySqlDriver> {
    /// Connect to MySQL using `config.database_url`
    pub async fn connect(config: ConnectionConfig) -> Result<Self> {
        let driver = MySqlDriver::connect(&config).await?;
        Ok(Self::new(driver, config))
    }
}

impl<D: Driver> Connection<D> {
    /// Create a connection from an existing driver
    pub fn new(driver: D, config: ConnectionConfig) -> Self {
        Self {
            driver,
            config,
            statements: StatementCache::new(),
            cipher: None,
            last_error: None,
        }
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get a mutable reference to the driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Last execution error as `"<code>: <message>"`
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Number of cached prepared statements
    pub fn cached_statements(&self) -> usize {
        self.statements.len()
    }

    /// Drop every cached prepared statement
    pub fn clear_statement_cache(&mut self) {
        self.statements.clear();
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute raw SQL with named (`:name`) or positional (`?`) parameters
    ///
    /// The result is shaped by the statement's leading verb. Failures are
    /// recorded as [`last_error`](Self::last_error) and returned as
    /// [`DbError::Execution`].
    pub async fn query(
        &mut self,
        sql: &str,
        params: impl Into<Parameters>,
    ) -> Result<QueryResult> {
        let params = params.into();
        let sql = sql.trim();
        self.last_error = None;

        let handle = match self.prepare(sql).await {
            Ok(handle) => handle,
            Err(err) => return Err(self.record_failure(err)),
        };

        let kind = StatementKind::classify(sql);
        debug!(?kind, params = params.len(), "executing statement");

        match self.driver.execute(&handle, &params, kind).await {
            Ok(output) => Ok(kind.interpret(output, self.driver.last_insert_id())),
            Err(err) => Err(self.record_failure(err)),
        }
    }

    /// Execute a statement produced by one of the builders
    pub async fn execute(&mut self, statement: CompiledStatement) -> Result<QueryResult> {
        self.query(&statement.sql, statement.params).await
    }

    async fn prepare(&mut self, sql: &str) -> std::result::Result<D::Handle, DriverError> {
        if self.config.cache_statements {
            if let Some(handle) = self.statements.get(sql) {
                debug!("statement cache hit");
                return Ok(handle);
            }
        }

        debug!(sql, "preparing statement");
        let handle = self.driver.prepare(sql).await?;
        if self.config.cache_statements {
            self.statements.insert(sql, handle.clone());
        }
        Ok(handle)
    }

    fn record_failure(&mut self, err: DriverError) -> DbError {
        let message = err.to_string();
        warn!(error = %message, "statement failed");
        self.last_error = Some(message);
        err.into()
    }

    // =========================================================================
    // Statement Operations
    // =========================================================================

    /// `SELECT *` rows matching `condition`
    pub async fn select(
        &mut self,
        table: &str,
        condition: &ConditionExpression,
        order: Option<&OrderBy>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Row>> {
        let statement = build_select(table, condition, order, limit, offset)?;
        Ok(self.execute(statement).await?.into_rows())
    }

    /// Insert a row, returning the generated auto-increment id
    pub async fn insert(
        &mut self,
        table: &str,
        values: &ParameterMap,
        mode: InsertMode,
    ) -> Result<u64> {
        let statement = build_insert(table, values, mode)?;
        let result = self.execute(statement).await?;
        Ok(result.insert_id().unwrap_or_default())
    }

    /// Update matching rows, returning the affected row count
    pub async fn update(
        &mut self,
        table: &str,
        values: &ParameterMap,
        condition: &ConditionExpression,
        limit: u64,
    ) -> Result<u64> {
        let statement = build_update(table, values, condition, limit)?;
        let result = self.execute(statement).await?;
        Ok(result.affected().unwrap_or_default())
    }

    /// Delete matching rows, returning the affected row count
    pub async fn delete(
        &mut self,
        table: &str,
        condition: &ConditionExpression,
        limit: u64,
    ) -> Result<u64> {
        let statement = build_delete(table, condition, limit)?;
        let result = self.execute(statement).await?;
        Ok(result.affected().unwrap_or_default())
    }

    // =========================================================================
    // Encryption
    // =========================================================================

    fn cipher(&mut self) -> Result<&CipherCompat> {
        if self.cipher.is_none() {
            let raw = self
                .config
                .cipher_key
                .as_deref()
                .ok_or(DbError::MissingCipherKey)?;
            self.cipher = Some(CipherCompat::from_raw_key(raw, self.config.padding_mode));
        }
        self.cipher.as_ref().ok_or(DbError::MissingCipherKey)
    }

    /// Encrypt like MySQL `AES_ENCRYPT(value, key)`; `None` passes through
    pub fn encrypt<T: AsRef<[u8]>>(&mut self, plain: Option<T>) -> Result<Option<Vec<u8>>> {
        let plain: Option<&[u8]> = plain.as_ref().map(AsRef::as_ref);
        Ok(self.cipher()?.encrypt(plain))
    }

    /// Decrypt like MySQL `AES_DECRYPT(value, key)`; `None` passes through
    pub fn decrypt<T: AsRef<[u8]>>(
        &mut self,
        encrypted: Option<T>,
    ) -> Result<Option<Vec<u8>>> {
        let encrypted: Option<&[u8]> = encrypted.as_ref().map(AsRef::as_ref);
        self.cipher()?.decrypt(encrypted)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::driver::DriverOutput;
    use crate::types::Value;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Scripted in-memory driver
    #[derive(Default)]
    pub(crate) struct MockDriver {
        pub prepared: Vec<String>,
        pub executed: Vec<(usize, Parameters, StatementKind)>,
        pub responses: VecDeque<std::result::Result<DriverOutput, DriverError>>,
        pub prepare_error: Option<DriverError>,
        pub next_insert_id: u64,
        last_insert_id: u64,
    }

    impl MockDriver {
        pub fn respond(mut self, output: std::result::Result<DriverOutput, DriverError>) -> Self {
            self.responses.push_back(output);
            self
        }
    }

    impl Driver for MockDriver {
        type Handle = usize;

        async fn prepare(&mut self, sql: &str) -> std::result::Result<usize, DriverError> {
            if let Some(err) = self.prepare_error.clone() {
                return Err(err);
            }
            self.prepared.push(sql.to_string());
            Ok(self.prepared.len() - 1)
        }

        async fn execute(
            &mut self,
            handle: &usize,
            params: &Parameters,
            kind: StatementKind,
        ) -> std::result::Result<DriverOutput, DriverError> {
            self.executed.push((*handle, params.clone(), kind));
            let response = self
                .responses
                .pop_front()
                .unwrap_or(Ok(DriverOutput::Done { rows_affected: 0 }));
            if response.is_ok() && kind == StatementKind::Insert {
                self.next_insert_id += 1;
                self.last_insert_id = self.next_insert_id;
            }
            response
        }

        fn last_insert_id(&self) -> u64 {
            self.last_insert_id
        }
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig::builder("mysql://localhost/test")
            .cipher_key("secret")
            .build()
    }

    fn connection(driver: MockDriver) -> Connection<MockDriver> {
        Connection::new(driver, config())
    }

    // ==================== Statement Cache ====================

    #[tokio::test]
    async fn test_same_sql_reuses_handle() {
        let mut conn = connection(MockDriver::default());

        conn.select("t", &ConditionExpression::id(1), None, 0, 0).await.unwrap();
        conn.select("t", &ConditionExpression::id(2), None, 0, 0).await.unwrap();

        let driver = conn.driver_mut();
        assert_eq!(driver.prepared.len(), 1);
        assert_eq!(driver.executed.len(), 2);
        assert_eq!(driver.executed[0].0, driver.executed[1].0);
        assert_ne!(driver.executed[0].1, driver.executed[1].1);
        assert_eq!(conn.cached_statements(), 1);
    }

    #[tokio::test]
    async fn test_different_sql_gets_own_handle() {
        let mut conn = connection(MockDriver::default());

        conn.query("SELECT 1", Parameters::none()).await.unwrap();
        conn.query("SELECT 2", Parameters::none()).await.unwrap();
        conn.query("  SELECT 1  ", Parameters::none()).await.unwrap();

        assert_eq!(conn.driver_mut().prepared, vec!["SELECT 1", "SELECT 2"]);
        assert_eq!(conn.cached_statements(), 2);
    }

    #[tokio::test]
    async fn test_cache_disabled_prepares_every_time() {
        let config = ConnectionConfig::builder("mysql://localhost/test")
            .cache_statements(false)
            .build();
        let mut conn = Connection::new(MockDriver::default(), config);

        conn.query("SELECT 1", Parameters::none()).await.unwrap();
        conn.query("SELECT 1", Parameters::none()).await.unwrap();

        assert_eq!(conn.driver_mut().prepared.len(), 2);
        assert_eq!(conn.cached_statements(), 0);
    }

    #[tokio::test]
    async fn test_clear_statement_cache() {
        let mut conn = connection(MockDriver::default());
        conn.query("SELECT 1", Parameters::none()).await.unwrap();
        conn.clear_statement_cache();
        conn.query("SELECT 1", Parameters::none()).await.unwrap();
        assert_eq!(conn.driver_mut().prepared.len(), 2);
    }

    // ==================== Result Classification ====================

    #[tokio::test]
    async fn test_select_returns_rows() {
        let row: Row = [("id", Value::Int(1)), ("name", Value::from("a"))]
            .into_iter()
            .collect();
        let driver = MockDriver::default().respond(Ok(DriverOutput::Rows(vec![row.clone()])));
        let mut conn = connection(driver);

        let condition = ConditionExpression::parse(&json!(["name", "LIKE", "a%"])).unwrap();
        let rows = conn.select("users", &condition, None, 10, 0).await.unwrap();

        assert_eq!(rows, vec![row]);
        let driver = conn.driver_mut();
        assert_eq!(
            driver.prepared[0],
            "SELECT * FROM `users` WHERE `name` LIKE :_where_param_0 LIMIT 10"
        );
        assert_eq!(driver.executed[0].2, StatementKind::Query);
    }

    #[tokio::test]
    async fn test_insert_returns_insert_id() {
        let mut conn = connection(MockDriver::default());
        let values: ParameterMap = [("name", Value::from("bob"))].into_iter().collect();

        assert_eq!(conn.insert("users", &values, InsertMode::Simple).await.unwrap(), 1);
        assert_eq!(conn.insert("users", &values, InsertMode::Replace).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete_return_affected() {
        let driver = MockDriver::default()
            .respond(Ok(DriverOutput::Done { rows_affected: 3 }))
            .respond(Ok(DriverOutput::Done { rows_affected: 2 }));
        let mut conn = connection(driver);
        let values: ParameterMap = [("a", 1)].into_iter().collect();

        let updated = conn
            .update("t", &values, &ConditionExpression::All, 0)
            .await
            .unwrap();
        let deleted = conn.delete("t", &ConditionExpression::id(1), 0).await.unwrap();

        assert_eq!(updated, 3);
        assert_eq!(deleted, 2);
    }

    #[tokio::test]
    async fn test_other_statement_returns_success() {
        let mut conn = connection(MockDriver::default());
        let result = conn.query("SET NAMES utf8mb4", Parameters::none()).await.unwrap();
        assert_eq!(result, QueryResult::Success(true));
    }

    #[tokio::test]
    async fn test_lowercase_select_with_whitespace_is_row_returning() {
        let driver = MockDriver::default().respond(Ok(DriverOutput::Rows(Vec::new())));
        let mut conn = connection(driver);

        let result = conn.query("  select * from t", Parameters::none()).await.unwrap();

        assert_eq!(result, QueryResult::Rows(Vec::new()));
        assert_eq!(conn.driver_mut().executed[0].2, StatementKind::Query);
    }

    // ==================== Failures ====================

    #[tokio::test]
    async fn test_execution_failure_records_last_error() {
        let driver = MockDriver::default()
            .respond(Err(DriverError::new("23000", "Duplicate entry '1' for key 'PRIMARY'")));
        let mut conn = connection(driver);
        let values: ParameterMap = [("id", 1)].into_iter().collect();

        let err = conn.insert("t", &values, InsertMode::Simple).await.unwrap_err();

        assert!(matches!(err, DbError::Execution { ref code, .. } if code == "23000"));
        assert_eq!(
            conn.last_error(),
            Some("23000: Duplicate entry '1' for key 'PRIMARY'")
        );
    }

    #[tokio::test]
    async fn test_prepare_failure_records_last_error_and_is_not_cached() {
        let driver = MockDriver {
            prepare_error: Some(DriverError::new("42000", "You have an error in your SQL syntax")),
            ..Default::default()
        };
        let mut conn = connection(driver);

        let err = conn.query("SELEC 1", Parameters::none()).await.unwrap_err();

        assert!(matches!(err, DbError::Execution { .. }));
        assert_eq!(conn.last_error(), Some("42000: You have an error in your SQL syntax"));
        assert_eq!(conn.cached_statements(), 0);
    }

    #[tokio::test]
    async fn test_success_clears_last_error() {
        let driver = MockDriver::default().respond(Err(DriverError::new("HY000", "gone away")));
        let mut conn = connection(driver);

        assert!(conn.query("DO 1", Parameters::none()).await.is_err());
        assert!(conn.last_error().is_some());

        conn.query("DO 1", Parameters::none()).await.unwrap();
        assert!(conn.last_error().is_none());
    }

    #[tokio::test]
    async fn test_failure_is_not_retried() {
        let driver = MockDriver::default().respond(Err(DriverError::new("HY000", "gone away")));
        let mut conn = connection(driver);

        assert!(conn.query("DO 1", Parameters::none()).await.is_err());
        assert_eq!(conn.driver_mut().executed.len(), 1);
    }

    #[tokio::test]
    async fn test_no_columns_never_reaches_driver() {
        let mut conn = connection(MockDriver::default());
        let values: ParameterMap = [("``", 1)].into_iter().collect();

        let err = conn.insert("t", &values, InsertMode::Simple).await.unwrap_err();
        assert!(matches!(err, DbError::NoColumns(_)));

        let err = conn
            .update("t", &values, &ConditionExpression::All, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NoColumns(_)));

        assert!(conn.driver_mut().prepared.is_empty());
        assert!(conn.last_error().is_none());
    }

    #[tokio::test]
    async fn test_malformed_condition_never_reaches_driver() {
        let mut conn = connection(MockDriver::default());
        let err = conn
            .delete("t", &ConditionExpression::eq("", 1), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::MalformedCondition(_)));
        assert!(conn.driver_mut().prepared.is_empty());
    }

    // ==================== Encryption ====================

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let mut conn = connection(MockDriver::default());

        let encrypted = conn.encrypt(Some("4111 1111 1111 1111")).unwrap().unwrap();
        assert_eq!(encrypted.len(), 32);

        let decrypted = conn.decrypt(Some(&encrypted)).unwrap().unwrap();
        assert_eq!(decrypted, b"4111 1111 1111 1111");
    }

    #[test]
    fn test_encrypt_null_passes_through() {
        let mut conn = connection(MockDriver::default());
        assert!(conn.encrypt(None::<&[u8]>).unwrap().is_none());
        assert!(conn.decrypt(None::<Vec<u8>>).unwrap().is_none());
    }

    #[test]
    fn test_encrypt_without_key_fails() {
        let config = ConnectionConfig::builder("mysql://localhost/test").build();
        let mut conn = Connection::new(MockDriver::default(), config);

        let err = conn.encrypt(Some("x")).unwrap_err();
        assert!(matches!(err, DbError::MissingCipherKey));
    }
}
