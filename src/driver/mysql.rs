//! `sqlx` MySQL driver
//!
//! MySQL only understands positional `?` placeholders, so `:name`
//! placeholders are rewritten at prepare time and the handle remembers the
//! order in which names have to be bound.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use sqlx::mysql::types::MySqlTime;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnection, MySqlRow, MySqlStatement};
use sqlx::{Column, Connection as _, Executor, Row as _, Statement, TypeInfo, ValueRef};

use crate::config::ConnectionConfig;
use crate::driver::{Driver, DriverError, DriverOutput, INVALID_PARAMETER};
use crate::error::{DbError, Result};
use crate::statement::StatementKind;
use crate::types::{Parameters, Row, Value};

/// Quoted strings, quoted identifiers and comments are skipped; only group 1
/// is a placeholder.
static NAMED_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*"|`[^`]*`|--[^\n]*|#[^\n]*|/\*.*?\*/|:([A-Za-z_][A-Za-z0-9_]*)"#,
    )
    .expect("valid regex")
});

/// Rewrite `:name` placeholders to `?`, returning the names in bind order
pub fn rewrite_named_placeholders(sql: &str) -> (String, Vec<String>) {
    let mut rewritten = String::with_capacity(sql.len());
    let mut names = Vec::new();
    let mut last = 0;

    for caps in NAMED_PLACEHOLDER.captures_iter(sql) {
        let Some(name) = caps.get(1) else {
            continue;
        };
        // The leading ':' sits right before the captured name
        rewritten.push_str(&sql[last..name.start() - 1]);
        rewritten.push('?');
        names.push(name.as_str().to_string());
        last = name.end();
    }
    rewritten.push_str(&sql[last..]);

    (rewritten, names)
}

/// Prepared MySQL statement plus the named parameters it expects
#[derive(Debug, Clone)]
pub struct MySqlHandle {
    statement: MySqlStatement<'static>,
    names: Arc<[String]>,
}

impl MySqlHandle {
    /// Values in positional order for this statement
    fn ordered_values<'a>(
        &self,
        params: &'a Parameters,
    ) -> std::result::Result<Vec<&'a Value>, DriverError> {
        match params {
            Parameters::Named(map) => self
                .names
                .iter()
                .map(|name| {
                    map.get(name).ok_or_else(|| {
                        DriverError::new(
                            INVALID_PARAMETER,
                            format!("no value bound for parameter :{}", name),
                        )
                    })
                })
                .collect(),
            Parameters::Positional(values) if self.names.is_empty() => Ok(values.iter().collect()),
            Parameters::Positional(_) => Err(DriverError::new(
                INVALID_PARAMETER,
                "positional parameters given for a statement with named placeholders",
            )),
        }
    }
}

/// MySQL driver over a single `sqlx` connection
pub struct MySqlDriver {
    conn: MySqlConnection,
    last_insert_id: u64,
}

impl MySqlDriver {
    /// Open a connection to `config.database_url`
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn = MySqlConnection::connect(&config.database_url)
            .await
            .map_err(|e| DbError::Connection(format!("Database connection failed: {}", e)))?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already established connection
    pub fn from_connection(conn: MySqlConnection) -> Self {
        Self {
            conn,
            last_insert_id: 0,
        }
    }

    /// Get a mutable reference to the underlying connection
    pub fn connection(&mut self) -> &mut MySqlConnection {
        &mut self.conn
    }

    /// Close the connection gracefully
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

impl Driver for MySqlDriver {
    type Handle = MySqlHandle;

    async fn prepare(&mut self, sql: &str) -> std::result::Result<MySqlHandle, DriverError> {
        let (positional, names) = rewrite_named_placeholders(sql);
        let prepared = (&mut self.conn).prepare(&positional).await?;
        let statement = Statement::to_owned(&prepared);
        Ok(MySqlHandle {
            statement,
            names: names.into(),
        })
    }

    async fn execute(
        &mut self,
        handle: &MySqlHandle,
        params: &Parameters,
        kind: StatementKind,
    ) -> std::result::Result<DriverOutput, DriverError> {
        let values = handle.ordered_values(params)?;

        let mut query = handle.statement.query();
        for value in values {
            query = bind_value(query, value);
        }

        if kind.returns_rows() {
            let rows = query.fetch_all(&mut self.conn).await?;
            let rows = rows.iter().map(decode_row).collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(DriverOutput::Rows(rows))
        } else {
            let done = query.execute(&mut self.conn).await?;
            self.last_insert_id = done.last_insert_id();
            Ok(DriverOutput::Done {
                rows_affected: done.rows_affected(),
            })
        }
    }

    fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    value: &Value,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::UInt(u) => query.bind(*u),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
    }
}

fn decode_row(row: &MySqlRow) -> std::result::Result<Row, sqlx::Error> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name())?;
        decoded.push(column.name(), value);
    }
    Ok(decoded)
}

fn decode_column(
    row: &MySqlRow,
    index: usize,
    type_name: &str,
) -> std::result::Result<Value, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOLEAN" => Value::Bool(row.try_get(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            Value::Int(row.try_get::<i64, _>(index)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => Value::UInt(row.try_get::<u64, _>(index)?),
        "YEAR" => Value::UInt(row.try_get_unchecked::<u16, _>(index)?.into()),
        "FLOAT" => Value::Float(row.try_get::<f32, _>(index)?.into()),
        "DOUBLE" => Value::Float(row.try_get::<f64, _>(index)?),
        "DECIMAL" => Value::Text(row.try_get::<rust_decimal::Decimal, _>(index)?.to_string()),
        "DATE" => Value::Text(row.try_get::<chrono::NaiveDate, _>(index)?.to_string()),
        "DATETIME" => Value::Text(row.try_get::<chrono::NaiveDateTime, _>(index)?.to_string()),
        // NaiveTime covers the clock range; MySqlTime handles negative and long durations
        "TIME" => match row.try_get::<chrono::NaiveTime, _>(index) {
            Ok(time) => Value::Text(time.to_string()),
            Err(_) => Value::Text(row.try_get::<MySqlTime, _>(index)?.to_string()),
        },
        "TIMESTAMP" => Value::Text(
            row.try_get::<chrono::DateTime<chrono::Utc>, _>(index)?
                .to_rfc3339(),
        ),
        "JSON" => Value::Text(row.try_get::<serde_json::Value, _>(index)?.to_string()),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => match row.try_get::<String, _>(index) {
            Ok(text) => Value::Text(text),
            Err(_) => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        },
    };
    Ok(value)
}
