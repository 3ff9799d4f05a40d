//! Statement builders for SELECT, INSERT/REPLACE, UPDATE and DELETE
//!
//! Every builder returns a [`CompiledStatement`]: the SQL text with `:name`
//! placeholders plus the parameters to bind. WHERE parameters use the
//! `_where_param_` prefix, so they never collide with value parameters.

use std::collections::HashSet;

use crate::error::{DbError, Result};
use crate::sql::condition::{ConditionExpression, WHERE_PARAM_PREFIX, compile_where};
use crate::sql::sanitize::{is_placeholder_name, quote_identifier, sanitize_identifier};
use crate::types::{CompiledStatement, ParameterMap, Value};

/// Prefix for value parameters whose column name cannot be a placeholder
pub const VALUE_PARAM_PREFIX: &str = "_value_param_";

/// How an INSERT treats existing rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertMode {
    /// `INSERT INTO`
    #[default]
    Simple,
    /// `REPLACE INTO`
    Replace,
    /// `INSERT INTO ... ON DUPLICATE KEY UPDATE col = VALUES(col), ...`
    Update,
}

/// ORDER BY specification
#[derive(Debug, Clone, PartialEq)]
pub enum OrderBy {
    /// Inserted verbatim after `ORDER BY`
    Raw(String),
    /// Column/direction pairs; directions other than DESC sort ascending
    Columns(Vec<(String, String)>),
}

impl OrderBy {
    pub fn raw(sql: impl Into<String>) -> Self {
        OrderBy::Raw(sql.into())
    }

    pub fn columns<K, D>(columns: impl IntoIterator<Item = (K, D)>) -> Self
    where
        K: Into<String>,
        D: Into<String>,
    {
        OrderBy::Columns(
            columns
                .into_iter()
                .map(|(k, d)| (k.into(), d.into()))
                .collect(),
        )
    }

    pub fn asc(column: impl Into<String>) -> Self {
        OrderBy::Columns(vec![(column.into(), "ASC".to_string())])
    }

    pub fn desc(column: impl Into<String>) -> Self {
        OrderBy::Columns(vec![(column.into(), "DESC".to_string())])
    }

    /// Build the clause without the `ORDER BY` prefix, `None` when empty
    pub fn to_sql(&self) -> Option<String> {
        let clause = match self {
            OrderBy::Raw(sql) => sql.trim().to_string(),
            OrderBy::Columns(columns) => columns
                .iter()
                .filter(|(column, _)| !sanitize_identifier(column, false).is_empty())
                .map(|(column, direction)| {
                    format!("{} {}", quote_identifier(column), normalize_direction(direction))
                })
                .collect::<Vec<_>>()
                .join(", "),
        };
        (!clause.is_empty()).then_some(clause)
    }
}

fn normalize_direction(direction: &str) -> &'static str {
    if direction.trim().eq_ignore_ascii_case("DESC") {
        "DESC"
    } else {
        "ASC"
    }
}

/// Column list entry: quoted column, placeholder name, bound value
struct ValueColumn {
    column: String,
    placeholder: String,
    value: Value,
}

/// Sanitize value columns, dropping the ones that end up empty
fn value_columns(values: &ParameterMap) -> Vec<ValueColumn> {
    let mut taken = HashSet::new();
    let mut columns = Vec::with_capacity(values.len());

    for (i, (name, value)) in values.iter().enumerate() {
        let column = sanitize_identifier(name, false);
        if column.is_empty() {
            continue;
        }

        let placeholder = if is_placeholder_name(&column)
            && !column.starts_with(WHERE_PARAM_PREFIX)
            && !column.starts_with(VALUE_PARAM_PREFIX)
            && !taken.contains(&column)
        {
            column.clone()
        } else {
            format!("{}{}", VALUE_PARAM_PREFIX, i)
        };
        taken.insert(placeholder.clone());

        columns.push(ValueColumn {
            column: quote_identifier(&column),
            placeholder,
            value: value.clone(),
        });
    }

    columns
}

fn limit_clause(limit: u64) -> String {
    if limit > 0 {
        format!(" LIMIT {}", limit)
    } else {
        String::new()
    }
}

/// `SELECT * FROM <table> WHERE <condition> [ORDER BY ..] [LIMIT n] [OFFSET n]`
pub fn build_select(
    table: &str,
    condition: &ConditionExpression,
    order: Option<&OrderBy>,
    limit: u64,
    offset: u64,
) -> Result<CompiledStatement> {
    let (where_clause, params) = compile_where(condition)?;

    let mut sql = format!(
        "SELECT * FROM {} WHERE {}",
        quote_identifier(table),
        where_clause
    );
    if let Some(order_by) = order.and_then(OrderBy::to_sql) {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_by);
    }
    if offset > 0 {
        // MySQL only accepts OFFSET after a LIMIT
        let limit = if limit > 0 { limit } else { u64::MAX };
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
    } else {
        sql.push_str(&limit_clause(limit));
    }

    Ok(CompiledStatement { sql, params })
}

/// `INSERT INTO`, `REPLACE INTO` or `INSERT .. ON DUPLICATE KEY UPDATE`
///
/// Fails with [`DbError::NoColumns`] when no column survives sanitization.
pub fn build_insert(
    table: &str,
    values: &ParameterMap,
    mode: InsertMode,
) -> Result<CompiledStatement> {
    let columns = value_columns(values);
    if columns.is_empty() {
        return Err(DbError::NoColumns(sanitize_identifier(table, false)));
    }

    let verb = match mode {
        InsertMode::Simple | InsertMode::Update => "INSERT INTO",
        InsertMode::Replace => "REPLACE INTO",
    };

    let column_names = columns.iter().map(|c| c.column.as_str()).collect::<Vec<_>>();
    let placeholders = columns
        .iter()
        .map(|c| format!(":{}", c.placeholder))
        .collect::<Vec<_>>();

    let mut sql = format!(
        "{} {} ({}) VALUES ({})",
        verb,
        quote_identifier(table),
        column_names.join(", "),
        placeholders.join(", ")
    );

    if mode == InsertMode::Update {
        let updates = column_names
            .iter()
            .map(|column| format!("{} = VALUES({})", column, column))
            .collect::<Vec<_>>();
        sql.push_str(" ON DUPLICATE KEY UPDATE ");
        sql.push_str(&updates.join(", "));
    }

    let params = columns
        .into_iter()
        .map(|c| (c.placeholder, c.value))
        .collect();

    Ok(CompiledStatement { sql, params })
}

/// `UPDATE <table> SET col = :col, .. WHERE <condition> [LIMIT n]`
///
/// Fails with [`DbError::NoColumns`] when no column survives sanitization.
pub fn build_update(
    table: &str,
    values: &ParameterMap,
    condition: &ConditionExpression,
    limit: u64,
) -> Result<CompiledStatement> {
    let columns = value_columns(values);
    if columns.is_empty() {
        return Err(DbError::NoColumns(sanitize_identifier(table, false)));
    }

    let (where_clause, where_params) = compile_where(condition)?;

    let set_clauses = columns
        .iter()
        .map(|c| format!("{} = :{}", c.column, c.placeholder))
        .collect::<Vec<_>>();

    let sql = format!(
        "UPDATE {} SET {} WHERE {}{}",
        quote_identifier(table),
        set_clauses.join(", "),
        where_clause,
        limit_clause(limit)
    );

    let mut params: ParameterMap = columns
        .into_iter()
        .map(|c| (c.placeholder, c.value))
        .collect();
    params.extend(where_params);

    Ok(CompiledStatement { sql, params })
}

/// `DELETE FROM <table> WHERE <condition> [LIMIT n]`
pub fn build_delete(
    table: &str,
    condition: &ConditionExpression,
    limit: u64,
) -> Result<CompiledStatement> {
    let (where_clause, params) = compile_where(condition)?;

    let sql = format!(
        "DELETE FROM {} WHERE {}{}",
        quote_identifier(table),
        where_clause,
        limit_clause(limit)
    );

    Ok(CompiledStatement { sql, params })
}
