//! Prepared statement cache and result interpretation
//!
//! Statements are keyed by the SHA-256 of their trimmed SQL text. Results are
//! shaped by the statement's leading verb.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::driver::DriverOutput;
use crate::types::QueryResult;

/// Statement class derived from the leading SQL verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// INSERT / REPLACE
    Insert,
    /// UPDATE / DELETE
    Modify,
    /// SELECT / SHOW / EXPLAIN / DESCRIBE
    Query,
    Other,
}

impl StatementKind {
    /// Classify by leading verb, ignoring case and leading whitespace
    pub fn classify(sql: &str) -> Self {
        let verb = sql
            .trim_start()
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        match verb.as_str() {
            "INSERT" | "REPLACE" => StatementKind::Insert,
            "UPDATE" | "DELETE" => StatementKind::Modify,
            "SELECT" | "SHOW" | "EXPLAIN" | "DESCRIBE" | "DESC" => StatementKind::Query,
            _ => StatementKind::Other,
        }
    }

    pub fn returns_rows(&self) -> bool {
        *self == StatementKind::Query
    }

    /// Convert raw driver output into the caller-visible result
    pub fn interpret(&self, output: DriverOutput, last_insert_id: u64) -> QueryResult {
        match self {
            StatementKind::Insert => QueryResult::InsertId(last_insert_id),
            StatementKind::Modify => QueryResult::Affected(match output {
                DriverOutput::Done { rows_affected } => rows_affected,
                DriverOutput::Rows(_) => 0,
            }),
            StatementKind::Query => QueryResult::Rows(match output {
                DriverOutput::Rows(rows) => rows,
                DriverOutput::Done { .. } => Vec::new(),
            }),
            StatementKind::Other => QueryResult::Success(true),
        }
    }
}

/// Content hash of the trimmed SQL text
pub fn statement_signature(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.trim().as_bytes()))
}

/// Prepared handles keyed by statement signature
///
/// Collisions are not handled: equal signatures are trusted to mean equal SQL.
#[derive(Debug)]
pub struct StatementCache<H> {
    handles: HashMap<String, H>,
}

impl<H> Default for StatementCache<H> {
    fn default() -> Self {
        Self {
            handles: HashMap::new(),
        }
    }
}

impl<H: Clone> StatementCache<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sql: &str) -> Option<H> {
        self.handles.get(&statement_signature(sql)).cloned()
    }

    pub fn insert(&mut self, sql: &str, handle: H) {
        self.handles.insert(statement_signature(sql), handle);
    }

    pub fn contains(&self, sql: &str) -> bool {
        self.handles.contains_key(&statement_signature(sql))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn clear(&mut self) {
        self.handles.clear();
    }
}
