//! SQL Identifier Sanitization Utilities
//!
//! Table and column names are cleaned by stripping the MySQL identifier quote
//! character (backtick) and surrounding whitespace. This is quote stripping
//! only: there is no length or charset validation.

use regex::Regex;
use std::sync::LazyLock;

/// MySQL identifier quote character
pub const IDENTIFIER_QUOTE: char = '`';

static PLACEHOLDER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// Strip backticks and surrounding whitespace from an identifier
///
/// When `quote` is true the result is wrapped in backticks.
///
/// # Example
/// ```
/// use runtara_mysql_access::sql::sanitize_identifier;
///
/// assert_eq!(sanitize_identifier(" my`table ", false), "mytable");
/// assert_eq!(sanitize_identifier("users", true), "`users`");
/// ```
pub fn sanitize_identifier(name: &str, quote: bool) -> String {
    let stripped: String = name.chars().filter(|c| *c != IDENTIFIER_QUOTE).collect();
    let trimmed = stripped.trim();
    if quote {
        format!("{q}{trimmed}{q}", q = IDENTIFIER_QUOTE)
    } else {
        trimmed.to_string()
    }
}

/// Sanitize an identifier and wrap it in backticks
pub fn quote_identifier(name: &str) -> String {
    sanitize_identifier(name, true)
}

/// Whether a sanitized name can be used directly as a `:name` placeholder
pub fn is_placeholder_name(name: &str) -> bool {
    PLACEHOLDER_NAME.is_match(name)
}
