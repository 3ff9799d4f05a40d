//! Condition building for SQL WHERE clauses
//!
//! A [`ConditionExpression`] is either built directly with the constructor
//! helpers or parsed from the JSON array grammar:
//!
//! ```text
//! Expr := RawString
//!       | []                              -- matches all rows
//!       | [ "AND"|"OR", Expr, Expr, ... ]
//!       | [ column, value ]               -- shortcut: = or IN
//!       | [ column, operator, value(s)... ]
//!       | number | numeric-string         -- shortcut: id = value
//! ```
//!
//! Compilation produces SQL text with `:_where_param_N` placeholders and the
//! matching [`ParameterMap`].

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value as Json;

use crate::error::{DbError, Result};
use crate::sql::sanitize::sanitize_identifier;
use crate::types::{ParameterMap, Value};

/// Prefix of every parameter generated for a WHERE clause
pub const WHERE_PARAM_PREFIX: &str = "_where_param_";

static NUMERIC_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?$")
        .expect("valid regex")
});

/// Boolean connective of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.eq_ignore_ascii_case("AND") {
            Some(LogicalOperator::And)
        } else if token.eq_ignore_ascii_case("OR") {
            Some(LogicalOperator::Or)
        } else {
            None
        }
    }
}

/// Binary operators taking exactly one bound value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    /// `!=`
    Ne,
    /// `<>`
    NotEq,
    /// `<=>` (NULL-safe equality)
    NullSafeEq,
    Lte,
    Gte,
    Lt,
    Gt,
    Like,
    NotLike,
    RLike,
    NotRLike,
}

impl ComparisonOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::Ne => "!=",
            ComparisonOperator::NotEq => "<>",
            ComparisonOperator::NullSafeEq => "<=>",
            ComparisonOperator::Lte => "<=",
            ComparisonOperator::Gte => ">=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Like => "LIKE",
            ComparisonOperator::NotLike => "NOT LIKE",
            ComparisonOperator::RLike => "RLIKE",
            ComparisonOperator::NotRLike => "NOT RLIKE",
        }
    }
}

/// Every operator accepted in the `[column, operator, value(s)...]` form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperatorToken {
    Compare(ComparisonOperator),
    IsNull { negated: bool },
    Between { negated: bool },
    In { negated: bool },
}

impl FromStr for OperatorToken {
    type Err = DbError;

    fn from_str(token: &str) -> Result<Self> {
        let normalized = token
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();

        let parsed = match normalized.as_str() {
            "=" => OperatorToken::Compare(ComparisonOperator::Eq),
            "!=" => OperatorToken::Compare(ComparisonOperator::Ne),
            "<>" => OperatorToken::Compare(ComparisonOperator::NotEq),
            "<=>" => OperatorToken::Compare(ComparisonOperator::NullSafeEq),
            "<=" => OperatorToken::Compare(ComparisonOperator::Lte),
            ">=" => OperatorToken::Compare(ComparisonOperator::Gte),
            "<" => OperatorToken::Compare(ComparisonOperator::Lt),
            ">" => OperatorToken::Compare(ComparisonOperator::Gt),
            "LIKE" => OperatorToken::Compare(ComparisonOperator::Like),
            "NOT LIKE" => OperatorToken::Compare(ComparisonOperator::NotLike),
            "RLIKE" => OperatorToken::Compare(ComparisonOperator::RLike),
            "NOT RLIKE" => OperatorToken::Compare(ComparisonOperator::NotRLike),
            "IS NULL" => OperatorToken::IsNull { negated: false },
            "IS NOT NULL" => OperatorToken::IsNull { negated: true },
            "BETWEEN" => OperatorToken::Between { negated: false },
            "NOT BETWEEN" => OperatorToken::Between { negated: true },
            "IN" => OperatorToken::In { negated: false },
            "NOT IN" => OperatorToken::In { negated: true },
            _ => return Err(DbError::InvalidOperator(token.trim().to_string())),
        };
        Ok(parsed)
    }
}

/// A recursive WHERE condition
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConditionExpression {
    /// No restriction, compiles to `1`
    #[default]
    All,
    /// Opaque SQL fragment, inserted verbatim without parameters
    Raw(String),
    Group {
        op: LogicalOperator,
        children: Vec<ConditionExpression>,
    },
    Compare {
        column: String,
        op: ComparisonOperator,
        value: Value,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    Between {
        column: String,
        negated: bool,
        low: Value,
        high: Value,
    },
    In {
        column: String,
        negated: bool,
        values: Vec<Value>,
    },
}

impl ConditionExpression {
    pub fn raw(sql: impl Into<String>) -> Self {
        ConditionExpression::Raw(sql.into())
    }

    pub fn and(children: Vec<ConditionExpression>) -> Self {
        ConditionExpression::Group {
            op: LogicalOperator::And,
            children,
        }
    }

    pub fn or(children: Vec<ConditionExpression>) -> Self {
        ConditionExpression::Group {
            op: LogicalOperator::Or,
            children,
        }
    }

    pub fn compare(
        column: impl Into<String>,
        op: ComparisonOperator,
        value: impl Into<Value>,
    ) -> Self {
        ConditionExpression::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Equality shortcut; a NULL value becomes `IS NULL`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Null => Self::is_null(column),
            value => Self::compare(column, ComparisonOperator::Eq, value),
        }
    }

    /// `id = value`
    pub fn id(value: impl Into<Value>) -> Self {
        Self::eq("id", value)
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        ConditionExpression::IsNull {
            column: column.into(),
            negated: false,
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        ConditionExpression::IsNull {
            column: column.into(),
            negated: true,
        }
    }

    pub fn between(
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        ConditionExpression::Between {
            column: column.into(),
            negated: false,
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn not_between(
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        ConditionExpression::Between {
            column: column.into(),
            negated: true,
            low: low.into(),
            high: high.into(),
        }
    }

    /// Explicit IN list; an empty list matches nothing
    pub fn in_list(column: impl Into<String>, values: Vec<Value>) -> Self {
        ConditionExpression::In {
            column: column.into(),
            negated: false,
            values,
        }
    }

    /// Explicit NOT IN list; an empty list matches everything
    pub fn not_in(column: impl Into<String>, values: Vec<Value>) -> Self {
        ConditionExpression::In {
            column: column.into(),
            negated: true,
            values,
        }
    }

    /// `[column, list]` shortcut: IN, or no restriction for an empty list
    pub fn any_of(column: impl Into<String>, values: Vec<Value>) -> Self {
        if values.is_empty() {
            ConditionExpression::All
        } else {
            Self::in_list(column, values)
        }
    }

    /// Parse the JSON array grammar into an expression
    pub fn parse(expr: &Json) -> Result<Self> {
        match expr {
            Json::Null => Ok(ConditionExpression::All),
            Json::Number(n) if n.is_i64() || n.is_u64() => Ok(Self::id(expr.clone())),
            Json::Number(n) => Ok(Self::id(float_id(n.as_f64().unwrap_or(f64::NAN)))),
            Json::String(s) if NUMERIC_LITERAL.is_match(s.trim()) => {
                Ok(Self::id(numeric_string_id(s.trim())))
            }
            Json::String(s) if s.trim().is_empty() => Ok(ConditionExpression::All),
            Json::String(s) => Ok(ConditionExpression::Raw(s.clone())),
            Json::Array(items) => Self::parse_array(items),
            Json::Object(_) => Err(DbError::malformed(
                "condition must be an array or a scalar, got an object",
            )),
            other => Ok(ConditionExpression::Raw(other.to_string())),
        }
    }

    fn parse_array(items: &[Json]) -> Result<Self> {
        let Some(first) = items.first() else {
            return Ok(ConditionExpression::All);
        };

        if let Some(op) = first.as_str().and_then(LogicalOperator::from_token) {
            let children = items[1..]
                .iter()
                .map(Self::parse)
                .collect::<Result<Vec<_>>>()?;
            return Ok(ConditionExpression::Group { op, children });
        }

        let column = first.as_str().ok_or_else(|| {
            DbError::malformed(format!("column name must be a string, got {}", first))
        })?;

        match items.len() {
            1 => Err(DbError::missing_arguments(format!(
                "condition on '{}' has no value",
                column
            ))),
            2 => Self::parse_shortcut(column, &items[1]),
            _ => Self::parse_operator_form(column, &items[1], &items[2..]),
        }
    }

    fn parse_shortcut(column: &str, value: &Json) -> Result<Self> {
        match value {
            Json::Array(values) => {
                let values = values.iter().map(scalar_value).collect::<Result<Vec<_>>>()?;
                Ok(Self::any_of(column, values))
            }
            Json::String(s) => match null_check_literal(s) {
                Some(true) => Ok(Self::is_not_null(column)),
                Some(false) => Ok(Self::is_null(column)),
                None => Ok(Self::eq(column, s.as_str())),
            },
            Json::Object(_) => Err(DbError::missing_arguments(format!(
                "condition on '{}' needs an operator and a value",
                column
            ))),
            scalar => Ok(Self::eq(column, scalar.clone())),
        }
    }

    fn parse_operator_form(column: &str, op: &Json, operands: &[Json]) -> Result<Self> {
        let token = op.as_str().ok_or_else(|| {
            DbError::malformed(format!("operator for '{}' must be a string, got {}", column, op))
        })?;

        match token.parse::<OperatorToken>()? {
            OperatorToken::Compare(op) => match operands {
                [value] => Ok(Self::compare(column, op, scalar_value(value)?)),
                _ => Err(DbError::malformed(format!(
                    "operator '{}' takes exactly one value, got {}",
                    op.as_sql(),
                    operands.len()
                ))),
            },
            OperatorToken::IsNull { negated } => Ok(ConditionExpression::IsNull {
                column: column.to_string(),
                negated,
            }),
            OperatorToken::Between { negated } => match operands {
                [low, high] => Ok(ConditionExpression::Between {
                    column: column.to_string(),
                    negated,
                    low: scalar_value(low)?,
                    high: scalar_value(high)?,
                }),
                _ => Err(DbError::missing_arguments(format!(
                    "BETWEEN on '{}' requires exactly two values, got {}",
                    column,
                    operands.len()
                ))),
            },
            OperatorToken::In { negated } => {
                let candidates = match operands {
                    [Json::Array(list)] => list.as_slice(),
                    tail => tail,
                };
                let values = candidates
                    .iter()
                    .map(scalar_value)
                    .collect::<Result<Vec<_>>>()?;
                Ok(ConditionExpression::In {
                    column: column.to_string(),
                    negated,
                    values,
                })
            }
        }
    }
}

impl From<i64> for ConditionExpression {
    fn from(id: i64) -> Self {
        ConditionExpression::id(id)
    }
}

impl TryFrom<&Json> for ConditionExpression {
    type Error = DbError;

    fn try_from(expr: &Json) -> Result<Self> {
        ConditionExpression::parse(expr)
    }
}

/// Integral floats bind as integers; `7.0` must restrict `id` like `7`
fn float_id(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Value::Int(f as i64)
    } else {
        Value::Float(f)
    }
}

fn numeric_string_id(literal: &str) -> Value {
    if let Ok(id) = literal.parse::<i64>() {
        return Value::Int(id);
    }
    let unsigned = literal.trim_start_matches('+');
    // Out-of-range integers keep their digits; the engine compares them exactly
    if unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return Value::from(unsigned);
    }
    match literal.parse::<f64>() {
        Ok(f) => float_id(f),
        Err(_) => Value::from(unsigned),
    }
}

/// `Some(negated)` when the string is an `IS [NOT] NULL` literal
fn null_check_literal(s: &str) -> Option<bool> {
    let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
    match normalized.to_uppercase().as_str() {
        "IS NULL" => Some(false),
        "IS NOT NULL" => Some(true),
        _ => None,
    }
}

fn scalar_value(value: &Json) -> Result<Value> {
    match value {
        Json::Array(_) | Json::Object(_) => Err(DbError::malformed(format!(
            "expected a scalar value, got {}",
            value
        ))),
        scalar => Ok(Value::from(scalar.clone())),
    }
}

/// Build SQL WHERE clause from a ConditionExpression
///
/// Returns (clause, params) where every generated parameter is named
/// `_where_param_N`. `counter` is the next free N and is advanced past every
/// parameter produced, so nested groups never reuse a name.
pub fn build_condition_clause(
    condition: &ConditionExpression,
    counter: &mut usize,
) -> Result<(String, ParameterMap)> {
    let mut params = ParameterMap::new();
    let clause = compile_into(condition, counter, &mut params)?;
    Ok((clause, params))
}

/// Compile a WHERE clause with parameter numbering starting at zero
pub fn compile_where(condition: &ConditionExpression) -> Result<(String, ParameterMap)> {
    let mut counter = 0;
    build_condition_clause(condition, &mut counter)
}

fn compile_into(
    condition: &ConditionExpression,
    counter: &mut usize,
    params: &mut ParameterMap,
) -> Result<String> {
    match condition {
        ConditionExpression::All => Ok("1".to_string()),
        ConditionExpression::Raw(sql) => Ok(sql.clone()),
        ConditionExpression::Group { op, children } => {
            if children.is_empty() {
                return Ok("1".to_string());
            }
            let mut clauses = Vec::with_capacity(children.len());
            for child in children {
                let clause = compile_into(child, counter, params)?;
                clauses.push(format!("({})", clause));
            }
            Ok(clauses.join(&format!(" {} ", op.as_sql())))
        }
        ConditionExpression::Compare { column, op, value } => {
            let column = column_sql(column)?;
            let param = bind(counter, params, value.clone());
            Ok(format!("{} {} :{}", column, op.as_sql(), param))
        }
        ConditionExpression::IsNull { column, negated } => {
            let column = column_sql(column)?;
            let check = if *negated { "IS NOT NULL" } else { "IS NULL" };
            Ok(format!("{} {}", column, check))
        }
        ConditionExpression::Between {
            column,
            negated,
            low,
            high,
        } => {
            let column = column_sql(column)?;
            let low = bind(counter, params, low.clone());
            let high = bind(counter, params, high.clone());
            let op = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
            Ok(format!("{} {} :{} AND :{}", column, op, low, high))
        }
        ConditionExpression::In {
            column,
            negated,
            values,
        } => {
            let column = column_sql(column)?;
            if values.is_empty() {
                // Nothing is IN an empty set, everything is NOT IN it
                return Ok(if *negated { "1" } else { "0" }.to_string());
            }
            let placeholders = values
                .iter()
                .map(|v| format!(":{}", bind(counter, params, v.clone())))
                .collect::<Vec<_>>();
            let op = if *negated { "NOT IN" } else { "IN" };
            Ok(format!("{} {} ({})", column, op, placeholders.join(", ")))
        }
    }
}

fn column_sql(column: &str) -> Result<String> {
    if sanitize_identifier(column, false).is_empty() {
        return Err(DbError::malformed(format!(
            "column name '{}' is empty after sanitization",
            column
        )));
    }
    Ok(sanitize_identifier(column, true))
}

fn bind(counter: &mut usize, params: &mut ParameterMap, value: Value) -> String {
    let name = format!("{}{}", WHERE_PARAM_PREFIX, counter);
    *counter += 1;
    params.insert(name.clone(), value);
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile_json(expr: Json) -> Result<(String, ParameterMap)> {
        compile_where(&ConditionExpression::parse(&expr)?)
    }

    // ==================== Empty / Raw / Shortcuts ====================

    #[test]
    fn test_empty_expression() {
        let (clause, params) = compile_json(json!([])).unwrap();
        assert_eq!(clause, "1");
        assert!(params.is_empty());
    }

    #[test]
    fn test_null_expression_matches_all() {
        let (clause, params) = compile_json(json!(null)).unwrap();
        assert_eq!(clause, "1");
        assert!(params.is_empty());
    }

    #[test]
    fn test_blank_string_matches_all() {
        let (clause, _) = compile_json(json!("  ")).unwrap();
        assert_eq!(clause, "1");
    }

    #[test]
    fn test_raw_string() {
        let (clause, params) = compile_json(json!("deleted_at IS NULL")).unwrap();
        assert_eq!(clause, "deleted_at IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_integer_id_shortcut() {
        let (clause, params) = compile_json(json!(42)).unwrap();
        assert_eq!(clause, "`id` = :_where_param_0");
        assert_eq!(params.get("_where_param_0"), Some(&Value::Int(42)));
    }

    #[test]
    fn test_numeric_string_id_shortcut() {
        let (clause, params) = compile_json(json!("17")).unwrap();
        assert_eq!(clause, "`id` = :_where_param_0");
        assert_eq!(params.get("_where_param_0"), Some(&Value::Int(17)));
    }

    #[test]
    fn test_padded_and_signed_string_id_shortcut() {
        for (input, expected) in [(" 7", 7), ("7 ", 7), ("+7", 7), (" -3\n", -3)] {
            let (clause, params) = compile_json(json!(input)).unwrap();
            assert_eq!(clause, "`id` = :_where_param_0", "{input:?}");
            assert_eq!(params.get("_where_param_0"), Some(&Value::Int(expected)));
        }
    }

    #[test]
    fn test_oversized_string_id_stays_bound() {
        let (clause, params) = compile_json(json!("+99999999999999999999")).unwrap();
        assert_eq!(clause, "`id` = :_where_param_0");
        assert_eq!(
            params.get("_where_param_0"),
            Some(&Value::from("99999999999999999999"))
        );
    }

    #[test]
    fn test_float_id_shortcut() {
        let (clause, params) = compile_json(json!(7.0)).unwrap();
        assert_eq!(clause, "`id` = :_where_param_0");
        assert_eq!(params.get("_where_param_0"), Some(&Value::Int(7)));

        // A fractional id still restricts, it just matches nothing
        let (clause, params) = compile_json(json!(7.5)).unwrap();
        assert_eq!(clause, "`id` = :_where_param_0");
        assert_eq!(params.get("_where_param_0"), Some(&Value::Float(7.5)));
    }

    #[test]
    fn test_decimal_string_id_shortcut() {
        let (clause, params) = compile_json(json!(" 7.0 ")).unwrap();
        assert_eq!(clause, "`id` = :_where_param_0");
        assert_eq!(params.get("_where_param_0"), Some(&Value::Int(7)));

        let (clause, params) = compile_json(json!("7.5")).unwrap();
        assert_eq!(clause, "`id` = :_where_param_0");
        assert_eq!(params.get("_where_param_0"), Some(&Value::Float(7.5)));

        for (input, expected) in [("7.", 7), ("1e3", 1000), ("-.5e1", -5)] {
            let (_, params) = compile_json(json!(input)).unwrap();
            assert_eq!(params.get("_where_param_0"), Some(&Value::Int(expected)), "{input:?}");
        }
    }

    #[test]
    fn test_non_numeric_string_stays_raw() {
        for input in ["7 OR 1", ".", "id > 3"] {
            let (clause, params) = compile_json(json!(input)).unwrap();
            assert_eq!(clause, input);
            assert!(params.is_empty());
        }
    }

    #[test]
    fn test_equality_shortcut() {
        let (clause, params) = compile_json(json!(["id", 5])).unwrap();
        assert_eq!(clause, "`id` = :_where_param_0");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("_where_param_0"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_null_shortcut() {
        let (clause, params) = compile_json(json!(["deleted_at", null])).unwrap();
        assert_eq!(clause, "`deleted_at` IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_is_null_literal_shortcut() {
        let (clause, _) = compile_json(json!(["a", "IS NULL"])).unwrap();
        assert_eq!(clause, "`a` IS NULL");

        let (clause, _) = compile_json(json!(["a", "is  not null"])).unwrap();
        assert_eq!(clause, "`a` IS NOT NULL");
    }

    #[test]
    fn test_list_shortcut_is_in() {
        let (clause, params) = compile_json(json!(["status", ["a", "b"]])).unwrap();
        assert_eq!(clause, "`status` IN (:_where_param_0, :_where_param_1)");
        assert_eq!(params.get("_where_param_1"), Some(&Value::from("b")));
    }

    #[test]
    fn test_empty_list_shortcut_is_no_restriction() {
        let (clause, params) = compile_json(json!(["status", []])).unwrap();
        assert_eq!(clause, "1");
        assert!(params.is_empty());
    }

    // ==================== Operator Form ====================

    #[test]
    fn test_comparison_operators() {
        for op in ["=", "!=", "<>", "<=>", "<=", ">=", "<", ">"] {
            let (clause, params) = compile_json(json!(["x", op, 1])).unwrap();
            assert_eq!(clause, format!("`x` {} :_where_param_0", op));
            assert_eq!(params.len(), 1);
        }
    }

    #[test]
    fn test_like_family_normalized() {
        let (clause, _) = compile_json(json!(["name", " like ", "a%"])).unwrap();
        assert_eq!(clause, "`name` LIKE :_where_param_0");

        let (clause, _) = compile_json(json!(["name", "not   like", "a%"])).unwrap();
        assert_eq!(clause, "`name` NOT LIKE :_where_param_0");

        let (clause, _) = compile_json(json!(["name", "RLike", "^a"])).unwrap();
        assert_eq!(clause, "`name` RLIKE :_where_param_0");

        let (clause, _) = compile_json(json!(["name", "not rlike", "^a"])).unwrap();
        assert_eq!(clause, "`name` NOT RLIKE :_where_param_0");
    }

    #[test]
    fn test_between() {
        let (clause, params) = compile_json(json!(["x", "BETWEEN", 1, 9])).unwrap();
        assert_eq!(clause, "`x` BETWEEN :_where_param_0 AND :_where_param_1");
        assert_eq!(params.get("_where_param_0"), Some(&Value::Int(1)));
        assert_eq!(params.get("_where_param_1"), Some(&Value::Int(9)));

        let (clause, _) = compile_json(json!(["x", "not between", 1, 9])).unwrap();
        assert_eq!(clause, "`x` NOT BETWEEN :_where_param_0 AND :_where_param_1");
    }

    #[test]
    fn test_between_missing_value() {
        let err = compile_json(json!(["x", "BETWEEN", 1])).unwrap_err();
        assert!(matches!(err, DbError::MissingArguments(_)));

        let err = compile_json(json!(["x", "BETWEEN", 1, 2, 3])).unwrap_err();
        assert!(matches!(err, DbError::MissingArguments(_)));
    }

    #[test]
    fn test_in_with_list_operand() {
        let (clause, params) = compile_json(json!(["x", "IN", [1, 2, 3]])).unwrap();
        assert_eq!(
            clause,
            "`x` IN (:_where_param_0, :_where_param_1, :_where_param_2)"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_in_with_variadic_tail() {
        let (clause, params) = compile_json(json!(["x", "not in", 1, 2])).unwrap();
        assert_eq!(clause, "`x` NOT IN (:_where_param_0, :_where_param_1)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_explicit_empty_in() {
        let (clause, params) = compile_json(json!(["x", "IN", []])).unwrap();
        assert_eq!(clause, "0");
        assert!(params.is_empty());

        let (clause, _) = compile_json(json!(["x", "NOT IN", []])).unwrap();
        assert_eq!(clause, "1");
    }

    #[test]
    fn test_is_null_operator_form() {
        let (clause, params) = compile_json(json!(["x", "IS NOT NULL", true])).unwrap();
        assert_eq!(clause, "`x` IS NOT NULL");
        assert!(params.is_empty());
    }

    // ==================== Errors ====================

    #[test]
    fn test_invalid_operator() {
        let err = compile_json(json!(["x", "FOO", 1])).unwrap_err();
        match err {
            DbError::InvalidOperator(token) => assert_eq!(token, "FOO"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_single_element_is_missing_arguments() {
        let err = compile_json(json!(["x"])).unwrap_err();
        assert!(matches!(err, DbError::MissingArguments(_)));
    }

    #[test]
    fn test_non_string_column() {
        let err = compile_json(json!([1, "=", 2])).unwrap_err();
        assert!(matches!(err, DbError::MalformedCondition(_)));
    }

    #[test]
    fn test_non_string_operator() {
        let err = compile_json(json!(["x", 1, 2])).unwrap_err();
        assert!(matches!(err, DbError::MalformedCondition(_)));
    }

    #[test]
    fn test_comparison_with_list_value() {
        let err = compile_json(json!(["x", "=", [1, 2]])).unwrap_err();
        assert!(matches!(err, DbError::MalformedCondition(_)));
    }

    #[test]
    fn test_empty_column_after_sanitization() {
        let err = compile_where(&ConditionExpression::eq("``", 1)).unwrap_err();
        assert!(matches!(err, DbError::MalformedCondition(_)));
    }

    #[test]
    fn test_error_inside_group_propagates() {
        let err = compile_json(json!(["AND", ["a", 1], ["b", "FOO", 2]])).unwrap_err();
        assert!(matches!(err, DbError::InvalidOperator(_)));
    }

    // ==================== Groups ====================

    #[test]
    fn test_and_group() {
        let (clause, params) =
            compile_json(json!(["AND", ["x", "=", 1], ["y", "<", "10"]])).unwrap();
        assert_eq!(
            clause,
            "(`x` = :_where_param_0) AND (`y` < :_where_param_1)"
        );
        assert_eq!(params.get("_where_param_0"), Some(&Value::Int(1)));
        assert_eq!(params.get("_where_param_1"), Some(&Value::from("10")));
    }

    #[test]
    fn test_or_group_case_insensitive() {
        let (clause, _) = compile_json(json!(["or", ["a", 1], ["b", 2]])).unwrap();
        assert_eq!(clause, "(`a` = :_where_param_0) OR (`b` = :_where_param_1)");
    }

    #[test]
    fn test_group_children_may_be_raw_or_id() {
        let (clause, params) = compile_json(json!(["AND", "x > 1", 7])).unwrap();
        assert_eq!(clause, "(x > 1) AND (`id` = :_where_param_0)");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_empty_group() {
        let (clause, _) = compile_json(json!(["AND"])).unwrap();
        assert_eq!(clause, "1");
    }

    #[test]
    fn test_large_in_list() {
        let values = (0..60_000).map(Value::from).collect::<Vec<_>>();
        let (clause, params) = compile_where(&ConditionExpression::in_list("id", values)).unwrap();

        assert_eq!(params.len(), 60_000);
        assert!(clause.starts_with("`id` IN (:_where_param_0, :_where_param_1"));
        assert!(clause.ends_with(":_where_param_59999)"));
        assert_eq!(params.get("_where_param_59999"), Some(&Value::Int(59_999)));
    }

    #[test]
    fn test_deeply_nested_names_are_unique() {
        let expr = json!([
            "AND",
            ["a", 1],
            ["OR",
                ["b", "IN", [1, 2]],
                ["AND",
                    ["c", "BETWEEN", 1, 5],
                    ["OR", ["d", "LIKE", "x%"], ["e", ["p", "q", "r"]]]
                ]
            ],
            ["f", null]
        ]);
        let (clause, params) = compile_json(expr).unwrap();

        // a, b x2, c x2, d, e x3
        assert_eq!(params.len(), 9);
        let placeholder = Regex::new(r":(_where_param_[0-9]+)").unwrap();
        let mut used: Vec<&str> = placeholder
            .captures_iter(&clause)
            .map(|c| c.get(1).unwrap().as_str())
            .collect();
        used.sort();
        let mut names: Vec<&str> = params.names().collect();
        names.sort();
        assert_eq!(used, names);
        names.dedup();
        assert_eq!(names.len(), 9);
        assert!(clause.contains("`f` IS NULL"));
    }

    #[test]
    fn test_counter_threads_through() {
        let condition = ConditionExpression::and(vec![
            ConditionExpression::eq("a", 1),
            ConditionExpression::eq("b", 2),
        ]);

        let mut counter = 5;
        let (clause, params) = build_condition_clause(&condition, &mut counter).unwrap();

        assert_eq!(clause, "(`a` = :_where_param_5) AND (`b` = :_where_param_6)");
        assert_eq!(params.len(), 2);
        assert_eq!(counter, 7);
    }

    // ==================== Constructors ====================

    #[test]
    fn test_eq_with_null_becomes_is_null() {
        assert_eq!(
            ConditionExpression::eq("x", Value::Null),
            ConditionExpression::is_null("x")
        );
    }

    #[test]
    fn test_any_of_empty_is_all() {
        assert_eq!(
            ConditionExpression::any_of("x", Vec::new()),
            ConditionExpression::All
        );
    }

    #[test]
    fn test_typed_expression_matches_parsed() {
        let typed = ConditionExpression::and(vec![
            ConditionExpression::compare("x", ComparisonOperator::Eq, 1),
            ConditionExpression::between("y", 1, 2),
        ]);
        let parsed =
            ConditionExpression::parse(&json!(["AND", ["x", "=", 1], ["y", "BETWEEN", 1, 2]]))
                .unwrap();
        assert_eq!(typed, parsed);
    }

    #[test]
    fn test_column_is_sanitized() {
        let (clause, _) = compile_where(&ConditionExpression::eq(" na`me ", "x")).unwrap();
        assert_eq!(clause, "`name` = :_where_param_0");
    }
}
