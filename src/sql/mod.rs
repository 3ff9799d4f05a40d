//! SQL utilities
//!
//! Provides identifier sanitization, WHERE condition compilation and
//! statement building.

pub mod builder;
pub mod condition;
pub mod sanitize;

pub use builder::{InsertMode, OrderBy, build_delete, build_insert, build_select, build_update};
pub use condition::{
    ComparisonOperator, ConditionExpression, LogicalOperator, build_condition_clause,
    compile_where,
};
pub use sanitize::{quote_identifier, sanitize_identifier};
