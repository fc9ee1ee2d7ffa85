/// Domain module containing the request-scoped data types
///
/// This module defines the values that flow between the validator, the
/// query builder, the executor and the statistics helpers. Nothing here
/// outlives a single tool invocation.

pub mod row;
pub mod types;

// Re-export public types for easy access
pub use row::*;
pub use types::*;

use thiserror::Error;

/// Errors raised by the analytics core
///
/// Each kind stays distinguishable so callers can map it to their own
/// user-facing status. Database errors never carry the query text.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    #[error("Required parameter '{0}' is missing")]
    MissingParameter(String),

    #[error("Invalid date format '{0}', expected YYYY-MM-DD")]
    InvalidDateFormat(String),

    #[error("Start date {start} cannot be after end date {end}")]
    InvalidRange { start: String, end: String },

    #[error("Database error: {}", database_message(.0))]
    Database(#[from] rusqlite::Error),

    #[error("Query timed out after {seconds}s")]
    QueryTimeout { seconds: u64 },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

/// Driver message without any statement text
fn database_message(error: &rusqlite::Error) -> String {
    match error {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message.clone(),
        other => match other.sqlite_error() {
            Some(code) => code.to_string(),
            None => other.to_string(),
        },
    }
}

impl AnalyticsError {
    /// Shorthand for an `InvalidParameter` error
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error kind
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyticsError::InvalidParameter { .. } => "invalid_parameter",
            AnalyticsError::MissingParameter(_) => "missing_parameter",
            AnalyticsError::InvalidDateFormat(_) => "invalid_date_format",
            AnalyticsError::InvalidRange { .. } => "invalid_range",
            AnalyticsError::Database(_) => "database_error",
            AnalyticsError::QueryTimeout { .. } => "timeout",
            AnalyticsError::UnknownTool(_) => "unknown_tool",
        }
    }

    /// Whether the error was caused by the caller's input
    pub fn is_caller_error(&self) -> bool {
        !matches!(
            self,
            AnalyticsError::Database(_) | AnalyticsError::QueryTimeout { .. }
        )
    }
}
