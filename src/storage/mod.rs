/// Storage layer for reading the usage database
///
/// This module runs composed queries against SQLite and hands back uniform
/// result envelopes. The analytics core never writes to the database.

pub mod schema;
pub mod sqlite;

// Re-export the main storage types
pub use sqlite::*;

use crate::domain::{AnalyticsError, QueryResult};
use crate::query::BuiltQuery;

/// Trait defining the query execution interface
///
/// Tool handlers are generic over this so they can run against any backend
/// that yields named rows.
pub trait AnalyticsStore {
    /// Execute one query
    fn execute(&self, query: &BuiltQuery) -> Result<QueryResult, AnalyticsError>;

    /// Execute several queries over a single connection, one result each
    fn execute_batch(&self, queries: &[BuiltQuery]) -> Result<Vec<QueryResult>, AnalyticsError>;

    /// Column names of a known table, in declaration order
    fn table_columns(&self, table: &str) -> Result<Vec<String>, AnalyticsError>;
}
