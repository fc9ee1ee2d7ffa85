/// SQLite implementation of the query executor
///
/// Every call opens its own read-only connection and drops it before
/// returning, whichever way the call exits. Rows are converted to named
/// mappings here and nowhere else. A repeated result column name, as in
/// `SELECT a.user, b.user`, keeps its first occurrence as is; later ones
/// become `user_2`, `user_3` and so on.

use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexSet;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::config::DatabaseConfig;
use crate::domain::{AnalyticsError, QueryMetadata, QueryResult, Row};
use crate::query::BuiltQuery;
use crate::storage::{schema, AnalyticsStore};

/// SQLite-backed executor
///
/// Cheap to clone; clones share the same configuration.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    config: Arc<DatabaseConfig>,
    max_rows: usize,
}

impl SqliteStore {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config: Arc::new(config),
            max_rows: usize::MAX,
        }
    }

    /// Cap the number of rows materialised per capped query
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Open a read-only connection to the configured database
    fn connect(&self) -> Result<Connection, AnalyticsError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(self.config.path(), flags)
            .and_then(|conn| {
                conn.busy_timeout(self.config.busy_timeout())?;
                Ok(conn)
            })
            .map_err(|e| {
                error!(path = %self.config.path().display(), error = %e, "Failed to open database");
                AnalyticsError::Database(e)
            })?;

        debug!("Database connection established: {}", self.config.path().display());
        Ok(conn)
    }

    /// Execute and fetch on an open connection
    fn run(&self, conn: &Connection, query: &BuiltQuery) -> Result<QueryResult, AnalyticsError> {
        self.fetch(conn, query).map_err(|e| {
            error!(
                query = %query.sql,
                params = ?query.params,
                error = %e,
                "Database error executing query"
            );
            AnalyticsError::Database(e)
        })
    }

    fn fetch(&self, conn: &Connection, query: &BuiltQuery) -> Result<QueryResult, rusqlite::Error> {
        let mut stmt = conn.prepare(&query.sql)?;
        let columns = unique_column_names(stmt.column_names());

        let started = Instant::now();
        let mut rows = stmt.query(params_from_iter(query.params.iter()))?;

        let max_rows = if query.capped { self.max_rows } else { usize::MAX };
        let mut data = Vec::new();
        let mut truncated = false;
        while let Some(row) = rows.next()? {
            if data.len() >= max_rows {
                truncated = true;
                break;
            }

            let mut converted = Row::new();
            for (index, column) in columns.iter().enumerate() {
                converted.insert(column.clone(), value_to_json(row.get_ref(index)?));
            }
            data.push(converted);
        }
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        if truncated {
            warn!("Query result truncated to {} rows", self.max_rows);
        }
        debug!("Query executed in {:.2}ms, returned {} rows", elapsed_ms, data.len());

        Ok(QueryResult::new(
            data,
            elapsed_ms,
            QueryMetadata {
                query: query.sql.clone(),
                params: query.params.clone(),
                truncated,
            },
        ))
    }
}

impl AnalyticsStore for SqliteStore {
    fn execute(&self, query: &BuiltQuery) -> Result<QueryResult, AnalyticsError> {
        let conn = self.connect()?;
        self.run(&conn, query)
    }

    fn execute_batch(&self, queries: &[BuiltQuery]) -> Result<Vec<QueryResult>, AnalyticsError> {
        let conn = self.connect()?;
        queries.iter().map(|query| self.run(&conn, query)).collect()
    }

    fn table_columns(&self, table: &str) -> Result<Vec<String>, AnalyticsError> {
        if !schema::is_known_table(table) {
            return Err(AnalyticsError::invalid("table", format!("Unknown table '{}'", table)));
        }

        let query = BuiltQuery::raw(format!("PRAGMA table_info({})", table), Vec::new());
        let result = self.execute(&query)?;

        Ok(result
            .rows()
            .iter()
            .filter_map(|row| row.str("name").map(String::from))
            .collect())
    }
}

/// Result column names with repeats suffixed so none collapse into another
fn unique_column_names(names: Vec<&str>) -> Vec<String> {
    let mut seen: IndexSet<String> = IndexSet::with_capacity(names.len());
    for name in names {
        let mut candidate = name.to_string();
        let mut suffix = 2;
        while seen.contains(&candidate) {
            candidate = format!("{}_{}", name, suffix);
            suffix += 1;
        }
        seen.insert(candidate);
    }
    seen.into_iter().collect()
}

/// Convert a raw SQLite value into JSON
fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => json!(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<blob {} bytes>", b.len())),
    }
}
