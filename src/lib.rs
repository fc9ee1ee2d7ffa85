/// Public library interface for the app-usage analytics core
///
/// This module exports the query builder, the executor, the parameter
/// validator and the statistics helpers, plus [`AnalyticsService`] which
/// ties them together behind named tools.

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

pub mod analytics;
pub mod config;
pub mod dates;
pub mod domain;
pub mod query;
pub mod storage;
pub mod tools;
pub mod validation;

// Re-export public modules and types
pub use config::{ConfigError, DatabaseConfig, ServerSettings};
pub use domain::*;
pub use query::{build_aggregation, build_query, BuiltQuery, FilterValue, QueryBuilder, SortOrder};
pub use storage::{AnalyticsStore, SqliteStore};
pub use tools::{catalog, ToolDefinition};
pub use validation::{validate, ParamKind, ParamSchema, ValidatedParams};

/// Errors that can occur during server operation
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tool task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServerError {
    /// Stable machine-readable code for this error
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Analytics(e) => e.kind(),
            ServerError::Config(_) => "config_error",
            ServerError::Io(_) => "io_error",
            ServerError::Json(_) => "serialization_error",
            ServerError::Task(_) => "internal_error",
        }
    }
}

/// Analytics service answering named tool calls
///
/// Cheap to clone; clones share the store and settings.
#[derive(Debug, Clone)]
pub struct AnalyticsService {
    store: SqliteStore,
    settings: Arc<ServerSettings>,
}

impl AnalyticsService {
    /// Create a service over the given database
    ///
    /// The row cap of the executor comes from `max_query_results`.
    pub fn new(settings: ServerSettings, database: DatabaseConfig) -> Self {
        tracing::info!(
            "Initializing analytics service with database: {}",
            database.path().display()
        );

        let store = SqliteStore::new(database).with_max_rows(settings.max_query_results);
        Self {
            store,
            settings: Arc::new(settings),
        }
    }

    /// Create a service over `settings.database_path`
    pub fn open(settings: ServerSettings) -> Result<Self, ServerError> {
        let path = settings
            .database_path
            .clone()
            .ok_or_else(|| ConfigError::InvalidSetting {
                name: "database_path".to_string(),
                message: "no database configured".to_string(),
            })?;

        let database = DatabaseConfig::new(path)?;
        Ok(Self::new(settings, database))
    }

    /// Run a tool by name
    ///
    /// The call runs on the blocking pool and is abandoned once the
    /// configured query timeout elapses.
    pub async fn call_tool(&self, name: &str, args: Map<String, Value>) -> Result<Value, ServerError> {
        let timeout = self.settings.query_timeout();
        let service = self.clone();
        let tool = name.to_string();

        let task = tokio::task::spawn_blocking(move || {
            tools::dispatch(&service.store, &service.settings, &tool, &args)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => joined?,
            Err(_) => {
                tracing::warn!(tool = name, "Tool call timed out after {:?}", timeout);
                Err(AnalyticsError::QueryTimeout {
                    seconds: self.settings.query_timeout_secs,
                }
                .into())
            }
        }
    }

    /// Get a reference to the executor (useful for testing)
    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Tools this service answers, with advanced ones left out when disabled
    pub fn tools(&self) -> Vec<ToolDefinition> {
        catalog()
            .into_iter()
            .filter(|tool| !tool.advanced || self.settings.enable_advanced_analytics)
            .collect()
    }
}
