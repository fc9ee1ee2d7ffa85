/// Analytics tools built on the query and statistics core
///
/// Every tool follows the same shape: validate the raw arguments against a
/// declared schema, build and execute one or more queries, then reshape the
/// rows into a typed report with a summary and short textual insights.

pub mod apps;
pub mod trends;
pub mod usage;
pub mod users;
pub mod versions;

// Re-export tool functions for easy access
pub use apps::*;
pub use trends::*;
pub use usage::*;
pub use users::*;
pub use versions::*;

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::analytics::round_to;
use crate::config::ServerSettings;
use crate::domain::{AnalyticsError, Row};
use crate::storage::AnalyticsStore;
use crate::validation::ParamSchema;
use crate::ServerError;

/// Tools that only run when advanced analytics are enabled
pub const ADVANCED_TOOLS: &[&str] = &["heavy_users"];

/// Arguments accepted by one tool
pub trait ToolParams: DeserializeOwned + JsonSchema {
    /// Rules applied to the raw arguments before deserializing
    fn schema() -> ParamSchema;

    fn parse(args: &Map<String, Value>) -> Result<Self, AnalyticsError> {
        Self::schema().validate(args)?.deserialize()
    }
}

/// Description of one tool for clients
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub advanced: bool,
    pub input_schema: Value,
}

fn definition<P: ToolParams>(name: &'static str, description: &'static str) -> ToolDefinition {
    ToolDefinition {
        name,
        description,
        advanced: ADVANCED_TOOLS.contains(&name),
        input_schema: serde_json::to_value(schema_for!(P)).unwrap_or(Value::Null),
    }
}

/// All available tools with their input schemas
pub fn catalog() -> Vec<ToolDefinition> {
    vec![
        definition::<ListApplicationsParams>(
            "list_applications",
            "List tracked applications with optional filtering and sorting",
        ),
        definition::<AppDetailsParams>(
            "app_details",
            "Detailed information about one application, optionally with usage statistics",
        ),
        definition::<TopAppsParams>("top_apps_by_usage", "Rank applications by total usage time"),
        definition::<PlatformUsageParams>(
            "platform_usage_stats",
            "Applications used most on each platform",
        ),
        definition::<UsageStatisticsParams>(
            "usage_statistics",
            "Descriptive statistics over individual session lengths",
        ),
        definition::<UserTopAppsParams>("user_top_apps", "Top applications for a specific user"),
        definition::<HeavyUsersParams>(
            "heavy_users",
            "Identify users whose total usage exceeds a threshold",
        ),
        definition::<DailyTrendParams>(
            "daily_usage_trend",
            "Day-by-day usage of one application with moving average and growth",
        ),
        definition::<LegacyVsModernParams>(
            "legacy_vs_modern",
            "Compare usage of legacy and modern applications",
        ),
    ]
}

fn respond<T: Serialize>(report: Result<T, AnalyticsError>) -> Result<Value, ServerError> {
    Ok(serde_json::to_value(report?)?)
}

/// Run a tool by name against `store`
pub fn dispatch<S: AnalyticsStore>(
    store: &S,
    settings: &ServerSettings,
    name: &str,
    args: &Map<String, Value>,
) -> Result<Value, ServerError> {
    info!("Calling tool {}", name);

    if ADVANCED_TOOLS.contains(&name) && !settings.enable_advanced_analytics {
        return Err(AnalyticsError::invalid(
            "tool",
            format!("'{}' requires advanced analytics to be enabled", name),
        )
        .into());
    }

    let result = match name {
        "list_applications" => respond(list_applications(store, ListApplicationsParams::parse(args)?)),
        "app_details" => respond(app_details(store, AppDetailsParams::parse(args)?)),
        "top_apps_by_usage" => respond(top_apps_by_usage(store, TopAppsParams::parse(args)?)),
        "platform_usage_stats" => {
            respond(platform_usage_stats(store, PlatformUsageParams::parse(args)?))
        }
        "usage_statistics" => respond(usage_statistics(store, UsageStatisticsParams::parse(args)?)),
        "user_top_apps" => respond(user_top_apps(store, UserTopAppsParams::parse(args)?)),
        "heavy_users" => respond(heavy_users(store, HeavyUsersParams::parse(args)?)),
        "daily_usage_trend" => respond(daily_usage_trend(store, DailyTrendParams::parse(args)?)),
        "legacy_vs_modern" => respond(legacy_vs_modern(store, LegacyVsModernParams::parse(args)?)),
        _ => Err(AnalyticsError::UnknownTool(name.to_string()).into()),
    };

    match &result {
        Ok(_) => info!("Tool {} completed", name),
        Err(e) => warn!(tool = name, error = %e, "Tool call failed"),
    }
    result
}

/// Seconds to hours, rounded to 2 places
pub(crate) fn hours(seconds: f64) -> f64 {
    round_to(seconds / 3600.0, 2)
}

/// Seconds to minutes, rounded to 2 places
pub(crate) fn minutes(seconds: f64) -> f64 {
    round_to(seconds / 60.0, 2)
}

pub(crate) fn number(row: &Row, column: &str) -> f64 {
    row.f64(column).unwrap_or(0.0)
}

pub(crate) fn count(row: &Row, column: &str) -> i64 {
    row.i64(column).unwrap_or(0)
}

pub(crate) fn text(row: &Row, column: &str) -> String {
    row.str(column).unwrap_or_default().to_string()
}

/// SQLite booleans come back as integers
pub(crate) fn flag(row: &Row, column: &str) -> bool {
    match row.get(column) {
        Some(Value::Bool(b)) => *b,
        Some(value) => value.as_i64().map_or(false, |n| n != 0),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalog_names_are_unique_and_have_schemas() {
        let tools = catalog();
        let mut names: Vec<&str> = tools.iter().map(|t| t.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), tools.len());

        for tool in &tools {
            assert!(tool.input_schema.get("properties").is_some(), "{} has no properties", tool.name);
        }
        assert!(tools.iter().any(|t| t.name == "heavy_users" && t.advanced));
    }

    #[test]
    fn test_row_helpers() {
        let row = Row::new()
            .with("enabled", json!(1))
            .with("disabled", json!(0))
            .with("seconds", json!(5400));

        assert!(flag(&row, "enabled"));
        assert!(!flag(&row, "disabled"));
        assert!(!flag(&row, "missing"));
        assert_eq!(hours(number(&row, "seconds")), 1.5);
        assert_eq!(minutes(number(&row, "seconds")), 90.0);
        assert_eq!(text(&row, "missing"), "");
    }
}
