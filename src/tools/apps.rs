/// Tools describing the registered applications
///
/// This module implements `list_applications` and `app_details` over the
/// `app_list` table.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::analytics::{aggregate, rank, round_to, AggregateFn};
use crate::domain::{AnalyticsError, RankingEntry, Row};
use crate::query::{BuiltQuery, QueryBuilder, SortOrder};
use crate::storage::AnalyticsStore;
use crate::tools::{count, flag, hours, minutes, number, text, ToolParams};
use crate::validation::{ParamKind, ParamSchema};

const APP_COLUMNS: &str = "app_id, app_name, app_type, current_version, released_date, publisher, \
     description, download_link, enable_tracking, track_usage, track_location, track_cm, \
     track_intr, registered_date";

const DESCRIPTION_PREVIEW_CHARS: usize = 100;

/// Columns `list_applications` can sort by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AppSortField {
    #[default]
    AppName,
    AppType,
    ReleasedDate,
    Publisher,
    RegisteredDate,
}

impl AppSortField {
    const NAMES: &'static [&'static str] =
        &["app_name", "app_type", "released_date", "publisher", "registered_date"];

    fn column(&self) -> &'static str {
        match self {
            AppSortField::AppName => "app_name",
            AppSortField::AppType => "app_type",
            AppSortField::ReleasedDate => "released_date",
            AppSortField::Publisher => "publisher",
            AppSortField::RegisteredDate => "registered_date",
        }
    }
}

/// Parameters for listing applications
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListApplicationsParams {
    /// Maximum number of applications to return (default: 100, max: 1000)
    pub limit: Option<u32>,
    /// Filter by application type
    pub app_type: Option<String>,
    /// Filter by tracking status
    pub enable_tracking: Option<bool>,
    #[serde(default)]
    pub sort_by: AppSortField,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl ToolParams for ListApplicationsParams {
    fn schema() -> ParamSchema {
        ParamSchema::new()
            .optional("limit", ParamKind::Count { max: Some(1000) })
            .optional("app_type", ParamKind::Identifier)
            .optional("enable_tracking", ParamKind::Flag)
            .optional("sort_by", ParamKind::Choice(AppSortField::NAMES))
            .optional("sort_order", ParamKind::Choice(&["asc", "desc"]))
    }
}

/// Tracking switches of one application
#[derive(Debug, Serialize)]
pub struct TrackingConfig {
    pub enabled: bool,
    pub usage: bool,
    pub location: bool,
    pub cpu_memory: bool,
    pub interval_seconds: i64,
}

/// One application from `app_list`
#[derive(Debug, Serialize)]
pub struct ApplicationInfo {
    pub app_id: i64,
    pub name: String,
    pub app_type: String,
    pub version: String,
    pub released_date: String,
    pub publisher: String,
    pub description: String,
    pub download_link: String,
    pub tracking: TrackingConfig,
    pub registered_date: String,
}

impl ApplicationInfo {
    fn from_row(row: &Row) -> Self {
        Self {
            app_id: count(row, "app_id"),
            name: text(row, "app_name"),
            app_type: text(row, "app_type"),
            version: text(row, "current_version"),
            released_date: text(row, "released_date"),
            publisher: text(row, "publisher"),
            description: text(row, "description"),
            download_link: text(row, "download_link"),
            tracking: TrackingConfig {
                enabled: flag(row, "enable_tracking"),
                usage: flag(row, "track_usage"),
                location: flag(row, "track_location"),
                cpu_memory: flag(row, "track_cm"),
                interval_seconds: count(row, "track_intr"),
            },
            registered_date: text(row, "registered_date"),
        }
    }

    fn with_preview_description(mut self) -> Self {
        if self.description.chars().count() > DESCRIPTION_PREVIEW_CHARS {
            let preview: String = self.description.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
            self.description = format!("{}...", preview);
        }
        self
    }
}

/// Summary statistics for the listed applications
#[derive(Debug, Serialize)]
pub struct ApplicationListSummary {
    pub total_applications: usize,
    pub tracking_enabled: usize,
    pub tracking_disabled: usize,
    pub top_app_types: Vec<RankingEntry>,
    pub top_publishers: Vec<RankingEntry>,
    /// The listing hit the server's row cap; counts cover the listed rows only
    pub truncated: bool,
}

/// Response from listing applications
#[derive(Debug, Serialize)]
pub struct ListApplicationsResponse {
    pub tool: &'static str,
    pub query_time_ms: f64,
    pub applications: Vec<ApplicationInfo>,
    pub summary: ApplicationListSummary,
}

/// Five most common values of `field` with their share of the listed rows
fn most_common(rows: &[Row], field: &str) -> Vec<RankingEntry> {
    let counts = aggregate(rows, field, &[("app_id", AggregateFn::Count)]);
    rank(&counts, "app_id", field, Some(5), true)
        .into_iter()
        .map(|entry| RankingEntry {
            percentage: round_to(entry.percentage, 2),
            ..entry
        })
        .collect()
}

/// List applications using the provided store
pub fn list_applications<S: AnalyticsStore>(
    store: &S,
    params: ListApplicationsParams,
) -> Result<ListApplicationsResponse, AnalyticsError> {
    let query = QueryBuilder::new(format!("SELECT {} FROM app_list", APP_COLUMNS))
        .filter("app_type", params.app_type)
        .filter("enable_tracking", params.enable_tracking)
        .order_by(params.sort_by.column(), params.sort_order)
        .limit(Some(params.limit.unwrap_or(100)))
        .build()?;

    let result = store.execute(&query)?;
    let rows = result.rows();

    let tracking_enabled = rows.iter().filter(|row| flag(row, "enable_tracking")).count();
    let summary = ApplicationListSummary {
        total_applications: rows.len(),
        tracking_enabled,
        tracking_disabled: rows.len() - tracking_enabled,
        top_app_types: most_common(rows, "app_type"),
        top_publishers: most_common(rows, "publisher"),
        truncated: result.is_truncated(),
    };

    Ok(ListApplicationsResponse {
        tool: "list_applications",
        query_time_ms: result.elapsed_ms(),
        applications: rows
            .iter()
            .map(|row| ApplicationInfo::from_row(row).with_preview_description())
            .collect(),
        summary,
    })
}

/// Parameters for one application's details
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AppDetailsParams {
    /// Exact application name
    pub app_name: String,
    /// Also summarise recorded usage
    #[serde(default)]
    pub include_usage_stats: bool,
}

impl ToolParams for AppDetailsParams {
    fn schema() -> ParamSchema {
        ParamSchema::new()
            .required("app_name", ParamKind::Identifier)
            .optional("include_usage_stats", ParamKind::Flag)
    }
}

/// Recorded usage of one application
#[derive(Debug, Serialize)]
pub struct AppUsageSummary {
    pub total_sessions: i64,
    pub unique_users: i64,
    pub total_usage_hours: f64,
    pub average_session_minutes: f64,
    pub first_usage_date: String,
    pub last_usage_date: String,
    pub platforms_used: i64,
}

/// Response with one application's details
#[derive(Debug, Serialize)]
pub struct AppDetailsResponse {
    pub tool: &'static str,
    pub query_time_ms: f64,
    pub application: ApplicationInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_statistics: Option<AppUsageSummary>,
    pub insights: Vec<String>,
}

/// Look up one application, optionally with its usage summary
pub fn app_details<S: AnalyticsStore>(
    store: &S,
    params: AppDetailsParams,
) -> Result<AppDetailsResponse, AnalyticsError> {
    let mut queries = vec![QueryBuilder::new("SELECT * FROM app_list")
        .filter("app_name", params.app_name.as_str())
        .limit(Some(1))
        .build()?];

    if params.include_usage_stats {
        queries.push(BuiltQuery::raw(
            "SELECT COUNT(*) AS total_sessions, COUNT(DISTINCT user) AS unique_users, \
             SUM(duration_seconds) AS total_seconds, AVG(duration_seconds) AS avg_session_seconds, \
             MIN(log_date) AS first_usage_date, MAX(log_date) AS last_usage_date, \
             COUNT(DISTINCT platform) AS platforms_used \
             FROM app_usage WHERE application_name = ?",
            vec![params.app_name.clone().into()],
        ));
    }

    let results = store.execute_batch(&queries)?;
    let query_time_ms = results.iter().map(|r| r.elapsed_ms()).sum();

    let application = results
        .first()
        .and_then(|r| r.first())
        .map(ApplicationInfo::from_row)
        .ok_or_else(|| {
            AnalyticsError::invalid(
                "app_name",
                format!("Application '{}' not found", params.app_name),
            )
        })?;

    let mut insights = Vec::new();
    if !application.tracking.enabled {
        insights.push(
            "Tracking is disabled for this application; no new usage will be recorded".to_string(),
        );
    }

    let usage_statistics = results
        .get(1)
        .and_then(|r| r.first())
        .filter(|row| count(row, "total_sessions") > 0)
        .map(|row| AppUsageSummary {
            total_sessions: count(row, "total_sessions"),
            unique_users: count(row, "unique_users"),
            total_usage_hours: hours(number(row, "total_seconds")),
            average_session_minutes: minutes(number(row, "avg_session_seconds")),
            first_usage_date: text(row, "first_usage_date"),
            last_usage_date: text(row, "last_usage_date"),
            platforms_used: count(row, "platforms_used"),
        });

    if params.include_usage_stats && usage_statistics.is_none() {
        insights.push("No usage data found for this application".to_string());
    }

    Ok(AppDetailsResponse {
        tool: "app_details",
        query_time_ms,
        application,
        usage_statistics,
        insights,
    })
}
