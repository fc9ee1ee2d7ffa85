/// Tools reporting how much the applications are used
///
/// This module implements `top_apps_by_usage`, `platform_usage_stats` and
/// `usage_statistics`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::analytics::{
    find_outliers, format_duration, percentages, rank, round_to, statistics,
    DurationFormat, OutlierMethod, Statistics,
};
use crate::domain::{AnalyticsError, Platform, RankingEntry, Row};
use crate::query::{build_aggregation, Aggregate, FilterValue, QueryBuilder, SortOrder};
use crate::storage::AnalyticsStore;
use crate::tools::{count, hours, minutes, number, text, ToolParams};
use crate::validation::{ParamKind, ParamSchema, MAX_TOP_N};

/// Parameters for ranking applications by usage time
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TopAppsParams {
    /// Number of applications to return (default: 10, max: 100)
    pub top_n: Option<u32>,
    /// Start of the date range (YYYY-MM-DD)
    pub start_date: Option<String>,
    /// End of the date range (YYYY-MM-DD)
    pub end_date: Option<String>,
    pub platform: Option<Platform>,
}

impl ToolParams for TopAppsParams {
    fn schema() -> ParamSchema {
        ParamSchema::new()
            .optional("top_n", ParamKind::Count { max: Some(MAX_TOP_N) })
            .optional("start_date", ParamKind::Date)
            .optional("end_date", ParamKind::Date)
            .optional("platform", ParamKind::Platform)
    }
}

/// One application in the usage ranking
#[derive(Debug, Serialize)]
pub struct AppUsage {
    pub rank: usize,
    pub application_name: String,
    pub total_hours: f64,
    /// Share of usage across all applications, not only the listed ones
    pub percentage: f64,
    pub unique_users: i64,
    pub sessions: i64,
    pub avg_session_minutes: f64,
}

impl AppUsage {
    fn from_entry(entry: &RankingEntry) -> Self {
        Self {
            rank: entry.rank,
            application_name: entry.name.clone(),
            total_hours: hours(entry.value),
            percentage: round_to(entry.percentage, 2),
            unique_users: count(&entry.extra, "unique_users"),
            sessions: count(&entry.extra, "sessions"),
            avg_session_minutes: minutes(number(&entry.extra, "avg_session_seconds")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TopAppsSummary {
    pub applications_with_usage: usize,
    pub total_hours: f64,
    /// Combined share of the listed applications
    pub listed_share: f64,
}

/// Response from ranking applications
#[derive(Debug, Serialize)]
pub struct TopAppsResponse {
    pub tool: &'static str,
    pub query_time_ms: f64,
    pub applications: Vec<AppUsage>,
    pub summary: TopAppsSummary,
    pub insights: Vec<String>,
}

fn usage_filters(
    start_date: Option<&str>,
    end_date: Option<&str>,
    platform: Option<Platform>,
) -> Vec<(&'static str, FilterValue)> {
    vec![
        ("log_date", FilterValue::date_range(start_date, end_date)),
        ("platform", platform.map(|p| p.as_str()).into()),
    ]
}

/// Rank applications by total usage time
///
/// Percentages are taken against every application in the range, so the
/// top of the list doesn't look like 100% of usage.
pub fn top_apps_by_usage<S: AnalyticsStore>(
    store: &S,
    params: TopAppsParams,
) -> Result<TopAppsResponse, AnalyticsError> {
    let top_n = params.top_n.unwrap_or(10) as usize;

    let query = build_aggregation(
        "app_usage",
        &["application_name"],
        &["application_name"],
        &[
            ("total_seconds", Aggregate::sum("duration_seconds")),
            ("unique_users", Aggregate::count_distinct("user")),
            ("sessions", Aggregate::Count),
            ("avg_session_seconds", Aggregate::avg("duration_seconds")),
        ],
        usage_filters(
            params.start_date.as_deref(),
            params.end_date.as_deref(),
            params.platform,
        ),
        &[("total_seconds", SortOrder::Desc)],
        None,
    )?;

    let result = store.execute(&query)?;
    let ranking = rank(result.rows(), "total_seconds", "application_name", Some(top_n), true);
    let applications: Vec<AppUsage> = ranking.iter().map(AppUsage::from_entry).collect();

    let total_seconds: f64 = result.rows().iter().map(|row| number(row, "total_seconds")).sum();
    let listed_share = round_to(applications.iter().map(|app| app.percentage).sum(), 2);

    let mut insights = Vec::new();
    match applications.first() {
        Some(leader) => insights.push(format!(
            "{} leads with {:.2} hours ({:.2}% of all usage)",
            leader.application_name, leader.total_hours, leader.percentage
        )),
        None => insights.push("No usage recorded for the selected filters".to_string()),
    }
    if applications.len() > 1 && listed_share > 0.0 {
        insights.push(format!(
            "The top {} applications account for {:.2}% of usage",
            applications.len(),
            listed_share
        ));
    }

    Ok(TopAppsResponse {
        tool: "top_apps_by_usage",
        query_time_ms: result.elapsed_ms(),
        summary: TopAppsSummary {
            applications_with_usage: result.row_count(),
            total_hours: hours(total_seconds),
            listed_share,
        },
        applications,
        insights,
    })
}

/// Parameters for per-platform usage
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PlatformUsageParams {
    /// Only report this platform
    pub platform: Option<Platform>,
    /// Applications per platform (default: 10)
    pub limit: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl ToolParams for PlatformUsageParams {
    fn schema() -> ParamSchema {
        ParamSchema::new()
            .optional("platform", ParamKind::Platform)
            .optional("limit", ParamKind::Count { max: Some(MAX_TOP_N) })
            .optional("start_date", ParamKind::Date)
            .optional("end_date", ParamKind::Date)
    }
}

/// One application's usage on a platform
#[derive(Debug, Serialize)]
pub struct PlatformApp {
    pub rank_in_platform: usize,
    pub application_name: String,
    pub total_hours: f64,
    pub unique_users: i64,
    pub sessions: i64,
}

/// Usage on one platform
#[derive(Debug, Serialize)]
pub struct PlatformBreakdown {
    pub platform: String,
    pub total_hours: f64,
    pub unique_users: i64,
    /// Share of usage time across all platforms
    pub percentage: f64,
    pub top_applications: Vec<PlatformApp>,
}

/// Response from per-platform usage
#[derive(Debug, Serialize)]
pub struct PlatformUsageResponse {
    pub tool: &'static str,
    pub query_time_ms: f64,
    pub platforms: Vec<PlatformBreakdown>,
    pub insights: Vec<String>,
}

/// Top applications on each platform plus each platform's share of usage
pub fn platform_usage_stats<S: AnalyticsStore>(
    store: &S,
    params: PlatformUsageParams,
) -> Result<PlatformUsageResponse, AnalyticsError> {
    let per_platform = params.limit.unwrap_or(10) as usize;
    let filters = || {
        usage_filters(
            params.start_date.as_deref(),
            params.end_date.as_deref(),
            params.platform,
        )
    };

    let detail = QueryBuilder::aggregation(
        "app_usage",
        &["platform", "application_name"],
        &[
            ("total_seconds", Aggregate::sum("duration_seconds")),
            ("unique_users", Aggregate::count_distinct("user")),
            ("sessions", Aggregate::Count),
        ],
    )?
    .filters(filters())
    .group_by(["platform", "application_name"])
    .order_by("platform", SortOrder::Asc)
    .order_by("total_seconds", SortOrder::Desc)
    .build()?;

    let totals = build_aggregation(
        "app_usage",
        &["platform"],
        &["platform"],
        &[
            ("total_seconds", Aggregate::sum("duration_seconds")),
            ("unique_users", Aggregate::count_distinct("user")),
        ],
        filters(),
        &[("total_seconds", SortOrder::Desc)],
        None,
    )?;

    let results = store.execute_batch(&[detail, totals])?;
    let query_time_ms = results.iter().map(|r| r.elapsed_ms()).sum();
    let (detail_rows, total_rows) = (results[0].rows(), results[1].rows());

    let platforms: Vec<PlatformBreakdown> = percentages(total_rows, "total_seconds")
        .iter()
        .map(|total| {
            let platform = text(total, "platform");
            let top_applications = detail_rows
                .iter()
                .filter(|row| row.str("platform") == Some(platform.as_str()))
                .take(per_platform)
                .enumerate()
                .map(|(index, row)| PlatformApp {
                    rank_in_platform: index + 1,
                    application_name: text(row, "application_name"),
                    total_hours: hours(number(row, "total_seconds")),
                    unique_users: count(row, "unique_users"),
                    sessions: count(row, "sessions"),
                })
                .collect();

            PlatformBreakdown {
                total_hours: hours(number(total, "total_seconds")),
                unique_users: count(total, "unique_users"),
                percentage: number(total, "percentage"),
                top_applications,
                platform,
            }
        })
        .collect();

    let mut insights = Vec::new();
    if let Some(busiest) = platforms.first() {
        insights.push(format!(
            "{} carries {:.2}% of recorded usage",
            busiest.platform, busiest.percentage
        ));
    }
    let mobile_share: f64 = platforms
        .iter()
        .filter(|p| p.platform.parse::<Platform>().map_or(false, |p| p.is_mobile()))
        .map(|p| p.percentage)
        .sum();
    if params.platform.is_none() && mobile_share > 0.0 {
        insights.push(format!("Mobile platforms account for {:.2}% of usage", mobile_share));
    }
    if platforms.is_empty() {
        insights.push("No usage recorded for the selected filters".to_string());
    }

    Ok(PlatformUsageResponse {
        tool: "platform_usage_stats",
        query_time_ms,
        platforms,
        insights,
    })
}

/// Parameters for session-length statistics
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UsageStatisticsParams {
    pub application_name: Option<String>,
    pub user: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub platform: Option<Platform>,
}

impl ToolParams for UsageStatisticsParams {
    fn schema() -> ParamSchema {
        ParamSchema::from_names(
            &[],
            &["application_name", "user", "start_date", "end_date", "platform"],
        )
    }
}

/// Response with session-length statistics
#[derive(Debug, Serialize)]
pub struct UsageStatisticsResponse {
    pub tool: &'static str,
    pub query_time_ms: f64,
    /// Statistics over session lengths in seconds
    pub session_seconds: Statistics,
    pub typical_session: String,
    pub average_session: String,
    pub outlier_sessions: usize,
    /// Not every session was read; statistics cover a prefix only
    pub truncated: bool,
    pub insights: Vec<String>,
}

/// Descriptive statistics over individual session lengths
pub fn usage_statistics<S: AnalyticsStore>(
    store: &S,
    params: UsageStatisticsParams,
) -> Result<UsageStatisticsResponse, AnalyticsError> {
    let query = QueryBuilder::new("SELECT duration_seconds FROM app_usage")
        .filter("application_name", params.application_name)
        .filter("user", params.user)
        .filters(usage_filters(
            params.start_date.as_deref(),
            params.end_date.as_deref(),
            params.platform,
        ))
        .build()?;

    let result = store.execute(&query)?;
    let durations: Vec<f64> = result
        .rows()
        .iter()
        .filter_map(|row: &Row| row.f64("duration_seconds"))
        .collect();

    let stats = statistics(durations.iter().copied());
    let outliers = find_outliers(&durations, OutlierMethod::Iqr);

    let mut insights = Vec::new();
    if stats.count == 0 {
        insights.push("No sessions match the selected filters".to_string());
    } else {
        if stats.mean > stats.median * 1.5 {
            insights.push(
                "Average session is well above the median; a few long sessions skew usage"
                    .to_string(),
            );
        }
        if !outliers.is_empty() {
            insights.push(format!(
                "{} of {} sessions are outliers by length",
                outliers.len(),
                stats.count
            ));
        }
    }
    if result.is_truncated() {
        insights.push(format!(
            "Only the first {} sessions were analysed",
            result.row_count()
        ));
    }

    Ok(UsageStatisticsResponse {
        tool: "usage_statistics",
        query_time_ms: result.elapsed_ms(),
        typical_session: format_duration(stats.median, DurationFormat::Human),
        average_session: format_duration(stats.mean, DurationFormat::Human),
        outlier_sessions: outliers.len(),
        truncated: result.is_truncated(),
        session_seconds: stats,
        insights,
    })
}
