/// Tools reporting on individual users
///
/// This module implements `user_top_apps` and `heavy_users`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::analytics::{percentage, percentages, percentages_of, round_to};
use crate::domain::AnalyticsError;
use crate::query::{
    build_aggregation, Aggregate, Comparison, FilterValue, QueryBuilder, SortOrder,
};
use crate::storage::AnalyticsStore;
use crate::tools::{count, hours, minutes, number, text, ToolParams};
use crate::validation::{ParamKind, ParamSchema, MAX_TOP_N};

/// Parameters for one user's most used applications
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UserTopAppsParams {
    pub user: String,
    /// Number of applications to return (default: 10, max: 100)
    pub top_n: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl ToolParams for UserTopAppsParams {
    fn schema() -> ParamSchema {
        ParamSchema::new()
            .required("user", ParamKind::Identifier)
            .optional("top_n", ParamKind::Count { max: Some(MAX_TOP_N) })
            .optional("start_date", ParamKind::Date)
            .optional("end_date", ParamKind::Date)
    }
}

/// One application in a user's ranking
#[derive(Debug, Serialize)]
pub struct UserApp {
    pub rank: usize,
    pub application_name: String,
    pub total_hours: f64,
    /// Share of the user's total usage
    pub percentage: f64,
    pub sessions: i64,
    pub avg_session_minutes: f64,
    pub first_used: String,
    pub last_used: String,
    pub platforms: i64,
}

#[derive(Debug, Serialize)]
pub struct UserTopAppsSummary {
    pub applications_used: usize,
    pub total_hours: f64,
    pub total_sessions: i64,
}

/// Response with one user's most used applications
#[derive(Debug, Serialize)]
pub struct UserTopAppsResponse {
    pub tool: &'static str,
    pub query_time_ms: f64,
    pub user: String,
    pub applications: Vec<UserApp>,
    pub summary: UserTopAppsSummary,
    pub insights: Vec<String>,
}

/// Most used applications for a single user
pub fn user_top_apps<S: AnalyticsStore>(
    store: &S,
    params: UserTopAppsParams,
) -> Result<UserTopAppsResponse, AnalyticsError> {
    let top_n = params.top_n.unwrap_or(10) as usize;

    let query = build_aggregation(
        "app_usage",
        &["application_name"],
        &["application_name"],
        &[
            ("total_seconds", Aggregate::sum("duration_seconds")),
            ("sessions", Aggregate::Count),
            ("avg_session_seconds", Aggregate::avg("duration_seconds")),
            ("first_used", Aggregate::min("log_date")),
            ("last_used", Aggregate::max("log_date")),
            ("platforms", Aggregate::count_distinct("platform")),
        ],
        vec![
            ("user", FilterValue::equals(params.user.as_str())),
            (
                "log_date",
                FilterValue::date_range(params.start_date.as_deref(), params.end_date.as_deref()),
            ),
        ],
        &[("total_seconds", SortOrder::Desc)],
        None,
    )?;

    let result = store.execute(&query)?;
    let rows = percentages(result.rows(), "total_seconds");

    let total_seconds: f64 = rows.iter().map(|row| number(row, "total_seconds")).sum();
    let total_sessions: i64 = rows.iter().map(|row| count(row, "sessions")).sum();

    let applications: Vec<UserApp> = rows
        .iter()
        .take(top_n)
        .enumerate()
        .map(|(index, row)| UserApp {
            rank: index + 1,
            application_name: text(row, "application_name"),
            total_hours: hours(number(row, "total_seconds")),
            percentage: number(row, "percentage"),
            sessions: count(row, "sessions"),
            avg_session_minutes: minutes(number(row, "avg_session_seconds")),
            first_used: text(row, "first_used"),
            last_used: text(row, "last_used"),
            platforms: count(row, "platforms"),
        })
        .collect();

    let mut insights = Vec::new();
    match applications.first() {
        Some(favourite) => {
            insights.push(format!(
                "{} spends most time in {} ({:.2}% of their usage)",
                params.user, favourite.application_name, favourite.percentage
            ));
            if favourite.percentage >= 50.0 {
                insights.push("Usage is concentrated in a single application".to_string());
            }
        }
        None => insights.push(format!("No usage recorded for user '{}'", params.user)),
    }

    Ok(UserTopAppsResponse {
        tool: "user_top_apps",
        query_time_ms: result.elapsed_ms(),
        summary: UserTopAppsSummary {
            applications_used: rows.len(),
            total_hours: hours(total_seconds),
            total_sessions,
        },
        user: params.user,
        applications,
        insights,
    })
}

/// Orderings for `heavy_users`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HeavyUserSort {
    #[default]
    TotalHours,
    Sessions,
    AppsUsed,
    AvgSessionHours,
}

impl HeavyUserSort {
    const NAMES: &'static [&'static str] =
        &["total_hours", "sessions", "apps_used", "avg_session_hours"];

    fn column(&self) -> &'static str {
        match self {
            HeavyUserSort::TotalHours => "total_seconds",
            HeavyUserSort::Sessions => "sessions",
            HeavyUserSort::AppsUsed => "apps_used",
            HeavyUserSort::AvgSessionHours => "avg_session_seconds",
        }
    }
}

/// Parameters for finding heavy users
#[derive(Debug, Deserialize, JsonSchema)]
pub struct HeavyUsersParams {
    /// Maximum number of users to return (default: 20, max: 1000)
    pub limit: Option<u32>,
    /// Only count usage of this application
    pub app_name: Option<String>,
    /// Minimum total hours to qualify (default: 50)
    pub threshold_hours: Option<f64>,
    #[serde(default)]
    pub sort_by: HeavyUserSort,
    /// Defaults to descending
    pub sort_order: Option<SortOrder>,
}

impl ToolParams for HeavyUsersParams {
    fn schema() -> ParamSchema {
        ParamSchema::new()
            .optional("limit", ParamKind::Count { max: Some(1000) })
            .optional("app_name", ParamKind::Identifier)
            .optional(
                "threshold_hours",
                ParamKind::Number {
                    min: Some(1.0),
                    max: Some(1000.0),
                },
            )
            .optional("sort_by", ParamKind::Choice(HeavyUserSort::NAMES))
            .optional("sort_order", ParamKind::Choice(&["asc", "desc"]))
    }
}

/// Usage intensity bands by total hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageCategory {
    Extreme,
    VeryHigh,
    High,
    Moderate,
}

impl UsageCategory {
    pub fn from_hours(total_hours: f64) -> Self {
        if total_hours >= 500.0 {
            UsageCategory::Extreme
        } else if total_hours >= 200.0 {
            UsageCategory::VeryHigh
        } else if total_hours >= 100.0 {
            UsageCategory::High
        } else {
            UsageCategory::Moderate
        }
    }
}

/// One user above the threshold
#[derive(Debug, Serialize)]
pub struct HeavyUser {
    pub rank: usize,
    pub user: String,
    pub total_hours: f64,
    pub sessions: i64,
    pub apps_used: i64,
    pub avg_session_hours: f64,
    pub first_session_date: String,
    pub last_session_date: String,
    pub category: UsageCategory,
    /// Share of all users' usage time
    pub percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct HeavyUsersSummary {
    pub heavy_users: usize,
    pub total_users: i64,
    /// Heavy users as a share of all users
    pub heavy_user_share: f64,
    pub combined_hours: f64,
    pub threshold_hours: f64,
}

/// Response from finding heavy users
#[derive(Debug, Serialize)]
pub struct HeavyUsersResponse {
    pub tool: &'static str,
    pub query_time_ms: f64,
    pub users: Vec<HeavyUser>,
    pub summary: HeavyUsersSummary,
    pub insights: Vec<String>,
}

/// Users whose total usage meets `threshold_hours`
pub fn heavy_users<S: AnalyticsStore>(
    store: &S,
    params: HeavyUsersParams,
) -> Result<HeavyUsersResponse, AnalyticsError> {
    let threshold_hours = params.threshold_hours.unwrap_or(50.0);
    let threshold_seconds = (threshold_hours * 3600.0).round() as i64;
    let app_filter = params.app_name.as_deref();

    let heavy = QueryBuilder::new(
        "SELECT user, COUNT(*) AS sessions, SUM(duration_seconds) AS total_seconds, \
         AVG(duration_seconds) AS avg_session_seconds, \
         COUNT(DISTINCT application_name) AS apps_used, \
         MIN(log_date) AS first_session_date, MAX(log_date) AS last_session_date \
         FROM app_usage WHERE duration_seconds > 0",
    )
    .continue_where()
    .allow([
        "sessions",
        "total_seconds",
        "avg_session_seconds",
        "apps_used",
        "first_session_date",
        "last_session_date",
    ])
    .filter("application_name", app_filter)
    .group_by(["user"])
    .having(Aggregate::sum("duration_seconds"), Comparison::Gte, threshold_seconds)
    .order_by(params.sort_by.column(), params.sort_order.unwrap_or(SortOrder::Desc))
    .limit(Some(params.limit.unwrap_or(20)))
    .uncapped()
    .build()?;

    let population = QueryBuilder::new(
        "SELECT COUNT(DISTINCT user) AS total_users, SUM(duration_seconds) AS total_seconds \
         FROM app_usage WHERE duration_seconds > 0",
    )
    .continue_where()
    .filter("application_name", app_filter)
    .build()?;

    let results = store.execute_batch(&[heavy, population])?;
    let query_time_ms = results.iter().map(|r| r.elapsed_ms()).sum();

    let totals = results[1].first().cloned().unwrap_or_default();
    let total_users = count(&totals, "total_users");
    let rows = percentages_of(results[0].rows(), "total_seconds", number(&totals, "total_seconds"));

    let users: Vec<HeavyUser> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let total_hours = hours(number(row, "total_seconds"));
            HeavyUser {
                rank: index + 1,
                user: text(row, "user"),
                total_hours,
                sessions: count(row, "sessions"),
                apps_used: count(row, "apps_used"),
                avg_session_hours: hours(number(row, "avg_session_seconds")),
                first_session_date: text(row, "first_session_date"),
                last_session_date: text(row, "last_session_date"),
                category: UsageCategory::from_hours(total_hours),
                percentage: number(row, "percentage"),
            }
        })
        .collect();

    let combined_hours = round_to(users.iter().map(|u| u.total_hours).sum(), 2);
    let heavy_user_share = percentage(users.len() as f64, total_users as f64);

    let mut insights = Vec::new();
    if users.is_empty() {
        insights.push(format!("No users reached {} hours of usage", threshold_hours));
    } else {
        insights.push(format!(
            "{} of {} users ({:.2}%) used at least {} hours",
            users.len(),
            total_users,
            heavy_user_share,
            threshold_hours
        ));
        let extreme = users
            .iter()
            .filter(|u| u.category == UsageCategory::Extreme)
            .count();
        if extreme > 0 {
            insights.push(format!("{} users exceed 500 hours", extreme));
        }
    }

    Ok(HeavyUsersResponse {
        tool: "heavy_users",
        query_time_ms,
        summary: HeavyUsersSummary {
            heavy_users: users.len(),
            total_users,
            heavy_user_share,
            combined_hours,
            threshold_hours,
        },
        users,
        insights,
    })
}
