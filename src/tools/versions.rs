/// Comparison of legacy and modern application usage
///
/// Rows in `app_usage` carry a `legacy_app` flag recorded by the monitor.
/// This tool splits usage by that flag and lists the most used legacy
/// applications.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::analytics::{percentages, percentages_of};
use crate::domain::{AnalyticsError, Platform, Row};
use crate::query::{build_aggregation, Aggregate, FilterValue, QueryBuilder, SortOrder};
use crate::storage::AnalyticsStore;
use crate::tools::{count, flag, hours, minutes, number, text, ToolParams};
use crate::validation::{ParamKind, ParamSchema, MAX_TOP_N};

/// Parameters for the legacy/modern comparison
#[derive(Debug, Deserialize, JsonSchema)]
pub struct LegacyVsModernParams {
    /// Number of legacy applications to list (default: 10, max: 100)
    pub limit: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub platform: Option<Platform>,
}

impl ToolParams for LegacyVsModernParams {
    fn schema() -> ParamSchema {
        ParamSchema::new()
            .optional("limit", ParamKind::Count { max: Some(MAX_TOP_N) })
            .optional("start_date", ParamKind::Date)
            .optional("end_date", ParamKind::Date)
            .optional("platform", ParamKind::Platform)
    }
}

/// Usage of one category
#[derive(Debug, Default, Serialize)]
pub struct CategoryUsage {
    pub total_hours: f64,
    pub sessions: i64,
    pub unique_users: i64,
    pub applications: i64,
    pub avg_session_minutes: f64,
    /// Share of usage time
    pub usage_share: f64,
    /// Share of all distinct users; the two categories can overlap
    pub user_share: f64,
}

/// A legacy application still in use
#[derive(Debug, Serialize)]
pub struct LegacyApp {
    pub rank: usize,
    pub application_name: String,
    pub total_hours: f64,
    pub unique_users: i64,
    pub last_used: String,
}

/// Response from the legacy/modern comparison
#[derive(Debug, Serialize)]
pub struct LegacyVsModernResponse {
    pub tool: &'static str,
    pub query_time_ms: f64,
    pub legacy: CategoryUsage,
    pub modern: CategoryUsage,
    pub total_users: i64,
    pub top_legacy_applications: Vec<LegacyApp>,
    pub insights: Vec<String>,
}

fn category(rows: &[Row], user_shares: &[Row], legacy: bool) -> CategoryUsage {
    let find = |rows: &[Row]| rows.iter().find(|row| flag(row, "legacy_app") == legacy).cloned();

    match (find(rows), find(user_shares)) {
        (Some(row), Some(users)) => CategoryUsage {
            total_hours: hours(number(&row, "total_seconds")),
            sessions: count(&row, "sessions"),
            unique_users: count(&row, "unique_users"),
            applications: count(&row, "applications"),
            avg_session_minutes: minutes(number(&row, "avg_session_seconds")),
            usage_share: number(&row, "percentage"),
            user_share: number(&users, "percentage"),
        },
        _ => CategoryUsage::default(),
    }
}

/// Split usage between legacy and modern applications
pub fn legacy_vs_modern<S: AnalyticsStore>(
    store: &S,
    params: LegacyVsModernParams,
) -> Result<LegacyVsModernResponse, AnalyticsError> {
    let filters = || {
        vec![
            (
                "log_date",
                FilterValue::date_range(params.start_date.as_deref(), params.end_date.as_deref()),
            ),
            ("platform", params.platform.map(|p| p.as_str()).into()),
        ]
    };

    let categories = build_aggregation(
        "app_usage",
        &["legacy_app"],
        &["legacy_app"],
        &[
            ("total_seconds", Aggregate::sum("duration_seconds")),
            ("sessions", Aggregate::Count),
            ("unique_users", Aggregate::count_distinct("user")),
            ("applications", Aggregate::count_distinct("application_name")),
            ("avg_session_seconds", Aggregate::avg("duration_seconds")),
        ],
        filters(),
        &[("legacy_app", SortOrder::Asc)],
        None,
    )?;

    let population = QueryBuilder::new("SELECT COUNT(DISTINCT user) AS total_users FROM app_usage")
        .filters(filters())
        .build()?;

    let top_legacy = QueryBuilder::aggregation(
        "app_usage",
        &["application_name"],
        &[
            ("total_seconds", Aggregate::sum("duration_seconds")),
            ("unique_users", Aggregate::count_distinct("user")),
            ("last_used", Aggregate::max("log_date")),
        ],
    )?
    .filter("legacy_app", true)
    .filters(filters())
    .group_by(["application_name"])
    .order_by("total_seconds", SortOrder::Desc)
    .limit(Some(params.limit.unwrap_or(10)))
    .build()?;

    let results = store.execute_batch(&[categories, population, top_legacy])?;
    let query_time_ms = results.iter().map(|r| r.elapsed_ms()).sum();

    let total_users = results[1].first().map_or(0, |row| count(row, "total_users"));
    let usage_rows = percentages(results[0].rows(), "total_seconds");
    let user_rows = percentages_of(results[0].rows(), "unique_users", total_users as f64);

    let legacy = category(&usage_rows, &user_rows, true);
    let modern = category(&usage_rows, &user_rows, false);

    let top_legacy_applications: Vec<LegacyApp> = results[2]
        .rows()
        .iter()
        .enumerate()
        .map(|(index, row)| LegacyApp {
            rank: index + 1,
            application_name: text(row, "application_name"),
            total_hours: hours(number(row, "total_seconds")),
            unique_users: count(row, "unique_users"),
            last_used: text(row, "last_used"),
        })
        .collect();

    let mut insights = Vec::new();
    if legacy.sessions == 0 && modern.sessions == 0 {
        insights.push("No usage recorded for the selected filters".to_string());
    } else if legacy.sessions == 0 {
        insights.push("No legacy applications are in use".to_string());
    } else {
        insights.push(format!(
            "Legacy applications account for {:.2}% of usage time across {:.2}% of users",
            legacy.usage_share, legacy.user_share
        ));
        if legacy.usage_share >= 25.0 {
            insights.push(
                "Legacy usage is substantial; prioritise migration of the top legacy applications"
                    .to_string(),
            );
        }
        if let Some(top) = top_legacy_applications.first() {
            insights.push(format!(
                "{} is the most used legacy application with {} users",
                top.application_name, top.unique_users
            ));
        }
    }

    Ok(LegacyVsModernResponse {
        tool: "legacy_vs_modern",
        query_time_ms,
        legacy,
        modern,
        total_users,
        top_legacy_applications,
        insights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_picks_matching_flag() {
        let rows = vec![
            Row::new()
                .with("legacy_app", json!(0))
                .with("total_seconds", json!(7200))
                .with("sessions", json!(3))
                .with("percentage", json!(80.0)),
            Row::new()
                .with("legacy_app", json!(1))
                .with("total_seconds", json!(1800))
                .with("sessions", json!(1))
                .with("percentage", json!(20.0)),
        ];

        let legacy = category(&rows, &rows, true);
        assert_eq!(legacy.total_hours, 0.5);
        assert_eq!(legacy.usage_share, 20.0);

        let modern = category(&rows, &rows, false);
        assert_eq!(modern.sessions, 3);
    }

    #[test]
    fn test_missing_category_is_zero() {
        let legacy = category(&[], &[], true);
        assert_eq!(legacy.sessions, 0);
        assert_eq!(legacy.usage_share, 0.0);
    }
}
