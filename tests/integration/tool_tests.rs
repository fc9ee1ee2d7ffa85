/// Tool handlers against the fixture database
use app_usage_analytics::tools::*;
use app_usage_analytics::*;
use serde_json::json;

use crate::fixtures::{fixture_database, fixture_store};

fn args(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().expect("arguments must be an object")
}

#[cfg(test)]
mod tool_tests {
    use super::*;

    #[test]
    fn test_list_applications_summary() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = ListApplicationsParams::parse(&args(json!({}))).unwrap();
        let report = list_applications(&store, params).unwrap();

        let names: Vec<&str> = report.applications.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Chrome", "Excel", "Notepad"]);
        assert_eq!(report.summary.total_applications, 3);
        assert_eq!(report.summary.tracking_enabled, 2);
        assert_eq!(report.summary.tracking_disabled, 1);
        assert!(report.applications[0].description.ends_with("..."));

        let top_type = &report.summary.top_app_types[0];
        assert_eq!(top_type.name, "Productivity");
        assert_eq!(top_type.value, 2.0);
    }

    #[test]
    fn test_list_applications_filters_and_sorting() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = ListApplicationsParams::parse(&args(json!({
            "enable_tracking": "no",
        })))
        .unwrap();
        let report = list_applications(&store, params).unwrap();
        assert_eq!(report.applications.len(), 1);
        assert_eq!(report.applications[0].name, "Notepad");

        let params = ListApplicationsParams::parse(&args(json!({
            "sort_by": "released_date",
            "sort_order": "desc",
            "limit": "2",
        })))
        .unwrap();
        let report = list_applications(&store, params).unwrap();
        let names: Vec<&str> = report.applications.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Chrome", "Notepad"]);

        let bad = ListApplicationsParams::parse(&args(json!({"sort_by": "description"})));
        assert!(matches!(bad, Err(AnalyticsError::InvalidParameter { .. })));
    }

    #[test]
    fn test_app_details_with_usage() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = AppDetailsParams::parse(&args(json!({
            "app_name": "  Excel ",
            "include_usage_stats": true,
        })))
        .unwrap();
        let report = app_details(&store, params).unwrap();

        assert_eq!(report.application.publisher, "Microsoft");
        assert_eq!(report.application.tracking.interval_seconds, 300);
        let usage = report.usage_statistics.expect("Excel has usage");
        assert_eq!(usage.total_sessions, 2);
        assert_eq!(usage.unique_users, 2);
        assert_eq!(usage.total_usage_hours, 3.5);
        assert_eq!(usage.average_session_minutes, 105.0);
        assert_eq!(usage.first_usage_date, "2024-01-02");
        assert_eq!(usage.platforms_used, 2);
    }

    #[test]
    fn test_app_details_unknown_and_unused() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = AppDetailsParams::parse(&args(json!({"app_name": "Photoshop"}))).unwrap();
        let err = app_details(&store, params).unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");

        let params = AppDetailsParams::parse(&args(json!({
            "app_name": "Notepad",
            "include_usage_stats": "yes",
        })))
        .unwrap();
        let report = app_details(&store, params).unwrap();
        assert!(report.usage_statistics.is_none());
        assert_eq!(report.insights.len(), 2);
    }

    #[test]
    fn test_top_apps_percentages_use_full_total() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = TopAppsParams::parse(&args(json!({"top_n": 2}))).unwrap();
        let report = top_apps_by_usage(&store, params).unwrap();

        assert_eq!(report.applications.len(), 2);
        assert_eq!(report.applications[0].application_name, "Chrome");
        assert_eq!(report.applications[0].total_hours, 4.5);
        assert_eq!(report.applications[0].percentage, 55.1);
        assert_eq!(report.applications[1].percentage, 42.86);
        assert_eq!(report.summary.applications_with_usage, 3);
        assert_eq!(report.summary.listed_share, 97.96);
    }

    #[test]
    fn test_top_apps_date_and_platform_filters() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = TopAppsParams::parse(&args(json!({
            "start_date": "2024-01-02",
            "end_date": "2024-01-03",
            "platform": "Windows",
        })))
        .unwrap();
        let report = top_apps_by_usage(&store, params).unwrap();

        let names: Vec<&str> = report
            .applications
            .iter()
            .map(|a| a.application_name.as_str())
            .collect();
        assert_eq!(names, vec!["Chrome", "Excel"]);
        assert_eq!(report.applications[0].percentage, 80.0);

        let reversed = TopAppsParams::parse(&args(json!({
            "start_date": "2024-02-01",
            "end_date": "2024-01-01",
        })));
        assert!(matches!(reversed, Err(AnalyticsError::InvalidRange { .. })));
    }

    #[test]
    fn test_platform_usage_stats() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = PlatformUsageParams::parse(&args(json!({"limit": 1}))).unwrap();
        let report = platform_usage_stats(&store, params).unwrap();

        let platforms: Vec<&str> = report.platforms.iter().map(|p| p.platform.as_str()).collect();
        assert_eq!(platforms, vec!["Windows", "macOS", "Linux", "iOS", "Android"]);

        let windows = &report.platforms[0];
        assert_eq!(windows.percentage, 42.86);
        assert_eq!(windows.top_applications.len(), 1);
        assert_eq!(windows.top_applications[0].application_name, "Chrome");
        assert_eq!(windows.top_applications[0].total_hours, 3.0);

        let share: f64 = report.platforms.iter().map(|p| p.percentage).sum();
        assert!((share - 100.0).abs() < 0.05);
    }

    #[test]
    fn test_usage_statistics_for_application() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = UsageStatisticsParams::parse(&args(json!({"application_name": "Chrome"}))).unwrap();
        let report = usage_statistics(&store, params).unwrap();

        assert_eq!(report.session_seconds.count, 4);
        assert_eq!(report.session_seconds.mean, 4050.0);
        assert_eq!(report.session_seconds.median, 3600.0);
        assert_eq!(report.typical_session, "1 hour");
        assert!(!report.truncated);
    }

    #[test]
    fn test_usage_statistics_no_rows() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = UsageStatisticsParams::parse(&args(json!({"user": "zoe"}))).unwrap();
        let report = usage_statistics(&store, params).unwrap();

        assert_eq!(report.session_seconds.count, 0);
        assert_eq!(report.session_seconds.mean, 0.0);
        assert_eq!(report.typical_session, "0 seconds");
    }

    #[test]
    fn test_user_top_apps() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = UserTopAppsParams::parse(&args(json!({"user": "alice", "top_n": 1}))).unwrap();
        let report = user_top_apps(&store, params).unwrap();

        assert_eq!(report.user, "alice");
        assert_eq!(report.applications.len(), 1);
        assert_eq!(report.applications[0].application_name, "Chrome");
        assert_eq!(report.applications[0].percentage, 85.71);
        assert_eq!(report.applications[0].first_used, "2024-01-01");
        assert_eq!(report.summary.applications_used, 2);
        assert_eq!(report.summary.total_hours, 3.5);

        let missing = UserTopAppsParams::parse(&args(json!({"top_n": 5})));
        assert!(matches!(missing, Err(AnalyticsError::MissingParameter(_))));
    }

    #[test]
    fn test_heavy_users_threshold_and_denominator() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = HeavyUsersParams::parse(&args(json!({"threshold_hours": 3}))).unwrap();
        let report = heavy_users(&store, params).unwrap();

        let users: Vec<&str> = report.users.iter().map(|u| u.user.as_str()).collect();
        assert_eq!(users, vec!["alice", "carol"]);
        assert_eq!(report.users[0].total_hours, 3.5);
        assert_eq!(report.users[0].percentage, 42.86);
        assert_eq!(report.users[0].apps_used, 2);
        assert_eq!(report.summary.total_users, 3);
        assert_eq!(report.summary.heavy_user_share, 66.67);
    }

    #[test]
    fn test_heavy_users_sorting_and_app_filter() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = HeavyUsersParams::parse(&args(json!({
            "threshold_hours": 1,
            "sort_by": "sessions",
            "sort_order": "asc",
            "app_name": "Chrome",
        })))
        .unwrap();
        let report = heavy_users(&store, params).unwrap();

        let users: Vec<&str> = report.users.iter().map(|u| u.user.as_str()).collect();
        assert_eq!(users.len(), 2);
        assert!(users.contains(&"alice") && users.contains(&"bob"));
        assert_eq!(report.summary.total_users, 2);
        assert!(report.users.iter().all(|u| u.apps_used == 1));
    }

    #[test]
    fn test_daily_usage_trend_fills_gaps() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = DailyTrendParams::parse(&args(json!({
            "application_name": "Chrome",
            "window": 2,
        })))
        .unwrap();
        let report = daily_usage_trend(&store, params).unwrap();

        assert_eq!(
            report.series.timestamps(),
            &["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04"]
        );
        assert_eq!(report.series.values(), &[1.5, 2.0, 0.0, 1.0]);
        assert_eq!(report.points[0].moving_average, None);
        assert_eq!(report.points[1].moving_average, Some(1.75));
        assert_eq!(report.points[3].moving_average, Some(0.5));
        assert_eq!(report.summary.active_buckets, 3);
        assert_eq!(report.summary.growth_rate, -71.43);
        assert_eq!(report.summary.trend, "decreasing");
        assert_eq!(report.summary.peak_date.as_deref(), Some("2024-01-02"));
    }

    #[test]
    fn test_daily_usage_trend_weekly_and_range_cap() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = DailyTrendParams::parse(&args(json!({
            "application_name": "Chrome",
            "start_date": "2024-01-01",
            "end_date": "2024-01-14",
            "interval": "week",
        })))
        .unwrap();
        let report = daily_usage_trend(&store, params).unwrap();
        assert_eq!(report.series.timestamps(), &["2024-01-01", "2024-01-08"]);
        assert_eq!(report.series.values(), &[4.5, 0.0]);

        let params = DailyTrendParams::parse(&args(json!({
            "application_name": "Chrome",
            "start_date": "2020-01-01",
            "end_date": "2024-01-01",
        })))
        .unwrap();
        assert!(daily_usage_trend(&store, params).is_err());
    }

    #[test]
    fn test_daily_usage_trend_long_history() {
        let db = fixture_database();
        rusqlite::Connection::open(db.path())
            .and_then(|conn| {
                conn.execute(
                    "INSERT INTO app_usage (monitor_app_version, platform, user, application_name,
                        application_version, log_date, legacy_app, duration_seconds)
                     VALUES ('1.0', 'Windows', 'alice', 'Chrome', '90', '2021-06-01', 0, 3600)",
                    [],
                )
            })
            .expect("Failed to insert old session");
        let store = fixture_store(&db);

        let params = DailyTrendParams::parse(&args(json!({"application_name": "Chrome"}))).unwrap();
        let report = daily_usage_trend(&store, params).expect("Defaulted range should be clamped");
        assert_eq!(report.series.len(), 731);
        assert_eq!(report.series.timestamps().first().map(String::as_str), Some("2022-01-04"));
        assert_eq!(report.series.timestamps().last().map(String::as_str), Some("2024-01-04"));
        assert_eq!(report.summary.total_hours, 4.5);
        assert!(report.insights.iter().any(|i| i.contains("exceeds 731 days")));

        let params = DailyTrendParams::parse(&args(json!({
            "application_name": "Chrome",
            "start_date": "2021-06-01",
        })))
        .unwrap();
        let report = daily_usage_trend(&store, params).unwrap();
        assert_eq!(report.series.timestamps().last().map(String::as_str), Some("2023-06-01"));
        assert_eq!(report.summary.total_hours, 1.0);

        let params = DailyTrendParams::parse(&args(json!({
            "application_name": "Chrome",
            "start_date": "2021-06-01",
            "end_date": "2024-01-04",
        })))
        .unwrap();
        let err = daily_usage_trend(&store, params).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidParameter { ref name, .. } if name == "end_date"));
    }

    #[test]
    fn test_legacy_vs_modern() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = LegacyVsModernParams::parse(&args(json!({}))).unwrap();
        let report = legacy_vs_modern(&store, params).unwrap();

        assert_eq!(report.total_users, 4);
        assert_eq!(report.legacy.total_hours, 3.5);
        assert_eq!(report.legacy.usage_share, 42.86);
        assert_eq!(report.legacy.user_share, 50.0);
        assert_eq!(report.modern.user_share, 100.0);
        assert_eq!(report.top_legacy_applications.len(), 1);
        assert_eq!(report.top_legacy_applications[0].application_name, "Excel");
        assert_eq!(report.top_legacy_applications[0].last_used, "2024-01-03");
    }

    #[test]
    fn test_reports_serialize_with_tool_name() {
        let db = fixture_database();
        let store = fixture_store(&db);

        let params = TopAppsParams::parse(&args(json!({}))).unwrap();
        let report = serde_json::to_value(top_apps_by_usage(&store, params).unwrap()).unwrap();

        assert_eq!(report["tool"], json!("top_apps_by_usage"));
        assert!(report["query_time_ms"].as_f64().unwrap() >= 0.0);
        assert!(report["insights"].as_array().map_or(false, |i| !i.is_empty()));
    }
}
