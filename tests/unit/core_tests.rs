/// Core building blocks exercised through the public API
use app_usage_analytics::analytics::*;
use app_usage_analytics::dates::{self, Interval};
use app_usage_analytics::query::SqlValue;
use app_usage_analytics::*;
use serde_json::{json, Map, Value};

fn usage_row(name: &str, seconds: f64) -> Row {
    Row::new()
        .with("application_name", json!(name))
        .with("total_seconds", json!(seconds))
}

fn raw(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("raw parameters must be an object")
}

#[cfg(test)]
mod query_builder_tests {
    use super::*;

    #[test]
    fn test_null_filters_emit_no_predicate() {
        let query = build_query(
            "SELECT * FROM app_usage",
            vec![
                ("user", FilterValue::equals(1i64)),
                ("platform", FilterValue::Null),
            ],
            None,
            None,
            Some(5),
        )
        .unwrap();

        assert_eq!(query.sql.matches('?').count(), 1);
        assert!(query.sql.contains("user = ?"));
        assert!(!query.sql.contains("platform"));
        assert_eq!(query.params, vec![SqlValue::Integer(1)]);
        assert!(query.sql.ends_with("LIMIT 5"));
    }

    #[test]
    fn test_membership_filter_binds_in_order() {
        let query = build_query(
            "SELECT * FROM app_usage",
            vec![("duration_seconds", FilterValue::list([1i64, 2, 3]))],
            None,
            None,
            None,
        )
        .unwrap();

        assert!(query.sql.contains("duration_seconds IN (?,?,?)"));
        assert_eq!(
            query.params,
            vec![SqlValue::Integer(1), SqlValue::Integer(2), SqlValue::Integer(3)]
        );
    }

    #[test]
    fn test_empty_inputs_return_base_query() {
        let query = build_query("SELECT * FROM app_list", vec![], None, None, None).unwrap();
        assert_eq!(query.sql, "SELECT * FROM app_list");
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_injection_through_identifiers_is_rejected() {
        let result = build_query(
            "SELECT * FROM app_usage",
            vec![],
            Some(&["user; DROP TABLE app_usage"][..]),
            None,
            None,
        );
        assert!(matches!(result, Err(AnalyticsError::InvalidParameter { .. })));
    }
}

#[cfg(test)]
mod validator_tests {
    use super::*;

    #[test]
    fn test_count_strings_are_coerced() {
        let params = validate(&raw(json!({"limit": "50"})), &[], &["limit"]).unwrap();
        assert_eq!(params.i64("limit"), Some(50));
    }

    #[test]
    fn test_missing_required_parameter() {
        let result = validate(&raw(json!({})), &["user"], &[]);
        assert!(matches!(result, Err(AnalyticsError::MissingParameter(name)) if name == "user"));

        let result = validate(&raw(json!({"user": null})), &["user"], &[]);
        assert!(matches!(result, Err(AnalyticsError::MissingParameter(_))));
    }

    #[test]
    fn test_ceilings_and_positivity() {
        assert!(validate(&raw(json!({"limit": 10001})), &[], &["limit"]).is_err());
        assert!(validate(&raw(json!({"limit": 10000})), &[], &["limit"]).is_ok());
        assert!(validate(&raw(json!({"top_n": 0})), &[], &["top_n"]).is_err());
        assert!(validate(&raw(json!({"days": "-3"})), &[], &["days"]).is_err());
    }

    #[test]
    fn test_undeclared_keys_are_dropped() {
        let params = validate(
            &raw(json!({"user": "  alice  ", "extra": 1, "platform": null})),
            &["user"],
            &["platform"],
        )
        .unwrap();

        assert_eq!(params.len(), 1);
        assert_eq!(params.str("user"), Some("alice"));
        assert!(!params.contains("extra"));
    }

    #[test]
    fn test_flags_platforms_and_dates() {
        let params = validate(
            &raw(json!({"legacy_app": "YES", "enable_tracking": "off", "platform": "iOS"})),
            &[],
            &["legacy_app", "enable_tracking", "platform"],
        )
        .unwrap();
        assert_eq!(params.bool("legacy_app"), Some(true));
        assert_eq!(params.bool("enable_tracking"), Some(false));

        assert!(validate(&raw(json!({"legacy_app": 1})), &[], &["legacy_app"]).is_err());
        assert!(validate(&raw(json!({"platform": "ios"})), &[], &["platform"]).is_err());
        assert!(matches!(
            validate(&raw(json!({"date": "2024-13-01"})), &[], &["date"]),
            Err(AnalyticsError::InvalidDateFormat(_))
        ));
    }

    #[test]
    fn test_explicit_schema_with_choice() {
        let schema = ParamSchema::new()
            .required("metric", ParamKind::Choice(&["hours", "sessions"]))
            .optional("weight", ParamKind::Number { min: Some(0.0), max: Some(1.0) });

        let params = schema.validate(&raw(json!({"metric": "hours", "weight": "0.25"}))).unwrap();
        assert_eq!(params.f64("weight"), Some(0.25));
        assert!(schema.validate(&raw(json!({"metric": "users"}))).is_err());
        assert!(schema.validate(&raw(json!({"metric": "hours", "weight": 2}))).is_err());
    }
}

#[cfg(test)]
mod statistics_tests {
    use super::*;

    #[test]
    fn test_percentages_sum_to_100() {
        let rows = vec![
            usage_row("Chrome", 3.0),
            usage_row("Excel", 3.0),
            usage_row("Slack", 3.0),
        ];
        let shares = percentages(&rows, "total_seconds");
        let sum: f64 = shares.iter().filter_map(|r| r.f64("percentage")).sum();
        assert!((sum - 100.0).abs() < 0.05);
    }

    #[test]
    fn test_zero_total_gives_zero_percentages() {
        let rows = vec![usage_row("Chrome", 0.0), usage_row("Excel", 0.0)];
        for row in percentages(&rows, "total_seconds") {
            let share = row.f64("percentage").unwrap();
            assert_eq!(share, 0.0);
            assert!(!share.is_nan());
        }
    }

    #[test]
    fn test_rank_percentage_is_limit_invariant() {
        let rows = vec![
            usage_row("Chrome", 500.0),
            usage_row("Excel", 300.0),
            usage_row("Slack", 150.0),
            usage_row("Zoom", 50.0),
        ];

        let full = rank(&rows, "total_seconds", "application_name", None, true);
        let top = rank(&rows, "total_seconds", "application_name", Some(2), true);

        assert_eq!(top.len(), 2);
        for (limited, unlimited) in top.iter().zip(&full) {
            assert_eq!(limited.name, unlimited.name);
            assert_eq!(limited.percentage, unlimited.percentage);
        }
        assert_eq!(top[0].percentage, 50.0);
    }

    #[test]
    fn test_explicit_denominator() {
        let rows = vec![usage_row("Chrome", 25.0)];
        let shares = percentages_of(&rows, "total_seconds", 200.0);
        assert_eq!(shares[0].f64("percentage"), Some(12.5));
    }

    #[test]
    fn test_outliers_and_correlation() {
        assert_eq!(find_outliers(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0], OutlierMethod::Iqr), vec![5]);
        assert!(find_outliers(&[1.0, 2.0, 100.0], OutlierMethod::Iqr).is_empty());
        assert_eq!(correlation(&[1.0, 2.0, 3.0], &[1.0, 2.0]), 0.0);
        assert_eq!(correlation(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]), 1.0);
    }

    #[test]
    fn test_empty_statistics_are_zero() {
        let stats = statistics(Vec::<f64>::new());
        assert_eq!(stats.count, 0);
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.std_dev, 0.0);
    }

    #[test]
    fn test_moving_average_and_normalize() {
        assert_eq!(moving_average(&[1.0, 2.0, 3.0, 4.0], 2), vec![1.5, 2.5, 3.5]);
        assert!(moving_average(&[1.0], 3).is_empty());
        assert_eq!(normalize(&[4.0, 4.0], NormalizeMethod::MinMax), vec![0.5, 0.5]);
        assert_eq!(normalize(&[7.0], NormalizeMethod::ZScore), vec![0.0]);
    }

    #[test]
    fn test_time_series_lengths_must_match() {
        let result = TimeSeries::new(vec!["2024-01-01".to_string()], vec![], "usage", "hours");
        assert!(result.is_err());
    }
}

#[cfg(test)]
mod date_tests {
    use super::*;

    #[test]
    fn test_days_ago_with_reference() {
        assert_eq!(dates::days_ago(7, Some("2024-01-15")).unwrap(), "2024-01-08");
    }

    #[test]
    fn test_daily_series() {
        assert_eq!(
            dates::date_series("2024-01-01", "2024-01-05", Interval::Day).unwrap(),
            vec!["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04", "2024-01-05"]
        );
    }

    #[test]
    fn test_series_rejects_reversed_range() {
        let result = dates::date_series("2024-01-05", "2024-01-01", Interval::Day);
        assert!(matches!(result, Err(AnalyticsError::InvalidRange { .. })));
    }

    #[test]
    fn test_period_boundaries_for_reference() {
        let periods = dates::period_boundaries(Some("2024-03-13")).unwrap();
        assert_eq!(periods.get("yesterday").map(|r| r.start.as_str()), Some("2024-03-12"));
        assert_eq!(periods.get("this_week").map(|r| r.start.as_str()), Some("2024-03-11"));
        assert_eq!(periods.get("last_month").map(|r| r.end.as_str()), Some("2024-02-29"));
    }

    #[test]
    fn test_malformed_dates_fail() {
        assert!(matches!(
            dates::week_boundaries("March 13"),
            Err(AnalyticsError::InvalidDateFormat(_))
        ));
        assert!(dates::period_boundaries(Some("2024/03/13")).is_err());
    }
}
