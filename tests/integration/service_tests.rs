/// Analytics service tests: tool dispatch, gating and configuration
use app_usage_analytics::*;
use serde_json::{json, Map, Value};
use tempfile::NamedTempFile;

use crate::fixtures::{fixture_database, fixture_service};

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("arguments must be an object")
}

#[cfg(test)]
mod service_tests {
    use super::*;

    #[tokio::test]
    async fn test_call_tool_returns_report() {
        let db = fixture_database();
        let service = fixture_service(&db, ServerSettings::default());

        let report = service
            .call_tool("user_top_apps", args(json!({"user": "bob"})))
            .await
            .expect("Tool call should succeed");

        assert_eq!(report["tool"], json!("user_top_apps"));
        assert_eq!(report["applications"][0]["application_name"], json!("Chrome"));
        assert_eq!(report["applications"][0]["percentage"], json!(100.0));
    }

    #[tokio::test]
    async fn test_unknown_arguments_are_dropped() {
        let db = fixture_database();
        let service = fixture_service(&db, ServerSettings::default());

        let report = service
            .call_tool(
                "top_apps_by_usage",
                args(json!({"top_n": "1", "order_by": "1; DROP TABLE app_usage"})),
            )
            .await
            .expect("Unknown keys should be ignored");

        assert_eq!(report["applications"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_error_kinds_are_distinguishable() {
        let db = fixture_database();
        let service = fixture_service(&db, ServerSettings::default());

        let err = service.call_tool("no_such_tool", Map::new()).await.unwrap_err();
        assert_eq!(err.kind(), "unknown_tool");

        let err = service.call_tool("user_top_apps", Map::new()).await.unwrap_err();
        assert_eq!(err.kind(), "missing_parameter");

        let err = service
            .call_tool("top_apps_by_usage", args(json!({"start_date": "01/02/2024"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_date_format");

        let err = service
            .call_tool("top_apps_by_usage", args(json!({"top_n": 101})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
        assert!(err.to_string().contains("top_n cannot exceed 100"));
    }

    #[tokio::test]
    async fn test_advanced_tools_can_be_disabled() {
        let db = fixture_database();
        let settings = ServerSettings {
            enable_advanced_analytics: false,
            ..ServerSettings::default()
        };
        let service = fixture_service(&db, settings);

        assert!(service.tools().iter().all(|tool| tool.name != "heavy_users"));

        let err = service.call_tool("heavy_users", Map::new()).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");

        let enabled = fixture_service(&db, ServerSettings::default());
        assert!(enabled.tools().iter().any(|tool| tool.name == "heavy_users"));
        assert!(enabled.call_tool("heavy_users", Map::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_max_query_results_truncates() {
        let db = fixture_database();
        let settings = ServerSettings {
            max_query_results: 3,
            ..ServerSettings::default()
        };
        let service = fixture_service(&db, settings);

        let report = service
            .call_tool("usage_statistics", Map::new())
            .await
            .expect("Tool call should succeed");

        assert_eq!(report["truncated"], json!(true));
        assert_eq!(report["session_seconds"]["count"], json!(3));
    }

    #[tokio::test]
    async fn test_row_cap_leaves_aggregates_whole() {
        let db = fixture_database();
        let settings = ServerSettings {
            max_query_results: 2,
            ..ServerSettings::default()
        };
        let service = fixture_service(&db, settings);

        let report = service
            .call_tool("top_apps_by_usage", Map::new())
            .await
            .expect("Tool call should succeed");
        assert_eq!(report["applications"][0]["percentage"], json!(55.1));
        assert_eq!(report["summary"]["applications_with_usage"], json!(3));
        assert_eq!(report["summary"]["total_hours"], json!(8.17));

        let report = service
            .call_tool("platform_usage_stats", Map::new())
            .await
            .expect("Tool call should succeed");
        let platforms = report["platforms"].as_array().expect("platforms is a list");
        assert_eq!(platforms.len(), 5);
        for platform in platforms {
            let apps = platform["top_applications"].as_array().map(Vec::len);
            assert!(apps.unwrap_or(0) > 0, "{} lost its applications", platform["platform"]);
        }

        let report = service
            .call_tool("list_applications", Map::new())
            .await
            .expect("Tool call should succeed");
        assert_eq!(report["summary"]["total_applications"], json!(2));
        assert_eq!(report["summary"]["truncated"], json!(true));
    }

    #[test]
    fn test_open_requires_existing_database() {
        let settings = ServerSettings {
            database_path: Some("/nonexistent/app_usage.db".into()),
            ..ServerSettings::default()
        };
        let err = AnalyticsService::open(settings).unwrap_err();
        assert_eq!(err.kind(), "config_error");

        let err = AnalyticsService::open(ServerSettings::default()).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn test_open_with_settings_file() {
        let db = fixture_database();
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        let contents = json!({
            "log_level": "DEBUG",
            "max_query_results": 10,
            "database_path": db.path(),
        });
        std::io::Write::write_all(&mut file, contents.to_string().as_bytes()).unwrap();

        let settings = ServerSettings::from_file(file.path()).expect("Settings should parse");
        assert_eq!(settings.tracing_level(), "debug");
        assert_eq!(settings.query_timeout_secs, 30);

        let service = AnalyticsService::open(settings).expect("Service should open");
        assert_eq!(service.settings().max_query_results, 10);
        assert_eq!(service.store().config().path(), db.path());
    }

    #[test]
    fn test_catalog_schemas_describe_parameters() {
        let tools = catalog();
        assert_eq!(tools.len(), 9);

        let top_apps = tools
            .iter()
            .find(|tool| tool.name == "top_apps_by_usage")
            .expect("top_apps_by_usage is listed");
        let properties = &top_apps.input_schema["properties"];
        assert!(properties.get("top_n").is_some());
        assert!(properties.get("platform").is_some());
    }
}
