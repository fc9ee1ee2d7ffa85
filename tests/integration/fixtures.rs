/// Fixture usage database shared by the integration tests
///
/// Totals by application: Chrome 16200s, Excel 12600s (legacy), Slack 600s.
/// Four users; dave only has a zero-length session.
use app_usage_analytics::storage::schema;
use app_usage_analytics::*;
use rusqlite::Connection;
use tempfile::NamedTempFile;

pub fn fixture_database() -> NamedTempFile {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let conn = Connection::open(temp_file.path()).expect("Failed to open fixture database");
    schema::initialize_database(&conn).expect("Failed to create schema");

    let long_description = "A fast web browser. ".repeat(8);
    conn.execute(
        "INSERT INTO app_list (app_name, app_type, current_version, released_date, publisher,
            description, download_link, enable_tracking, track_usage, track_location, track_cm,
            track_intr, registered_date)
         VALUES ('Chrome', 'Browser', '120', '2008-09-02', 'Google', ?1,
            'https://example.com/chrome', 1, 1, 0, 1, 60, '2024-01-01')",
        [long_description.trim()],
    )
    .expect("Failed to insert Chrome");

    conn.execute_batch(
        "INSERT INTO app_list (app_name, app_type, current_version, released_date, publisher,
            description, download_link, enable_tracking, track_usage, track_location, track_cm,
            track_intr, registered_date)
         VALUES ('Excel', 'Productivity', '16', '1985-09-30', 'Microsoft', 'Spreadsheet',
                    'https://example.com/excel', 1, 1, 0, 0, 300, '2024-01-01'),
                ('Notepad', 'Productivity', '10', '1985-11-20', 'Microsoft', 'Text editor',
                    'https://example.com/notepad', 0, 0, 0, 0, 0, '2024-01-02');

         INSERT INTO app_usage (monitor_app_version, platform, user, application_name,
            application_version, log_date, legacy_app, duration_seconds)
         VALUES ('1.0', 'Windows', 'alice', 'Chrome', '120', '2024-01-01', 0, 3600),
                ('1.0', 'Windows', 'alice', 'Chrome', '120', '2024-01-02', 0, 7200),
                ('1.0', 'Windows', 'alice', 'Excel', '16', '2024-01-02', 1, 1800),
                ('1.0', 'Linux', 'bob', 'Chrome', '119', '2024-01-01', 0, 1800),
                ('1.0', 'Linux', 'bob', 'Chrome', '119', '2024-01-04', 0, 3600),
                ('1.0', 'macOS', 'carol', 'Excel', '16', '2024-01-03', 1, 10800),
                ('1.0', 'iOS', 'carol', 'Slack', '4.2', '2024-01-03', 0, 600),
                ('1.0', 'Android', 'dave', 'Slack', '4.2', '2024-01-05', 0, 0);",
    )
    .expect("Failed to insert fixture rows");

    temp_file
}

pub fn fixture_store(file: &NamedTempFile) -> SqliteStore {
    let config = DatabaseConfig::new(file.path()).expect("Fixture database should exist");
    SqliteStore::new(config)
}

pub fn fixture_service(file: &NamedTempFile, settings: ServerSettings) -> AnalyticsService {
    let config = DatabaseConfig::new(file.path()).expect("Fixture database should exist");
    AnalyticsService::new(settings, config)
}
