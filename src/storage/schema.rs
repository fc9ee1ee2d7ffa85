/// Usage database schema
///
/// The analytics core only reads from the usage database. This module
/// records the known tables and columns (used to whitelist identifiers
/// interpolated into SQL text) and can create the schema, which fixtures
/// and empty deployments need.

use rusqlite::Connection;

/// Columns of the `app_usage` table
pub const APP_USAGE_COLUMNS: &[&str] = &[
    "id",
    "monitor_app_version",
    "platform",
    "user",
    "application_name",
    "application_version",
    "log_date",
    "legacy_app",
    "duration_seconds",
    "created_at",
    "updated_at",
];

/// Columns of the `app_list` table
pub const APP_LIST_COLUMNS: &[&str] = &[
    "app_id",
    "app_name",
    "app_type",
    "current_version",
    "released_date",
    "publisher",
    "description",
    "download_link",
    "enable_tracking",
    "track_usage",
    "track_location",
    "track_cm",
    "track_intr",
    "registered_date",
];

/// Tables the analytics queries may touch
pub const TABLES: &[&str] = &["app_usage", "app_list"];

/// Whether `name` is a column of one of the known tables
pub fn is_known_column(name: &str) -> bool {
    APP_USAGE_COLUMNS.contains(&name) || APP_LIST_COLUMNS.contains(&name)
}

/// Whether `name` is one of the known tables
pub fn is_known_table(name: &str) -> bool {
    TABLES.contains(&name)
}

/// Create the usage tables and their indexes if they don't exist
pub fn initialize_database(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS app_usage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            monitor_app_version TEXT NOT NULL CHECK(length(monitor_app_version) <= 50),
            platform TEXT NOT NULL CHECK(length(platform) <= 50),
            user TEXT NOT NULL CHECK(length(user) <= 100),
            application_name TEXT NOT NULL CHECK(length(application_name) <= 100),
            application_version TEXT NOT NULL CHECK(length(application_version) <= 50),
            log_date TEXT NOT NULL,
            legacy_app BOOLEAN NOT NULL,
            duration_seconds INTEGER NOT NULL CHECK(duration_seconds >= 0),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS app_list (
            app_id INTEGER PRIMARY KEY AUTOINCREMENT,
            app_name TEXT NOT NULL,
            app_type TEXT NOT NULL,
            current_version TEXT NOT NULL,
            released_date TEXT NOT NULL,
            publisher TEXT NOT NULL,
            description TEXT NOT NULL,
            download_link TEXT NOT NULL,
            enable_tracking BOOLEAN NOT NULL,
            track_usage BOOLEAN NOT NULL,
            track_location BOOLEAN NOT NULL,
            track_cm BOOLEAN NOT NULL,
            track_intr INTEGER NOT NULL,
            registered_date TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_app_usage_user ON app_usage (user);
        CREATE INDEX IF NOT EXISTS idx_app_usage_date ON app_usage (log_date);
        CREATE INDEX IF NOT EXISTS idx_app_usage_app ON app_usage (application_name);
        CREATE INDEX IF NOT EXISTS idx_app_list_name_type_version
            ON app_list (app_name, app_type, current_version);",
    )?;

    tracing::info!("Usage database schema ready");
    Ok(())
}
