/// Main entry point for the app-usage analytics command line
///
/// This file sets up logging, resolves settings and runs one analytics tool,
/// printing its JSON report to stdout. Logs go to stderr.

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use app_usage_analytics::{AnalyticsService, ServerSettings};

/// Get the default database path from an ordered list of candidates
///
/// The first candidate that exists wins; if none does, the first candidate
/// is returned so the error names the preferred location.
fn get_default_database_path() -> PathBuf {
    let potential_paths = [
        // 1. User's home directory (preferred)
        dirs::home_dir().map(|p| p.join(".app_usage").join("app_usage.db")),
        // 2. User's data directory (platform-specific)
        dirs::data_dir().map(|p| p.join("app_usage").join("app_usage.db")),
        // 3. Current working directory
        std::env::current_dir().ok().map(|p| p.join("app_usage.db")),
    ];

    let candidates: Vec<PathBuf> = potential_paths.into_iter().flatten().collect();
    candidates
        .iter()
        .find(|path| path.is_file())
        .or_else(|| candidates.first())
        .cloned()
        .unwrap_or_else(|| PathBuf::from("app_usage.db"))
}

/// Command line arguments for the analytics tool runner
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the SQLite usage database
    /// If not provided, uses the configured path or a default location
    #[arg(long)]
    database: Option<PathBuf>,

    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output (implies debug)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tool catalog with input schemas
    Tools,
    /// Run one tool and print its report
    Run {
        /// Tool name, e.g. top_apps_by_usage
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

fn parse_arguments(raw: &str) -> Result<Map<String, Value>, Box<dyn std::error::Error>> {
    match serde_json::from_str(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err("--args must be a JSON object".into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut settings = ServerSettings::load(args.config.as_deref())?;

    // Set up logging based on command line flags
    let log_level = if args.verbose {
        "debug"
    } else if args.debug {
        "info"
    } else {
        settings.tracing_level()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("app_usage_analytics={}", log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr) // Send logs to stderr, not stdout
        .init();

    // Determine database path
    let db_path = args
        .database
        .or_else(|| settings.database_path.clone())
        .unwrap_or_else(get_default_database_path);
    info!("Using database at: {}", db_path.display());
    settings.database_path = Some(db_path);

    let service = AnalyticsService::open(settings)?;

    match args.command {
        Command::Tools => {
            println!("{}", serde_json::to_string_pretty(&service.tools())?);
        }
        Command::Run { tool, args } => {
            let arguments = parse_arguments(&args)?;
            match service.call_tool(&tool, arguments).await {
                Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                Err(e) => {
                    let failure = json!({
                        "tool": tool,
                        "error": e.to_string(),
                        "kind": e.kind(),
                    });
                    println!("{}", serde_json::to_string_pretty(&failure)?);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
