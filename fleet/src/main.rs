//! wpfleet - Entry Point
//!
//! Command line tool for auditing and maintaining the WordPress sites of a
//! Softaculous-managed hosting account.

use std::env;
use std::process::ExitCode;

use colored::Colorize;
use tracing::error;

use wpfleet::app::options::CliArgs;
use wpfleet::app::run::run;
use wpfleet::app::state::AppState;
use wpfleet::logs::{init_logging, LogOptions};
use wpfleet::storage::layout::StorageLayout;
use wpfleet::storage::settings::Settings;
use wpfleet::utils::version_info;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse(env::args().skip(1));

    // Print version and exit
    if args.command.as_deref() == Some("version") || args.flag("version") {
        let version = version_info();
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{json}"),
            Err(_) => println!("{}", version.version),
        }
        return ExitCode::SUCCESS;
    }

    let layout = match args.data_dir() {
        Some(dir) => StorageLayout::new(dir),
        None => StorageLayout::default(),
    };

    let settings = match Settings::load(&layout.settings_file()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {}", "Failed to load settings:".red(), e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging; the guard flushes the log file on exit
    let log_level = match args.get("log-level") {
        Some(level) => level.parse().unwrap_or(settings.log_level.clone()),
        None => settings.log_level.clone(),
    };
    let logs_dir = layout.logs_dir();
    let log_dir = match logs_dir.create().await {
        Ok(()) => Some(logs_dir.path().to_path_buf()),
        Err(e) => {
            eprintln!("Logging to stderr only, cannot create {}: {e}", logs_dir.path().display());
            None
        }
    };
    let log_options = LogOptions {
        log_level,
        log_dir,
        ..Default::default()
    };
    let _guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let state = match AppState::init(layout, settings).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize: {e}");
            eprintln!("{} {}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    match run(&state, &args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {e}");
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
