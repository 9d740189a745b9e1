//! File logging
//!
//! Only initializes if QUOTESYNC_LOG is set, so terminal output stays clean.
//! Logs go to `config.log_file` or `{data_dir}/quotesync.log`.

use std::fs::OpenOptions;

use quotesync_core::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log level or filter directives
pub const LOG_ENV: &str = "QUOTESYNC_LOG";

pub fn init(config: &Config) {
    let Ok(log_level) = std::env::var(LOG_ENV) else {
        return;
    };

    let log_path = config.log_path();
    let log_file = match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            return;
        }
    };

    // Initialize file-based logging (ignore error if already initialized)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(&log_level))
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("Logging initialized to {:?}", log_path);
}

/// A bare level applies to both crates; anything else is a full directive
fn filter_for(log_level: &str) -> EnvFilter {
    let directives = if log_level.contains('=') || log_level.contains(',') {
        log_level.to_string()
    } else {
        format!("quotesync_core={},quotesync={}", log_level, log_level)
    };
    EnvFilter::new(directives)
}
