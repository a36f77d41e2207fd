//! Tracing subscriber setup for the binary.
//!
//! Events go to stderr and to a plain-text daily log file under
//! `<root>/Logs/rve-gen-logs-<YYYY-MM-DD>.log`. `RUST_LOG` overrides the level.

use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::AppError;

pub const LOG_DIR: &str = "Logs";

pub fn log_file_path(root_dir: &Path, date: NaiveDate) -> PathBuf {
    root_dir
        .join(LOG_DIR)
        .join(format!("rve-gen-logs-{}.log", date.format("%Y-%m-%d")))
}

fn default_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }))
}

/// Install the global subscriber. A subscriber installed earlier (tests, an
/// embedding application) is left in place.
pub fn init_logging(root_dir: &Path, date: NaiveDate, debug: bool) -> Result<PathBuf, AppError> {
    let path = log_file_path(root_dir, date);
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .map_err(|e| AppError::io(format!("Failed to create log directory '{}': {e}", parent.display())))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| AppError::io(format!("Failed to open log file '{}': {e}", path.display())))?;

    let _ = tracing_subscriber::registry()
        .with(default_filter(debug))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .try_init();

    Ok(path)
}
