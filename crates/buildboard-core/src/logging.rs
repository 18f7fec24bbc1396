//! Tracing subscriber setup.
//!
//! The filter comes from `BUILDBOARD_LOG`, then `RUST_LOG`, then the
//! configured default. The terminal UI owns the screen, so it logs to
//! `${BUILDBOARD_HOME}/logs/buildboard.log`; headless commands log to stderr.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "BUILDBOARD_LOG";
pub const LOG_FILE_NAME: &str = "buildboard.log";

const DEFAULT_LEVEL: &str = "info";

/// Builds the log filter, falling back to `default_level` (or `info`).
pub fn env_filter(default_level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level.unwrap_or(DEFAULT_LEVEL)))
}

/// Installs a subscriber that appends to `logs_dir/buildboard.log`.
///
/// Keep the returned guard alive for the lifetime of the program; dropping it
/// flushes and stops the background writer.
pub fn init_file(logs_dir: &Path, default_level: Option<&str>) -> Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(logs_dir)
        .with_context(|| format!("Failed to open log file in {}", logs_dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;
    Ok(guard)
}

/// Installs a subscriber that writes to stderr.
pub fn init_stderr(default_level: Option<&str>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))
}
