use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "stock_metrics=info,analyze_stock=info";

/// `<logs_dir>/stock_metrics_YYYYMMDD.log`
pub fn log_file_path(logs_dir: &Path, today: NaiveDate) -> PathBuf {
    logs_dir.join(format!("stock_metrics_{}.log", today.format("%Y%m%d")))
}

/// Install the global subscriber: console output plus an appended daily log file.
///
/// Returns the log file path.
pub fn init_logging(logs_dir: &Path, today: NaiveDate) -> Result<PathBuf> {
    fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;

    let path = log_file_path(logs_dir, today);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(path)
}
