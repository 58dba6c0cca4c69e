//! Console and rolling-file logging.
//!
//! Two files rotate daily under `LOGS_PATH`, ten of each kept:
//!
//! - `<app_name>.<date>.log` at the active level
//! - `<app_name>-error.<date>.log` with warnings and errors only
//!
//! ```no_run
//! steerage::logging::init("steerage", "logs")?;
//! tracing::info!("Experiment started");
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const KEPT_LOG_FILES: usize = 10;

/// Create `logs_path` if needed and return it.
pub fn ensure_log_dir(logs_path: impl AsRef<Path>) -> Result<PathBuf> {
    let log_dir = logs_path.as_ref().to_path_buf();
    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }
    Ok(log_dir)
}

/// Today's main log file for `app_name`. Appender dates are UTC.
pub fn current_log_path(logs_path: impl AsRef<Path>, app_name: &str) -> PathBuf {
    let today = chrono::Utc::now().format("%Y-%m-%d");
    logs_path.as_ref().join(format!("{app_name}.{today}.log"))
}

fn daily_appender(log_dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(KEPT_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(log_dir)
        .with_context(|| format!("Failed to create '{prefix}' log appender"))
}

/// Install the global subscriber: compact console output plus both files.
///
/// The level defaults to `info`; `RUST_LOG` overrides it.
///
/// # Errors
///
/// Returns error if the log directory or appenders cannot be created, or if
/// a global subscriber is already installed.
pub fn init(app_name: &str, logs_path: impl AsRef<Path>) -> Result<()> {
    let log_dir = ensure_log_dir(logs_path)?;
    let run_log = daily_appender(&log_dir, app_name)?;
    let error_log = daily_appender(&log_dir, &format!("{app_name}-error"))?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).compact())
        .with(
            fmt::layer()
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(run_log),
        )
        .with(
            fmt::layer()
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(error_log)
                .with_filter(EnvFilter::new("warn")),
        )
        .try_init()
        .context("Failed to install the global subscriber")?;

    tracing::info!("Logging to {}", log_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_log_dir_creates_nested_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("logs").join("steerage");
        let dir = ensure_log_dir(&nested).unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir, nested);
    }

    #[test]
    fn test_current_log_path_is_dated() {
        let path = current_log_path("logs", "steerage");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("steerage.20"), "{name}");
        assert!(name.ends_with(".log"), "{name}");
    }
}
