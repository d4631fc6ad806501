//! Logging setup using the tracing ecosystem.
//!
//! The embedding assistant runs inside a chat host, so log output goes to a
//! daily-rotated file rather than stdout. Call [`init`] once at startup;
//! library code only emits `tracing` events and never installs a subscriber
//! on its own.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Default log level if RUST_LOG is not set.
const DEFAULT_LOG_FILTER: &str = "jirachat=info,warn";

/// Initialize the logging system.
///
/// Logs land in the platform-specific local data directory under
/// `jirachat/logs/`, rotated daily. Levels are configured via the `RUST_LOG`
/// environment variable, e.g. `RUST_LOG=jirachat=debug`.
///
/// # Errors
///
/// Returns an error if the log directory cannot be determined or created, or
/// if a global subscriber is already set.
pub fn init() -> anyhow::Result<()> {
    let log_dir = get_log_directory()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "jirachat.log");

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true),
        )
        .with(filter);

    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "jirachat starting up");

    Ok(())
}

/// Where log files are written, for display to the operator.
pub fn log_directory() -> Option<PathBuf> {
    get_log_directory().ok()
}

fn get_log_directory() -> anyhow::Result<PathBuf> {
    let base_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("could not determine local data directory"))?;
    Ok(base_dir.join("jirachat").join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directory_has_expected_structure() {
        let dir = log_directory().unwrap();
        assert!(dir.ends_with("jirachat/logs"));
    }
}
