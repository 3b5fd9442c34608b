//! Log to a daily rolling file. The terminal belongs to the UI, so nothing
//! is ever written to stdout or stderr while the app runs.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// `<data_dir>/shopdesk/logs`, falling back to the working directory.
pub fn log_dir() -> PathBuf {
  dirs::data_dir()
    .map(|d| d.join("shopdesk").join("logs"))
    .unwrap_or_else(|| PathBuf::from("logs"))
}

/// RUST_LOG wins; otherwise the configured level.
fn build_filter(config: &LogConfig) -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber. Keep the guard alive for the life of the
/// app or buffered lines are lost on exit.
pub fn init(config: &LogConfig) -> Result<WorkerGuard> {
  let dir = log_dir();
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&dir, "shopdesk.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let fmt_layer = tracing_subscriber::fmt::layer()
    .with_writer(writer)
    .with_ansi(false)
    .with_target(true);

  tracing_subscriber::registry()
    .with(build_filter(config))
    .with(fmt_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  Ok(guard)
}
