use std::fs;
use std::io::IsTerminal;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingConfig;

fn parse_level(level: &str) -> tracing::Level {
  match level.to_lowercase().as_str() {
    "trace" => tracing::Level::TRACE,
    "debug" => tracing::Level::DEBUG,
    "warn" | "warning" => tracing::Level::WARN,
    "error" => tracing::Level::ERROR,
    _ => tracing::Level::INFO,
  }
}

/// The file sink stands in for the journal sink as well, so it filters at
/// the more verbose of the two configured levels.
fn file_sink_level(config: &LoggingConfig) -> tracing::Level {
  let file = parse_level(&config.file_level);
  let journal = parse_level(&config.journal_level);
  // tracing orders ERROR < WARN < INFO < DEBUG < TRACE.
  if journal > file {
    journal
  } else {
    file
  }
}

/// Initializes the global subscriber with a daily-rolling file sink under
/// the state dir and an optional console sink. The file sink also covers
/// the `journal_level` setting (see [`file_sink_level`]). The returned
/// guard must stay alive for the life of the process so buffered log lines
/// are flushed.
pub fn init(config: &LoggingConfig, state_dir: &Path) -> Option<WorkerGuard> {
  let log_dir = state_dir.join("logs");
  let file_layer = match fs::create_dir_all(&log_dir) {
    Ok(()) => {
      let appender = tracing_appender::rolling::daily(&log_dir, "pawlette.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let filter = EnvFilter::new(file_sink_level(config).to_string());
      let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(filter);
      Some((layer, guard))
    }
    Err(_) => None,
  };

  let console_layer = if config.enable_console {
    let filter = EnvFilter::try_from_default_env()
      .unwrap_or_else(|_| EnvFilter::new(parse_level(&config.console_level).to_string()));
    let layer = fmt::layer()
      .with_writer(std::io::stderr)
      .with_ansi(config.enable_colors && std::io::stderr().is_terminal())
      .with_target(false)
      .with_filter(filter);
    Some(layer)
  } else {
    None
  };

  let (file_layer, guard) = match file_layer {
    Some((layer, guard)) => (Some(layer), Some(guard)),
    None => (None, None),
  };

  let _ = tracing_subscriber::registry()
    .with(file_layer)
    .with(console_layer)
    .try_init();

  guard
}
