//! File logging setup.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the filter directive.
pub const LOG_ENV: &str = "NEWSRELAY_LOG";
const LOG_FILE: &str = "newsrelay.log";

/// Noisy dependencies stay at warn unless asked for explicitly.
const QUIET_DEPS: &str = "hyper=warn,h2=warn,reqwest=warn,rustls=warn";

/// Filter precedence: `--verbose` > `NEWSRELAY_LOG` > `info`.
pub fn filter(verbose: bool) -> EnvFilter {
  if verbose {
    EnvFilter::new(format!("debug,{}", QUIET_DEPS))
  } else {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(format!("info,{}", QUIET_DEPS)))
  }
}

pub fn default_log_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("newsrelay"))
}

/// Install the global subscriber writing to `<dir>/newsrelay.log`.
///
/// The returned guard flushes buffered lines on drop; keep it alive for the
/// life of the process.
pub fn init(dir: Option<PathBuf>, verbose: bool) -> Result<WorkerGuard> {
  let dir = match dir {
    Some(dir) => dir,
    None => default_log_dir()?,
  };

  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::registry()
    .with(filter(verbose))
    .with(
      fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer),
    )
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
