use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::comms::Modes;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Live/offline choice per capability
  #[serde(default)]
  pub modes: Modes,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Artificial delay added by the offline transport
  #[serde(default)]
  pub offline_delay_ms: u64,
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  #[serde(default)]
  pub endpoints: Endpoints,
}

fn default_page_size() -> u32 {
  10
}

impl Default for Config {
  fn default() -> Self {
    Self {
      modes: Modes::default(),
      cache: CacheConfig::default(),
      offline_delay_ms: 0,
      page_size: default_page_size(),
      endpoints: Endpoints::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Database file (defaults to $XDG_DATA_HOME/newsrelay/cache.db)
  pub path: Option<PathBuf>,
  /// Entries older than this are treated as missing. Never stale if unset.
  pub max_age_secs: Option<u64>,
}

fn default_true() -> bool {
  true
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
      max_age_secs: None,
    }
  }
}

/// Base URLs of the live services.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Endpoints {
  pub content: String,
  pub message: String,
  pub social_auth: String,
  pub social_api: String,
}

impl Default for Endpoints {
  fn default() -> Self {
    Self {
      content: "https://content.guardianapis.com".to_string(),
      message: "https://api.sendgrid.com".to_string(),
      social_auth: "https://www.reddit.com".to_string(),
      social_api: "https://oauth.reddit.com".to_string(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./newsrelay.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/newsrelay/config.yaml
  ///
  /// Falls back to defaults (everything offline) when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("newsrelay.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("newsrelay").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.page_size == 0 {
      return Err(eyre!("page_size must be at least 1"));
    }
    Ok(config)
  }

  pub fn offline_delay(&self) -> Duration {
    Duration::from_millis(self.offline_delay_ms)
  }

  pub fn cache_max_age(&self) -> Option<chrono::Duration> {
    self
      .cache
      .max_age_secs
      .and_then(|secs| i64::try_from(secs).ok())
      .map(chrono::Duration::seconds)
  }
}
