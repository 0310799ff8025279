use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub database: DatabaseConfig,
  pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Base URL of the remote REST API
  pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
  /// Override for the SQLite database path (defaults to the platform data dir)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  /// How often the replay sweep runs, in seconds
  pub flush_interval_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: "http://localhost:1337".to_string(),
    }
  }
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      flush_interval_secs: 60,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./dinesync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/dinesync/config.yaml
  ///
  /// Falls back to [`Config::default`] when no file exists anywhere.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(Error::Validation(format!(
          "config file not found: {}",
          p.display()
        )));
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
    let local = PathBuf::from("dinesync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("dinesync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
      Error::Validation(format!(
        "failed to read config file {}: {}",
        path.display(),
        e
      ))
    })?;

    serde_yaml::from_str(&contents).map_err(|e| {
      Error::Validation(format!(
        "failed to parse config file {}: {}",
        path.display(),
        e
      ))
    })
  }

  /// Replay sweep interval as a [`Duration`].
  pub fn flush_interval(&self) -> Duration {
    Duration::from_secs(self.sync.flush_interval_secs)
  }

  /// Resolved database path, defaulting to the platform data directory.
  pub fn database_path(&self) -> Result<PathBuf> {
    if let Some(p) = &self.database.path {
      return Ok(p.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| Error::Store("could not determine data directory".to_string()))?;

    Ok(data_dir.join("dinesync").join("cache.db"))
  }
}
