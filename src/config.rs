use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::paths::Paths;

/// Comment tokens used by the patch engine, keyed by file extension
/// (including the leading dot).
pub fn default_comment_styles() -> BTreeMap<String, String> {
  let mut styles = BTreeMap::new();
  for (ext, token) in [
    (".json", "//"),
    (".jsonc", "//"),
    (".conf", "#"),
    (".ini", "#"),
    (".yaml", "#"),
    (".yml", "#"),
    (".toml", "#"),
    (".scss", "//"),
    (".rasi", "//"),
  ] {
    styles.insert(ext.to_string(), token.to_string());
  }
  styles
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
  #[serde(default)]
  pub enable_console: bool,
  #[serde(default = "default_console_level")]
  pub console_level: String,
  #[serde(default = "default_file_level")]
  pub file_level: String,
  #[serde(default = "default_journal_level")]
  pub journal_level: String,
  #[serde(default = "default_true")]
  pub enable_colors: bool,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    LoggingConfig {
      enable_console: false,
      console_level: default_console_level(),
      file_level: default_file_level(),
      journal_level: default_journal_level(),
      enable_colors: true,
    }
  }
}

fn default_console_level() -> String {
  "INFO".to_string()
}

fn default_file_level() -> String {
  "DEBUG".to_string()
}

fn default_journal_level() -> String {
  "INFO".to_string()
}

fn default_true() -> bool {
  true
}

fn default_max_backups() -> u32 {
  5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
  #[serde(default = "default_max_backups")]
  pub max_backups: u32,
  #[serde(default = "default_comment_styles")]
  pub comment_styles: BTreeMap<String, String>,
  #[serde(default)]
  pub logging: LoggingConfig,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      max_backups: default_max_backups(),
      comment_styles: default_comment_styles(),
      logging: LoggingConfig::default(),
    }
  }
}

impl Config {
  /// Loads the config file, substituting defaults when the file is missing
  /// or malformed. A user-provided `comment_styles` map is back-filled with
  /// any default extensions it omits.
  pub fn load(path: &Path) -> Self {
    if !path.is_file() {
      warn!("config file {} not found, using defaults", path.display());
      return Config::default();
    }

    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(err) => {
        warn!("failed to read config {}: {err}, using defaults", path.display());
        return Config::default();
      }
    };

    match serde_json::from_str::<Config>(&content) {
      Ok(mut config) => {
        for (ext, token) in default_comment_styles() {
          config.comment_styles.entry(ext).or_insert(token);
        }
        config
      }
      Err(err) => {
        warn!("config file {} is invalid: {err}, using defaults", path.display());
        Config::default()
      }
    }
  }

  pub fn comment_style(&self, ext: &str) -> &str {
    self.comment_styles.get(ext).map(String::as_str).unwrap_or("#")
  }
}

pub fn generate_default_config(paths: &Paths) -> Result<()> {
  fs::create_dir_all(&paths.app_config_dir)
    .with_context(|| format!("failed to create {}", paths.app_config_dir.display()))?;
  let content = serde_json::to_string_pretty(&Config::default())?;
  fs::write(&paths.config_file, content + "\n")
    .with_context(|| format!("failed to write {}", paths.config_file.display()))?;
  Ok(())
}
