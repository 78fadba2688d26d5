use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::constants::constants;
use crate::models::PlaylistId;
use crate::search::MergeStrategy;

/// Environment variable overriding `api_key`.
pub const API_KEY_ENV: &str = "YTLIST_API_KEY";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
  /// YouTube Data API key.
  pub api_key: Option<String>,
  pub catalog_url: String,
  pub store_url: String,
  /// The reserved "Watch Later" playlist every quick-add also joins.
  pub default_playlist_id: PlaylistId,
  pub max_results: u32,
  pub merge_strategy: MergeStrategy,
  /// Delete a playlist left half-populated by a failed create-and-assign.
  pub rollback_partial: bool,
}

impl Default for Config {
  fn default() -> Self {
    let c = constants();
    Self {
      api_key: None,
      catalog_url: c.catalog_url.clone(),
      store_url: c.store_url.clone(),
      default_playlist_id: 1,
      max_results: 10,
      merge_strategy: MergeStrategy::default(),
      rollback_partial: false,
    }
  }
}

impl Config {
  /// Location of `config.toml` in the platform config directory.
  pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "ytlist").map(|dirs| dirs.config_dir().join("config.toml"))
  }

  /// Load from the default location, falling back to defaults when absent or unreadable.
  pub fn load() -> Self {
    if let Some(path) = Self::default_path()
      && path.exists()
    {
      match Self::load_from(&path) {
        Ok(config) => return config,
        Err(e) => warn!(path = %path.display(), err = ?e, "config: ignoring unreadable file"),
      }
    }
    Self::default()
  }

  /// Load from an explicit path. Missing or malformed files are errors here.
  pub fn load_from(path: &Path) -> Result<Self> {
    let content =
      std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config file {}", path.display()))
  }

  pub fn save_to(&self, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
      std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = toml::to_string(self).context("Failed to serialize config")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write config file {}", path.display()))
  }

  /// Apply environment overrides.
  pub fn with_env(mut self) -> Self {
    if let Ok(key) = std::env::var(API_KEY_ENV)
      && !key.trim().is_empty()
    {
      self.api_key = Some(key.trim().to_string());
    }
    self
  }

  pub fn api_key(&self) -> Result<&str> {
    self
      .api_key
      .as_deref()
      .filter(|k| !k.trim().is_empty())
      .ok_or_else(|| anyhow!("No YouTube API key configured. Set {} or add api_key to config.toml", API_KEY_ENV))
  }
}
