use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CachePolicy;

pub const DEFAULT_API_URL: &str = "https://pokeapi.co/api/v2/";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub catalog: CatalogConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub favorites: FavoritesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_api_url")]
  pub base_url: String,
  /// Request timeout; unset means the transport default
  #[serde(default = "default_timeout")]
  pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_api_url(),
      timeout_secs: default_timeout(),
    }
  }
}

fn default_api_url() -> String {
  DEFAULT_API_URL.to_string()
}

fn default_timeout() -> Option<u64> {
  Some(30)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
  /// Entries per catalog page
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  /// Upper bound for the full-index fetch; must exceed the catalog size
  #[serde(default = "default_index_limit")]
  pub index_limit: u32,
}

impl Default for CatalogConfig {
  fn default() -> Self {
    Self {
      page_size: default_page_size(),
      index_limit: default_index_limit(),
    }
  }
}

fn default_page_size() -> u32 {
  150
}

fn default_index_limit() -> u32 {
  2000
}

/// Staleness/eviction windows in seconds
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct WindowConfig {
  pub stale_secs: u64,
  #[serde(default = "default_gc_secs")]
  pub gc_secs: u64,
}

impl WindowConfig {
  const fn new(stale_secs: u64, gc_secs: u64) -> Self {
    Self {
      stale_secs,
      gc_secs,
    }
  }

  pub fn policy(&self) -> CachePolicy {
    CachePolicy::new(
      Duration::from_secs(self.stale_secs),
      Duration::from_secs(self.gc_secs),
    )
  }
}

fn default_gc_secs() -> u64 {
  5 * 60
}

const MINUTE: u64 = 60;
const DAY: u64 = 24 * 60 * MINUTE;

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "CacheConfig::default_catalog_page")]
  pub catalog_page: WindowConfig,
  #[serde(default = "CacheConfig::default_full_index")]
  pub full_index: WindowConfig,
  #[serde(default = "CacheConfig::default_record")]
  pub detail: WindowConfig,
  #[serde(default = "CacheConfig::default_record")]
  pub species: WindowConfig,
  #[serde(default = "CacheConfig::default_record")]
  pub evolution_chain: WindowConfig,
  #[serde(default = "CacheConfig::default_favorites")]
  pub favorites: WindowConfig,
  #[serde(default = "CacheConfig::default_favorites")]
  pub is_favorite: WindowConfig,
  #[serde(default = "CacheConfig::default_sweep_interval")]
  pub sweep_interval_secs: u64,
}

impl CacheConfig {
  fn default_catalog_page() -> WindowConfig {
    WindowConfig::new(5 * MINUTE, 5 * MINUTE)
  }

  fn default_full_index() -> WindowConfig {
    WindowConfig::new(DAY, DAY)
  }

  fn default_record() -> WindowConfig {
    WindowConfig::new(10 * MINUTE, 5 * MINUTE)
  }

  fn default_favorites() -> WindowConfig {
    WindowConfig::new(0, 5 * MINUTE)
  }

  fn default_sweep_interval() -> u64 {
    MINUTE
  }

  pub fn sweep_interval(&self) -> Duration {
    Duration::from_secs(self.sweep_interval_secs.max(1))
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      catalog_page: Self::default_catalog_page(),
      full_index: Self::default_full_index(),
      detail: Self::default_record(),
      species: Self::default_record(),
      evolution_chain: Self::default_record(),
      favorites: Self::default_favorites(),
      is_favorite: Self::default_favorites(),
      sweep_interval_secs: Self::default_sweep_interval(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FavoritesConfig {
  /// SQLite database path (default: $XDG_DATA_HOME/pokesync/favorites.db)
  pub database: Option<PathBuf>,
}

impl FavoritesConfig {
  pub fn database_path(&self) -> Result<PathBuf> {
    match &self.database {
      Some(path) => Ok(path.clone()),
      None => Ok(data_dir()?.join("favorites.db")),
    }
  }
}

/// Application data directory ($XDG_DATA_HOME/pokesync).
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("pokesync"))
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./pokesync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pokesync/config.yaml
  ///
  /// Without a file every setting takes its default. `POKESYNC_API_URL`
  /// overrides `api.base_url` either way.
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

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var("POKESYNC_API_URL") {
      config.api.base_url = url;
    }

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("pokesync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pokesync").join("config.yaml");
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
    // An empty document deserializes as null
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  fn validate(&self) -> Result<()> {
    if self.catalog.page_size == 0 {
      return Err(eyre!("catalog.page_size must be positive"));
    }
    if self.catalog.index_limit < self.catalog.page_size {
      return Err(eyre!(
        "catalog.index_limit ({}) must not be smaller than catalog.page_size ({})",
        self.catalog.index_limit,
        self.catalog.page_size
      ));
    }
    url::Url::parse(&self.api.base_url)
      .map_err(|e| eyre!("Invalid api.base_url {}: {}", self.api.base_url, e))?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config.api.base_url, DEFAULT_API_URL);
    assert_eq!(config.catalog.page_size, 150);
    assert_eq!(config.catalog.index_limit, 2000);
    assert_eq!(config.cache.full_index.policy().stale_time, Duration::from_secs(DAY));
    assert_eq!(config.cache.full_index.policy().gc_time, Duration::from_secs(DAY));
    assert_eq!(config.cache.favorites.policy().stale_time, Duration::ZERO);
    assert_eq!(config.cache.detail.stale_secs, 600);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_partial_override() {
    let yaml = r#"
catalog:
  page_size: 20
cache:
  detail:
    stale_secs: 30
favorites:
  database: /tmp/favs.db
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.catalog.page_size, 20);
    assert_eq!(config.catalog.index_limit, 2000);
    assert_eq!(config.cache.detail, WindowConfig::new(30, 300));
    assert_eq!(config.cache.species.stale_secs, 600);
    assert_eq!(
      config.favorites.database_path().unwrap(),
      PathBuf::from("/tmp/favs.db")
    );
  }

  #[test]
  fn test_validation() {
    let config = Config::from_yaml("catalog:\n  page_size: 0\n").unwrap();
    assert!(config.validate().is_err());

    let config = Config::from_yaml("api:\n  base_url: not a url\n").unwrap();
    assert!(config.validate().is_err());
  }
}
