//! Engine configuration.

use std::path::{Path, PathBuf};

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub remote: RemoteConfig,
  pub storage: StorageConfig,
  pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
  /// Base URL of the remote booking service
  pub base_url: String,
}

impl Default for RemoteConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8080".to_string(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  /// Explicit cache blob path; defaults to the platform data directory
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
  /// Version tag for cache buckets; a build bump invalidates old buckets
  pub cache_version: String,
  /// Static assets pre-fetched at worker install time
  pub precache: Vec<String>,
  /// API path prefixes whose GET responses may be cached
  pub api_cache_paths: Vec<String>,
  /// Tag of the deferred background-sync task
  pub sync_tag: String,
  /// Root document served as the navigation fallback
  pub root_document: String,
  /// Dedicated offline document, the last navigation fallback
  pub offline_document: String,
  /// Placeholder substituted for failed image requests
  pub placeholder_image: String,
}

impl Default for WorkerConfig {
  fn default() -> Self {
    Self {
      cache_version: "v1".to_string(),
      precache: vec![
        "/".to_string(),
        "/global.css".to_string(),
        "/placeholder.svg".to_string(),
        "/offline.html".to_string(),
      ],
      api_cache_paths: vec![
        "/api/services".to_string(),
        "/api/salons".to_string(),
        "/api/demo".to_string(),
      ],
      sync_tag: "bookings-sync".to_string(),
      root_document: "/".to_string(),
      offline_document: "/offline.html".to_string(),
      placeholder_image: "/placeholder.svg".to_string(),
    }
  }
}

impl Config {
  /// Load configuration from file, falling back to defaults when no file
  /// exists.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./bookcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/bookcache/config.yaml
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
    let local = PathBuf::from("bookcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("bookcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_match_precache_manifest() {
    let config = Config::default();
    assert_eq!(config.worker.cache_version, "v1");
    assert!(config.worker.precache.contains(&"/offline.html".to_string()));
    assert!(config
      .worker
      .api_cache_paths
      .contains(&"/api/services".to_string()));
    assert_eq!(config.worker.sync_tag, "bookings-sync");
  }

  #[test]
  fn test_partial_yaml_overrides_defaults() {
    let yaml = r#"
remote:
  base_url: "https://bookings.example.com"
worker:
  cache_version: "v2"
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.remote.base_url, "https://bookings.example.com");
    assert_eq!(config.worker.cache_version, "v2");
    // Untouched sections keep their defaults
    assert_eq!(config.worker.sync_tag, "bookings-sync");
  }

  #[test]
  fn test_missing_explicit_path_errors() {
    assert!(Config::load(Some(Path::new("/no/such/config.yaml"))).is_err());
  }
}
