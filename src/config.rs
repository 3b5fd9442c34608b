use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub lists: ListsConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub base_url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  15
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListsConfig {
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  /// Quiet period before a search box change becomes a query
  #[serde(default = "default_search_debounce_ms")]
  pub search_debounce_ms: u64,
}

fn default_page_size() -> u32 {
  10
}

fn default_search_debounce_ms() -> u64 {
  500
}

impl Default for ListsConfig {
  fn default() -> Self {
    Self {
      page_size: default_page_size(),
      search_debounce_ms: default_search_debounce_ms(),
    }
  }
}

impl ListsConfig {
  pub fn search_debounce(&self) -> Duration {
    Duration::from_millis(self.search_debounce_ms)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long loaded data is served without revalidating
  #[serde(default = "default_stale_time_secs")]
  pub stale_time_secs: u64,
  /// Extra attempts for loads that fail to reach the server
  #[serde(default = "default_retries")]
  pub retries: u32,
  /// First retry delay; doubles per attempt, capped at 30s
  #[serde(default = "default_retry_base_delay_ms")]
  pub retry_base_delay_ms: u64,
}

fn default_stale_time_secs() -> u64 {
  60
}

fn default_retries() -> u32 {
  2
}

fn default_retry_base_delay_ms() -> u64 {
  1000
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_time_secs: default_stale_time_secs(),
      retries: default_retries(),
      retry_base_delay_ms: default_retry_base_delay_ms(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Default filter when RUST_LOG is unset
  #[serde(default = "default_log_level")]
  pub level: String,
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./shopdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/shopdesk/config.yaml (~/.config on Linux)
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/shopdesk/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("shopdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("shopdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  /// Parse and validate YAML config contents.
  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    url::Url::parse(&self.api.base_url)
      .map_err(|e| eyre!("api.base_url {:?} is not a valid URL: {}", self.api.base_url, e))?;
    if self.lists.page_size == 0 {
      return Err(eyre!("lists.page_size must be at least 1"));
    }
    if self.lists.search_debounce_ms == 0 {
      return Err(eyre!("lists.search_debounce_ms must be greater than 0"));
    }
    Ok(())
  }

  /// Point the config at another backend, e.g. from `--api-url`.
  pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
    self.api.base_url = base_url.to_string();
    self.validate()?;
    Ok(self)
  }

  /// Header title: the configured one, else the API host.
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    url::Url::parse(&self.api.base_url)
      .ok()
      .and_then(|u| {
        u.host_str().map(|h| match u.port() {
          Some(port) => format!("{}:{}", h, port),
          None => h.to_string(),
        })
      })
      .unwrap_or_else(|| self.api.base_url.clone())
  }

  /// Get the optional API bearer token from the environment.
  ///
  /// Checks SHOPDESK_API_TOKEN.
  pub fn get_api_token() -> Option<String> {
    std::env::var("SHOPDESK_API_TOKEN")
      .ok()
      .filter(|t| !t.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("api:\n  base_url: http://localhost:4000/api\n").unwrap();
    assert_eq!(config.api.timeout_secs, 15);
    assert_eq!(config.lists.page_size, 10);
    assert_eq!(config.lists.search_debounce(), Duration::from_millis(500));
    assert_eq!(config.cache.retries, 2);
    assert_eq!(config.log.level, "info");
  }

  #[test]
  fn test_display_title_falls_back_to_host() {
    let config = Config::parse("api:\n  base_url: http://localhost:4000/api\n").unwrap();
    assert_eq!(config.display_title(), "localhost:4000");

    let config =
      Config::parse("title: Acme Admin\napi:\n  base_url: https://shop.example.com/api\n").unwrap();
    assert_eq!(config.display_title(), "Acme Admin");
  }

  #[test]
  fn test_rejects_invalid_values() {
    assert!(Config::parse("api:\n  base_url: not a url\n").is_err());
    assert!(Config::parse(
      "api:\n  base_url: http://localhost/api\nlists:\n  search_debounce_ms: 0\n"
    )
    .is_err());
    assert!(Config::parse("api:\n  base_url: http://localhost/api\nlists:\n  page_size: 0\n").is_err());
  }

  #[test]
  fn test_base_url_override_is_validated() {
    let config = Config::parse("api:\n  base_url: http://localhost:4000/api\n").unwrap();
    let config = config.with_base_url("https://shop.example.com/api").unwrap();
    assert_eq!(config.display_title(), "shop.example.com");
    assert!(config.with_base_url("nope").is_err());
  }

  #[test]
  fn test_example_config_parses() {
    let config = Config::parse(include_str!("../config.example.yaml")).unwrap();
    assert_eq!(config.display_title(), "Shop Admin");
    assert_eq!(config.lists.page_size, 10);
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    assert!(Config::load(Some(Path::new("/nonexistent/shopdesk.yaml"))).is_err());
  }
}
