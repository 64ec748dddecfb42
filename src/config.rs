use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::fetcher::SourceTarget;
use crate::poller::WaitTime;
use crate::windows::DEFAULT_TIME_WINDOW_SECONDS;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web: WebConfig,
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Non-integer values are kept as `None` so the poller falls back to
    /// its default instead of rejecting the whole file.
    #[serde(default, deserialize_with = "deserialize_lenient_seconds")]
    pub wait_time_seconds: Option<i64>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            user_agent: default_user_agent(),
            wait_time_seconds: None,
            headers: BTreeMap::new(),
        }
    }
}

fn default_url() -> String {
    "https://api.wheretheiss.at/v1/satellites/25544".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

impl SourceConfig {
    pub fn target(&self) -> SourceTarget {
        SourceTarget {
            url: self.url.clone(),
            user_agent: self.user_agent.clone(),
            headers: self.headers.clone(),
        }
    }

    pub fn wait_time(&self) -> WaitTime {
        WaitTime::resolve(self.wait_time_seconds, WaitTime::default())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("locations.db")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_time_window_seconds")]
    pub default_time_window_seconds: i64,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_time_window_seconds: default_time_window_seconds(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Per-client request budget for each `/iss` route: at most `limit`
/// requests every `period_seconds`.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rate_limit")]
    pub limit: usize,
    #[serde(default = "default_rate_limit_period")]
    pub period_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            limit: default_rate_limit(),
            period_seconds: default_rate_limit_period(),
        }
    }
}

fn default_rate_limit() -> usize {
    1
}

fn default_rate_limit_period() -> u64 {
    20
}

fn default_time_window_seconds() -> i64 {
    DEFAULT_TIME_WINDOW_SECONDS
}

fn deserialize_lenient_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::Number(n) if n.as_i64().is_some() => Ok(n.as_i64()),
        other => {
            log::warn!("Ignoring non-integer wait_time_seconds: {:?}", other);
            Ok(None)
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Like `from_file`, but a missing file at the default location means
    /// "use all defaults".
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path == Path::new(DEFAULT_CONFIG_PATH) && !path.exists() {
            log::info!("No {} found, using default configuration", DEFAULT_CONFIG_PATH);
            return Ok(Config::default());
        }
        Self::from_file(path)
    }
}
