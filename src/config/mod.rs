// src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

pub const DEFAULT_CONFIG_PATH: &str = "config/service.toml";
pub const ENV_CONFIG_PATH: &str = "NEWS_CONFIG_PATH";

const ENV_REMOTE_ENDPOINT: &str = "NEWS_REMOTE_ENDPOINT";
const ENV_REMOTE_TOKEN: &str = "NEWS_REMOTE_TOKEN";
const ENV_DATASET_KEY: &str = "NEWS_DATASET_KEY";
const ENV_LOCAL_DATASET_PATH: &str = "NEWS_LOCAL_DATASET_PATH";
const ENV_REFRESH_INTERVAL: &str = "NEWS_REFRESH_INTERVAL_SECS";
const ENV_SYNC_INTERVAL: &str = "NEWS_SYNC_INTERVAL_SECS";
const ENV_FETCH_TIMEOUT: &str = "NEWS_FETCH_TIMEOUT_SECS";
const ENV_SQLITE_PATH: &str = "NEWS_SQLITE_PATH";
const ENV_LOG_FORMAT: &str = "NEWS_LOG_FORMAT";

fn default_dataset_key() -> String {
    "news-data/df_all_news.parquet".into()
}
fn default_export_prefix() -> String {
    "db-backups/".into()
}
fn default_local_path() -> PathBuf {
    PathBuf::from("data/df_all_news.parquet")
}
fn default_refresh_secs() -> u64 {
    300
}
fn default_sync_secs() -> u64 {
    3600
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_sqlite_path() -> PathBuf {
    PathBuf::from("data/users.db")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub remote: RemoteConfig,
    pub local: LocalConfig,
    pub schedule: ScheduleConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// `https://bucket.example` or `file:///srv/bucket`; unset disables the
    /// remote source and the sync export.
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub dataset_key: String,
    pub export_prefix: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            dataset_key: default_dataset_key(),
            export_prefix: default_export_prefix(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub dataset_path: PathBuf,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            dataset_path: default_local_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub refresh_interval_secs: u64,
    pub sync_interval_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_secs(),
            sync_interval_secs: default_sync_secs(),
            fetch_timeout_secs: default_timeout_secs(),
        }
    }
}

impl ScheduleConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub sqlite_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_sqlite_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl ServiceConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: ServiceConfig = toml::from_str(s).context("parsing service config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Read a TOML file. A missing file yields the defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("in {}", path.display()))
    }

    /// File at `$NEWS_CONFIG_PATH` (or `config/service.toml`), then env overrides.
    pub fn load() -> Result<Self> {
        let path = env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut cfg = Self::load_from_file(&path)?;
        cfg.apply_env()?;
        cfg.sanitize();
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_str(ENV_REMOTE_ENDPOINT) {
            self.remote.endpoint = Some(v);
        }
        if let Some(v) = env_str(ENV_REMOTE_TOKEN) {
            self.remote.token = Some(v);
        }
        if let Some(v) = env_str(ENV_DATASET_KEY) {
            self.remote.dataset_key = v;
        }
        if let Some(v) = env_str(ENV_LOCAL_DATASET_PATH) {
            self.local.dataset_path = PathBuf::from(v);
        }
        if let Some(v) = env_secs(ENV_REFRESH_INTERVAL)? {
            self.schedule.refresh_interval_secs = v;
        }
        if let Some(v) = env_secs(ENV_SYNC_INTERVAL)? {
            self.schedule.sync_interval_secs = v;
        }
        if let Some(v) = env_secs(ENV_FETCH_TIMEOUT)? {
            self.schedule.fetch_timeout_secs = v;
        }
        if let Some(v) = env_str(ENV_SQLITE_PATH) {
            self.database.sqlite_path = PathBuf::from(v);
        }
        if let Some(v) = env_str(ENV_LOG_FORMAT) {
            self.logging.format = match v.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                other => anyhow::bail!("{ENV_LOG_FORMAT}: unsupported format `{other}`"),
            };
        }
        Ok(())
    }

    fn sanitize(&mut self) {
        let s = &mut self.schedule;
        if s.refresh_interval_secs == 0 {
            s.refresh_interval_secs = default_refresh_secs();
        }
        if s.sync_interval_secs == 0 {
            s.sync_interval_secs = default_sync_secs();
        }
        if s.fetch_timeout_secs == 0 {
            s.fetch_timeout_secs = default_timeout_secs();
        }
        // Blank endpoint/token from env or file means "not configured".
        self.remote.endpoint = self.remote.endpoint.take().filter(|e| !e.trim().is_empty());
        self.remote.token = self.remote.token.take().filter(|t| !t.trim().is_empty());
    }

    pub fn remote_configured(&self) -> bool {
        self.remote.endpoint.is_some()
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_secs(key: &str) -> Result<Option<u64>> {
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("{key} must be a whole number of seconds")),
        Err(_) => Ok(None),
    }
}
