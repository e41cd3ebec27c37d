use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::clients::retry::RetryPolicy;
use crate::constants::limits;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub bangumi: BangumiConfig,

    pub staleness: StalenessConfig,

    pub scheduler: SchedulerConfig,

    pub index: IndexConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Log output format: "pretty" or "json"
    pub log_format: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/seasonrank.db".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BangumiConfig {
    pub base_url: String,

    /// Bearer token; also read from `BGMTV_TOKEN`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    pub user_agent: String,

    /// Pause before every request (default: 200ms)
    pub request_delay_ms: u64,

    /// Request timeout in seconds (default: 30)
    pub request_timeout_seconds: u64,

    /// Retries after the first attempt (default: 3)
    pub max_retries: u32,

    /// Base of the exponential backoff (default: 1000ms)
    pub retry_base_delay_ms: u64,

    /// Subject redirect hops before giving up (default: 5)
    pub max_redirects: u32,

    /// Episodes fetched per subject for the engagement metric (default: 100)
    pub episode_limit: u32,

    pub index_page_size: u32,
}

impl Default for BangumiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.bgm.tv".to_string(),
            access_token: None,
            user_agent: format!("seasonrank/{}", env!("CARGO_PKG_VERSION")),
            request_delay_ms: 200,
            request_timeout_seconds: 30,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            max_redirects: 5,
            episode_limit: 100,
            index_page_size: 50,
        }
    }
}

impl BangumiConfig {
    #[must_use]
    pub const fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StalenessConfig {
    /// Days that make up one quarter of season age (default: 90)
    pub quarter_length_days: u32,

    /// Tolerated staleness per quarter of age, in days (default: 1)
    pub window_days_per_quarter: u32,
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            quarter_length_days: 90,
            window_days_per_quarter: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    /// Cron for the recent + upcoming seasons run
    pub recent_cron: Option<String>,

    /// Cron for the full archive sweep
    pub full_cron: Option<String>,

    /// Interval fallback when no cron expression is set
    pub check_interval_minutes: u32,

    /// Concurrent subject refreshes within one batch (clamped to 1..=8)
    pub max_concurrent_fetches: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recent_cron: Some("0 0 */6 * * *".to_string()),
            full_cron: Some("0 30 3 * * Mon".to_string()),
            check_interval_minutes: 360,
            max_concurrent_fetches: 4,
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_fetches
            .clamp(1, limits::MAX_CONCURRENT_FETCHES)
    }
}

/// Templates for remote index metadata. Placeholders: `{year}`, `{season}`
/// (WINTER/SPRING/SUMMER/FALL), `{season_cn}`, `{key}` and `{label}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub title_template: String,

    pub description_template: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            title_template: "{year}年{season_cn}季番".to_string(),
            description_template:
                "https://anilist.co/search/anime?year={year}&season={season}&format=TV".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                let mut config = Self::load_from_path(path)?;
                config.apply_env_overrides();
                return Ok(config);
            }
        }

        info!("No config file found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Applies `BGMTV_TOKEN`, `LOG_LEVEL` and `DATABASE_URL` on top of file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("BGMTV_TOKEN") {
            self.bangumi.access_token = Some(token);
        }
        if let Some(level) = non_empty("LOG_LEVEL") {
            self.general.log_level = level;
        }
        if let Some(url) = non_empty("DATABASE_URL") {
            self.general.database_path = url;
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("seasonrank").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".seasonrank").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bangumi.base_url.trim().is_empty() {
            anyhow::bail!("Bangumi base URL cannot be empty");
        }

        url::Url::parse(&self.bangumi.base_url)
            .with_context(|| format!("Invalid Bangumi base URL: {}", self.bangumi.base_url))?;

        if self.staleness.quarter_length_days == 0 {
            anyhow::bail!("Staleness quarter length must be > 0 days");
        }

        if self.scheduler.max_concurrent_fetches == 0 {
            anyhow::bail!("Scheduler max_concurrent_fetches must be > 0");
        }

        if self.scheduler.enabled
            && self.scheduler.check_interval_minutes == 0
            && self.scheduler.recent_cron.is_none()
            && self.scheduler.full_cron.is_none()
        {
            anyhow::bail!("Scheduler interval must be > 0 or a cron expression must be set");
        }

        Ok(())
    }
}
