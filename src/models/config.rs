//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Upper bound for `crawler.max_radius_m`; keeps the finest grid disk in memory.
const MAX_RADIUS_M: u32 = 200_000;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Crawl pacing, retry and saturation settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Place provider endpoint and credentials
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Snapshot location
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_attempts == 0 {
            return Err(AppError::validation("crawler.max_attempts must be > 0"));
        }
        if self.crawler.saturation_threshold == 0 {
            return Err(AppError::validation(
                "crawler.saturation_threshold must be > 0",
            ));
        }
        if self.crawler.max_radius_m == 0 || self.crawler.max_radius_m > MAX_RADIUS_M {
            return Err(AppError::validation(format!(
                "crawler.max_radius_m must be between 1 and {MAX_RADIUS_M}"
            )));
        }
        if self.crawler.retry_max_delay_ms < self.crawler.retry_base_delay_ms {
            return Err(AppError::validation(
                "crawler.retry_max_delay_ms must be >= crawler.retry_base_delay_ms",
            ));
        }
        if self.provider.api_key_env.trim().is_empty() {
            return Err(AppError::validation("provider.api_key_env is empty"));
        }
        if self.provider.place_type.trim().is_empty() {
            return Err(AppError::validation("provider.place_type is empty"));
        }
        if self.provider.user_agent.trim().is_empty() {
            return Err(AppError::validation("provider.user_agent is empty"));
        }
        Url::parse(&self.provider.base_url).map_err(|e| {
            AppError::validation(format!(
                "provider.base_url '{}' is not a URL: {e}",
                self.provider.base_url
            ))
        })?;
        Ok(())
    }
}

/// Crawl pacing and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Minimum delay between provider calls in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Timeout for a single provider call in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per tile, including the first one
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "defaults::retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Upper bound for the retry backoff in milliseconds
    #[serde(default = "defaults::retry_max_delay")]
    pub retry_max_delay_ms: u64,

    /// Result count at which a tile is considered truncated
    #[serde(default = "defaults::saturation_threshold")]
    pub saturation_threshold: usize,

    /// Largest search radius accepted for a run, in meters
    #[serde(default = "defaults::max_radius")]
    pub max_radius_m: u32,
}

impl CrawlerConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject a run radius above `max_radius_m`.
    pub fn check_radius(&self, radius_m: u32) -> Result<()> {
        if radius_m > self.max_radius_m {
            return Err(AppError::config(format!(
                "radius {radius_m}m exceeds crawler.max_radius_m ({}m)",
                self.max_radius_m
            )));
        }
        Ok(())
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: defaults::request_delay(),
            timeout_secs: defaults::timeout(),
            max_attempts: defaults::max_attempts(),
            retry_base_delay_ms: defaults::retry_base_delay(),
            retry_max_delay_ms: defaults::retry_max_delay(),
            saturation_threshold: defaults::saturation_threshold(),
            max_radius_m: defaults::max_radius(),
        }
    }
}

/// Place provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the maps web services, with a trailing slash
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "defaults::api_key_env")]
    pub api_key_env: String,

    /// Place type passed to the nearby search
    #[serde(default = "defaults::place_type")]
    pub place_type: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,
}

impl ProviderConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(AppError::config(format!(
                "{} environment variable not set",
                self.api_key_env
            ))),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            api_key_env: defaults::api_key_env(),
            place_type: defaults::place_type(),
            user_agent: defaults::user_agent(),
        }
    }
}

/// Snapshot storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the place and visited-tile snapshots
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn request_delay() -> u64 {
        2000
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn retry_base_delay() -> u64 {
        2000
    }
    pub fn retry_max_delay() -> u64 {
        30_000
    }
    pub fn saturation_threshold() -> usize {
        60
    }
    pub fn max_radius() -> u32 {
        50_000
    }

    // Provider defaults
    pub fn base_url() -> String {
        "https://maps.googleapis.com/maps/api/".into()
    }
    pub fn api_key_env() -> String {
        "API_KEY".into()
    }
    pub fn place_type() -> String {
        "restaurant".into()
    }
    pub fn user_agent() -> String {
        "hexcrawl/0.1".into()
    }

    // Storage defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from(".")
    }
}
