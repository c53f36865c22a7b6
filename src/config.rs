use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_PAGE_SIZE, DEFAULT_PREFETCH_THRESHOLD,
    THREAD_CACHE_MAX_CAPACITY, THREAD_CACHE_TTL_SECS,
};
use crate::retry::RetryConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub navigator: NavigatorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the support-inbox backend, e.g. "https://api.example.com/v1"
    pub base_url: String,
    /// Request timeout; a stalled fetch fails instead of hanging the step
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Static bearer token passed through on every request.
    /// Token acquisition and refresh are handled outside this client.
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigatorConfig {
    /// Records per backend page; must match the backend's constant
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Margin (in records) from a page boundary that triggers prefetch
    #[serde(default = "default_prefetch_threshold")]
    pub prefetch_threshold: usize,
    /// Mark unread records read when the navigator lands on them
    #[serde(default = "default_true")]
    pub mark_read_on_open: bool,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            prefetch_threshold: default_prefetch_threshold(),
            mark_read_on_open: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_cached_threads")]
    pub max_cached_threads: u64,
    #[serde(default = "default_thread_ttl_secs")]
    pub thread_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cached_threads: default_max_cached_threads(),
            thread_ttl_secs: default_thread_ttl_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_prefetch_threshold() -> usize {
    DEFAULT_PREFETCH_THRESHOLD
}

fn default_true() -> bool {
    true
}

fn default_max_cached_threads() -> u64 {
    THREAD_CACHE_MAX_CAPACITY
}

fn default_thread_ttl_secs() -> u64 {
    THREAD_CACHE_TTL_SECS
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("merchmail");
        Ok(dir)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn data_dir() -> Result<PathBuf> {
        let dir = dirs::data_local_dir()
            .context("Could not find data directory")?
            .join("merchmail");
        Ok(dir)
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            anyhow::bail!(
                "Configuration file not found at {}\n\
                 Please create a config file. Example:\n\n\
                 [api]\n\
                 base_url = \"https://api.example.com/v1\"\n\n\
                 [navigator]\n\
                 page_size = 20",
                path.display()
            );
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.is_empty() {
            anyhow::bail!("api.base_url must not be empty");
        }
        if self.navigator.page_size == 0 {
            anyhow::bail!("navigator.page_size must be at least 1");
        }
        if self.navigator.prefetch_threshold > self.navigator.page_size {
            anyhow::bail!(
                "navigator.prefetch_threshold ({}) cannot exceed page_size ({})",
                self.navigator.prefetch_threshold,
                self.navigator.page_size
            );
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let dir = path.parent().unwrap();

        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(Self::config_dir()?)?;
        fs::create_dir_all(Self::data_dir()?)?;
        Ok(())
    }
}
