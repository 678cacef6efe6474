use anyhow::{Context, Result};
use common::FrameCacheError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::validate_enum;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralSettings,

    #[serde(default)]
    pub cache: CacheSettings,
}

/// General settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Frame cache behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    /// Minimum time between two "frames cached" notifications
    #[serde(default = "default_notify_interval")]
    pub notify_interval_ms: u64,

    /// Zoom factor from which pixel values are drawn onto the frame
    #[serde(default = "default_pixel_values_zoom")]
    pub pixel_values_zoom: f64,

    /// Number of threads caching frames in the background
    #[serde(default = "default_background_workers")]
    pub background_workers: usize,

    /// How many frames ahead of the displayed one to cache
    #[serde(default = "default_preload_ahead")]
    pub preload_ahead: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            notify_interval_ms: default_notify_interval(),
            pixel_values_zoom: default_pixel_values_zoom(),
            background_workers: default_background_workers(),
            preload_ahead: default_preload_ahead(),
        }
    }
}

impl CacheSettings {
    pub fn notify_interval(&self) -> Duration {
        Duration::from_millis(self.notify_interval_ms)
    }
}

fn default_notify_interval() -> u64 {
    1000
}
fn default_pixel_values_zoom() -> f64 {
    64.0
}
fn default_background_workers() -> usize {
    1
}
fn default_preload_ahead() -> u32 {
    8
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded configuration from {}", path.display());
        config.validate()?;

        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("framecache");

        Ok(config_dir.join("config.toml"))
    }

    /// Validate configuration
    ///
    /// Rejected values are reported as [`FrameCacheError::Config`].
    pub fn validate(&self) -> Result<()> {
        self.validate_log_level(&self.general.log_level)
            .map_err(|e| FrameCacheError::Config(format!("general.log_level: {}", e)))?;

        if self.cache.notify_interval_ms == 0 {
            anyhow::bail!(FrameCacheError::Config(
                "cache.notify_interval_ms must be greater than 0".to_string()
            ));
        }
        let zoom = self.cache.pixel_values_zoom;
        if zoom.is_nan() || zoom <= 0.0 {
            anyhow::bail!(FrameCacheError::Config(format!(
                "cache.pixel_values_zoom must be positive, got {}",
                zoom
            )));
        }
        if self.cache.background_workers == 0 {
            anyhow::bail!(FrameCacheError::Config(
                "cache.background_workers must be at least 1".to_string()
            ));
        }

        Ok(())
    }

    fn validate_log_level(&self, level: &str) -> Result<()> {
        validate_enum!(level, "trace", "debug", "info", "warn", "error")
    }
}
