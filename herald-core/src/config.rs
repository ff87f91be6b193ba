//! src/config.rs
//! ============================================================================
//! # Config: explicitly owned configuration value
//!
//! Built once by the process's composition step and handed to whatever
//! needs it. There is no global instance: two `Config` values are two
//! independent configurations.
//!
//! Loads and saves settings as TOML, by default from the cross-platform
//! config path resolved with [`directories`](https://docs.rs/directories).
//!
//! ## Example
//! ```rust,ignore
//! let mut config = Config::load().await?;
//! config.set_value("password", "haha!!");
//! config.save().await?;
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use directories::ProjectDirs;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing::info;

use crate::logging::LoggerConfig;

/// Tuning shared by observables and dispatchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Actions running longer than this are reported at `warn`. They are
    /// never interrupted.
    #[serde(with = "humantime_serde")]
    pub slow_action_threshold: Duration,

    /// Emit a debug record for every dispatch round
    pub trace_rounds: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            slow_action_threshold: Duration::from_millis(250),
            trace_rounds: true,
        }
    }
}

impl DispatchConfig {
    #[inline]
    pub fn is_slow(&self, elapsed: Duration) -> bool {
        !self.slow_action_threshold.is_zero() && elapsed > self.slow_action_threshold
    }
}

/// Main configuration struct for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub logging: LoggerConfig,

    /// Free-form application values, kept in insertion order
    #[serde(default)]
    pub settings: IndexMap<String, String>,
}

impl Config {
    /// Set (or overwrite) a named value.
    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(key.into(), value.into());
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Loads config from the platform config dir, or writes and returns
    /// defaults when no file exists yet.
    pub async fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path).await
    }

    /// Loads config from `path`, creating it with defaults when missing.
    pub async fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            info!("Loading config from {}", path.display());

            let text = TokioFs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let cfg: Self = toml::from_str(&text)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;

            Ok(cfg)
        } else {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            let default_config = Self::default();
            default_config.save_to(path).await?;

            Ok(default_config)
        }
    }

    /// Saves config to the platform config dir.
    pub async fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path).await
    }

    pub async fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        info!("Saving config to {}", path.display());

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        TokioFs::write(path, toml_str).await?;

        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "herald", "Herald")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }
}
