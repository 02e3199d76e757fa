//! Application Configuration
//!
//! Manages DroidKit settings including:
//! - Logging level and format
//! - Locations of the persisted value stores
//! - Network notification behaviour

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;
use tracing::{info, debug};

use crate::error::{DroidKitError, Result};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level: trace, debug, info, warn or error
    pub level: String,
    /// Include source file and line in log lines
    pub with_file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_file: true,
        }
    }
}

/// Persisted value store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefsConfig {
    /// Preferences file (TOML). Relative paths resolve against the data directory.
    pub preferences_file: PathBuf,
    /// Keeper file (JSON). Relative paths resolve against the data directory.
    pub keeper_file: PathBuf,
    /// Commit after every CLI mutation
    pub autosave: bool,
}

impl Default for PrefsConfig {
    fn default() -> Self {
        Self {
            preferences_file: PathBuf::from("preferences.toml"),
            keeper_file: PathBuf::from("keeper.json"),
            autosave: true,
        }
    }
}

impl PrefsConfig {
    /// Resolve both store paths against `base`
    pub fn resolved(&self, base: &Path) -> Self {
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base.join(p)
            }
        };

        Self {
            preferences_file: resolve(&self.preferences_file),
            keeper_file: resolve(&self.keeper_file),
            autosave: self.autosave,
        }
    }
}

/// Network notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Log every dispatch round at info level
    pub log_each_round: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { log_each_round: true }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration version for migrations
    pub version: u32,
    pub logging: LoggingConfig,
    pub prefs: PrefsConfig,
    pub network: NetworkConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            logging: LoggingConfig::default(),
            prefs: PrefsConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl AppConfig {
    /// Get the configuration directory path
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "droidkit", "DroidKit")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the configuration file path
    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "droidkit", "DroidKit")
            .map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Load configuration from the default location
    pub async fn load() -> Result<Self> {
        let config_file = Self::config_file()
            .ok_or_else(|| DroidKitError::Config("Cannot determine config path".into()))?;
        Self::load_from(&config_file).await
    }

    /// Load configuration from `path`, writing defaults there if it is missing
    pub async fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            debug!("Loading config from {:?}", path);
            let contents = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            info!("Config file not found, using defaults");
            let config = AppConfig::default();
            config.save_to(path).await?;
            Ok(config)
        }
    }

    /// Save configuration to `path`
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = toml::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    /// Reject settings that cannot be applied
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(DroidKitError::Config(format!("unknown log level '{}'", other))),
        }
    }

    /// Store locations resolved against `base`, or the data directory when `None`
    pub fn prefs_paths(&self, base: Option<&Path>) -> Result<PrefsConfig> {
        let base = match base {
            Some(base) => base.to_path_buf(),
            None => Self::data_dir()
                .ok_or_else(|| DroidKitError::Config("Cannot determine data path".into()))?,
        };
        Ok(self.prefs.resolved(&base))
    }
}
