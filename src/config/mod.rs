//! # Configuration Management Module
//!
//! TOML configuration for the save service. Every section has serde defaults,
//! so an empty file is a valid configuration.
//!
//! - [`StorageConfig`] - where save documents live
//! - [`ContentConfig`] - optional JSON seed files for the reference catalog
//! - [`GameRules`] - time and vitals constants (`[rules]`)
//! - [`AutosaveConfig`] - periodic flush of dirty sessions
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ```rust,no_run
//! use savekeep::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("config.toml").await?;
//!     let config = Config::load("config.toml").await?;
//!     println!("Saves under {}", config.storage.data_dir);
//!     Ok(())
//! }
//! ```

use std::path::Path;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::game::reference::Catalog;
use crate::game::vitals::GameRules;
use crate::storage::autosave::AutosaveConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub rules: GameRules,
    #[serde(default)]
    pub autosave: AutosaveConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Seed files for items, NPCs, buildings and locations. Each is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npcs_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buildings_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations_file: Option<String>,
}

impl ContentConfig {
    /// Build the reference catalog from whichever seed files are configured.
    pub fn load_catalog(&self) -> Result<Catalog> {
        Catalog::load_seeds(
            self.items_file.as_deref().map(Path::new),
            self.npcs_file.as_deref().map(Path::new),
            self.buildings_file.as_deref().map(Path::new),
            self.locations_file.as_deref().map(Path::new),
        )
        .map_err(|e| anyhow!("Failed to load reference content: {}", e))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        if config.rules.minutes_per_segment == 0 {
            return Err(anyhow!("Invalid config {}: rules.minutes_per_segment must be > 0", path));
        }
        Ok(config)
    }

    /// Write a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let content = toml::to_string_pretty(&Config::default())
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}
