//! Application configuration loaded from TOML

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use verdict_runtime::{ConsensusOptions, HarnessConfig};

use crate::logging::LogConfig;

/// File looked up in the working directory by [`Config::load_default`]
pub const DEFAULT_CONFIG_FILE: &str = "verdict.toml";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Application name
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Environment (dev, prod, etc.)
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub harness: HarnessSection,
    #[serde(default)]
    pub consensus: ConsensusOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            environment: default_environment(),
            logging: LogConfig::default(),
            harness: HarnessSection::default(),
            consensus: ConsensusOptions::default(),
        }
    }
}

fn default_app_name() -> String {
    "verdict".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

/// Harness timing, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSection {
    /// Batch deadline; 0 disables it
    pub deadline_ms: u64,
    /// Grace period after the deadline before engines are aborted
    pub grace_ms: u64,
}

impl Default for HarnessSection {
    fn default() -> Self {
        Self {
            deadline_ms: 30_000,
            grace_ms: 2_000,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load `verdict.toml` from the working directory if it exists
    pub fn load_default() -> Result<Option<Self>> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    /// Harness settings from this file, then `VERDICT_DEADLINE_MS` / `VERDICT_GRACE_MS`
    pub fn harness_config(&self) -> Result<HarnessConfig> {
        let mut builder = HarnessConfig::builder().grace_period(Duration::from_millis(self.harness.grace_ms));
        builder = match self.harness.deadline_ms {
            0 => builder.no_deadline(),
            ms => builder.deadline(Duration::from_millis(ms)),
        };

        let config = builder
            .with_env()
            .and_then(verdict_runtime::HarnessConfigBuilder::build)
            .context("Invalid harness configuration")?;
        Ok(config)
    }

    /// Default configuration rendered as TOML
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}
