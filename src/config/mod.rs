//! Configuration module
//!
//! Handles loading and managing configuration.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::{find_config, load_config};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;
use crate::results::{default_history_path, DEFAULT_HISTORY_LIMIT};
use crate::utils::LogLevel;
use file::{expand_path, is_yaml_file};

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default output format (tree, json, json-pretty, summary, csv)
    pub output_format: String,

    /// Log level when `--verbose` is not given
    pub log_level: String,

    /// Run history settings
    pub history: HistoryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_format: "tree".to_string(),
            log_level: "info".to_string(),
            history: HistoryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if OutputFormat::from_str(&self.output_format).is_none() {
            bail!(
                "Unknown output format '{}'. Valid: tree, json, json-pretty, summary, csv",
                self.output_format
            );
        }
        if LogLevel::parse(&self.log_level).is_none() {
            bail!("Unknown log level '{}'", self.log_level);
        }
        if self.history.limit == 0 {
            bail!("history.limit must be at least 1");
        }
        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        Self {
            output_format: "tree".to_string(),
            log_level: "info".to_string(),
            history: HistoryConfig {
                enabled: true,
                path: Some(PathBuf::from("~/.local/share/test-rollup/history.json")),
                limit: DEFAULT_HISTORY_LIMIT,
            },
        }
    }

    /// Parsed output format, falling back to the tree view
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from_str(&self.output_format).unwrap_or(OutputFormat::Tree)
    }

    /// Effective history file location
    pub fn history_path(&self) -> PathBuf {
        match &self.history.path {
            Some(path) => expand_path(&path.to_string_lossy()),
            None => default_history_path(),
        }
    }
}

/// Run history configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Record completed runs
    pub enabled: bool,

    /// History file; defaults to the user data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Runs kept per test
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}
