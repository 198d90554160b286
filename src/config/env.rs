//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use super::AppConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "TEST_ROLLUP";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Output format from TEST_ROLLUP_FORMAT
    pub format: Option<String>,
    /// History recording from TEST_ROLLUP_HISTORY
    pub history: Option<bool>,
    /// Log level from TEST_ROLLUP_LOG
    pub log: Option<String>,
    /// Verbose from TEST_ROLLUP_VERBOSE
    pub verbose: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            format: get_env("FORMAT"),
            history: get_env_bool("HISTORY"),
            log: get_env("LOG"),
            verbose: get_env_bool("VERBOSE"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.format.is_some() || self.history.is_some() || self.log.is_some() || self.verbose.is_some()
    }

    /// Override file settings with whatever the environment provides
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(format) = &self.format {
            config.output_format = format.clone();
        }
        if let Some(enabled) = self.history {
            config.history.enabled = enabled;
        }
        if let Some(level) = &self.log {
            config.log_level = level.clone();
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.unwrap_or(false)
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Print all TEST_ROLLUP environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_FORMAT     Output format (tree, json, json-pretty, summary, csv)");
    println!("  {ENV_PREFIX}_HISTORY    Record run history (true/false)");
    println!("  {ENV_PREFIX}_LOG        Log level (trace, debug, info, warn, error)");
    println!("  {ENV_PREFIX}_VERBOSE    Enable debug logging (true/false)");
}
