//! Configuration file lookup

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::AppConfig;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./test-rollup.yaml",
    "./.test-rollup.yaml",
    "~/.config/test-rollup/config.yaml",
];

/// Find configuration file in standard locations
pub fn find_config() -> Option<PathBuf> {
    CONFIG_LOCATIONS
        .iter()
        .map(|location| expand_path(location))
        .find(|path| path.exists())
}

/// Load the explicit file if given, else the first standard location, else defaults
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config(),
    };

    match path {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            AppConfig::load(&path)
                .with_context(|| format!("Invalid configuration in {}", path.display()))
        }
        None => Ok(AppConfig::default()),
    }
}

/// Expand ~ to home directory
pub(super) fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
pub(super) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
