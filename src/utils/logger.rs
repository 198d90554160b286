//! `tracing` subscriber for the `test-rollup` binary
//!
//! Only events from this crate are shown. They go to stderr so a rendered
//! tree or JSON document on stdout can be piped.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Verbosity accepted by `log_level` in the config file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a config or `TEST_ROLLUP_LOG` value; case-insensitive
    pub fn parse(name: &str) -> Option<Self> {
        let level = match name.trim().to_ascii_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => return None,
        };
        Some(level)
    }

    /// `--verbose` forces debug; an unreadable configured level means info
    pub fn resolve(configured: &str, verbose: bool) -> Self {
        if verbose {
            return LogLevel::Debug;
        }
        Self::parse(configured).unwrap_or(LogLevel::Info)
    }

    fn filter_directive(self) -> String {
        format!("test_rollup={}", Level::from(self))
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Install the global subscriber; call once from `main`
pub fn init_logger(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level.filter_directive()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_values() {
        assert_eq!(LogLevel::parse("info"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse(" DEBUG "), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_verbose_overrides_config() {
        assert_eq!(LogLevel::resolve("warn", false), LogLevel::Warn);
        assert_eq!(LogLevel::resolve("warn", true), LogLevel::Debug);
        assert_eq!(LogLevel::resolve("bogus", false), LogLevel::Info);
    }

    #[test]
    fn test_filter_targets_crate() {
        assert_eq!(LogLevel::Warn.filter_directive(), "test_rollup=WARN");
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }
}
