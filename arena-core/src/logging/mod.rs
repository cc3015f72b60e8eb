//! Structured logging setup.
//!
//! A [`TracingConfig`] is a base level plus per-target overrides, rendered as
//! an `EnvFilter` directive list. It rides inside the server config so the
//! RON file and `ARENA_LOG_LEVEL` both reach it. `RUST_LOG` beats both.
//!
//! Only the first [`init_tracing`] call installs a subscriber.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    /// Case-insensitive; `warning` is accepted for `warn`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

/// Subscriber settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub default_level: LogLevel,
    /// `(target, level)` pairs; a later entry for the same target wins
    pub module_filters: Vec<(String, LogLevel)>,
    pub show_thread_ids: bool,
    pub show_targets: bool,
    pub show_file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: LogLevel::Info,
            module_filters: vec![
                ("arena_core::world".to_string(), LogLevel::Info),
                ("arena_core::zone".to_string(), LogLevel::Info),
                ("arena_server::transport".to_string(), LogLevel::Info),
                ("arena_server::instance".to_string(), LogLevel::Info),
            ],
            show_thread_ids: false,
            show_targets: true,
            show_file_line: false,
        }
    }
}

impl TracingConfig {
    /// Set or replace the level for one target
    pub fn set_module_level(&mut self, target: impl Into<String>, level: LogLevel) {
        let target = target.into();
        self.module_filters.retain(|(t, _)| *t != target);
        self.module_filters.push((target, level));
    }

    /// `EnvFilter` directives, e.g. `info,arena_core::world=debug`
    pub fn filter_directives(&self) -> String {
        std::iter::once(self.default_level.to_string())
            .chain(
                self.module_filters
                    .iter()
                    .map(|(target, level)| format!("{target}={level}")),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}

static TRACING_INIT: Once = Once::new();

/// Install the global subscriber from `config`
pub fn init_tracing(config: &TracingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.show_targets)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .compact();

        // Test harnesses may already own the global subscriber
        let _ = subscriber.try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(" debug ".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("loud".parse::<LogLevel>().is_err());
        assert!(LogLevel::Trace < LogLevel::Error);
    }

    #[test]
    fn test_default_directives() {
        let directives = TracingConfig::default().filter_directives();
        assert!(directives.starts_with("info,"));
        assert!(directives.contains("arena_server::instance=info"));
    }

    #[test]
    fn test_set_module_level_replaces() {
        let mut config = TracingConfig {
            default_level: LogLevel::Warn,
            module_filters: Vec::new(),
            ..TracingConfig::default()
        };
        config.set_module_level("arena_core::grid", LogLevel::Trace);
        config.set_module_level("arena_core::zone", LogLevel::Debug);
        config.set_module_level("arena_core::grid", LogLevel::Error);
        assert_eq!(
            config.filter_directives(),
            "warn,arena_core::zone=debug,arena_core::grid=error"
        );
    }

    #[test]
    fn test_init_tracing_twice() {
        init_tracing(&TracingConfig::default());
        init_tracing(&TracingConfig {
            default_level: LogLevel::Trace,
            ..TracingConfig::default()
        });
        tracing::info!("tracing initialized");
    }
}
