//! Server configuration
//!
//! Loaded from a RON file (`config/server.ron` by default), then patched by
//! `ARENA_*` environment variables. Missing fields take their defaults.

use arena_core::logging::TracingConfig;
use arena_core::WorldConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },

    #[error("invalid value `{value}` for {var}")]
    InvalidOverride { var: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Game TCP listener
    pub bind_addr: SocketAddr,
    /// HTTP status API listener
    pub status_addr: SocketAddr,
    /// Ticks per second for every instance
    pub tick_rate: u32,
    /// Number of isolated worlds
    pub instances: usize,
    /// Content directory; `None` uses the built-in set
    pub content_dir: Option<PathBuf>,
    pub world: WorldConfig,
    pub tracing: TracingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7000)),
            status_addr: SocketAddr::from(([0, 0, 0, 0], 7080)),
            tick_rate: 25,
            instances: 1,
            content_dir: None,
            world: WorldConfig::default(),
            tracing: TracingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse a RON document
    pub fn from_ron(source: &str, path: &Path) -> Result<Self, ConfigError> {
        ron::from_str(source).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&source, path)
    }

    /// Load `path` if it exists, defaults otherwise, then apply the process
    /// environment and validate
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `ARENA_*` overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ARENA_BIND_ADDR") {
            self.bind_addr = parse_var("ARENA_BIND_ADDR", v)?;
        }
        if let Some(v) = lookup("ARENA_STATUS_ADDR") {
            self.status_addr = parse_var("ARENA_STATUS_ADDR", v)?;
        }
        if let Some(v) = lookup("ARENA_TICK_RATE") {
            self.tick_rate = parse_var("ARENA_TICK_RATE", v)?;
        }
        if let Some(v) = lookup("ARENA_INSTANCES") {
            self.instances = parse_var("ARENA_INSTANCES", v)?;
        }
        if let Some(v) = lookup("ARENA_CONTENT_DIR") {
            self.content_dir = if v.is_empty() { None } else { Some(PathBuf::from(v)) };
        }
        if let Some(v) = lookup("ARENA_SEED") {
            self.world.seed = parse_var("ARENA_SEED", v)?;
        }
        if let Some(v) = lookup("ARENA_LAG_DOWNER") {
            self.world.lag_downer = parse_var("ARENA_LAG_DOWNER", v)?;
        }
        if let Some(v) = lookup("ARENA_PVP") {
            self.world.pvp = parse_var("ARENA_PVP", v)?;
        }
        if let Some(v) = lookup("ARENA_LOG_LEVEL") {
            self.tracing.default_level = parse_var("ARENA_LOG_LEVEL", v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 || self.tick_rate > 1000 {
            return Err(ConfigError::Invalid(format!(
                "tick_rate must be in 1..=1000, got {}",
                self.tick_rate
            )));
        }
        if self.instances == 0 {
            return Err(ConfigError::Invalid("instances must be at least 1".into()));
        }
        Ok(())
    }

    /// Seconds between ticks
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidOverride { var, value })
}
