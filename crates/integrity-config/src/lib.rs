//! # integrity-config
//!
//! Configuration management for the integrity stress tool.
//!
//! Loads configuration from:
//! 1. `~/.integrity/config.toml` (global)
//! 2. `.integrity/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub use logging::{init_logging, LogLevel};

/// Project-local config location, relative to the working directory.
pub const PROJECT_CONFIG_PATH: &str = ".integrity/config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fill: FillConfig,
    pub run: RunConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let global = Self::global_config_path();
        Self::load_from(global.as_deref(), Path::new(PROJECT_CONFIG_PATH))
    }

    /// Load config from explicit global and project paths, then apply
    /// environment overrides. Missing files are skipped.
    pub fn load_from(global: Option<&Path>, project: &Path) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();

        if let Some(global_path) = global {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                let contents = std::fs::read_to_string(global_path)?;
                merge_tables(&mut merged, toml::from_str(&contents)?);
            }
        }

        if project.exists() {
            debug!("Loading project config from {:?}", project);
            let contents = std::fs::read_to_string(project)?;
            merge_tables(&mut merged, toml::from_str(&contents)?);
        }

        let mut config = toml::Value::Table(merged).try_into::<Config>()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Global config path: ~/.integrity/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".integrity/config.toml"))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = std::env::var("INTEGRITY_RESERVE_PERCENT") {
            self.fill.reserve_percent = parse_env("INTEGRITY_RESERVE_PERCENT", &value)?;
        }
        if let Ok(value) = std::env::var("INTEGRITY_MAX_FILE_SIZE") {
            self.fill.max_file_size = parse_env("INTEGRITY_MAX_FILE_SIZE", &value)?;
        }
        if let Ok(value) = std::env::var("INTEGRITY_LOG_LEVEL") {
            self.logging.level = value;
        }
        Ok(())
    }

    /// Reject values the fill engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fill.reserve_percent > 100 {
            return Err(ConfigError::Invalid(format!(
                "fill.reserve_percent must be at most 100, got {}",
                self.fill.reserve_percent
            )));
        }
        if self.fill.max_file_size == 0 {
            return Err(ConfigError::Invalid(
                "fill.max_file_size must be greater than 0".to_string(),
            ));
        }
        if self
            .fill
            .min_file_size
            .checked_add(self.fill.max_file_size)
            .is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "fill.min_file_size + fill.max_file_size overflows ({} + {})",
                self.fill.min_file_size, self.fill.max_file_size
            )));
        }
        if self.logging.level.parse::<LogLevel>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "logging.level {:?} is not one of error, warn, info, debug, trace",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Render this config as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key}={value:?} is not a valid number")))
}

/// Recursively overlay `overlay` onto `base`; scalar keys in `overlay` win.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Auto-sizing and naming policy for newly created files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillConfig {
    /// Share of total capacity that auto-sized files never eat into
    pub reserve_percent: u8,
    /// Lower bound of the random size span
    pub min_file_size: u64,
    /// Width of the random size span, sizes fall in `[min, min + max)`
    pub max_file_size: u64,
    /// Numeric suffixes tried when a name is already taken
    pub collision_probes: u32,
    /// Share one content seed and round sizes to 512 so files dedupe well
    pub duplicate: bool,
    /// Stop at the first capacity hit instead of draining
    pub quit_on_full: bool,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            reserve_percent: 50,
            min_file_size: 512,
            max_file_size: 8 * 1024 * 1024,
            collision_probes: 50,
            duplicate: false,
            quit_on_full: false,
        }
    }
}

/// Loop bounds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop after this many drain cycles (None = until cancelled)
    pub max_cycles: Option<u64>,
    /// Seed for the size-choosing RNG (None = entropy)
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}
