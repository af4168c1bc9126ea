//! Server configuration
//!
//! Every setting has a default. Values can come from an optional JSON file
//! (path in `CINDERKV_CONFIG`) and are then overridden by environment
//! variables.

use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the JSON config file
pub const CONFIG_ENV: &str = "CINDERKV_CONFIG";

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the JSON snapshot file
    pub data_path: PathBuf,

    /// HTTP listen address
    pub listen_addr: String,

    /// Seconds between background expiration sweeps
    pub sweep_interval_secs: u64,

    /// Default log filter when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_path: PathBuf::from("data.json"),
            listen_addr: "127.0.0.1:5000".to_string(),
            sweep_interval_secs: 60,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `CINDERKV_CONFIG` (if set) and environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        serde_json::from_slice(&data)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
    }

    /// Apply `CINDERKV_*` overrides using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("CINDERKV_DATA_PATH") {
            self.data_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup("CINDERKV_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(secs) = lookup("CINDERKV_SWEEP_SECS") {
            self.sweep_interval_secs = secs.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("CINDERKV_SWEEP_SECS must be an integer, got '{}'", secs))
            })?;
        }
        if let Some(level) = lookup("CINDERKV_LOG") {
            self.log_level = level;
        }
        Ok(())
    }

    /// Check that the values are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        self.socket_addr()?;
        Ok(())
    }

    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid listen_addr '{}'", self.listen_addr)))
    }

    /// Interval between sweeps
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file could not be read
    Io(String),

    /// Config file is not valid JSON for [`Config`]
    Parse(String),

    /// A value is out of range or malformed
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Cannot read config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Cannot parse config: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
