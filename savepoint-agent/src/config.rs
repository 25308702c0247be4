//! Configuration management for the snapshot agent.
//!
//! Loads configuration from a TOML file. Only the `[backup]` section is
//! picked up again on reload; ports and paths need a restart.

use crate::host::HostConfig;
use savepoint_core::config::BackupConfig;
use savepoint_core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// HTTP/WebSocket server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Heartbeat period of the scheduler, in milliseconds
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory tree to snapshot
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// The host's run directory; archives go to `<run_dir>/backup`
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,

    /// Overrides `<run_dir>/backup`
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_port() -> u16 {
    9991
}

fn default_tick_millis() -> u64 {
    1000
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("world")
}

fn default_run_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            tick_millis: default_tick_millis(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            run_dir: default_run_dir(),
            backup_dir: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl PathsConfig {
    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.run_dir.join("backup"))
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.backup.validate()?;
        if config.agent.tick_millis == 0 {
            return Err(ConfigError::Invalid("tick_millis must be positive".to_string()));
        }
        Ok(config)
    }

    /// Re-read only the `[backup]` section of `path`
    pub fn reload_backup(path: &Path) -> Result<BackupConfig, ConfigError> {
        Ok(Self::from_file(path)?.backup)
    }
}
