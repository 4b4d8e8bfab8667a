//! Configuration handling for fbsync

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path) -> Result<Config> {
    let config_str = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("failed to read config file {}: {e}", path.display()))
    })?;

    let config: Config = toml::from_str(&config_str)?;
    Ok(config)
}

/// The complete fbsync configuration. Every section is optional in the file;
/// command-line flags override whatever is loaded.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database connection configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    /// Database file path or alias on the server.
    #[serde(default)]
    pub database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: default_password(),
            database: String::new(),
        }
    }
}

impl DatabaseConfig {
    /// Fail fast on blank required connection settings.
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(Error::Config("database path is required".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(Error::Config("database host must not be blank".to_string()));
        }
        if self.user.trim().is_empty() {
            return Err(Error::Config("database user must not be blank".to_string()));
        }
        Ok(())
    }
}

/// Default script and output locations, overridable per command
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PathsConfig {
    pub scripts_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub db_dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3050
}

fn default_user() -> String {
    "SYSDBA".to_string()
}

fn default_password() -> String {
    "masterkey".to_string()
}

fn default_level() -> String {
    "info".to_string()
}
