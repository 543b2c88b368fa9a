//! Configuration management
//!
//! This module handles loading and parsing configuration for dronehub.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! The MySQL import source is configured separately through the `MYSQL_*`
//! environment variables, see [`MysqlSourceConfig`].

use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlConnectOptions;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Comment moderation configuration
    #[serde(default)]
    pub moderation: ModerationConfig,
    /// Import pipeline configuration
    #[serde(default)]
    pub import: ImportConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/dronehub.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Comment moderation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Members of this group publish comments without review
    #[serde(default = "default_moderator_group")]
    pub group: String,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            group: default_moderator_group(),
        }
    }
}

fn default_moderator_group() -> String {
    "Moderateurs".to_string()
}

/// Import pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Directory for the intermediate dump file (system temp dir if unset)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("The variables {} must be set (check the .env file)", .0.join(", "))]
    MissingSourceVariables(Vec<&'static str>),
    #[error("MYSQL_PORT must be a port number, got '{0}'")]
    InvalidSourcePort(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - DRONEHUB_DATABASE_DRIVER
    /// - DRONEHUB_DATABASE_URL
    /// - DRONEHUB_MODERATION_GROUP
    /// - DRONEHUB_IMPORT_TEMP_DIR
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(driver) = std::env::var("DRONEHUB_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("DRONEHUB_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(group) = std::env::var("DRONEHUB_MODERATION_GROUP") {
            if !group.trim().is_empty() {
                self.moderation.group = group;
            }
        }

        if let Ok(dir) = std::env::var("DRONEHUB_IMPORT_TEMP_DIR") {
            if !dir.is_empty() {
                self.import.temp_dir = Some(PathBuf::from(dir));
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

/// Default MySQL port used when `MYSQL_PORT` is unset
pub const DEFAULT_MYSQL_PORT: &str = "3306";

/// Connection parameters of the remote MySQL database the import reads from.
#[derive(Clone, PartialEq, Eq)]
pub struct MysqlSourceConfig {
    pub host: String,
    pub port: String,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl MysqlSourceConfig {
    /// Read `MYSQL_HOST`, `MYSQL_PORT`, `MYSQL_NAME`, `MYSQL_USER` and
    /// `MYSQL_PASSWORD`. Unset variables read as empty strings, except the
    /// port which falls back to 3306.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the source configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("MYSQL_PORT")
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_MYSQL_PORT.to_string());
        Self {
            host: lookup("MYSQL_HOST").unwrap_or_default(),
            port,
            name: lookup("MYSQL_NAME").unwrap_or_default(),
            user: lookup("MYSQL_USER").unwrap_or_default(),
            password: lookup("MYSQL_PASSWORD").unwrap_or_default(),
        }
    }

    /// Check that every required parameter is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<&'static str> = [
            ("MYSQL_HOST", &self.host),
            ("MYSQL_NAME", &self.name),
            ("MYSQL_USER", &self.user),
            ("MYSQL_PASSWORD", &self.password),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(key, _)| key)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingSourceVariables(missing))
        }
    }

    /// Connect options for the source server. Credentials are passed as
    /// is, without URL encoding.
    pub fn connect_options(&self) -> Result<MySqlConnectOptions, ConfigError> {
        let port: u16 = self
            .port
            .parse()
            .map_err(|_| ConfigError::InvalidSourcePort(self.port.clone()))?;
        Ok(MySqlConnectOptions::new()
            .host(&self.host)
            .port(port)
            .database(&self.name)
            .username(&self.user)
            .password(&self.password))
    }

    /// `host:port/name`, safe to log.
    pub fn display_target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.name)
    }
}

impl std::fmt::Debug for MysqlSourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlSourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

// Shared mutex for config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
