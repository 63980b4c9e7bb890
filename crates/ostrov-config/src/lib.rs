//! Connection settings for the Ostrov service
//!
//! Six required values: the service port and the PostgreSQL target
//! (host, port, database, user, password). They come from explicit
//! arguments, the process environment, or a TOML file. There are no
//! defaults; a missing key or an unparsable port rejects the whole config.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

pub const PORT: &str = "PORT";
pub const DB_HOST: &str = "DB_HOST";
pub const DB_PORT: &str = "DB_PORT";
pub const DB_NAME: &str = "DB_NAME";
pub const DB_USER: &str = "DB_USER";
pub const DB_PASSWORD: &str = "DB_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("{key} is not a valid port number: {value:?}")]
    NotAnInteger { key: &'static str, value: String },
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Read-only view of the settings the database layer needs.
pub trait ConfigProvider: Send + Sync {
    fn port(&self) -> u16;
    fn db_host(&self) -> &str;
    fn db_port(&self) -> u16;
    fn db_name(&self) -> &str;
    fn db_user(&self) -> &str;
    fn db_password(&self) -> &str;
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub port: u16,
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
}

impl Config {
    pub fn new(
        port: u16,
        db_host: impl Into<String>,
        db_port: u16,
        db_name: impl Into<String>,
        db_user: impl Into<String>,
        db_password: impl Into<String>,
    ) -> Self {
        Self {
            port,
            db_host: db_host.into(),
            db_port,
            db_name: db_name.into(),
            db_user: db_user.into(),
            db_password: db_password.into(),
        }
    }

    /// Load from `PORT`, `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER` and `DB_PASSWORD`.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same rules as [`Config::from_env`], reading keys through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let port = parse_port(PORT, require(PORT)?)?;
        let db_port = parse_port(DB_PORT, require(DB_PORT)?)?;
        let db_host = require(DB_HOST)?;
        let db_name = require(DB_NAME)?;
        let db_user = require(DB_USER)?;
        let db_password = require(DB_PASSWORD)?;

        Ok(Self {
            port,
            db_host,
            db_port,
            db_name,
            db_user,
            db_password,
        })
    }

    /// Parse a TOML document holding the six keys in snake_case.
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }
}

fn parse_port(key: &'static str, value: String) -> ConfigResult<u16> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::NotAnInteger { key, value })
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"***")
            .finish()
    }
}

impl ConfigProvider for Config {
    fn port(&self) -> u16 {
        self.port
    }

    fn db_host(&self) -> &str {
        &self.db_host
    }

    fn db_port(&self) -> u16 {
        self.db_port
    }

    fn db_name(&self) -> &str {
        &self.db_name
    }

    fn db_user(&self) -> &str {
        &self.db_user
    }

    fn db_password(&self) -> &str {
        &self.db_password
    }
}
