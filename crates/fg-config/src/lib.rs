//! FlowGate Configuration
//!
//! Configuration is layered:
//! 1. Built-in defaults
//! 2. Optional TOML file
//! 3. `FG_*` environment variables
//!
//! ## Environment Variables
//!
//! | Variable | Key |
//! |----------|-----|
//! | `FG_HOST` | `server.host` |
//! | `FG_PORT` | `server.port` |
//! | `FG_EDITION` | `edition` |
//! | `FG_DATABASE_URL` | `database.url` |
//! | `FG_DATABASE_MAX_CONNECTIONS` | `database.max_connections` |
//! | `FG_JWT_SECRET` | `auth.jwt_secret` |
//! | `FG_JWT_ISSUER` | `auth.issuer` |
//! | `FG_JWT_AUDIENCE` | `auth.audience` |
//! | `FG_TOKEN_EXPIRY_SECS` | `auth.token_expiry_secs` |
//! | `FG_OTP_EXPIRY_SECS` | `auth.otp_expiry_secs` |
//! | `FG_FEDERATED_ISSUER` | `federated.issuer` |
//! | `FG_FEDERATED_AUDIENCE` | `federated.audience` |
//! | `FG_FEDERATED_SECRET` | `federated.secret` |
//! | `FG_LOG_LEVEL` | `logging.level` |
//! | `FG_LOG_JSON` | `logging.json` |

use std::path::Path;
use std::str::FromStr;

use fg_common::Edition;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Minimum length accepted for the token signing secret
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Store selection. `memory` keeps everything in-process; anything starting
/// with `sqlite:` is handed to the SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://flowgate.db".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.url == "memory"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub token_expiry_secs: i64,
    pub otp_expiry_secs: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: "flowgate".to_string(),
            audience: "flowgate".to_string(),
            token_expiry_secs: 7 * 24 * 3600,
            otp_expiry_secs: 30 * 60,
        }
    }
}

/// Trusted external identity provider for federated sign-in.
/// Federated sign-in is disabled while `secret` is empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FederatedSettings {
    pub issuer: String,
    pub audience: String,
    pub secret: String,
}

impl FederatedSettings {
    pub fn is_enabled(&self) -> bool {
        !self.secret.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub edition: Edition,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthSettings,
    pub federated: FederatedSettings,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from an optional TOML file, then apply `FG_*` overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p).map_err(|source| ConfigError::Io {
                    path: p.display().to_string(),
                    source,
                })?;
                debug!(path = %p.display(), "Loaded config file");
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply overrides from a key lookup. Takes a closure so tests don't
    /// have to mutate the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FG_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("FG_PORT") {
            self.server.port = parse_value("FG_PORT", &v)?;
        }
        if let Some(v) = lookup("FG_EDITION") {
            self.edition = Edition::from_str(&v)
                .map_err(|e| ConfigError::invalid("FG_EDITION", e.to_string()))?;
        }
        if let Some(v) = lookup("FG_DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = lookup("FG_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_value("FG_DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("FG_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Some(v) = lookup("FG_JWT_ISSUER") {
            self.auth.issuer = v;
        }
        if let Some(v) = lookup("FG_JWT_AUDIENCE") {
            self.auth.audience = v;
        }
        if let Some(v) = lookup("FG_TOKEN_EXPIRY_SECS") {
            self.auth.token_expiry_secs = parse_value("FG_TOKEN_EXPIRY_SECS", &v)?;
        }
        if let Some(v) = lookup("FG_OTP_EXPIRY_SECS") {
            self.auth.otp_expiry_secs = parse_value("FG_OTP_EXPIRY_SECS", &v)?;
        }
        if let Some(v) = lookup("FG_FEDERATED_ISSUER") {
            self.federated.issuer = v;
        }
        if let Some(v) = lookup("FG_FEDERATED_AUDIENCE") {
            self.federated.audience = v;
        }
        if let Some(v) = lookup("FG_FEDERATED_SECRET") {
            self.federated.secret = v;
        }
        if let Some(v) = lookup("FG_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("FG_LOG_JSON") {
            self.logging.json = v == "true" || v == "1";
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::invalid(
                "auth.jwt_secret",
                format!("must be at least {} characters", MIN_JWT_SECRET_LEN),
            ));
        }
        if self.auth.token_expiry_secs <= 0 {
            return Err(ConfigError::invalid("auth.token_expiry_secs", "must be positive"));
        }
        if self.auth.otp_expiry_secs <= 0 {
            return Err(ConfigError::invalid("auth.otp_expiry_secs", "must be positive"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid("database.max_connections", "must be at least 1"));
        }
        if !self.database.is_memory() && !self.database.url.starts_with("sqlite:") {
            return Err(ConfigError::invalid(
                "database.url",
                "expected 'memory' or a sqlite: URL",
            ));
        }
        if self.federated.is_enabled() && self.federated.issuer.is_empty() {
            return Err(ConfigError::invalid(
                "federated.issuer",
                "required when federated.secret is set",
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, e.to_string()))
}
