//! Server configuration module.
//!
//! Parses configuration from environment variables for the EventHub server.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `EVENTHUB_SIGNING_SECRET` | Yes | - | HMAC secret for credentials, at least 32 bytes |
//! | `EVENTHUB_TOKEN_TTL_SECS` | No | 3600 | Credential time-to-live in seconds |
//! | `EVENTHUB_USERS` | No | - | Login directory: `id:ROLE:argon2-phc;...` |
//! | `EVENTHUB_LOGIN_RATE` | No | 0.2 | Login attempts refilled per second, per user |
//! | `EVENTHUB_LOGIN_BURST` | No | 5 | Login attempts allowed in a burst, per user |
//! | `PORT` | No | 8080 | HTTP server port |

use std::env;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;
use zeroize::Zeroizing;

use crate::auth::SigningKey;
use crate::directory::InMemoryDirectory;
use crate::throttle::{DEFAULT_LOGIN_BURST, DEFAULT_LOGIN_RATE};

/// Default HTTP server port.
const DEFAULT_PORT: u16 = 8080;

/// Default credential time-to-live (1 hour).
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

const ENV_SIGNING_SECRET: &str = "EVENTHUB_SIGNING_SECRET";
const ENV_TOKEN_TTL: &str = "EVENTHUB_TOKEN_TTL_SECS";
const ENV_USERS: &str = "EVENTHUB_USERS";
const ENV_LOGIN_RATE: &str = "EVENTHUB_LOGIN_RATE";
const ENV_LOGIN_BURST: &str = "EVENTHUB_LOGIN_BURST";
const ENV_PORT: &str = "PORT";

/// Errors that can occur when parsing configuration.
///
/// All of them are fatal at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has invalid format.
    #[error("invalid format for {var}: {message}")]
    InvalidFormat { var: String, message: String },

    /// Port number is invalid.
    #[error("invalid port number: {0}")]
    InvalidPort(#[from] std::num::ParseIntError),

    /// Configuration validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

impl ConfigError {
    fn invalid(var: &str, message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            var: var.to_string(),
            message: message.into(),
        }
    }
}

/// Server configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Key used to sign and verify credentials.
    pub signing_key: SigningKey,

    /// Lifetime of issued credentials.
    pub token_ttl: Duration,

    /// Users accepted by the login endpoint.
    pub directory: InMemoryDirectory,

    /// Login attempts refilled per second, per user.
    pub login_rate: f64,

    /// Login attempts allowed in a burst, per user.
    pub login_burst: u32,

    /// HTTP server port.
    pub port: u16,
}

impl Config {
    /// Parse configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `EVENTHUB_SIGNING_SECRET` is missing or shorter than 32 bytes
    /// - Environment variables have invalid format
    /// - Port number is not a valid u16
    ///
    /// # Example
    ///
    /// ```no_run
    /// use eventhub_server::config::Config;
    ///
    /// let config = Config::from_env().expect("Failed to load config");
    /// println!("Server will listen on port {}", config.port);
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        let signing_key = parse_signing_key()?;
        let token_ttl = Duration::from_secs(parse_number(ENV_TOKEN_TTL, DEFAULT_TOKEN_TTL_SECS)?);
        let directory = parse_directory()?;
        let login_rate = parse_number(ENV_LOGIN_RATE, DEFAULT_LOGIN_RATE)?;
        let login_burst = parse_number(ENV_LOGIN_BURST, DEFAULT_LOGIN_BURST)?;
        let port = parse_port()?;

        let config = Self {
            signing_key,
            token_ttl,
            directory,
            login_rate,
            login_burst,
            port,
        };

        config.validate()?;

        if config.directory.is_empty() {
            warn!("{ENV_USERS} is empty - no user will be able to log in");
        }
        if config.token_ttl.is_zero() {
            warn!("{ENV_TOKEN_TTL} is 0 - every issued credential expires immediately");
        }

        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.login_rate.is_finite() || self.login_rate < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "{ENV_LOGIN_RATE} must be a non-negative number"
            )));
        }

        if self.login_burst == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{ENV_LOGIN_BURST} must be at least 1"
            )));
        }

        if i64::try_from(self.token_ttl.as_secs()).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "{ENV_TOKEN_TTL} is too large"
            )));
        }

        Ok(())
    }
}

/// Read the signing secret and build the signing key.
///
/// The secret buffer is zeroized once the key has been derived.
fn parse_signing_key() -> Result<SigningKey, ConfigError> {
    let secret = match env::var(ENV_SIGNING_SECRET) {
        Ok(secret) if !secret.is_empty() => Zeroizing::new(secret),
        Ok(_) | Err(env::VarError::NotPresent) => {
            return Err(ConfigError::MissingEnvVar(ENV_SIGNING_SECRET.to_string()))
        }
        Err(env::VarError::NotUnicode(_)) => {
            return Err(ConfigError::invalid(
                ENV_SIGNING_SECRET,
                "contains invalid unicode",
            ))
        }
    };

    SigningKey::new(secret.as_bytes())
        .map_err(|err| ConfigError::invalid(ENV_SIGNING_SECRET, err.to_string()))
}

/// Parse the EVENTHUB_USERS environment variable.
fn parse_directory() -> Result<InMemoryDirectory, ConfigError> {
    match env::var(ENV_USERS) {
        Ok(entries) => InMemoryDirectory::from_entries(&entries)
            .map_err(|err| ConfigError::invalid(ENV_USERS, err.to_string())),
        Err(env::VarError::NotPresent) => Ok(InMemoryDirectory::new()),
        Err(env::VarError::NotUnicode(_)) => {
            Err(ConfigError::invalid(ENV_USERS, "contains invalid unicode"))
        }
    }
}

/// Parse an optional numeric environment variable.
///
/// Returns `default` if not set.
fn parse_number<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|err: T::Err| ConfigError::invalid(name, err.to_string())),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(_)) => {
            Err(ConfigError::invalid(name, "contains invalid unicode"))
        }
    }
}

/// Parse the PORT environment variable.
///
/// Returns the default port if not set.
fn parse_port() -> Result<u16, ConfigError> {
    match env::var(ENV_PORT) {
        Ok(port_str) => Ok(port_str.parse()?),
        Err(env::VarError::NotPresent) => Ok(DEFAULT_PORT),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::invalid(
            ENV_PORT,
            "contains invalid unicode",
        )),
    }
}
