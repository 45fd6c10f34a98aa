//! Configuration management for the chore board.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `DEV_MODE` - Optional. When `true` the supervisor gate is open. Defaults to `false`.
//! - `SUPERVISOR_PIN` - Shared secret for supervisor actions. Required unless `DEV_MODE=true`.
//! - `JWT_SECRET` - Optional. Key for signing supervisor sessions. Defaults to `SUPERVISOR_PIN`.
//! - `SESSION_TTL_DAYS` - Optional. Supervisor session lifetime. Defaults to `30`.
//! - `CHOREBOARD_STORE` - Optional. `memory` or `sqlite`. Defaults to `sqlite`.
//! - `CHOREBOARD_DATA_DIR` - Optional. Directory for the SQLite database. Defaults to `./data`.

use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreType;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Supervisor gate configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// The shared secret a supervisor types to unlock the dashboard
    pub supervisor_pin: Option<String>,

    /// Key used to sign session tokens
    pub jwt_secret: Option<String>,

    /// Session token lifetime in days
    pub session_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            supervisor_pin: None,
            jwt_secret: None,
            session_ttl_days: 30,
        }
    }
}

impl AuthConfig {
    /// Whether supervisor routes require a session token.
    pub fn auth_required(&self, dev_mode: bool) -> bool {
        !dev_mode
    }

    /// The key session tokens are signed with (falls back to the PIN).
    pub fn signing_secret(&self) -> Option<&str> {
        self.jwt_secret
            .as_deref()
            .or(self.supervisor_pin.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Open the supervisor gate (local development only)
    pub dev_mode: bool,

    /// Supervisor gate settings
    pub auth: AuthConfig,

    /// Storage backend
    pub store_type: StoreType,

    /// Directory holding the database file
    pub data_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `SUPERVISOR_PIN` is not set outside dev mode,
    /// and `ConfigError::InvalidValue` for unparsable numbers.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let dev_mode = var("DEV_MODE").map(|v| parse_bool(&v)).unwrap_or(false);

        let supervisor_pin = var("SUPERVISOR_PIN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if supervisor_pin.is_none() && !dev_mode {
            return Err(ConfigError::MissingEnvVar("SUPERVISOR_PIN".to_string()));
        }

        let session_ttl_days: i64 = var("SESSION_TTL_DAYS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("SESSION_TTL_DAYS".to_string(), format!("{}", e))
            })?;
        if session_ttl_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_DAYS".to_string(),
                "must be positive".to_string(),
            ));
        }

        let auth = AuthConfig {
            supervisor_pin,
            jwt_secret: var("JWT_SECRET").filter(|s| !s.is_empty()),
            session_ttl_days,
        };

        let store_type = var("CHOREBOARD_STORE")
            .map(|s| StoreType::from_str(&s))
            .unwrap_or_default();

        let data_dir = var("CHOREBOARD_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        Ok(Self {
            host,
            port,
            dev_mode,
            auth,
            store_type,
            data_dir,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(supervisor_pin: Option<String>, store_type: StoreType, data_dir: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            dev_mode: false,
            auth: AuthConfig {
                supervisor_pin,
                ..AuthConfig::default()
            },
            store_type,
            data_dir,
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
