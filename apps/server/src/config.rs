//! Server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//! Change broadcast and retention settings live in `sync.toml`
//! (see [`stockroom_sync::SyncConfig`]); `STOCKROOM_SYNC_CONFIG` points at it.

use std::net::SocketAddr;
use std::path::PathBuf;

use stockroom_core::validation::validate_currency;
use stockroom_core::{Markup, DEFAULT_CURRENCY};

/// Server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// HTTP port
    pub http_port: u16,

    /// Bind address
    pub bind_addr: String,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Phone number of the one account that also sees unowned records
    pub super_account_phone: Option<String>,

    /// Currency for imports and creates that name none
    pub default_currency: String,

    /// Markup for imports and creates that name none
    pub default_markup: Markup,

    /// Explicit sync.toml path (otherwise the platform config dir)
    pub sync_config_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            http_port: 8080,
            bind_addr: "0.0.0.0".to_string(),
            database_path: PathBuf::from("stockroom.db"),
            super_account_phone: None,
            default_currency: DEFAULT_CURRENCY.to_string(),
            default_markup: Markup::zero(),
            sync_config_path: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();

        let http_port = match lookup("STOCKROOM_HTTP_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("STOCKROOM_HTTP_PORT".to_string()))?,
            None => defaults.http_port,
        };

        let default_currency = match lookup("STOCKROOM_DEFAULT_CURRENCY") {
            Some(raw) => {
                let currency = raw.trim().to_uppercase();
                validate_currency(&currency).map_err(|_| {
                    ConfigError::InvalidValue("STOCKROOM_DEFAULT_CURRENCY".to_string())
                })?;
                currency
            }
            None => defaults.default_currency,
        };

        let default_markup = match lookup("STOCKROOM_DEFAULT_MARKUP_PCT") {
            Some(raw) => Markup::parse_percent(&raw).ok_or_else(|| {
                ConfigError::InvalidValue("STOCKROOM_DEFAULT_MARKUP_PCT".to_string())
            })?,
            None => defaults.default_markup,
        };

        let config = ServerConfig {
            http_port,
            bind_addr: lookup("STOCKROOM_BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_path: lookup("STOCKROOM_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            super_account_phone: lookup("STOCKROOM_SUPER_ACCOUNT_PHONE")
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            default_currency,
            default_markup,
            sync_config_path: lookup("STOCKROOM_SYNC_CONFIG").map(PathBuf::from),
        };

        // Fail at startup rather than at bind time
        config.socket_addr()?;

        Ok(config)
    }

    /// Address the HTTP listener binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.http_port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("STOCKROOM_BIND_ADDR".to_string()))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
