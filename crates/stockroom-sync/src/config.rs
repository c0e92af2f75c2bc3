//! # Sync Configuration
//!
//! Settings for the change broadcast and the tombstone retention sweep.
//!
//! ## Configuration Sources (priority order)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Configuration Loading Order                           │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOCKROOM_HEARTBEAT_SECS, STOCKROOM_TOMBSTONE_RETENTION_DAYS,      │
//! │     STOCKROOM_SWEEP_INTERVAL_SECS                                      │
//! │                                                                         │
//! │  2. Config File (sync.toml)                                            │
//! │     Location: ~/.config/stockroom/sync.toml (Linux)                    │
//! │               ~/Library/Application Support/com.stockroom.server/      │
//! │               %APPDATA%\stockroom\server\config\sync.toml (Windows)    │
//! │                                                                         │
//! │  3. Defaults (lowest priority)                                         │
//! │     Heartbeat every 30s, tombstones kept 30 days, swept every 6h       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example sync.toml
//! ```toml
//! [hub]
//! heartbeat_interval_secs = 30
//! outbound_buffer = 64
//!
//! [retention]
//! tombstone_retention_days = 30
//! sweep_interval_secs = 21600
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Hub Settings
// =============================================================================

/// Change broadcast settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubSettings {
    /// Seconds between heartbeat pings. A connection that has not answered
    /// the previous ping by the next tick is dropped.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Per-connection queue of not-yet-written frames. Notifications for a
    /// connection whose queue is full are dropped.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_outbound_buffer() -> usize {
    64
}

impl Default for HubSettings {
    fn default() -> Self {
        HubSettings {
            heartbeat_interval_secs: default_heartbeat_interval(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl HubSettings {
    /// Heartbeat period as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

// =============================================================================
// Retention Settings
// =============================================================================

/// Tombstone retention settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionSettings {
    /// Days a tombstone is kept before the sweep purges it.
    #[serde(default = "default_retention_days")]
    pub tombstone_retention_days: i64,

    /// Seconds between sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_retention_days() -> i64 {
    stockroom_core::TOMBSTONE_RETENTION_DAYS
}

fn default_sweep_interval() -> u64 {
    6 * 60 * 60
}

impl Default for RetentionSettings {
    fn default() -> Self {
        RetentionSettings {
            tombstone_retention_days: default_retention_days(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl RetentionSettings {
    /// Retention window as a chrono duration.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.tombstone_retention_days)
    }

    /// Sweep period as a `Duration`.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

// =============================================================================
// Main Sync Config
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Change broadcast settings.
    #[serde(default)]
    pub hub: HubSettings,

    /// Tombstone retention settings.
    #[serde(default)]
    pub retention: RetentionSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file and environment.
    ///
    /// A missing file is not an error: defaults are used and environment
    /// overrides still apply.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let path = config_path.or_else(Self::default_config_path);

        let mut config = match path {
            Some(ref p) if p.exists() => {
                let contents = std::fs::read_to_string(p)?;
                let parsed: SyncConfig = toml::from_str(&contents)?;
                info!(path = ?p, "Loaded sync config");
                parsed
            }
            _ => {
                debug!("No sync config file, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load sync config, using defaults");
            Self::default()
        })
    }

    /// Saves configuration to file.
    #[cfg(test)]
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.hub.heartbeat_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "heartbeat_interval_secs must be greater than 0".into(),
            ));
        }

        if self.hub.outbound_buffer == 0 {
            return Err(SyncError::InvalidConfig(
                "outbound_buffer must be greater than 0".into(),
            ));
        }

        if self.retention.tombstone_retention_days < 1 {
            return Err(SyncError::InvalidConfig(format!(
                "tombstone_retention_days must be at least 1, got {}",
                self.retention.tombstone_retention_days
            )));
        }

        if self.retention.sweep_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sweep_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`. Unparseable values are ignored with
    /// a warning.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("STOCKROOM_HEARTBEAT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) => {
                    debug!(secs, "Overriding heartbeat interval from environment");
                    self.hub.heartbeat_interval_secs = secs;
                }
                Err(_) => warn!(value = %raw, "Ignoring invalid STOCKROOM_HEARTBEAT_SECS"),
            }
        }

        if let Some(raw) = lookup("STOCKROOM_TOMBSTONE_RETENTION_DAYS") {
            match raw.parse::<i64>() {
                Ok(days) => {
                    debug!(days, "Overriding tombstone retention from environment");
                    self.retention.tombstone_retention_days = days;
                }
                Err(_) => warn!(value = %raw, "Ignoring invalid STOCKROOM_TOMBSTONE_RETENTION_DAYS"),
            }
        }

        if let Some(raw) = lookup("STOCKROOM_SWEEP_INTERVAL_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) => self.retention.sweep_interval_secs = secs,
                Err(_) => warn!(value = %raw, "Ignoring invalid STOCKROOM_SWEEP_INTERVAL_SECS"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stockroom", "server")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }
}
