//! # Sync Error Types
//!
//! Error types for the change broadcast, its configuration and the
//! retention sweep.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Connections   │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  UnknownConn.   │  │  InvalidMessage         │ │
//! │  │  ConfigLoad     │  │  ShuttingDown   │  │  SerializationFailed    │ │
//! │  │  ConfigSave     │  │  ChannelError   │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │    Database     │  retention sweep only                             │
//! │  │  DatabaseError  │                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Connection Errors
    // =========================================================================
    /// No registered connection has this id.
    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    /// The hub has been shut down and accepts no new connections.
    #[error("Change hub is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Invalid message received from a client.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Failed to serialize an outgoing message.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<stockroom_db::DbError> for SyncError {
    fn from(err: stockroom_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Classification
// =============================================================================

impl SyncError {
    /// Returns true if retrying later may succeed.
    ///
    /// The sweeper keeps running after a retryable failure and tries again
    /// on its next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::DatabaseError(_) | SyncError::ChannelError(_))
    }

    /// Returns true if this is a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}
