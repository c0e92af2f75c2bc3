//! # stockroom-sync: Change Broadcast for Stockroom
//!
//! Real-time change notifications to connected clients, plus the background
//! maintenance that keeps delta sync bounded.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Change Broadcast Architecture                      │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   ChangeHub (explicitly constructed)             │  │
//! │  │                                                                  │  │
//! │  │  Built once in main, shared as Arc, shut down on exit           │  │
//! │  └───────────┬──────────────────────┬───────────────────────────────┘  │
//! │              │                      │                                   │
//! │              ▼                      ▼                                   │
//! │  ┌────────────────────┐  ┌────────────────────┐  ┌──────────────────┐  │
//! │  │  socket bridge     │  │  heartbeat task    │  │ retention sweep  │  │
//! │  │                    │  │                    │  │                  │  │
//! │  │ One per /ws conn.  │  │ Ping every 30s,    │  │ Purge tombstones │  │
//! │  │ authenticate/pong  │  │ drop the silent    │  │ older than 30d   │  │
//! │  └────────────────────┘  └────────────────────┘  └──────────────────┘  │
//! │                                                                         │
//! │  Delivery is best effort. Clients reconcile through delta sync.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Hub and retention settings (TOML + env)
//! - [`error`] - Sync error types
//! - [`hub`] - Connection registry, fan-out, heartbeat
//! - [`protocol`] - Notification and client message types
//! - [`socket`] - axum WebSocket bridge
//! - [`sweeper`] - Tombstone retention sweep
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockroom_sync::{ChangeHub, ChangeKind, ChangeNotification, SyncConfig};
//!
//! let config = SyncConfig::load_or_default(None);
//! let hub = Arc::new(ChangeHub::new(&config.hub));
//!
//! let note = ChangeNotification::for_product(ChangeKind::StockUpdated, &product)
//!     .with_stock(product.on_hand);
//! hub.broadcast_to_owner(product.owner_id.as_deref(), &note).await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod socket;
pub mod sweeper;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{HubSettings, RetentionSettings, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use hub::{spawn_heartbeat, ChangeHub, HeartbeatReport};
pub use protocol::{ChangeKind, ChangeNotification, ClientMessage, Outbound};
pub use socket::serve_connection;
pub use sweeper::{spawn_sweeper, sweep_once};
