//! # Stockroom Server
//!
//! HTTP/WebSocket API for the offline-capable inventory backend.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Stockroom Server                                │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  DeltaService  │  │  StockService  │  │  ImportService             ││
//! │  │                │  │                │  │                            ││
//! │  │ • delta        │  │ • adjust       │  │ • import (dedup/merge)     ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐                                │
//! │  │ CatalogService │  │   /ws bridge   │                                │
//! │  │                │  │                │                                │
//! │  │ • create/edit  │  │ • ChangeHub    │                                │
//! │  │ • delete       │  │   (heartbeat)  │                                │
//! │  │ • history      │  │                │                                │
//! │  └────────────────┘  └────────────────┘                                │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      AppState (built in main)                    │  │
//! │  │   Database (SQLite)   ·   Arc<ChangeHub>   ·   ServerConfig      │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `STOCKROOM_HTTP_PORT` - HTTP port (default: 8080)
//! - `STOCKROOM_BIND_ADDR` - Bind address (default: 0.0.0.0)
//! - `STOCKROOM_DATABASE_PATH` - SQLite file (default: stockroom.db)
//! - `STOCKROOM_SUPER_ACCOUNT_PHONE` - Account that also sees unowned records
//! - `STOCKROOM_DEFAULT_CURRENCY` - Default currency (default: EUR)
//! - `STOCKROOM_DEFAULT_MARKUP_PCT` - Default markup percent (default: 0)
//! - `STOCKROOM_SYNC_CONFIG` - Path to sync.toml

pub mod config;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod ws;

use std::sync::Arc;

use axum::routing::{delete, get, patch, post};
use axum::Router;

use stockroom_db::Database;
use stockroom_sync::ChangeHub;

// Re-exports
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    pub db: Database,
    pub hub: Arc<ChangeHub>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(db: Database, hub: Arc<ChangeHub>, config: ServerConfig) -> Self {
        AppState { db, hub, config }
    }
}

/// Builds the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/products/delta", get(routes::delta))
        .route("/products", post(routes::create_product).get(routes::list_products))
        .route(
            "/products/{id}",
            get(routes::get_product)
                .put(routes::update_product)
                .delete(routes::delete_product),
        )
        .route("/products/{id}/stock", patch(routes::adjust_stock))
        .route("/products/{id}/history", get(routes::product_history))
        .route(
            "/products/{id}/variants/{variant_id}",
            delete(routes::remove_variant),
        )
        .route("/excel-import", post(routes::excel_import))
        .route("/health", get(routes::health))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}
