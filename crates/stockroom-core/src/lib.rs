//! # stockroom-core: Pure Business Logic for Stockroom
//!
//! This crate holds the reconciliation rules of the inventory backend as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockroom Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Offline client (POS screen, back office)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP + WebSocket                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/server (axum)                           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockroom-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌────────┐  │   │
//! │  │   │  types  │ │  stock  │ │  import  │ │  delta  │ │ money  │  │   │
//! │  │   │ Product │ │ ledger  │ │ dedup +  │ │ cursor  │ │ markup │  │   │
//! │  │   │ Variant │ │  rules  │ │  merge   │ │ replica │ │        │  │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └─────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 stockroom-db (Database Layer)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Variant, Tombstone, history)
//! - [`money`] - Integer money and markup arithmetic
//! - [`stock`] - On-hand / lifetime-maximum ledger rules
//! - [`import`] - Bulk import dedup/merge planner
//! - [`spreadsheet`] - Spreadsheet payload parsing and column mapping
//! - [`delta`] - Delta sync cursor rules and the client replica model
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use stockroom_core::stock::{StockLevels, adjust};
//!
//! let levels = StockLevels::new(10, Some(10));
//! let sale = adjust(levels, -3);
//! assert_eq!(sale.on_hand, 7);
//! assert_eq!(sale.lifetime_max, 10);
//!
//! let restock = adjust(sale.levels(), 3);
//! assert_eq!(restock.on_hand, 10);
//! assert_eq!(restock.lifetime_max, 13);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod delta;
pub mod error;
pub mod import;
pub mod money;
pub mod spreadsheet;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Markup, Money};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// How long deletion tombstones are kept before the retention sweep purges them.
///
/// ## Business Reason
/// A client offline for longer than this cannot learn about deletions through
/// delta sync and must do a full resync (cursor 0).
pub const TOMBSTONE_RETENTION_DAYS: i64 = 30;

/// Length of the numeric short codes the import dedup compares by code.
pub const SHORT_CODE_DIGITS: usize = 5;

/// Widest all-digit code the sequential allocator counts or hands out.
/// Longer digit strings are treated as opaque codes (supplier part numbers,
/// barcodes typed into the code column) and never raise the sequence.
pub const MAX_ALLOCATED_CODE_DIGITS: usize = 9;

/// Number of leading name words that group import rows into variants of one entry.
pub const GROUP_KEY_WORDS: usize = 2;

/// Currency assumed when neither the row nor the request names one.
pub const DEFAULT_CURRENCY: &str = "EUR";
