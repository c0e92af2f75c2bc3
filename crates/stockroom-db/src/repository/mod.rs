//! # Repository Module
//!
//! Database repository implementations for Stockroom.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Server service                                                        │
//! │       │                                                                 │
//! │       │  db.products().modify(id, |p| adjust_product(p, None, -3))     │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── get / list / list_owned_by / changed_since                        │
//! │  ├── insert                                                            │
//! │  ├── update_if_version / modify    (version precondition)              │
//! │  └── delete_with_tombstone         (one transaction)                   │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog entries and variants
//! - [`tombstone::TombstoneRepository`] - Deletion markers and retention purge
//! - [`history::HistoryRepository`] - Edit journal
//! - [`category::CategoryRepository`] - Category lookup for imports

pub mod category;
pub mod history;
pub mod product;
pub mod tombstone;
