//! # Domain Types
//!
//! Core domain types used throughout Stockroom.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────────┐          ┌─────────────────────┐              │
//! │  │      Product        │ 1      * │      Variant        │              │
//! │  │  ─────────────────  │◆────────▶│  ─────────────────  │              │
//! │  │  id (UUID)          │ embedded │  id (stable UUID)   │              │
//! │  │  owner_id           │          │  name, codes        │              │
//! │  │  name, codes        │          │  price / base       │              │
//! │  │  price / base       │          │  on_hand            │              │
//! │  │  on_hand            │          │  lifetime_max       │              │
//! │  │  lifetime_max       │          └─────────────────────┘              │
//! │  │  version            │                                                │
//! │  │  created/updated_at │          ┌─────────────────────┐              │
//! │  └─────────────────────┘          │     Tombstone       │              │
//! │                                   │  product_id+owner   │              │
//! │  ┌─────────────────────┐          │  deleted_at         │              │
//! │  │    HistoryItem      │          └─────────────────────┘              │
//! │  │  action, details    │                                                │
//! │  └─────────────────────┘                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Versioning
//! Every product carries a `version` that increases by one on every write.
//! Writers read a product, compute the new state, and store it only if the
//! version is still the one they read. Variants are addressed by their stable
//! `id`, never by position, once they are stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Markup, Money};

// =============================================================================
// Variant
// =============================================================================

/// A size/colour variant embedded in a product's variant list.
///
/// Same attribute shape as a product, but no identity outside its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Variant {
    /// Stable identifier within the parent (UUID v4).
    pub id: String,

    /// Display name (usually the full name of the import row).
    pub name: String,

    /// Short code (5-digit numeric when allocated by the system).
    pub code: Option<String>,

    /// Supplier catalog number.
    pub catalog_number: Option<String>,

    /// Scan code (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Selling price in cents.
    pub price_cents: i64,

    /// Base/cost price in cents.
    pub base_price_cents: i64,

    /// Markup in basis points applied to the base price.
    pub markup_bps: u32,

    /// ISO currency code.
    pub currency: String,

    /// Current on-hand quantity.
    pub on_hand: i64,

    /// Highest quantity ever stocked. `None` on legacy records.
    pub lifetime_max: Option<i64>,
}

impl Variant {
    /// Returns the selling price.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the markup.
    #[inline]
    pub fn markup(&self) -> Markup {
        Markup::from_bps(self.markup_bps)
    }

    /// Units an external refund flow may take back without exceeding
    /// units ever stocked.
    pub fn refundable_units(&self) -> i64 {
        refundable(self.on_hand, self.lifetime_max)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Account this entry belongs to. `None` for legacy unowned records.
    pub owner_id: Option<String>,

    /// Display name.
    pub name: String,

    /// Short code (5-digit numeric when allocated by the system).
    pub code: Option<String>,

    /// Supplier catalog number.
    pub catalog_number: Option<String>,

    /// Scan code.
    pub barcode: Option<String>,

    /// Selling price in cents.
    pub price_cents: i64,

    /// Base/cost price in cents.
    pub base_price_cents: i64,

    /// Markup in basis points (2500 = 25%).
    pub markup_bps: u32,

    /// ISO currency code.
    pub currency: String,

    /// Current on-hand quantity.
    pub on_hand: i64,

    /// Highest quantity ever stocked. `None` on legacy records; initialised
    /// lazily by the first stock adjustment.
    pub lifetime_max: Option<i64>,

    /// Category the entry is filed under.
    pub category_id: Option<String>,

    /// Image references (URLs or storage keys).
    pub images: Vec<String>,

    /// Whether the entry is shown on the sales screen.
    pub visible: bool,

    /// Embedded variants.
    pub variants: Vec<Variant>,

    /// Monotonic write counter, used as the optimistic-concurrency precondition.
    pub version: i64,

    /// When the entry was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// When the entry was last modified.
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the selling price.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the base/cost price.
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_cents(self.base_price_cents)
    }

    /// Returns the markup.
    #[inline]
    pub fn markup(&self) -> Markup {
        Markup::from_bps(self.markup_bps)
    }

    /// Units an external refund flow may take back without exceeding
    /// units ever stocked.
    pub fn refundable_units(&self) -> i64 {
        refundable(self.on_hand, self.lifetime_max)
    }

    /// Finds a variant by its stable id.
    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// Builds a stored product from a draft. Timestamps and version are
    /// overwritten by the store on insert.
    pub fn from_draft(
        id: String,
        owner_id: Option<String>,
        draft: ProductDraft,
        variants: Vec<Variant>,
        now: DateTime<Utc>,
    ) -> Product {
        Product {
            id,
            owner_id,
            name: draft.name,
            code: draft.code,
            catalog_number: draft.catalog_number,
            barcode: draft.barcode,
            price_cents: draft.price.cents(),
            base_price_cents: draft.base_price.cents(),
            markup_bps: draft.markup.bps(),
            currency: draft.currency,
            on_hand: draft.on_hand,
            lifetime_max: Some(draft.on_hand),
            category_id: draft.category_id,
            images: draft.images,
            visible: draft.visible,
            variants,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

fn refundable(on_hand: i64, lifetime_max: Option<i64>) -> i64 {
    lifetime_max.unwrap_or(on_hand).saturating_sub(on_hand).max(0)
}

// =============================================================================
// Product Draft
// =============================================================================

/// The attributes of an entry or variant before it is stored.
///
/// Produced by the import planner and by explicit creates.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub code: Option<String>,
    pub catalog_number: Option<String>,
    pub barcode: Option<String>,
    pub base_price: Money,
    pub price: Money,
    pub markup: Markup,
    pub currency: String,
    pub on_hand: i64,
    pub category_id: Option<String>,
    pub images: Vec<String>,
    pub visible: bool,
}

impl ProductDraft {
    /// Turns the draft into an embedded variant. A fresh variant starts with
    /// its lifetime maximum equal to its on-hand quantity.
    pub fn into_variant(self, id: String) -> Variant {
        Variant {
            id,
            name: self.name,
            code: self.code,
            catalog_number: self.catalog_number,
            barcode: self.barcode,
            price_cents: self.price.cents(),
            base_price_cents: self.base_price.cents(),
            markup_bps: self.markup.bps(),
            currency: self.currency,
            on_hand: self.on_hand,
            lifetime_max: Some(self.on_hand),
        }
    }
}

// =============================================================================
// Tombstone
// =============================================================================

/// Deletion marker for a catalog entry.
///
/// Created once, never updated, purged after the retention window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Tombstone {
    pub product_id: String,
    pub owner_id: Option<String>,
    #[ts(as = "String")]
    pub deleted_at: DateTime<Utc>,
}

// =============================================================================
// Category
// =============================================================================

/// A category an import row's label can resolve to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub owner_id: Option<String>,
    pub name: String,
}

// =============================================================================
// History
// =============================================================================

/// What happened to an entry, as recorded in its edit journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    /// Entry created (explicitly or by import).
    Created,
    /// Variant appended to an existing entry by import.
    VariantAdded,
    /// Manual edit of entry attributes.
    Updated,
    /// Manual stock adjustment (sales and refunds are not journaled).
    StockAdjusted,
    /// Entry deleted.
    Deleted,
    /// Variant spliced out of its parent.
    VariantRemoved,
}

impl HistoryAction {
    /// Stable storage/wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Created => "created",
            HistoryAction::VariantAdded => "variant_added",
            HistoryAction::Updated => "updated",
            HistoryAction::StockAdjusted => "stock_adjusted",
            HistoryAction::Deleted => "deleted",
            HistoryAction::VariantRemoved => "variant_removed",
        }
    }
}

/// One human-readable edit journal item.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HistoryItem {
    pub id: String,
    pub owner_id: Option<String>,
    pub product_id: String,
    pub product_name: String,
    pub action: HistoryAction,
    #[ts(type = "unknown")]
    pub details: serde_json::Value,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
