//! # Stock Ledger Rules
//!
//! On-hand quantity and lifetime-maximum arithmetic for entries and variants.
//!
//! ## The Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lifetime_max >= on_hand            after every mutation               │
//! │  lifetime_max never decreases                                           │
//! │                                                                         │
//! │  on_hand: 10  max: 10                                                   │
//! │     │ adjust(-3)   sale                                                 │
//! │     ▼                                                                   │
//! │  on_hand:  7  max: 10     decrease leaves max untouched                 │
//! │     │ adjust(+3)   restock                                              │
//! │     ▼                                                                   │
//! │  on_hand: 10  max: 13     increase by d raises max by d                 │
//! │     │ adjust(-1000000)                                                  │
//! │     ▼                                                                   │
//! │  on_hand:  0  max: 13     clamped at zero, never rejected               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `lifetime_max` bounds the external refund flow: a refund may not bring back
//! more units than were ever stocked.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{Product, Variant};

// =============================================================================
// Stock Levels
// =============================================================================

/// On-hand and lifetime maximum of one entry or variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevels {
    pub on_hand: i64,
    /// `None` on legacy records that predate lifetime tracking.
    pub lifetime_max: Option<i64>,
}

impl StockLevels {
    pub const fn new(on_hand: i64, lifetime_max: Option<i64>) -> Self {
        StockLevels {
            on_hand,
            lifetime_max,
        }
    }
}

/// Result of applying a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockAdjustment {
    pub previous_on_hand: i64,
    pub on_hand: i64,
    pub lifetime_max: i64,
}

impl StockAdjustment {
    pub fn levels(&self) -> StockLevels {
        StockLevels::new(self.on_hand, Some(self.lifetime_max))
    }

    /// Delta actually applied after clamping.
    pub fn applied_delta(&self) -> i64 {
        self.on_hand - self.previous_on_hand
    }
}

// =============================================================================
// Ledger Operations
// =============================================================================

/// Applies `delta` to the levels.
///
/// ## Rules
/// 1. An unset lifetime maximum is initialised to the current on-hand first
///    (and a stored maximum below on-hand is raised to it)
/// 2. New on-hand is `max(0, current + delta)`
/// 3. If on-hand grew, the lifetime maximum grows by the same amount
///
/// ## Example
/// ```rust
/// use stockroom_core::stock::{adjust, StockLevels};
///
/// let result = adjust(StockLevels::new(5, None), -1_000_000);
/// assert_eq!(result.on_hand, 0);
/// assert_eq!(result.lifetime_max, 5);
/// ```
pub fn adjust(levels: StockLevels, delta: i64) -> StockAdjustment {
    let current = levels.on_hand;
    let baseline_max = levels.lifetime_max.unwrap_or(current).max(current);
    let on_hand = current.saturating_add(delta).max(0);

    let lifetime_max = if on_hand > current {
        baseline_max.saturating_add(on_hand - current)
    } else {
        baseline_max
    };

    StockAdjustment {
        previous_on_hand: current,
        on_hand,
        lifetime_max,
    }
}

/// Sets on-hand to an absolute quantity through the same rules as [`adjust`].
///
/// Used by manual edits that send a target quantity instead of a delta.
pub fn set_absolute(levels: StockLevels, target: i64) -> StockAdjustment {
    let target = target.max(0);
    adjust(levels, target.saturating_sub(levels.on_hand))
}

// =============================================================================
// Stock Reason
// =============================================================================

/// Why a stock adjustment happened.
///
/// Point-of-sale deductions and refunds are high-volume and already recorded
/// by the sale/refund bookkeeping, so only manual adjustments are journaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    Sale,
    Refund,
    Manual,
}

impl StockReason {
    /// Reads the optional `reason` field of a stock request.
    ///
    /// Unknown or absent reasons count as manual.
    pub fn parse(reason: Option<&str>) -> StockReason {
        match reason.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            Some("sale") | Some("pos_sale") => StockReason::Sale,
            Some("refund") | Some("return") => StockReason::Refund,
            _ => StockReason::Manual,
        }
    }

    /// Whether this adjustment goes into the human-readable edit journal.
    pub fn is_journaled(&self) -> bool {
        matches!(self, StockReason::Manual)
    }
}

// =============================================================================
// Stocked Records
// =============================================================================

/// Anything carrying on-hand and lifetime-maximum quantities.
pub trait Stocked {
    fn stock_levels(&self) -> StockLevels;
    fn store_levels(&mut self, adjustment: &StockAdjustment);
}

impl Stocked for Product {
    fn stock_levels(&self) -> StockLevels {
        StockLevels::new(self.on_hand, self.lifetime_max)
    }

    fn store_levels(&mut self, adjustment: &StockAdjustment) {
        self.on_hand = adjustment.on_hand;
        self.lifetime_max = Some(adjustment.lifetime_max);
    }
}

impl Stocked for Variant {
    fn stock_levels(&self) -> StockLevels {
        StockLevels::new(self.on_hand, self.lifetime_max)
    }

    fn store_levels(&mut self, adjustment: &StockAdjustment) {
        self.on_hand = adjustment.on_hand;
        self.lifetime_max = Some(adjustment.lifetime_max);
    }
}

/// Applies a delta to a product or one of its variants (by list position).
///
/// Mutates the in-memory record only; the caller stores it under a version
/// precondition.
pub fn adjust_product(
    product: &mut Product,
    variant_index: Option<usize>,
    delta: i64,
) -> CoreResult<StockAdjustment> {
    let product_id = product.id.clone();
    let target: &mut dyn Stocked = match variant_index {
        None => product as &mut dyn Stocked,
        Some(index) => {
            let variant = product.variants.get_mut(index).ok_or_else(|| {
                CoreError::VariantNotFound {
                    product_id,
                    variant: index.to_string(),
                }
            })?;
            variant as &mut dyn Stocked
        }
    };

    let adjustment = adjust(target.stock_levels(), delta);
    target.store_levels(&adjustment);
    Ok(adjustment)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::{Markup, Money};
    use crate::types::ProductDraft;
    use chrono::Utc;

    fn product(on_hand: i64, lifetime_max: Option<i64>) -> Product {
        let draft = ProductDraft {
            name: "Brake Pad Front".to_string(),
            code: None,
            catalog_number: None,
            barcode: None,
            base_price: Money::from_cents(1000),
            price: Money::from_cents(1000),
            markup: Markup::zero(),
            currency: "EUR".to_string(),
            on_hand,
            category_id: None,
            images: vec![],
            visible: true,
        };
        let variant = draft.clone().into_variant("v1".to_string());
        let mut p = Product::from_draft("p1".to_string(), None, draft, vec![variant], Utc::now());
        p.lifetime_max = lifetime_max;
        p
    }

    #[test]
    fn test_sale_then_restock() {
        let sale = adjust(StockLevels::new(10, Some(10)), -3);
        assert_eq!((sale.on_hand, sale.lifetime_max), (7, 10));

        let restock = adjust(sale.levels(), 3);
        assert_eq!((restock.on_hand, restock.lifetime_max), (10, 13));
    }

    #[test]
    fn test_negative_result_clamped_to_zero() {
        let result = adjust(StockLevels::new(5, Some(5)), -1_000_000);
        assert_eq!(result.on_hand, 0);
        assert_eq!(result.lifetime_max, 5);
        assert_eq!(result.applied_delta(), -5);
    }

    #[test]
    fn test_legacy_lifetime_max_initialised_lazily() {
        let result = adjust(StockLevels::new(8, None), 2);
        assert_eq!(result.on_hand, 10);
        assert_eq!(result.lifetime_max, 10);

        let result = adjust(StockLevels::new(8, None), -2);
        assert_eq!(result.lifetime_max, 8);
    }

    #[test]
    fn test_stale_lifetime_max_below_on_hand_is_raised() {
        let result = adjust(StockLevels::new(12, Some(4)), 0);
        assert_eq!(result.lifetime_max, 12);
    }

    #[test]
    fn test_set_absolute() {
        let result = set_absolute(StockLevels::new(4, Some(10)), 9);
        assert_eq!((result.on_hand, result.lifetime_max), (9, 15));

        let result = set_absolute(StockLevels::new(4, Some(10)), -2);
        assert_eq!((result.on_hand, result.lifetime_max), (0, 10));
    }

    #[test]
    fn test_invariant_holds_over_any_sequence() {
        // Deterministic pseudo-random deltas in [-50, 50].
        let mut seed: u64 = 0x5eed;
        let mut levels = StockLevels::new(3, None);
        let mut previous_max = 3;

        for _ in 0..10_000 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let delta = ((seed >> 33) % 101) as i64 - 50;

            let result = adjust(levels, delta);
            assert!(result.on_hand >= 0);
            assert!(result.lifetime_max >= result.on_hand);
            assert!(result.lifetime_max >= previous_max);

            previous_max = result.lifetime_max;
            levels = result.levels();
        }
    }

    #[test]
    fn test_reason_parsing() {
        assert_eq!(StockReason::parse(Some("sale")), StockReason::Sale);
        assert_eq!(StockReason::parse(Some("POS_SALE")), StockReason::Sale);
        assert_eq!(StockReason::parse(Some("refund")), StockReason::Refund);
        assert_eq!(StockReason::parse(Some("return")), StockReason::Refund);
        assert_eq!(StockReason::parse(Some("recount")), StockReason::Manual);
        assert_eq!(StockReason::parse(None), StockReason::Manual);

        assert!(!StockReason::Sale.is_journaled());
        assert!(!StockReason::Refund.is_journaled());
        assert!(StockReason::Manual.is_journaled());
    }

    #[test]
    fn test_adjust_product_targets_variant() {
        let mut p = product(10, Some(10));
        let result = adjust_product(&mut p, Some(0), 5).unwrap();
        assert_eq!(result.on_hand, 15);
        assert_eq!(p.variants[0].on_hand, 15);
        assert_eq!(p.variants[0].lifetime_max, Some(15));
        assert_eq!(p.on_hand, 10);
    }

    #[test]
    fn test_adjust_product_unknown_variant() {
        let mut p = product(10, Some(10));
        let err = adjust_product(&mut p, Some(4), 1).unwrap_err();
        assert!(matches!(err, CoreError::VariantNotFound { .. }));
    }
}
