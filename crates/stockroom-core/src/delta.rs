//! # Delta Sync Rules
//!
//! Cursor handling, owner scoping and change classification for delta sync.
//!
//! ## Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Client                                   Server                        │
//! │    │  GET /products/delta?since=C                                       │
//! │    │ ─────────────────────────────────────▶│                            │
//! │    │                                       │ T = clock.now()            │
//! │    │                                       │ new     = created  > C     │
//! │    │                                       │ updated = modified > C     │
//! │    │                                       │           created <= C     │
//! │    │                                       │ deleted = tombstone > C    │
//! │    │  { new, updated, deleted, serverTime=T }                           │
//! │    │ ◀─────────────────────────────────────│                            │
//! │    │ apply all, THEN cursor := T                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `serverTime` is read before the catalog is queried, so a write stamped
//! after `serverTime` is returned again on the next call even if this query
//! already saw it. A write stamped before `serverTime` that commits only
//! after the query is not seen by this call nor by the next one; it reaches
//! the client the next time the entry changes, or on a full resync.

use serde::{Deserialize, Serialize};

use crate::types::Product;

// =============================================================================
// Cursor
// =============================================================================

/// Reads a client cursor.
///
/// Anything that is not a sane past timestamp (unparseable, negative, or
/// ahead of the server clock) is clamped to 0, which returns the full catalog.
///
/// ## Example
/// ```rust
/// use stockroom_core::delta::clamp_cursor;
///
/// assert_eq!(clamp_cursor(Some("1500"), 2000), 1500);
/// assert_eq!(clamp_cursor(Some("-1"), 2000), 0);
/// assert_eq!(clamp_cursor(Some("9999"), 2000), 0);
/// assert_eq!(clamp_cursor(Some("yesterday"), 2000), 0);
/// assert_eq!(clamp_cursor(None, 2000), 0);
/// ```
pub fn clamp_cursor(raw: Option<&str>, now_ms: i64) -> i64 {
    match raw.map(str::trim).and_then(|s| s.parse::<i64>().ok()) {
        Some(since) if (0..=now_ms).contains(&since) => since,
        _ => 0,
    }
}

// =============================================================================
// Owner Scope
// =============================================================================

/// Which records a delta (or list) call may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerScope {
    /// No owner given: the whole catalog. Tenant isolation is the caller's job.
    All,
    /// One owner's records, plus unowned legacy records for the super-account.
    Owner {
        owner_id: String,
        include_unowned: bool,
    },
}

impl OwnerScope {
    /// Builds the scope from the request's `userId` / `userPhone`.
    ///
    /// `super_account_phone` is the one account that also sees unowned records.
    pub fn resolve(
        owner_id: Option<&str>,
        user_phone: Option<&str>,
        super_account_phone: Option<&str>,
    ) -> OwnerScope {
        match owner_id.map(str::trim).filter(|id| !id.is_empty()) {
            None => OwnerScope::All,
            Some(owner_id) => {
                let include_unowned = matches!(
                    (user_phone, super_account_phone),
                    (Some(phone), Some(super_phone)) if phone.trim() == super_phone
                );
                OwnerScope::Owner {
                    owner_id: owner_id.to_string(),
                    include_unowned,
                }
            }
        }
    }

    /// Whether a record with this owner is visible in the scope.
    pub fn admits(&self, record_owner: Option<&str>) -> bool {
        match self {
            OwnerScope::All => true,
            OwnerScope::Owner {
                owner_id,
                include_unowned,
            } => match record_owner {
                Some(owner) => owner == owner_id,
                None => *include_unowned,
            },
        }
    }
}

// =============================================================================
// Delta Set
// =============================================================================

/// One delta sync response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaSet {
    pub new_entries: Vec<Product>,
    pub updated_entries: Vec<Product>,
    pub deleted_ids: Vec<String>,
    pub server_time: i64,
}

/// Splits entries modified after `since` into new and updated.
///
/// An entry created after the cursor is new even if it was edited again
/// since; everything else that changed is updated.
pub fn partition(changed: Vec<Product>, since: i64) -> (Vec<Product>, Vec<Product>) {
    changed
        .into_iter()
        .filter(|p| p.updated_at.timestamp_millis() > since || p.created_at.timestamp_millis() > since)
        .partition(|p| p.created_at.timestamp_millis() > since)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::{Markup, Money};
    use crate::types::ProductDraft;
    use chrono::{TimeZone, Utc};

    fn product_at(id: &str, created_ms: i64, updated_ms: i64) -> Product {
        let draft = ProductDraft {
            name: format!("Item {id}"),
            code: None,
            catalog_number: None,
            barcode: None,
            base_price: Money::from_cents(100),
            price: Money::from_cents(100),
            markup: Markup::zero(),
            currency: "EUR".to_string(),
            on_hand: 1,
            category_id: None,
            images: vec![],
            visible: true,
        };
        let created = Utc.timestamp_millis_opt(created_ms).unwrap();
        let mut p = Product::from_draft(id.to_string(), None, draft, vec![], created);
        p.updated_at = Utc.timestamp_millis_opt(updated_ms).unwrap();
        p
    }

    #[test]
    fn test_clamp_cursor() {
        assert_eq!(clamp_cursor(Some("0"), 10), 0);
        assert_eq!(clamp_cursor(Some(" 10 "), 10), 10);
        assert_eq!(clamp_cursor(Some("11"), 10), 0);
        assert_eq!(clamp_cursor(Some("1.5"), 10), 0);
    }

    #[test]
    fn test_owner_scope_resolution() {
        assert_eq!(OwnerScope::resolve(None, None, Some("+100")), OwnerScope::All);
        assert_eq!(OwnerScope::resolve(Some(""), None, None), OwnerScope::All);

        let plain = OwnerScope::resolve(Some("a"), Some("+200"), Some("+100"));
        assert!(plain.admits(Some("a")));
        assert!(!plain.admits(Some("b")));
        assert!(!plain.admits(None));

        let super_account = OwnerScope::resolve(Some("a"), Some("+100"), Some("+100"));
        assert!(super_account.admits(None));
        assert!(!super_account.admits(Some("b")));
    }

    #[test]
    fn test_partition_new_vs_updated() {
        let since = 1_000;
        let changed = vec![
            product_at("old-untouched", 500, 500),
            product_at("old-edited", 500, 1_500),
            product_at("brand-new", 1_200, 1_200),
            product_at("new-then-edited", 1_100, 1_900),
        ];

        let (new, updated) = partition(changed, since);
        let new_ids: Vec<_> = new.iter().map(|p| p.id.as_str()).collect();
        let updated_ids: Vec<_> = updated.iter().map(|p| p.id.as_str()).collect();

        assert_eq!(new_ids, vec!["brand-new", "new-then-edited"]);
        assert_eq!(updated_ids, vec!["old-edited"]);
    }
}
