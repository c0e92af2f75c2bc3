//! Service layer.
//!
//! Each service orchestrates one flow: validate input, run the pure core
//! rule, persist through a repository, journal, and notify the owner's
//! connections. Handlers in [`crate::routes`] stay thin.

pub mod catalog_service;
pub mod delta_service;
pub mod import_service;
pub mod stock_service;

use tracing::{debug, warn};

use stockroom_core::validation::{validate_owner_id, validate_uuid};
use stockroom_core::Product;
use stockroom_db::{DbResult, NewHistoryItem};
use stockroom_sync::ChangeNotification;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub use catalog_service::CatalogService;
pub use delta_service::DeltaService;
pub use import_service::ImportService;
pub use stock_service::StockService;

/// Default number of history items returned.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

// =============================================================================
// Shared Helpers
// =============================================================================

/// Read-path fallback: a store outage yields an empty result instead of an
/// error so clients stay usable.
pub(crate) fn degrade<T: Default>(result: DbResult<T>, what: &str) -> ApiResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_unavailable() => {
            warn!(error = %e, what, "Store unavailable, returning empty result");
            Ok(T::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Trims and validates an optional owner id. Blank counts as absent.
pub(crate) fn owner_param(user_id: Option<&str>) -> ApiResult<Option<String>> {
    match user_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => {
            validate_owner_id(id)?;
            Ok(Some(id.to_string()))
        }
        None => Ok(None),
    }
}

/// Validates an entry id from the path.
pub(crate) fn product_id_param(id: &str) -> ApiResult<()> {
    validate_uuid("id", id)?;
    Ok(())
}

/// Another owner's entry is reported as missing. Unowned entries are open
/// to everyone.
pub(crate) fn ensure_owner(product: &Product, user_id: Option<&str>) -> ApiResult<()> {
    match (user_id, product.owner_id.as_deref()) {
        (Some(caller), Some(owner)) if caller != owner => {
            Err(ApiError::not_found("Product", &product.id))
        }
        _ => Ok(()),
    }
}

/// Appends to the edit journal. The write it describes has already been
/// stored, so a journal failure is logged and swallowed.
pub(crate) async fn journal(state: &AppState, item: NewHistoryItem<'_>) {
    let product_id = item.product_id.to_string();
    if let Err(e) = state.db.history().record(item).await {
        warn!(product_id = %product_id, error = %e, "Failed to journal change");
    }
}

/// Fans a notification out to the owner's connections.
pub(crate) async fn notify(state: &AppState, owner_id: Option<&str>, notification: ChangeNotification) {
    let delivered = state.hub.broadcast_to_owner(owner_id, &notification).await;
    debug!(
        product_id = %notification.product_id,
        kind = ?notification.kind,
        delivered,
        "Change broadcast"
    );
}

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Arc;

    use stockroom_core::delta::DeltaSet;
    use stockroom_core::{Markup, Money, Product, ProductDraft};
    use stockroom_db::{Database, DbConfig};
    use stockroom_sync::{ChangeHub, HubSettings, Outbound};
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use crate::config::ServerConfig;
    use crate::AppState;

    pub async fn state() -> Arc<AppState> {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let hub = Arc::new(ChangeHub::new(&HubSettings::default()));
        Arc::new(AppState::new(db, hub, ServerConfig::default()))
    }

    /// Registers a connection tagged with `owner`.
    pub async fn listener(state: &AppState, owner: &str) -> mpsc::Receiver<Outbound> {
        let (id, rx) = state.hub.register().await.unwrap();
        state.hub.authenticate(&id, owner).await.unwrap();
        rx
    }

    /// Stores an entry directly, bypassing the services.
    pub async fn seed(state: &AppState, owner: Option<&str>, name: &str, code: &str, stock: i64) -> Product {
        let draft = ProductDraft {
            name: name.to_string(),
            code: Some(code.to_string()),
            catalog_number: None,
            barcode: None,
            base_price: Money::from_cents(1000),
            price: Money::from_cents(1250),
            markup: Markup::from_bps(2500),
            currency: "EUR".to_string(),
            on_hand: stock,
            category_id: None,
            images: vec![],
            visible: true,
        };
        let product = Product::from_draft(
            Uuid::new_v4().to_string(),
            owner.map(str::to_string),
            draft,
            vec![],
            state.db.clock().now(),
        );
        state.db.products().insert(&product).await.unwrap()
    }

    /// A client-side copy of the catalog kept current by delta sync.
    ///
    /// The cursor only advances after a whole response has been applied.
    #[derive(Debug, Default)]
    pub struct Replica {
        entries: HashMap<String, Product>,
        cursor: i64,
    }

    impl Replica {
        pub fn new() -> Self {
            Replica::default()
        }

        pub fn cursor(&self) -> i64 {
            self.cursor
        }

        pub fn len(&self) -> usize {
            self.entries.len()
        }

        /// Upserts first, then deletions, then adopts `server_time`.
        pub fn apply(&mut self, delta: DeltaSet) {
            for product in delta.new_entries.into_iter().chain(delta.updated_entries) {
                self.entries.insert(product.id.clone(), product);
            }
            for id in &delta.deleted_ids {
                self.entries.remove(id);
            }
            self.cursor = delta.server_time;
        }

        /// Entries sorted by id.
        pub fn snapshot(&self) -> Vec<Product> {
            let mut entries: Vec<Product> = self.entries.values().cloned().collect();
            entries.sort_by(|a, b| a.id.cmp(&b.id));
            entries
        }
    }

    /// Notifications received so far, parsed.
    pub fn received(rx: &mut mpsc::Receiver<Outbound>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let Outbound::Notify(json) = frame {
                out.push(serde_json::from_str(&json).unwrap());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_db::DbError;

    #[test]
    fn test_degrade_only_swallows_unavailability() {
        let empty: Vec<u8> = degrade(Err(DbError::PoolExhausted), "list").unwrap();
        assert!(empty.is_empty());

        let err = degrade::<Vec<u8>>(Err(DbError::QueryFailed("bad".into())), "list");
        assert!(err.is_err());
    }

    #[test]
    fn test_owner_param() {
        assert_eq!(owner_param(None).unwrap(), None);
        assert_eq!(owner_param(Some("  ")).unwrap(), None);
        assert_eq!(owner_param(Some(" a1 ")).unwrap().as_deref(), Some("a1"));
        assert!(owner_param(Some("a b")).is_err());
    }

    #[test]
    fn test_product_id_param() {
        assert!(product_id_param("not-a-uuid").is_err());
        assert!(product_id_param(&uuid::Uuid::new_v4().to_string()).is_ok());
    }
}
