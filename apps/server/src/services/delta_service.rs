//! Delta sync.
//!
//! ```text
//!   now = clock.now_ms()            (taken before any read)
//!   since = clamp(since, now)       (junk/negative/future → 0)
//!
//!   changed_since(scope, since) ──► partition ──► new / updated
//!   deleted_since(scope, since) ──────────────► deleted ids
//!
//!   serverTime = now
//! ```
//!
//! Every write is stamped by the same monotonic clock after `now` was read,
//! so a client that adopts `serverTime` misses nothing committed before it.

use std::sync::Arc;

use tracing::{debug, warn};

use stockroom_core::delta::{clamp_cursor, partition, DeltaSet, OwnerScope};
use stockroom_core::{Product, Tombstone};
use stockroom_db::DbResult;

use super::owner_param;
use crate::dto::DeltaQuery;
use crate::error::ApiResult;
use crate::AppState;

/// Delta sync service.
pub struct DeltaService {
    state: Arc<AppState>,
}

impl DeltaService {
    pub fn new(state: Arc<AppState>) -> Self {
        DeltaService { state }
    }

    /// Everything that changed in the caller's scope after `since`.
    ///
    /// A store outage yields an empty set whose `server_time` is the clamped
    /// cursor, so the client retries from the same point.
    pub async fn delta(&self, query: &DeltaQuery) -> ApiResult<DeltaSet> {
        let owner = owner_param(query.user_id.as_deref())?;

        let server_time = self.state.db.clock().now_ms();
        let since = clamp_cursor(query.since.as_deref(), server_time);
        let scope = OwnerScope::resolve(
            owner.as_deref(),
            query.user_phone.as_deref(),
            self.state.config.super_account_phone.as_deref(),
        );

        match self.fetch(&scope, since).await {
            Ok((changed, tombstones)) => {
                let (new_entries, updated_entries) = partition(changed, since);
                let deleted_ids = tombstones.into_iter().map(|t| t.product_id).collect::<Vec<_>>();

                debug!(
                    since,
                    server_time,
                    new = new_entries.len(),
                    updated = updated_entries.len(),
                    deleted = deleted_ids.len(),
                    "Delta computed"
                );

                Ok(DeltaSet {
                    new_entries,
                    updated_entries,
                    deleted_ids,
                    server_time,
                })
            }
            Err(e) if e.is_unavailable() => {
                warn!(error = %e, since, "Store unavailable, returning empty delta");
                Ok(DeltaSet {
                    server_time: since,
                    ..DeltaSet::default()
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch(&self, scope: &OwnerScope, since: i64) -> DbResult<(Vec<Product>, Vec<Tombstone>)> {
        let changed = self.state.db.products().changed_since(scope, since).await?;
        let tombstones = self.state.db.tombstones().deleted_since(scope, since).await?;
        Ok((changed, tombstones))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{CreateProductRequest, StockRequest};
    use crate::error::ErrorCode;
    use crate::services::testing::{seed, state, Replica};
    use crate::services::{CatalogService, StockService};
    use serde_json::json;

    fn query(since: Option<i64>, owner: Option<&str>) -> DeltaQuery {
        DeltaQuery {
            since: since.map(|s| s.to_string()),
            user_id: owner.map(str::to_string),
            user_phone: None,
        }
    }

    fn ids(products: &[Product]) -> Vec<String> {
        let mut ids: Vec<String> = products.iter().map(|p| p.id.clone()).collect();
        ids.sort();
        ids
    }

    async fn pull(service: &DeltaService, replica: &mut Replica) {
        let set = service
            .delta(&query(Some(replica.cursor()), Some("a")))
            .await
            .unwrap();
        replica.apply(set);
    }

    #[tokio::test]
    async fn test_full_sync_from_zero() {
        let state = state().await;
        let a = seed(&state, Some("a"), "Brake Pad Front", "10001", 10).await;
        seed(&state, Some("b"), "Oil Filter", "10002", 3).await;

        let delta = DeltaService::new(state).delta(&query(Some(0), Some("a"))).await.unwrap();
        assert_eq!(ids(&delta.new_entries), vec![a.id]);
        assert!(delta.updated_entries.is_empty());
        assert!(delta.deleted_ids.is_empty());
        assert!(delta.server_time > 0);
    }

    #[tokio::test]
    async fn test_same_cursor_twice_is_idempotent() {
        let state = state().await;
        let service = DeltaService::new(state.clone());
        let before = state.db.clock().now_ms();
        seed(&state, Some("a"), "Brake Pad Front", "10001", 10).await;

        let first = service.delta(&query(Some(before), Some("a"))).await.unwrap();
        let second = service.delta(&query(Some(before), Some("a"))).await.unwrap();

        assert_eq!(first.new_entries, second.new_entries);
        assert_eq!(first.updated_entries, second.updated_entries);
        assert_eq!(first.deleted_ids, second.deleted_ids);
        assert!(second.server_time > first.server_time);
    }

    #[tokio::test]
    async fn test_update_after_cursor_is_reported_as_updated() {
        let state = state().await;
        let service = DeltaService::new(state.clone());
        let product = seed(&state, Some("a"), "Brake Pad Front", "10001", 10).await;
        let cursor = service.delta(&query(Some(0), Some("a"))).await.unwrap().server_time;

        StockService::new(state.clone())
            .adjust(
                &product.id,
                &StockRequest {
                    change: Some(json!(-1)),
                    reason: Some("sale".into()),
                    ..StockRequest::default()
                },
            )
            .await
            .unwrap();

        let delta = service.delta(&query(Some(cursor), Some("a"))).await.unwrap();
        assert!(delta.new_entries.is_empty());
        assert_eq!(ids(&delta.updated_entries), vec![product.id]);
        assert_eq!(delta.updated_entries[0].on_hand, 9);
    }

    #[tokio::test]
    async fn test_deleted_entry_only_in_deleted_ids() {
        let state = state().await;
        let service = DeltaService::new(state.clone());
        let before = state.db.clock().now_ms();
        let product = seed(&state, Some("a"), "Brake Pad Front", "10001", 10).await;

        CatalogService::new(state.clone())
            .delete(&product.id, Some("a"))
            .await
            .unwrap();

        let delta = service.delta(&query(Some(before), Some("a"))).await.unwrap();
        assert_eq!(delta.deleted_ids, vec![product.id.clone()]);
        assert!(delta.new_entries.iter().all(|p| p.id != product.id));
        assert!(delta.updated_entries.iter().all(|p| p.id != product.id));

        let other_owner = service.delta(&query(Some(before), Some("b"))).await.unwrap();
        assert!(other_owner.deleted_ids.is_empty());
    }

    #[tokio::test]
    async fn test_junk_and_future_cursors_mean_full_sync() {
        let state = state().await;
        let service = DeltaService::new(state.clone());
        seed(&state, Some("a"), "Brake Pad Front", "10001", 10).await;

        for since in ["yesterday", "-5", "99999999999999"] {
            let q = DeltaQuery {
                since: Some(since.to_string()),
                user_id: Some("a".into()),
                user_phone: None,
            };
            let delta = service.delta(&q).await.unwrap();
            assert_eq!(delta.new_entries.len(), 1, "since = {since}");
        }
    }

    #[tokio::test]
    async fn test_super_account_sees_unowned_records() {
        let state = state().await;
        let mut config = state.config.clone();
        config.super_account_phone = Some("+100".into());
        let state = Arc::new(AppState::new(state.db.clone(), state.hub.clone(), config));

        seed(&state, Some("a"), "Brake Pad Front", "10001", 10).await;
        seed(&state, None, "Legacy Clamp", "10002", 1).await;

        let service = DeltaService::new(state);
        let plain = service.delta(&query(Some(0), Some("a"))).await.unwrap();
        assert_eq!(plain.new_entries.len(), 1);

        let mut q = query(Some(0), Some("a"));
        q.user_phone = Some("+100".into());
        assert_eq!(service.delta(&q).await.unwrap().new_entries.len(), 2);

        let everyone = service.delta(&query(Some(0), None)).await.unwrap();
        assert_eq!(everyone.new_entries.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_owner_rejected_before_store() {
        let state = state().await;
        let err = DeltaService::new(state)
            .delta(&query(Some(0), Some("a b")))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_store_outage_degrades_to_empty() {
        let state = state().await;
        seed(&state, Some("a"), "Brake Pad Front", "10001", 10).await;
        state.db.close().await;

        let delta = DeltaService::new(state)
            .delta(&query(Some(1234), Some("a")))
            .await
            .unwrap();
        assert!(delta.new_entries.is_empty());
        assert!(delta.updated_entries.is_empty());
        assert!(delta.deleted_ids.is_empty());
        assert_eq!(delta.server_time, 1234);
    }

    #[tokio::test]
    async fn test_replica_converges_with_catalog() {
        let state = state().await;
        let delta = DeltaService::new(state.clone());
        let catalog = CatalogService::new(state.clone());
        let stock = StockService::new(state.clone());
        let mut replica = Replica::new();

        let mut created = Vec::new();
        for (name, code) in [("Brake Pad Front", "10001"), ("Oil Filter", "10002"), ("Spark Plug", "10003")] {
            let request = CreateProductRequest {
                user_id: Some("a".into()),
                name: name.into(),
                code: Some(code.into()),
                base_price: Some(json!(10)),
                stock: Some(json!(5)),
                ..CreateProductRequest::default()
            };
            created.push(catalog.create(request).await.unwrap());
            pull(&delta, &mut replica).await;
        }

        stock
            .adjust(
                &created[0].id,
                &StockRequest {
                    change: Some(json!(4)),
                    ..StockRequest::default()
                },
            )
            .await
            .unwrap();
        catalog.delete(&created[1].id, Some("a")).await.unwrap();
        pull(&delta, &mut replica).await;

        stock
            .adjust(
                &created[2].id,
                &StockRequest {
                    change: Some(json!(-2)),
                    reason: Some("sale".into()),
                    ..StockRequest::default()
                },
            )
            .await
            .unwrap();
        pull(&delta, &mut replica).await;

        let scope = OwnerScope::resolve(Some("a"), None, None);
        let mut server = state.db.products().list(&scope).await.unwrap();
        server.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(replica.snapshot(), server);
        assert_eq!(replica.len(), 2);
    }
}
