//! Stock adjustments.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PATCH /products/{id}/stock  { change, variantIndex?, userId?, reason? } │
//! │                                                                         │
//! │  validate id/owner                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  products().modify(id, ..)    read + version check + retry              │
//! │       │   └── adjust_product: max(0, on_hand + change),                 │
//! │       │       lifetime max grows with any increase                      │
//! │       ▼                                                                 │
//! │  reason manual? ──yes──► history (stock_adjusted)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  owner's connections ◄── stock-updated { stock }                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use stockroom_core::stock::{adjust_product, StockAdjustment, StockReason};
use stockroom_core::{HistoryAction, Product};
use stockroom_db::NewHistoryItem;
use stockroom_sync::{ChangeKind, ChangeNotification};

use super::{ensure_owner, journal, notify, owner_param, product_id_param};
use crate::dto::StockRequest;
use crate::error::ApiResult;
use crate::AppState;

/// Result of one stock adjustment.
#[derive(Debug, Clone)]
pub struct StockOutcome {
    /// The entry as stored after the adjustment.
    pub product: Product,
    pub variant_index: Option<usize>,
    pub adjustment: StockAdjustment,
}

impl StockOutcome {
    /// New on-hand of whatever was adjusted (entry or variant).
    pub fn stock(&self) -> i64 {
        self.adjustment.on_hand
    }
}

/// Stock ledger service.
pub struct StockService {
    state: Arc<AppState>,
}

impl StockService {
    pub fn new(state: Arc<AppState>) -> Self {
        StockService { state }
    }

    /// Applies `request.change` to the entry or to the variant at
    /// `request.variant_index`.
    ///
    /// Negative results clamp to zero. A lost race with another writer is
    /// retried against the fresh record.
    pub async fn adjust(&self, product_id: &str, request: &StockRequest) -> ApiResult<StockOutcome> {
        product_id_param(product_id)?;
        let owner = owner_param(request.user_id.as_deref())?;
        let reason = StockReason::parse(request.reason.as_deref());
        let change = request.change();

        let (product, adjustment) = self
            .state
            .db
            .products()
            .modify(product_id, |product| -> ApiResult<StockAdjustment> {
                ensure_owner(product, owner.as_deref())?;
                Ok(adjust_product(product, request.variant_index, change)?)
            })
            .await?;

        info!(
            product_id = %product.id,
            variant_index = ?request.variant_index,
            change,
            stock = adjustment.on_hand,
            lifetime_max = adjustment.lifetime_max,
            reason = ?reason,
            "Stock adjusted"
        );

        if reason.is_journaled() {
            journal(
                &self.state,
                NewHistoryItem {
                    owner_id: product.owner_id.as_deref(),
                    product_id: &product.id,
                    product_name: &product.name,
                    action: HistoryAction::StockAdjusted,
                    details: json!({
                        "change": change,
                        "applied": adjustment.applied_delta(),
                        "previousStock": adjustment.previous_on_hand,
                        "stock": adjustment.on_hand,
                        "initialStock": adjustment.lifetime_max,
                        "variantIndex": request.variant_index,
                    }),
                },
            )
            .await;
        }

        notify(
            &self.state,
            product.owner_id.as_deref(),
            ChangeNotification::for_product(ChangeKind::StockUpdated, &product)
                .with_stock(adjustment.on_hand),
        )
        .await;

        Ok(StockOutcome {
            product,
            variant_index: request.variant_index,
            adjustment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::testing::{listener, received, seed, state};
    use crate::services::DEFAULT_HISTORY_LIMIT;
    use stockroom_core::{Markup, Money, ProductDraft};

    fn change(change: i64, reason: Option<&str>) -> StockRequest {
        StockRequest {
            change: Some(json!(change)),
            reason: reason.map(str::to_string),
            ..StockRequest::default()
        }
    }

    async fn history_len(state: &AppState, id: &str) -> usize {
        state
            .db
            .history()
            .for_product(id, DEFAULT_HISTORY_LIMIT)
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn test_sale_then_manual_restock() {
        let state = state().await;
        let service = StockService::new(state.clone());
        let product = seed(&state, Some("a"), "Brake Pad Front", "10001", 10).await;
        assert_eq!(product.lifetime_max, Some(10));

        let sale = service.adjust(&product.id, &change(-3, Some("sale"))).await.unwrap();
        assert_eq!(sale.stock(), 7);
        assert_eq!(sale.product.lifetime_max, Some(10));
        assert_eq!(history_len(&state, &product.id).await, 0);

        let restock = service.adjust(&product.id, &change(3, None)).await.unwrap();
        assert_eq!(restock.stock(), 10);
        assert_eq!(restock.product.lifetime_max, Some(13));

        let history = state.db.history().for_product(&product.id, 50).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, HistoryAction::StockAdjusted);
        assert_eq!(history[0].details["stock"], 10);
        assert_eq!(history[0].details["initialStock"], 13);
    }

    #[tokio::test]
    async fn test_refund_is_not_journaled() {
        let state = state().await;
        let service = StockService::new(state.clone());
        let product = seed(&state, Some("a"), "Brake Pad Front", "10001", 10).await;

        service.adjust(&product.id, &change(-2, Some("sale"))).await.unwrap();
        let refund = service.adjust(&product.id, &change(1, Some("refund"))).await.unwrap();

        assert_eq!(refund.stock(), 9);
        assert_eq!(history_len(&state, &product.id).await, 0);
    }

    #[tokio::test]
    async fn test_huge_deduction_clamps_to_zero() {
        let state = state().await;
        let product = seed(&state, Some("a"), "Brake Pad Front", "10001", 5).await;

        let outcome = StockService::new(state)
            .adjust(&product.id, &change(-1_000_000, Some("sale")))
            .await
            .unwrap();

        assert_eq!(outcome.stock(), 0);
        assert_eq!(outcome.product.lifetime_max, Some(5));
        assert_eq!(outcome.adjustment.applied_delta(), -5);
    }

    #[tokio::test]
    async fn test_lifetime_max_never_below_on_hand_nor_shrinks() {
        let state = state().await;
        let service = StockService::new(state.clone());
        let product = seed(&state, Some("a"), "Brake Pad Front", "10001", 3).await;

        let mut last_max = 3;
        for delta in [5, -20, 7, -1, 0, 12, -4, -100, 2] {
            let outcome = service.adjust(&product.id, &change(delta, Some("sale"))).await.unwrap();
            let max = outcome.product.lifetime_max.unwrap();
            assert!(max >= outcome.product.on_hand);
            assert!(max >= last_max);
            last_max = max;
        }
    }

    #[tokio::test]
    async fn test_variant_adjustment_leaves_parent_alone() {
        let state = state().await;
        let draft = ProductDraft {
            name: "Brake Pad Rear".into(),
            code: Some("10002".into()),
            catalog_number: None,
            barcode: None,
            base_price: Money::from_cents(900),
            price: Money::from_cents(900),
            markup: Markup::zero(),
            currency: "EUR".into(),
            on_hand: 4,
            category_id: None,
            images: vec![],
            visible: true,
        };
        let mut product = Product::from_draft(
            uuid::Uuid::new_v4().to_string(),
            Some("a".into()),
            ProductDraft {
                name: "Brake Pad Front".into(),
                on_hand: 10,
                ..draft.clone()
            },
            vec![draft.into_variant("v1".into())],
            state.db.clock().now(),
        );
        product.variants[0].lifetime_max = None;
        let product = state.db.products().insert(&product).await.unwrap();

        let service = StockService::new(state.clone());
        let request = StockRequest {
            change: Some(json!(2)),
            variant_index: Some(0),
            ..StockRequest::default()
        };
        let outcome = service.adjust(&product.id, &request).await.unwrap();

        assert_eq!(outcome.stock(), 6);
        assert_eq!(outcome.product.on_hand, 10);
        assert_eq!(outcome.product.variants[0].on_hand, 6);
        assert_eq!(outcome.product.variants[0].lifetime_max, Some(6));

        let missing = StockRequest {
            change: Some(json!(1)),
            variant_index: Some(3),
            ..StockRequest::default()
        };
        let err = service.adjust(&product.id, &missing).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_owner_gets_stock_notification() {
        let state = state().await;
        let mut owner_rx = listener(&state, "a").await;
        let mut other_rx = listener(&state, "b").await;
        let product = seed(&state, Some("a"), "Brake Pad Front", "10001", 10).await;

        StockService::new(state.clone())
            .adjust(&product.id, &change(-3, Some("sale")))
            .await
            .unwrap();

        let frames = received(&mut owner_rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "stock-updated");
        assert_eq!(frames[0]["stock"], 7);
        assert_eq!(frames[0]["productId"], product.id.as_str());
        assert!(received(&mut other_rx).is_empty());
    }

    #[tokio::test]
    async fn test_loose_change_values_are_coerced() {
        let state = state().await;
        let service = StockService::new(state.clone());
        let product = seed(&state, Some("a"), "Brake Pad Front", "10001", 10).await;

        let text = StockRequest {
            change: Some(json!("3")),
            ..StockRequest::default()
        };
        assert_eq!(service.adjust(&product.id, &text).await.unwrap().stock(), 13);

        let fraction = StockRequest {
            change: Some(json!(-2.5)),
            ..StockRequest::default()
        };
        assert_eq!(service.adjust(&product.id, &fraction).await.unwrap().stock(), 11);

        let junk = StockRequest {
            change: Some(json!("a few")),
            reason: Some("sale".into()),
            ..StockRequest::default()
        };
        let outcome = service.adjust(&product.id, &junk).await.unwrap();
        assert_eq!(outcome.stock(), 11);
        assert_eq!(outcome.product.lifetime_max, Some(13));
    }

    #[tokio::test]
    async fn test_rejections() {
        let state = state().await;
        let service = StockService::new(state.clone());
        let product = seed(&state, Some("a"), "Brake Pad Front", "10001", 10).await;

        let err = service.adjust("not-a-uuid", &change(1, None)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let foreign = StockRequest {
            change: Some(json!(1)),
            user_id: Some("b".into()),
            ..StockRequest::default()
        };
        let err = service.adjust(&product.id, &foreign).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let unknown = uuid::Uuid::new_v4().to_string();
        let err = service.adjust(&unknown, &change(1, None)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        assert_eq!(state.db.products().get_required(&product.id).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_store_outage_is_an_error_for_writes() {
        let state = state().await;
        let product = seed(&state, Some("a"), "Brake Pad Front", "10001", 10).await;
        state.db.close().await;

        let err = StockService::new(state)
            .adjust(&product.id, &change(1, None))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Unavailable);
    }
}
