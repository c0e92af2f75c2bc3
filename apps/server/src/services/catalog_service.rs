//! Catalog entry operations outside the stock ledger and bulk import:
//! explicit create, list/fetch, manual edit, delete, variant removal and
//! the per-entry edit journal.

use std::sync::Arc;

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use stockroom_core::delta::OwnerScope;
use stockroom_core::import::{parse_quantity, CodeAllocator, DuplicateIndex};
use stockroom_core::stock::{set_absolute, StockAdjustment, Stocked};
use stockroom_core::validation::{validate_currency, validate_product_name};
use stockroom_core::{
    CoreError, HistoryAction, HistoryItem, Markup, Money, Product, ProductDraft, Tombstone, Variant,
};
use stockroom_db::NewHistoryItem;
use stockroom_sync::{ChangeKind, ChangeNotification};

use super::{
    degrade, ensure_owner, journal, notify, owner_param, product_id_param, DEFAULT_HISTORY_LIMIT,
};
use crate::dto::{numeric_text, CreateProductRequest, ListQuery, UpdateProductRequest};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Upper bound for one history page.
const MAX_HISTORY_LIMIT: u32 = 500;

// =============================================================================
// Field Helpers
// =============================================================================

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn price_of(value: Option<&serde_json::Value>) -> Option<Money> {
    numeric_text(value)
        .as_deref()
        .and_then(Money::parse_decimal)
        .filter(|m| !m.is_negative())
}

fn markup_of(value: Option<&serde_json::Value>) -> Option<Markup> {
    numeric_text(value).as_deref().and_then(Markup::parse_percent)
}

fn quantity_of(value: Option<&serde_json::Value>) -> Option<i64> {
    numeric_text(value)
        .as_deref()
        .and_then(parse_quantity)
        .map(|q| q.max(0))
}

fn currency_of(value: Option<&str>) -> ApiResult<Option<String>> {
    match non_empty(value) {
        Some(currency) => {
            let currency = currency.to_uppercase();
            validate_currency(&currency)?;
            Ok(Some(currency))
        }
        None => Ok(None),
    }
}

/// `Some("")` clears the field, `Some(x)` sets it, `None` leaves it.
fn patch_text(field: &mut Option<String>, value: Option<&String>) {
    if let Some(value) = value {
        *field = non_empty(Some(value));
    }
}

fn duplicate_error(matched_on: &str, value: &str, existing_id: &str, existing_name: &str) -> ApiError {
    CoreError::DuplicateProduct {
        field: matched_on.to_string(),
        value: value.to_string(),
        existing_id: existing_id.to_string(),
        existing_name: existing_name.to_string(),
    }
    .into()
}

// =============================================================================
// Service
// =============================================================================

/// Catalog service.
pub struct CatalogService {
    state: Arc<AppState>,
}

impl CatalogService {
    pub fn new(state: Arc<AppState>) -> Self {
        CatalogService { state }
    }

    /// Creates one entry.
    ///
    /// Rejects a name or short code already used by any entry or variant of
    /// the owner. Without an explicit price the selling price is base price
    /// plus markup; without a code the next sequential short code is used.
    pub async fn create(&self, request: CreateProductRequest) -> ApiResult<Product> {
        let owner = owner_param(request.user_id.as_deref())?;
        let name = request.name.trim().to_string();
        validate_product_name(&name)?;

        let currency =
            currency_of(request.currency.as_deref())?.unwrap_or_else(|| self.state.config.default_currency.clone());
        let base_price = price_of(request.base_price.as_ref()).unwrap_or_default();
        let markup = markup_of(request.price_multiplier.as_ref()).unwrap_or(self.state.config.default_markup);
        let price = price_of(request.price.as_ref()).unwrap_or_else(|| base_price.apply_markup(markup));
        let on_hand = quantity_of(request.stock.as_ref()).unwrap_or(0);
        let code = non_empty(request.code.as_deref());

        let catalog = self.state.db.products().list_owned_by(owner.as_deref()).await?;
        if let Some((matched_on, id, existing)) =
            DuplicateIndex::from_catalog(&catalog).find(&name, code.as_deref())
        {
            let value = if matched_on == "code" {
                code.as_deref().unwrap_or_default()
            } else {
                name.as_str()
            };
            return Err(duplicate_error(matched_on, value, id, existing));
        }
        let code = match code {
            Some(code) => code,
            None => CodeAllocator::for_catalog(&catalog).allocate()?,
        };

        let draft = ProductDraft {
            name,
            code: Some(code),
            catalog_number: non_empty(request.catalog_number.as_deref()),
            barcode: non_empty(request.barcode.as_deref()),
            base_price,
            price,
            markup,
            currency,
            on_hand,
            category_id: non_empty(request.category_id.as_deref()),
            images: request.images,
            visible: request.visible.unwrap_or(true),
        };
        let product = Product::from_draft(
            Uuid::new_v4().to_string(),
            owner,
            draft,
            Vec::new(),
            self.state.db.clock().now(),
        );
        let product = self.state.db.products().insert(&product).await?;

        info!(product_id = %product.id, code = ?product.code, stock = product.on_hand, "Product created");

        journal(
            &self.state,
            NewHistoryItem {
                owner_id: product.owner_id.as_deref(),
                product_id: &product.id,
                product_name: &product.name,
                action: HistoryAction::Created,
                details: json!({
                    "source": "manual",
                    "code": product.code,
                    "stock": product.on_hand,
                    "price": product.price().as_major_f64(),
                }),
            },
        )
        .await;

        notify(
            &self.state,
            product.owner_id.as_deref(),
            ChangeNotification::for_product(ChangeKind::ProductCreated, &product),
        )
        .await;

        Ok(product)
    }

    /// Entries visible to the caller. Empty when the store is unreachable.
    pub async fn list(&self, query: &ListQuery) -> ApiResult<Vec<Product>> {
        let owner = owner_param(query.user_id.as_deref())?;
        let scope = OwnerScope::resolve(
            owner.as_deref(),
            query.user_phone.as_deref(),
            self.state.config.super_account_phone.as_deref(),
        );
        degrade(self.state.db.products().list(&scope).await, "product list")
    }

    /// One entry. `None` when the store is unreachable.
    pub async fn get(&self, id: &str, user_id: Option<&str>) -> ApiResult<Option<Product>> {
        product_id_param(id)?;
        let owner = owner_param(user_id)?;

        match degrade(self.state.db.products().get(id).await, "product")? {
            Some(product) => {
                ensure_owner(&product, owner.as_deref())?;
                Ok(Some(product))
            }
            None if self.state.db.health_check().await => Err(ApiError::not_found("Product", id)),
            None => Ok(None),
        }
    }

    /// Manual edit.
    ///
    /// Absent fields stay as they are. A new base price or markup without an
    /// explicit price recomputes the selling price. An absolute `stock` goes
    /// through the ledger, so raising it raises the lifetime maximum too.
    pub async fn update(&self, id: &str, request: UpdateProductRequest) -> ApiResult<Product> {
        product_id_param(id)?;
        let owner = owner_param(request.user_id.as_deref())?;

        let name = match request.name.as_deref().map(str::trim) {
            Some(name) => {
                validate_product_name(name)?;
                Some(name.to_string())
            }
            None => None,
        };
        let currency = currency_of(request.currency.as_deref())?;
        let base_price = price_of(request.base_price.as_ref());
        let markup = markup_of(request.price_multiplier.as_ref());
        let price = price_of(request.price.as_ref());
        let stock = quantity_of(request.stock.as_ref());

        let current = self.state.db.products().get_required(id).await?;
        ensure_owner(&current, owner.as_deref())?;

        let new_code = request.code.as_deref().map(|c| non_empty(Some(c)));
        let name_changed = name.as_deref().is_some_and(|n| n != current.name);
        let code_changed = new_code.as_ref().is_some_and(|c| *c != current.code);
        if name_changed || code_changed {
            let others: Vec<Product> = self
                .state
                .db
                .products()
                .list_owned_by(current.owner_id.as_deref())
                .await?
                .into_iter()
                .filter(|p| p.id != current.id)
                .collect();
            let check_name = name.as_deref().unwrap_or(&current.name);
            let check_code = match &new_code {
                Some(code) => code.as_deref(),
                None => current.code.as_deref(),
            };
            if let Some((matched_on, dup_id, existing)) =
                DuplicateIndex::from_catalog(&others).find(check_name, check_code)
            {
                let value = if matched_on == "code" {
                    check_code.unwrap_or_default()
                } else {
                    check_name
                };
                return Err(duplicate_error(matched_on, value, dup_id, existing));
            }
        }

        let mut fields: Vec<&'static str> = Vec::new();
        let provided = [
            ("name", name.is_some()),
            ("code", request.code.is_some()),
            ("catalogNumber", request.catalog_number.is_some()),
            ("barcode", request.barcode.is_some()),
            ("basePrice", base_price.is_some()),
            ("priceMultiplier", markup.is_some()),
            ("price", price.is_some()),
            ("currency", currency.is_some()),
            ("stock", stock.is_some()),
            ("categoryId", request.category_id.is_some()),
            ("images", request.images.is_some()),
            ("visible", request.visible.is_some()),
        ];
        fields.extend(provided.iter().filter(|(_, set)| *set).map(|(field, _)| *field));

        let (product, adjustment) = self
            .state
            .db
            .products()
            .modify(id, |product| -> ApiResult<Option<StockAdjustment>> {
                ensure_owner(product, owner.as_deref())?;

                if let Some(name) = &name {
                    product.name = name.clone();
                }
                patch_text(&mut product.code, request.code.as_ref());
                patch_text(&mut product.catalog_number, request.catalog_number.as_ref());
                patch_text(&mut product.barcode, request.barcode.as_ref());
                patch_text(&mut product.category_id, request.category_id.as_ref());
                if let Some(currency) = &currency {
                    product.currency = currency.clone();
                }
                if let Some(images) = &request.images {
                    product.images = images.clone();
                }
                if let Some(visible) = request.visible {
                    product.visible = visible;
                }

                if let Some(base) = base_price {
                    product.base_price_cents = base.cents();
                }
                if let Some(markup) = markup {
                    product.markup_bps = markup.bps();
                }
                match price {
                    Some(price) => product.price_cents = price.cents(),
                    None if base_price.is_some() || markup.is_some() => {
                        product.price_cents = product.base_price().apply_markup(product.markup()).cents();
                    }
                    None => {}
                }

                Ok(stock.map(|target| {
                    let adjustment = set_absolute(product.stock_levels(), target);
                    product.store_levels(&adjustment);
                    adjustment
                }))
            })
            .await?;

        info!(product_id = %product.id, fields = ?fields, "Product updated");

        journal(
            &self.state,
            NewHistoryItem {
                owner_id: product.owner_id.as_deref(),
                product_id: &product.id,
                product_name: &product.name,
                action: HistoryAction::Updated,
                details: json!({
                    "fields": fields,
                    "previousStock": adjustment.map(|a| a.previous_on_hand),
                    "stock": product.on_hand,
                    "initialStock": product.lifetime_max,
                }),
            },
        )
        .await;

        let mut notification = ChangeNotification::for_product(ChangeKind::ProductUpdated, &product);
        if let Some(adjustment) = adjustment {
            notification = notification.with_stock(adjustment.on_hand);
        }
        notify(&self.state, product.owner_id.as_deref(), notification).await;

        Ok(product)
    }

    /// Removes an entry and writes its tombstone in one transaction.
    pub async fn delete(&self, id: &str, user_id: Option<&str>) -> ApiResult<Tombstone> {
        product_id_param(id)?;
        let owner = owner_param(user_id)?;

        let current = self.state.db.products().get_required(id).await?;
        ensure_owner(&current, owner.as_deref())?;

        let (product, tombstone) = self.state.db.products().delete_with_tombstone(id).await?;

        info!(product_id = %product.id, "Product deleted");

        journal(
            &self.state,
            NewHistoryItem {
                owner_id: product.owner_id.as_deref(),
                product_id: &product.id,
                product_name: &product.name,
                action: HistoryAction::Deleted,
                details: json!({
                    "code": product.code,
                    "stock": product.on_hand,
                    "variants": product.variants.len(),
                }),
            },
        )
        .await;

        notify(
            &self.state,
            product.owner_id.as_deref(),
            ChangeNotification::for_product(ChangeKind::ProductDeleted, &product)
                .at(tombstone.deleted_at.timestamp_millis()),
        )
        .await;

        Ok(tombstone)
    }

    /// Splices one variant, addressed by its stable id, out of its entry.
    pub async fn remove_variant(
        &self,
        id: &str,
        variant_id: &str,
        user_id: Option<&str>,
    ) -> ApiResult<Product> {
        product_id_param(id)?;
        let owner = owner_param(user_id)?;
        if variant_id.trim().is_empty() {
            return Err(ApiError::validation("variantId is required"));
        }

        let (product, removed) = self
            .state
            .db
            .products()
            .modify(id, |product| -> ApiResult<Variant> {
                ensure_owner(product, owner.as_deref())?;
                let position = product
                    .variants
                    .iter()
                    .position(|v| v.id == variant_id)
                    .ok_or_else(|| CoreError::VariantNotFound {
                        product_id: product.id.clone(),
                        variant: variant_id.to_string(),
                    })?;
                Ok(product.variants.remove(position))
            })
            .await?;

        info!(product_id = %product.id, variant_id, "Variant removed");

        journal(
            &self.state,
            NewHistoryItem {
                owner_id: product.owner_id.as_deref(),
                product_id: &product.id,
                product_name: &product.name,
                action: HistoryAction::VariantRemoved,
                details: json!({
                    "variantId": removed.id,
                    "variantName": removed.name,
                    "stock": removed.on_hand,
                }),
            },
        )
        .await;

        notify(
            &self.state,
            product.owner_id.as_deref(),
            ChangeNotification::for_product(ChangeKind::ProductUpdated, &product),
        )
        .await;

        Ok(product)
    }

    /// Edit journal of one entry, newest first.
    pub async fn history(&self, id: &str, limit: Option<u32>) -> ApiResult<Vec<HistoryItem>> {
        product_id_param(id)?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);

        degrade(self.state.db.history().for_product(id, limit).await, "history")
    }
}
