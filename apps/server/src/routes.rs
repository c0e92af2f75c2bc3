//! HTTP handlers.
//!
//! Thin wrappers: extract, call the service, wrap the result. Successful
//! responses use `{ "success": true, "data": ... }` except where clients
//! expect a flatter body (stock adjustment, import).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::dto::{
    CreateProductRequest, DeltaDto, DeltaQuery, HistoryDto, HistoryQuery, ImportRequest,
    ImportResponse, ListQuery, OwnerQuery, ProductDto, StockRequest, StockResponse,
    UpdateProductRequest,
};
use crate::error::ApiResult;
use crate::services::{CatalogService, DeltaService, ImportService, StockService};
use crate::AppState;

/// Standard success body.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

// =============================================================================
// Delta Sync
// =============================================================================

/// GET /products/delta
pub async fn delta(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeltaQuery>,
) -> ApiResult<Json<Envelope<DeltaDto>>> {
    let delta = DeltaService::new(state).delta(&query).await?;
    Ok(ok(DeltaDto::from(delta)))
}

// =============================================================================
// Stock
// =============================================================================

/// PATCH /products/{id}/stock
pub async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<StockRequest>,
) -> ApiResult<Json<StockResponse>> {
    let outcome = StockService::new(state).adjust(&id, &request).await?;
    Ok(Json(StockResponse {
        success: true,
        stock: outcome.stock(),
        variant_index: outcome.variant_index,
        product: ProductDto::from(outcome.product),
    }))
}

// =============================================================================
// Catalog
// =============================================================================

/// POST /products
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<ProductDto>>)> {
    let product = CatalogService::new(state).create(request).await?;
    Ok((StatusCode::CREATED, ok(ProductDto::from(product))))
}

/// GET /products
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Envelope<Vec<ProductDto>>>> {
    let products = CatalogService::new(state).list(&query).await?;
    Ok(ok(products.iter().map(ProductDto::from).collect()))
}

/// GET /products/{id}
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<Envelope<Option<ProductDto>>>> {
    let product = CatalogService::new(state)
        .get(&id, query.user_id.as_deref())
        .await?;
    Ok(ok(product.map(ProductDto::from)))
}

/// PUT /products/{id}
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateProductRequest>,
) -> ApiResult<Json<Envelope<ProductDto>>> {
    let product = CatalogService::new(state).update(&id, request).await?;
    Ok(ok(ProductDto::from(product)))
}

/// Body of a successful delete.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deleted {
    pub id: String,
    pub deleted_at: i64,
}

/// DELETE /products/{id}
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<Envelope<Deleted>>> {
    let tombstone = CatalogService::new(state)
        .delete(&id, query.user_id.as_deref())
        .await?;
    Ok(ok(Deleted {
        id: tombstone.product_id,
        deleted_at: tombstone.deleted_at.timestamp_millis(),
    }))
}

/// DELETE /products/{id}/variants/{variant_id}
pub async fn remove_variant(
    State(state): State<Arc<AppState>>,
    Path((id, variant_id)): Path<(String, String)>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<Envelope<ProductDto>>> {
    let product = CatalogService::new(state)
        .remove_variant(&id, &variant_id, query.user_id.as_deref())
        .await?;
    Ok(ok(ProductDto::from(product)))
}

/// GET /products/{id}/history
pub async fn product_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Envelope<Vec<HistoryDto>>>> {
    let items = CatalogService::new(state).history(&id, query.limit).await?;
    Ok(ok(items.into_iter().map(HistoryDto::from).collect()))
}

// =============================================================================
// Import
// =============================================================================

/// POST /excel-import
pub async fn excel_import(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<ImportResponse>> {
    let outcome = ImportService::new(state).import(request).await?;
    Ok(Json(outcome.into_response()))
}

// =============================================================================
// Health
// =============================================================================

/// Liveness report.
#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: bool,
    pub connections: usize,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Envelope<Health>> {
    let database = state.db.health_check().await;
    ok(Health {
        status: if database { "ok" } else { "degraded" },
        database,
        connections: state.hub.connection_count().await,
    })
}
