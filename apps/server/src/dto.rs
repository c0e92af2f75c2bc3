//! # Wire Types
//!
//! Request and response bodies. Domain types stay in cents and basis points;
//! these carry the decimal prices, `stock`/`initialStock` and millisecond
//! timestamps the clients expect.
//!
//! ## Field Mapping
//! ```text
//!   Product.on_hand          → stock
//!   Product.lifetime_max     → initialStock   (on_hand when unset)
//!   Product.markup_bps       → priceMultiplier (percent, 2500 → 25.0)
//!   Product.price_cents      → price          (decimal, 1250 → 12.5)
//!   Product.updated_at       → updatedAt      (ms since epoch)
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use stockroom_core::delta::DeltaSet;
use stockroom_core::import::{parse_quantity, DuplicateRecord, RowError};
use stockroom_core::spreadsheet::{ColumnMapping, SpreadsheetPayload};
use stockroom_core::{HistoryAction, HistoryItem, Money, Product, Variant};

// =============================================================================
// Product
// =============================================================================

/// Variant as sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantDto {
    pub id: String,
    pub name: String,
    pub code: Option<String>,
    pub catalog_number: Option<String>,
    pub barcode: Option<String>,
    pub price: f64,
    pub base_price: f64,
    pub price_multiplier: f64,
    pub currency: String,
    pub stock: i64,
    pub initial_stock: i64,
}

impl From<&Variant> for VariantDto {
    fn from(v: &Variant) -> Self {
        VariantDto {
            id: v.id.clone(),
            name: v.name.clone(),
            code: v.code.clone(),
            catalog_number: v.catalog_number.clone(),
            barcode: v.barcode.clone(),
            price: v.price().as_major_f64(),
            base_price: Money::from_cents(v.base_price_cents).as_major_f64(),
            price_multiplier: v.markup().percentage(),
            currency: v.currency.clone(),
            stock: v.on_hand,
            initial_stock: v.lifetime_max.unwrap_or(v.on_hand),
        }
    }
}

/// Catalog entry as sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub code: Option<String>,
    pub catalog_number: Option<String>,
    pub barcode: Option<String>,
    pub price: f64,
    pub base_price: f64,
    pub price_multiplier: f64,
    pub currency: String,
    pub stock: i64,
    pub initial_stock: i64,
    pub category_id: Option<String>,
    pub images: Vec<String>,
    pub visible: bool,
    pub variants: Vec<VariantDto>,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&Product> for ProductDto {
    fn from(p: &Product) -> Self {
        ProductDto {
            id: p.id.clone(),
            user_id: p.owner_id.clone(),
            name: p.name.clone(),
            code: p.code.clone(),
            catalog_number: p.catalog_number.clone(),
            barcode: p.barcode.clone(),
            price: p.price().as_major_f64(),
            base_price: p.base_price().as_major_f64(),
            price_multiplier: p.markup().percentage(),
            currency: p.currency.clone(),
            stock: p.on_hand,
            initial_stock: p.lifetime_max.unwrap_or(p.on_hand),
            category_id: p.category_id.clone(),
            images: p.images.clone(),
            visible: p.visible,
            variants: p.variants.iter().map(VariantDto::from).collect(),
            version: p.version,
            created_at: p.created_at.timestamp_millis(),
            updated_at: p.updated_at.timestamp_millis(),
        }
    }
}

impl From<Product> for ProductDto {
    fn from(p: Product) -> Self {
        ProductDto::from(&p)
    }
}

// =============================================================================
// Delta Sync
// =============================================================================

/// `GET /products/delta` query. `since` stays a string so junk values can be
/// clamped instead of rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaQuery {
    pub since: Option<String>,
    pub user_id: Option<String>,
    pub user_phone: Option<String>,
}

/// `data` of a delta response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaDto {
    pub new_products: Vec<ProductDto>,
    pub updated_products: Vec<ProductDto>,
    pub deleted_product_ids: Vec<String>,
    pub server_time: i64,
}

impl From<DeltaSet> for DeltaDto {
    fn from(delta: DeltaSet) -> Self {
        DeltaDto {
            new_products: delta.new_entries.iter().map(ProductDto::from).collect(),
            updated_products: delta.updated_entries.iter().map(ProductDto::from).collect(),
            deleted_product_ids: delta.deleted_ids,
            server_time: delta.server_time,
        }
    }
}

// =============================================================================
// Stock
// =============================================================================

/// `PATCH /products/{id}/stock` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRequest {
    /// Signed quantity; a number or numeric string. Unreadable input is a
    /// zero change.
    pub change: Option<Value>,
    pub variant_index: Option<usize>,
    pub user_id: Option<String>,
    pub reason: Option<String>,
}

impl StockRequest {
    /// Whole units to apply, fraction dropped.
    pub fn change(&self) -> i64 {
        numeric_text(self.change.as_ref())
            .and_then(|text| parse_quantity(&text))
            .unwrap_or(0)
    }
}

/// `PATCH /products/{id}/stock` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockResponse {
    pub success: bool,
    pub stock: i64,
    pub product: ProductDto,
    pub variant_index: Option<usize>,
}

// =============================================================================
// Catalog CRUD
// =============================================================================

/// `GET /products` query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub user_id: Option<String>,
    pub user_phone: Option<String>,
}

/// Owner passed along with deletes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    pub user_id: Option<String>,
}

/// `GET /products/{id}/history` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

/// One edit journal item as sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDto {
    pub id: String,
    pub user_id: Option<String>,
    pub product_id: String,
    pub product_name: String,
    pub action: HistoryAction,
    pub details: Value,
    pub created_at: i64,
}

impl From<HistoryItem> for HistoryDto {
    fn from(item: HistoryItem) -> Self {
        HistoryDto {
            id: item.id,
            user_id: item.owner_id,
            product_id: item.product_id,
            product_name: item.product_name,
            action: item.action,
            details: item.details,
            created_at: item.created_at.timestamp_millis(),
        }
    }
}

/// `POST /products` body.
///
/// Numeric fields accept numbers or strings; unreadable values fall back to
/// defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub user_id: Option<String>,
    pub name: String,
    pub code: Option<String>,
    pub catalog_number: Option<String>,
    pub barcode: Option<String>,
    pub base_price: Option<Value>,
    pub price: Option<Value>,
    pub price_multiplier: Option<Value>,
    pub currency: Option<String>,
    pub stock: Option<Value>,
    pub category_id: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub visible: Option<bool>,
}

/// `PUT /products/{id}` body. Absent fields are left alone; an empty string
/// clears an optional text field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub catalog_number: Option<String>,
    pub barcode: Option<String>,
    pub base_price: Option<Value>,
    pub price: Option<Value>,
    pub price_multiplier: Option<Value>,
    pub currency: Option<String>,
    pub stock: Option<Value>,
    pub category_id: Option<String>,
    pub images: Option<Vec<String>>,
    pub visible: Option<bool>,
}

// =============================================================================
// Import
// =============================================================================

/// `POST /excel-import` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub spreadsheet: SpreadsheetPayload,
    pub column_mapping: Option<ColumnMapping>,
    pub category_id: Option<String>,
    pub user_id: Option<String>,
    pub default_stock: Option<Value>,
    pub default_markup: Option<Value>,
    pub currency: Option<String>,
    /// `"active"` (default) or `"hidden"`.
    pub status: Option<String>,
}

/// One skipped row in the import report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateDto {
    pub row_number: usize,
    pub name: String,
    pub code: Option<String>,
    pub catalog_number: Option<String>,
    pub price: f64,
    pub stock: i64,
    pub matched_on: String,
    pub existing_product_id: String,
    pub existing_product_name: String,
}

impl From<&DuplicateRecord> for DuplicateDto {
    fn from(d: &DuplicateRecord) -> Self {
        DuplicateDto {
            row_number: d.row_number,
            name: d.name.clone(),
            code: d.code.clone(),
            catalog_number: d.catalog_number.clone(),
            price: d.price.as_major_f64(),
            stock: d.stock,
            matched_on: d.matched_on.clone(),
            existing_product_id: d.existing_id.clone(),
            existing_product_name: d.existing_name.clone(),
        }
    }
}

/// `POST /excel-import` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    pub products: Vec<ProductDto>,
    pub total_products: usize,
    pub total_variants: usize,
    pub added_as_variants: usize,
    pub skipped_duplicates: usize,
    pub duplicates_list: Vec<DuplicateDto>,
    /// Row-level failures. Row 0 marks a write failure not tied to one row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<RowError>>,
}

// =============================================================================
// Lenient Numbers
// =============================================================================

/// Reads a JSON number or numeric string as text for the core parsers.
///
/// Anything else (bool, object, null) reads as absent.
pub fn numeric_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use stockroom_core::{Markup, ProductDraft};

    #[test]
    fn test_product_dto_wire_names() {
        let draft = ProductDraft {
            name: "Brake Pad Front".to_string(),
            code: Some("10001".to_string()),
            catalog_number: None,
            barcode: None,
            base_price: Money::from_cents(1000),
            price: Money::from_cents(1250),
            markup: Markup::from_bps(2500),
            currency: "EUR".to_string(),
            on_hand: 10,
            category_id: None,
            images: vec![],
            visible: true,
        };
        let mut product = Product::from_draft("p1".into(), Some("a".into()), draft, vec![], Utc::now());
        product.on_hand = 7;

        let json = serde_json::to_value(ProductDto::from(&product)).unwrap();
        assert_eq!(json["price"], 12.5);
        assert_eq!(json["basePrice"], 10.0);
        assert_eq!(json["priceMultiplier"], 25.0);
        assert_eq!(json["stock"], 7);
        assert_eq!(json["initialStock"], 10);
        assert_eq!(json["userId"], "a");
        assert_eq!(json["updatedAt"], product.updated_at.timestamp_millis());
    }

    #[test]
    fn test_legacy_initial_stock_falls_back_to_stock() {
        let variant = Variant {
            id: "v1".into(),
            name: "Brake Pad Rear".into(),
            code: None,
            catalog_number: None,
            barcode: None,
            price_cents: 100,
            base_price_cents: 100,
            markup_bps: 0,
            currency: "EUR".into(),
            on_hand: 4,
            lifetime_max: None,
        };
        assert_eq!(VariantDto::from(&variant).initial_stock, 4);
    }

    #[test]
    fn test_numeric_text() {
        assert_eq!(numeric_text(Some(&json!(12.5))).as_deref(), Some("12.5"));
        assert_eq!(numeric_text(Some(&json!("12,5"))).as_deref(), Some("12,5"));
        assert_eq!(numeric_text(Some(&json!(""))), None);
        assert_eq!(numeric_text(Some(&json!(true))), None);
        assert_eq!(numeric_text(None), None);
    }

    #[test]
    fn test_stock_change_is_lenient() {
        let read = |body: Value| serde_json::from_value::<StockRequest>(body).unwrap().change();
        assert_eq!(read(json!({ "change": -3 })), -3);
        assert_eq!(read(json!({ "change": "3" })), 3);
        assert_eq!(read(json!({ "change": 2.5 })), 2);
        assert_eq!(read(json!({ "change": "-1,5" })), -1);
        assert_eq!(read(json!({ "change": null })), 0);
        assert_eq!(read(json!({ "change": "lots" })), 0);
        assert_eq!(read(json!({})), 0);
    }

    #[test]
    fn test_import_request_shape() {
        let body = json!({
            "spreadsheet": { "format": "csv", "data": "Name,Price\nGasket,1.5" },
            "columnMapping": { "price": 1 },
            "userId": "owner-1",
            "defaultStock": "3",
            "status": "hidden"
        });
        let req: ImportRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.column_mapping.unwrap().price, Some(1));
        assert_eq!(numeric_text(req.default_stock.as_ref()).as_deref(), Some("3"));
    }
}
