//! Bulk import with dedup/merge.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         POST /excel-import                              │
//! │                                                                         │
//! │  spreadsheet ──► extract_rows ──► RawRow[]                              │
//! │                                      │                                  │
//! │  owner's catalog + categories ───────┤                                  │
//! │                                      ▼                                  │
//! │                             ImportPlanner::plan                         │
//! │                     ┌────────────┬───┴──────────┬────────────┐          │
//! │                     ▼            ▼              ▼            ▼          │
//! │                  entries      appends      duplicates     errors        │
//! │                     │            │                                      │
//! │              insert one by one   modify parent (version check)          │
//! │              journal "created"   journal "variant_added" per variant    │
//! │              product-created     variant-added                          │
//! │                                                                         │
//! │  Row groups are written sequentially. A failed write is reported and    │
//! │  the batch goes on; nothing already written is rolled back. Only a      │
//! │  store outage aborts the request.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use stockroom_core::import::{
    parse_quantity, DuplicateRecord, ImportDefaults, ImportPlan, ImportPlanner, PlannedAppend,
    PlannedEntry, RowError,
};
use stockroom_core::spreadsheet::extract_rows;
use stockroom_core::validation::validate_currency;
use stockroom_core::{HistoryAction, Markup, Product, Variant};
use stockroom_db::{DbError, NewHistoryItem};
use stockroom_sync::{ChangeKind, ChangeNotification};

use super::{journal, notify, owner_param};
use crate::dto::{numeric_text, DuplicateDto, ImportRequest, ImportResponse, ProductDto};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Status values that import entries as hidden.
const HIDDEN_STATUSES: [&str; 3] = ["hidden", "inactive", "draft"];

/// What one import batch did.
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    /// Entries created by this batch.
    pub created: Vec<Product>,
    /// Variants bundled into created entries.
    pub bundled_variants: usize,
    /// Variants appended to entries that already existed.
    pub appended_variants: usize,
    pub duplicates: Vec<DuplicateRecord>,
    pub errors: Vec<RowError>,
}

impl ImportOutcome {
    pub fn total_variants(&self) -> usize {
        self.bundled_variants + self.appended_variants
    }

    pub fn summary(&self) -> String {
        format!(
            "Imported {} products with {} variants; {} added as variants to existing products; {} duplicates skipped; {} errors",
            self.created.len(),
            self.total_variants(),
            self.appended_variants,
            self.duplicates.len(),
            self.errors.len()
        )
    }

    pub fn into_response(self) -> ImportResponse {
        let message = self.summary();
        ImportResponse {
            success: true,
            message,
            total_products: self.created.len(),
            total_variants: self.total_variants(),
            added_as_variants: self.appended_variants,
            skipped_duplicates: self.duplicates.len(),
            duplicates_list: self.duplicates.iter().map(DuplicateDto::from).collect(),
            errors: (!self.errors.is_empty()).then_some(self.errors),
            products: self.created.iter().map(ProductDto::from).collect(),
        }
    }
}

/// Bulk import service.
pub struct ImportService {
    state: Arc<AppState>,
}

impl ImportService {
    pub fn new(state: Arc<AppState>) -> Self {
        ImportService { state }
    }

    /// Imports a spreadsheet into the owner's catalog.
    ///
    /// Rows matching an existing entry or variant (by short code, else by
    /// name) are skipped and reported. Rows sharing their first two name
    /// words with an existing entry become its variants.
    pub async fn import(&self, request: ImportRequest) -> ApiResult<ImportOutcome> {
        let owner = owner_param(request.user_id.as_deref())?;
        let rows = extract_rows(&request.spreadsheet, request.column_mapping.as_ref())?;
        let defaults = self.defaults(&request);

        info!(
            owner_id = ?owner,
            rows = rows.len(),
            currency = %defaults.currency,
            "Import started"
        );

        let catalog = self.state.db.products().list_owned_by(owner.as_deref()).await?;
        let categories = self.state.db.categories().list_for_owner(owner.as_deref()).await?;

        let ImportPlan {
            entries,
            appends,
            duplicates,
            errors,
        } = ImportPlanner::new(&catalog, &categories, &defaults).plan(rows);

        let mut outcome = ImportOutcome {
            duplicates,
            errors,
            ..ImportOutcome::default()
        };

        for entry in entries {
            self.create_entry(owner.as_deref(), entry, &mut outcome).await?;
        }
        for append in appends {
            self.append_variants(append, &mut outcome).await?;
        }

        info!(
            created = outcome.created.len(),
            variants = outcome.total_variants(),
            appended = outcome.appended_variants,
            duplicates = outcome.duplicates.len(),
            errors = outcome.errors.len(),
            "Import finished"
        );
        Ok(outcome)
    }

    /// Request defaults. Unreadable values fall back instead of failing.
    fn defaults(&self, request: &ImportRequest) -> ImportDefaults {
        let config = &self.state.config;

        let stock = numeric_text(request.default_stock.as_ref())
            .as_deref()
            .and_then(parse_quantity)
            .unwrap_or(0)
            .max(0);
        let markup = numeric_text(request.default_markup.as_ref())
            .as_deref()
            .and_then(Markup::parse_percent)
            .unwrap_or(config.default_markup);

        let currency = match request.currency.as_deref().map(|c| c.trim().to_uppercase()) {
            Some(currency) if validate_currency(&currency).is_ok() => currency,
            Some(currency) if !currency.is_empty() => {
                warn!(currency = %currency, "Unknown import currency, using default");
                config.default_currency.clone()
            }
            _ => config.default_currency.clone(),
        };

        let visible = !request
            .status
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .is_some_and(|s| HIDDEN_STATUSES.contains(&s.as_str()));

        ImportDefaults {
            stock,
            markup,
            currency,
            visible,
            target_category_id: request
                .category_id
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        }
    }

    async fn create_entry(
        &self,
        owner: Option<&str>,
        entry: PlannedEntry,
        outcome: &mut ImportOutcome,
    ) -> ApiResult<()> {
        let name = entry.draft.name.clone();
        let variants: Vec<Variant> = entry
            .variants
            .into_iter()
            .map(|(id, draft)| draft.into_variant(id))
            .collect();
        let product = Product::from_draft(
            entry.id,
            owner.map(str::to_string),
            entry.draft,
            variants,
            self.state.db.clock().now(),
        );

        let product = match self.state.db.products().insert(&product).await {
            Ok(stored) => stored,
            Err(e) => return write_failure(e, &name, outcome),
        };

        journal(
            &self.state,
            NewHistoryItem {
                owner_id: product.owner_id.as_deref(),
                product_id: &product.id,
                product_name: &product.name,
                action: HistoryAction::Created,
                details: json!({
                    "source": "import",
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
            ChangeNotification::for_product(ChangeKind::ProductCreated, &product),
        )
        .await;

        outcome.bundled_variants += product.variants.len();
        outcome.created.push(product);
        Ok(())
    }

    async fn append_variants(&self, append: PlannedAppend, outcome: &mut ImportOutcome) -> ApiResult<()> {
        let new_variants: Vec<Variant> = append
            .variants
            .into_iter()
            .map(|(id, draft)| draft.into_variant(id))
            .collect();

        let result = self
            .state
            .db
            .products()
            .modify(&append.product_id, |product| -> Result<(), DbError> {
                product.variants.extend(new_variants.iter().cloned());
                Ok(())
            })
            .await;

        let (product, ()) = match result {
            Ok(stored) => stored,
            Err(e) => return write_failure(e, &append.product_name, outcome),
        };

        for variant in &new_variants {
            journal(
                &self.state,
                NewHistoryItem {
                    owner_id: product.owner_id.as_deref(),
                    product_id: &product.id,
                    product_name: &product.name,
                    action: HistoryAction::VariantAdded,
                    details: json!({
                        "source": "import",
                        "variantId": variant.id,
                        "variantName": variant.name,
                        "code": variant.code,
                        "stock": variant.on_hand,
                    }),
                },
            )
            .await;
        }

        notify(
            &self.state,
            product.owner_id.as_deref(),
            ChangeNotification::for_product(ChangeKind::VariantAdded, &product),
        )
        .await;

        outcome.appended_variants += new_variants.len();
        Ok(())
    }
}

/// A store outage aborts the batch; any other write failure is reported
/// under row 0 and the batch continues.
fn write_failure(err: DbError, name: &str, outcome: &mut ImportOutcome) -> ApiResult<()> {
    if err.is_unavailable() {
        return Err(ApiError::from(err));
    }
    warn!(name, error = %err, "Import write failed");
    outcome.errors.push(RowError {
        row_number: 0,
        name: Some(name.to_string()),
        message: err.to_string(),
    });
    Ok(())
}
