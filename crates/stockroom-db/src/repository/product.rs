//! # Product Repository
//!
//! Catalog Store operations: entries with embedded variants.
//!
//! ## Version-Checked Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  modify(id, f)                                                         │
//! │                                                                         │
//! │   ┌──────────────┐   read row (version = 7)                            │
//! │   │  attempt 1   │   f(&mut product)         ← pure core rules          │
//! │   └──────┬───────┘   UPDATE ... SET version = 8                         │
//! │          │           WHERE id = ? AND version = 7                       │
//! │          │                                                              │
//! │     0 rows? another writer got there first → read again (≤ 5 attempts) │
//! │     1 row?  done, return the stored product                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A variant append or stock change therefore never overwrites a concurrent
//! change to the same entry. Each write also stamps `updated_at` from the
//! shared monotonic clock.

use std::sync::Arc;

use sqlx::{FromRow, SqlitePool};
use tracing::{debug, warn};

use stockroom_core::delta::OwnerScope;
use stockroom_core::{Product, Tombstone, Variant};

use crate::clock::{from_millis, MonotonicClock};
use crate::error::{DbError, DbResult};
use crate::MAX_WRITE_ATTEMPTS;

const PRODUCT_COLUMNS: &str = "id, owner_id, name, code, catalog_number, barcode, price_cents, \
     base_price_cents, markup_bps, currency, on_hand, lifetime_max, category_id, images, visible, \
     variants, version, created_at, updated_at";

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw `products` row. JSON columns and millisecond timestamps are decoded
/// into a [`Product`] by `TryFrom`.
#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    owner_id: Option<String>,
    name: String,
    code: Option<String>,
    catalog_number: Option<String>,
    barcode: Option<String>,
    price_cents: i64,
    base_price_cents: i64,
    markup_bps: i64,
    currency: String,
    on_hand: i64,
    lifetime_max: Option<i64>,
    category_id: Option<String>,
    images: String,
    visible: bool,
    variants: String,
    version: i64,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ProductRow> for Product {
    type Error = DbError;

    fn try_from(row: ProductRow) -> DbResult<Product> {
        let variants: Vec<Variant> = serde_json::from_str(&row.variants)
            .map_err(|e| DbError::corrupt("products.variants", e))?;
        let images: Vec<String> =
            serde_json::from_str(&row.images).map_err(|e| DbError::corrupt("products.images", e))?;

        Ok(Product {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            code: row.code,
            catalog_number: row.catalog_number,
            barcode: row.barcode,
            price_cents: row.price_cents,
            base_price_cents: row.base_price_cents,
            markup_bps: u32::try_from(row.markup_bps).unwrap_or(0),
            currency: row.currency,
            on_hand: row.on_hand,
            lifetime_max: row.lifetime_max,
            category_id: row.category_id,
            images,
            visible: row.visible,
            variants,
            version: row.version,
            created_at: from_millis(row.created_at),
            updated_at: from_millis(row.updated_at),
        })
    }
}

fn decode_all(rows: Vec<ProductRow>) -> DbResult<Vec<Product>> {
    rows.into_iter().map(Product::try_from).collect()
}

/// SQL predicate and bind value for an owner scope.
fn scope_filter(scope: &OwnerScope) -> (&'static str, Option<&str>) {
    match scope {
        OwnerScope::All => ("1 = 1", None),
        OwnerScope::Owner {
            owner_id,
            include_unowned: false,
        } => ("owner_id = ?", Some(owner_id.as_str())),
        OwnerScope::Owner {
            owner_id,
            include_unowned: true,
        } => ("(owner_id = ? OR owner_id IS NULL)", Some(owner_id.as_str())),
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog entries.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.get("uuid-here").await?;
/// let (stored, adjustment) = repo
///     .modify("uuid-here", |p| adjust_product(p, None, -3))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    clock: Arc<MonotonicClock>,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool, clock: Arc<MonotonicClock>) -> Self {
        ProductRepository { pool, clock }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Gets an entry by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    /// Gets an entry by ID, failing with `NotFound` if absent.
    pub async fn get_required(&self, id: &str) -> DbResult<Product> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Lists entries visible in the scope, oldest first.
    pub async fn list(&self, scope: &OwnerScope) -> DbResult<Vec<Product>> {
        let (predicate, owner) = scope_filter(scope);
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE {predicate} ORDER BY created_at, id"
        );

        let mut query = sqlx::query_as::<_, ProductRow>(&sql);
        if let Some(owner) = owner {
            query = query.bind(owner);
        }
        decode_all(query.fetch_all(&self.pool).await?)
    }

    /// Lists exactly one owner's entries (`None` = unowned entries), oldest
    /// first. Used as the dedup snapshot for creates and imports.
    pub async fn list_owned_by(&self, owner_id: Option<&str>) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE owner_id IS ? ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        decode_all(rows)
    }

    /// Entries created or modified strictly after `since_ms`, in the scope.
    pub async fn changed_since(&self, scope: &OwnerScope, since_ms: i64) -> DbResult<Vec<Product>> {
        let (predicate, owner) = scope_filter(scope);
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE {predicate} AND (updated_at > ? OR created_at > ?) \
             ORDER BY updated_at, id"
        );

        let mut query = sqlx::query_as::<_, ProductRow>(&sql);
        if let Some(owner) = owner {
            query = query.bind(owner);
        }
        let rows = query
            .bind(since_ms)
            .bind(since_ms)
            .fetch_all(&self.pool)
            .await?;

        debug!(since_ms, count = rows.len(), "Loaded changed products");
        decode_all(rows)
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Inserts a new entry.
    ///
    /// `version`, `created_at` and `updated_at` are assigned here; whatever the
    /// caller put in them is ignored.
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        let now = self.clock.now_ms();
        let variants = serde_json::to_string(&product.variants)?;
        let images = serde_json::to_string(&product.images)?;

        sqlx::query(
            "INSERT INTO products (id, owner_id, name, code, catalog_number, barcode, \
             price_cents, base_price_cents, markup_bps, currency, on_hand, lifetime_max, \
             category_id, images, visible, variants, version, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(&product.id)
        .bind(&product.owner_id)
        .bind(&product.name)
        .bind(&product.code)
        .bind(&product.catalog_number)
        .bind(&product.barcode)
        .bind(product.price_cents)
        .bind(product.base_price_cents)
        .bind(i64::from(product.markup_bps))
        .bind(&product.currency)
        .bind(product.on_hand)
        .bind(product.lifetime_max)
        .bind(&product.category_id)
        .bind(images)
        .bind(product.visible)
        .bind(variants)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(product_id = %product.id, "Product inserted");

        let mut stored = product.clone();
        stored.version = 1;
        stored.created_at = from_millis(now);
        stored.updated_at = stored.created_at;
        Ok(stored)
    }

    /// Stores `product` if its `version` is still the stored one.
    ///
    /// ## Returns
    /// * `Ok(product)` - stored, with `version + 1` and a fresh `updated_at`
    /// * `Err(Conflict)` - the row moved on since `product` was read
    /// * `Err(NotFound)` - the row is gone
    pub async fn update_if_version(&self, product: &Product) -> DbResult<Product> {
        let now = self.clock.now_ms();
        let variants = serde_json::to_string(&product.variants)?;
        let images = serde_json::to_string(&product.images)?;

        let result = sqlx::query(
            "UPDATE products SET name = ?, code = ?, catalog_number = ?, barcode = ?, \
             price_cents = ?, base_price_cents = ?, markup_bps = ?, currency = ?, on_hand = ?, \
             lifetime_max = ?, category_id = ?, images = ?, visible = ?, variants = ?, \
             version = version + 1, updated_at = ? \
             WHERE id = ? AND version = ?",
        )
        .bind(&product.name)
        .bind(&product.code)
        .bind(&product.catalog_number)
        .bind(&product.barcode)
        .bind(product.price_cents)
        .bind(product.base_price_cents)
        .bind(i64::from(product.markup_bps))
        .bind(&product.currency)
        .bind(product.on_hand)
        .bind(product.lifetime_max)
        .bind(&product.category_id)
        .bind(images)
        .bind(product.visible)
        .bind(variants)
        .bind(now)
        .bind(&product.id)
        .bind(product.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get(&product.id).await? {
                Some(_) => Err(DbError::conflict("Product", &product.id)),
                None => Err(DbError::not_found("Product", &product.id)),
            };
        }

        let mut stored = product.clone();
        stored.version = product.version + 1;
        stored.updated_at = from_millis(now);
        Ok(stored)
    }

    /// Read-modify-write with a version precondition.
    ///
    /// `f` is applied to a freshly read copy on every attempt, so it must be
    /// a pure function of the product it is given. An `Err` from `f` aborts
    /// without writing.
    pub async fn modify<T, E, F>(&self, id: &str, mut f: F) -> Result<(Product, T), E>
    where
        F: FnMut(&mut Product) -> Result<T, E>,
        E: From<DbError>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut product = self.get_required(id).await?;
            let output = f(&mut product)?;

            match self.update_if_version(&product).await {
                Ok(stored) => return Ok((stored, output)),
                Err(DbError::Conflict { .. }) => {
                    debug!(product_id = %id, attempt, "Version conflict, retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }

        warn!(product_id = %id, attempts = MAX_WRITE_ATTEMPTS, "Giving up on contended product");
        Err(DbError::conflict("Product", id).into())
    }

    /// Deletes an entry and writes its tombstone in one transaction.
    ///
    /// Returns the deleted entry together with the tombstone.
    pub async fn delete_with_tombstone(&self, id: &str) -> DbResult<(Product, Tombstone)> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;
        let product = Product::try_from(row)?;

        sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted_at = self.clock.now_ms();
        sqlx::query(
            "INSERT OR IGNORE INTO deleted_products (product_id, owner_id, deleted_at) \
             VALUES (?, ?, ?)",
        )
        .bind(id)
        .bind(product.owner_id.as_deref().unwrap_or(""))
        .bind(deleted_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(product_id = %id, "Product deleted, tombstone written");

        let tombstone = Tombstone {
            product_id: product.id.clone(),
            owner_id: product.owner_id.clone(),
            deleted_at: from_millis(deleted_at),
        };
        Ok((product, tombstone))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::Utc;
    use stockroom_core::stock::adjust_product;
    use stockroom_core::{CoreError, Markup, Money, ProductDraft};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn sample(id: &str, owner: Option<&str>, name: &str) -> Product {
        let draft = ProductDraft {
            name: name.to_string(),
            code: Some("10001".to_string()),
            catalog_number: None,
            barcode: None,
            base_price: Money::from_cents(1000),
            price: Money::from_cents(1250),
            markup: Markup::from_bps(2500),
            currency: "EUR".to_string(),
            on_hand: 10,
            category_id: None,
            images: vec!["img/1.png".to_string()],
            visible: true,
        };
        let variant = draft.clone().into_variant(format!("{id}-v1"));
        Product::from_draft(
            id.to_string(),
            owner.map(str::to_string),
            draft,
            vec![variant],
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let db = setup().await;
        let repo = db.products();

        let stored = repo.insert(&sample("p1", Some("a"), "Brake Pad Front")).await.unwrap();
        let fetched = repo.get("p1").await.unwrap().unwrap();

        assert_eq!(fetched, stored);
        assert_eq!(fetched.variants.len(), 1);
        assert_eq!(fetched.images, vec!["img/1.png".to_string()]);
        assert_eq!(fetched.version, 1);
    }

    #[tokio::test]
    async fn test_update_rejects_stale_version() {
        let db = setup().await;
        let repo = db.products();
        let stored = repo.insert(&sample("p1", Some("a"), "Brake Pad Front")).await.unwrap();

        let mut first = stored.clone();
        first.on_hand = 3;
        let updated = repo.update_if_version(&first).await.unwrap();
        assert_eq!(updated.version, 2);
        assert!(updated.updated_at > stored.updated_at);

        let mut stale = stored.clone();
        stale.on_hand = 99;
        let err = repo.update_if_version(&stale).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));

        assert_eq!(repo.get_required("p1").await.unwrap().on_hand, 3);
    }

    #[tokio::test]
    async fn test_modify_applies_core_rule() {
        let db = setup().await;
        let repo = db.products();
        repo.insert(&sample("p1", Some("a"), "Brake Pad Front")).await.unwrap();

        let (stored, adjustment) = repo
            .modify("p1", |p| adjust_product(p, None, 5).map_err(DbErrorOrCore::Core))
            .await
            .unwrap();

        assert_eq!(adjustment.on_hand, 15);
        assert_eq!(stored.lifetime_max, Some(15));
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_modify_error_from_closure_writes_nothing() {
        let db = setup().await;
        let repo = db.products();
        repo.insert(&sample("p1", Some("a"), "Brake Pad Front")).await.unwrap();

        let result = repo
            .modify("p1", |p| adjust_product(p, Some(9), 5).map_err(DbErrorOrCore::Core))
            .await;

        assert!(matches!(
            result,
            Err(DbErrorOrCore::Core(CoreError::VariantNotFound { .. }))
        ));
        assert_eq!(repo.get_required("p1").await.unwrap().version, 1);
    }

    /// Runs `fut` to completion from inside a synchronous `modify` closure.
    fn block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
    }

    fn variant_named(name: &str) -> Variant {
        ProductDraft {
            name: name.to_string(),
            code: None,
            catalog_number: None,
            barcode: None,
            base_price: Money::from_cents(1000),
            price: Money::from_cents(1250),
            markup: Markup::from_bps(2500),
            currency: "EUR".to_string(),
            on_hand: 1,
            category_id: None,
            images: vec![],
            visible: true,
        }
        .into_variant(uuid::Uuid::new_v4().to_string())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_modify_retries_after_concurrent_append() {
        let db = setup().await;
        let repo = db.products();
        repo.insert(&sample("p1", Some("a"), "Brake Pad Front")).await.unwrap();

        let mut calls = 0;
        let (stored, ()) = repo
            .modify("p1", |p| -> DbResult<()> {
                calls += 1;
                if calls == 1 {
                    // Another writer appends between our read and our write.
                    block_on(db.products().modify("p1", |q| -> DbResult<()> {
                        q.variants.push(variant_named("Brake Pad Rear"));
                        Ok(())
                    }))?;
                }
                p.variants.push(variant_named("Brake Pad Ceramic"));
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(stored.version, 3);
        let names: Vec<_> = repo
            .get_required("p1")
            .await
            .unwrap()
            .variants
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, vec!["Brake Pad Front", "Brake Pad Rear", "Brake Pad Ceramic"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_modify_gives_up_after_max_attempts() {
        let db = setup().await;
        let repo = db.products();
        repo.insert(&sample("p1", Some("a"), "Brake Pad Front")).await.unwrap();

        let mut calls = 0;
        let result = repo
            .modify("p1", |p| -> DbResult<()> {
                calls += 1;
                // Every attempt loses the race.
                let fresh = block_on(db.products().get_required("p1"))?;
                block_on(db.products().update_if_version(&fresh))?;
                p.on_hand = 0;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(DbError::Conflict { .. })));
        assert_eq!(calls, MAX_WRITE_ATTEMPTS);
        let stored = repo.get_required("p1").await.unwrap();
        assert_eq!(stored.on_hand, 10);
        assert_eq!(stored.version, 1 + i64::from(MAX_WRITE_ATTEMPTS));
    }

    #[tokio::test]
    async fn test_changed_since_scopes_by_owner() {
        let db = setup().await;
        let repo = db.products();
        let before = db.clock().now_ms();

        repo.insert(&sample("p1", Some("a"), "A One")).await.unwrap();
        repo.insert(&sample("p2", Some("b"), "B One")).await.unwrap();
        repo.insert(&sample("p3", None, "Legacy One")).await.unwrap();

        let owner_a = OwnerScope::resolve(Some("a"), None, None);
        let ids: Vec<_> = repo
            .changed_since(&owner_a, before)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p1"]);

        let super_a = OwnerScope::resolve(Some("a"), Some("+1"), Some("+1"));
        assert_eq!(repo.changed_since(&super_a, before).await.unwrap().len(), 2);
        assert_eq!(repo.changed_since(&OwnerScope::All, before).await.unwrap().len(), 3);

        let after = db.clock().now_ms();
        assert!(repo.changed_since(&OwnerScope::All, after).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_owned_by_matches_null_owner() {
        let db = setup().await;
        let repo = db.products();
        repo.insert(&sample("p1", Some("a"), "A One")).await.unwrap();
        repo.insert(&sample("p2", None, "Legacy One")).await.unwrap();

        let unowned = repo.list_owned_by(None).await.unwrap();
        assert_eq!(unowned.len(), 1);
        assert_eq!(unowned[0].id, "p2");
        assert_eq!(repo.list_owned_by(Some("a")).await.unwrap()[0].id, "p1");
    }

    #[tokio::test]
    async fn test_delete_writes_tombstone_atomically() {
        let db = setup().await;
        let repo = db.products();
        repo.insert(&sample("p1", Some("a"), "Brake Pad Front")).await.unwrap();

        let (deleted, tombstone) = repo.delete_with_tombstone("p1").await.unwrap();
        assert_eq!(deleted.id, "p1");
        assert_eq!(tombstone.owner_id.as_deref(), Some("a"));
        assert!(repo.get("p1").await.unwrap().is_none());

        let err = repo.delete_with_tombstone("p1").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    /// Error type for closures that mix core and db failures.
    #[derive(Debug)]
    enum DbErrorOrCore {
        Db(DbError),
        Core(CoreError),
    }

    impl From<DbError> for DbErrorOrCore {
        fn from(err: DbError) -> Self {
            DbErrorOrCore::Db(err)
        }
    }
}
