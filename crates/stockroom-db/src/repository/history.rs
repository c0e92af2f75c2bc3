//! # History Repository
//!
//! Human-readable edit journal per entry. Point-of-sale deductions and
//! refunds never reach this table.

use std::sync::Arc;

use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use stockroom_core::{HistoryAction, HistoryItem};

use crate::clock::{from_millis, MonotonicClock};
use crate::error::{DbError, DbResult};

#[derive(Debug, FromRow)]
struct HistoryRow {
    id: String,
    owner_id: Option<String>,
    product_id: String,
    product_name: String,
    action: HistoryAction,
    details: String,
    created_at: i64,
}

impl TryFrom<HistoryRow> for HistoryItem {
    type Error = DbError;

    fn try_from(row: HistoryRow) -> DbResult<Self> {
        Ok(HistoryItem {
            id: row.id,
            owner_id: row.owner_id,
            product_id: row.product_id,
            product_name: row.product_name,
            action: row.action,
            details: serde_json::from_str(&row.details)
                .map_err(|e| DbError::corrupt("product_history.details", e))?,
            created_at: from_millis(row.created_at),
        })
    }
}

/// What to journal. Id and timestamp are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewHistoryItem<'a> {
    pub owner_id: Option<&'a str>,
    pub product_id: &'a str,
    pub product_name: &'a str,
    pub action: HistoryAction,
    pub details: serde_json::Value,
}

/// Repository for the edit journal.
#[derive(Debug, Clone)]
pub struct HistoryRepository {
    pool: SqlitePool,
    clock: Arc<MonotonicClock>,
}

impl HistoryRepository {
    /// Creates a new HistoryRepository.
    pub fn new(pool: SqlitePool, clock: Arc<MonotonicClock>) -> Self {
        HistoryRepository { pool, clock }
    }

    /// Appends one journal item.
    pub async fn record(&self, item: NewHistoryItem<'_>) -> DbResult<HistoryItem> {
        let id = Uuid::new_v4().to_string();
        let now = self.clock.now_ms();
        let details = serde_json::to_string(&item.details)?;

        sqlx::query(
            "INSERT INTO product_history (id, owner_id, product_id, product_name, action, details, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(item.owner_id)
        .bind(item.product_id)
        .bind(item.product_name)
        .bind(item.action)
        .bind(details)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(
            product_id = %item.product_id,
            action = item.action.as_str(),
            "History recorded"
        );

        Ok(HistoryItem {
            id,
            owner_id: item.owner_id.map(str::to_string),
            product_id: item.product_id.to_string(),
            product_name: item.product_name.to_string(),
            action: item.action,
            details: item.details,
            created_at: from_millis(now),
        })
    }

    /// Journal of one entry, newest first.
    pub async fn for_product(&self, product_id: &str, limit: u32) -> DbResult<Vec<HistoryItem>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT id, owner_id, product_id, product_name, action, details, created_at \
             FROM product_history WHERE product_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(product_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HistoryItem::try_from).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
