//! # Tombstone Repository
//!
//! Deletion markers, kept apart from the catalog so delta sync can report
//! deletions without rescanning anything.
//!
//! ```text
//!   products ──DELETE (same tx)──▶ deleted_products
//!                                   (product_id, owner_id) PK
//!                                   deleted_at
//!                                        │
//!                 deleted_since(scope, C)│ purge_older_than(now - 30d)
//!                                        ▼
//!                               delta sync / retention sweep
//! ```
//!
//! Rows are written by [`ProductRepository::delete_with_tombstone`] only.
//!
//! [`ProductRepository::delete_with_tombstone`]: crate::repository::product::ProductRepository::delete_with_tombstone

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use stockroom_core::delta::OwnerScope;
use stockroom_core::Tombstone;

use crate::clock::from_millis;
use crate::error::DbResult;

#[derive(Debug, FromRow)]
struct TombstoneRow {
    product_id: String,
    owner_id: String,
    deleted_at: i64,
}

impl From<TombstoneRow> for Tombstone {
    fn from(row: TombstoneRow) -> Self {
        Tombstone {
            product_id: row.product_id,
            owner_id: Some(row.owner_id).filter(|o| !o.is_empty()),
            deleted_at: from_millis(row.deleted_at),
        }
    }
}

/// Repository for deletion tombstones.
#[derive(Debug, Clone)]
pub struct TombstoneRepository {
    pool: SqlitePool,
}

impl TombstoneRepository {
    /// Creates a new TombstoneRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TombstoneRepository { pool }
    }

    /// Tombstones written strictly after `since_ms`, in the scope, oldest first.
    pub async fn deleted_since(&self, scope: &OwnerScope, since_ms: i64) -> DbResult<Vec<Tombstone>> {
        let (predicate, owner) = match scope {
            OwnerScope::All => ("1 = 1", None),
            OwnerScope::Owner {
                owner_id,
                include_unowned: false,
            } => ("owner_id = ?", Some(owner_id.as_str())),
            OwnerScope::Owner {
                owner_id,
                include_unowned: true,
            } => ("(owner_id = ? OR owner_id = '')", Some(owner_id.as_str())),
        };

        let sql = format!(
            "SELECT product_id, owner_id, deleted_at FROM deleted_products \
             WHERE {predicate} AND deleted_at > ? ORDER BY deleted_at, product_id"
        );

        let mut query = sqlx::query_as::<_, TombstoneRow>(&sql);
        if let Some(owner) = owner {
            query = query.bind(owner);
        }
        let rows = query.bind(since_ms).fetch_all(&self.pool).await?;

        debug!(since_ms, count = rows.len(), "Loaded tombstones");
        Ok(rows.into_iter().map(Tombstone::from).collect())
    }

    /// Deletes tombstones older than `cutoff`. Returns how many were removed.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM deleted_products WHERE deleted_at < ?")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            info!(purged, cutoff = %cutoff, "Purged expired tombstones");
        }
        Ok(purged)
    }

    /// Number of tombstones currently stored.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deleted_products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
