//! # Category Repository
//!
//! Read side of categories: the import planner resolves row labels against
//! these. Category management itself lives outside this service.

use std::sync::Arc;

use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use stockroom_core::Category;

use crate::clock::MonotonicClock;
use crate::error::DbResult;

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: String,
    owner_id: Option<String>,
    name: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
        }
    }
}

/// Repository for categories.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
    clock: Arc<MonotonicClock>,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool, clock: Arc<MonotonicClock>) -> Self {
        CategoryRepository { pool, clock }
    }

    /// Categories usable by an owner: its own plus the shared (unowned) ones.
    pub async fn list_for_owner(&self, owner_id: Option<&str>) -> DbResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, owner_id, name FROM categories \
             WHERE owner_id IS ? OR owner_id IS NULL ORDER BY created_at, id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Inserts a category (used by seeding and tests).
    pub async fn insert(&self, owner_id: Option<&str>, name: &str) -> DbResult<Category> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO categories (id, owner_id, name, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(owner_id)
            .bind(name)
            .bind(self.clock.now_ms())
            .execute(&self.pool)
            .await?;

        Ok(Category {
            id,
            owner_id: owner_id.map(str::to_string),
            name: name.to_string(),
        })
    }
}
