//! Repository for the `hooks` table.

use sendhooks_core::hook::HookRecord;
use sqlx::PgPool;

use crate::models::hook::HookRow;

/// Column list for hooks queries.
const COLUMNS: &str = "id, status, created, delivered, error, recorded_at";

/// Provides data-access methods for hook outcome records.
pub struct HookRepo;

impl HookRepo {
    /// Insert a record unless one with the same id already exists.
    ///
    /// Returns `None` when the id was already present; the existing row is
    /// left untouched.
    pub async fn insert_if_absent(
        pool: &PgPool,
        record: &HookRecord,
    ) -> Result<Option<HookRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO hooks (id, status, created, delivered, error)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HookRow>(&query)
            .bind(&record.id)
            .bind(record.status.as_str())
            .bind(record.created)
            .bind(record.delivered)
            .bind(&record.error)
            .fetch_optional(pool)
            .await
    }

    /// Find a record by its stream entry id.
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<HookRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM hooks WHERE id = $1");
        sqlx::query_as::<_, HookRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all records, oldest `created` first.
    pub async fn list(pool: &PgPool) -> Result<Vec<HookRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM hooks ORDER BY created ASC, id ASC");
        sqlx::query_as::<_, HookRow>(&query).fetch_all(pool).await
    }
}
