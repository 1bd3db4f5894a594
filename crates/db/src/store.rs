//! The [`HookStore`] seam and its implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sendhooks_core::hook::HookRecord;
use tokio::sync::RwLock;

use crate::repositories::HookRepo;
use crate::DbPool;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be mapped back into a [`HookRecord`].
    #[error("Invalid stored row: {0}")]
    InvalidRow(String),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Result of [`HookStore::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The record was inserted.
    Created(HookRecord),
    /// A record with the same id already existed; it is returned unchanged.
    Existing(HookRecord),
}

impl CreateOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

/// Storage for hook outcome records.
///
/// `create` is idempotent on `id`: replaying the same stream entry never
/// produces a second record.
#[async_trait]
pub trait HookStore: Send + Sync {
    async fn create(&self, record: HookRecord) -> Result<CreateOutcome, StoreError>;

    async fn find_all(&self) -> Result<Vec<HookRecord>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<HookRecord>, StoreError>;

    /// Cheap reachability check for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: HookStore + ?Sized> HookStore for Arc<T> {
    async fn create(&self, record: HookRecord) -> Result<CreateOutcome, StoreError> {
        (**self).create(record).await
    }

    async fn find_all(&self) -> Result<Vec<HookRecord>, StoreError> {
        (**self).find_all().await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<HookRecord>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        (**self).ping().await
    }
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// [`HookStore`] backed by the `hooks` table.
#[derive(Clone)]
pub struct PgHookStore {
    pool: DbPool,
}

impl PgHookStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HookStore for PgHookStore {
    async fn create(&self, record: HookRecord) -> Result<CreateOutcome, StoreError> {
        if let Some(row) = HookRepo::insert_if_absent(&self.pool, &record).await? {
            return Ok(CreateOutcome::Created(
                row.try_into().map_err(StoreError::InvalidRow)?,
            ));
        }

        // Lost the insert to an earlier delivery of the same entry.
        let existing = HookRepo::find_by_id(&self.pool, &record.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        Ok(CreateOutcome::Existing(
            existing.try_into().map_err(StoreError::InvalidRow)?,
        ))
    }

    async fn find_all(&self) -> Result<Vec<HookRecord>, StoreError> {
        HookRepo::list(&self.pool)
            .await?
            .into_iter()
            .map(|row| HookRecord::try_from(row).map_err(StoreError::InvalidRow))
            .collect()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<HookRecord>, StoreError> {
        HookRepo::find_by_id(&self.pool, id)
            .await?
            .map(|row| HookRecord::try_from(row).map_err(StoreError::InvalidRow))
            .transpose()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// [`HookStore`] holding records in process memory.
#[derive(Default)]
pub struct MemoryHookStore {
    records: RwLock<HashMap<String, HookRecord>>,
}

impl MemoryHookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl HookStore for MemoryHookStore {
    async fn create(&self, record: HookRecord) -> Result<CreateOutcome, StoreError> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&record.id) {
            return Ok(CreateOutcome::Existing(existing.clone()));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(CreateOutcome::Created(record))
    }

    async fn find_all(&self) -> Result<Vec<HookRecord>, StoreError> {
        let mut all: Vec<HookRecord> = self.records.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<HookRecord>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use sendhooks_core::hook::HookStatus;

    fn record(id: &str, hour: u32) -> HookRecord {
        HookRecord {
            id: id.into(),
            status: HookStatus::Success,
            created: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            delivered: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn create_then_find_by_id() {
        let store = MemoryHookStore::new();
        let outcome = store.create(record("5-0", 0)).await.unwrap();
        assert!(outcome.is_created());

        let found = store.find_by_id("5-0").await.unwrap();
        assert_eq!(found, Some(record("5-0", 0)));
    }

    #[tokio::test]
    async fn create_is_idempotent_on_id() {
        let store = MemoryHookStore::new();
        store.create(record("1-0", 1)).await.unwrap();

        let mut replay = record("1-0", 9);
        replay.status = HookStatus::Failed;
        let outcome = store.create(replay).await.unwrap();

        assert_matches!(&outcome, CreateOutcome::Existing(r) if r.status == HookStatus::Success);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn find_by_missing_id_is_none() {
        let store = MemoryHookStore::new();
        assert_eq!(store.find_by_id("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn find_all_orders_by_created() {
        let store = MemoryHookStore::new();
        store.create(record("3-0", 3)).await.unwrap();
        store.create(record("1-0", 1)).await.unwrap();
        store.create(record("2-0", 2)).await.unwrap();

        let ids: Vec<String> = store
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, ["1-0", "2-0", "3-0"]);
    }

    #[tokio::test]
    async fn arc_store_delegates() {
        let store: Arc<dyn HookStore> = Arc::new(MemoryHookStore::new());
        store.create(record("1-0", 1)).await.unwrap();
        assert_eq!(store.find_all().await.unwrap().len(), 1);
        store.ping().await.unwrap();
    }
}
