//! Durable store abstraction for bot configuration records.

use async_trait::async_trait;
use botforge_core::{BotError, BotRecord, BotResult, MAIN_VERSION};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Durable store for [`BotRecord`] rows.
///
/// Soft-deleted rows are invisible to every method. Each mutating method is
/// one transaction in the backing store; cache maintenance never happens
/// here.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Find one non-deleted record for `bot_id`.
    ///
    /// `tenant_id: None` searches across tenants (ownership is then the
    /// caller's problem). `version: None` matches any version, preferring
    /// the main row when several exist.
    async fn find(
        &self,
        bot_id: &str,
        tenant_id: Option<&str>,
        version: Option<&str>,
    ) -> BotResult<Option<BotRecord>>;

    /// Insert a new record.
    async fn insert(&self, record: &BotRecord) -> BotResult<()>;

    /// Overwrite the row identified by `record.record_id`.
    async fn update(&self, record: &BotRecord) -> BotResult<()>;

    /// Persist a publish transition: the updated main row plus an optional
    /// snapshot row (inserted, or overwritten when its `record_id` already
    /// exists), atomically.
    async fn commit_publish(&self, main: &BotRecord, snapshot: Option<&BotRecord>)
        -> BotResult<()>;

    /// Soft-delete every version of `(tenant_id, bot_id)` atomically.
    /// Returns the number of rows affected.
    async fn delete_versions(&self, tenant_id: &str, bot_id: &str) -> BotResult<u64>;
}

// ============================================================================
// IN-MEMORY REPOSITORY
// ============================================================================

/// In-memory repository for tests.
///
/// Counts `find` calls so tests can assert which reads were served from
/// cache and which fell through to the store.
#[derive(Default)]
pub struct MemoryRepository {
    rows: RwLock<Vec<BotRecord>>,
    find_calls: AtomicU64,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `find` has been called.
    pub fn find_calls(&self) -> u64 {
        self.find_calls.load(Ordering::Relaxed)
    }

    /// Total rows, including soft-deleted ones.
    pub fn row_count(&self) -> usize {
        self.rows.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn matches(
        record: &BotRecord,
        bot_id: &str,
        tenant_id: Option<&str>,
        version: Option<&str>,
    ) -> bool {
        !record.deleted
            && record.bot_id == bot_id
            && tenant_id.is_none_or(|t| record.tenant_id == t)
            && version.is_none_or(|v| record.version == v)
    }
}

#[async_trait]
impl ConfigRepository for MemoryRepository {
    async fn find(
        &self,
        bot_id: &str,
        tenant_id: Option<&str>,
        version: Option<&str>,
    ) -> BotResult<Option<BotRecord>> {
        self.find_calls.fetch_add(1, Ordering::Relaxed);
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        let mut candidates = rows
            .iter()
            .filter(|r| Self::matches(r, bot_id, tenant_id, version));
        match version {
            Some(_) => Ok(candidates.next().cloned()),
            None => {
                let candidates: Vec<&BotRecord> = candidates.collect();
                Ok(candidates
                    .iter()
                    .find(|r| r.version == MAIN_VERSION)
                    .or_else(|| candidates.first())
                    .map(|r| (*r).clone()))
            }
        }
    }

    async fn insert(&self, record: &BotRecord) -> BotResult<()> {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        let duplicate = rows.iter().any(|r| {
            !r.deleted
                && r.bot_id == record.bot_id
                && r.tenant_id == record.tenant_id
                && r.version == record.version
        });
        if duplicate {
            return Err(BotError::storage(
                "row already exists",
                format!("bot_id:{} version:{}", record.bot_id, record.version),
            ));
        }
        rows.push(record.clone());
        Ok(())
    }

    async fn update(&self, record: &BotRecord) -> BotResult<()> {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        match rows.iter_mut().find(|r| r.record_id == record.record_id) {
            Some(row) => {
                *row = record.clone();
                Ok(())
            }
            None => Err(BotError::storage(
                "row not found",
                format!("record_id:{}", record.record_id),
            )),
        }
    }

    async fn commit_publish(
        &self,
        main: &BotRecord,
        snapshot: Option<&BotRecord>,
    ) -> BotResult<()> {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        match rows.iter_mut().find(|r| r.record_id == main.record_id) {
            Some(row) => *row = main.clone(),
            None => {
                return Err(BotError::storage(
                    "main row not found",
                    format!("record_id:{}", main.record_id),
                ))
            }
        }
        if let Some(snapshot) = snapshot {
            match rows.iter_mut().find(|r| r.record_id == snapshot.record_id) {
                Some(row) => *row = snapshot.clone(),
                None => rows.push(snapshot.clone()),
            }
        }
        Ok(())
    }

    async fn delete_versions(&self, tenant_id: &str, bot_id: &str) -> BotResult<u64> {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        let mut removed = 0;
        for row in rows
            .iter_mut()
            .filter(|r| !r.deleted && r.tenant_id == tenant_id && r.bot_id == bot_id)
        {
            row.deleted = true;
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botforge_core::BotConfig;

    fn record(tenant: &str, bot: &str) -> BotRecord {
        BotRecord::new_main(&BotConfig {
            tenant_id: tenant.to_string(),
            bot_id: bot.to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn find_filters_by_tenant_and_version() {
        let repo = MemoryRepository::new();
        let main = record("app-1", "bot-1");
        repo.insert(&main).await.unwrap();
        repo.insert(&main.snapshot_as("v1")).await.unwrap();

        let found = repo.find("bot-1", Some("app-1"), Some("v1")).await.unwrap();
        assert_eq!(found.unwrap().version, "v1");

        let foreign = repo.find("bot-1", Some("app-2"), None).await.unwrap();
        assert!(foreign.is_none());

        let cross = repo.find("bot-1", None, None).await.unwrap();
        assert!(cross.is_some());
    }

    #[tokio::test]
    async fn find_without_version_prefers_main() {
        let repo = MemoryRepository::new();
        let main = record("app-1", "bot-1");
        // Snapshot inserted first so plain iteration order would pick it.
        repo.insert(&main.snapshot_as("v1")).await.unwrap();
        repo.insert(&main).await.unwrap();

        let found = repo.find("bot-1", Some("app-1"), None).await.unwrap().unwrap();
        assert!(found.is_main());
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let repo = MemoryRepository::new();
        let main = record("app-1", "bot-1");
        repo.insert(&main).await.unwrap();
        assert!(repo.insert(&record("app-1", "bot-1")).await.is_err());
    }

    #[tokio::test]
    async fn delete_versions_hides_all_rows() {
        let repo = MemoryRepository::new();
        let main = record("app-1", "bot-1");
        repo.insert(&main).await.unwrap();
        repo.insert(&main.snapshot_as("v1")).await.unwrap();
        repo.insert(&record("app-1", "bot-2")).await.unwrap();

        let removed = repo.delete_versions("app-1", "bot-1").await.unwrap();
        assert_eq!(removed, 2);
        assert!(repo.find("bot-1", None, None).await.unwrap().is_none());
        assert!(repo.find("bot-2", None, None).await.unwrap().is_some());
        // Rows are soft-deleted, not dropped.
        assert_eq!(repo.row_count(), 3);
    }

    #[tokio::test]
    async fn commit_publish_upserts_snapshot() {
        let repo = MemoryRepository::new();
        let mut main = record("app-1", "bot-1");
        repo.insert(&main).await.unwrap();

        main.publish_status = main.publish_status.with(botforge_core::Platform::Market);
        let snapshot = main.snapshot_as("v1");
        repo.commit_publish(&main, Some(&snapshot)).await.unwrap();

        let stored = repo.find("bot-1", Some("app-1"), Some("v1")).await.unwrap();
        assert!(stored.unwrap().publish_status.is_published());

        // Same snapshot record overwritten in place.
        let mut again = snapshot.clone();
        again.publish_status = again.publish_status.with(botforge_core::Platform::Voice);
        repo.commit_publish(&main, Some(&again)).await.unwrap();

        let rows_with_v1 = repo.row_count();
        assert_eq!(rows_with_v1, 2);
    }
}
