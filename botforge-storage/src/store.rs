//! Cache-aside store for bot configurations.

use botforge_core::{bot_context, BotConfig, BotError, BotRecord, BotResult, MAIN_VERSION};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{config_key, CacheBackend, KeyTtl};
use crate::repository::ConfigRepository;

/// Tuning for the volatile config cache.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Expiry applied when the store writes or re-arms a timed cache entry.
    pub cache_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

/// Cache-aside facade over the durable repository.
///
/// Only the main version of a bot is cached; snapshot reads always hit the
/// repository. The cached payload is the serialized [`BotConfig`], so
/// ownership can be checked after a cache hit without touching the store.
///
/// Read path invariants:
/// - a hit on a timed entry re-arms its expiry (sliding window); entries
///   without expiry are never given one
/// - an expired entry is a miss, never stale data
/// - a miss falls through to the repository and populates the cache on hit
///
/// Writes go to the repository first; the cache is only ever refreshed or
/// dropped afterwards, never written ahead of the durable store.
pub struct ConfigStore {
    cache: Arc<dyn CacheBackend>,
    repo: Arc<dyn ConfigRepository>,
    config: StoreConfig,
}

impl ConfigStore {
    pub fn new(
        cache: Arc<dyn CacheBackend>,
        repo: Arc<dyn ConfigRepository>,
        config: StoreConfig,
    ) -> Self {
        Self { cache, repo, config }
    }

    // ========================================================================
    // READ PATH
    // ========================================================================

    /// Retrieve the configuration of `(tenant_id, bot_id)` at `version`.
    ///
    /// With `allow_cross_tenant` the ownership check is skipped; runtime
    /// consumers use this to read configs of bots they were granted access
    /// to. Absence and ownership mismatch are both reported as `NotFound`.
    pub async fn pull(
        &self,
        tenant_id: &str,
        bot_id: &str,
        version: &str,
        allow_cross_tenant: bool,
    ) -> BotResult<BotConfig> {
        let config = if version == MAIN_VERSION {
            match self.read_cache(bot_id).await? {
                Some(config) => Some(config),
                None => {
                    self.read_store(tenant_id, bot_id, version, allow_cross_tenant)
                        .await?
                }
            }
        } else {
            self.read_store(tenant_id, bot_id, version, allow_cross_tenant)
                .await?
        };

        let config = config.ok_or_else(|| {
            BotError::not_found(format!(
                "{} version:{version}",
                bot_context(tenant_id, bot_id)
            ))
        })?;
        if !allow_cross_tenant && config.tenant_id != tenant_id {
            return Err(BotError::not_found(bot_context(tenant_id, bot_id)));
        }
        Ok(config)
    }

    /// Read the cached main config, re-arming a timed entry's expiry.
    async fn read_cache(&self, bot_id: &str) -> BotResult<Option<BotConfig>> {
        let key = config_key(bot_id);
        let Some(raw) = self.cache.get(&key).await? else {
            return Ok(None);
        };
        if let Some(KeyTtl::Expires(_)) = self.cache.ttl(&key).await? {
            self.write_cache(&key, &raw, Some(self.config.cache_ttl))
                .await?;
        }
        let config = serde_json::from_str(&raw)
            .map_err(|err| BotError::data_corruption(format!("key:{key} {err}")))?;
        Ok(Some(config))
    }

    /// Read from the repository, populating the cache for main records.
    async fn read_store(
        &self,
        tenant_id: &str,
        bot_id: &str,
        version: &str,
        allow_cross_tenant: bool,
    ) -> BotResult<Option<BotConfig>> {
        let owner = (!allow_cross_tenant).then_some(tenant_id);
        let Some(record) = self.repo.find(bot_id, owner, Some(version)).await? else {
            return Ok(None);
        };
        let config = record.config();
        if record.is_main() {
            let raw = self.encode(&config)?;
            self.write_cache(&config_key(bot_id), &raw, Some(self.config.cache_ttl))
                .await?;
        }
        Ok(Some(config))
    }

    // ========================================================================
    // WRITE PATH
    // ========================================================================

    /// Create the main version of a new bot. Fails with `AlreadyExists` when
    /// a main version for this bot id is visible in cache or store.
    pub async fn add(&self, config: &BotConfig) -> BotResult<()> {
        let ctx = bot_context(&config.tenant_id, &config.bot_id);
        if self.current_main(&config.tenant_id, &config.bot_id).await?.is_some() {
            return Err(BotError::already_exists(ctx));
        }
        self.repo.insert(&BotRecord::new_main(config)).await
    }

    /// Overwrite the main version's mutable fields.
    ///
    /// An existing cache entry is refreshed in place, keeping its expiry
    /// class. A missing entry is never created here.
    pub async fn update(&self, config: &BotConfig) -> BotResult<()> {
        let tenant_id = &config.tenant_id;
        let bot_id = &config.bot_id;
        let ctx = bot_context(tenant_id, bot_id);

        let current = self
            .current_main(tenant_id, bot_id)
            .await?
            .ok_or_else(|| BotError::not_found(ctx.clone()))?;
        if current.tenant_id != *tenant_id {
            return Err(BotError::not_found(ctx));
        }

        let mut record = self
            .repo
            .find(bot_id, Some(tenant_id), Some(MAIN_VERSION))
            .await?
            .ok_or_else(|| BotError::not_found(ctx))?;
        record.apply_config(config);
        self.repo.update(&record).await?;
        self.refresh_cache(bot_id, &record.config()).await
    }

    /// Delete every version of `(tenant_id, bot_id)`.
    ///
    /// Refused while any platform bit is set. Returns the number of rows
    /// removed.
    pub async fn delete(&self, tenant_id: &str, bot_id: &str) -> BotResult<u64> {
        let ctx = bot_context(tenant_id, bot_id);

        let current = self
            .current_main(tenant_id, bot_id)
            .await?
            .ok_or_else(|| BotError::not_found(format!("{ctx} version:{MAIN_VERSION}")))?;
        if current.tenant_id != tenant_id {
            return Err(BotError::not_found(ctx));
        }

        if let Some(record) = self
            .repo
            .find(bot_id, Some(tenant_id), Some(MAIN_VERSION))
            .await?
        {
            if record.publish_status.is_published() {
                return Err(BotError::DeletePublished {
                    context: format!("{ctx} publish_status:{}", record.publish_status),
                });
            }
        }

        let removed = self.repo.delete_versions(tenant_id, bot_id).await?;
        self.drop_cache(bot_id).await?;
        Ok(removed)
    }

    /// Drop the cached main config unconditionally. Used after publish
    /// transitions; absence is fine.
    pub async fn invalidate(&self, bot_id: &str) -> BotResult<()> {
        self.cache.delete(&config_key(bot_id)).await
    }

    // ========================================================================
    // CACHE MAINTENANCE
    // ========================================================================

    /// The visible main config, cache first, then store.
    async fn current_main(&self, tenant_id: &str, bot_id: &str) -> BotResult<Option<BotConfig>> {
        match self.read_cache(bot_id).await? {
            Some(config) => Ok(Some(config)),
            None => self.read_store(tenant_id, bot_id, MAIN_VERSION, false).await,
        }
    }

    /// Overwrite an existing cache entry with `config`, preserving its
    /// expiry class: persistent entries stay persistent, timed entries get
    /// a fresh full window.
    async fn refresh_cache(&self, bot_id: &str, config: &BotConfig) -> BotResult<()> {
        let key = config_key(bot_id);
        let ttl = match self.cache.ttl(&key).await? {
            Some(KeyTtl::Persistent) => None,
            Some(KeyTtl::Expires(_)) => Some(self.config.cache_ttl),
            None => return Ok(()),
        };
        let raw = self.encode(config)?;
        self.write_cache(&key, &raw, ttl).await
    }

    async fn drop_cache(&self, bot_id: &str) -> BotResult<()> {
        let key = config_key(bot_id);
        if self.cache.get(&key).await?.is_some() {
            self.cache
                .delete(&key)
                .await
                .map_err(|err| BotError::CacheDeleteFailed {
                    context: format!("key:{key} {err}"),
                })?;
        }
        Ok(())
    }

    async fn write_cache(&self, key: &str, raw: &str, ttl: Option<Duration>) -> BotResult<()> {
        self.cache
            .set(key, raw, ttl)
            .await
            .map_err(|err| BotError::CacheWriteFailed {
                context: format!("key:{key} {err}"),
            })
    }

    fn encode(&self, config: &BotConfig) -> BotResult<String> {
        serde_json::to_string(config).map_err(|err| {
            BotError::internal(format!(
                "{} serialize: {err}",
                bot_context(&config.tenant_id, &config.bot_id)
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheBackend;
    use crate::repository::MemoryRepository;

    struct Fixture {
        cache: Arc<InMemoryCacheBackend>,
        repo: Arc<MemoryRepository>,
        store: ConfigStore,
    }

    fn fixture() -> Fixture {
        let cache = Arc::new(InMemoryCacheBackend::new());
        let repo = Arc::new(MemoryRepository::new());
        let store = ConfigStore::new(cache.clone(), repo.clone(), StoreConfig::default());
        Fixture { cache, repo, store }
    }

    fn config(tenant: &str, bot: &str) -> BotConfig {
        BotConfig {
            tenant_id: tenant.to_string(),
            bot_id: bot.to_string(),
            tool_ids: vec!["tool-a".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn pull_missing_bot_is_not_found() {
        let f = fixture();
        let err = f.store.pull("app-1", "bot-1", MAIN_VERSION, false).await.unwrap_err();
        assert_eq!(err.code(), 40001);
    }

    #[tokio::test]
    async fn second_pull_is_served_from_cache() {
        let f = fixture();
        f.store.add(&config("app-1", "bot-1")).await.unwrap();
        let finds_after_add = f.repo.find_calls();

        let first = f.store.pull("app-1", "bot-1", MAIN_VERSION, false).await.unwrap();
        assert_eq!(first.tool_ids, vec!["tool-a".to_string()]);
        let finds_after_first = f.repo.find_calls();
        assert!(finds_after_first > finds_after_add);

        let second = f.store.pull("app-1", "bot-1", MAIN_VERSION, false).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(f.repo.find_calls(), finds_after_first);
    }

    #[tokio::test]
    async fn foreign_tenant_pull_is_not_found_unless_cross_tenant() {
        let f = fixture();
        f.store.add(&config("app-1", "bot-1")).await.unwrap();

        let err = f.store.pull("app-2", "bot-1", MAIN_VERSION, false).await.unwrap_err();
        assert_eq!(err.code(), 40001);

        let ok = f.store.pull("app-2", "bot-1", MAIN_VERSION, true).await.unwrap();
        assert_eq!(ok.tenant_id, "app-1");
    }

    #[tokio::test]
    async fn cross_tenant_check_applies_to_cache_hits() {
        let f = fixture();
        f.store.add(&config("app-1", "bot-1")).await.unwrap();
        // Warm the cache.
        f.store.pull("app-1", "bot-1", MAIN_VERSION, false).await.unwrap();

        let err = f.store.pull("app-2", "bot-1", MAIN_VERSION, false).await.unwrap_err();
        assert_eq!(err.code(), 40001);
    }

    #[tokio::test]
    async fn expired_entry_falls_through_to_store() {
        let f = fixture();
        f.store.add(&config("app-1", "bot-1")).await.unwrap();
        f.store.pull("app-1", "bot-1", MAIN_VERSION, false).await.unwrap();

        f.cache.force_expire(&config_key("bot-1"));
        let finds_before = f.repo.find_calls();
        f.store.pull("app-1", "bot-1", MAIN_VERSION, false).await.unwrap();
        assert!(f.repo.find_calls() > finds_before);
        // Repopulated.
        assert!(f.cache.get(&config_key("bot-1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn corrupt_cache_payload_is_reported() {
        let f = fixture();
        f.cache
            .set(&config_key("bot-1"), "{not json", None)
            .await
            .unwrap();
        let err = f.store.pull("app-1", "bot-1", MAIN_VERSION, false).await.unwrap_err();
        assert_eq!(err.code(), 40003);
    }

    #[tokio::test]
    async fn add_duplicate_main_is_rejected() {
        let f = fixture();
        f.store.add(&config("app-1", "bot-1")).await.unwrap();
        let err = f.store.add(&config("app-1", "bot-1")).await.unwrap_err();
        assert_eq!(err.code(), 40053);
    }

    #[tokio::test]
    async fn duplicate_check_sees_cached_foreign_bot() {
        let f = fixture();
        f.store.add(&config("app-1", "bot-1")).await.unwrap();
        f.store.pull("app-1", "bot-1", MAIN_VERSION, false).await.unwrap();

        // Same bot id under another tenant is still a conflict.
        let err = f.store.add(&config("app-2", "bot-1")).await.unwrap_err();
        assert_eq!(err.code(), 40053);
    }

    #[tokio::test]
    async fn update_refreshes_existing_cache_entry() {
        let f = fixture();
        f.store.add(&config("app-1", "bot-1")).await.unwrap();
        f.store.pull("app-1", "bot-1", MAIN_VERSION, false).await.unwrap();

        let mut changed = config("app-1", "bot-1");
        changed.tool_ids = vec!["tool-b".to_string()];
        f.store.update(&changed).await.unwrap();

        let cached = f.cache.get(&config_key("bot-1")).await.unwrap().unwrap();
        let cached: BotConfig = serde_json::from_str(&cached).unwrap();
        assert_eq!(cached.tool_ids, vec!["tool-b".to_string()]);
    }

    #[tokio::test]
    async fn update_preserves_persistent_entries() {
        let f = fixture();
        f.store.add(&config("app-1", "bot-1")).await.unwrap();
        // Entry pinned without expiry, as an operator might for hot bots.
        let raw = serde_json::to_string(&config("app-1", "bot-1")).unwrap();
        f.cache.set(&config_key("bot-1"), &raw, None).await.unwrap();

        let mut changed = config("app-1", "bot-1");
        changed.tool_ids = vec!["tool-b".to_string()];
        f.store.update(&changed).await.unwrap();

        assert_eq!(
            f.cache.ttl(&config_key("bot-1")).await.unwrap(),
            Some(KeyTtl::Persistent)
        );
    }

    #[tokio::test]
    async fn update_missing_bot_is_not_found() {
        let f = fixture();
        let err = f.store.update(&config("app-1", "bot-1")).await.unwrap_err();
        assert_eq!(err.code(), 40001);
    }

    #[tokio::test]
    async fn delete_removes_all_versions_and_cache() {
        let f = fixture();
        f.store.add(&config("app-1", "bot-1")).await.unwrap();
        f.store.pull("app-1", "bot-1", MAIN_VERSION, false).await.unwrap();

        let removed = f.store.delete("app-1", "bot-1").await.unwrap();
        assert_eq!(removed, 1);
        assert!(f.cache.get(&config_key("bot-1")).await.unwrap().is_none());

        let err = f.store.pull("app-1", "bot-1", MAIN_VERSION, false).await.unwrap_err();
        assert_eq!(err.code(), 40001);
    }

    #[tokio::test]
    async fn delete_foreign_bot_is_not_found() {
        let f = fixture();
        f.store.add(&config("app-1", "bot-1")).await.unwrap();
        let err = f.store.delete("app-2", "bot-1").await.unwrap_err();
        assert_eq!(err.code(), 40001);
    }
}
