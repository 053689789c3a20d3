//! Two-tier permission gate for cross-tenant bot access.

use botforge_core::{bot_context, BotError, BotResult, MAIN_VERSION};
use botforge_storage::{decision_key, CacheBackend, ConfigStore, PublishStateMachine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A cached authorization outcome.
///
/// Denials are cached as a sentinel so repeated probes for a pair that was
/// refused do not hammer the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Tuning for the decision cache.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub decision_ttl: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            decision_ttl: Duration::from_secs(3600),
        }
    }
}

/// Decides whether a tenant may read a bot it does not own.
///
/// Resolution order: decision cache, ownership fast path against the config
/// store, then the remote authority. Only authority outcomes are cached,
/// with a TTL; an ownership allow is recomputed per request so it cannot
/// outlive a change of owner. A transient authority failure propagates
/// without caching anything, so the next request retries.
pub struct PermissionGate {
    cache: Arc<dyn CacheBackend>,
    authority: Arc<dyn crate::authority::AuthorityClient>,
    store: Arc<ConfigStore>,
    machine: Arc<PublishStateMachine>,
    config: GateConfig,
}

impl PermissionGate {
    pub fn new(
        cache: Arc<dyn CacheBackend>,
        authority: Arc<dyn crate::authority::AuthorityClient>,
        store: Arc<ConfigStore>,
        machine: Arc<PublishStateMachine>,
        config: GateConfig,
    ) -> Self {
        Self { cache, authority, store, machine, config }
    }

    /// Resolve the access decision for `(tenant_id, bot_id)`.
    pub async fn check(&self, tenant_id: &str, bot_id: &str) -> BotResult<Decision> {
        let key = decision_key(tenant_id, bot_id);
        if let Some(raw) = self.cache.get(&key).await? {
            match serde_json::from_str::<Decision>(&raw) {
                Ok(decision) => return Ok(decision),
                // Unreadable entry: fall through and recompute.
                Err(err) => tracing::warn!(
                    tenant_id,
                    bot_id,
                    error = %err,
                    "discarding unreadable cached decision"
                ),
            }
        }

        if self.owns(tenant_id, bot_id).await? {
            return Ok(Decision::Allow);
        }
        let decision = if self.authority.verify_grant(tenant_id, bot_id).await? {
            Decision::Allow
        } else {
            Decision::Deny
        };
        self.cache_decision(&key, tenant_id, bot_id, decision).await;
        Ok(decision)
    }

    /// Like [`check`](Self::check) but maps a denial to `PermissionDenied`.
    pub async fn verify_access(&self, tenant_id: &str, bot_id: &str) -> BotResult<()> {
        match self.check(tenant_id, bot_id).await? {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(BotError::permission_denied(bot_context(tenant_id, bot_id))),
        }
    }

    /// Bind `tenant_id` to `bot_id` at the authority.
    ///
    /// Only published bots can be bound; the owner check is the authority's
    /// job. A successful bind primes the decision cache with an allow.
    pub async fn bind(&self, tenant_id: &str, bot_id: &str) -> BotResult<()> {
        let ctx = bot_context(tenant_id, bot_id);
        if !self.machine.published_any_tenant(bot_id).await? {
            return Err(BotError::not_published(ctx));
        }
        self.authority.add_grant(tenant_id, bot_id).await?;
        self.cache_decision(
            &decision_key(tenant_id, bot_id),
            tenant_id,
            bot_id,
            Decision::Allow,
        )
        .await;
        tracing::info!(tenant_id, bot_id, "bound tenant to bot");
        Ok(())
    }

    /// Cross-tenant ownership probe. Absence reads as "not the owner".
    async fn owns(&self, tenant_id: &str, bot_id: &str) -> BotResult<bool> {
        match self.store.pull(tenant_id, bot_id, MAIN_VERSION, true).await {
            Ok(config) => Ok(config.tenant_id == tenant_id),
            Err(BotError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Write-back is advisory; the computed decision already stands.
    async fn cache_decision(&self, key: &str, tenant_id: &str, bot_id: &str, decision: Decision) {
        let raw = match serde_json::to_string(&decision) {
            Ok(raw) => raw,
            Err(_) => return,
        };
        if let Err(err) = self
            .cache
            .set(key, &raw, Some(self.config.decision_ttl))
            .await
        {
            tracing::warn!(tenant_id, bot_id, error = %err, "failed to cache decision");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use botforge_core::{BotConfig, Platform};
    use botforge_storage::{InMemoryCacheBackend, MemoryRepository, StoreConfig};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    struct StaticAuthority {
        grants: Mutex<HashSet<(String, String)>>,
        calls: AtomicU64,
        fail: std::sync::atomic::AtomicBool,
    }

    impl StaticAuthority {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                grants: Mutex::new(HashSet::new()),
                calls: AtomicU64::new(0),
                fail: std::sync::atomic::AtomicBool::new(false),
            })
        }

        fn grant(&self, tenant: &str, bot: &str) {
            self.grants
                .lock()
                .unwrap()
                .insert((tenant.to_string(), bot.to_string()));
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::Relaxed)
        }

        fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::Relaxed);
        }
    }

    #[async_trait]
    impl crate::authority::AuthorityClient for StaticAuthority {
        async fn verify_grant(&self, tenant_id: &str, bot_id: &str) -> BotResult<bool> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail.load(Ordering::Relaxed) {
                return Err(BotError::upstream_unavailable("authority down"));
            }
            Ok(self
                .grants
                .lock()
                .unwrap()
                .contains(&(tenant_id.to_string(), bot_id.to_string())))
        }

        async fn add_grant(&self, tenant_id: &str, bot_id: &str) -> BotResult<()> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(BotError::upstream_unavailable("authority down"));
            }
            self.grant(tenant_id, bot_id);
            Ok(())
        }
    }

    struct Fixture {
        cache: Arc<InMemoryCacheBackend>,
        authority: Arc<StaticAuthority>,
        store: Arc<ConfigStore>,
        machine: Arc<PublishStateMachine>,
        gate: PermissionGate,
    }

    fn fixture() -> Fixture {
        let cache = Arc::new(InMemoryCacheBackend::new());
        let repo = Arc::new(MemoryRepository::new());
        let store = Arc::new(ConfigStore::new(
            cache.clone(),
            repo.clone(),
            StoreConfig::default(),
        ));
        let machine = Arc::new(PublishStateMachine::new(repo, store.clone()));
        let authority = StaticAuthority::new();
        let gate = PermissionGate::new(
            cache.clone(),
            authority.clone(),
            store.clone(),
            machine.clone(),
            GateConfig::default(),
        );
        Fixture { cache, authority, store, machine, gate }
    }

    async fn seed(f: &Fixture, tenant: &str, bot: &str) {
        f.store
            .add(&BotConfig {
                tenant_id: tenant.to_string(),
                bot_id: bot.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn owner_is_allowed_without_remote_call() {
        let f = fixture();
        seed(&f, "app-1", "bot-1").await;

        let decision = f.gate.check("app-1", "bot-1").await.unwrap();
        assert_eq!(decision, Decision::Allow);
        assert_eq!(f.authority.calls(), 0);
    }

    #[tokio::test]
    async fn ownership_allow_is_never_cached() {
        let f = fixture();
        seed(&f, "app-1", "bot-1").await;

        f.gate.check("app-1", "bot-1").await.unwrap();
        let cached = f.cache.get(&decision_key("app-1", "bot-1")).await.unwrap();
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn granted_tenant_is_allowed_and_cached() {
        let f = fixture();
        seed(&f, "app-1", "bot-1").await;
        f.authority.grant("app-2", "bot-1");

        assert_eq!(f.gate.check("app-2", "bot-1").await.unwrap(), Decision::Allow);
        assert_eq!(f.authority.calls(), 1);

        // Second check is served from the decision cache.
        assert_eq!(f.gate.check("app-2", "bot-1").await.unwrap(), Decision::Allow);
        assert_eq!(f.authority.calls(), 1);
    }

    #[tokio::test]
    async fn denial_is_cached_as_sentinel() {
        let f = fixture();
        seed(&f, "app-1", "bot-1").await;

        assert_eq!(f.gate.check("app-2", "bot-1").await.unwrap(), Decision::Deny);
        assert_eq!(f.authority.calls(), 1);

        // A grant added afterwards is masked until the sentinel expires.
        f.authority.grant("app-2", "bot-1");
        assert_eq!(f.gate.check("app-2", "bot-1").await.unwrap(), Decision::Deny);
        assert_eq!(f.authority.calls(), 1);
    }

    #[tokio::test]
    async fn transient_failure_is_never_cached() {
        let f = fixture();
        seed(&f, "app-1", "bot-1").await;

        f.authority.set_failing(true);
        let err = f.gate.check("app-2", "bot-1").await.unwrap_err();
        assert_eq!(err.code(), 50002);

        f.authority.set_failing(false);
        f.authority.grant("app-2", "bot-1");
        assert_eq!(f.gate.check("app-2", "bot-1").await.unwrap(), Decision::Allow);
    }

    #[tokio::test]
    async fn verify_access_maps_denial() {
        let f = fixture();
        seed(&f, "app-1", "bot-1").await;

        let err = f.gate.verify_access("app-2", "bot-1").await.unwrap_err();
        assert_eq!(err.code(), 40300);
        f.gate.verify_access("app-1", "bot-1").await.unwrap();
    }

    #[tokio::test]
    async fn bind_on_missing_bot_is_not_found() {
        let f = fixture();

        let err = f.gate.bind("app-2", "bot-missing").await.unwrap_err();
        assert_eq!(err.code(), 40001);
    }

    #[tokio::test]
    async fn bind_requires_a_published_bot() {
        let f = fixture();
        seed(&f, "app-1", "bot-1").await;

        let err = f.gate.bind("app-2", "bot-1").await.unwrap_err();
        assert_eq!(err.code(), 40060);

        f.machine
            .publish("app-1", "bot-1", Platform::OpenApi, None, None)
            .await
            .unwrap();
        f.gate.bind("app-2", "bot-1").await.unwrap();

        // Bind primes the decision cache; no grant query needed.
        assert_eq!(f.gate.check("app-2", "bot-1").await.unwrap(), Decision::Allow);
        assert_eq!(f.authority.calls(), 0);
    }

    #[tokio::test]
    async fn unreadable_cached_decision_is_recomputed() {
        let f = fixture();
        seed(&f, "app-1", "bot-1").await;
        f.cache
            .set(&decision_key("app-2", "bot-1"), "garbage", None)
            .await
            .unwrap();

        assert_eq!(f.gate.check("app-2", "bot-1").await.unwrap(), Decision::Deny);
        // Overwritten with a readable sentinel.
        let raw = f
            .cache
            .get(&decision_key("app-2", "bot-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw, "\"deny\"");
    }

    #[tokio::test]
    async fn missing_bot_falls_through_to_authority() {
        let f = fixture();
        assert_eq!(f.gate.check("app-1", "bot-x").await.unwrap(), Decision::Deny);
        assert_eq!(f.authority.calls(), 1);
    }
}
