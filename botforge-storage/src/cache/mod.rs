//! Volatile cache backends and key construction.

pub mod memory;
pub mod redis_backend;
pub mod traits;

pub use memory::InMemoryCacheBackend;
pub use redis_backend::RedisCacheBackend;
pub use traits::{CacheBackend, CacheStats, KeyTtl};

/// Cache key for a bot's main-version configuration.
///
/// Keyed by bot id alone: bot ids are globally unique and the cached value
/// carries its owning tenant, so ownership is checked after retrieval.
pub fn config_key(bot_id: &str) -> String {
    format!("botforge:bot_config:{bot_id}")
}

/// Cache key for an authorization decision on a `(tenant, bot)` pair.
pub fn decision_key(tenant_id: &str, bot_id: &str) -> String {
    format!("botforge:auth:{tenant_id}:{bot_id}")
}
