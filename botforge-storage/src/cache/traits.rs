//! Cache backend trait for pluggable volatile caches.

use async_trait::async_trait;
use botforge_core::BotResult;
use std::time::Duration;

/// Remaining lifetime of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key never expires.
    Persistent,
    /// The key expires after the contained duration.
    Expires(Duration),
}

/// Cache backend trait abstracting over Redis and the in-memory test backend.
///
/// Values are serialized JSON strings; callers own the (de)serialization so
/// the backend stays payload-agnostic. An expired key is indistinguishable
/// from an absent one. Backend failures surface as `BotError::Storage`;
/// callers remap them to the cache-specific error codes where the contract
/// requires it.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a value. Returns `None` for absent or expired keys.
    async fn get(&self, key: &str) -> BotResult<Option<String>>;

    /// Set a value. `ttl: None` stores the key without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> BotResult<()>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> BotResult<()>;

    /// Remaining lifetime of a key, or `None` if the key is absent.
    async fn ttl(&self, key: &str) -> BotResult<Option<KeyTtl>>;
}

/// Hit/miss counters for a cache backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
}

impl CacheStats {
    /// Hit rate in `[0.0, 1.0]`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_handles_empty_counters() {
        let stats = CacheStats::default();
        assert!((stats.hit_rate() - 0.0).abs() < f64::EPSILON);

        let stats = CacheStats { hits: 3, misses: 1, entry_count: 2 };
        assert!((stats.hit_rate() - 0.75).abs() < 0.001);
    }
}
