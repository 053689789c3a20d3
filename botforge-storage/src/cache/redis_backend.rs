//! Redis cache backend.

use async_trait::async_trait;
use botforge_core::{BotError, BotResult};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use super::traits::{CacheBackend, KeyTtl};

/// Redis-backed cache using a multiplexed connection manager.
///
/// The manager reconnects on its own; individual command failures surface as
/// `BotError::Storage` and are remapped by callers where the contract names
/// a more specific code.
#[derive(Clone)]
pub struct RedisCacheBackend {
    conn: ConnectionManager,
}

impl RedisCacheBackend {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> BotResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|err| BotError::storage(err.to_string(), "redis client"))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|err| BotError::storage(err.to_string(), "redis connect"))?;
        Ok(Self { conn })
    }

    fn command_err(key: &str, err: redis::RedisError) -> BotError {
        BotError::storage(err.to_string(), format!("key:{key}"))
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> BotResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|err| Self::command_err(key, err))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> BotResult<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let () = conn
                    .set_ex(key, value, ttl.as_secs())
                    .await
                    .map_err(|err| Self::command_err(key, err))?;
            }
            None => {
                let () = conn
                    .set(key, value)
                    .await
                    .map_err(|err| Self::command_err(key, err))?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> BotResult<()> {
        let mut conn = self.conn.clone();
        let _removed: i64 = conn
            .del(key)
            .await
            .map_err(|err| Self::command_err(key, err))?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> BotResult<Option<KeyTtl>> {
        let mut conn = self.conn.clone();
        let seconds: i64 = conn
            .ttl(key)
            .await
            .map_err(|err| Self::command_err(key, err))?;
        // Redis TTL: -2 = key absent, -1 = key without expiry.
        Ok(match seconds {
            -2 => None,
            -1 => Some(KeyTtl::Persistent),
            s if s >= 0 => Some(KeyTtl::Expires(Duration::from_secs(s as u64))),
            _ => None,
        })
    }
}
