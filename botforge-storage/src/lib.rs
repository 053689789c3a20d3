//! Botforge Storage - Cache-Aside Store and Publish State Machine
//!
//! Owns everything between the API boundary and the backing stores: the
//! volatile config cache (in-memory or Redis), the cache-aside `ConfigStore`,
//! the publish bitmask state machine, and the durable `ConfigRepository`
//! abstraction. The Postgres repository implementation lives in botforge-api
//! next to the pool it borrows connections from.

pub mod cache;
pub mod lru;
pub mod publish;
pub mod repository;
pub mod store;

pub use cache::{
    config_key, decision_key, CacheBackend, CacheStats, InMemoryCacheBackend, KeyTtl,
    RedisCacheBackend,
};
pub use lru::LruCache;
pub use publish::PublishStateMachine;
pub use repository::{ConfigRepository, MemoryRepository};
pub use store::{ConfigStore, StoreConfig};
