//! Bearer credential to tenant resolution with a bounded LRU.

use botforge_core::BotResult;
use botforge_storage::LruCache;
use std::sync::Arc;

use crate::identity::IdentityClient;

/// Resolves `Authorization: Bearer key_id[:secret]` credentials to tenant
/// ids.
///
/// Successful resolutions are cached in a bounded LRU with no TTL; a revoked
/// key stays resolvable until evicted. Unknown keys are never cached, so a
/// just-issued key works on the next request.
pub struct KeyResolver {
    identity: Arc<dyn IdentityClient>,
    cache: LruCache<String, String>,
}

impl KeyResolver {
    pub fn new(identity: Arc<dyn IdentityClient>, capacity: usize) -> Self {
        Self {
            identity,
            cache: LruCache::new(capacity),
        }
    }

    /// Extract the key id from an `Authorization` header value. The secret
    /// part after `:` is not needed for identification and is dropped.
    pub fn parse_bearer(header: &str) -> Option<&str> {
        let token = header.strip_prefix("Bearer ")?.trim();
        let key_id = token.split(':').next().unwrap_or(token);
        if key_id.is_empty() {
            None
        } else {
            Some(key_id)
        }
    }

    /// Resolve a key id to its owning tenant. `None` means the key is
    /// unknown to the identity service.
    pub async fn resolve(&self, key_id: &str) -> BotResult<Option<String>> {
        if let Some(tenant_id) = self.cache.get(&key_id.to_string()) {
            return Ok(Some(tenant_id));
        }
        match self.identity.resolve(key_id).await? {
            Some(tenant_id) => {
                self.cache.insert(key_id.to_string(), tenant_id.clone());
                Ok(Some(tenant_id))
            }
            None => Ok(None),
        }
    }
}
