//! API configuration loaded from environment variables.

use std::collections::HashSet;
use std::time::Duration;

/// Service-level configuration.
///
/// Remote endpoints are optional: an unset endpoint disables the feature
/// (cross-tenant grants, credential resolution) and requests needing it fail
/// with `MisconfiguredDependency` rather than at startup.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind host for the HTTP listener.
    pub bind_host: String,
    /// Bind port.
    pub port: u16,
    /// Redis URL; unset falls back to the in-process cache backend.
    pub redis_url: Option<String>,
    /// Expiry for cached bot configs.
    pub cache_ttl: Duration,
    /// Expiry for cached authorization decisions.
    pub decision_ttl: Duration,
    /// Capacity of the credential-resolution LRU.
    pub key_cache_capacity: usize,
    /// Grant authority query endpoint.
    pub authority_query_url: Option<String>,
    /// Grant authority bind endpoint.
    pub authority_bind_url: Option<String>,
    /// Identity service base URL for API key resolution.
    pub identity_url: Option<String>,
    /// Tenants exempt from the permission gate (comma-separated in env).
    pub bypass_tenants: HashSet<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 8080,
            redis_url: None,
            cache_ttl: Duration::from_secs(3600),
            decision_ttl: Duration::from_secs(3600),
            key_cache_capacity: 3000,
            authority_query_url: None,
            authority_bind_url: None,
            identity_url: None,
            bypass_tenants: HashSet::new(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from `BOTFORGE_*` environment variables.
    ///
    /// - `BOTFORGE_API_BIND` (default `0.0.0.0`)
    /// - `BOTFORGE_API_PORT` (default `8080`)
    /// - `BOTFORGE_REDIS_URL`
    /// - `BOTFORGE_CACHE_TTL_SECS` (default `3600`)
    /// - `BOTFORGE_DECISION_TTL_SECS` (default `3600`)
    /// - `BOTFORGE_KEY_CACHE_CAPACITY` (default `3000`)
    /// - `BOTFORGE_AUTH_QUERY_URL`, `BOTFORGE_AUTH_BIND_URL`
    /// - `BOTFORGE_IDENTITY_URL`
    /// - `BOTFORGE_PERMISSION_BYPASS_TENANTS` (comma-separated, default empty)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_host: std::env::var("BOTFORGE_API_BIND").unwrap_or(defaults.bind_host),
            port: std::env::var("BOTFORGE_API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            redis_url: env_opt("BOTFORGE_REDIS_URL"),
            cache_ttl: env_secs("BOTFORGE_CACHE_TTL_SECS", defaults.cache_ttl),
            decision_ttl: env_secs("BOTFORGE_DECISION_TTL_SECS", defaults.decision_ttl),
            key_cache_capacity: std::env::var("BOTFORGE_KEY_CACHE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.key_cache_capacity),
            authority_query_url: env_opt("BOTFORGE_AUTH_QUERY_URL"),
            authority_bind_url: env_opt("BOTFORGE_AUTH_BIND_URL"),
            identity_url: env_opt("BOTFORGE_IDENTITY_URL"),
            bypass_tenants: parse_csv(
                &std::env::var("BOTFORGE_PERMISSION_BYPASS_TENANTS").unwrap_or_default(),
            ),
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn parse_csv(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_closed() {
        let config = ApiConfig::default();
        assert!(config.bypass_tenants.is_empty());
        assert!(config.authority_query_url.is_none());
        assert!(config.redis_url.is_none());
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.key_cache_capacity, 3000);
    }

    #[test]
    fn csv_parsing_trims_and_skips_empties() {
        let set = parse_csv("app-1, app-2 ,, ");
        assert_eq!(set.len(), 2);
        assert!(set.contains("app-1"));
        assert!(set.contains("app-2"));
        assert!(parse_csv("").is_empty());
    }
}
