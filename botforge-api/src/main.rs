//! Botforge API server entry point.
//!
//! Wires configuration, the Postgres pool, the cache backend, and the
//! domain services together, then serves the Axum router until a shutdown
//! signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;

use botforge_api::{create_api_router, ApiConfig, AppState, DbConfig, PgConfigRepository};
use botforge_auth::{
    GateConfig, HttpAuthorityClient, HttpIdentityClient, IdentityClient, KeyResolver,
    PermissionGate, UnconfiguredIdentity,
};
use botforge_core::{BotError, BotResult};
use botforge_storage::{
    CacheBackend, ConfigRepository, ConfigStore, InMemoryCacheBackend, PublishStateMachine,
    RedisCacheBackend, StoreConfig,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> BotResult<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api_config = ApiConfig::from_env();
    let db_config = DbConfig::from_env();

    let repo: Arc<dyn ConfigRepository> =
        Arc::new(PgConfigRepository::new(db_config.create_pool()?));

    let cache: Arc<dyn CacheBackend> = match api_config.redis_url.as_deref() {
        Some(url) => Arc::new(RedisCacheBackend::connect(url).await?),
        None => {
            tracing::warn!("BOTFORGE_REDIS_URL unset, falling back to in-process cache");
            Arc::new(InMemoryCacheBackend::new())
        }
    };

    let store = Arc::new(ConfigStore::new(
        cache.clone(),
        repo.clone(),
        StoreConfig {
            cache_ttl: api_config.cache_ttl,
        },
    ));
    let machine = Arc::new(PublishStateMachine::new(repo.clone(), store.clone()));

    let authority = Arc::new(HttpAuthorityClient::new(
        api_config.authority_query_url.clone(),
        api_config.authority_bind_url.clone(),
    )?);
    let gate = Arc::new(PermissionGate::new(
        cache.clone(),
        authority,
        store.clone(),
        machine.clone(),
        GateConfig {
            decision_ttl: api_config.decision_ttl,
        },
    ));

    let identity: Arc<dyn IdentityClient> = match api_config.identity_url.clone() {
        Some(endpoint) => Arc::new(HttpIdentityClient::new(endpoint)?),
        None => Arc::new(UnconfiguredIdentity),
    };
    let resolver = Arc::new(KeyResolver::new(identity, api_config.key_cache_capacity));

    let state = AppState {
        store,
        machine,
        gate,
        resolver,
        bypass_tenants: Arc::new(api_config.bypass_tenants.clone()),
    };
    let app = create_api_router(state);

    let addr = format!("{}:{}", api_config.bind_host, api_config.port);
    let addr: SocketAddr = addr
        .parse()
        .map_err(|err| BotError::internal(format!("bind address {addr}: {err}")))?;
    tracing::info!(%addr, "starting botforge api server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| BotError::internal(format!("bind {addr}: {err}")))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|err| BotError::internal(format!("server error: {err}")))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }
    Ok(())
}
