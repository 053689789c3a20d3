//! Botforge API - HTTP Boundary Layer
//!
//! Axum routes under `/agent/v1`, the tenant-identity and request-id
//! middleware, the response envelope, and the PostgreSQL repository
//! implementation.

pub mod config;
pub mod db;
pub mod envelope;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use db::{DbConfig, PgConfigRepository};
pub use envelope::Envelope;
pub use state::AppState;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the full application router.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .nest("/agent/v1", routes::agent_routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::resolve_identity,
        ))
        .layer(axum::middleware::from_fn(middleware::attach_sid))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
