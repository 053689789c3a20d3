//! Route handlers for the `/agent/v1` surface.

pub mod auth;
pub mod bot_config;
pub mod health;
pub mod publish;

use axum::routing::post;
use axum::Router;

use crate::state::AppState;

/// Routes mounted under `/agent/v1`.
pub fn agent_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/bot-config",
            post(bot_config::create)
                .get(bot_config::get)
                .put(bot_config::update)
                .delete(bot_config::remove),
        )
        .route("/publish", post(publish::transition))
        .route("/auth", post(auth::bind))
}
