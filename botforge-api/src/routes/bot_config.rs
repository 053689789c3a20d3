//! Bot configuration CRUD routes.

use axum::extract::{Extension, Query, State};
use botforge_core::{BotConfig, BotError, BotResult, MAIN_VERSION};
use serde::Deserialize;
use serde_json::Value;

use crate::envelope::{respond, Envelope};
use crate::middleware::{Identity, Sid};
use crate::state::AppState;

fn default_version() -> String {
    MAIN_VERSION.to_string()
}

#[derive(Debug, Deserialize)]
pub struct GetParams {
    pub tenant_id: String,
    pub bot_id: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub include_publish_info: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub tenant_id: String,
    pub bot_id: String,
}

/// POST /agent/v1/bot-config
pub async fn create(
    State(state): State<AppState>,
    Extension(sid): Extension<Sid>,
    Extension(identity): Extension<Identity>,
    axum::Json(body): axum::Json<BotConfig>,
) -> Envelope {
    respond(&sid.0, handle_create(&state, &identity, body).await)
}

async fn handle_create(state: &AppState, identity: &Identity, body: BotConfig) -> BotResult<Value> {
    identity.require(&body.tenant_id)?;
    state.store.add(&body).await?;
    Ok(Value::Null)
}

/// GET /agent/v1/bot-config
///
/// Cross-tenant reads are allowed once the permission gate clears, so the
/// pull itself runs without the ownership filter.
pub async fn get(
    State(state): State<AppState>,
    Extension(sid): Extension<Sid>,
    Extension(identity): Extension<Identity>,
    Query(params): Query<GetParams>,
) -> Envelope {
    respond(&sid.0, handle_get(&state, &identity, params).await)
}

async fn handle_get(state: &AppState, identity: &Identity, params: GetParams) -> BotResult<Value> {
    identity.require(&params.tenant_id)?;
    state.authorize(&params.tenant_id, &params.bot_id).await?;

    let config = state
        .store
        .pull(&params.tenant_id, &params.bot_id, &params.version, true)
        .await?;
    let mut data = serde_json::to_value(&config)
        .map_err(|err| BotError::internal(format!("config serialize: {err}")))?;

    if params.include_publish_info {
        let (status, has_payload) = state
            .machine
            .publish_info(&config.tenant_id, &params.bot_id)
            .await?;
        data["publish_info"] = serde_json::json!({
            "publish_status": status.bits(),
            "is_published": status.is_published(),
            "platforms": status.platforms(),
            "has_publish_data": has_payload,
        });
    }
    Ok(data)
}

/// PUT /agent/v1/bot-config
pub async fn update(
    State(state): State<AppState>,
    Extension(sid): Extension<Sid>,
    Extension(identity): Extension<Identity>,
    axum::Json(body): axum::Json<BotConfig>,
) -> Envelope {
    respond(&sid.0, handle_update(&state, &identity, body).await)
}

async fn handle_update(state: &AppState, identity: &Identity, body: BotConfig) -> BotResult<Value> {
    identity.require(&body.tenant_id)?;
    state.authorize(&body.tenant_id, &body.bot_id).await?;
    state.store.update(&body).await?;
    Ok(Value::Null)
}

/// DELETE /agent/v1/bot-config
pub async fn remove(
    State(state): State<AppState>,
    Extension(sid): Extension<Sid>,
    Extension(identity): Extension<Identity>,
    Query(params): Query<DeleteParams>,
) -> Envelope {
    respond(&sid.0, handle_remove(&state, &identity, params).await)
}

async fn handle_remove(
    state: &AppState,
    identity: &Identity,
    params: DeleteParams,
) -> BotResult<Value> {
    identity.require(&params.tenant_id)?;
    state.authorize(&params.tenant_id, &params.bot_id).await?;
    let removed = state.store.delete(&params.tenant_id, &params.bot_id).await?;
    Ok(serde_json::json!({"removed": removed}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_params_default_to_main_version() {
        let params: GetParams =
            serde_json::from_str(r#"{"tenant_id":"a","bot_id":"b"}"#).unwrap();
        assert_eq!(params.version, MAIN_VERSION);
        assert!(!params.include_publish_info);
    }
}
