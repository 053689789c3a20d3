//! Tenant-to-bot binding route.

use axum::extract::{Extension, State};
use botforge_core::BotResult;
use serde::Deserialize;
use serde_json::Value;

use crate::envelope::{respond, Envelope};
use crate::middleware::{Identity, Sid};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BindRequest {
    pub tenant_id: String,
    pub bot_id: String,
}

/// POST /agent/v1/auth
pub async fn bind(
    State(state): State<AppState>,
    Extension(sid): Extension<Sid>,
    Extension(identity): Extension<Identity>,
    axum::Json(body): axum::Json<BindRequest>,
) -> Envelope {
    respond(&sid.0, handle(&state, &identity, body).await)
}

async fn handle(state: &AppState, identity: &Identity, body: BindRequest) -> BotResult<Value> {
    identity.require(&body.tenant_id)?;
    state.gate.bind(&body.tenant_id, &body.bot_id).await?;
    Ok(Value::Null)
}
