//! Publish transition route.

use axum::extract::{Extension, State};
use botforge_core::{BotResult, Platform, PublishOperation};
use serde::Deserialize;
use serde_json::Value;

use crate::envelope::{respond, Envelope};
use crate::middleware::{Identity, Sid};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub tenant_id: String,
    pub bot_id: String,
    /// 1 = publish, 0 = unpublish.
    pub operation: PublishOperation,
    /// Platform bit: 1 = market, 4 = open API, 16 = voice.
    pub platform: Platform,
    /// Overrides the captured payload when publishing.
    #[serde(default)]
    pub publish_data: Option<Value>,
    /// Additionally snapshot the config under this label when publishing.
    #[serde(default)]
    pub version_label: Option<String>,
}

/// POST /agent/v1/publish
pub async fn transition(
    State(state): State<AppState>,
    Extension(sid): Extension<Sid>,
    Extension(identity): Extension<Identity>,
    axum::Json(body): axum::Json<PublishRequest>,
) -> Envelope {
    respond(&sid.0, handle(&state, &identity, body).await)
}

async fn handle(state: &AppState, identity: &Identity, body: PublishRequest) -> BotResult<Value> {
    identity.require(&body.tenant_id)?;
    let status = state
        .machine
        .apply(
            &body.tenant_id,
            &body.bot_id,
            body.operation,
            body.platform,
            body.publish_data,
            body.version_label.as_deref(),
        )
        .await?;
    Ok(serde_json::json!({
        "publish_status": status.bits(),
        "platforms": status.platforms(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_wire_values() {
        let req: PublishRequest = serde_json::from_str(
            r#"{"tenant_id":"a","bot_id":"b","operation":1,"platform":4}"#,
        )
        .unwrap();
        assert_eq!(req.operation, PublishOperation::Publish);
        assert_eq!(req.platform, Platform::OpenApi);
        assert!(req.publish_data.is_none());
        assert!(req.version_label.is_none());
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let result = serde_json::from_str::<PublishRequest>(
            r#"{"tenant_id":"a","bot_id":"b","operation":7,"platform":1}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_platform_bit_is_rejected() {
        let result = serde_json::from_str::<PublishRequest>(
            r#"{"tenant_id":"a","bot_id":"b","operation":1,"platform":2}"#,
        );
        assert!(result.is_err());
    }
}
