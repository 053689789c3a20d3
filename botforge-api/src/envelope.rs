//! Response envelope shared by every `/agent/v1` route.

use axum::response::{IntoResponse, Response};
use axum::Json;
use botforge_core::{BotError, BotResult};
use serde::Serialize;
use serde_json::Value;

/// Wire envelope `{code, message, sid, data}`.
///
/// Domain failures ride inside the envelope with HTTP 200; the `code` field
/// is the contract, not the HTTP status.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub code: u32,
    pub message: String,
    pub sid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn success(sid: &str, data: Option<Value>) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            sid: sid.to_string(),
            data,
        }
    }

    pub fn failure(sid: &str, err: &BotError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            sid: sid.to_string(),
            data: None,
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Fold a handler outcome into the envelope, logging failures with the sid
/// so log lines and client reports correlate.
pub fn respond<T: Serialize>(sid: &str, result: BotResult<T>) -> Envelope {
    match result {
        Ok(data) => match serde_json::to_value(data) {
            Ok(Value::Null) => Envelope::success(sid, None),
            Ok(value) => Envelope::success(sid, Some(value)),
            Err(err) => {
                let err = BotError::internal(format!("response serialize: {err}"));
                tracing::error!(sid, error = %err, "request failed");
                Envelope::failure(sid, &err)
            }
        },
        Err(err) => {
            tracing::warn!(sid, code = err.code(), error = %err, "request failed");
            Envelope::failure(sid, &err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let env = Envelope::success("sid-1", Some(serde_json::json!({"bot_id": "b"})));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["code"], 0);
        assert_eq!(json["message"], "success");
        assert_eq!(json["sid"], "sid-1");
        assert_eq!(json["data"]["bot_id"], "b");
    }

    #[test]
    fn failure_envelope_carries_domain_code() {
        let err = BotError::not_found("tenant_id:a bot_id:b");
        let env = Envelope::failure("sid-2", &err);
        assert_eq!(env.code, 40001);
        assert!(env.message.contains("bot_id:b"));
        assert!(env.data.is_none());
    }

    #[test]
    fn respond_folds_results() {
        let ok = respond("s", Ok(serde_json::json!({"n": 1})));
        assert_eq!(ok.code, 0);

        let err: BotResult<Value> = Err(BotError::permission_denied("tenant_id:a bot_id:b"));
        let env = respond("s", err);
        assert_eq!(env.code, 40300);
    }

    #[test]
    fn null_data_is_omitted() {
        let env = respond("s", Ok(serde_json::Value::Null));
        let json = serde_json::to_string(&env).unwrap();
        assert!(!json.contains("\"data\""));
    }
}
