//! Request-id and tenant-identity middleware.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use botforge_auth::KeyResolver;
use botforge_core::{BotError, BotResult};
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::state::AppState;

/// Trusted gateway header carrying the caller's tenant id.
pub const TENANT_HEADER: &str = "x-consumer-username";

/// Per-request id surfaced in every envelope and log line.
#[derive(Debug, Clone)]
pub struct Sid(pub String);

/// The caller's resolved tenant identity, if any.
#[derive(Debug, Clone, Default)]
pub struct Identity(pub Option<String>);

impl Identity {
    /// Require the asserted identity to match the tenant named in the
    /// request. A missing identity and a mismatch both read as denial.
    pub fn require(&self, tenant_id: &str) -> BotResult<()> {
        match self.0.as_deref() {
            Some(asserted) if asserted == tenant_id => Ok(()),
            Some(asserted) => Err(BotError::permission_denied(format!(
                "tenant_id:{tenant_id} asserted:{asserted}"
            ))),
            None => Err(BotError::permission_denied(format!(
                "tenant_id:{tenant_id} asserted:<none>"
            ))),
        }
    }
}

/// Attach a fresh sid to the request.
pub async fn attach_sid(mut req: Request, next: Next) -> Response {
    req.extensions_mut().insert(Sid(Uuid::now_v7().to_string()));
    next.run(req).await
}

/// Resolve the caller's tenant: the gateway header wins, otherwise the
/// bearer credential is resolved through the identity service. Resolution
/// failures end the request with HTTP 401 and an error envelope.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match identity_from_headers(req.headers(), &state).await {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(err) => {
            let sid = req
                .extensions()
                .get::<Sid>()
                .map(|s| s.0.clone())
                .unwrap_or_default();
            tracing::warn!(sid, error = %err, "identity resolution failed");
            (StatusCode::UNAUTHORIZED, Envelope::failure(&sid, &err)).into_response()
        }
    }
}

async fn identity_from_headers(headers: &HeaderMap, state: &AppState) -> BotResult<Identity> {
    if let Some(tenant) = headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return Ok(Identity(Some(tenant.to_string())));
    }

    let Some(auth) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return Ok(Identity(None));
    };
    let Some(key_id) = KeyResolver::parse_bearer(auth) else {
        return Ok(Identity(None));
    };
    Ok(Identity(state.resolver.resolve(key_id).await?))
}
