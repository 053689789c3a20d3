//! Remote grant authority client.

use async_trait::async_trait;
use botforge_core::{bot_context, BotError, BotResult};
use serde::Deserialize;
use std::time::Duration;

const ABILITY_TYPE: &str = "agent";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the service that owns cross-tenant grants.
#[async_trait]
pub trait AuthorityClient: Send + Sync {
    /// Whether `tenant_id` holds an active grant on `bot_id`.
    async fn verify_grant(&self, tenant_id: &str, bot_id: &str) -> BotResult<bool>;

    /// Register a grant for `tenant_id` on `bot_id`.
    async fn add_grant(&self, tenant_id: &str, bot_id: &str) -> BotResult<()>;
}

#[derive(Debug, Deserialize)]
struct AuthorityEnvelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Vec<GrantEntry>,
}

#[derive(Debug, Deserialize)]
struct GrantEntry {
    #[serde(default)]
    app_id: String,
    #[serde(default)]
    ability_id: String,
    #[serde(default, rename = "type")]
    ability_type: String,
    /// 1 = active.
    #[serde(default)]
    status: i64,
}

fn has_active_grant(envelope: &AuthorityEnvelope, tenant_id: &str, bot_id: &str) -> bool {
    envelope.data.iter().any(|grant| {
        grant.app_id == tenant_id
            && grant.ability_id == bot_id
            && grant.ability_type == ABILITY_TYPE
            && grant.status == 1
    })
}

/// HTTP implementation against the grant authority.
///
/// Endpoints are optional at construction so deployments without
/// cross-tenant sharing can run with them unset; using an unset endpoint
/// fails with `MisconfiguredDependency`.
pub struct HttpAuthorityClient {
    http: reqwest::Client,
    query_url: Option<String>,
    bind_url: Option<String>,
}

impl HttpAuthorityClient {
    pub fn new(query_url: Option<String>, bind_url: Option<String>) -> BotResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| BotError::internal(format!("authority http client: {err}")))?;
        Ok(Self { http, query_url, bind_url })
    }

    fn transport_err(context: &str, err: reqwest::Error) -> BotError {
        match err.status() {
            Some(status) => BotError::UpstreamStatus {
                status: status.as_u16(),
                context: format!("{context}: {err}"),
            },
            None => BotError::upstream_unavailable(format!("{context}: {err}")),
        }
    }
}

#[async_trait]
impl AuthorityClient for HttpAuthorityClient {
    async fn verify_grant(&self, tenant_id: &str, bot_id: &str) -> BotResult<bool> {
        let ctx = bot_context(tenant_id, bot_id);
        let url = self
            .query_url
            .as_deref()
            .ok_or_else(|| BotError::MisconfiguredDependency {
                endpoint: "authority query".to_string(),
            })?;

        let response = self
            .http
            .get(url)
            .query(&[
                ("app_id", tenant_id),
                ("type", ABILITY_TYPE),
                ("ability_id", bot_id),
            ])
            .send()
            .await
            .map_err(|err| Self::transport_err(&ctx, err))?
            .error_for_status()
            .map_err(|err| Self::transport_err(&ctx, err))?;

        let envelope: AuthorityEnvelope = response
            .json()
            .await
            .map_err(|err| Self::transport_err(&ctx, err))?;

        if envelope.code != 0 {
            tracing::warn!(
                tenant_id,
                bot_id,
                code = envelope.code,
                message = %envelope.message,
                "authority rejected grant query"
            );
            return Ok(false);
        }
        Ok(has_active_grant(&envelope, tenant_id, bot_id))
    }

    async fn add_grant(&self, tenant_id: &str, bot_id: &str) -> BotResult<()> {
        let ctx = bot_context(tenant_id, bot_id);
        let url = self
            .bind_url
            .as_deref()
            .ok_or_else(|| BotError::MisconfiguredDependency {
                endpoint: "authority bind".to_string(),
            })?;

        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({
                "app_id": tenant_id,
                "type": ABILITY_TYPE,
                "ability_id": bot_id,
            }))
            .send()
            .await
            .map_err(|err| Self::transport_err(&ctx, err))?
            .error_for_status()
            .map_err(|err| Self::transport_err(&ctx, err))?;

        let envelope: AuthorityEnvelope = response
            .json()
            .await
            .map_err(|err| Self::transport_err(&ctx, err))?;

        if envelope.code != 0 {
            return Err(BotError::BindFailed {
                reason: envelope.message,
                context: ctx,
            });
        }
        Ok(())
    }
}
