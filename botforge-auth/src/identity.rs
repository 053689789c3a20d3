//! API key identity service client.

use async_trait::async_trait;
use botforge_core::{BotError, BotResult};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves an API key id to the tenant that owns it.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// `None` means the key id is unknown or revoked.
    async fn resolve(&self, key_id: &str) -> BotResult<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct IdentityEnvelope {
    code: i64,
    #[serde(default)]
    data: Option<IdentityData>,
}

#[derive(Debug, Deserialize)]
struct IdentityData {
    #[serde(default)]
    appid: String,
}

/// HTTP implementation. Looks up `GET {endpoint}/{key_id}`.
pub struct HttpIdentityClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpIdentityClient {
    pub fn new(endpoint: String) -> BotResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| BotError::internal(format!("identity http client: {err}")))?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn resolve(&self, key_id: &str) -> BotResult<Option<String>> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), key_id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| BotError::upstream_unavailable(format!("identity: {err}")))?;

        if !response.status().is_success() {
            return Err(BotError::UpstreamStatus {
                status: response.status().as_u16(),
                context: "identity".to_string(),
            });
        }

        let envelope: IdentityEnvelope = response
            .json()
            .await
            .map_err(|err| BotError::upstream_unavailable(format!("identity: {err}")))?;

        if envelope.code != 0 {
            return Ok(None);
        }
        Ok(envelope
            .data
            .map(|data| data.appid)
            .filter(|appid| !appid.is_empty()))
    }
}

/// Stand-in for deployments without an identity service. Every resolution
/// fails with `MisconfiguredDependency`, so credential-based requests are
/// rejected while header-asserted identities keep working.
pub struct UnconfiguredIdentity;

#[async_trait]
impl IdentityClient for UnconfiguredIdentity {
    async fn resolve(&self, _key_id: &str) -> BotResult<Option<String>> {
        Err(BotError::MisconfiguredDependency {
            endpoint: "identity".to_string(),
        })
    }
}
