//! Shared application state.

use botforge_auth::{KeyResolver, PermissionGate};
use botforge_core::BotResult;
use botforge_storage::{ConfigStore, PublishStateMachine};
use std::collections::HashSet;
use std::sync::Arc;

/// Handles shared by every route handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub machine: Arc<PublishStateMachine>,
    pub gate: Arc<PermissionGate>,
    pub resolver: Arc<KeyResolver>,
    /// Tenants exempt from the permission gate.
    pub bypass_tenants: Arc<HashSet<String>>,
}

impl AppState {
    /// Gate check with the configured bypass list applied first.
    pub async fn authorize(&self, tenant_id: &str, bot_id: &str) -> BotResult<()> {
        if self.bypass_tenants.contains(tenant_id) {
            tracing::debug!(tenant_id, bot_id, "permission gate bypassed");
            return Ok(());
        }
        self.gate.verify_access(tenant_id, bot_id).await
    }
}
