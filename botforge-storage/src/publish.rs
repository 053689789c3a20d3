//! Publish state machine over the bitmask and version snapshots.

use botforge_core::{
    bot_context, BotError, BotRecord, BotResult, Platform, PublishOperation, PublishStatus,
    MAIN_VERSION,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use crate::repository::ConfigRepository;
use crate::store::ConfigStore;

/// Drives publish transitions on the main record and writes version
/// snapshots.
///
/// Every transition is one repository transaction (main row plus optional
/// snapshot row). The cached main config is dropped after the commit; that
/// drop is best-effort, a failed drop is logged and the transition still
/// succeeds, since the entry expires on its own.
pub struct PublishStateMachine {
    repo: Arc<dyn ConfigRepository>,
    store: Arc<ConfigStore>,
}

impl PublishStateMachine {
    pub fn new(repo: Arc<dyn ConfigRepository>, store: Arc<ConfigStore>) -> Self {
        Self { repo, store }
    }

    /// Dispatch a requested transition.
    pub async fn apply(
        &self,
        tenant_id: &str,
        bot_id: &str,
        operation: PublishOperation,
        platform: Platform,
        payload: Option<Value>,
        version_label: Option<&str>,
    ) -> BotResult<PublishStatus> {
        match operation {
            PublishOperation::Publish => {
                self.publish(tenant_id, bot_id, platform, payload, version_label)
                    .await
            }
            PublishOperation::Unpublish => self.unpublish(tenant_id, bot_id, platform).await,
        }
    }

    /// Set the platform bit on the main record. Idempotent per platform.
    ///
    /// `payload` overrides the published payload; without one the current
    /// main configuration is captured. `version_label` additionally writes
    /// a snapshot row under that label, overwriting an existing snapshot
    /// with the same label in place.
    pub async fn publish(
        &self,
        tenant_id: &str,
        bot_id: &str,
        platform: Platform,
        payload: Option<Value>,
        version_label: Option<&str>,
    ) -> BotResult<PublishStatus> {
        let ctx = bot_context(tenant_id, bot_id);
        let mut main = self
            .repo
            .find(bot_id, Some(tenant_id), None)
            .await?
            .ok_or_else(|| BotError::not_found(ctx.clone()))?;

        let before = main.publish_status;
        main.publish_status = before.with(platform);
        let data = match payload {
            Some(value) => value,
            None => serde_json::to_value(main.config())
                .map_err(|err| BotError::internal(format!("{ctx} serialize: {err}")))?,
        };
        main.publish_data = Some(data);
        // Legacy rows were found without a version filter; pin the row we
        // write back as the main version.
        main.version = MAIN_VERSION.to_string();
        main.updated_at = Utc::now();

        let snapshot = match version_label {
            Some(label) if label != MAIN_VERSION => {
                Some(self.build_snapshot(&main, label).await?)
            }
            _ => None,
        };
        self.repo.commit_publish(&main, snapshot.as_ref()).await?;
        self.drop_cached_config(tenant_id, bot_id).await;

        tracing::info!(
            tenant_id,
            bot_id,
            platform = %platform,
            before = %before,
            after = %main.publish_status,
            version_label,
            "published bot config"
        );
        Ok(main.publish_status)
    }

    /// Clear the platform bit on the main record.
    ///
    /// Fails when the bit is not set. Clearing the last bit also clears the
    /// captured publish payload.
    pub async fn unpublish(
        &self,
        tenant_id: &str,
        bot_id: &str,
        platform: Platform,
    ) -> BotResult<PublishStatus> {
        let ctx = bot_context(tenant_id, bot_id);
        let mut main = self
            .repo
            .find(bot_id, Some(tenant_id), None)
            .await?
            .ok_or_else(|| BotError::not_found(ctx.clone()))?;

        if !main.publish_status.contains(platform) {
            return Err(BotError::NotPublishedToPlatform {
                platform,
                context: ctx,
            });
        }

        let before = main.publish_status;
        main.publish_status = before.without(platform);
        if main.publish_status.is_empty() {
            main.publish_data = None;
        }
        main.version = MAIN_VERSION.to_string();
        main.updated_at = Utc::now();

        self.repo.commit_publish(&main, None).await?;
        self.drop_cached_config(tenant_id, bot_id).await;

        tracing::info!(
            tenant_id,
            bot_id,
            platform = %platform,
            before = %before,
            after = %main.publish_status,
            "unpublished bot config"
        );
        Ok(main.publish_status)
    }

    /// Current publish status of the main record.
    pub async fn status(&self, tenant_id: &str, bot_id: &str) -> BotResult<PublishStatus> {
        Ok(self.publish_info(tenant_id, bot_id).await?.0)
    }

    /// Publish status plus whether a published payload is captured.
    pub async fn publish_info(
        &self,
        tenant_id: &str,
        bot_id: &str,
    ) -> BotResult<(PublishStatus, bool)> {
        let record = self
            .repo
            .find(bot_id, Some(tenant_id), None)
            .await?
            .ok_or_else(|| BotError::not_found(bot_context(tenant_id, bot_id)))?;
        Ok((record.publish_status, record.publish_data.is_some()))
    }

    /// Whether the bot is live, on `platform` or on any platform.
    pub async fn is_published(
        &self,
        tenant_id: &str,
        bot_id: &str,
        platform: Option<Platform>,
    ) -> BotResult<bool> {
        let status = self.status(tenant_id, bot_id).await?;
        Ok(match platform {
            Some(platform) => status.contains(platform),
            None => status.is_published(),
        })
    }

    /// Whether the bot is live on any platform, regardless of owner.
    /// A bot with no non-deleted rows is `NotFound`. Used by the binding
    /// path, where the caller is not the owner.
    pub async fn published_any_tenant(&self, bot_id: &str) -> BotResult<bool> {
        let record = self
            .repo
            .find(bot_id, None, None)
            .await?
            .ok_or_else(|| BotError::not_found(format!("bot_id:{bot_id}")))?;
        Ok(record.publish_status.is_published())
    }

    /// Build the snapshot row for `label`, reusing an existing row with the
    /// same label so labels stay unique per bot.
    async fn build_snapshot(&self, main: &BotRecord, label: &str) -> BotResult<BotRecord> {
        match self
            .repo
            .find(&main.bot_id, Some(&main.tenant_id), Some(label))
            .await?
        {
            Some(mut existing) => {
                existing.apply_config(&main.config());
                existing.publish_status = main.publish_status;
                existing.publish_data = main.publish_data.clone();
                Ok(existing)
            }
            None => Ok(main.snapshot_as(label)),
        }
    }

    async fn drop_cached_config(&self, tenant_id: &str, bot_id: &str) {
        if let Err(err) = self.store.invalidate(bot_id).await {
            tracing::warn!(
                tenant_id,
                bot_id,
                error = %err,
                "failed to drop cached config after publish transition"
            );
        }
    }
}
