//! Error taxonomy for botforge operations
//!
//! Every variant carries a stable numeric code (surfaced in API envelopes)
//! and a context tag naming the identifiers involved. Lower layers raise
//! these directly; only the boundary layer may convert an unanticipated
//! error into `Internal`.

use crate::publish::Platform;
use thiserror::Error;

/// Domain error for bot configuration, publish, and authorization paths.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BotError {
    /// Missing config/version, or an ownership mismatch deliberately mapped
    /// to NotFound so callers cannot distinguish "wrong tenant" from
    /// "bot does not exist".
    #[error("failed to retrieve bot config ({context})")]
    NotFound { context: String },

    #[error("cached bot config is invalid ({context})")]
    DataCorruption { context: String },

    #[error("failed to write bot config cache ({context})")]
    CacheWriteFailed { context: String },

    #[error("failed to delete bot config cache ({context})")]
    CacheDeleteFailed { context: String },

    #[error("bot config main version already exists, cannot create ({context})")]
    AlreadyExists { context: String },

    #[error("bot configuration not published ({context})")]
    NotPublished { context: String },

    #[error("authorization binding failed: {reason} ({context})")]
    BindFailed { reason: String, context: String },

    #[error("cannot delete published bot config, unpublish first ({context})")]
    DeletePublished { context: String },

    #[error("bot config not published to platform {platform} ({context})")]
    NotPublishedToPlatform { platform: Platform, context: String },

    #[error("permission denied: tenant does not have access to this bot ({context})")]
    PermissionDenied { context: String },

    #[error("remote service returned status {status} ({context})")]
    UpstreamStatus { status: u16, context: String },

    #[error("failed to reach remote service ({context})")]
    UpstreamUnavailable { context: String },

    #[error("required endpoint not configured: {endpoint}")]
    MisconfiguredDependency { endpoint: String },

    #[error("storage operation failed: {reason} ({context})")]
    Storage { reason: String, context: String },

    #[error("internal service error ({context})")]
    Internal { context: String },
}

impl BotError {
    /// Stable numeric code for API envelopes. Codes are part of the public
    /// contract and must not be renumbered.
    pub fn code(&self) -> u32 {
        match self {
            BotError::NotFound { .. } => 40001,
            BotError::DataCorruption { .. } => 40003,
            BotError::CacheWriteFailed { .. } => 40050,
            BotError::CacheDeleteFailed { .. } => 40051,
            BotError::AlreadyExists { .. } => 40053,
            BotError::NotPublished { .. } => 40060,
            BotError::BindFailed { .. } => 40061,
            BotError::DeletePublished { .. } => 40063,
            BotError::NotPublishedToPlatform { .. } => 40063,
            BotError::PermissionDenied { .. } => 40300,
            BotError::Internal { .. } => 40500,
            BotError::Storage { .. } => 40500,
            BotError::UpstreamStatus { .. } => 50001,
            BotError::UpstreamUnavailable { .. } => 50002,
            BotError::MisconfiguredDependency { .. } => 50004,
        }
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    pub fn not_found(context: impl Into<String>) -> Self {
        BotError::NotFound { context: context.into() }
    }

    pub fn data_corruption(context: impl Into<String>) -> Self {
        BotError::DataCorruption { context: context.into() }
    }

    pub fn already_exists(context: impl Into<String>) -> Self {
        BotError::AlreadyExists { context: context.into() }
    }

    pub fn not_published(context: impl Into<String>) -> Self {
        BotError::NotPublished { context: context.into() }
    }

    pub fn permission_denied(context: impl Into<String>) -> Self {
        BotError::PermissionDenied { context: context.into() }
    }

    pub fn upstream_unavailable(context: impl Into<String>) -> Self {
        BotError::UpstreamUnavailable { context: context.into() }
    }

    pub fn storage(reason: impl Into<String>, context: impl Into<String>) -> Self {
        BotError::Storage {
            reason: reason.into(),
            context: context.into(),
        }
    }

    pub fn internal(context: impl Into<String>) -> Self {
        BotError::Internal { context: context.into() }
    }
}

/// Result type alias for botforge operations.
pub type BotResult<T> = Result<T, BotError>;

/// Build the conventional context tag for a `(tenant_id, bot_id)` pair.
pub fn bot_context(tenant_id: &str, bot_id: &str) -> String {
    format!("tenant_id:{} bot_id:{}", tenant_id, bot_id)
}
