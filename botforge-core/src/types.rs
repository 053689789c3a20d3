//! Bot configuration entity structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::publish::PublishStatus;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Version label of the single mutable "main" record of a bot. Every other
/// version string names an immutable snapshot created at publish time.
pub const MAIN_VERSION: &str = "-1";

/// Generate a new UUIDv7 record identifier (timestamp-sortable).
pub fn new_record_id() -> Uuid {
    Uuid::now_v7()
}

// ============================================================================
// SUB-CONFIGURATIONS
// ============================================================================

/// Knowledge-retrieval settings attached to a bot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Knowledge repository identifiers the bot retrieves from.
    #[serde(default)]
    pub repo_ids: Vec<String>,
    /// Individual document identifiers pinned into retrieval.
    #[serde(default)]
    pub doc_ids: Vec<String>,
    /// Number of chunks to retrieve per query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Minimum relevance score for retrieved chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,
}

/// Model selection and sampling settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name, e.g. "general-v3".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Override for the model API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// System instructions prepended to every conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Behavioral presentation settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Greeting shown when a conversation opens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
    /// Follow-up questions suggested to the user.
    #[serde(default)]
    pub suggested_questions: Vec<String>,
    /// Avatar resource identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

// ============================================================================
// BOT CONFIGURATION
// ============================================================================

/// The versioned unit of work: everything a tenant edits about a bot.
///
/// This is also the exact shape serialized into the volatile cache, so any
/// field added here changes the cache payload format.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Owning tenant. Stable for the main version; snapshots keep the
    /// owner recorded at publish time.
    pub tenant_id: String,
    /// Bot identifier, stable across all versions of one bot.
    pub bot_id: String,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub tool_ids: Vec<String>,
    #[serde(default)]
    pub flow_ids: Vec<String>,
    #[serde(default)]
    pub mcp_server_ids: Vec<String>,
    #[serde(default)]
    pub mcp_server_urls: Vec<String>,
}

/// A durable row of the bot configuration table.
///
/// At most one non-deleted record exists per `(tenant_id, bot_id, version)`.
/// The `version == "-1"` record is the mutable main version; all others are
/// snapshots written by the publish path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotRecord {
    pub record_id: Uuid,
    pub tenant_id: String,
    pub bot_id: String,
    pub version: String,
    pub knowledge: KnowledgeConfig,
    pub model: ModelConfig,
    pub behavior: BehaviorConfig,
    pub tool_ids: Vec<String>,
    pub flow_ids: Vec<String>,
    pub mcp_server_ids: Vec<String>,
    pub mcp_server_urls: Vec<String>,
    /// Bitmask of platforms the bot is live on.
    pub publish_status: PublishStatus,
    /// Serialized configuration captured at publish time. Cleared when the
    /// last platform bit is removed.
    pub publish_data: Option<serde_json::Value>,
    /// Soft-delete flag; deleted rows are invisible to every query.
    pub deleted: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl BotRecord {
    /// Build a fresh main-version record from a configuration.
    pub fn new_main(config: &BotConfig) -> Self {
        let now = Utc::now();
        Self {
            record_id: new_record_id(),
            tenant_id: config.tenant_id.clone(),
            bot_id: config.bot_id.clone(),
            version: MAIN_VERSION.to_string(),
            knowledge: config.knowledge.clone(),
            model: config.model.clone(),
            behavior: config.behavior.clone(),
            tool_ids: config.tool_ids.clone(),
            flow_ids: config.flow_ids.clone(),
            mcp_server_ids: config.mcp_server_ids.clone(),
            mcp_server_urls: config.mcp_server_urls.clone(),
            publish_status: PublishStatus::empty(),
            publish_data: None,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this row is the mutable main version.
    pub fn is_main(&self) -> bool {
        self.version == MAIN_VERSION
    }

    /// Project the record into its tenant-editable configuration.
    pub fn config(&self) -> BotConfig {
        BotConfig {
            tenant_id: self.tenant_id.clone(),
            bot_id: self.bot_id.clone(),
            knowledge: self.knowledge.clone(),
            model: self.model.clone(),
            behavior: self.behavior.clone(),
            tool_ids: self.tool_ids.clone(),
            flow_ids: self.flow_ids.clone(),
            mcp_server_ids: self.mcp_server_ids.clone(),
            mcp_server_urls: self.mcp_server_urls.clone(),
        }
    }

    /// Overwrite the mutable configuration fields from `config`.
    ///
    /// Identity fields (`tenant_id`, `bot_id`, `version`) and publish state
    /// are not touched.
    pub fn apply_config(&mut self, config: &BotConfig) {
        self.knowledge = config.knowledge.clone();
        self.model = config.model.clone();
        self.behavior = config.behavior.clone();
        self.tool_ids = config.tool_ids.clone();
        self.flow_ids = config.flow_ids.clone();
        self.mcp_server_ids = config.mcp_server_ids.clone();
        self.mcp_server_urls = config.mcp_server_urls.clone();
        self.updated_at = Utc::now();
    }

    /// Create a snapshot row labeled `version_label`, copying the mutable
    /// fields and the current publish state from this record.
    pub fn snapshot_as(&self, version_label: &str) -> Self {
        let now = Utc::now();
        Self {
            record_id: new_record_id(),
            version: version_label.to_string(),
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::Platform;

    fn sample_config() -> BotConfig {
        BotConfig {
            tenant_id: "app-1".to_string(),
            bot_id: "bot-1".to_string(),
            model: ModelConfig {
                model: Some("general-v3".to_string()),
                temperature: Some(0.5),
                ..Default::default()
            },
            tool_ids: vec!["tool-a".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn new_main_starts_unpublished() {
        let record = BotRecord::new_main(&sample_config());
        assert!(record.is_main());
        assert_eq!(record.version, MAIN_VERSION);
        assert!(record.publish_status.is_empty());
        assert!(record.publish_data.is_none());
        assert!(!record.deleted);
    }

    #[test]
    fn config_roundtrip_preserves_fields() {
        let config = sample_config();
        let record = BotRecord::new_main(&config);
        assert_eq!(record.config(), config);
    }

    #[test]
    fn apply_config_keeps_identity_and_publish_state() {
        let mut record = BotRecord::new_main(&sample_config());
        record.publish_status = record.publish_status.with(Platform::Market);

        let mut updated = sample_config();
        updated.tool_ids = vec!["tool-b".to_string()];
        record.apply_config(&updated);

        assert_eq!(record.tool_ids, vec!["tool-b".to_string()]);
        assert_eq!(record.version, MAIN_VERSION);
        assert!(record.publish_status.contains(Platform::Market));
    }

    #[test]
    fn snapshot_gets_fresh_identity_and_label() {
        let record = BotRecord::new_main(&sample_config());
        let snapshot = record.snapshot_as("v1.0");

        assert_ne!(snapshot.record_id, record.record_id);
        assert_eq!(snapshot.version, "v1.0");
        assert_eq!(snapshot.bot_id, record.bot_id);
        assert_eq!(snapshot.tenant_id, record.tenant_id);
        assert!(!snapshot.is_main());
    }

    #[test]
    fn bot_config_json_defaults_optional_sections() {
        let json = r#"{"tenant_id":"a","bot_id":"b"}"#;
        let config: BotConfig = serde_json::from_str(json).expect("parse");
        assert!(config.tool_ids.is_empty());
        assert_eq!(config.knowledge, KnowledgeConfig::default());
    }
}
