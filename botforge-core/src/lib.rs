//! Botforge Core - Entity Types
//!
//! Pure data structures for bot configurations, publish state, and the
//! service error taxonomy. All other crates depend on this. This crate
//! contains ONLY data types - no business logic and no I/O.

pub mod error;
pub mod publish;
pub mod types;

pub use error::{bot_context, BotError, BotResult};
pub use publish::{Platform, PublishOperation, PublishStatus};
pub use types::{
    new_record_id, BehaviorConfig, BotConfig, BotRecord, KnowledgeConfig, ModelConfig,
    Timestamp, MAIN_VERSION,
};
