//! PostgreSQL connection pool and the durable repository implementation.
//!
//! The `bot_config` table schema lives in `schema.sql` next to this crate.
//! Rows keep the editable configuration as one JSONB document; identity and
//! publish columns are first-class so queries never parse JSON.

use async_trait::async_trait;
use botforge_core::{BotConfig, BotError, BotRecord, BotResult, PublishStatus, MAIN_VERSION};
use botforge_storage::ConfigRepository;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub max_size: usize,
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "botforge".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Load from `BOTFORGE_DB_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("BOTFORGE_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("BOTFORGE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("BOTFORGE_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("BOTFORGE_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("BOTFORGE_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("BOTFORGE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: Duration::from_secs(
                std::env::var("BOTFORGE_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> BotResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|err| BotError::storage(err.to_string(), "create pool"))
    }
}

// ============================================================================
// POSTGRES REPOSITORY
// ============================================================================

const RECORD_COLUMNS: &str = "record_id, tenant_id, bot_id, version, config, \
     publish_status, publish_data, deleted, created_at, updated_at";

/// [`ConfigRepository`] backed by the `bot_config` table.
#[derive(Clone)]
pub struct PgConfigRepository {
    pool: Pool,
}

impl PgConfigRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn client(&self) -> BotResult<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|err| BotError::storage(err.to_string(), "acquire connection"))
    }

    fn row_to_record(row: &Row) -> BotResult<BotRecord> {
        let config: serde_json::Value = row.get("config");
        let config: BotConfig = serde_json::from_value(config).map_err(|err| {
            BotError::data_corruption(format!(
                "bot_id:{} stored config: {err}",
                row.get::<_, String>("bot_id")
            ))
        })?;
        Ok(BotRecord {
            record_id: row.get("record_id"),
            tenant_id: row.get("tenant_id"),
            bot_id: row.get("bot_id"),
            version: row.get("version"),
            knowledge: config.knowledge,
            model: config.model,
            behavior: config.behavior,
            tool_ids: config.tool_ids,
            flow_ids: config.flow_ids,
            mcp_server_ids: config.mcp_server_ids,
            mcp_server_urls: config.mcp_server_urls,
            publish_status: PublishStatus::from_bits(row.get::<_, i64>("publish_status")),
            publish_data: row.get("publish_data"),
            deleted: row.get("deleted"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn encode_config(record: &BotRecord) -> BotResult<serde_json::Value> {
        serde_json::to_value(record.config()).map_err(|err| {
            BotError::internal(format!("bot_id:{} config serialize: {err}", record.bot_id))
        })
    }

    async fn write_main(
        tx: &deadpool_postgres::Transaction<'_>,
        main: &BotRecord,
    ) -> BotResult<()> {
        let config = Self::encode_config(main)?;
        let updated = tx
            .execute(
                "UPDATE bot_config SET version = $2, config = $3, publish_status = $4, \
                 publish_data = $5, updated_at = $6 WHERE record_id = $1 AND NOT deleted",
                &[
                    &main.record_id,
                    &main.version,
                    &config,
                    &main.publish_status.bits(),
                    &main.publish_data,
                    &main.updated_at,
                ],
            )
            .await
            .map_err(|err| BotError::storage(err.to_string(), "update main row"))?;
        if updated != 1 {
            return Err(BotError::storage(
                "main row not found",
                format!("record_id:{}", main.record_id),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigRepository for PgConfigRepository {
    async fn find(
        &self,
        bot_id: &str,
        tenant_id: Option<&str>,
        version: Option<&str>,
    ) -> BotResult<Option<BotRecord>> {
        let client = self.client().await?;

        let mut sql = format!(
            "SELECT {RECORD_COLUMNS} FROM bot_config WHERE bot_id = $1 AND NOT deleted"
        );
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&bot_id];
        if let Some(tenant) = tenant_id.as_ref() {
            sql.push_str(&format!(" AND tenant_id = ${}", params.len() + 1));
            params.push(tenant);
        }
        if let Some(version) = version.as_ref() {
            sql.push_str(&format!(" AND version = ${}", params.len() + 1));
            params.push(version);
        }
        // Main row first when no version filter is given.
        sql.push_str(&format!(
            " ORDER BY (version = '{MAIN_VERSION}') DESC, created_at ASC LIMIT 1"
        ));

        let row = client
            .query_opt(&sql, &params)
            .await
            .map_err(|err| BotError::storage(err.to_string(), "find bot config"))?;
        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn insert(&self, record: &BotRecord) -> BotResult<()> {
        let client = self.client().await?;
        let config = Self::encode_config(record)?;
        client
            .execute(
                "INSERT INTO bot_config (record_id, tenant_id, bot_id, version, config, \
                 publish_status, publish_data, deleted, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                &[
                    &record.record_id,
                    &record.tenant_id,
                    &record.bot_id,
                    &record.version,
                    &config,
                    &record.publish_status.bits(),
                    &record.publish_data,
                    &record.deleted,
                    &record.created_at,
                    &record.updated_at,
                ],
            )
            .await
            .map_err(|err| BotError::storage(err.to_string(), "insert bot config"))?;
        Ok(())
    }

    async fn update(&self, record: &BotRecord) -> BotResult<()> {
        let mut client = self.client().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|err| BotError::storage(err.to_string(), "begin transaction"))?;
        Self::write_main(&tx, record).await?;
        tx.commit()
            .await
            .map_err(|err| BotError::storage(err.to_string(), "commit update"))
    }

    async fn commit_publish(
        &self,
        main: &BotRecord,
        snapshot: Option<&BotRecord>,
    ) -> BotResult<()> {
        let mut client = self.client().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|err| BotError::storage(err.to_string(), "begin transaction"))?;

        Self::write_main(&tx, main).await?;

        if let Some(snapshot) = snapshot {
            let config = Self::encode_config(snapshot)?;
            tx.execute(
                "INSERT INTO bot_config (record_id, tenant_id, bot_id, version, config, \
                 publish_status, publish_data, deleted, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                 ON CONFLICT (record_id) DO UPDATE SET config = EXCLUDED.config, \
                 publish_status = EXCLUDED.publish_status, \
                 publish_data = EXCLUDED.publish_data, \
                 updated_at = EXCLUDED.updated_at",
                &[
                    &snapshot.record_id,
                    &snapshot.tenant_id,
                    &snapshot.bot_id,
                    &snapshot.version,
                    &config,
                    &snapshot.publish_status.bits(),
                    &snapshot.publish_data,
                    &snapshot.deleted,
                    &snapshot.created_at,
                    &snapshot.updated_at,
                ],
            )
            .await
            .map_err(|err| BotError::storage(err.to_string(), "upsert snapshot row"))?;
        }

        tx.commit()
            .await
            .map_err(|err| BotError::storage(err.to_string(), "commit publish"))
    }

    async fn delete_versions(&self, tenant_id: &str, bot_id: &str) -> BotResult<u64> {
        let client = self.client().await?;
        client
            .execute(
                "UPDATE bot_config SET deleted = TRUE, updated_at = now() \
                 WHERE tenant_id = $1 AND bot_id = $2 AND NOT deleted",
                &[&tenant_id, &bot_id],
            )
            .await
            .map_err(|err| BotError::storage(err.to_string(), "delete bot config"))
    }
}
