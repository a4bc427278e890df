//! PostgreSQL-backed relational store: the authoritative copy of every
//! memory, document, lesson, shared projection, agent, and audit record.
//!
//! Plain parameterized SQL against ordinary tables — no bespoke storage
//! extension. One transaction per mutating request; all entity id columns
//! are native `uuid`, json-ish columns are `jsonb`.

use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use memory_core::{
    Agent, AgentId, AuditRecord, Document, DocumentId, EntityIdType, EntityRef, Lesson, LessonId,
    LessonStatus, Memory, MemoryError, MemoryId, MemoryResult, Settings, SharedLesson,
    SharedMemory, StorageError, Timestamp,
};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::time::Duration;
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

/// Connection pool configuration, env-driven like the rest of the service's
/// config surface.
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
            dbname: "memory_service".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("MEMORY_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("MEMORY_DB_PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(5432),
            dbname: std::env::var("MEMORY_DB_NAME").unwrap_or_else(|_| "memory_service".to_string()),
            user: std::env::var("MEMORY_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("MEMORY_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("MEMORY_DB_POOL_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("MEMORY_DB_TIMEOUT").ok().and_then(|s| s.parse().ok()).unwrap_or(30),
            ),
        }
    }

    pub fn create_pool(&self) -> MemoryResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.manager = Some(ManagerConfig { recycling_method: RecyclingMethod::Fast });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| MemoryError::Storage(StorageError::Database(format!("failed to create pool: {e}"))))
    }
}

#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

fn db_err(e: impl std::fmt::Display) -> MemoryError {
    MemoryError::Storage(StorageError::Database(e.to_string()))
}

fn entities_from_json(value: JsonValue) -> Vec<EntityRef> {
    serde_json::from_value(value).unwrap_or_default()
}

fn entities_to_json(entities: &[EntityRef]) -> JsonValue {
    serde_json::to_value(entities).unwrap_or(JsonValue::Array(vec![]))
}

impl DbClient {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> MemoryResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn conn(&self) -> MemoryResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(db_err)
    }

    /// Trivial connectivity probe for readiness checks.
    pub async fn health_check(&self) -> MemoryResult<()> {
        let conn = self.conn().await?;
        conn.query_one("SELECT 1", &[]).await.map_err(db_err)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Memories
    // ------------------------------------------------------------------

    pub async fn memory_insert(&self, m: &Memory) -> MemoryResult<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO memories (id, timestamp, channel, raw_text, summary_text, \
             entities_json, metadata_json, has_documents, is_shared, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            &[
                &m.id.as_uuid(),
                &m.timestamp,
                &m.channel,
                &m.raw_text,
                &m.summary_text,
                &entities_to_json(&m.entities),
                &JsonValue::Object(m.metadata.clone().into_iter().collect()),
                &m.has_documents,
                &m.is_shared,
                &m.created_at,
                &m.updated_at,
            ],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Inserts a memory and its parsed attachments as one transaction
    ///: either all rows land or none do.
    pub async fn memory_insert_with_documents(
        &self,
        m: &Memory,
        documents: &[Document],
    ) -> MemoryResult<()> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(db_err)?;

        tx.execute(
            "INSERT INTO memories (id, timestamp, channel, raw_text, summary_text, \
             entities_json, metadata_json, has_documents, is_shared, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            &[
                &m.id.as_uuid(),
                &m.timestamp,
                &m.channel,
                &m.raw_text,
                &m.summary_text,
                &entities_to_json(&m.entities),
                &JsonValue::Object(m.metadata.clone().into_iter().collect()),
                &m.has_documents,
                &m.is_shared,
                &m.created_at,
                &m.updated_at,
            ],
        )
        .await
        .map_err(db_err)?;

        for d in documents {
            tx.execute(
                "INSERT INTO memory_documents (id, memory_id, filename, file_type, file_size, \
                 parsed_text, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
                &[
                    &d.id.as_uuid(),
                    &d.memory_id.as_uuid(),
                    &d.filename,
                    &d.file_type,
                    &d.file_size,
                    &d.parsed_text,
                    &d.created_at,
                ],
            )
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(|e| MemoryError::Storage(StorageError::TransactionFailed(e.to_string())))?;
        Ok(())
    }

    pub async fn memory_get(&self, id: MemoryId) -> MemoryResult<Option<Memory>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt("SELECT * FROM memories WHERE id = $1", &[&id.as_uuid()])
            .await
            .map_err(db_err)?;
        row.map(|r| row_to_memory(&r)).transpose()
    }

    pub async fn memory_mark_has_documents(&self, id: MemoryId) -> MemoryResult<()> {
        let conn = self.conn().await?;
        conn.execute("UPDATE memories SET has_documents = true WHERE id = $1", &[&id.as_uuid()])
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn memory_update_summary(&self, id: MemoryId, summary: &str) -> MemoryResult<()> {
        let conn = self.conn().await?;
        conn.execute(
            "UPDATE memories SET summary_text = $2, updated_at = now() WHERE id = $1",
            &[&id.as_uuid(), &summary],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Timeline query: memories in `[since, until]`, optionally filtered by
    /// channel, newest first.
    pub async fn memory_timeline(
        &self,
        since: Option<Timestamp>,
        until: Option<Timestamp>,
        channel: Option<&str>,
        limit: i64,
    ) -> MemoryResult<Vec<Memory>> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT * FROM memories \
                 WHERE ($1::timestamptz IS NULL OR timestamp >= $1) \
                   AND ($2::timestamptz IS NULL OR timestamp <= $2) \
                   AND ($3::text IS NULL OR channel = $3) \
                 ORDER BY timestamp DESC LIMIT $4",
                &[&since, &until, &channel, &limit],
            )
            .await
            .map_err(db_err)?;
        rows.iter().map(row_to_memory).collect()
    }

    /// Substring fallback search over raw/summary text, used by the admin
    /// retriever path when the embedding collaborator is unavailable.
    pub async fn memory_search_substring(&self, needle: &str, limit: i64) -> MemoryResult<Vec<Memory>> {
        let conn = self.conn().await?;
        let pattern = format!("%{}%", needle.replace('%', "\\%").replace('_', "\\_"));
        let rows = conn
            .query(
                "SELECT * FROM memories WHERE raw_text ILIKE $1 OR summary_text ILIKE $1 \
                 ORDER BY timestamp DESC LIMIT $2",
                &[&pattern, &limit],
            )
            .await
            .map_err(db_err)?;
        rows.iter().map(row_to_memory).collect()
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    pub async fn document_insert(
        &self,
        id: DocumentId,
        memory_id: MemoryId,
        filename: &str,
        file_type: &str,
        file_size: i64,
        parsed_text: Option<&str>,
    ) -> MemoryResult<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO memory_documents (id, memory_id, filename, file_type, file_size, parsed_text, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, now())",
            &[&id.as_uuid(), &memory_id.as_uuid(), &filename, &file_type, &file_size, &parsed_text],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn document_list_by_memory(&self, memory_id: MemoryId) -> MemoryResult<Vec<Row>> {
        let conn = self.conn().await?;
        conn.query(
            "SELECT * FROM memory_documents WHERE memory_id = $1 ORDER BY created_at ASC",
            &[&memory_id.as_uuid()],
        )
        .await
        .map_err(db_err)
    }

    // ------------------------------------------------------------------
    // Lessons
    // ------------------------------------------------------------------

    pub async fn lesson_insert(&self, l: &Lesson) -> MemoryResult<()> {
        let conn = self.conn().await?;
        let source_ids: Vec<Uuid> = l.source_memory_ids.iter().map(|id| id.as_uuid()).collect();
        conn.execute(
            "INSERT INTO memory_lessons (id, lesson_type, name, body, summary, status, is_shared, \
             related_entities_json, source_memory_ids_json, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            &[
                &l.id.as_uuid(),
                &l.lesson_type,
                &l.name,
                &l.body,
                &l.summary,
                &l.status.to_string(),
                &l.is_shared,
                &entities_to_json(&l.related_entities),
                &serde_json::to_value(&source_ids).unwrap(),
                &l.created_at,
                &l.updated_at,
            ],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn lesson_get(&self, id: LessonId) -> MemoryResult<Option<Lesson>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt("SELECT * FROM memory_lessons WHERE id = $1", &[&id.as_uuid()])
            .await
            .map_err(db_err)?;
        row.map(|r| row_to_lesson(&r)).transpose()
    }

    pub async fn lesson_list_by_status(&self, status: LessonStatus) -> MemoryResult<Vec<Lesson>> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT * FROM memory_lessons WHERE status = $1 ORDER BY created_at DESC",
                &[&status.to_string()],
            )
            .await
            .map_err(db_err)?;
        rows.iter().map(row_to_lesson).collect()
    }

    /// Lessons of any status created at or after `since`, used by the miner
    /// to decide whether an entity cluster already has a recent lesson.
    pub async fn lesson_list_since(&self, since: Timestamp) -> MemoryResult<Vec<Lesson>> {
        let conn = self.conn().await?;
        let rows = conn
            .query("SELECT * FROM memory_lessons WHERE created_at >= $1 ORDER BY created_at DESC", &[&since])
            .await
            .map_err(db_err)?;
        rows.iter().map(row_to_lesson).collect()
    }

    pub async fn lesson_update_status(&self, id: LessonId, status: LessonStatus) -> MemoryResult<()> {
        let conn = self.conn().await?;
        let n = conn
            .execute(
                "UPDATE memory_lessons SET status = $2, updated_at = now() WHERE id = $1",
                &[&id.as_uuid(), &status.to_string()],
            )
            .await
            .map_err(db_err)?;
        if n == 0 {
            return Err(MemoryError::NotFound(memory_core::NotFoundError::Lesson(id.to_string())));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Shared projections
    // ------------------------------------------------------------------

    pub async fn shared_memory_insert(&self, s: &SharedMemory) -> MemoryResult<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO memories_shared (id, original_memory_id, pii_stripped_text, summary_text, \
             channel, entities_json, metadata_json, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            &[
                &s.id.as_uuid(),
                &s.original_memory_id.as_uuid(),
                &s.scrubbed_text,
                &s.summary_text,
                &s.channel,
                &entities_to_json(&s.entities),
                &JsonValue::Object(s.metadata.clone().into_iter().collect()),
                &s.created_at,
            ],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn shared_lesson_insert(&self, s: &SharedLesson) -> MemoryResult<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO memory_lessons_shared (id, original_lesson_id, lesson_type, name, \
             pii_stripped_body, summary, related_entities_json, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            &[
                &s.id.as_uuid(),
                &s.original_lesson_id.as_uuid(),
                &s.lesson_type,
                &s.name,
                &s.pii_stripped_body,
                &s.summary,
                &entities_to_json(&s.related_entities),
                &s.created_at,
            ],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    pub async fn agent_insert(&self, a: &Agent) -> MemoryResult<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO memory_agents (id, name, api_key_hash, api_key_preview, access_level, \
             is_active, created_at, last_used) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            &[
                &a.id.as_uuid(),
                &a.name,
                &a.api_key_hash,
                &a.api_key_preview,
                &a.access_level.to_string(),
                &a.is_active,
                &a.created_at,
                &a.last_used,
            ],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn agent_get_by_key_hash(&self, hash: &str) -> MemoryResult<Option<Agent>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt("SELECT * FROM memory_agents WHERE api_key_hash = $1", &[&hash])
            .await
            .map_err(db_err)?;
        row.map(|r| row_to_agent(&r)).transpose()
    }

    pub async fn agent_list(&self) -> MemoryResult<Vec<Agent>> {
        let conn = self.conn().await?;
        let rows = conn
            .query("SELECT * FROM memory_agents ORDER BY created_at ASC", &[])
            .await
            .map_err(db_err)?;
        rows.iter().map(row_to_agent).collect()
    }

    pub async fn agent_touch_last_used(&self, id: AgentId) -> MemoryResult<()> {
        let conn = self.conn().await?;
        conn.execute("UPDATE memory_agents SET last_used = now() WHERE id = $1", &[&id.as_uuid()])
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn agent_set_active(&self, id: AgentId, is_active: bool) -> MemoryResult<()> {
        let conn = self.conn().await?;
        let n = conn
            .execute("UPDATE memory_agents SET is_active = $2 WHERE id = $1", &[&id.as_uuid(), &is_active])
            .await
            .map_err(db_err)?;
        if n == 0 {
            return Err(MemoryError::NotFound(memory_core::NotFoundError::Agent(id.to_string())));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Audit log
    // ------------------------------------------------------------------

    pub async fn audit_insert(&self, r: &AuditRecord) -> MemoryResult<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO memory_audit_log (id, agent_id, action, resource_type, resource_id, \
             details_json, timestamp) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &r.id.as_uuid(),
                &r.agent_id.map(|a| a.as_uuid()),
                &r.action,
                &r.resource_type,
                &r.resource_id,
                &r.details,
                &r.timestamp,
            ],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn audit_list_by_agent(&self, agent_id: AgentId, limit: i64) -> MemoryResult<Vec<Row>> {
        let conn = self.conn().await?;
        conn.query(
            "SELECT * FROM memory_audit_log WHERE agent_id = $1 ORDER BY timestamp DESC LIMIT $2",
            &[&agent_id.as_uuid(), &limit],
        )
        .await
        .map_err(db_err)
    }

    // ------------------------------------------------------------------
    // Settings (single row, id = 1)
    // ------------------------------------------------------------------

    pub async fn settings_get(&self) -> MemoryResult<Settings> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt("SELECT * FROM memory_settings WHERE id = 1", &[])
            .await
            .map_err(db_err)?;
        match row {
            Some(r) => row_to_settings(&r),
            None => Ok(Settings::default()),
        }
    }

    pub async fn settings_update(&self, s: &Settings) -> MemoryResult<()> {
        let conn = self.conn().await?;
        conn.execute(
            "UPDATE memory_settings SET chunk_size = $1, chunk_overlap = $2, auto_lesson_enabled = $3, \
             auto_lesson_threshold = $4, lesson_approval_required = $5, pii_scrubbing_enabled = $6, \
             auto_share_scrubbed = $7, openclaw_sync_enabled = $8, openclaw_sync_path = $9, \
             openclaw_sync_type = $10, openclaw_sync_frequency = $11, rate_limit_enabled = $12, \
             rate_limit_per_minute = $13, default_agent_access = $14, updated_at = now() WHERE id = 1",
            &[
                &s.chunk_size,
                &s.chunk_overlap,
                &s.auto_lesson_enabled,
                &s.auto_lesson_threshold,
                &s.lesson_approval_required,
                &s.pii_scrubbing_enabled,
                &s.auto_share_scrubbed,
                &s.openclaw_sync_enabled,
                &s.openclaw_sync_path,
                &s.openclaw_sync_type,
                &(s.openclaw_sync_frequency),
                &s.rate_limit_enabled,
                &(s.rate_limit_per_minute as i32),
                &s.default_agent_access,
            ],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

fn row_to_memory(row: &Row) -> MemoryResult<Memory> {
    let id: Uuid = row.get("id");
    Ok(Memory {
        id: MemoryId::new(id),
        timestamp: row.get("timestamp"),
        channel: row.get("channel"),
        raw_text: row.get("raw_text"),
        summary_text: row.get("summary_text"),
        entities: entities_from_json(row.get("entities_json")),
        metadata: json_to_map(row.get("metadata_json")),
        has_documents: row.get("has_documents"),
        is_shared: row.get("is_shared"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_lesson(row: &Row) -> MemoryResult<Lesson> {
    let id: Uuid = row.get("id");
    let status: String = row.get("status");
    let source_ids: JsonValue = row.get("source_memory_ids_json");
    let source_memory_ids: Vec<MemoryId> = serde_json::from_value::<Vec<Uuid>>(source_ids)
        .unwrap_or_default()
        .into_iter()
        .map(MemoryId::new)
        .collect();
    Ok(Lesson {
        id: LessonId::new(id),
        lesson_type: row.get("lesson_type"),
        name: row.get("name"),
        body: row.get("body"),
        summary: row.get("summary"),
        status: LessonStatus::from_str(&status).map_err(|e| db_err(e))?,
        is_shared: row.get("is_shared"),
        related_entities: entities_from_json(row.get("related_entities_json")),
        source_memory_ids,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_agent(row: &Row) -> MemoryResult<Agent> {
    let id: Uuid = row.get("id");
    let access_level: String = row.get("access_level");
    Ok(Agent {
        id: AgentId::new(id),
        name: row.get("name"),
        api_key_hash: row.get("api_key_hash"),
        api_key_preview: row.get("api_key_preview"),
        access_level: memory_core::AccessLevel::from_str(&access_level).map_err(|e| db_err(e))?,
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        last_used: row.get("last_used"),
    })
}

fn row_to_settings(row: &Row) -> MemoryResult<Settings> {
    Ok(Settings {
        chunk_size: row.get("chunk_size"),
        chunk_overlap: row.get("chunk_overlap"),
        auto_lesson_enabled: row.get("auto_lesson_enabled"),
        auto_lesson_threshold: row.get("auto_lesson_threshold"),
        lesson_approval_required: row.get("lesson_approval_required"),
        pii_scrubbing_enabled: row.get("pii_scrubbing_enabled"),
        auto_share_scrubbed: row.get("auto_share_scrubbed"),
        openclaw_sync_enabled: row.get("openclaw_sync_enabled"),
        openclaw_sync_path: row.get("openclaw_sync_path"),
        openclaw_sync_type: row.get("openclaw_sync_type"),
        openclaw_sync_frequency: row.get("openclaw_sync_frequency"),
        rate_limit_enabled: row.get("rate_limit_enabled"),
        rate_limit_per_minute: row.get::<_, i32>("rate_limit_per_minute") as u32,
        default_agent_access: row.get("default_agent_access"),
    })
}

fn json_to_map(value: JsonValue) -> std::collections::HashMap<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map.into_iter().collect(),
        _ => std::collections::HashMap::new(),
    }
}
