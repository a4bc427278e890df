//! Core entity structures for the memory service.

use crate::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A structural citation embedded in a Memory or Lesson, not a first-class row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub role: String,
}

/// One raw interaction pushed by an agent.
///
/// Immutable after ingest except for `is_shared`, which flips when a
/// SharedMemory projection is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Memory {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: MemoryId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
    pub channel: String,
    pub raw_text: String,
    pub summary_text: String,
    pub entities: Vec<EntityRef>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub has_documents: bool,
    pub is_shared: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// A parsed attachment, owned exclusively by its Memory (cascade on delete).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Document {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: DocumentId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub memory_id: MemoryId,
    pub filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub parsed_text: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

/// A PII-redacted projection of a Memory. Holds a weak reference to its
/// origin: deleting the Memory does not cascade to its SharedMemory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SharedMemory {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: SharedMemoryId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub original_memory_id: MemoryId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
    pub channel: String,
    pub scrubbed_text: String,
    pub summary_text: String,
    pub has_documents: bool,
    pub entities: Vec<EntityRef>,
    pub metadata: HashMap<String, serde_json::Value>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

/// A distilled insight, created by an agent, admin, or the background miner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Lesson {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: LessonId,
    pub lesson_type: String,
    pub name: String,
    pub body: String,
    pub summary: String,
    pub status: LessonStatus,
    pub is_shared: bool,
    pub related_entities: Vec<EntityRef>,
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub source_memory_ids: Vec<MemoryId>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// Shared-pool projection of an approved Lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SharedLesson {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: SharedLessonId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub original_lesson_id: LessonId,
    pub lesson_type: String,
    pub name: String,
    pub pii_stripped_body: String,
    pub summary: String,
    pub related_entities: Vec<EntityRef>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

/// Credential record for an agent caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Agent {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: AgentId,
    pub name: String,
    /// hex-encoded SHA-256 digest of the raw key; never the raw key itself.
    pub api_key_hash: String,
    /// first/last few characters of the raw key, for display only.
    pub api_key_preview: String,
    pub access_level: AccessLevel,
    pub is_active: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub last_used: Option<Timestamp>,
}

/// Append-only audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuditRecord {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: AuditId,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub agent_id: Option<AgentId>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub details: serde_json::Value,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
}

/// Singleton, admin-editable service configuration.
///
/// Served through a read-through cache (see `memory_storage::SettingsCache`)
/// rather than a process-wide mutable singleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Settings {
    pub chunk_size: i32,
    pub chunk_overlap: i32,
    pub auto_lesson_enabled: bool,
    pub auto_lesson_threshold: i32,
    pub lesson_approval_required: bool,
    pub pii_scrubbing_enabled: bool,
    pub auto_share_scrubbed: bool,
    pub openclaw_sync_enabled: bool,
    pub openclaw_sync_path: String,
    pub openclaw_sync_type: String,
    pub openclaw_sync_frequency: i32,
    pub rate_limit_enabled: bool,
    pub rate_limit_per_minute: u32,
    pub default_agent_access: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: 400,
            chunk_overlap: 80,
            auto_lesson_enabled: true,
            auto_lesson_threshold: 5,
            lesson_approval_required: true,
            pii_scrubbing_enabled: true,
            auto_share_scrubbed: false,
            openclaw_sync_enabled: false,
            openclaw_sync_path: String::new(),
            openclaw_sync_type: "filesystem".to_string(),
            openclaw_sync_frequency: 5,
            rate_limit_enabled: false,
            rate_limit_per_minute: 60,
            default_agent_access: "private".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.chunk_size, 400);
        assert_eq!(s.chunk_overlap, 80);
        assert_eq!(s.auto_lesson_threshold, 5);
        assert_eq!(s.rate_limit_per_minute, 60);
        assert_eq!(s.default_agent_access, "private");
    }
}
