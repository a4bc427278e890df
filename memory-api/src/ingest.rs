//! The ingest pipeline: `POST /interactions`.
//!
//! Eight steps, each with its own failure semantics:
//! validation and ID allocation fail fast; attachment parsing never fails
//! the request; enrichment degrades independently per sub-step; the
//! relational write is one transaction; the vector upsert runs after that
//! transaction commits and a failure there is logged, not surfaced, since
//! the interaction is already durably stored and can be re-indexed later.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use memory_core::{
    chunk_text, AccessLevel, AgentId, AuditAction, AuditRecord, ChannelType, Document, DocumentId,
    EntityIdType, EntityRef, InputError, Memory, MemoryError, MemoryId, MemoryResult, Settings,
    SharedMemory, SharedMemoryId,
};
use memory_llm::{ChatProvider, EmbeddingProvider, RedactionProvider};
use memory_storage::{DbClient, VectorPoint, VectorStoreClient};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::config::{COLLECTION_INTERACTIONS, COLLECTION_INTERACTIONS_SHARED};
use crate::{docparser, enrich};

/// One attachment as received over the wire: raw bytes plus the metadata
/// the multipart form carried alongside them.
pub struct RawAttachment {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub struct IngestRequest {
    pub agent_id: AgentId,
    pub access_level: AccessLevel,
    pub text: String,
    pub channel: String,
    pub entities: Vec<EntityRef>,
    pub metadata: HashMap<String, JsonValue>,
    pub attachments: Vec<RawAttachment>,
}

pub struct IngestOutcome {
    pub memory: Memory,
    /// Filenames whose parsing degraded to empty text.
    pub failed_attachments: Vec<String>,
    pub redaction_failed: bool,
}

pub struct Ingestor {
    pub db: DbClient,
    pub vector: Arc<VectorStoreClient>,
    pub chat: Arc<dyn ChatProvider>,
    pub embed: Arc<dyn EmbeddingProvider>,
    pub redact: Arc<dyn RedactionProvider>,
}

impl Ingestor {
    /// Runs the full pipeline. Everything through the relational commit is
    /// part of the method's "did it happen" contract; the post-commit
    /// vector upsert is best-effort and never changes the `Ok` result.
    pub async fn ingest(&self, req: IngestRequest, settings: &Settings) -> MemoryResult<IngestOutcome> {
        // 1. validate & allocate
        let channel = validate(&req.text, &req.channel)?;
        let memory_id = MemoryId::now_v7();
        let now = Utc::now();

        // 2. parse attachments
        let mut documents = Vec::with_capacity(req.attachments.len());
        let mut failed_attachments = Vec::new();
        let mut attachment_text = String::new();
        for attachment in &req.attachments {
            let parsed =
                docparser::parse_attachment(&attachment.filename, &attachment.mime_type, &attachment.bytes, &self.chat)
                    .await;
            if parsed.parse_failed {
                failed_attachments.push(attachment.filename.clone());
            } else {
                attachment_text.push('\n');
                attachment_text.push_str(&parsed.text);
            }
            documents.push(Document {
                id: DocumentId::now_v7(),
                memory_id,
                filename: attachment.filename.clone(),
                file_type: attachment.mime_type.clone(),
                file_size: attachment.bytes.len() as i64,
                parsed_text: parsed.text,
                created_at: now,
            });
        }

        let full_text = if attachment_text.is_empty() {
            req.text.clone()
        } else {
            format!("{}\n{}", req.text, attachment_text)
        };

        // 3. enrich
        let summary = enrich::summarize(&full_text, &self.chat).await;
        let mut entities = req.entities;
        if entities.is_empty() {
            entities.extend(enrich::extract_entities(&full_text, &self.chat).await);
        }
        dedup_entities(&mut entities);

        let memory = Memory {
            id: memory_id,
            timestamp: now,
            channel: channel.to_string(),
            raw_text: req.text.clone(),
            summary_text: summary,
            entities,
            metadata: req.metadata,
            has_documents: !documents.is_empty(),
            is_shared: false,
            created_at: now,
            updated_at: now,
        };

        // 4. chunk & embed
        let chunks = chunk_text(&full_text, settings.chunk_size, settings.chunk_overlap);
        let mut points = Vec::with_capacity(chunks.len());
        let mut embed_ok = true;
        for (idx, chunk) in chunks.iter().enumerate() {
            match self.embed.embed(chunk).await {
                Ok(vector) => points.push(VectorPoint {
                    id: format!("{memory_id}:{idx}"),
                    vector: vector.data,
                    payload: chunk_payload(&memory, chunk),
                }),
                Err(e) => {
                    warn!(error = %e, memory_id = %memory_id, "embedding failed for chunk, skipping vector index for it");
                    embed_ok = false;
                }
            }
        }

        // 5. optional shared projection — only when PII scrubbing is on and
        // auto-share is enabled; the access level of the original memory
        // plays no part in this decision.
        let share_enabled = settings.pii_scrubbing_enabled && settings.auto_share_scrubbed;

        let (redacted_text, redaction_failed) = if share_enabled {
            enrich::redact(&full_text, &self.redact).await
        } else {
            (String::new(), false)
        };

        let shared_memory = if share_enabled {
            Some(SharedMemory {
                id: SharedMemoryId::now_v7(),
                original_memory_id: memory_id,
                timestamp: now,
                channel: memory.channel.clone(),
                scrubbed_text: redacted_text,
                summary_text: memory.summary_text.clone(),
                has_documents: memory.has_documents,
                entities: memory.entities.clone(),
                metadata: memory.metadata.clone(),
                created_at: now,
            })
        } else {
            None
        };

        // 6. persist relational (transaction)
        self.db.memory_insert_with_documents(&memory, &documents).await?;
        if let Some(shared) = &shared_memory {
            self.db.shared_memory_insert(shared).await?;
        }

        // 7. persist vector (post-commit, best-effort)
        if !points.is_empty() {
            if let Err(e) = self.vector.upsert(COLLECTION_INTERACTIONS, points).await {
                warn!(error = %e, memory_id = %memory_id, "vector upsert failed after commit, interaction stored without a vector index");
            }
        }
        if let Some(shared) = &shared_memory {
            if embed_ok {
                if let Ok(vector) = self.embed.embed(&shared.scrubbed_text).await {
                    let point = VectorPoint {
                        id: shared.id.to_string(),
                        vector: vector.data,
                        payload: shared_chunk_payload(shared),
                    };
                    if let Err(e) = self.vector.upsert(COLLECTION_INTERACTIONS_SHARED, vec![point]).await {
                        warn!(error = %e, shared_memory_id = %shared.id, "shared vector upsert failed after commit");
                    }
                }
            }
        }

        // 8. audit
        let audit = AuditRecord {
            id: memory_core::AuditId::now_v7(),
            agent_id: Some(req.agent_id),
            action: AuditAction::Ingest.to_string(),
            resource_type: Some("memory".to_string()),
            resource_id: Some(memory_id.to_string()),
            details: serde_json::json!({ "failed_attachments": failed_attachments, "redaction_failed": redaction_failed }),
            timestamp: now,
        };
        if let Err(e) = self.db.audit_insert(&audit).await {
            warn!(error = %e, memory_id = %memory_id, "audit log write failed");
        }

        Ok(IngestOutcome { memory, failed_attachments, redaction_failed })
    }
}

/// Validation step of the pipeline, kept pure and separate so it can be
/// tested without a database.
fn validate(text: &str, channel: &str) -> MemoryResult<ChannelType> {
    if text.trim().is_empty() {
        return Err(MemoryError::Input(InputError::MissingField("text")));
    }
    channel.parse().map_err(|_| {
        MemoryError::Input(InputError::InvalidValue {
            field: "channel".to_string(),
            reason: format!("unrecognized channel '{channel}'"),
        })
    })
}

fn dedup_entities(entities: &mut Vec<EntityRef>) {
    let mut seen = std::collections::HashSet::new();
    entities.retain(|e| seen.insert((e.entity_type, e.entity_id.clone())));
}

fn chunk_payload(memory: &Memory, chunk: &str) -> JsonValue {
    serde_json::json!({
        "memory_id": memory.id.to_string(),
        "channel": memory.channel,
        "timestamp": memory.timestamp.timestamp(),
        "entity_types": memory.entities.iter().map(|e| e.entity_type.to_string()).collect::<Vec<_>>(),
        "text": chunk,
        "is_shared": false,
    })
}

fn shared_chunk_payload(shared: &SharedMemory) -> JsonValue {
    serde_json::json!({
        "shared_memory_id": shared.id.to_string(),
        "memory_id": shared.original_memory_id.to_string(),
        "channel": shared.channel,
        "timestamp": shared.timestamp.timestamp(),
        "entity_types": shared.entities.iter().map(|e| e.entity_type.to_string()).collect::<Vec<_>>(),
        "text": shared.scrubbed_text,
        "is_shared": true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_entities_removes_exact_duplicates() {
        use memory_core::EntityType;
        let mut entities = vec![
            EntityRef { entity_type: EntityType::Contact, entity_id: "c-1".to_string(), role: "a".to_string() },
            EntityRef { entity_type: EntityType::Contact, entity_id: "c-1".to_string(), role: "b".to_string() },
            EntityRef { entity_type: EntityType::Organization, entity_id: "c-1".to_string(), role: "c".to_string() },
        ];
        dedup_entities(&mut entities);
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn validate_rejects_blank_text() {
        let err = validate("   ", "email").unwrap_err();
        assert!(matches!(err, MemoryError::Input(InputError::MissingField("text"))));
    }

    #[test]
    fn validate_rejects_unknown_channel() {
        let err = validate("hello", "carrier-pigeon").unwrap_err();
        assert!(matches!(err, MemoryError::Input(InputError::InvalidValue { .. })));
    }

    #[test]
    fn validate_accepts_known_channel() {
        let channel = validate("hello", "email").unwrap();
        assert_eq!(channel, ChannelType::Email);
    }
}
