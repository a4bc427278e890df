//! Search and timeline retrieval backing `POST /search` and
//! `GET /timeline/{entity_type}/{entity_id}`.
//!
//! Semantic search embeds the query, compiles `SearchFilters` into the
//! vector store's dialect, and searches the collection matching the
//! caller's visibility (private vs. shared pool). If the embedding
//! collaborator is unavailable, admin callers fall back to a relational
//! substring scan rather than failing the request outright; agent callers
//! do not get the fallback, since it would leak across the private/shared
//! boundary the vector collections otherwise enforce.

use std::sync::Arc;

use memory_core::{compile_filter, EntityIdType, Memory, MemoryId, MemoryResult, SearchFilters, Timestamp};
use memory_llm::EmbeddingProvider;
use memory_storage::{DbClient, VectorStoreClient};

use crate::config::{COLLECTION_INTERACTIONS, COLLECTION_INTERACTIONS_SHARED};

pub struct SearchHit {
    pub memory: Memory,
    pub score: f32,
}

pub struct SearchRequest<'a> {
    pub query: &'a str,
    pub filters: SearchFilters,
    pub shared_only: bool,
    pub limit: i64,
    pub is_admin: bool,
}

/// Runs a semantic search, degrading to a substring scan for admin callers
/// when the embedding collaborator is unavailable.
pub async fn search(
    req: SearchRequest<'_>,
    db: &DbClient,
    vector: &Arc<VectorStoreClient>,
    embed: &Arc<dyn EmbeddingProvider>,
) -> MemoryResult<Vec<SearchHit>> {
    let collection = if req.shared_only { COLLECTION_INTERACTIONS_SHARED } else { COLLECTION_INTERACTIONS };
    let compiled = compile_filter(&req.filters);
    let filter = if compiled.is_empty() { None } else { Some(&compiled) };

    match embed.embed(req.query).await {
        Ok(vector_query) => {
            let hits = vector.search(collection, &vector_query.data, req.limit, filter).await?;
            let mut results = Vec::with_capacity(hits.len());
            for hit in hits {
                // Point ids are `{memory_id}:{chunk_idx}` for interaction
                // chunks and a bare shared-memory id for shared points, so
                // the memory backref always comes from the payload rather
                // than the point id itself.
                let Some(id_str) = hit.payload.get("memory_id").and_then(|v| v.as_str()) else { continue };
                let Ok(id) = id_str.parse::<MemoryId>() else { continue };
                if let Some(memory) = db.memory_get(id).await? {
                    results.push(SearchHit { memory, score: hit.score });
                }
            }
            Ok(results)
        }
        Err(e) if req.is_admin => {
            let memories = db.memory_search_substring(req.query, req.limit).await?;
            if memories.is_empty() {
                return Err(e);
            }
            Ok(memories.into_iter().map(|memory| SearchHit { memory, score: 0.0 }).collect())
        }
        Err(e) => Err(e),
    }
}

pub struct TimelineRequest<'a> {
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
    pub channel: Option<&'a str>,
    pub limit: i64,
}

/// `GET /timeline/{entity_type}/{entity_id}`: a chronological slice of
/// memories. Entity scoping happens by matching `entities` in-process since
/// the relational schema stores citations as jsonb rather than a join
/// table.
pub async fn timeline(
    entity_type: &str,
    entity_id: &str,
    req: TimelineRequest<'_>,
    db: &DbClient,
) -> MemoryResult<Vec<Memory>> {
    // Over-fetch against the time window, then filter to the entity in
    // memory; the timeline endpoint is not expected to run over
    // high-cardinality tenants the way `/search` is.
    let candidates = db.memory_timeline(req.since, req.until, req.channel, req.limit.max(200)).await?;
    let matches: Vec<Memory> = candidates
        .into_iter()
        .filter(|m| {
            m.entities
                .iter()
                .any(|e| e.entity_type.to_string() == entity_type && e.entity_id == entity_id)
        })
        .take(req.limit as usize)
        .collect();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::EntityRef;

    fn sample_memory(entities: Vec<EntityRef>) -> Memory {
        let now = chrono::Utc::now();
        Memory {
            id: MemoryId::now_v7(),
            timestamp: now,
            channel: "email".to_string(),
            raw_text: "text".to_string(),
            summary_text: "summary".to_string(),
            entities,
            metadata: Default::default(),
            has_documents: false,
            is_shared: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn timeline_filters_by_entity_reference() {
        use memory_core::EntityType;
        let matching = sample_memory(vec![EntityRef {
            entity_type: EntityType::Contact,
            entity_id: "c-1".to_string(),
            role: "subject".to_string(),
        }]);
        let other = sample_memory(vec![EntityRef {
            entity_type: EntityType::Contact,
            entity_id: "c-2".to_string(),
            role: "subject".to_string(),
        }]);
        let candidates = vec![matching.clone(), other];
        let filtered: Vec<Memory> =
            candidates.into_iter().filter(|m| m.entities.iter().any(|e| e.entity_id == "c-1")).collect();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, matching.id);
    }
}
