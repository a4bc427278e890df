//! Background loop: export snapshot, lesson mining, and
//! rate-limit window GC, run on a fixed period for as long as the process
//! lives.
//!
//! Runs on a `tokio::time::interval` with `MissedTickBehavior::Skip` so a
//! slow cycle doesn't queue up a burst of catch-up ticks, racing a
//! `tokio::select!` against a `watch::Receiver<bool>` for graceful
//! shutdown, with per-activity timeouts so one stuck collaborator call
//! doesn't starve the others in the same cycle.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use memory_core::{EntityIdType, Lesson, LessonId, LessonStatus, Memory, MemoryError, MemoryResult, StorageError};
use memory_llm::{ChatMessage, ChatProvider, EmbeddingProvider};
use memory_storage::{DbClient, VectorPoint, VectorStoreClient};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::COLLECTION_LESSONS;
use crate::constants::{BACKGROUND_LOOP_PERIOD_SECS, EXPORT_SNAPSHOT_TIMEOUT_SECS, LESSON_MINING_TIMEOUT_SECS};
use crate::gate::RateLimiter;

/// Interactions older than this never feed a new lesson cluster.
const LESSON_MINING_WINDOW_DAYS: i64 = 7;
/// Memories older than this drop out of the exported snapshot.
const SNAPSHOT_WINDOW_DAYS: i64 = 30;
/// At most this many of a cluster's most recent interactions are sent to
/// the lesson-extraction prompt.
const LESSON_MINING_SAMPLE_SIZE: usize = 10;

pub struct BackgroundLoop {
    pub db: DbClient,
    pub vector: Arc<VectorStoreClient>,
    pub chat: Arc<dyn ChatProvider>,
    pub embed: Arc<dyn EmbeddingProvider>,
    pub rate_limiter: Arc<RateLimiter>,
    pub snapshot_dir: Option<PathBuf>,
}

impl BackgroundLoop {
    /// Runs cycles until `shutdown` reports `true`. Each activity's failure
    /// is isolated: one failing does not prevent the others from running in
    /// the same cycle, and cycles keep firing on a fixed period regardless.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(BACKGROUND_LOOP_PERIOD_SECS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.run_cycle().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("background loop shutting down");
                        return;
                    }
                }
            }
        }
    }

    async fn run_cycle(&self) {
        info!("background loop cycle starting");

        let settings = match self.db.settings_get().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "could not load settings for background cycle, skipping export and mining");
                self.rate_limiter.gc().await;
                return;
            }
        };

        if settings.openclaw_sync_enabled {
            let dir = self
                .snapshot_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(&settings.openclaw_sync_path));
            match tokio::time::timeout(Duration::from_secs(EXPORT_SNAPSHOT_TIMEOUT_SECS), export_snapshot(&self.db, &dir))
                .await
            {
                Ok(Ok(())) => info!("export snapshot complete"),
                Ok(Err(e)) => error!(error = %e, "export snapshot failed"),
                Err(_) => error!("export snapshot timed out"),
            }
        }

        if settings.auto_lesson_enabled {
            match tokio::time::timeout(
                Duration::from_secs(LESSON_MINING_TIMEOUT_SECS),
                self.mine_lessons(settings.auto_lesson_threshold),
            )
            .await
            {
                Ok(Ok(n)) => info!(new_lessons = n, "lesson mining complete"),
                Ok(Err(e)) => error!(error = %e, "lesson mining failed"),
                Err(_) => error!("lesson mining timed out"),
            }
        }

        self.rate_limiter.gc().await;
        info!("background loop cycle complete");
    }

    /// Groups recent memories by their entity references; any cluster
    /// reaching `threshold` interactions in the mining window produces one
    /// draft lesson, unless that entity already has a lesson from the same
    /// window. Dedup compares canonicalized entity keys rather than raw
    /// JSON, since field order and whitespace in the stored entities_json
    /// are not semantically meaningful.
    async fn mine_lessons(&self, threshold: i32) -> MemoryResult<usize> {
        let since = Utc::now() - chrono::Duration::days(LESSON_MINING_WINDOW_DAYS);
        let recent = self.db.memory_timeline(Some(since), None, None, 1000).await?;
        let existing = self.db.lesson_list_since(since).await?;
        let existing_keys = existing_lesson_entity_keys(&existing);

        let mut groups: std::collections::HashMap<String, Vec<&Memory>> = std::collections::HashMap::new();
        for memory in &recent {
            for entity in &memory.entities {
                groups.entry(entity_key(&entity.entity_type.to_string(), &entity.entity_id)).or_default().push(memory);
            }
        }

        let mut created = 0usize;
        for (key, mut memories) in groups {
            if memories.len() < threshold as usize {
                continue;
            }
            if existing_keys.contains(&key) {
                continue;
            }

            let cluster_size = memories.len();
            memories.sort_by_key(|m| std::cmp::Reverse(m.timestamp));
            memories.truncate(LESSON_MINING_SAMPLE_SIZE);

            let Some(extracted) = self.extract_lesson(&memories).await else {
                warn!(entity_key = %key, "lesson extraction failed or returned an unparseable response, skipping cluster");
                continue;
            };

            let related_entities = memories[0].entities.clone();
            let source_memory_ids = memories.iter().map(|m| m.id).collect();
            let now = Utc::now();
            let lesson = Lesson {
                id: LessonId::now_v7(),
                lesson_type: extracted.lesson_type,
                name: extracted.name,
                body: extracted.body,
                summary: format!("{cluster_size} related interactions"),
                status: LessonStatus::Draft,
                is_shared: false,
                related_entities,
                source_memory_ids,
                created_at: now,
                updated_at: now,
            };
            self.db.lesson_insert(&lesson).await?;
            self.upsert_lesson_embedding(&lesson).await;
            created += 1;
        }

        Ok(created)
    }

    async fn extract_lesson(&self, memories: &[&Memory]) -> Option<ExtractedLesson> {
        let transcript = memories
            .iter()
            .map(|m| format!("- [{}] {}", m.timestamp.to_rfc3339(), m.summary_text))
            .collect::<Vec<_>>()
            .join("\n");
        let messages = vec![ChatMessage::system(LESSON_EXTRACTION_PROMPT), ChatMessage::user(transcript)];

        let response = self.chat.complete(messages, 400, 0.2).await.ok()?;
        parse_extracted_lesson(&response)
    }

    async fn upsert_lesson_embedding(&self, lesson: &Lesson) {
        let Ok(vector) = self.embed.embed(&lesson.body).await else {
            warn!(lesson_id = %lesson.id, "lesson embedding failed, lesson stored without a vector index");
            return;
        };
        let point = VectorPoint {
            id: lesson.id.to_string(),
            vector: vector.data,
            payload: serde_json::json!({
                "lesson_id": lesson.id.to_string(),
                "lesson_type": lesson.lesson_type,
                "is_shared": false,
            }),
        };
        if let Err(e) = self.vector.upsert(COLLECTION_LESSONS, vec![point]).await {
            warn!(error = %e, lesson_id = %lesson.id, "lesson vector upsert failed after insert");
        }
    }
}

const LESSON_EXTRACTION_PROMPT: &str = r#"You distill recurring patterns from related interactions into a durable lesson. Given the interaction summaries below, respond with only a JSON object shaped like {"name": "...", "type": "pattern"|"preference"|"risk"|"fact", "body": "..."}. `body` is a short markdown write-up of the pattern."#;

#[derive(Debug, Deserialize)]
struct ExtractedLesson {
    name: String,
    #[serde(rename = "type")]
    lesson_type: String,
    body: String,
}

fn parse_extracted_lesson(response: &str) -> Option<ExtractedLesson> {
    let json_slice =
        response.find('{').and_then(|start| response.rfind('}').map(|end| &response[start..=end])).unwrap_or(response);
    serde_json::from_str(json_slice).ok()
}

/// Writes the exported snapshot to `dir`: one markdown file per calendar day
/// over the last 30 days of memories, one markdown file per approved lesson
/// type, and an index file with counts and the last-sync timestamp. Each run
/// overwrites the target files, so the export is idempotent.
async fn export_snapshot(db: &DbClient, dir: &std::path::Path) -> MemoryResult<()> {
    tokio::fs::create_dir_all(dir).await.map_err(fs_err)?;

    let since = Utc::now() - chrono::Duration::days(SNAPSHOT_WINDOW_DAYS);
    let memories = db.memory_timeline(Some(since), None, None, 100_000).await?;

    let mut by_day: BTreeMap<chrono::NaiveDate, Vec<&Memory>> = BTreeMap::new();
    for memory in &memories {
        by_day.entry(memory.timestamp.date_naive()).or_default().push(memory);
    }
    for (day, day_memories) in &by_day {
        let mut body = format!("# Memories for {day}\n\n");
        for memory in day_memories {
            body.push_str(&format!(
                "## {} ({})\n\n{}\n\n{}\n\n---\n\n",
                memory.id, memory.channel, memory.summary_text, memory.raw_text
            ));
        }
        let path = dir.join(format!("{day}.md"));
        if let Err(e) = tokio::fs::write(&path, body).await {
            warn!(error = %e, %day, "failed to write day snapshot file");
        }
    }

    let approved = db.lesson_list_by_status(LessonStatus::Approved).await?;
    let mut by_type: BTreeMap<String, Vec<&Lesson>> = BTreeMap::new();
    for lesson in &approved {
        by_type.entry(lesson.lesson_type.clone()).or_default().push(lesson);
    }
    for (lesson_type, lessons) in &by_type {
        let mut body = format!("# Lessons: {lesson_type}\n\n");
        for lesson in lessons {
            body.push_str(&format!("## {}\n\n{}\n\n---\n\n", lesson.name, lesson.body));
        }
        let path = dir.join(format!("lessons-{lesson_type}.md"));
        if let Err(e) = tokio::fs::write(&path, body).await {
            warn!(error = %e, %lesson_type, "failed to write lesson snapshot file");
        }
    }

    let index = format!(
        "# Snapshot index\n\nlast_sync: {}\ndays: {}\nmemories: {}\nlesson_types: {}\napproved_lessons: {}\n",
        Utc::now().to_rfc3339(),
        by_day.len(),
        memories.len(),
        by_type.len(),
        approved.len(),
    );
    tokio::fs::write(dir.join("index.md"), index).await.map_err(fs_err)?;

    Ok(())
}

fn fs_err(e: std::io::Error) -> MemoryError {
    MemoryError::Storage(StorageError::Database(e.to_string()))
}

fn entity_key(entity_type: &str, entity_id: &str) -> String {
    format!("{}:{}", entity_type.trim().to_lowercase(), entity_id.trim().to_lowercase())
}

fn existing_lesson_entity_keys(lessons: &[Lesson]) -> HashSet<String> {
    lessons
        .iter()
        .flat_map(|l| l.related_entities.iter().map(|e| entity_key(&e.entity_type.to_string(), &e.entity_id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::EntityRef;

    fn entity(id: &str) -> EntityRef {
        EntityRef { entity_type: memory_core::EntityType::Contact, entity_id: id.to_string(), role: "x".to_string() }
    }

    #[test]
    fn entity_key_normalizes_case_and_whitespace() {
        assert_eq!(entity_key("Contact", " c-1 "), entity_key("contact", "c-1"));
    }

    #[test]
    fn existing_lesson_keys_collect_from_related_entities() {
        let now = Utc::now();
        let lesson = Lesson {
            id: LessonId::now_v7(),
            lesson_type: "pattern".to_string(),
            name: "n".to_string(),
            body: "b".to_string(),
            summary: "s".to_string(),
            status: LessonStatus::Draft,
            is_shared: false,
            related_entities: vec![entity("c-1")],
            source_memory_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let keys = existing_lesson_entity_keys(&[lesson]);
        assert!(keys.contains(&entity_key("contact", "c-1")));
    }

    #[test]
    fn parse_extracted_lesson_reads_json_object_from_noisy_response() {
        let response = r#"Sure, here it is: {"name": "Frequent escalations", "type": "risk", "body": "Org-42 has repeated escalations."} Hope that helps!"#;
        let lesson = parse_extracted_lesson(response).expect("should parse");
        assert_eq!(lesson.name, "Frequent escalations");
        assert_eq!(lesson.lesson_type, "risk");
    }

    #[test]
    fn parse_extracted_lesson_returns_none_on_malformed_json() {
        assert!(parse_extracted_lesson("not json at all").is_none());
    }
}
