//! Enrichment pipeline step: summarization, entity
//! extraction, and PII redaction over a raw interaction plus any parsed
//! attachment text.
//!
//! Each sub-step degrades independently on upstream failure rather than
//! aborting ingest: a summarization failure falls back to a
//! truncated excerpt, a malformed extraction response yields no entities,
//! and redaction is fail-open — the unredacted text is kept and a metric
//! is incremented rather than the ingest being blocked on it.

use std::sync::Arc;

use memory_core::{EntityRef, ENRICHMENT_TRUNCATION_CHARS};
use memory_llm::{ChatMessage, ChatProvider, RedactionProvider};
use serde::Deserialize;

const SUMMARY_MAX_TOKENS: i32 = 200;
const EXTRACTION_MAX_TOKENS: i32 = 500;

fn truncate_for_enrichment(text: &str) -> &str {
    if text.len() <= ENRICHMENT_TRUNCATION_CHARS {
        text
    } else {
        let mut end = ENRICHMENT_TRUNCATION_CHARS;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    }
}

/// Produces a short summary of `text`. Falls back to a truncated excerpt of
/// the source text if the chat collaborator fails or returns nothing.
pub async fn summarize(text: &str, chat: &Arc<dyn ChatProvider>) -> String {
    let excerpt = truncate_for_enrichment(text);
    let messages = vec![
        ChatMessage::system("Summarize the following interaction in one or two sentences."),
        ChatMessage::user(excerpt),
    ];

    match chat.complete(messages, SUMMARY_MAX_TOKENS, 0.2).await {
        Ok(summary) if !summary.trim().is_empty() => summary,
        _ => fallback_summary(excerpt),
    }
}

fn fallback_summary(excerpt: &str) -> String {
    const FALLBACK_LEN: usize = 200;
    if excerpt.len() <= FALLBACK_LEN {
        excerpt.to_string()
    } else {
        let mut end = FALLBACK_LEN;
        while !excerpt.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &excerpt[..end])
    }
}

#[derive(Debug, Deserialize)]
struct ExtractedEntity {
    entity_type: String,
    entity_id: String,
    #[serde(default = "default_role")]
    role: String,
}

fn default_role() -> String {
    "mentioned".to_string()
}

const EXTRACTION_SYSTEM_PROMPT: &str = r#"Extract entities mentioned in the text below. \
Respond with only a JSON array of objects shaped like \
{"entity_type": "contact"|"organization"|"program"|"custom", "entity_id": "...", "role": "..."}. \
If no entities are mentioned, respond with an empty array."#;

/// Extracts structured entity references from `text`. A malformed or
/// unparseable response yields no entities rather than failing the ingest.
pub async fn extract_entities(text: &str, chat: &Arc<dyn ChatProvider>) -> Vec<EntityRef> {
    let excerpt = truncate_for_enrichment(text);
    let messages =
        vec![ChatMessage::system(EXTRACTION_SYSTEM_PROMPT), ChatMessage::user(excerpt)];

    let Ok(response) = chat.complete(messages, EXTRACTION_MAX_TOKENS, 0.0).await else {
        return Vec::new();
    };

    parse_extracted_entities(&response)
}

fn parse_extracted_entities(response: &str) -> Vec<EntityRef> {
    let json_slice = response
        .find('[')
        .and_then(|start| response.rfind(']').map(|end| &response[start..=end]))
        .unwrap_or(response);

    let Ok(raw) = serde_json::from_str::<Vec<ExtractedEntity>>(json_slice) else {
        return Vec::new();
    };

    raw.into_iter()
        .filter_map(|e| {
            e.entity_type.parse().ok().map(|entity_type| EntityRef {
                entity_type,
                entity_id: e.entity_id,
                role: e.role,
            })
        })
        .collect()
}

/// Redacts PII from `text`. Fail-open: an upstream failure returns the
/// original text unchanged along with a flag the caller uses to bump the
/// redaction-failure metric.
pub async fn redact(text: &str, redactor: &Arc<dyn RedactionProvider>) -> (String, bool) {
    match redactor.redact(text).await {
        Ok(scrubbed) => (scrubbed, false),
        Err(_) => (text.to_string(), true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_llm::mocks::{MockChatProvider, MockRedactionProvider};

    #[tokio::test]
    async fn summarize_uses_chat_response() {
        let chat: Arc<dyn ChatProvider> =
            Arc::new(MockChatProvider { response: "a short summary".to_string() });
        let out = summarize("some long interaction text", &chat).await;
        assert_eq!(out, "a short summary");
    }

    #[tokio::test]
    async fn summarize_falls_back_on_empty_response() {
        let chat: Arc<dyn ChatProvider> = Arc::new(MockChatProvider { response: String::new() });
        let out = summarize("fallback candidate text", &chat).await;
        assert_eq!(out, "fallback candidate text");
    }

    #[tokio::test]
    async fn extract_entities_parses_valid_json_array() {
        let chat: Arc<dyn ChatProvider> = Arc::new(MockChatProvider {
            response: r#"[{"entity_type": "contact", "entity_id": "c-1", "role": "subject"}]"#.to_string(),
        });
        let entities = extract_entities("text", &chat).await;
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_id, "c-1");
    }

    #[tokio::test]
    async fn extract_entities_degrades_to_empty_on_malformed_json() {
        let chat: Arc<dyn ChatProvider> =
            Arc::new(MockChatProvider { response: "not json at all".to_string() });
        let entities = extract_entities("text", &chat).await;
        assert!(entities.is_empty());
    }

    #[tokio::test]
    async fn redact_is_fail_open_on_upstream_error() {
        struct FailingRedactor;
        #[async_trait::async_trait]
        impl RedactionProvider for FailingRedactor {
            async fn redact(&self, _text: &str) -> memory_core::MemoryResult<String> {
                Err(memory_core::MemoryError::Upstream(memory_core::UpstreamError::Redaction(
                    "down".to_string(),
                )))
            }
        }
        let redactor: Arc<dyn RedactionProvider> = Arc::new(FailingRedactor);
        let (text, failed) = redact("sensitive text", &redactor).await;
        assert_eq!(text, "sensitive text");
        assert!(failed);
    }

    #[tokio::test]
    async fn redact_passes_through_on_success() {
        let redactor: Arc<dyn RedactionProvider> = Arc::new(MockRedactionProvider);
        let (text, failed) = redact("hello", &redactor).await;
        assert_eq!(text, "hello");
        assert!(!failed);
    }
}
