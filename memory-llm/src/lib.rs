//! Collaborator traits for the memory service's outbound dependencies:
//! embeddings, chat-completions-shaped summarization/extraction, and PII
//! redaction. Each trait is a thin async seam over one HTTP-backed
//! implementation; concrete adapters live under `providers::openai`.
//!
//! Kept deliberately single-implementation-per-trait: there is no provider
//! registry, health-cached routing strategy, or circuit breaker here. The
//! service is configured with exactly one endpoint per collaborator type,
//! so that machinery would have no caller.

pub mod providers;

use async_trait::async_trait;
use memory_core::{EmbeddingVector, MemoryResult};
use serde::{Deserialize, Serialize};

/// A single turn in a chat-completions-shaped request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Outbound embedding collaborator.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> MemoryResult<EmbeddingVector>;
    async fn embed_batch(&self, texts: &[&str]) -> MemoryResult<Vec<EmbeddingVector>>;
    fn dimensions(&self) -> i32;
    fn model_id(&self) -> &str;
}

/// Outbound chat-completions collaborator for `POST /chat/completions`,
/// used by the enrichment pipeline for
/// summarization and entity extraction, and by the document parser's
/// vision-LLM branch.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: i32,
        temperature: f32,
    ) -> MemoryResult<String>;
}

/// Outbound PII redaction collaborator.
#[async_trait]
pub trait RedactionProvider: Send + Sync {
    async fn redact(&self, text: &str) -> MemoryResult<String>;
}

/// Admin identity collaborator: verifies a bearer token and
/// resolves it to a user id. Separate from agent auth, which looks up a
/// hashed API key directly in `memory_storage` rather than calling out.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_bearer(&self, token: &str) -> MemoryResult<String>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct MockEmbeddingProvider {
        pub dimensions: i32,
        pub model: String,
        pub calls: AtomicUsize,
    }

    impl MockEmbeddingProvider {
        pub fn new(dimensions: i32) -> Self {
            Self { dimensions, model: "mock-embed".to_string(), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        async fn embed(&self, text: &str) -> MemoryResult<EmbeddingVector> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let seed = text.len() as f32;
            let data = vec![seed; self.dimensions as usize];
            Ok(EmbeddingVector::new(data, self.model.clone()))
        }

        async fn embed_batch(&self, texts: &[&str]) -> MemoryResult<Vec<EmbeddingVector>> {
            let mut out = Vec::with_capacity(texts.len());
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> i32 {
            self.dimensions
        }

        fn model_id(&self) -> &str {
            &self.model
        }
    }

    pub struct MockChatProvider {
        pub response: String,
    }

    #[async_trait]
    impl ChatProvider for MockChatProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _max_tokens: i32,
            _temperature: f32,
        ) -> MemoryResult<String> {
            Ok(self.response.clone())
        }
    }

    pub struct MockRedactionProvider;

    #[async_trait]
    impl RedactionProvider for MockRedactionProvider {
        async fn redact(&self, text: &str) -> MemoryResult<String> {
            Ok(text.to_string())
        }
    }

    pub struct MockIdentityProvider {
        pub user_id: String,
    }

    #[async_trait]
    impl IdentityProvider for MockIdentityProvider {
        async fn verify_bearer(&self, token: &str) -> MemoryResult<String> {
            if token.is_empty() {
                return Err(memory_core::MemoryError::Auth(memory_core::AuthError::InvalidAdminToken));
            }
            Ok(self.user_id.clone())
        }
    }

    #[tokio::test]
    async fn mock_embedding_provider_is_deterministic() {
        let p = MockEmbeddingProvider::new(8);
        let a = p.embed("hello").await.unwrap();
        let b = p.embed("hello").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn mock_chat_provider_returns_configured_response() {
        let p = MockChatProvider { response: "summary".to_string() };
        let out = p.complete(vec![ChatMessage::user("hi")], 100, 0.3).await.unwrap();
        assert_eq!(out, "summary");
    }
}
