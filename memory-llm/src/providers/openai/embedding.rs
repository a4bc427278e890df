//! Embedding collaborator adapter.

use super::client::OpenAIClient;
use super::types::{EmbeddingRequest, EmbeddingResponse};
use crate::EmbeddingProvider;
use async_trait::async_trait;
use memory_core::{EmbeddingVector, MemoryError, MemoryResult, UpstreamError};

pub struct OpenAIEmbeddingProvider {
    client: OpenAIClient,
    model: String,
    dimensions: i32,
}

impl OpenAIEmbeddingProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: i32,
    ) -> Self {
        Self {
            client: OpenAIClient::new(base_url, api_key, 60),
            model: model.into(),
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> MemoryResult<EmbeddingVector> {
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: vec![text.to_string()],
            dimensions: Some(self.dimensions),
        };

        let response: EmbeddingResponse = self.client.request("embeddings", request).await?;

        let embedding_data = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::Upstream(UpstreamError::Embedding("empty response".to_string())))?;

        Ok(EmbeddingVector::new(embedding_data.embedding, self.model.clone()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> MemoryResult<Vec<EmbeddingVector>> {
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: texts.iter().map(|s| s.to_string()).collect(),
            dimensions: Some(self.dimensions),
        };

        let response: EmbeddingResponse = self.client.request("embeddings", request).await?;

        let embeddings: Vec<_> = response
            .data
            .into_iter()
            .map(|data| EmbeddingVector::new(data.embedding, self.model.clone()))
            .collect();

        if embeddings.len() != texts.len() {
            return Err(MemoryError::Upstream(UpstreamError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            ))));
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> i32 {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OpenAIEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIEmbeddingProvider")
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}
