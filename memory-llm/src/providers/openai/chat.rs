//! Chat-completions collaborator adapter for `POST /chat/completions`.
//! Used for enrichment (summarization, entity
//! extraction) and for the document parser's vision-LLM branch, which sends
//! an image-bearing message as plain chat content.

use super::client::OpenAIClient;
use super::types::{CompletionRequest, CompletionResponse, Message};
use crate::{ChatMessage, ChatProvider};
use async_trait::async_trait;
use memory_core::{MemoryError, MemoryResult, UpstreamError};

pub struct OpenAIChatProvider {
    client: OpenAIClient,
    model: String,
}

impl OpenAIChatProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: OpenAIClient::new(base_url, api_key, 60),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAIChatProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: i32,
        temperature: f32,
    ) -> MemoryResult<String> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: messages
                .into_iter()
                .map(|m| Message { role: m.role, content: m.content })
                .collect(),
            max_tokens: Some(max_tokens),
            temperature: Some(temperature),
        };

        let response: CompletionResponse = self.client.request("chat/completions", request).await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| MemoryError::Upstream(UpstreamError::Llm("no completion in response".to_string())))
    }
}

impl std::fmt::Debug for OpenAIChatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIChatProvider").field("model", &self.model).finish()
    }
}
