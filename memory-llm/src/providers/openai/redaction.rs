//! PII redaction collaborator adapter.
//!
//! Not an OpenAI endpoint; the redaction service is configured separately
//! but speaks the same bearer-authenticated JSON-over-HTTP shape, so it
//! reuses `OpenAIClient`.

use super::client::OpenAIClient;
use super::types::{RedactRequest, RedactResponse};
use crate::RedactionProvider;
use async_trait::async_trait;
use memory_core::MemoryResult;

pub struct OpenAIRedactionProvider {
    client: OpenAIClient,
}

impl OpenAIRedactionProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { client: OpenAIClient::new(base_url, api_key, 120) }
    }
}

#[async_trait]
impl RedactionProvider for OpenAIRedactionProvider {
    async fn redact(&self, text: &str) -> MemoryResult<String> {
        let request = RedactRequest { text: text.to_string() };
        let response: RedactResponse = self.client.request("redact", request).await?;
        Ok(response.redacted_text)
    }
}

impl std::fmt::Debug for OpenAIRedactionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIRedactionProvider").finish()
    }
}
