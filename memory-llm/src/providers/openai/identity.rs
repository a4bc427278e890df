//! Admin identity collaborator: verifies an admin bearer token
//! and resolves it to a user id.
//!
//! Unlike the other collaborators, the credential being verified is
//! per-call caller input rather than a static service secret, so this does
//! not reuse `OpenAIClient`'s baked-in bearer/rate-pacing shape — just its
//! thin-wrapper-plus-uniform-error-mapping pattern.

use super::types::IdentityResponse;
use crate::IdentityProvider;
use async_trait::async_trait;
use memory_core::{MemoryError, MemoryResult, UpstreamError};
use reqwest::{Client, StatusCode};

pub struct OpenAIIdentityProvider {
    client: Client,
    base_url: String,
}

impl OpenAIIdentityProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into() }
    }
}

#[async_trait]
impl IdentityProvider for OpenAIIdentityProvider {
    async fn verify_bearer(&self, token: &str) -> MemoryResult<String> {
        let url = format!("{}/identity/me", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .map_err(|e| MemoryError::Upstream(UpstreamError::Llm(format!("identity request failed: {e}"))))?;

        if response.status() == StatusCode::UNAUTHORIZED || response.status() == StatusCode::FORBIDDEN {
            return Err(MemoryError::Auth(memory_core::AuthError::InvalidAdminToken));
        }
        if !response.status().is_success() {
            return Err(MemoryError::Upstream(UpstreamError::Llm(format!(
                "identity service returned {}",
                response.status()
            ))));
        }

        let body: IdentityResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::Upstream(UpstreamError::Llm(format!("invalid identity response: {e}"))))?;
        Ok(body.user_id)
    }
}

impl std::fmt::Debug for OpenAIIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIIdentityProvider").field("base_url", &self.base_url).finish()
    }
}
