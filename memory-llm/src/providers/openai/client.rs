//! OpenAI-shaped HTTP client with request-rate pacing.

use super::types::ApiError;
use memory_core::{MemoryError, MemoryResult, UpstreamError};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// HTTP client for a single collaborator endpoint, with a request-rate
/// ceiling enforced client-side so outbound calls don't overwhelm a
/// collaborator even when many requests are in flight.
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: Arc<Semaphore>,
    last_request: Arc<AtomicU64>,
    min_request_interval_ms: u64,
    started_at: Instant,
}

impl OpenAIClient {
    /// Create a new client for `base_url`, pacing to at most
    /// `requests_per_minute` requests.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, requests_per_minute: u32) -> Self {
        let permits = (requests_per_minute as usize).max(1);
        let min_interval_ms = (60_000 / requests_per_minute.max(1) as u64).max(10);

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            rate_limiter: Arc::new(Semaphore::new(permits)),
            last_request: Arc::new(AtomicU64::new(0)),
            min_request_interval_ms: min_interval_ms,
            started_at: Instant::now(),
        }
    }

    /// Make an API request, pacing automatically against the configured
    /// requests-per-minute ceiling.
    pub async fn request<Req: Serialize, Res: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Req,
    ) -> MemoryResult<Res> {
        let _permit = self.rate_limiter.acquire().await.map_err(|e| {
            MemoryError::Upstream(UpstreamError::Llm(format!("rate limiter closed: {}", e)))
        })?;

        let now_ms = self.started_at.elapsed().as_millis() as u64;
        let last_ms = self.last_request.load(Ordering::Relaxed);
        let elapsed = now_ms.saturating_sub(last_ms);

        if elapsed < self.min_request_interval_ms {
            let wait_ms = self.min_request_interval_ms - elapsed;
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }

        self.last_request.store(self.started_at.elapsed().as_millis() as u64, Ordering::Relaxed);

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| MemoryError::Upstream(UpstreamError::Llm(format!("request failed: {}", e))))?;

        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| MemoryError::Upstream(UpstreamError::Llm(format!("invalid response body: {}", e))))
        } else {
            let error_text = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            let error_msg = serde_json::from_str::<ApiError>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);

            Err(match status {
                StatusCode::TOO_MANY_REQUESTS => MemoryError::Upstream(UpstreamError::Llm(
                    "collaborator rate limit exceeded".to_string(),
                )),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    MemoryError::Upstream(UpstreamError::Llm(format!("credential rejected: {}", error_msg)))
                }
                _ => MemoryError::Upstream(UpstreamError::Llm(error_msg)),
            })
        }
    }
}

impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
