//! Shared configuration value types.
//!
//! Service-wide env-driven config structs (`DbConfig`, `ApiConfig`, ...) live
//! in `memory-api::config`; this module holds the provider-shaped config
//! values those structs embed, plus the ingest pipeline's size limits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outbound collaborator endpoint + model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProviderConfig {
    pub provider_type: String,
    pub endpoint: String,
    pub model: String,
    pub dimensions: Option<i32>,
}

/// Retry configuration for outbound collaborator calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RetryConfig {
    pub max_retries: i32,
    #[cfg_attr(feature = "openapi", schema(value_type = u64))]
    pub initial_backoff: Duration,
    #[cfg_attr(feature = "openapi", schema(value_type = u64))]
    pub max_backoff: Duration,
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

/// The 1-token-≈-4-characters approximation used by the chunker. Never
/// silently swapped for a real tokenizer: chunk boundaries are
/// part of the observable contract because vector point ids embed the
/// chunk index.
pub const CHARS_PER_TOKEN: usize = 4;

/// Maximum number of characters of composite text fed to the summarizer and
/// entity extractor.
pub const ENRICHMENT_TRUNCATION_CHARS: usize = 4_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_config_default_is_positive() {
        let r = RetryConfig::default();
        assert!(r.max_retries >= 0);
        assert!(r.backoff_multiplier > 0.0);
    }
}
