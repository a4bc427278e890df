//! Environment-driven configuration for the API layer.
//!
//! Two tiers: `ApiConfig`/`ProvidersConfig` are process config, read once at
//! startup and never mutated. `Settings` (memory_core) is the mutable,
//! admin-editable singleton served through `SettingsCache` — rate limiting,
//! chunking, and the background loop's feature flags all live there, not
//! here, so an admin can change them without a restart.

use std::time::Duration;

use memory_storage::Freshness;

/// CORS and transport configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins. Empty means allow all (dev mode).
    pub cors_origins: Vec<String>,
    pub cors_allow_credentials: bool,
    pub cors_max_age_secs: u64,
    pub bind_host: String,
    pub bind_port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86_400,
            bind_host: "0.0.0.0".to_string(),
            bind_port: 3000,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("MEMORY_CORS_ORIGINS")
            .ok()
            .map(|s| s.split(',').map(|o| o.trim().to_string()).filter(|o| !o.is_empty()).collect())
            .unwrap_or_default();

        let cors_allow_credentials =
            std::env::var("MEMORY_CORS_ALLOW_CREDENTIALS").ok().map(|s| s.to_lowercase() == "true").unwrap_or(false);

        let cors_max_age_secs =
            std::env::var("MEMORY_CORS_MAX_AGE_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(86_400);

        let bind_host = std::env::var("MEMORY_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
        let bind_port = std::env::var("PORT")
            .or_else(|_| std::env::var("MEMORY_API_PORT"))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        Self { cors_origins, cors_allow_credentials, cors_max_age_secs, bind_host, bind_port }
    }

    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }
        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(pattern)
                        || origin_domain == pattern.strip_prefix('.').unwrap_or(pattern);
                }
            }
            false
        })
    }
}

/// Endpoint + credential configuration for the four outbound collaborators
///: chat completions, embeddings, redaction, admin identity.
#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub chat_base_url: String,
    pub chat_api_key: String,
    pub chat_model: String,
    pub embed_base_url: String,
    pub embed_api_key: String,
    pub embed_model: String,
    pub embed_dimensions: i32,
    pub redact_base_url: String,
    pub redact_api_key: String,
    pub identity_base_url: String,
    pub vector_base_url: String,
}

impl ProvidersConfig {
    pub fn from_env() -> Self {
        let var = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
        Self {
            chat_base_url: var("MEMORY_CHAT_BASE_URL", "http://localhost:8081"),
            chat_api_key: var("MEMORY_CHAT_API_KEY", ""),
            chat_model: var("MEMORY_CHAT_MODEL", "gpt-4o-mini"),
            embed_base_url: var("MEMORY_EMBED_BASE_URL", "http://localhost:8081"),
            embed_api_key: var("MEMORY_EMBED_API_KEY", ""),
            embed_model: var("MEMORY_EMBED_MODEL", "text-embedding-3-small"),
            embed_dimensions: std::env::var("MEMORY_EMBED_DIMENSIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1536),
            redact_base_url: var("MEMORY_REDACT_BASE_URL", "http://localhost:8082"),
            redact_api_key: var("MEMORY_REDACT_API_KEY", ""),
            identity_base_url: var("MEMORY_IDENTITY_BASE_URL", "http://localhost:8083"),
            vector_base_url: var("MEMORY_VECTOR_BASE_URL", "http://localhost:6333"),
        }
    }
}

/// Vector collection names bootstrapped on startup.
pub const COLLECTION_INTERACTIONS: &str = "memory_interactions";
pub const COLLECTION_INTERACTIONS_SHARED: &str = "memory_interactions_shared";
pub const COLLECTION_LESSONS: &str = "memory_lessons";
pub const COLLECTION_LESSONS_SHARED: &str = "memory_lessons_shared";

/// Staleness tolerance for settings reads on the hot request path. The
/// admin config-write path invalidates the cache, so this just bounds how
/// long a concurrent reader might see a value one write behind.
pub fn settings_freshness() -> Freshness {
    Freshness::BestEffort { max_staleness: Duration::from_secs(5) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cors_allows_all_origins() {
        let config = ApiConfig::default();
        assert!(!config.is_production());
        assert!(config.is_origin_allowed("https://anything.example"));
    }

    #[test]
    fn wildcard_subdomain_matches() {
        let mut config = ApiConfig::default();
        config.cors_origins = vec!["*.example.com".to_string()];
        assert!(config.is_origin_allowed("https://app.example.com"));
        assert!(!config.is_origin_allowed("https://evil.com"));
    }
}
