//! Shared application state for Axum routers.

use std::sync::Arc;

use axum::extract::FromRef;
use memory_llm::{ChatProvider, EmbeddingProvider, IdentityProvider, RedactionProvider};
use memory_storage::{DbClient, SettingsCache, SettingsFetcher, VectorStoreClient};

use crate::gate::RateLimiter;

/// Fetches `Settings` from the relational store on a cache miss.
#[derive(Clone)]
pub struct DbSettingsFetcher(pub DbClient);

#[async_trait::async_trait]
impl SettingsFetcher for DbSettingsFetcher {
    async fn fetch(&self) -> memory_core::MemoryResult<memory_core::Settings> {
        self.0.settings_get().await
    }
}

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub db: DbClient,
    pub vector: Arc<VectorStoreClient>,
    pub chat: Arc<dyn ChatProvider>,
    pub embed: Arc<dyn EmbeddingProvider>,
    pub redact: Arc<dyn RedactionProvider>,
    pub identity: Arc<dyn IdentityProvider>,
    pub settings_cache: Arc<SettingsCache>,
    pub settings_fetcher: DbSettingsFetcher,
    pub rate_limiter: Arc<RateLimiter>,
    pub start_time: std::time::Instant,
}

crate::impl_from_ref!(DbClient, db);
crate::impl_from_ref!(Arc<VectorStoreClient>, vector);
crate::impl_from_ref!(Arc<dyn ChatProvider>, chat);
crate::impl_from_ref!(Arc<dyn EmbeddingProvider>, embed);
crate::impl_from_ref!(Arc<dyn RedactionProvider>, redact);
crate::impl_from_ref!(Arc<dyn IdentityProvider>, identity);
crate::impl_from_ref!(Arc<SettingsCache>, settings_cache);
crate::impl_from_ref!(Arc<RateLimiter>, rate_limiter);
crate::impl_from_ref!(std::time::Instant, start_time);
