//! Memory API server entry point.
//!
//! Bootstraps configuration, the collaborator clients, and the background
//! loop, then starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use memory_api::{
    background::BackgroundLoop,
    config::{ApiConfig, ProvidersConfig},
    gate::RateLimiter,
    routes::create_router,
    state::{AppState, DbSettingsFetcher},
    telemetry::{init_tracer, shutdown_tracer, TelemetryConfig},
    ApiError, ApiResult,
};
use memory_llm::providers::openai::{
    OpenAIChatProvider, OpenAIEmbeddingProvider, OpenAIIdentityProvider, OpenAIRedactionProvider,
};
use memory_storage::{DbClient, DbConfig, SettingsCache, VectorStoreClient};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let db_config = DbConfig::from_env();
    let pool = db_config.create_pool()?;
    let db = DbClient::new(pool);

    let api_config = ApiConfig::from_env();
    let providers = ProvidersConfig::from_env();

    let chat = Arc::new(OpenAIChatProvider::new(
        providers.chat_base_url.clone(),
        providers.chat_api_key.clone(),
        providers.chat_model.clone(),
    ));
    let embed = Arc::new(OpenAIEmbeddingProvider::new(
        providers.embed_base_url.clone(),
        providers.embed_api_key.clone(),
        providers.embed_model.clone(),
        providers.embed_dimensions,
    ));
    let redact = Arc::new(OpenAIRedactionProvider::new(
        providers.redact_base_url.clone(),
        providers.redact_api_key.clone(),
    ));
    let identity = Arc::new(OpenAIIdentityProvider::new(providers.identity_base_url.clone()));
    let vector = Arc::new(VectorStoreClient::new(providers.vector_base_url.clone()));

    let settings_fetcher = DbSettingsFetcher(db.clone());
    let settings_cache = Arc::new(SettingsCache::new());
    let rate_limiter = Arc::new(RateLimiter::new());

    let state = AppState {
        db: db.clone(),
        vector: vector.clone(),
        chat: chat.clone(),
        embed: embed.clone(),
        redact,
        identity,
        settings_cache,
        settings_fetcher,
        rate_limiter: rate_limiter.clone(),
        start_time: std::time::Instant::now(),
    };

    let snapshot_dir = std::env::var("MEMORY_SNAPSHOT_DIR").ok().map(std::path::PathBuf::from);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let background = BackgroundLoop { db, vector, chat, embed, rate_limiter, snapshot_dir };
    tokio::spawn(background.run(shutdown_rx));

    let app = create_router(state, &api_config);

    let addr = SocketAddr::new(
        api_config.bind_host.parse().map_err(|e| ApiError::internal_error(format!("invalid bind host: {e}")))?,
        api_config.bind_port,
    );
    tracing::info!(%addr, "starting memory API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("failed to bind {addr}: {e}")))?;

    let server = axum::serve(listener, app.into_make_service());
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("server error: {e}")))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    shutdown_tracer();
    Ok(())
}
