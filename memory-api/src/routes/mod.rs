//! Route modules and the top-level router assembly.

pub mod admin;
pub mod config;
pub mod health;
pub mod init;
pub mod interactions;
pub mod lessons;
pub mod search;
pub mod timeline;

use std::time::Duration;

use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::ApiConfig;
use crate::gate::{auth_middleware, rate_limit_middleware};
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};
#[cfg(feature = "swagger-ui")]
use utoipa::OpenApi as _;

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let config = config.clone();
    CorsLayer::new()
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
        .max_age(Duration::from_secs(config.cors_max_age_secs))
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            origin.to_str().map(|o| config.is_origin_allowed(o)).unwrap_or(false)
        }))
}

/// Assembles the full API router: unauthenticated health checks and metrics
/// nested under `/health` and `/metrics`, everything else behind the auth
/// and rate-limit middleware — authenticated first so rate limiting applies
/// only once the caller is known. Every
/// request, authenticated or not, passes through the observability
/// middleware so latency and status land in Prometheus regardless of outcome.
pub fn create_router(state: AppState, api_config: &ApiConfig) -> Router {
    let authenticated = Router::new()
        .route("/interactions", post(interactions::create_interaction))
        .route("/search", post(search::search))
        .route("/timeline/:entity_type/:entity_id", get(timeline::get_timeline))
        .route("/lessons", get(lessons::list_lessons).post(lessons::create_lesson))
        .route("/lessons/:id", patch(lessons::update_lesson_status).delete(lessons::archive_lesson))
        .route("/daily/:date", get(admin::get_daily))
        .route("/memories/:id", get(admin::get_memory))
        .route("/agents", get(admin::list_agents).post(admin::create_agent))
        .route("/agents/:id/revoke", post(admin::revoke_agent))
        .route("/config/settings", get(config::get_settings).put(config::update_settings))
        .route("/init", post(init::init_service))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let router = Router::new()
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler))
        .merge(authenticated)
        .layer(middleware::from_fn(observability_middleware))
        .layer(cors_layer(api_config));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/docs").url("/api-docs/openapi.json", crate::openapi::ApiDoc::openapi()),
    );

    router.with_state(state)
}
