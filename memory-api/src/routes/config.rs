//! `/config/*`: admin-only read/write of the singleton
//! `Settings` row, via `SettingsCache` so changes are visible to concurrent
//! requests without a restart.

use axum::extract::State;
use axum::Json;
use memory_core::{AuditAction, AuditRecord, Settings};

use crate::error::ApiResult;
use crate::gate::AuthExtractor;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/config/settings",
    tag = "Config",
    responses((status = 200, description = "Current settings", body = Settings)),
)]
pub async fn get_settings(State(state): State<AppState>, AuthExtractor(ctx): AuthExtractor) -> ApiResult<Json<Settings>> {
    ctx.require_admin()?;
    let settings = state.settings_cache.get(crate::config::settings_freshness(), &state.settings_fetcher).await?;
    Ok(Json(settings))
}

#[utoipa::path(
    put,
    path = "/config/settings",
    tag = "Config",
    responses((status = 200, description = "Settings updated", body = Settings)),
)]
pub async fn update_settings(
    State(state): State<AppState>,
    AuthExtractor(ctx): AuthExtractor,
    Json(settings): Json<Settings>,
) -> ApiResult<Json<Settings>> {
    ctx.require_admin()?;
    state.db.settings_update(&settings).await?;
    state.settings_cache.invalidate();

    let audit = AuditRecord {
        id: memory_core::AuditId::now_v7(),
        agent_id: ctx.agent_id(),
        action: AuditAction::ConfigUpdate.to_string(),
        resource_type: Some("settings".to_string()),
        resource_id: None,
        details: serde_json::json!({}),
        timestamp: chrono::Utc::now(),
    };
    let _ = state.db.audit_insert(&audit).await;

    Ok(Json(settings))
}
