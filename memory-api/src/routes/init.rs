//! `POST /init`: bootstraps the vector collections and seeds
//! the settings row. Safe to call repeatedly — both steps are idempotent.

use axum::extract::State;
use axum::Json;
use memory_core::Settings;

use crate::config::{COLLECTION_INTERACTIONS, COLLECTION_INTERACTIONS_SHARED, COLLECTION_LESSONS, COLLECTION_LESSONS_SHARED};
use crate::error::ApiResult;
use crate::gate::AuthExtractor;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/init",
    tag = "Admin",
    responses((status = 200, description = "Service initialized")),
)]
pub async fn init_service(
    State(state): State<AppState>,
    AuthExtractor(ctx): AuthExtractor,
) -> ApiResult<Json<serde_json::Value>> {
    ctx.require_admin()?;

    let dimensions = state.embed.dimensions();
    for collection in [COLLECTION_INTERACTIONS, COLLECTION_INTERACTIONS_SHARED, COLLECTION_LESSONS, COLLECTION_LESSONS_SHARED]
    {
        state.vector.ensure_collection(collection, dimensions).await?;
    }

    if state.db.settings_get().await.is_err() {
        state.db.settings_update(&Settings::default()).await?;
    }
    state.settings_cache.invalidate();

    Ok(Json(serde_json::json!({ "initialized": true })))
}
