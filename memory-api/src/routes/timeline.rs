//! `GET /timeline/{entity_type}/{entity_id}`.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::gate::AuthExtractor;
use crate::retrieve::{self, TimelineRequest as RetrieveTimelineRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    pub until: Option<chrono::DateTime<chrono::Utc>>,
    pub channel: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    crate::constants::DEFAULT_PAGE_SIZE
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TimelineItem {
    pub memory_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub channel: String,
    pub summary: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TimelineResponseBody {
    pub items: Vec<TimelineItem>,
}

#[utoipa::path(
    get,
    path = "/timeline/{entity_type}/{entity_id}",
    tag = "Timeline",
    responses((status = 200, description = "Chronological memories for the entity", body = TimelineResponseBody)),
)]
pub async fn get_timeline(
    State(state): State<AppState>,
    AuthExtractor(_ctx): AuthExtractor,
    Path((entity_type, entity_id)): Path<(String, String)>,
    Query(query): Query<TimelineQuery>,
) -> ApiResult<Json<TimelineResponseBody>> {
    let limit = query.limit.clamp(1, crate::constants::MAX_PAGE_SIZE);
    let memories = retrieve::timeline(
        &entity_type,
        &entity_id,
        RetrieveTimelineRequest { since: query.since, until: query.until, channel: query.channel.as_deref(), limit },
        &state.db,
    )
    .await?;

    let items = memories
        .into_iter()
        .map(|m| TimelineItem { memory_id: m.id.to_string(), timestamp: m.timestamp, channel: m.channel, summary: m.summary_text })
        .collect();

    Ok(Json(TimelineResponseBody { items }))
}
