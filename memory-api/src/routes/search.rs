//! `POST /search`.

use axum::extract::State;
use axum::Json;
use memory_core::SearchFilters;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::gate::AuthExtractor;
use crate::retrieve::{self, SearchRequest as RetrieveRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SearchRequestBody {
    pub query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub shared_only: bool,
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
pub struct SearchResultItem {
    pub memory_id: String,
    pub score: f32,
    pub summary: String,
    pub channel: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SearchResponseBody {
    pub results: Vec<SearchResultItem>,
    pub total: usize,
    pub query: String,
}

#[utoipa::path(
    post,
    path = "/search",
    tag = "Search",
    responses((status = 200, description = "Search results", body = SearchResponseBody)),
)]
pub async fn search(
    State(state): State<AppState>,
    AuthExtractor(ctx): AuthExtractor,
    Json(body): Json<SearchRequestBody>,
) -> ApiResult<Json<SearchResponseBody>> {
    let limit = body.limit.clamp(1, crate::constants::MAX_PAGE_SIZE);
    let hits = retrieve::search(
        RetrieveRequest {
            query: &body.query,
            filters: body.filters,
            shared_only: body.shared_only,
            limit,
            is_admin: ctx.is_admin(),
        },
        &state.db,
        &state.vector,
        &state.embed,
    )
    .await?;

    let results: Vec<SearchResultItem> = hits
        .into_iter()
        .map(|hit| SearchResultItem {
            memory_id: hit.memory.id.to_string(),
            score: hit.score,
            summary: hit.memory.summary_text,
            channel: hit.memory.channel,
        })
        .collect();

    Ok(Json(SearchResponseBody { total: results.len(), query: body.query, results }))
}
