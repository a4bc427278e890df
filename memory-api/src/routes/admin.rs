//! Admin-only routes: direct memory lookup, the daily roll-up,
//! and agent credential management. All handlers require an admin bearer
//! token, verified by the gate before the handler runs.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{NaiveDate, TimeZone, Utc};
use memory_core::{AccessLevel, Agent, AgentId, EntityIdType};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::gate::AuthExtractor;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MemoryView {
    pub id: String,
    pub channel: String,
    pub raw_text: String,
    pub summary_text: String,
    pub has_documents: bool,
    pub is_shared: bool,
}

#[utoipa::path(
    get,
    path = "/memories/{id}",
    tag = "Admin",
    responses((status = 200, description = "Raw memory record", body = MemoryView)),
)]
pub async fn get_memory(
    State(state): State<AppState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<String>,
) -> ApiResult<Json<MemoryView>> {
    ctx.require_admin()?;
    let id: memory_core::MemoryId = id.parse().map_err(|_| ApiError::validation_failed("id", "not a valid memory id"))?;
    let memory = state
        .db
        .memory_get(id)
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::MemoryNotFound, format!("memory {id} not found")))?;
    Ok(Json(MemoryView {
        id: memory.id.to_string(),
        channel: memory.channel,
        raw_text: memory.raw_text,
        summary_text: memory.summary_text,
        has_documents: memory.has_documents,
        is_shared: memory.is_shared,
    }))
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DailyRollup {
    pub date: String,
    pub interaction_count: usize,
    pub channels: std::collections::HashMap<String, usize>,
}

#[utoipa::path(
    get,
    path = "/daily/{date}",
    tag = "Admin",
    responses((status = 200, description = "Roll-up of interactions for a calendar day", body = DailyRollup)),
)]
pub async fn get_daily(
    State(state): State<AppState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(date): Path<String>,
) -> ApiResult<Json<DailyRollup>> {
    ctx.require_admin()?;
    let day = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| ApiError::validation_failed("date", "expected YYYY-MM-DD"))?;
    let since = Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap());
    let until = Utc.from_utc_datetime(&day.and_hms_opt(23, 59, 59).unwrap());

    let memories = state.db.memory_timeline(Some(since), Some(until), None, crate::constants::MAX_PAGE_SIZE).await?;
    let mut channels = std::collections::HashMap::new();
    for m in &memories {
        *channels.entry(m.channel.clone()).or_insert(0usize) += 1;
    }

    Ok(Json(DailyRollup { date, interaction_count: memories.len(), channels }))
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateAgentBody {
    pub name: String,
    #[serde(default)]
    pub access_level: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateAgentResponse {
    pub id: String,
    pub name: String,
    pub api_key: String,
    pub access_level: String,
}

const API_KEY_PREFIX: &str = "mk";

fn generate_api_key() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..40).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect();
    format!("{API_KEY_PREFIX}_{suffix}")
}

fn key_preview(raw_key: &str) -> String {
    let prefix: String = raw_key.chars().take(6).collect();
    let suffix: String = raw_key.chars().rev().take(4).collect::<String>().chars().rev().collect();
    format!("{prefix}...{suffix}")
}

#[utoipa::path(
    post,
    path = "/agents",
    tag = "Admin",
    responses((status = 200, description = "Agent created; the raw key is shown only in this response", body = CreateAgentResponse)),
)]
pub async fn create_agent(
    State(state): State<AppState>,
    AuthExtractor(ctx): AuthExtractor,
    Json(body): Json<CreateAgentBody>,
) -> ApiResult<Json<CreateAgentResponse>> {
    ctx.require_admin()?;
    let access_level: AccessLevel = match body.access_level {
        Some(raw) => raw.parse().map_err(|_| ApiError::validation_failed("access_level", format!("unrecognized access level '{raw}'")))?,
        None => AccessLevel::default(),
    };

    let raw_key = generate_api_key();
    let agent = Agent {
        id: AgentId::now_v7(),
        name: body.name,
        api_key_hash: memory_core::hash_api_key(&raw_key),
        api_key_preview: key_preview(&raw_key),
        access_level,
        is_active: true,
        created_at: Utc::now(),
        last_used: None,
    };
    state.db.agent_insert(&agent).await?;

    Ok(Json(CreateAgentResponse {
        id: agent.id.to_string(),
        name: agent.name,
        api_key: raw_key,
        access_level: agent.access_level.to_string(),
    }))
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentView {
    pub id: String,
    pub name: String,
    pub api_key_preview: String,
    pub access_level: String,
    pub is_active: bool,
}

#[utoipa::path(
    get,
    path = "/agents",
    tag = "Admin",
    responses((status = 200, description = "Registered agents", body = [AgentView])),
)]
pub async fn list_agents(State(state): State<AppState>, AuthExtractor(ctx): AuthExtractor) -> ApiResult<Json<Vec<AgentView>>> {
    ctx.require_admin()?;
    let agents = state.db.agent_list().await?;
    Ok(Json(
        agents
            .into_iter()
            .map(|a| AgentView {
                id: a.id.to_string(),
                name: a.name,
                api_key_preview: a.api_key_preview,
                access_level: a.access_level.to_string(),
                is_active: a.is_active,
            })
            .collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/agents/{id}/revoke",
    tag = "Admin",
    responses((status = 200, description = "Agent revoked")),
)]
pub async fn revoke_agent(
    State(state): State<AppState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    ctx.require_admin()?;
    let id: AgentId = id.parse().map_err(|_| ApiError::validation_failed("id", "not a valid agent id"))?;
    state.db.agent_set_active(id, false).await?;

    let audit = memory_core::AuditRecord {
        id: memory_core::AuditId::now_v7(),
        agent_id: ctx.agent_id(),
        action: memory_core::AuditAction::AgentRevoke.to_string(),
        resource_type: Some("agent".to_string()),
        resource_id: Some(id.to_string()),
        details: serde_json::json!({}),
        timestamp: Utc::now(),
    };
    let _ = state.db.audit_insert(&audit).await;

    Ok(Json(serde_json::json!({ "revoked": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_carry_the_expected_prefix() {
        let key = generate_api_key();
        assert!(key.starts_with("mk_"));
        assert_eq!(key.len(), 43);
    }

    #[test]
    fn preview_never_leaks_the_full_key() {
        let preview = key_preview("mk_ABCDEFGHIJ1234567890");
        assert!(preview.contains("..."));
        assert!(preview.len() < "mk_ABCDEFGHIJ1234567890".len());
    }
}
