//! `POST /interactions`: multipart ingest endpoint.

use std::collections::HashMap;

use axum::extract::{Multipart, State};
use axum::Json;
use memory_core::{AccessLevel, EntityRef};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::gate::AuthExtractor;
use crate::ingest::{IngestRequest, Ingestor, RawAttachment};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IngestResponse {
    pub memory_id: String,
    pub summary: String,
    pub failed_attachments: Vec<String>,
    pub redaction_failed: bool,
}

#[utoipa::path(
    post,
    path = "/interactions",
    tag = "Interactions",
    responses(
        (status = 200, description = "Interaction ingested", body = IngestResponse),
        (status = 400, description = "Validation failed", body = crate::error::ApiError),
    ),
)]
pub async fn create_interaction(
    State(state): State<AppState>,
    AuthExtractor(ctx): AuthExtractor,
    mut multipart: Multipart,
) -> ApiResult<Json<IngestResponse>> {
    let agent_id = ctx.agent_id().ok_or_else(|| ApiError::forbidden("interactions require an agent credential"))?;
    let access_level = match &ctx {
        crate::gate::AuthContext::Agent { access_level, .. } => *access_level,
        crate::gate::AuthContext::Admin { .. } => AccessLevel::Admin,
    };

    let mut text = String::new();
    let mut channel = String::new();
    let mut entities: Vec<EntityRef> = Vec::new();
    let mut metadata: HashMap<String, serde_json::Value> = HashMap::new();
    let mut attachments = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::new(
        crate::error::ErrorCode::InvalidInput,
        format!("malformed multipart body: {e}"),
    ))? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "text" => text = field.text().await.unwrap_or_default(),
            "channel" => channel = field.text().await.unwrap_or_default(),
            "entities" => {
                let raw = field.text().await.unwrap_or_default();
                if !raw.trim().is_empty() {
                    entities = serde_json::from_str(&raw).map_err(|e| {
                        ApiError::validation_failed("entities", format!("invalid JSON: {e}"))
                    })?;
                }
            }
            "metadata" => {
                let raw = field.text().await.unwrap_or_default();
                if !raw.trim().is_empty() {
                    metadata = serde_json::from_str(&raw)
                        .map_err(|e| ApiError::validation_failed("metadata", format!("invalid JSON: {e}")))?;
                }
            }
            "files" => {
                let filename = field.file_name().unwrap_or("attachment").to_string();
                let mime_type = field.content_type().unwrap_or("application/octet-stream").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::new(crate::error::ErrorCode::InvalidInput, format!("bad file field: {e}")))?;
                attachments.push(RawAttachment { filename, mime_type, bytes: bytes.to_vec() });
            }
            _ => {}
        }
    }

    let settings = state.settings_cache.get(crate::config::settings_freshness(), &state.settings_fetcher).await?;

    let ingestor = Ingestor {
        db: state.db.clone(),
        vector: state.vector.clone(),
        chat: state.chat.clone(),
        embed: state.embed.clone(),
        redact: state.redact.clone(),
    };

    let outcome = ingestor
        .ingest(
            IngestRequest { agent_id, access_level, text, channel, entities, metadata, attachments },
            &settings,
        )
        .await?;

    Ok(Json(IngestResponse {
        memory_id: outcome.memory.id.to_string(),
        summary: outcome.memory.summary_text,
        failed_attachments: outcome.failed_attachments,
        redaction_failed: outcome.redaction_failed,
    }))
}
