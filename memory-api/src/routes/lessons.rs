//! `/lessons`: list, create, approve/archive, delete.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use memory_core::{AuditAction, AuditRecord, EntityIdType, EntityRef, Lesson, LessonId, LessonStatus};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::gate::AuthExtractor;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListLessonsQuery {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LessonView {
    pub id: String,
    pub lesson_type: String,
    pub name: String,
    pub body: String,
    pub summary: String,
    pub status: String,
    pub is_shared: bool,
}

impl From<Lesson> for LessonView {
    fn from(l: Lesson) -> Self {
        Self {
            id: l.id.to_string(),
            lesson_type: l.lesson_type,
            name: l.name,
            body: l.body,
            summary: l.summary,
            status: l.status.to_string(),
            is_shared: l.is_shared,
        }
    }
}

#[utoipa::path(
    get,
    path = "/lessons",
    tag = "Lessons",
    responses((status = 200, description = "Lessons matching the status filter", body = [LessonView])),
)]
pub async fn list_lessons(
    State(state): State<AppState>,
    AuthExtractor(_ctx): AuthExtractor,
    Query(query): Query<ListLessonsQuery>,
) -> ApiResult<Json<Vec<LessonView>>> {
    let status: LessonStatus = match query.status.as_deref() {
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::validation_failed("status", format!("unrecognized lesson status '{raw}'")))?,
        None => LessonStatus::Draft,
    };
    let lessons = state.db.lesson_list_by_status(status).await?;
    Ok(Json(lessons.into_iter().map(LessonView::from).collect()))
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateLessonBody {
    pub lesson_type: String,
    pub name: String,
    pub body: String,
    pub summary: String,
    #[serde(default)]
    pub related_entities: Vec<EntityRef>,
}

#[utoipa::path(
    post,
    path = "/lessons",
    tag = "Lessons",
    responses((status = 200, description = "Lesson created", body = LessonView)),
)]
pub async fn create_lesson(
    State(state): State<AppState>,
    AuthExtractor(ctx): AuthExtractor,
    Json(body): Json<CreateLessonBody>,
) -> ApiResult<Json<LessonView>> {
    let now = Utc::now();
    let lesson = Lesson {
        id: LessonId::now_v7(),
        lesson_type: body.lesson_type,
        name: body.name,
        body: body.body,
        summary: body.summary,
        status: LessonStatus::Draft,
        is_shared: false,
        related_entities: body.related_entities,
        source_memory_ids: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    state.db.lesson_insert(&lesson).await?;

    let audit = AuditRecord {
        id: memory_core::AuditId::now_v7(),
        agent_id: ctx.agent_id(),
        action: "lesson_create".to_string(),
        resource_type: Some("lesson".to_string()),
        resource_id: Some(lesson.id.to_string()),
        details: serde_json::json!({}),
        timestamp: now,
    };
    let _ = state.db.audit_insert(&audit).await;

    Ok(Json(LessonView::from(lesson)))
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateLessonStatusBody {
    pub status: String,
}

#[utoipa::path(
    patch,
    path = "/lessons/{id}",
    tag = "Lessons",
    responses((status = 200, description = "Lesson status updated", body = LessonView)),
)]
pub async fn update_lesson_status(
    State(state): State<AppState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<String>,
    Json(body): Json<UpdateLessonStatusBody>,
) -> ApiResult<Json<LessonView>> {
    ctx.require_admin()?;
    let id: LessonId = id
        .parse()
        .map_err(|_| ApiError::validation_failed("id", "not a valid lesson id"))?;
    let status: LessonStatus =
        body.status.parse().map_err(|_| ApiError::validation_failed("status", format!("unrecognized status '{}'", body.status)))?;

    state.db.lesson_update_status(id, status).await?;
    let lesson = state
        .db
        .lesson_get(id)
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::LessonNotFound, format!("lesson {id} not found")))?;

    if status == LessonStatus::Approved && lesson.is_shared {
        publish_shared_lesson(&state, &lesson).await;
    }

    let action = if status == LessonStatus::Approved { AuditAction::LessonApprove } else { AuditAction::LessonArchive };
    let audit = AuditRecord {
        id: memory_core::AuditId::now_v7(),
        agent_id: ctx.agent_id(),
        action: action.to_string(),
        resource_type: Some("lesson".to_string()),
        resource_id: Some(id.to_string()),
        details: serde_json::json!({}),
        timestamp: Utc::now(),
    };
    let _ = state.db.audit_insert(&audit).await;

    Ok(Json(LessonView::from(lesson)))
}

async fn publish_shared_lesson(state: &AppState, lesson: &Lesson) {
    let shared = memory_core::SharedLesson {
        id: memory_core::SharedLessonId::now_v7(),
        original_lesson_id: lesson.id,
        lesson_type: lesson.lesson_type.clone(),
        name: lesson.name.clone(),
        pii_stripped_body: lesson.body.clone(),
        summary: lesson.summary.clone(),
        related_entities: lesson.related_entities.clone(),
        created_at: Utc::now(),
    };
    if let Err(e) = state.db.shared_lesson_insert(&shared).await {
        tracing::warn!(error = %e, lesson_id = %lesson.id, "failed to publish shared lesson projection");
    }
}

#[utoipa::path(
    delete,
    path = "/lessons/{id}",
    tag = "Lessons",
    responses((status = 200, description = "Lesson archived")),
)]
pub async fn archive_lesson(
    State(state): State<AppState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<String>,
) -> ApiResult<Json<LessonView>> {
    ctx.require_admin()?;
    let id: LessonId = id.parse().map_err(|_| ApiError::validation_failed("id", "not a valid lesson id"))?;
    state.db.lesson_update_status(id, LessonStatus::Archived).await?;
    let lesson = state
        .db
        .lesson_get(id)
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::LessonNotFound, format!("lesson {id} not found")))?;
    Ok(Json(LessonView::from(lesson)))
}
