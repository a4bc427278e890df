//! Error types for the memory service's HTTP layer.
//!
//! `memory_core::MemoryError` is the domain error type; `ApiError` is its
//! HTTP-shaped wrapper, serialized as JSON with an appropriate status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use memory_core::{AuthError, InputError, MemoryError, NotFoundError, RateError, StorageError, UpstreamError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    InvalidToken,

    ValidationFailed,
    InvalidInput,
    MissingField,

    MemoryNotFound,
    LessonNotFound,
    AgentNotFound,
    SettingsNotFound,

    RateLimited,

    UpstreamUnavailable,
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized | ErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::ValidationFailed | ErrorCode::InvalidInput | ErrorCode::MissingField => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::MemoryNotFound
            | ErrorCode::LessonNotFound
            | ErrorCode::AgentNotFound
            | ErrorCode::SettingsNotFound => StatusCode::NOT_FOUND,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DatabaseError | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Structured error payload returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: None }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn validation_failed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(ErrorCode::ValidationFailed, format!("{field}: {}", reason.into()))
            .with_details(serde_json::json!({ "field": field }))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        (status, Json(self)).into_response()
    }
}

/// Maps the domain error taxonomy onto the HTTP-facing one. This is the
/// only place that decides how a `memory_core` failure surfaces at the
/// boundary.
impl From<MemoryError> for ApiError {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::Auth(ref auth) => match auth {
                AuthError::MissingCredential(_) | AuthError::UnknownAgentKey | AuthError::AgentInactive => {
                    ApiError::unauthorized(auth.to_string())
                }
                AuthError::InvalidAdminToken => ApiError::unauthorized(auth.to_string()),
                AuthError::InsufficientAccess(_) => ApiError::forbidden(auth.to_string()),
            },
            MemoryError::Rate(RateError::LimitExceeded { .. }) => ApiError::new(ErrorCode::RateLimited, e.to_string()),
            MemoryError::Input(ref input) => match input {
                InputError::MissingField(field) => ApiError::new(ErrorCode::MissingField, field.to_string())
                    .with_details(serde_json::json!({ "field": field })),
                InputError::InvalidValue { field, reason } => {
                    ApiError::validation_failed(field.clone(), reason.clone())
                }
                InputError::UnsupportedMimeType(_) => ApiError::new(ErrorCode::InvalidInput, input.to_string()),
            },
            MemoryError::NotFound(ref nf) => {
                let code = match nf {
                    NotFoundError::Memory(_) => ErrorCode::MemoryNotFound,
                    NotFoundError::Lesson(_) => ErrorCode::LessonNotFound,
                    NotFoundError::Agent(_) => ErrorCode::AgentNotFound,
                    NotFoundError::Settings => ErrorCode::SettingsNotFound,
                };
                ApiError::new(code, nf.to_string())
            }
            MemoryError::Upstream(ref up) => match up {
                UpstreamError::Timeout(_) => ApiError::new(ErrorCode::UpstreamUnavailable, up.to_string()),
                _ => ApiError::new(ErrorCode::UpstreamUnavailable, up.to_string()),
            },
            MemoryError::Storage(StorageError::TransactionFailed(msg)) => {
                ApiError::new(ErrorCode::DatabaseError, msg)
            }
            MemoryError::Storage(ref storage) => ApiError::new(ErrorCode::DatabaseError, storage.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let e: ApiError = MemoryError::NotFound(NotFoundError::Memory("abc".into())).into();
        assert_eq!(e.code, ErrorCode::MemoryNotFound);
        assert_eq!(e.code.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rate_limit_maps_to_429() {
        let e: ApiError = MemoryError::Rate(RateError::LimitExceeded { agent_id: "a".into(), limit: 60 }).into();
        assert_eq!(e.code.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn insufficient_access_is_forbidden_not_unauthorized() {
        let e: ApiError = MemoryError::Auth(AuthError::InsufficientAccess("admin")).into();
        assert_eq!(e.code, ErrorCode::Forbidden);
    }
}
