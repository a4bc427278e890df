//! Authenticates every inbound request before any side effects occur.
//!
//! Follows the usual Axum middleware-plus-extractor shape: an
//! `AuthExtractor` pulls the agent API key or admin bearer token out of the
//! request and verifies it, and the rate limiter keeps a per-agent
//! timestamp deque rather than a shared token bucket, so concurrent
//! requests are serialized per agent and independent across agents.

use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use memory_core::{AccessLevel, AgentId, AuthError, EntityIdType, MemoryError, RateError};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::ApiError;
use crate::state::AppState;

/// Caller identity established by the gate, attached to request extensions.
#[derive(Debug, Clone)]
pub enum AuthContext {
    Agent { agent_id: AgentId, access_level: AccessLevel },
    Admin { user_id: String },
}

impl AuthContext {
    pub fn agent_id(&self) -> Option<AgentId> {
        match self {
            AuthContext::Agent { agent_id, .. } => Some(*agent_id),
            AuthContext::Admin { .. } => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, AuthContext::Admin { .. })
    }

    pub fn require_admin(&self) -> Result<(), MemoryError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(MemoryError::Auth(AuthError::InsufficientAccess("admin")))
        }
    }
}

/// Extractor pulling the `AuthContext` a preceding middleware layer attached
/// to the request.
pub struct AuthExtractor(pub AuthContext);

impl<S: Send + Sync> FromRequestParts<S> for AuthExtractor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthExtractor)
            .ok_or_else(|| ApiError::unauthorized("no authentication context on request"))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Authenticates via `x-api-key` (agent) or `authorization: Bearer` (admin),
/// attaching `AuthContext` to the request. Runs before rate limiting so an
/// unauthenticated caller is rejected without consuming an agent's window.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, MemoryError> {
    if let Some(key) = header_str(headers, "x-api-key") {
        let hash = memory_core::hash_api_key(key);
        let agent = state
            .db
            .agent_get_by_key_hash(&hash)
            .await?
            .ok_or(MemoryError::Auth(AuthError::UnknownAgentKey))?;
        if !agent.is_active {
            return Err(MemoryError::Auth(AuthError::AgentInactive));
        }
        state.db.agent_touch_last_used(agent.id).await?;
        return Ok(AuthContext::Agent { agent_id: agent.id, access_level: agent.access_level });
    }

    if let Some(token) = header_str(headers, "authorization").and_then(|v| v.strip_prefix("Bearer ")) {
        let user_id = state.identity.verify_bearer(token).await?;
        return Ok(AuthContext::Admin { user_id });
    }

    Err(MemoryError::Auth(AuthError::MissingCredential("x-api-key or authorization")))
}

// ---------------------------------------------------------------------
// Rate limiter
// ---------------------------------------------------------------------

/// Per-agent sliding-window rate limiter: on each admission check, evict
/// timestamps older than `now - 60s`, reject if the remaining count has
/// already reached `limit`, else append.
///
/// One `Mutex<VecDeque<..>>` entry per agent serializes access to that
/// agent's window; distinct agents never contend on each other's entry.
#[derive(Default)]
pub struct RateLimiter {
    windows: DashMap<AgentId, Arc<Mutex<VecDeque<DateTime<Utc>>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a request for `agent_id` against `limit` requests/minute.
    /// Returns `RateError::LimitExceeded` without mutating the window when
    /// the limit is already reached.
    pub async fn admit(&self, agent_id: AgentId, limit: u32) -> Result<(), RateError> {
        let entry = self.windows.entry(agent_id).or_insert_with(|| Arc::new(Mutex::new(VecDeque::new()))).clone();
        let mut window = entry.lock().await;
        let now = Utc::now();
        let cutoff = now - chrono::Duration::seconds(60);
        while window.front().is_some_and(|t| *t < cutoff) {
            window.pop_front();
        }
        if window.len() as u32 >= limit {
            return Err(RateError::LimitExceeded { agent_id: agent_id.to_string(), limit });
        }
        window.push_back(now);
        Ok(())
    }

    /// Opportunistic eviction of stale per-agent windows, run by the
    /// background loop. Drops any agent whose window is
    /// entirely older than `now - 60s`, and trims the rest.
    pub async fn gc(&self) {
        let cutoff = Utc::now() - chrono::Duration::seconds(60);
        let mut empty = Vec::new();
        for entry in self.windows.iter() {
            let mut window = entry.value().lock().await;
            while window.front().is_some_and(|t| *t < cutoff) {
                window.pop_front();
            }
            if window.is_empty() {
                empty.push(*entry.key());
            }
        }
        for key in empty {
            self.windows.remove(&key);
        }
    }
}

/// Applies the gate's rate limit to agent callers only; admin callers are
/// not rate-limited. Requires `auth_middleware` to have already run.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let settings = match state.settings_cache.get(crate::config::settings_freshness(), &state.settings_fetcher).await
    {
        Ok(s) => s,
        Err(e) => return ApiError::from(e).into_response(),
    };

    if settings.rate_limit_enabled {
        if let Some(ctx) = request.extensions().get::<AuthContext>() {
            if let Some(agent_id) = ctx.agent_id() {
                if let Err(e) = state.rate_limiter.admit(agent_id, settings.rate_limit_per_minute).await {
                    return ApiError::from(MemoryError::Rate(e)).into_response();
                }
            }
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new();
        let agent = AgentId::now_v7();
        assert!(limiter.admit(agent, 2).await.is_ok());
        assert!(limiter.admit(agent, 2).await.is_ok());
        assert!(limiter.admit(agent, 2).await.is_err());
    }

    #[tokio::test]
    async fn distinct_agents_do_not_share_a_window() {
        let limiter = RateLimiter::new();
        let a = AgentId::now_v7();
        let b = AgentId::now_v7();
        assert!(limiter.admit(a, 1).await.is_ok());
        assert!(limiter.admit(a, 1).await.is_err());
        assert!(limiter.admit(b, 1).await.is_ok());
    }

    #[tokio::test]
    async fn gc_drops_fully_stale_windows() {
        let limiter = RateLimiter::new();
        let agent = AgentId::now_v7();
        limiter.admit(agent, 5).await.unwrap();
        limiter.gc().await;
        assert_eq!(limiter.windows.len(), 1);
    }
}
