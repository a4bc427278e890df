//! OpenAPI specification for the memory API.
//!
//! Uses utoipa to generate the OpenAPI document from route annotations and
//! response types. Gated behind the `openapi` feature so a minimal build
//! doesn't need to carry schema derives for every DTO.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::{admin, config, health, init, interactions, lessons, search, timeline};

use memory_core::{AccessLevel, ChannelType, EntityRef, EntityType, LessonStatus};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Memory API",
        version = "0.1.0",
        description = "Shared long-term memory store for multi-agent systems: interaction ingest, semantic search, entity timelines, and curated lessons.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development")
    ),
    tags(
        (name = "Interactions", description = "Ingest raw interactions and their attachments"),
        (name = "Search", description = "Semantic search over stored memories"),
        (name = "Timeline", description = "Per-entity chronological history"),
        (name = "Lessons", description = "Curated, durable knowledge distilled from memories"),
        (name = "Admin", description = "Direct record access, roll-ups, and agent credentials"),
        (name = "Config", description = "Runtime-editable service settings"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Metrics endpoint")
    ),
    paths(
        interactions::create_interaction,
        search::search,
        timeline::get_timeline,
        lessons::list_lessons,
        lessons::create_lesson,
        lessons::update_lesson_status,
        lessons::archive_lesson,
        admin::get_memory,
        admin::get_daily,
        admin::create_agent,
        admin::list_agents,
        admin::revoke_agent,
        config::get_settings,
        config::update_settings,
        init::init_service,
        health::ping,
        health::liveness,
        health::readiness,
    ),
    components(
        schemas(
            ApiError, ErrorCode,
            AccessLevel, ChannelType, EntityType, LessonStatus, EntityRef,
            admin::MemoryView, admin::DailyRollup, admin::CreateAgentBody,
            admin::CreateAgentResponse, admin::AgentView,
            lessons::LessonView, lessons::CreateLessonBody, lessons::UpdateLessonStatusBody,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "agent_api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
            components.add_security_scheme(
                "admin_bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Admin bearer token, verified against the identity collaborator"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn generates_expected_paths() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.info.title, "Memory API");
        assert!(doc.paths.paths.contains_key("/interactions"));
        assert!(doc.paths.paths.contains_key("/search"));
        assert!(doc.paths.paths.contains_key("/config/settings"));
    }

    #[test]
    fn security_schemes_present() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components missing");
        assert!(components.security_schemes.contains_key("agent_api_key"));
        assert!(components.security_schemes.contains_key("admin_bearer"));
    }

    #[test]
    fn json_round_trips() {
        let json = ApiDoc::to_json().expect("serialization failed");
        serde_json::from_str::<serde_json::Value>(&json).expect("invalid JSON");
    }
}
