//! Enum types for memory-service entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CORE ENUMS
// ============================================================================

/// Entity type discriminator used by `EntityRef` citations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum EntityType {
    Contact,
    Organization,
    Program,
    Custom,
}

/// Access level granted to an agent credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum AccessLevel {
    #[default]
    Private,
    Shared,
    Admin,
}

/// Lifecycle status of a mined lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum LessonStatus {
    #[default]
    Draft,
    Approved,
    Archived,
}

/// Channel a raw interaction arrived over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ChannelType {
    Email,
    Call,
    Meeting,
    Chat,
    Document,
    Note,
}

/// Outcome of a single ingest attempt, used for audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum AuditAction {
    Ingest,
    Search,
    LessonApprove,
    LessonArchive,
    ConfigUpdate,
    AgentCreate,
    AgentRevoke,
}

// ============================================================================
// STRING CONVERSIONS
// ============================================================================

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            EntityType::Contact => "contact",
            EntityType::Organization => "organization",
            EntityType::Program => "program",
            EntityType::Custom => "custom",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "contact" => Ok(EntityType::Contact),
            "organization" | "org" => Ok(EntityType::Organization),
            "program" => Ok(EntityType::Program),
            "custom" => Ok(EntityType::Custom),
            _ => Err(format!("Invalid EntityType: {}", s)),
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            AccessLevel::Private => "private",
            AccessLevel::Shared => "shared",
            AccessLevel::Admin => "admin",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "private" => Ok(AccessLevel::Private),
            "shared" => Ok(AccessLevel::Shared),
            "admin" => Ok(AccessLevel::Admin),
            _ => Err(format!("Invalid AccessLevel: {}", s)),
        }
    }
}

impl fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            LessonStatus::Draft => "draft",
            LessonStatus::Approved => "approved",
            LessonStatus::Archived => "archived",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for LessonStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "draft" => Ok(LessonStatus::Draft),
            "approved" => Ok(LessonStatus::Approved),
            "archived" => Ok(LessonStatus::Archived),
            _ => Err(format!("Invalid LessonStatus: {}", s)),
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ChannelType::Email => "email",
            ChannelType::Call => "call",
            ChannelType::Meeting => "meeting",
            ChannelType::Chat => "chat",
            ChannelType::Document => "document",
            ChannelType::Note => "note",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "email" => Ok(ChannelType::Email),
            "call" => Ok(ChannelType::Call),
            "meeting" => Ok(ChannelType::Meeting),
            "chat" => Ok(ChannelType::Chat),
            "document" => Ok(ChannelType::Document),
            "note" => Ok(ChannelType::Note),
            _ => Err(format!("Invalid ChannelType: {}", s)),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            AuditAction::Ingest => "ingest",
            AuditAction::Search => "search",
            AuditAction::LessonApprove => "lesson_approve",
            AuditAction::LessonArchive => "lesson_archive",
            AuditAction::ConfigUpdate => "config_update",
            AuditAction::AgentCreate => "agent_create",
            AuditAction::AgentRevoke => "agent_revoke",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "ingest" => Ok(AuditAction::Ingest),
            "search" => Ok(AuditAction::Search),
            "lessonapprove" => Ok(AuditAction::LessonApprove),
            "lessonarchive" => Ok(AuditAction::LessonArchive),
            "configupdate" => Ok(AuditAction::ConfigUpdate),
            "agentcreate" => Ok(AuditAction::AgentCreate),
            "agentrevoke" => Ok(AuditAction::AgentRevoke),
            _ => Err(format!("Invalid AuditAction: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_round_trips() {
        for variant in [
            EntityType::Contact,
            EntityType::Organization,
            EntityType::Program,
            EntityType::Custom,
        ] {
            let s = variant.to_string();
            assert_eq!(s.parse::<EntityType>().unwrap(), variant);
        }
    }

    #[test]
    fn access_level_accepts_underscored_input() {
        assert_eq!("PRIVATE".parse::<AccessLevel>().unwrap(), AccessLevel::Private);
    }
}
