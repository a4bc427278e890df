//! Identity types for memory-service entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ENTITY ID TYPE SYSTEM
// ============================================================================

/// Trait for type-safe entity IDs.
///
/// Each entity type gets its own newtype so IDs for different entities can
/// never be accidentally mixed up at compile time.
pub trait EntityIdType:
    Copy
    + Clone
    + Eq
    + PartialEq
    + Hash
    + fmt::Debug
    + fmt::Display
    + FromStr
    + Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// The name of the entity type (e.g., "memory", "document").
    const ENTITY_NAME: &'static str;

    fn new(uuid: Uuid) -> Self;

    fn as_uuid(&self) -> Uuid;

    fn nil() -> Self {
        Self::new(Uuid::nil())
    }

    /// Create a new timestamp-sortable UUIDv7 ID.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    /// Create a new random UUIDv4 ID.
    fn new_v4() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// Error type for parsing entity IDs from strings.
#[derive(Debug, Clone)]
pub struct EntityIdParseError {
    pub entity_name: &'static str,
    pub input: String,
    pub source: uuid::Error,
}

impl fmt::Display for EntityIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to parse {} ID from '{}': {}",
            self.entity_name, self.input, self.source
        )
    }
}

impl std::error::Error for EntityIdParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

macro_rules! define_entity_id {
    ($name:ident, $entity:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EntityIdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s)
                    .map(Self::new)
                    .map_err(|e| EntityIdParseError {
                        entity_name: Self::ENTITY_NAME,
                        input: s.to_string(),
                        source: e,
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Uuid::deserialize(deserializer).map(Self::new)
            }
        }
    };
}

// ============================================================================
// ENTITY ID TYPES
// ============================================================================

define_entity_id!(MemoryId, "memory", "Type-safe ID for a stored interaction.");
define_entity_id!(DocumentId, "document", "Type-safe ID for an attached document.");
define_entity_id!(
    SharedMemoryId,
    "shared_memory",
    "Type-safe ID for a shared-pool projection of a memory."
);
define_entity_id!(LessonId, "lesson", "Type-safe ID for a mined lesson.");
define_entity_id!(
    SharedLessonId,
    "shared_lesson",
    "Type-safe ID for a shared-pool projection of a lesson."
);
define_entity_id!(AgentId, "agent", "Type-safe ID for a registered agent.");
define_entity_id!(AuditId, "audit_record", "Type-safe ID for an audit log row.");

// ============================================================================
// OTHER IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Duration in milliseconds.
pub type DurationMs = i64;

/// SHA-256 content hash for dedup and integrity verification.
pub type ContentHash = [u8; 32];

/// Raw binary content (attachment bytes).
pub type RawContent = Vec<u8>;

// ============================================================================
// UTILITY FUNCTIONS
// ============================================================================

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Compute the hex-encoded SHA-256 digest of an agent's raw API key.
///
/// This is the only form of the key that is ever persisted (Open Question
/// resolution: the raw key is shown to the caller once, at creation time).
pub fn hash_api_key(raw_key: &str) -> String {
    hex::encode(compute_content_hash(raw_key.as_bytes()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_type_safety() {
        let memory_id = MemoryId::now_v7();
        let document_id = DocumentId::now_v7();
        assert_ne!(memory_id.as_uuid(), document_id.as_uuid());
    }

    #[test]
    fn test_entity_id_display() {
        let id = MemoryId::new(Uuid::nil());
        assert_eq!(
            format!("{:?}", id),
            "MemoryId(00000000-0000-0000-0000-000000000000)"
        );
        assert_eq!(format!("{}", id), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_entity_id_from_str() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id: MemoryId = uuid_str.parse().expect("valid UUID should parse");
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn test_entity_id_parse_error() {
        let result: Result<MemoryId, _> = "invalid".parse();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.entity_name, "memory");
        assert_eq!(err.input, "invalid");
    }

    #[test]
    fn test_entity_id_serde() {
        let id = MemoryId::now_v7();
        let json = serde_json::to_string(&id).expect("serialization should succeed");
        assert!(json.starts_with('"'));
        assert!(json.ends_with('"'));

        let deserialized: MemoryId =
            serde_json::from_str(&json).expect("deserialization should succeed");
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_entity_id_default() {
        let id = MemoryId::default();
        assert_eq!(id, MemoryId::nil());
    }

    #[test]
    fn test_hash_api_key_deterministic() {
        let a = hash_api_key("sk-test-key");
        let b = hash_api_key("sk-test-key");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_api_key("sk-other-key"));
    }
}
