//! Error types for memory-service operations.

use thiserror::Error;

/// Agent/admin authentication failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("unknown agent key")]
    UnknownAgentKey,

    #[error("agent is not active")]
    AgentInactive,

    #[error("invalid or expired admin token")]
    InvalidAdminToken,

    #[error("caller lacks the {0} access level")]
    InsufficientAccess(&'static str),
}

/// Rate-limiting failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RateError {
    #[error("agent {agent_id} exceeded {limit} requests/minute")]
    LimitExceeded { agent_id: String, limit: u32 },
}

/// Malformed or missing caller input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("required field missing: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("unsupported attachment mime type: {0}")]
    UnsupportedMimeType(String),
}

/// Requested entity does not exist or is not visible to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("memory {0} not found")]
    Memory(String),

    #[error("lesson {0} not found")]
    Lesson(String),

    #[error("agent {0} not found")]
    Agent(String),

    #[error("settings row is missing")]
    Settings,
}

/// Failures from an outbound collaborator service (LLM, embeddings,
/// redaction, vector store).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("embedding provider failed: {0}")]
    Embedding(String),

    #[error("chat/completion provider failed: {0}")]
    Llm(String),

    #[error("redaction service failed: {0}")]
    Redaction(String),

    #[error("vector store request failed: {0}")]
    VectorStore(String),

    #[error("upstream call timed out after {0}ms")]
    Timeout(u64),
}

/// Relational storage failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Master error type for all memory-service operations.
#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("rate limit error: {0}")]
    Rate(#[from] RateError),

    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for memory-service operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
