//! Shared constants for the API layer.

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// PAGINATION
// ============================================================================

/// Default page size for list operations
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Maximum page size for list operations
pub const MAX_PAGE_SIZE: i64 = 1000;

// ============================================================================
// BACKGROUND LOOP
// ============================================================================

/// Period between background loop cycles.
pub const BACKGROUND_LOOP_PERIOD_SECS: u64 = 300;

/// Timeout for a single export-snapshot activity within a cycle.
pub const EXPORT_SNAPSHOT_TIMEOUT_SECS: u64 = 60;

/// Timeout for a single lesson-mining activity within a cycle.
pub const LESSON_MINING_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// SERVER URLS
// ============================================================================

/// Development server URL, used only for local OpenAPI generation.
pub const DEV_SERVER_URL: &str = "http://localhost:3000";
