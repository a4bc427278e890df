//! HTTP API layer for the memory service: ingest, search, timeline,
//! lesson curation, and admin configuration over the storage and LLM
//! collaborator crates.

pub mod background;
pub mod config;
pub mod constants;
pub mod docparser;
pub mod enrich;
pub mod error;
pub mod gate;
pub mod ingest;
pub mod macros;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod retrieve;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use error::{ApiError, ApiResult, ErrorCode};
pub use gate::{auth_middleware, rate_limit_middleware, AuthContext, AuthExtractor, RateLimiter};
pub use routes::create_router;
pub use state::{AppState, DbSettingsFetcher};
pub use telemetry::{init_tracer, metrics_handler, shutdown_tracer, MemoryMetrics, TelemetryConfig, METRICS};
