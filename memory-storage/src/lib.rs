//! Dual-store persistence: `relational` holds the authoritative Postgres
//! copy of every entity, `vector` talks to the pluggable vector index, and
//! `settings_cache` fronts the single global settings row with an explicit
//! staleness contract.

pub mod relational;
pub mod settings_cache;
pub mod vector;

pub use relational::{DbClient, DbConfig};
pub use settings_cache::{Freshness, SettingsCache, SettingsFetcher};
pub use vector::{VectorPoint, VectorSearchHit, VectorStoreClient};
