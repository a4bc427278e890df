//! HTTP client for the Qdrant-shaped vector store contract.
//!
//! Generalized from the embedding/chat provider adapter shape: one thin
//! `reqwest::Client` wrapper per outbound collaborator, a uniform error
//! mapping, and a bootstrap step analogous to a provider's ping/discovery
//! call.

use memory_core::{MemoryError, MemoryResult, UpstreamError, VectorFilter};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub struct VectorStoreClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: JsonValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorSearchHit {
    pub id: String,
    pub score: f32,
    pub payload: JsonValue,
}

#[derive(Debug, Serialize)]
struct CollectionCreate {
    vectors: CollectionVectorConfig,
}

#[derive(Debug, Serialize)]
struct CollectionVectorConfig {
    size: i32,
    distance: &'static str,
}

#[derive(Debug, Serialize)]
struct UpsertPointsRequest {
    points: Vec<VectorPoint>,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a VectorFilter>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<VectorSearchHit>,
}

#[derive(Debug, Serialize)]
struct DeletePointsRequest<'a> {
    points: &'a [String],
}

impl VectorStoreClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn upstream_err(context: &str, e: impl std::fmt::Display) -> MemoryError {
        MemoryError::Upstream(UpstreamError::VectorStore(format!("{context}: {e}")))
    }

    /// Create `name` with the given vector dimensions if it does not already
    /// exist. Idempotent, used by bootstrap on service start.
    pub async fn ensure_collection(&self, name: &str, dimensions: i32) -> MemoryResult<()> {
        let exists = self
            .client
            .get(self.url(&format!("collections/{name}")))
            .send()
            .await
            .map_err(|e| Self::upstream_err("collection probe failed", e))?
            .status()
            == StatusCode::OK;

        if exists {
            return Ok(());
        }

        let body = CollectionCreate { vectors: CollectionVectorConfig { size: dimensions, distance: "Cosine" } };
        let resp = self
            .client
            .put(self.url(&format!("collections/{name}")))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::upstream_err("collection create failed", e))?;

        if !resp.status().is_success() {
            return Err(Self::upstream_err("collection create rejected", resp.status()));
        }
        Ok(())
    }

    pub async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> MemoryResult<()> {
        let resp = self
            .client
            .put(self.url(&format!("collections/{collection}/points")))
            .json(&UpsertPointsRequest { points })
            .send()
            .await
            .map_err(|e| Self::upstream_err("upsert failed", e))?;

        if !resp.status().is_success() {
            return Err(Self::upstream_err("upsert rejected", resp.status()));
        }
        Ok(())
    }

    pub async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: i64,
        filter: Option<&VectorFilter>,
    ) -> MemoryResult<Vec<VectorSearchHit>> {
        let resp = self
            .client
            .post(self.url(&format!("collections/{collection}/points/search")))
            .json(&SearchRequest { vector, limit, filter })
            .send()
            .await
            .map_err(|e| Self::upstream_err("search failed", e))?;

        if !resp.status().is_success() {
            return Err(Self::upstream_err("search rejected", resp.status()));
        }

        let parsed: SearchResponse =
            resp.json().await.map_err(|e| Self::upstream_err("invalid search response", e))?;
        Ok(parsed.result)
    }

    pub async fn delete(&self, collection: &str, ids: &[String]) -> MemoryResult<()> {
        let resp = self
            .client
            .post(self.url(&format!("collections/{collection}/points/delete")))
            .json(&DeletePointsRequest { points: ids })
            .send()
            .await
            .map_err(|e| Self::upstream_err("delete failed", e))?;

        if !resp.status().is_success() {
            return Err(Self::upstream_err("delete rejected", resp.status()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for VectorStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStoreClient").field("base_url", &self.base_url).finish()
    }
}
