//! Retrieval DTOs for the v1 API.

use serde::{Deserialize, Serialize};

use crate::models::{Citation, RetrievalHit};

fn default_k() -> usize {
    10
}

/// Request body for `POST /v1/retrieval/query`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// Knowledge bases to search. Empty searches all of them.
    #[serde(default)]
    pub knowledge_ids: Vec<String>,
    pub query: String,
    #[serde(default = "default_k")]
    pub k: usize,
}

/// One authorized hit. Only citation fields of the envelope are exposed;
/// the ACL never leaves the service.
#[derive(Debug, Clone, Serialize)]
pub struct HitResponse {
    pub chunk_id: String,
    pub knowledge_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub content: String,
    pub score: f32,
    pub citation: Citation,
}

impl From<RetrievalHit> for HitResponse {
    fn from(hit: RetrievalHit) -> Self {
        Self {
            chunk_id: hit.chunk_id,
            knowledge_id: hit.knowledge_id,
            item_id: hit.item_id,
            content: hit.content,
            score: hit.score,
            citation: hit.citation,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub results: Vec<HitResponse>,
}
