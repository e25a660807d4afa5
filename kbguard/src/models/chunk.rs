use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Citation, ExtraMetadata, Metadata};

/// A stored chunk together with its decoded permission envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthChunk {
    pub id: String,
    pub knowledge_id: String,
    pub item_id: Option<String>,
    pub content: String,
    /// Generic metadata column, including the reserved key.
    pub metadata: Metadata,
    /// The envelope decoded from `metadata`.
    pub extra: ExtraMetadata,
    pub created_at: DateTime<Utc>,
}

/// Input for a single chunk insert.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub knowledge_id: String,
    pub item_id: Option<String>,
    pub content: String,
    pub vector: Vec<f32>,
    pub extra: ExtraMetadata,
    /// Unrelated keys to store next to the envelope.
    pub metadata: Metadata,
}

impl NewChunk {
    pub fn new(
        knowledge_id: impl Into<String>,
        content: impl Into<String>,
        vector: Vec<f32>,
        extra: ExtraMetadata,
    ) -> Self {
        Self {
            knowledge_id: knowledge_id.into(),
            item_id: None,
            content: content.into(),
            vector,
            extra,
            metadata: Metadata::new(),
        }
    }

    pub fn with_item(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }
}

/// Chunk text and vector produced by ingestion, before the envelope is
/// attached.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub content: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: AuthChunk,
    pub score: f32,
}

/// Similarity query over one or more knowledge bases.
///
/// An empty `knowledge_ids` searches every knowledge base.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub knowledge_ids: Vec<String>,
    pub vector: Vec<f32>,
    pub k: usize,
}

impl SearchQuery {
    pub fn new(knowledge_ids: Vec<String>, vector: Vec<f32>, k: usize) -> Self {
        Self {
            knowledge_ids,
            vector,
            k,
        }
    }
}

/// One authorized retrieval result as handed to the chat layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub chunk_id: String,
    pub knowledge_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub content: String,
    pub score: f32,
    pub citation: Citation,
}

impl From<ScoredChunk> for RetrievalHit {
    fn from(scored: ScoredChunk) -> Self {
        let citation = Citation::from(&scored.chunk.extra.metadata);
        Self {
            chunk_id: scored.chunk.id,
            knowledge_id: scored.chunk.knowledge_id,
            item_id: scored.chunk.item_id,
            content: scored.chunk.content,
            score: scored.score,
            citation,
        }
    }
}
