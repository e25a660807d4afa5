use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    KnowledgeBase, KnowledgeItem, NewChunk, ResolvedIdentity, ScoredChunk, SearchQuery,
};

// ---------------------------------------------------------------------------
// Individual store traits
// ---------------------------------------------------------------------------

/// Chunk storage with permission-filtered similarity search.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Insert a single chunk. The vector length and the envelope are
    /// validated before anything is written.
    async fn insert_chunk(&self, chunk: &NewChunk) -> Result<String>;

    /// Insert an item and all of its chunks in one transaction.
    async fn insert_item_chunks(
        &self,
        item: &KnowledgeItem,
        chunks: &[NewChunk],
    ) -> Result<Vec<String>>;

    /// Remove `old_item_id` with its chunks and insert `item` with `chunks`,
    /// atomically.
    async fn replace_item_chunks(
        &self,
        old_item_id: &str,
        item: &KnowledgeItem,
        chunks: &[NewChunk],
    ) -> Result<Vec<String>>;

    /// Top-`k` chunks by cosine similarity among those visible to
    /// `identity`.
    async fn search(
        &self,
        query: &SearchQuery,
        identity: &ResolvedIdentity,
    ) -> Result<Vec<ScoredChunk>>;

    async fn delete_by_knowledge_base(&self, knowledge_id: &str) -> Result<u64>;
    async fn delete_by_item(&self, item_id: &str) -> Result<u64>;
    async fn count_chunks(&self, knowledge_id: &str) -> Result<u64>;
}

/// CRUD for knowledge bases and their items.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn create_knowledge(&self, kb: &KnowledgeBase) -> Result<()>;
    async fn get_knowledge(&self, id: &str) -> Result<Option<KnowledgeBase>>;
    async fn get_knowledge_by_name(&self, name: &str) -> Result<Option<KnowledgeBase>>;
    async fn list_knowledge(&self) -> Result<Vec<KnowledgeBase>>;
    /// Delete the knowledge base with all items and chunks. Returns the
    /// number of chunks removed, or `None` if it did not exist.
    async fn delete_knowledge(&self, id: &str) -> Result<Option<u64>>;

    async fn list_items(&self, knowledge_id: &str) -> Result<Vec<KnowledgeItem>>;
    async fn get_item(&self, item_id: &str) -> Result<Option<KnowledgeItem>>;
    async fn get_item_by_url(
        &self,
        knowledge_id: &str,
        item_url: &str,
    ) -> Result<Option<KnowledgeItem>>;
    /// Delete an item and its chunks.
    async fn delete_item(&self, item_id: &str) -> Result<bool>;
}

/// Key-value metadata store (e.g. embedding dimensions).
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_embedding_dimensions(&self) -> Result<Option<usize>>;
    async fn set_embedding_dimensions(&self, dims: usize) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Unified backend supertrait
// ---------------------------------------------------------------------------

/// A complete database backend that combines all store traits plus lifecycle
/// operations.
#[async_trait]
pub trait DatabaseBackend: ChunkStore + KnowledgeStore + MetadataStore {
    /// Sync with remote (e.g. Turso replication). No-op for local-only backends.
    async fn sync(&self) -> Result<()>;

    /// Width of the vector column.
    fn dimensions(&self) -> usize;
}
