use crate::config::validate_metadata_key;
use crate::db::connection::Database;
use crate::db::repository::{
    validate_chunk, ChunkRepository, ItemRepository, KnowledgeRepository,
};
use crate::db::traits::{ChunkStore, DatabaseBackend, KnowledgeStore, MetadataStore};
use crate::db::MetadataRepository;
use crate::error::Result;
use crate::models::{
    KnowledgeBase, KnowledgeItem, NewChunk, ResolvedIdentity, ScoredChunk, SearchQuery,
};
use async_trait::async_trait;
use libsql::Connection;

pub struct LibSqlBackend {
    db: Database,
    metadata_key: String,
}

impl LibSqlBackend {
    pub fn new(db: Database, metadata_key: impl Into<String>) -> Result<Self> {
        let metadata_key = metadata_key.into();
        validate_metadata_key(&metadata_key)?;
        Ok(Self { db, metadata_key })
    }

    pub fn metadata_key(&self) -> &str {
        &self.metadata_key
    }

    async fn insert_chunks(&self, conn: &Connection, chunks: &[NewChunk]) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            ids.push(ChunkRepository::create(conn, chunk, &self.metadata_key).await?);
        }
        Ok(ids)
    }

    fn validate_all(&self, chunks: &[NewChunk]) -> Result<()> {
        for chunk in chunks {
            validate_chunk(chunk, self.db.dimensions())?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for LibSqlBackend {
    async fn insert_chunk(&self, chunk: &NewChunk) -> Result<String> {
        validate_chunk(chunk, self.db.dimensions())?;
        let conn = self.db.connect()?;
        ChunkRepository::create(&conn, chunk, &self.metadata_key).await
    }

    async fn insert_item_chunks(
        &self,
        item: &KnowledgeItem,
        chunks: &[NewChunk],
    ) -> Result<Vec<String>> {
        self.validate_all(chunks)?;
        let conn = self.db.connect()?;
        let tx = conn.transaction().await?;
        ItemRepository::create(&tx, item).await?;
        let ids = self.insert_chunks(&tx, chunks).await?;
        KnowledgeRepository::touch(&tx, &item.knowledge_id).await?;
        tx.commit().await?;

        tracing::debug!(item_id = %item.id, chunks = ids.len(), "Inserted item chunks");
        Ok(ids)
    }

    async fn replace_item_chunks(
        &self,
        old_item_id: &str,
        item: &KnowledgeItem,
        chunks: &[NewChunk],
    ) -> Result<Vec<String>> {
        self.validate_all(chunks)?;
        let conn = self.db.connect()?;
        let tx = conn.transaction().await?;
        let removed = ChunkRepository::delete_by_item_id(&tx, old_item_id).await?;
        ItemRepository::delete(&tx, old_item_id).await?;
        ItemRepository::create(&tx, item).await?;
        let ids = self.insert_chunks(&tx, chunks).await?;
        KnowledgeRepository::touch(&tx, &item.knowledge_id).await?;
        tx.commit().await?;

        tracing::debug!(
            old_item_id = %old_item_id,
            item_id = %item.id,
            removed,
            inserted = ids.len(),
            "Replaced item chunks"
        );
        Ok(ids)
    }

    async fn search(
        &self,
        query: &SearchQuery,
        identity: &ResolvedIdentity,
    ) -> Result<Vec<ScoredChunk>> {
        let conn = self.db.connect()?;
        ChunkRepository::search_similar(
            &conn,
            query,
            identity,
            &self.metadata_key,
            self.db.dimensions(),
        )
        .await
    }

    async fn delete_by_knowledge_base(&self, knowledge_id: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        ChunkRepository::delete_by_knowledge_id(&conn, knowledge_id).await
    }

    async fn delete_by_item(&self, item_id: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        ChunkRepository::delete_by_item_id(&conn, item_id).await
    }

    async fn count_chunks(&self, knowledge_id: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        ChunkRepository::count_by_knowledge_id(&conn, knowledge_id).await
    }
}

#[async_trait]
impl KnowledgeStore for LibSqlBackend {
    async fn create_knowledge(&self, kb: &KnowledgeBase) -> Result<()> {
        let conn = self.db.connect()?;
        KnowledgeRepository::create(&conn, kb).await
    }

    async fn get_knowledge(&self, id: &str) -> Result<Option<KnowledgeBase>> {
        let conn = self.db.connect()?;
        KnowledgeRepository::get_by_id(&conn, id).await
    }

    async fn get_knowledge_by_name(&self, name: &str) -> Result<Option<KnowledgeBase>> {
        let conn = self.db.connect()?;
        KnowledgeRepository::get_by_name(&conn, name).await
    }

    async fn list_knowledge(&self) -> Result<Vec<KnowledgeBase>> {
        let conn = self.db.connect()?;
        KnowledgeRepository::list(&conn).await
    }

    async fn delete_knowledge(&self, id: &str) -> Result<Option<u64>> {
        let conn = self.db.connect()?;
        let tx = conn.transaction().await?;
        let chunks = ChunkRepository::delete_by_knowledge_id(&tx, id).await?;
        ItemRepository::delete_by_knowledge_id(&tx, id).await?;
        let existed = KnowledgeRepository::delete(&tx, id).await?;
        tx.commit().await?;

        Ok(existed.then_some(chunks))
    }

    async fn list_items(&self, knowledge_id: &str) -> Result<Vec<KnowledgeItem>> {
        let conn = self.db.connect()?;
        ItemRepository::list_by_knowledge_id(&conn, knowledge_id).await
    }

    async fn get_item(&self, item_id: &str) -> Result<Option<KnowledgeItem>> {
        let conn = self.db.connect()?;
        ItemRepository::get_by_id(&conn, item_id).await
    }

    async fn get_item_by_url(
        &self,
        knowledge_id: &str,
        item_url: &str,
    ) -> Result<Option<KnowledgeItem>> {
        let conn = self.db.connect()?;
        ItemRepository::get_by_url(&conn, knowledge_id, item_url).await
    }

    async fn delete_item(&self, item_id: &str) -> Result<bool> {
        let conn = self.db.connect()?;
        let tx = conn.transaction().await?;
        ChunkRepository::delete_by_item_id(&tx, item_id).await?;
        let existed = ItemRepository::delete(&tx, item_id).await?;
        tx.commit().await?;
        Ok(existed)
    }
}

#[async_trait]
impl MetadataStore for LibSqlBackend {
    async fn get_embedding_dimensions(&self) -> Result<Option<usize>> {
        let conn = self.db.connect()?;
        MetadataRepository::get_embedding_dimensions(&conn).await
    }

    async fn set_embedding_dimensions(&self, dims: usize) -> Result<()> {
        let conn = self.db.connect()?;
        MetadataRepository::set_embedding_dimensions(&conn, dims).await
    }
}

#[async_trait]
impl DatabaseBackend for LibSqlBackend {
    async fn sync(&self) -> Result<()> {
        self.db.sync().await
    }

    fn dimensions(&self) -> usize {
        self.db.dimensions()
    }
}
