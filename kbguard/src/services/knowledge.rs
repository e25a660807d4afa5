use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use nanoid::nanoid;
use validator::Validate;

use crate::codec;
use crate::db::DatabaseBackend;
use crate::error::{KbError, Result};
use crate::models::{
    CreateKnowledgeRequest, ItemOutcome, ItemStatus, KnowledgeBase, KnowledgeItem, Metadata,
    NewChunk, NewItem,
};
use crate::processing::ProcessingPipeline;

/// Knowledge-base lifecycle and item ingestion.
#[derive(Clone)]
pub struct KnowledgeService {
    db: Arc<dyn DatabaseBackend>,
    pipeline: Arc<ProcessingPipeline>,
    metadata_key: String,
    batch_size: usize,
}

impl KnowledgeService {
    pub fn new(
        db: Arc<dyn DatabaseBackend>,
        pipeline: Arc<ProcessingPipeline>,
        metadata_key: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            db,
            pipeline,
            metadata_key: metadata_key.into(),
            batch_size: batch_size.max(1),
        }
    }

    /// Return the knowledge base named `req.name`, creating it first if
    /// needed. The flag is `true` when it was created by this call.
    pub async fn create_if_not_exists(
        &self,
        req: &CreateKnowledgeRequest,
    ) -> Result<(KnowledgeBase, bool)> {
        req.validate()
            .map_err(|e| KbError::Validation(e.to_string()))?;

        let name = req.name.trim();
        if let Some(existing) = self.db.get_knowledge_by_name(name).await? {
            tracing::info!(knowledge_id = %existing.id, name = %name, "Knowledge base already exists");
            return Ok((existing, false));
        }

        let kb = KnowledgeBase::new(nanoid!(), name.to_string(), req.description.clone());
        match self.db.create_knowledge(&kb).await {
            Ok(()) => {
                tracing::info!(knowledge_id = %kb.id, name = %name, "Created knowledge base");
                Ok((kb, true))
            }
            // Lost a race on the unique name.
            Err(KbError::Database(e)) => match self.db.get_knowledge_by_name(name).await? {
                Some(existing) => Ok((existing, false)),
                None => Err(KbError::Database(e)),
            },
            Err(e) => Err(e),
        }
    }

    pub async fn get(&self, knowledge_id: &str) -> Result<KnowledgeBase> {
        self.db
            .get_knowledge(knowledge_id)
            .await?
            .ok_or_else(|| KbError::NotFound(format!("Knowledge base {knowledge_id} not found")))
    }

    pub async fn list(&self) -> Result<Vec<KnowledgeBase>> {
        self.db.list_knowledge().await
    }

    /// Delete a knowledge base with all items and chunks. Returns the number
    /// of chunks removed.
    pub async fn delete(&self, knowledge_id: &str) -> Result<u64> {
        let removed = self
            .db
            .delete_knowledge(knowledge_id)
            .await?
            .ok_or_else(|| KbError::NotFound(format!("Knowledge base {knowledge_id} not found")))?;
        tracing::info!(knowledge_id = %knowledge_id, chunks = removed, "Deleted knowledge base");
        Ok(removed)
    }

    pub async fn list_items(&self, knowledge_id: &str) -> Result<Vec<KnowledgeItem>> {
        self.get(knowledge_id).await?;
        self.db.list_items(knowledge_id).await
    }

    /// Ingest new items. Items whose URL is already present in the knowledge
    /// base (or earlier in the same request) are skipped.
    pub async fn add_items(
        &self,
        knowledge_id: &str,
        items: Vec<NewItem>,
    ) -> Result<Vec<ItemOutcome>> {
        self.get(knowledge_id).await?;

        let mut outcomes: Vec<Option<ItemOutcome>> = (0..items.len()).map(|_| None).collect();
        let mut pending = Vec::new();
        let mut seen = HashSet::new();

        for (idx, item) in items.iter().enumerate() {
            if let Err(e) = item.extra.validate() {
                outcomes[idx] = Some(ItemOutcome::failed(item.url(), e));
                continue;
            }
            let duplicate = !seen.insert(item.url().to_string())
                || self
                    .db
                    .get_item_by_url(knowledge_id, item.url())
                    .await?
                    .is_some();
            if duplicate {
                tracing::warn!(knowledge_id = %knowledge_id, url = %item.url(), "Item already exists, skipping");
                outcomes[idx] = Some(ItemOutcome::new(item.url(), ItemStatus::Skipped));
                continue;
            }
            pending.push((idx, item));
        }

        for batch in pending.chunks(self.batch_size) {
            let results = join_all(
                batch
                    .iter()
                    .map(|(_, item)| self.ingest(knowledge_id, item, None)),
            )
            .await;

            for ((idx, item), result) in batch.iter().zip(results) {
                outcomes[*idx] = Some(match result {
                    Ok(item_id) => {
                        ItemOutcome::new(item.url(), ItemStatus::Added).with_item_id(item_id)
                    }
                    Err(e) => {
                        tracing::warn!(url = %item.url(), error = %e, "Failed to add item");
                        ItemOutcome::failed(item.url(), e)
                    }
                });
            }
        }

        Ok(outcomes.into_iter().flatten().collect())
    }

    /// Re-ingest items matched by URL. The old item and its chunks are
    /// replaced atomically, so the new ACL takes effect at once.
    pub async fn update_items(
        &self,
        knowledge_id: &str,
        items: Vec<NewItem>,
    ) -> Result<Vec<ItemOutcome>> {
        self.get(knowledge_id).await?;

        let mut outcomes: Vec<Option<ItemOutcome>> = (0..items.len()).map(|_| None).collect();
        let mut pending = Vec::new();
        let mut seen = HashSet::new();

        for (idx, item) in items.iter().enumerate() {
            if let Err(e) = item.extra.validate() {
                outcomes[idx] = Some(ItemOutcome::failed(item.url(), e));
                continue;
            }
            if !seen.insert(item.url().to_string()) {
                tracing::warn!(knowledge_id = %knowledge_id, url = %item.url(), "Duplicate item in update, skipping");
                outcomes[idx] = Some(ItemOutcome::new(item.url(), ItemStatus::Skipped));
                continue;
            }
            match self.db.get_item_by_url(knowledge_id, item.url()).await? {
                Some(existing) => pending.push((idx, item, existing.id)),
                None => {
                    tracing::warn!(knowledge_id = %knowledge_id, url = %item.url(), "Item to update not found");
                    outcomes[idx] = Some(ItemOutcome::new(item.url(), ItemStatus::NotFound));
                }
            }
        }

        for batch in pending.chunks(self.batch_size) {
            let results = join_all(
                batch
                    .iter()
                    .map(|(_, item, old_id)| self.ingest(knowledge_id, item, Some(old_id.as_str()))),
            )
            .await;

            for ((idx, item, _), result) in batch.iter().zip(results) {
                outcomes[*idx] = Some(match result {
                    Ok(item_id) => {
                        ItemOutcome::new(item.url(), ItemStatus::Updated).with_item_id(item_id)
                    }
                    Err(e) => {
                        tracing::warn!(url = %item.url(), error = %e, "Failed to update item");
                        ItemOutcome::failed(item.url(), e)
                    }
                });
            }
        }

        Ok(outcomes.into_iter().flatten().collect())
    }

    pub async fn remove_items(
        &self,
        knowledge_id: &str,
        item_ids: &[String],
    ) -> Result<Vec<ItemOutcome>> {
        self.get(knowledge_id).await?;

        let mut outcomes = Vec::with_capacity(item_ids.len());
        for item_id in item_ids {
            let item = self
                .db
                .get_item(item_id)
                .await?
                .filter(|item| item.knowledge_id == knowledge_id);

            let outcome = match item {
                Some(item) => {
                    self.db.delete_item(&item.id).await?;
                    tracing::info!(knowledge_id = %knowledge_id, item_id = %item.id, "Removed item");
                    ItemOutcome::for_item(&item.id, ItemStatus::Removed).with_url(item.item_url)
                }
                None => ItemOutcome::for_item(item_id, ItemStatus::NotFound),
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Chunk, embed and store one item. With `replaces`, the old item is
    /// swapped out in the same transaction.
    async fn ingest(
        &self,
        knowledge_id: &str,
        item: &NewItem,
        replaces: Option<&str>,
    ) -> Result<String> {
        let embedded = self.pipeline.process(item).await?;

        let mut item_metadata = Metadata::new();
        codec::merge_into(&mut item_metadata, &item.extra, &self.metadata_key)?;
        let record = KnowledgeItem {
            id: nanoid!(),
            knowledge_id: knowledge_id.to_string(),
            item_url: item.url().to_string(),
            metadata: item_metadata,
            chunk_count: embedded.len() as i64,
            created_at: Utc::now(),
        };

        let chunks: Vec<NewChunk> = embedded
            .into_iter()
            .map(|chunk| {
                NewChunk::new(knowledge_id, chunk.content, chunk.vector, item.extra.clone())
                    .with_item(&record.id)
            })
            .collect();

        match replaces {
            Some(old_id) => {
                self.db
                    .replace_item_chunks(old_id, &record, &chunks)
                    .await?
            }
            None => self.db.insert_item_chunks(&record, &chunks).await?,
        };

        tracing::info!(
            knowledge_id = %knowledge_id,
            item_id = %record.id,
            url = %record.item_url,
            chunks = chunks.len(),
            "Ingested item"
        );
        Ok(record.id)
    }
}
