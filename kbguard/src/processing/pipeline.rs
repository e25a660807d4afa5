use std::sync::Arc;

use crate::config::ProcessingConfig;
use crate::embeddings::Embedder;
use crate::error::{KbError, Result};
use crate::models::{EmbeddedChunk, NewItem};

use super::TextChunker;

/// Chunk and embed item text. Storage is left to the caller so an item and
/// its chunks can be written in one transaction.
pub struct ProcessingPipeline {
    embedder: Arc<dyn Embedder>,
    chunker: TextChunker,
}

impl ProcessingPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, config: &ProcessingConfig) -> Result<Self> {
        Ok(Self {
            embedder,
            chunker: TextChunker::new(config)?,
        })
    }

    pub fn with_chunker(embedder: Arc<dyn Embedder>, chunker: TextChunker) -> Self {
        Self { embedder, chunker }
    }

    pub async fn process(&self, item: &NewItem) -> Result<Vec<EmbeddedChunk>> {
        let texts = self.chunker.chunk(&item.content);
        if texts.is_empty() {
            return Err(KbError::Validation(format!(
                "Item {} has no content to index",
                item.url()
            )));
        }

        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = self.embedder.embed(&refs).await?;
        if vectors.len() != texts.len() {
            return Err(KbError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        tracing::debug!(url = %item.url(), chunks = texts.len(), "Processed item");

        Ok(texts
            .into_iter()
            .zip(vectors)
            .map(|(content, vector)| EmbeddedChunk { content, vector })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtraMetadata, ItemMetadata, ItemPermissions};
    use async_trait::async_trait;
    use chrono::Utc;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    fn item(content: &str) -> NewItem {
        NewItem::new(
            content,
            ExtraMetadata::new(
                ItemPermissions::default(),
                ItemMetadata {
                    title: "t".to_string(),
                    url: "https://x.example.com/a".to_string(),
                    context_url: None,
                    date: Utc::now(),
                    source: None,
                },
            ),
        )
    }

    #[tokio::test]
    async fn test_process_pairs_chunks_with_vectors() {
        let pipeline = ProcessingPipeline::with_chunker(
            Arc::new(LengthEmbedder),
            TextChunker::with_sizes(20, 0).unwrap(),
        );
        let chunks = pipeline
            .process(&item("First sentence here. Second sentence here."))
            .await
            .unwrap();

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert_eq!(chunk.vector[0], chunk.content.len() as f32);
        }
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let pipeline =
            ProcessingPipeline::with_chunker(Arc::new(LengthEmbedder), TextChunker::default());
        assert!(matches!(
            pipeline.process(&item("  ")).await,
            Err(KbError::Validation(_))
        ));
    }
}
