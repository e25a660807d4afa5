mod api;

#[cfg(test)]
mod tests;

use async_trait::async_trait;

use crate::error::{KbError, Result};

pub use api::{ApiConfig, EmbeddingApiClient};

/// Turns text into vectors of a fixed width.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KbError::Embedding("No embedding generated".to_string()))
    }
}
