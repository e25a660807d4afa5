use text_splitter::{ChunkConfig, TextSplitter};

use crate::config::ProcessingConfig;
use crate::error::{KbError, Result};

/// Splits item text into overlapping chunks measured in characters.
pub struct TextChunker {
    splitter: TextSplitter<text_splitter::Characters>,
}

impl TextChunker {
    pub fn new(config: &ProcessingConfig) -> Result<Self> {
        Self::with_sizes(config.chunk_size, config.chunk_overlap)
    }

    pub fn with_sizes(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let chunk_config = ChunkConfig::new(chunk_size)
            .with_overlap(chunk_overlap)
            .map_err(|e| KbError::Validation(format!("Invalid chunk configuration: {e}")))?;

        Ok(Self {
            splitter: TextSplitter::new(chunk_config),
        })
    }

    /// Non-empty, trimmed chunks in document order.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        self.splitter
            .chunks(text)
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            splitter: TextSplitter::new(ChunkConfig::new(1000)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_has_no_chunks() {
        let chunker = TextChunker::default();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n ").is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = TextChunker::default();
        assert_eq!(chunker.chunk("Hello world."), vec!["Hello world."]);
    }

    #[test]
    fn test_long_text_respects_chunk_size() {
        let chunker = TextChunker::with_sizes(50, 10).unwrap();
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50, "chunk too long: {chunk}");
        }
    }

    #[test]
    fn test_overlap_not_smaller_than_size_rejected() {
        assert!(matches!(
            TextChunker::with_sizes(10, 10),
            Err(KbError::Validation(_))
        ));
    }
}
