//! Shared fixtures for router tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::AppState;
use crate::config::{Config, DatabaseConfig};
use crate::db::{Database, DatabaseBackend, LibSqlBackend};
use crate::directory::{CachedDirectory, StaticDirectory};
use crate::embeddings::Embedder;
use crate::error::Result;

pub(crate) const DIMS: usize = 8;

/// Character-histogram embedder. Texts sharing letters score higher.
pub(crate) struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; DIMS];
                v[0] = 1.0;
                for b in text.bytes().filter(u8::is_ascii_alphabetic) {
                    v[(b.to_ascii_lowercase() as usize) % (DIMS - 1) + 1] += 1.0;
                }
                v
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        DIMS
    }
}

pub(crate) async fn test_state(api_keys: Vec<String>) -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.server.api_keys = api_keys;
    config.database = DatabaseConfig {
        url: format!("file:{}", dir.path().join("api.db").display()),
        auth_token: None,
        local_path: None,
    };
    config.embeddings.dimensions = DIMS;
    config.processing.chunk_size = 200;
    config.processing.chunk_overlap = 0;

    let raw_db = Database::new(&config.database, DIMS).await.unwrap();
    let db: Arc<dyn DatabaseBackend> =
        Arc::new(LibSqlBackend::new(raw_db, config.store.metadata_key.clone()).unwrap());

    let directory = StaticDirectory::new("-")
        .with_user("alice", ["-team1"])
        .with_user("bob", ["-team2"]);
    let directory = Arc::new(CachedDirectory::new(directory, Duration::from_secs(60), 100));

    let state = AppState::new(config, db, Arc::new(LetterEmbedder), directory).unwrap();
    (state, dir)
}
