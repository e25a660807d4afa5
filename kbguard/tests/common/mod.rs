#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use kbguard::config::{DatabaseConfig, DEFAULT_METADATA_KEY};
use kbguard::db::{Database, DatabaseBackend, LibSqlBackend};
use kbguard::embeddings::Embedder;
use kbguard::models::{ExtraMetadata, ItemMetadata, ItemPermissions, NewChunk, NewItem};
use kbguard::Result;
use tempfile::TempDir;

pub const DIMS: usize = 4;

/// Maps text onto four fixed topics so tests control ranking exactly.
pub struct TopicEmbedder;

pub fn topic_vector(text: &str) -> Vec<f32> {
    let topics = ["finance", "roadmap", "hiring", "security"];
    let mut v: Vec<f32> = topics
        .iter()
        .map(|t| text.matches(t).count() as f32)
        .collect();
    if v.iter().all(|x| *x == 0.0) {
        v = vec![0.25; DIMS];
    }
    v
}

#[async_trait]
impl Embedder for TopicEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| topic_vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIMS
    }
}

pub struct TestStore {
    pub backend: Arc<dyn DatabaseBackend>,
    /// Raw handle for writing rows behind the backend's back.
    pub raw: Database,
    pub dir: TempDir,
}

pub async fn open_store() -> TestStore {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = DatabaseConfig {
        url: format!("file:{}", dir.path().join("kbguard_test.db").display()),
        auth_token: None,
        local_path: None,
    };
    let raw = Database::new(&config, DIMS)
        .await
        .expect("Failed to create database");
    let backend = LibSqlBackend::new(raw.clone(), DEFAULT_METADATA_KEY)
        .expect("Failed to create backend");

    TestStore {
        backend: Arc::new(backend),
        raw,
        dir,
    }
}

pub fn envelope(url: &str, users: &[&str], groups: &[&str]) -> ExtraMetadata {
    ExtraMetadata::new(
        ItemPermissions::new(
            users.iter().map(|u| u.to_string()),
            groups.iter().map(|g| g.to_string()),
        ),
        ItemMetadata {
            title: format!("Document at {url}"),
            url: url.to_string(),
            context_url: None,
            date: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            source: None,
        },
    )
}

pub fn chunk(kb: &str, content: &str, users: &[&str], groups: &[&str]) -> NewChunk {
    let url = format!("https://docs.example.com/{}", content.replace(' ', "-"));
    NewChunk::new(kb, content, topic_vector(content), envelope(&url, users, groups))
}

pub fn item(content: &str, url: &str, users: &[&str], groups: &[&str]) -> NewItem {
    NewItem::new(content, envelope(url, users, groups))
}
