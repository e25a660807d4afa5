use std::sync::Arc;

use crate::config::Config;
use crate::db::DatabaseBackend;
use crate::directory::DirectoryClient;
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::processing::ProcessingPipeline;
use crate::services::{KnowledgeService, RetrievalService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<dyn DatabaseBackend>,
    pub embedder: Arc<dyn Embedder>,
    pub knowledge: KnowledgeService,
    pub retrieval: RetrievalService,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Arc<dyn DatabaseBackend>,
        embedder: Arc<dyn Embedder>,
        directory: Arc<dyn DirectoryClient>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let pipeline = Arc::new(ProcessingPipeline::new(
            embedder.clone(),
            &config.processing,
        )?);
        let knowledge = KnowledgeService::new(
            db.clone(),
            pipeline,
            config.store.metadata_key.clone(),
            config.processing.batch_size,
        );
        let retrieval = RetrievalService::new(
            db.clone(),
            embedder.clone(),
            directory,
            config.directory.failure_policy,
        );

        Ok(Self {
            config,
            db,
            embedder,
            knowledge,
            retrieval,
        })
    }
}
