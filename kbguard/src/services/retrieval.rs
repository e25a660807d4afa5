use std::sync::Arc;

use crate::config::DirectoryFailurePolicy;
use crate::db::DatabaseBackend;
use crate::directory::DirectoryClient;
use crate::embeddings::Embedder;
use crate::error::{KbError, Result};
use crate::models::{ResolvedIdentity, RetrievalHit, SearchQuery, UserIdentity};

/// Largest `k` a single query may ask for.
pub const MAX_K: usize = 100;

/// Authorized retrieval: resolve the caller's groups once, then search only
/// among chunks that caller may see.
#[derive(Clone)]
pub struct RetrievalService {
    db: Arc<dyn DatabaseBackend>,
    embedder: Arc<dyn Embedder>,
    directory: Arc<dyn DirectoryClient>,
    failure_policy: DirectoryFailurePolicy,
}

impl RetrievalService {
    pub fn new(
        db: Arc<dyn DatabaseBackend>,
        embedder: Arc<dyn Embedder>,
        directory: Arc<dyn DirectoryClient>,
        failure_policy: DirectoryFailurePolicy,
    ) -> Self {
        Self {
            db,
            embedder,
            directory,
            failure_policy,
        }
    }

    pub fn failure_policy(&self) -> DirectoryFailurePolicy {
        self.failure_policy
    }

    /// Resolve `user` to an identity carrying its groups, applying the
    /// configured policy when the directory cannot answer.
    pub async fn resolve_identity(&self, user: &UserIdentity) -> Result<ResolvedIdentity> {
        match self.directory.resolve_groups(user).await {
            Ok(groups) => Ok(ResolvedIdentity::from_user(user, groups)),
            Err(KbError::DirectoryUnavailable(reason)) => match self.failure_policy {
                DirectoryFailurePolicy::Fail => Err(KbError::DirectoryUnavailable(reason)),
                DirectoryFailurePolicy::UserOnly => {
                    tracing::warn!(
                        user = %user,
                        reason = %reason,
                        "Directory unavailable, continuing with user-only visibility"
                    );
                    Ok(ResolvedIdentity::user_only(user))
                }
            },
            Err(e) => Err(e),
        }
    }

    /// Top-`k` chunks for `query` across `knowledge_ids` (all knowledge
    /// bases when empty) that `user` is allowed to see.
    pub async fn query(
        &self,
        user: &UserIdentity,
        knowledge_ids: &[String],
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievalHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(KbError::Validation("Query must not be empty".to_string()));
        }
        if k > MAX_K {
            return Err(KbError::Validation(format!("k must be at most {MAX_K}")));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let identity = self.resolve_identity(user).await?;
        let vector = self.embedder.embed_one(query).await?;
        self.search_as(&identity, knowledge_ids, vector, k).await
    }

    /// Search with an already resolved identity.
    pub async fn search_as(
        &self,
        identity: &ResolvedIdentity,
        knowledge_ids: &[String],
        vector: Vec<f32>,
        k: usize,
    ) -> Result<Vec<RetrievalHit>> {
        let search = SearchQuery::new(knowledge_ids.to_vec(), vector, k.min(MAX_K));
        let hits: Vec<RetrievalHit> = self
            .db
            .search(&search, identity)
            .await?
            .into_iter()
            .map(RetrievalHit::from)
            .collect();

        tracing::debug!(
            user = %identity.user_id,
            groups = identity.groups.len(),
            knowledge_bases = knowledge_ids.len(),
            k,
            hits = hits.len(),
            "Authorized retrieval"
        );
        Ok(hits)
    }
}
