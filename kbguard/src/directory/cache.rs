use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;

use super::DirectoryClient;
use crate::error::Result;
use crate::models::UserIdentity;

struct CacheEntry {
    groups: BTreeSet<String>,
    fetched_at: Instant,
}

type Slot = Arc<tokio::sync::Mutex<Option<CacheEntry>>>;

/// TTL cache in front of another directory.
///
/// Each user gets a slot guarded by an async mutex, so concurrent requests
/// for the same user wait on a single upstream lookup. Failed lookups leave
/// the slot untouched and the next caller retries.
pub struct CachedDirectory<D> {
    inner: D,
    ttl: Duration,
    slots: Mutex<LruCache<String, Slot>>,
}

impl<D: DirectoryClient> CachedDirectory<D> {
    pub fn new(inner: D, ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            ttl,
            slots: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn slot(&self, user: &UserIdentity) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots
            .get_or_insert(user.as_str().to_string(), || {
                Arc::new(tokio::sync::Mutex::new(None))
            })
            .clone()
    }

    /// Drop the cached entry for one user.
    pub fn invalidate(&self, user: &UserIdentity) {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.pop(user.as_str());
    }
}

#[async_trait]
impl<D: DirectoryClient> DirectoryClient for CachedDirectory<D> {
    async fn resolve_groups(&self, user: &UserIdentity) -> Result<BTreeSet<String>> {
        let slot = self.slot(user);
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                tracing::trace!(user = %user, "Directory cache hit");
                return Ok(cached.groups.clone());
            }
        }

        let groups = self.inner.resolve_groups(user).await?;
        *entry = Some(CacheEntry {
            groups: groups.clone(),
            fetched_at: Instant::now(),
        });
        Ok(groups)
    }
}
