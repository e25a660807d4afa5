//! Group membership resolution.

mod cache;
mod graph;
mod static_dir;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::DirectoryConfig;
use crate::error::Result;
use crate::models::UserIdentity;

pub use cache::CachedDirectory;
pub use graph::{GraphConfig, GraphDirectoryClient};
pub use static_dir::StaticDirectory;

/// Resolves a user to the set of groups that count for permission checks.
///
/// Implementations must surface lookup failures as
/// [`crate::error::KbError::DirectoryUnavailable`] rather than returning an
/// empty set; an empty set means the user genuinely has no matching groups.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn resolve_groups(&self, user: &UserIdentity) -> Result<BTreeSet<String>>;
}

#[async_trait]
impl<T: DirectoryClient + ?Sized> DirectoryClient for Arc<T> {
    async fn resolve_groups(&self, user: &UserIdentity) -> Result<BTreeSet<String>> {
        (**self).resolve_groups(user).await
    }
}

/// Keep only names starting with `prefix`. An empty prefix keeps everything.
pub fn filter_by_prefix<I, S>(names: I, prefix: &str) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names
        .into_iter()
        .map(Into::into)
        .filter(|name: &String| name.starts_with(prefix))
        .collect()
}

/// Build the directory configured for this deployment, wrapped in the TTL
/// cache.
pub fn build_directory(config: &DirectoryConfig) -> Result<Arc<dyn DirectoryClient>> {
    let ttl = Duration::from_secs(config.cache_ttl_secs);
    let directory: Arc<dyn DirectoryClient> = match &config.base_url {
        Some(base_url) => {
            tracing::info!(base_url = %base_url, prefix = %config.group_prefix, "Using HTTP directory");
            let client = GraphDirectoryClient::new(GraphConfig {
                base_url: base_url.clone(),
                token: config.token.clone(),
                group_prefix: config.group_prefix.clone(),
                timeout_secs: config.timeout_secs,
                max_retries: config.max_retries,
            })?;
            Arc::new(CachedDirectory::new(client, ttl, config.cache_size))
        }
        None => {
            if config.static_memberships.is_empty() {
                tracing::warn!(
                    "Neither DIRECTORY_BASE_URL nor DIRECTORY_STATIC_GROUPS set; group grants match no one"
                );
            } else {
                tracing::info!(
                    users = config.static_memberships.len(),
                    "Using static directory"
                );
            }
            let client = config.static_memberships.iter().fold(
                StaticDirectory::new(config.group_prefix.clone()),
                |dir, (user, groups)| dir.with_user(user.clone(), groups.iter().cloned()),
            );
            Arc::new(CachedDirectory::new(client, ttl, config.cache_size))
        }
    };
    Ok(directory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_filter() {
        let groups = filter_by_prefix(["-eng", "-sales", "finance"], "-");
        assert_eq!(
            groups,
            BTreeSet::from(["-eng".to_string(), "-sales".to_string()])
        );
    }

    #[test]
    fn test_empty_prefix_keeps_all() {
        let groups = filter_by_prefix(["-eng", "finance"], "");
        assert_eq!(groups.len(), 2);
    }

    #[tokio::test]
    async fn test_static_memberships_are_loaded() {
        let mut config = crate::config::Config::default().directory;
        config.base_url = None;
        config.group_prefix = "-".to_string();
        config.static_memberships =
            crate::config::parse_memberships("alice@x.com=-team1,staff;bob@x.com=-team2");

        let directory = build_directory(&config).unwrap();
        let alice = UserIdentity::new("alice@x.com").unwrap();
        assert_eq!(
            directory.resolve_groups(&alice).await.unwrap(),
            BTreeSet::from(["-team1".to_string()])
        );
        let carol = UserIdentity::new("carol@x.com").unwrap();
        assert!(directory.resolve_groups(&carol).await.unwrap().is_empty());
    }
}
