use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;

use super::{filter_by_prefix, DirectoryClient};
use crate::error::Result;
use crate::models::UserIdentity;

/// In-memory user to groups table. Unknown users have no groups.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    memberships: HashMap<String, Vec<String>>,
    group_prefix: String,
}

impl StaticDirectory {
    pub fn new(group_prefix: impl Into<String>) -> Self {
        Self {
            memberships: HashMap::new(),
            group_prefix: group_prefix.into(),
        }
    }

    pub fn with_user<I, S>(mut self, user: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.memberships
            .insert(user.into(), groups.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl DirectoryClient for StaticDirectory {
    async fn resolve_groups(&self, user: &UserIdentity) -> Result<BTreeSet<String>> {
        let groups = self
            .memberships
            .get(user.as_str())
            .map(|groups| filter_by_prefix(groups.iter().cloned(), &self.group_prefix))
            .unwrap_or_default();
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_lookup_applies_prefix() {
        let directory =
            StaticDirectory::new("-").with_user("bob@x.com", ["-team1", "finance", "-team2"]);
        let bob = UserIdentity::new("bob@x.com").unwrap();
        let groups = directory.resolve_groups(&bob).await.unwrap();
        assert_eq!(
            groups,
            BTreeSet::from(["-team1".to_string(), "-team2".to_string()])
        );
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_groups() {
        let directory = StaticDirectory::new("");
        let carol = UserIdentity::new("carol@x.com").unwrap();
        assert!(directory.resolve_groups(&carol).await.unwrap().is_empty());
    }
}
