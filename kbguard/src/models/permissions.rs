use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use validator::ValidationError;

use super::ResolvedIdentity;

/// Access-control list attached to one chunk.
///
/// Empty `users` together with empty `groups` means the chunk is visible to
/// nobody.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPermissions {
    #[serde(default)]
    pub users: BTreeSet<String>,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl ItemPermissions {
    pub fn new<U, G, S, T>(users: U, groups: G) -> Self
    where
        U: IntoIterator<Item = S>,
        G: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            users: users.into_iter().map(Into::into).collect(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty()
    }
}

/// `identity.user_id ∈ acl.users` or `acl.groups ∩ identity.groups ≠ ∅`.
///
/// The SQL rendering of the same predicate lives in [`crate::db::AclFilter`].
pub fn is_visible(acl: &ItemPermissions, identity: &ResolvedIdentity) -> bool {
    acl.users.contains(&identity.user_id) || !acl.groups.is_disjoint(&identity.groups)
}

/// Principals must be non-blank and free of surrounding whitespace, otherwise
/// they could never match a normalized identity.
pub(crate) fn validate_permissions(acl: &ItemPermissions) -> Result<(), ValidationError> {
    let bad = acl
        .users
        .iter()
        .chain(acl.groups.iter())
        .any(|p| p.trim().is_empty() || p.trim() != p);
    if bad {
        let mut err = ValidationError::new("principal");
        err.message = Some("user and group identifiers must be non-empty and trimmed".into());
        return Err(err);
    }
    Ok(())
}
