use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KbError, Result};

/// Authenticated caller as supplied by the base application (usually an
/// email address). Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserIdentity(String);

impl UserIdentity {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(KbError::Validation(
                "User identity must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserIdentity {
    type Error = KbError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<UserIdentity> for String {
    fn from(value: UserIdentity) -> Self {
        value.0
    }
}

/// A user id plus its effective group set for one request.
///
/// Built once per request and handed down explicitly to every search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIdentity {
    pub user_id: String,
    pub groups: BTreeSet<String>,
}

impl ResolvedIdentity {
    pub fn new<I, S>(user_id: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id: user_id.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_user(user: &UserIdentity, groups: BTreeSet<String>) -> Self {
        Self {
            user_id: user.as_str().to_string(),
            groups,
        }
    }

    /// Identity carrying no group grants.
    pub fn user_only(user: &UserIdentity) -> Self {
        Self::from_user(user, BTreeSet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_identity_trims() {
        let user = UserIdentity::new("  alice@x.com ").unwrap();
        assert_eq!(user.as_str(), "alice@x.com");
    }

    #[test]
    fn test_user_identity_rejects_blank() {
        assert!(matches!(
            UserIdentity::new("   "),
            Err(KbError::Validation(_))
        ));
    }

    #[test]
    fn test_user_identity_deserialize_rejects_blank() {
        let parsed: std::result::Result<UserIdentity, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_user_only_has_no_groups() {
        let user = UserIdentity::new("bob@x.com").unwrap();
        let identity = ResolvedIdentity::user_only(&user);
        assert_eq!(identity.user_id, "bob@x.com");
        assert!(identity.groups.is_empty());
    }
}
