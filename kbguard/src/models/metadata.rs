use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::permissions::validate_permissions;
use super::ItemPermissions;

/// Descriptive metadata of a source item, carried for citation display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ItemMetadata {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    /// Direct link to the item; also the dedup key within a knowledge base.
    #[validate(url(message = "url must be an absolute URL"))]
    pub url: String,
    /// Link to the enclosing page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url(message = "context_url must be an absolute URL"))]
    pub context_url: Option<String>,
    pub date: DateTime<Utc>,
    /// Identifier of the workflow that produced the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// The envelope attached to every stored chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ExtraMetadata {
    #[serde(default)]
    #[validate(custom(function = "validate_permissions"))]
    pub auth: ItemPermissions,
    #[validate(nested)]
    pub metadata: ItemMetadata,
}

impl ExtraMetadata {
    pub fn new(auth: ItemPermissions, metadata: ItemMetadata) -> Self {
        Self { auth, metadata }
    }
}

/// The subset of [`ItemMetadata`] handed to the chat UI for citations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_url: Option<String>,
}

impl From<&ItemMetadata> for Citation {
    fn from(meta: &ItemMetadata) -> Self {
        Self {
            title: meta.title.clone(),
            url: meta.url.clone(),
            context_url: meta.context_url.clone(),
        }
    }
}
