use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ExtraMetadata, Metadata};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeBase {
    pub fn new(id: String, name: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateKnowledgeRequest {
    #[validate(length(min = 1, max = 256, message = "name must be 1-256 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One ingested source item. Its chunks share the item's envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub knowledge_id: String,
    pub item_url: String,
    pub metadata: Metadata,
    pub chunk_count: i64,
    pub created_at: DateTime<Utc>,
}

/// An item to ingest: raw text plus its envelope.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub content: String,
    pub extra: ExtraMetadata,
}

impl NewItem {
    pub fn new(content: impl Into<String>, extra: ExtraMetadata) -> Self {
        Self {
            content: content.into(),
            extra,
        }
    }

    pub fn url(&self) -> &str {
        &self.extra.metadata.url
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Added,
    Updated,
    /// An item with the same URL already exists.
    Skipped,
    Removed,
    NotFound,
    Failed,
}

/// Per-item result of a batch operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn new(url: impl Into<String>, status: ItemStatus) -> Self {
        Self {
            url: Some(url.into()),
            status,
            item_id: None,
            error: None,
        }
    }

    pub fn for_item(item_id: impl Into<String>, status: ItemStatus) -> Self {
        Self {
            url: None,
            status,
            item_id: Some(item_id.into()),
            error: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn failed(url: impl Into<String>, error: impl ToString) -> Self {
        Self {
            url: Some(url.into()),
            status: ItemStatus::Failed,
            item_id: None,
            error: Some(error.to_string()),
        }
    }
}
